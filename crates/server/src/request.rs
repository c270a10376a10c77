//! Transport-free request shapes.
//!
//! The RPC surface lives outside this crate; runners consume these plain
//! structs, which carry exactly the fields the core needs.

/// Insert documents into a collection; duplicate primary keys fail.
#[derive(Debug, Clone, Default)]
pub struct InsertRequest {
    /// Target database.
    pub db: String,
    /// Target collection.
    pub collection: String,
    /// Raw JSON documents.
    pub documents: Vec<Vec<u8>>,
}

/// Insert or overwrite documents by primary key.
#[derive(Debug, Clone, Default)]
pub struct ReplaceRequest {
    /// Target database.
    pub db: String,
    /// Target collection.
    pub collection: String,
    /// Raw JSON documents.
    pub documents: Vec<Vec<u8>>,
}

/// Merge update operators into the rows matching a filter.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Target database.
    pub db: String,
    /// Target collection.
    pub collection: String,
    /// Row filter; must pin the full primary key.
    pub filter: Vec<u8>,
    /// Update operator document, e.g. `{"$set": {...}}`.
    pub fields: Vec<u8>,
}

/// Delete the rows matching a filter.
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    /// Target database.
    pub db: String,
    /// Target collection.
    pub collection: String,
    /// Row filter; must pin the full primary key.
    pub filter: Vec<u8>,
}

/// Options of a streaming read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Upper bound on rows streamed across all key segments; 0 means
    /// unlimited.
    pub limit: i64,
}

/// Stream the rows matching a filter.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// Target database.
    pub db: String,
    /// Target collection.
    pub collection: String,
    /// Row filter; empty or `{}` scans the whole collection.
    pub filter: Vec<u8>,
    /// Field projection document; empty streams rows unchanged.
    pub fields: Vec<u8>,
    /// Read options.
    pub options: Option<ReadOptions>,
}

/// Create a collection, or update an existing collection's schema.
#[derive(Debug, Clone, Default)]
pub struct CreateOrUpdateCollectionRequest {
    /// Target database.
    pub db: String,
    /// Collection name.
    pub collection: String,
    /// User schema document.
    pub schema: Vec<u8>,
    /// Fail with `AlreadyExists` instead of updating when the collection
    /// exists.
    pub only_create: bool,
}

/// Drop a collection.
#[derive(Debug, Clone, Default)]
pub struct DropCollectionRequest {
    /// Target database.
    pub db: String,
    /// Collection name.
    pub collection: String,
}

/// List a database's collections.
#[derive(Debug, Clone, Default)]
pub struct ListCollectionsRequest {
    /// Target database.
    pub db: String,
}

/// Describe one collection.
#[derive(Debug, Clone, Default)]
pub struct DescribeCollectionRequest {
    /// Target database.
    pub db: String,
    /// Collection name.
    pub collection: String,
}

/// Create a database.
#[derive(Debug, Clone, Default)]
pub struct CreateDatabaseRequest {
    /// Database name.
    pub db: String,
}

/// Drop a database.
#[derive(Debug, Clone, Default)]
pub struct DropDatabaseRequest {
    /// Database name.
    pub db: String,
}

/// List the tenant's databases.
#[derive(Debug, Clone, Default)]
pub struct ListDatabasesRequest;

/// Describe one database and its collections.
#[derive(Debug, Clone, Default)]
pub struct DescribeDatabaseRequest {
    /// Database name.
    pub db: String,
}
