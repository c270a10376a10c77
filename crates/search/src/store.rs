//! The search store trait.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{IndexDocumentsOptions, SearchResult, SearchSchema};

/// A full-text search engine, consumed over HTTP in production and
/// in-memory in tests. Safe to share across tasks.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Creates a search collection.
    ///
    /// # Errors
    ///
    /// `SearchError::Duplicate` when the collection already exists.
    async fn create_collection(&self, schema: &SearchSchema) -> Result<(), SearchError>;

    /// Drops a search collection.
    ///
    /// # Errors
    ///
    /// `SearchError::NotFound` when the collection is absent.
    async fn drop_collection(&self, table: &str) -> Result<(), SearchError>;

    /// Bulk-ingests newline-delimited JSON documents. Every document must
    /// carry a string `id` field; `options.action` selects upsert vs
    /// partial update.
    async fn index_documents(
        &self,
        table: &str,
        documents: &[u8],
        options: IndexDocumentsOptions,
    ) -> Result<(), SearchError>;

    /// Deletes one document by id. Absent documents are reported as
    /// `SearchError::NotFound`.
    async fn delete_document(&self, table: &str, key: &str) -> Result<(), SearchError>;

    /// Runs a filtered, paginated query. `page` is 1-based.
    async fn search(
        &self,
        table: &str,
        filter_by: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;
}
