//! Tenancy hierarchy and dictionary-id management.
//!
//! The manager is an in-process cache over the metadata records persisted
//! through the transaction (via [`MetaStore`]). Metadata records live
//! under a non-`"data"` table prefix, so the search indexer's table
//! decoding skips their mutation events.
//!
//! DDL inside a transaction never mutates cached state directly: the
//! session stages a cloned [`Database`], the clone is mutated, and only a
//! successful commit publishes it back into the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use folio_kv::{Key, TupleValue};
use folio_types::{Error, Result, TableData};
use parking_lot::RwLock;

use crate::schema::{Collection, SchemaFactory};

/// Table prefix of metadata records. Deliberately distinct from the
/// `"data"` prefix of user rows.
const META_TABLE_PREFIX: &[u8] = b"meta";

/// A tenant namespace: the top of the hierarchy.
#[derive(Debug, Clone)]
pub struct Namespace {
    /// Namespace name.
    pub name: String,
    /// Dictionary id.
    pub id: u32,
}

impl Namespace {
    /// Builds a namespace.
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self { name: name.into(), id }
    }
}

/// A database: a named set of collections. Cheaply cloneable so DDL can
/// stage a copy inside a transaction.
#[derive(Debug, Clone)]
pub struct Database {
    /// Dictionary id.
    pub id: u32,
    /// Database name.
    pub name: String,
    collections: HashMap<String, Arc<Collection>>,
}

impl Database {
    fn new(id: u32, name: String) -> Self {
        Self { id, name, collections: HashMap::new() }
    }

    /// Looks up a collection by name.
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(name).cloned()
    }

    /// Collection names plus handles, sorted by name.
    pub fn list_collections(&self) -> Vec<Arc<Collection>> {
        let mut collections: Vec<_> = self.collections.values().cloned().collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        collections
    }

    fn insert_collection(&mut self, collection: Arc<Collection>) {
        self.collections.insert(collection.name.clone(), collection);
    }

    fn remove_collection(&mut self, name: &str) -> Option<Arc<Collection>> {
        self.collections.remove(name)
    }
}

/// Write seam into the current transaction for metadata records. The
/// transaction session implements this; the manager never sees the KV
/// store directly.
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Inserts a metadata record; fails with the KV duplicate-key
    /// sentinel when the record exists.
    async fn insert_meta(&self, key: Key, data: TableData) -> Result<()>;

    /// Replaces a metadata record unconditionally.
    async fn replace_meta(&self, key: Key, data: TableData) -> Result<()>;

    /// Deletes a metadata record; absent records are not an error.
    async fn delete_meta(&self, key: Key) -> Result<()>;
}

/// In-process cache of one namespace's databases and collections, plus
/// dictionary-id allocation.
pub struct TenantManager {
    namespace: Namespace,
    databases: RwLock<HashMap<String, Database>>,
    next_db_id: AtomicU32,
    next_coll_id: AtomicU32,
}

impl TenantManager {
    /// Creates a manager for one namespace.
    pub fn new(namespace: Namespace) -> Arc<Self> {
        Arc::new(Self {
            namespace,
            databases: RwLock::new(HashMap::new()),
            next_db_id: AtomicU32::new(1),
            next_coll_id: AtomicU32::new(1),
        })
    }

    /// The namespace this manager serves.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn db_meta_key(&self, db_name: &str) -> Key {
        let mut table = META_TABLE_PREFIX.to_vec();
        table.extend_from_slice(&self.namespace.id.to_be_bytes());
        table.extend_from_slice(&0u32.to_be_bytes());
        table.extend_from_slice(&0u32.to_be_bytes());
        Key::new(table, vec![TupleValue::String(db_name.to_string())])
    }

    fn coll_meta_key(&self, db_id: u32, coll_name: &str) -> Key {
        let mut table = META_TABLE_PREFIX.to_vec();
        table.extend_from_slice(&self.namespace.id.to_be_bytes());
        table.extend_from_slice(&db_id.to_be_bytes());
        table.extend_from_slice(&0u32.to_be_bytes());
        Key::new(table, vec![TupleValue::String(coll_name.to_string())])
    }

    /// Creates a database. Returns `true` when it already existed (the
    /// caller maps that to `AlreadyExists`).
    pub async fn create_database(&self, tx: &dyn MetaStore, name: &str) -> Result<bool> {
        if self.databases.read().contains_key(name) {
            return Ok(true);
        }

        let id = self.next_db_id.fetch_add(1, Ordering::SeqCst);
        let record = TableData::new(format!(r#"{{"id":{id}}}"#).into_bytes());
        match tx.insert_meta(self.db_meta_key(name), record).await {
            Ok(()) => {},
            // Raced create: someone committed the record between our cache
            // check and the insert.
            Err(Error::DuplicateKey) => return Ok(true),
            Err(e) => return Err(e),
        }

        self.databases.write().insert(name.to_string(), Database::new(id, name.to_string()));
        Ok(false)
    }

    /// Drops a database. Returns `false` when it did not exist.
    pub async fn drop_database(&self, tx: &dyn MetaStore, name: &str) -> Result<bool> {
        let Some(db) = self.databases.write().remove(name) else {
            return Ok(false);
        };
        tx.delete_meta(self.db_meta_key(name)).await?;
        for coll in db.list_collections() {
            tx.delete_meta(self.coll_meta_key(db.id, &coll.name)).await?;
        }
        Ok(true)
    }

    /// Database names, sorted.
    pub fn list_databases(&self) -> Vec<String> {
        let mut names: Vec<_> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// A clone of the cached database, if present.
    pub fn get_database(&self, name: &str) -> Option<Database> {
        self.databases.read().get(name).cloned()
    }

    /// Registers a collection into the staged database clone and persists
    /// its record through the transaction.
    ///
    /// # Errors
    ///
    /// Propagates the KV duplicate-key sentinel unchanged when another
    /// transaction committed the same record first; the runner maps it to
    /// `Aborted`.
    pub async fn create_collection(
        &self,
        tx: &dyn MetaStore,
        db: &mut Database,
        factory: SchemaFactory,
    ) -> Result<()> {
        let record = TableData::new(factory.schema.clone());

        if let Some(existing) = db.get_collection(&factory.name) {
            // Schema update of an existing collection keeps its id.
            tx.replace_meta(self.coll_meta_key(db.id, &factory.name), record).await?;
            db.insert_collection(Collection::new(existing.id, factory));
            return Ok(());
        }

        let id = self.next_coll_id.fetch_add(1, Ordering::SeqCst);
        tx.insert_meta(self.coll_meta_key(db.id, &factory.name), record).await?;
        db.insert_collection(Collection::new(id, factory));
        Ok(())
    }

    /// Removes a collection from the staged database clone and deletes
    /// its record.
    ///
    /// # Errors
    ///
    /// `NotFound` when the collection is absent.
    pub async fn drop_collection(
        &self,
        tx: &dyn MetaStore,
        db: &mut Database,
        name: &str,
    ) -> Result<()> {
        if db.remove_collection(name).is_none() {
            return Err(Error::not_found(format!("collection doesn't exist '{name}'")));
        }
        tx.delete_meta(self.coll_meta_key(db.id, name)).await
    }

    /// Publishes a staged database clone back into the cache after its
    /// transaction committed.
    pub fn publish(&self, db: Database) {
        self.databases.write().insert(db.name.clone(), db);
    }

    /// Reverse dictionary lookup: ids back to names. `None` when any id
    /// is unknown.
    pub fn resolve_table_names(
        &self,
        ns_id: u32,
        db_id: u32,
        coll_id: u32,
    ) -> Option<(String, String, String)> {
        if ns_id != self.namespace.id {
            return None;
        }
        let databases = self.databases.read();
        let db = databases.values().find(|db| db.id == db_id)?;
        let coll = db.collections.values().find(|c| c.id == coll_id)?;
        Some((self.namespace.name.clone(), db.name.clone(), coll.name.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records metadata writes; optionally reports a duplicate on insert.
    #[derive(Default)]
    struct RecordingMeta {
        inserted: Mutex<Vec<Vec<u8>>>,
        duplicate_next: Mutex<bool>,
    }

    #[async_trait]
    impl MetaStore for RecordingMeta {
        async fn insert_meta(&self, key: Key, _data: TableData) -> Result<()> {
            if std::mem::take(&mut *self.duplicate_next.lock()) {
                return Err(Error::DuplicateKey);
            }
            self.inserted.lock().push(key.pack());
            Ok(())
        }

        async fn replace_meta(&self, _key: Key, _data: TableData) -> Result<()> {
            Ok(())
        }

        async fn delete_meta(&self, _key: Key) -> Result<()> {
            Ok(())
        }
    }

    fn schema_factory(name: &str) -> SchemaFactory {
        SchemaFactory::build(
            name,
            br#"{"properties":{"K1":{"type":"string"}},"primary_key":["K1"]}"#,
        )
        .expect("schema")
    }

    #[tokio::test]
    async fn test_create_database_existed_flag() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let meta = RecordingMeta::default();

        assert!(!mgr.create_database(&meta, "db1").await.expect("create"));
        assert!(mgr.create_database(&meta, "db1").await.expect("create again"));
        assert_eq!(mgr.list_databases(), ["db1"]);
    }

    #[tokio::test]
    async fn test_raced_database_create_reports_existing() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let meta = RecordingMeta::default();
        *meta.duplicate_next.lock() = true;

        assert!(mgr.create_database(&meta, "db1").await.expect("raced create"));
        assert!(mgr.get_database("db1").is_none());
    }

    #[tokio::test]
    async fn test_collection_staging_keeps_cache_clean() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let meta = RecordingMeta::default();
        mgr.create_database(&meta, "db1").await.expect("create db");

        let mut staged = mgr.get_database("db1").expect("staged clone");
        mgr.create_collection(&meta, &mut staged, schema_factory("c1"))
            .await
            .expect("create coll");

        // Cache unchanged until publish.
        assert!(mgr.get_database("db1").expect("db").get_collection("c1").is_none());
        mgr.publish(staged);
        assert!(mgr.get_database("db1").expect("db").get_collection("c1").is_some());
    }

    #[tokio::test]
    async fn test_raced_collection_create_propagates_duplicate() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let meta = RecordingMeta::default();
        mgr.create_database(&meta, "db1").await.expect("create db");

        let mut staged = mgr.get_database("db1").expect("staged");
        *meta.duplicate_next.lock() = true;
        let err = mgr
            .create_collection(&meta, &mut staged, schema_factory("c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey));
    }

    #[tokio::test]
    async fn test_schema_update_keeps_collection_id() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let meta = RecordingMeta::default();
        mgr.create_database(&meta, "db1").await.expect("create db");

        let mut staged = mgr.get_database("db1").expect("staged");
        mgr.create_collection(&meta, &mut staged, schema_factory("c1")).await.expect("create");
        let first_id = staged.get_collection("c1").expect("c1").id;

        mgr.create_collection(&meta, &mut staged, schema_factory("c1")).await.expect("update");
        assert_eq!(staged.get_collection("c1").expect("c1").id, first_id);
    }

    #[tokio::test]
    async fn test_drop_collection_not_found() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let meta = RecordingMeta::default();
        mgr.create_database(&meta, "db1").await.expect("create db");

        let mut staged = mgr.get_database("db1").expect("staged");
        let err = mgr.drop_collection(&meta, &mut staged, "nope").await.unwrap_err();
        assert!(err.to_string().contains("collection doesn't exist 'nope'"));
    }

    #[tokio::test]
    async fn test_resolve_table_names() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let meta = RecordingMeta::default();
        mgr.create_database(&meta, "db1").await.expect("create db");
        let mut staged = mgr.get_database("db1").expect("staged");
        mgr.create_collection(&meta, &mut staged, schema_factory("c1")).await.expect("create");
        let coll_id = staged.get_collection("c1").expect("c1").id;
        let db_id = staged.id;
        mgr.publish(staged);

        assert_eq!(
            mgr.resolve_table_names(1, db_id, coll_id),
            Some(("ns1".to_string(), "db1".to_string(), "c1".to_string()))
        );
        assert_eq!(mgr.resolve_table_names(2, db_id, coll_id), None);
        assert_eq!(mgr.resolve_table_names(1, db_id, coll_id + 9), None);
    }

    #[tokio::test]
    async fn test_meta_keys_avoid_data_prefix() {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        let key = mgr.db_meta_key("db1");
        assert!(key.table().starts_with(b"meta"));
        assert!(!key.table().starts_with(b"data"));
    }
}
