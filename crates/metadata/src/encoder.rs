//! Dictionary key encoding.
//!
//! Table prefix layout: `"data" || be_u32(ns) || be_u32(db) || be_u32(coll)`
//! — exactly 16 bytes. Fixed-width big-endian ids keep prefix scans valid
//! and make reverse lookup O(1); names never appear in keys, so renames
//! cannot invalidate stored rows.

use std::sync::Arc;

use folio_kv::{Key, TupleValue};
use folio_types::{Error, Result};

use crate::schema::Collection;
use crate::tenant::{Database, Namespace, TenantManager};

const USER_TABLE_PREFIX: &[u8] = b"data";

/// Length of an encoded table prefix.
pub const TABLE_PREFIX_LEN: usize = 16;

/// Encodes and decodes the dictionary-id key layout.
#[derive(Clone)]
pub struct KeyEncoder {
    tenants: Arc<TenantManager>,
}

impl KeyEncoder {
    /// Creates an encoder backed by the tenant dictionary.
    pub fn new(tenants: Arc<TenantManager>) -> Self {
        Self { tenants }
    }

    /// Encodes the 16-byte table prefix for a collection.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the database or collection is absent.
    pub fn encode_table(
        &self,
        ns: &Namespace,
        db: Option<&Database>,
        coll: Option<&Collection>,
    ) -> Result<Vec<u8>> {
        let db = db.ok_or_else(|| Error::invalid_argument("database is missing"))?;
        let coll = coll.ok_or_else(|| Error::invalid_argument("collection is missing"))?;

        let mut out = Vec::with_capacity(TABLE_PREFIX_LEN);
        out.extend_from_slice(USER_TABLE_PREFIX);
        out.extend_from_slice(&ns.id.to_be_bytes());
        out.extend_from_slice(&db.id.to_be_bytes());
        out.extend_from_slice(&coll.id.to_be_bytes());
        Ok(out)
    }

    /// Encodes an index id for use as the first tuple element of a key.
    pub fn encode_index(&self, index_id: u32) -> [u8; 4] {
        index_id.to_be_bytes()
    }

    /// Builds a row key: the encoded index id followed by the user's
    /// index parts, under the given table prefix.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the index id is absent.
    pub fn encode_key(
        &self,
        table: &[u8],
        index_id: Option<u32>,
        index_parts: Vec<TupleValue>,
    ) -> Result<Key> {
        let index_id = index_id.ok_or_else(|| Error::invalid_argument("index is missing"))?;

        let mut parts = Vec::with_capacity(index_parts.len() + 1);
        parts.push(TupleValue::Bytes(self.encode_index(index_id).to_vec()));
        parts.extend(index_parts);
        Ok(Key::new(table.to_vec(), parts))
    }

    /// The search collection name for a KV collection: names joined with
    /// `-`, not ids, because the search engine addresses collections by
    /// name.
    pub fn encode_search_table(&self, ns: &str, db: &str, coll: &str) -> String {
        format!("{ns}-{db}-{coll}")
    }

    /// Decodes a table prefix back to `(namespace, database, collection)`
    /// names. `None` when the prefix is not a user table or any id is
    /// unknown; never panics.
    pub fn decode_table(&self, table: &[u8]) -> Option<(String, String, String)> {
        if table.len() < TABLE_PREFIX_LEN || !table.starts_with(USER_TABLE_PREFIX) {
            return None;
        }

        let ns_id = u32::from_be_bytes(table[4..8].try_into().ok()?);
        let db_id = u32::from_be_bytes(table[8..12].try_into().ok()?);
        let coll_id = u32::from_be_bytes(table[12..16].try_into().ok()?);

        self.tenants.resolve_table_names(ns_id, db_id, coll_id)
    }

    /// Decodes an encoded index id.
    pub fn decode_index(&self, index: &[u8]) -> u32 {
        let mut buf = [0u8; 4];
        for (i, b) in index.iter().take(4).enumerate() {
            buf[i] = *b;
        }
        u32::from_be_bytes(buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use async_trait::async_trait;
    use folio_types::TableData;

    use super::*;
    use crate::schema::SchemaFactory;
    use crate::tenant::MetaStore;

    struct NullMeta;

    #[async_trait]
    impl MetaStore for NullMeta {
        async fn insert_meta(&self, _key: Key, _data: TableData) -> Result<()> {
            Ok(())
        }

        async fn replace_meta(&self, _key: Key, _data: TableData) -> Result<()> {
            Ok(())
        }

        async fn delete_meta(&self, _key: Key) -> Result<()> {
            Ok(())
        }
    }

    async fn seeded_manager() -> Arc<TenantManager> {
        let mgr = TenantManager::new(Namespace::new("ns1", 1));
        mgr.create_database(&NullMeta, "db1").await.expect("db");
        let mut staged = mgr.get_database("db1").expect("staged");
        let factory = SchemaFactory::build(
            "c1",
            br#"{"properties":{"K1":{"type":"string"}},"primary_key":["K1"]}"#,
        )
        .expect("schema");
        mgr.create_collection(&NullMeta, &mut staged, factory).await.expect("coll");
        mgr.publish(staged);
        mgr
    }

    #[tokio::test]
    async fn test_table_prefix_roundtrip() {
        let mgr = seeded_manager().await;
        let encoder = KeyEncoder::new(Arc::clone(&mgr));

        let db = mgr.get_database("db1").expect("db");
        let coll = db.get_collection("c1").expect("c1");
        let table = encoder
            .encode_table(mgr.namespace(), Some(&db), Some(&coll))
            .expect("encode");

        assert_eq!(table.len(), TABLE_PREFIX_LEN);
        assert!(table.starts_with(b"data"));
        assert_eq!(
            encoder.decode_table(&table),
            Some(("ns1".to_string(), "db1".to_string(), "c1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_encode_table_missing_parts() {
        let mgr = seeded_manager().await;
        let encoder = KeyEncoder::new(Arc::clone(&mgr));
        let db = mgr.get_database("db1").expect("db");

        assert!(encoder.encode_table(mgr.namespace(), None, None).is_err());
        assert!(encoder.encode_table(mgr.namespace(), Some(&db), None).is_err());
    }

    #[tokio::test]
    async fn test_decode_rejects_foreign_prefixes() {
        let mgr = seeded_manager().await;
        let encoder = KeyEncoder::new(mgr);

        assert_eq!(encoder.decode_table(b"meta\x00\x00\x00\x01\x00\x00\x00\x01\x00\x00\x00\x01"), None);
        assert_eq!(encoder.decode_table(b"data\x00\x00"), None);
        assert_eq!(
            encoder.decode_table(b"data\x00\x00\x00\x63\x00\x00\x00\x63\x00\x00\x00\x63"),
            None
        );
    }

    #[tokio::test]
    async fn test_encode_key_prepends_index_id() {
        let mgr = seeded_manager().await;
        let encoder = KeyEncoder::new(mgr);

        let key = encoder
            .encode_key(b"dataXXXXXXXXXXXX", Some(1), vec![TupleValue::Int(42)])
            .expect("key");
        assert_eq!(key.index_parts().len(), 2);
        assert_eq!(key.index_parts()[0], TupleValue::Bytes(vec![0, 0, 0, 1]));

        assert!(encoder.encode_key(b"t", None, Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_search_table_name_uses_names() {
        let mgr = seeded_manager().await;
        let encoder = KeyEncoder::new(mgr);
        assert_eq!(encoder.encode_search_table("ns1", "db1", "c1"), "ns1-db1-c1");
    }

    #[tokio::test]
    async fn test_decode_index() {
        let mgr = seeded_manager().await;
        let encoder = KeyEncoder::new(mgr);
        assert_eq!(encoder.decode_index(&encoder.encode_index(7)), 7);
    }
}
