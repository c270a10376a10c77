//! In-memory search backend for tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::SearchError;
use crate::store::SearchStore;
use crate::types::{IndexAction, IndexDocumentsOptions, SearchHit, SearchResult, SearchSchema};

/// In-memory search store: NDJSON ingest, id-ordered pagination, match-all
/// search. The filter string is accepted and ignored, which is enough for
/// the engine's full-scan fallback and for indexer tests.
#[derive(Default)]
pub struct MemSearch {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    // When set, the next N index/delete submissions fail; exercises the
    // indexer's retry loop.
    failures_remaining: RwLock<u32>,
}

impl MemSearch {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` submissions fail with an indexing error.
    pub fn fail_next(&self, n: u32) {
        *self.failures_remaining.write() = n;
    }

    /// Returns a collection's documents in id order.
    pub fn documents(&self, table: &str) -> Vec<Value> {
        self.collections
            .read()
            .get(table)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns one document by id.
    pub fn document(&self, table: &str, id: &str) -> Option<Value> {
        self.collections.read().get(table).and_then(|docs| docs.get(id)).cloned()
    }

    fn take_failure(&self) -> bool {
        let mut remaining = self.failures_remaining.write();
        if *remaining > 0 {
            *remaining -= 1;
            return true;
        }
        false
    }
}

#[async_trait]
impl SearchStore for MemSearch {
    async fn create_collection(&self, schema: &SearchSchema) -> Result<(), SearchError> {
        let mut collections = self.collections.write();
        if collections.contains_key(&schema.name) {
            return Err(SearchError::Duplicate);
        }
        collections.insert(schema.name.clone(), BTreeMap::new());
        Ok(())
    }

    async fn drop_collection(&self, table: &str) -> Result<(), SearchError> {
        match self.collections.write().remove(table) {
            Some(_) => Ok(()),
            None => Err(SearchError::NotFound),
        }
    }

    async fn index_documents(
        &self,
        table: &str,
        documents: &[u8],
        options: IndexDocumentsOptions,
    ) -> Result<(), SearchError> {
        if self.take_failure() {
            return Err(SearchError::Indexing { message: "injected failure".to_string() });
        }

        let mut collections = self.collections.write();
        let docs = collections.entry(table.to_string()).or_default();

        for line in documents.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
            let parsed: Value = serde_json::from_slice(line)
                .map_err(|e| SearchError::Indexing { message: e.to_string() })?;
            let id = parsed
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchError::Indexing {
                    message: "document is missing a string id".to_string(),
                })?
                .to_string();

            match options.action {
                IndexAction::Upsert => {
                    docs.insert(id, parsed);
                },
                IndexAction::Update => {
                    // Shallow-merge onto the existing document, as the
                    // engine's partial update does.
                    let merged = match (docs.get(&id), &parsed) {
                        (Some(Value::Object(existing)), Value::Object(incoming)) => {
                            let mut out = existing.clone();
                            for (k, v) in incoming {
                                out.insert(k.clone(), v.clone());
                            }
                            Value::Object(out)
                        },
                        _ => parsed,
                    };
                    docs.insert(id, merged);
                },
            }
        }
        Ok(())
    }

    async fn delete_document(&self, table: &str, key: &str) -> Result<(), SearchError> {
        if self.take_failure() {
            return Err(SearchError::Indexing { message: "injected failure".to_string() });
        }
        match self.collections.write().get_mut(table).and_then(|docs| docs.remove(key)) {
            Some(_) => Ok(()),
            None => Err(SearchError::NotFound),
        }
    }

    async fn search(
        &self,
        table: &str,
        _filter_by: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let collections = self.collections.read();
        let docs = collections.get(table).ok_or(SearchError::NotFound)?;

        let start = page.saturating_sub(1) * per_page;
        let hits = docs
            .values()
            .skip(start)
            .take(per_page)
            .map(|doc| SearchHit {
                document: doc.as_object().cloned().unwrap_or_default(),
            })
            .collect();

        Ok(vec![SearchResult::from_hits(hits)])
    }
}
