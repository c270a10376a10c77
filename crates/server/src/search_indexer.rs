//! Post-commit search indexing.
//!
//! The KV store is authoritative; the search engine is an eventually
//! consistent secondary. After a session commits, the indexer drains the
//! session's mutation events and pushes each one to the search store with
//! bounded retry. A permanent failure is logged and reported to the host,
//! never turned into a client-visible write rejection.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use folio_kv::{tuple, Event, OpType, TupleValue};
use folio_metadata::{KeyEncoder, TABLE_PREFIX_LEN, PRIMARY_KEY_INDEX_ID};
use folio_search::{
    IndexAction, IndexDocumentsOptions, RetryPolicy, SearchError, SearchStore,
};
use folio_types::{decode, Error, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::transaction::TxSession;

/// Transaction lifecycle hooks driven by the host around commit and
/// rollback.
#[async_trait]
pub trait TxListener: Send + Sync {
    /// Runs inside the commit path, before the KV commit is final.
    async fn on_commit(&self, tx: &TxSession, events: &[Event]) -> Result<()>;

    /// Runs after a successful KV commit with the session's drained
    /// events.
    async fn on_post_commit(&self, events: &[Event]) -> Result<()>;

    /// Runs after a rollback; the events were never observable.
    async fn on_rollback(&self, events: &[Event]);
}

/// Hook implementation that does nothing.
pub struct NoopTxListener;

#[async_trait]
impl TxListener for NoopTxListener {
    async fn on_commit(&self, _tx: &TxSession, _events: &[Event]) -> Result<()> {
        Ok(())
    }

    async fn on_post_commit(&self, _events: &[Event]) -> Result<()> {
        Ok(())
    }

    async fn on_rollback(&self, _events: &[Event]) {}
}

/// Fans committed mutations out to the search store.
pub struct SearchIndexer {
    store: Arc<dyn SearchStore>,
    encoder: KeyEncoder,
    policy: RetryPolicy,
}

impl SearchIndexer {
    /// Creates an indexer with the default retry policy.
    pub fn new(store: Arc<dyn SearchStore>, encoder: KeyEncoder) -> Self {
        Self::with_policy(store, encoder, RetryPolicy::default())
    }

    /// Creates an indexer with an explicit retry policy.
    pub fn with_policy(
        store: Arc<dyn SearchStore>,
        encoder: KeyEncoder,
        policy: RetryPolicy,
    ) -> Self {
        Self { store, encoder, policy }
    }

    /// Creates an indexer with the retry policy from the engine
    /// configuration.
    pub fn from_config(
        store: Arc<dyn SearchStore>,
        encoder: KeyEncoder,
        config: &folio_types::EngineConfig,
    ) -> Self {
        Self::with_policy(store, encoder, RetryPolicy::from(&config.indexer))
    }

    async fn with_retry<F, Fut>(&self, mut op: F) -> Result<(), SearchError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<(), SearchError>> + Send,
    {
        let mut last = None;
        for attempt in 0..self.policy.attempts {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last = Some(e);
                    if attempt + 1 < self.policy.attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                },
            }
        }
        Err(last.unwrap_or(SearchError::Indexing { message: "no attempts made".to_string() }))
    }

    async fn index_event(&self, event: &Event) -> Result<()> {
        // Non-user tables (metadata and friends) have no search
        // counterpart.
        let Some((ns, db, coll)) = self.encoder.decode_table(&event.table) else {
            return Ok(());
        };
        let search_table = self.encoder.encode_search_table(&ns, &db, &coll);

        let search_key = create_search_key(&event.table, &event.key)?;

        match event.op {
            OpType::Delete => {
                self.with_retry(|| {
                    let store = Arc::clone(&self.store);
                    let table = search_table.clone();
                    let key = search_key.clone();
                    async move { store.delete_document(&table, &key).await }
                })
                .await
                .map_err(Error::from)?;
            },
            OpType::Insert | OpType::Replace | OpType::Update => {
                let action = match event.op {
                    OpType::Update => IndexAction::Update,
                    _ => IndexAction::Upsert,
                };

                let raw = event
                    .data
                    .as_ref()
                    .ok_or_else(|| Error::internal("mutation event carries no value"))?;
                let table_data = decode(raw)?;

                let mut doc: Value = serde_json::from_slice(&table_data.raw)
                    .map_err(|e| Error::internal(e.to_string()))?;
                let obj = doc
                    .as_object_mut()
                    .ok_or_else(|| Error::internal("stored document is not a JSON object"))?;
                obj.insert("id".to_string(), Value::String(search_key));

                let payload =
                    serde_json::to_vec(&doc).map_err(|e| Error::internal(e.to_string()))?;

                self.with_retry(|| {
                    let store = Arc::clone(&self.store);
                    let table = search_table.clone();
                    let payload = payload.clone();
                    async move {
                        store
                            .index_documents(
                                &table,
                                &payload,
                                IndexDocumentsOptions { action, batch_size: 1 },
                            )
                            .await
                    }
                })
                .await
                .map_err(Error::from)?;
            },
            OpType::UpdateRange | OpType::DeleteRange => {
                debug!(table = %search_table, op = ?event.op, "range event has no search mapping");
            },
        }
        Ok(())
    }
}

#[async_trait]
impl TxListener for SearchIndexer {
    async fn on_commit(&self, _tx: &TxSession, _events: &[Event]) -> Result<()> {
        Ok(())
    }

    async fn on_post_commit(&self, events: &[Event]) -> Result<()> {
        for event in events {
            if let Err(e) = self.index_event(event).await {
                warn!(error = %e, "search indexing failed after retries");
                return Err(e);
            }
        }
        Ok(())
    }

    async fn on_rollback(&self, _events: &[Event]) {}
}

/// Computes the search document id for a KV key.
///
/// The tuple after the 16-byte table prefix starts with the encoded
/// primary-key index id; the remainder is the primary key itself. A
/// single remaining element is JSON-encoded with integers quoted so the
/// id is always a string; a composite key is re-packed and base64-encoded
/// the way JSON encodes bytes.
pub fn create_search_key(table: &[u8], key: &[u8]) -> Result<String> {
    if key.len() < table.len() || !key.starts_with(table) {
        return Err(Error::internal("key does not belong to its table"));
    }
    let parts = tuple::unpack(&key[table.len()..])?;

    let Some((index_id, pk_parts)) = parts.split_first() else {
        return Err(Error::internal("key carries no index id"));
    };
    debug_assert_eq!(
        *index_id,
        TupleValue::Bytes(PRIMARY_KEY_INDEX_ID.to_be_bytes().to_vec()),
        "first tuple element must be the primary-key index id"
    );
    debug_assert_eq!(table.len(), TABLE_PREFIX_LEN);

    match pk_parts {
        [] => Err(Error::internal("key carries no primary-key parts")),
        [single] => Ok(match single {
            // Numeric ids become quoted strings so the search id is
            // always a string.
            TupleValue::Int(i) => format!("\"{i}\""),
            TupleValue::String(s) => s.clone(),
            TupleValue::Bool(b) => b.to_string(),
            TupleValue::Double(d) => d.to_string(),
            TupleValue::Bytes(b) => base64::engine::general_purpose::STANDARD.encode(b),
        }),
        composite => {
            let packed = tuple::pack(composite);
            Ok(base64::engine::general_purpose::STANDARD.encode(packed))
        },
    }
}
