//! Transaction sessions.
//!
//! A session is created per BeginTx, owns its KV transaction until commit
//! or rollback, and is then discarded. It is a finite-state wrapper:
//!
//! ```text
//!            start()                commit()/rollback()
//!  Created ─────────▶ Active ──────────────────────▶ Ended
//!              │                                         ▲
//!              └── error during start ───────────────────┘
//! ```
//!
//! All operations serialize on the session's async mutex; iterators
//! returned by `read` escape the mutex under the contract that no further
//! session operation runs until the iterator is exhausted or dropped.
//! Commit and rollback transition to Ended before the mutex is released,
//! so later operations on the same session fail with "session is gone".
//!
//! The mutation-event listener is owned by the session and fed exactly one
//! event per successful mutation, in program order.

use std::sync::Arc;

use async_trait::async_trait;
use folio_kv::{
    BufferingListener, Event, EventListener, Key, KeyValueStore, KvIterator, KvTx, OpType,
};
use folio_metadata::{Database, MetaStore};
use folio_types::{encode, Error, Result, TableData};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Identifies a transaction across requests; `origin` is sticky routing
/// material, not semantics.
#[derive(Debug, Clone)]
pub struct TxCtx {
    /// Unique transaction id.
    pub id: String,
    /// The host that started the transaction.
    pub origin: String,
}

impl TxCtx {
    fn generate() -> Self {
        let origin = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_default();
        Self { id: Uuid::new_v4().to_string(), origin }
    }
}

/// Transaction-lifetime baggage: holds the staged database while DDL is
/// pending inside the transaction.
#[derive(Default)]
pub struct SessionCtx {
    staged_db: Option<Database>,
}

impl SessionCtx {
    /// Stages a database clone.
    pub fn stage_database(&mut self, db: Database) {
        self.staged_db = Some(db);
    }

    /// The staged database, if any DDL ran in this transaction.
    pub fn staged_database(&self) -> Option<&Database> {
        self.staged_db.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Created,
    Active,
    Ended,
}

struct SessionInner {
    state: SessionState,
    kv_tx: Option<Box<dyn KvTx>>,
    listener: Box<dyn EventListener>,
    ctx: SessionCtx,
}

impl SessionInner {
    fn validate(&self) -> Result<()> {
        match self.state {
            SessionState::Ended => Err(Error::internal("session is gone")),
            SessionState::Created => Err(Error::internal("session not started")),
            SessionState::Active => Ok(()),
        }
    }

    fn tx(&mut self) -> Result<&mut Box<dyn KvTx>> {
        self.kv_tx.as_mut().ok_or_else(|| Error::internal("session is gone"))
    }
}

/// Starts sessions over the process-wide KV store handle.
pub struct TxManager {
    kv: Arc<dyn KeyValueStore>,
}

impl TxManager {
    /// Creates a manager.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Starts a new session with the default buffering event listener.
    pub async fn start_tx(&self) -> Result<TxSession> {
        self.start_tx_with_listener(Box::new(BufferingListener::new())).await
    }

    /// Starts a new session with a caller-chosen listener
    /// (`NoopListener` for paths that must not produce search activity).
    pub async fn start_tx_with_listener(
        &self,
        listener: Box<dyn EventListener>,
    ) -> Result<TxSession> {
        let session = TxSession {
            inner: Mutex::new(SessionInner {
                state: SessionState::Created,
                kv_tx: None,
                listener,
                ctx: SessionCtx::default(),
            }),
            tx_ctx: TxCtx::generate(),
        };
        session.start(&*self.kv).await?;
        Ok(session)
    }
}

/// One transaction session. See the module docs for the state machine and
/// locking discipline.
pub struct TxSession {
    inner: Mutex<SessionInner>,
    tx_ctx: TxCtx,
}

impl TxSession {
    /// The transaction context generated at creation.
    pub fn tx_ctx(&self) -> &TxCtx {
        &self.tx_ctx
    }

    async fn start(&self, kv: &dyn KeyValueStore) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Created {
            return Err(Error::internal("session state is misused"));
        }

        match kv.begin_tx().await {
            Ok(tx) => {
                inner.kv_tx = Some(tx);
                inner.state = SessionState::Active;
                Ok(())
            },
            Err(e) => {
                inner.state = SessionState::Ended;
                Err(e)
            },
        }
    }

    /// Writes a new row; fails with the KV duplicate-key sentinel when
    /// the key exists. No event is recorded on failure.
    pub async fn insert(&self, key: &Key, data: &TableData) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.validate()?;

        let packed = key.packed_parts();
        inner.tx()?.insert(key.table(), &packed, data).await?;

        let encoded = encode(data)?;
        let full = key.pack();
        inner.listener.on_set(OpType::Insert, key.table(), &full, Some(&encoded));
        Ok(())
    }

    /// Writes a row unconditionally.
    pub async fn replace(&self, key: &Key, data: &TableData) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.validate()?;

        let packed = key.packed_parts();
        inner.tx()?.replace(key.table(), &packed, data).await?;

        let encoded = encode(data)?;
        let full = key.pack();
        inner.listener.on_set(OpType::Replace, key.table(), &full, Some(&encoded));
        Ok(())
    }

    /// Reads the existing row, applies the caller's transformation and
    /// writes the result back. Returns the count of rows modified (0 when
    /// the key is absent, 1 otherwise).
    pub async fn update<F>(&self, key: &Key, mut apply: F) -> Result<i32>
    where
        F: FnMut(&TableData) -> Result<TableData> + Send,
    {
        let mut inner = self.inner.lock().await;
        inner.validate()?;

        let packed = key.packed_parts();
        let mut written: Option<TableData> = None;
        let mut wrapped = |old: &TableData| {
            let new = apply(old)?;
            written = Some(new.clone());
            Ok(new)
        };
        let modified = inner.tx()?.update(key.table(), &packed, &mut wrapped).await?;

        if modified > 0 {
            if let Some(new) = written {
                let encoded = encode(&new)?;
                let full = key.pack();
                inner.listener.on_set(OpType::Update, key.table(), &full, Some(&encoded));
            }
        }
        Ok(modified)
    }

    /// Removes a row; absent keys are not an error.
    pub async fn delete(&self, key: &Key) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.validate()?;

        let packed = key.packed_parts();
        inner.tx()?.delete(key.table(), &packed).await?;

        let full = key.pack();
        inner.listener.on_set(OpType::Delete, key.table(), &full, None);
        Ok(())
    }

    /// Returns a lazy, single-use cursor over the contiguous key range
    /// rooted at `key`: the whole table when `index_parts` is empty, the
    /// point or prefix implied by the partial tuple otherwise.
    pub async fn read(&self, key: &Key) -> Result<Box<dyn KvIterator>> {
        let mut inner = self.inner.lock().await;
        inner.validate()?;

        let packed = key.packed_parts();
        inner.tx()?.read(key.table(), &packed).await
    }

    /// Raw point read, for metadata.
    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock().await;
        inner.validate()?;
        inner.tx()?.get(key).await
    }

    /// Versionstamped-key passthrough, for metadata.
    pub async fn set_versionstamped_key(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.validate()?;
        inner.tx()?.set_versionstamped_key(key, value).await
    }

    /// Versionstamped-value passthrough, for metadata.
    pub async fn set_versionstamped_value(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.validate()?;
        inner.tx()?.set_versionstamped_value(key, value).await
    }

    /// Commits the KV transaction. The session is Ended afterwards, even
    /// when the commit itself fails.
    pub async fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Ended {
            return Err(Error::internal("session is gone"));
        }
        inner.state = SessionState::Ended;

        let Some(mut tx) = inner.kv_tx.take() else {
            return Err(Error::internal("session not started"));
        };
        tx.commit().await
    }

    /// Rolls the KV transaction back. The session is Ended afterwards.
    pub async fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Ended {
            return Err(Error::internal("session is gone"));
        }
        inner.state = SessionState::Ended;

        let Some(mut tx) = inner.kv_tx.take() else {
            return Err(Error::internal("session not started"));
        };
        tx.rollback().await
    }

    /// Drains the recorded mutation events. Permitted in any state: the
    /// post-commit hooks run after the session has Ended.
    pub async fn take_events(&self) -> Vec<Event> {
        self.inner.lock().await.listener.take_events()
    }

    /// Stages a database clone for DDL visibility inside this
    /// transaction.
    pub async fn stage_database(&self, db: Database) {
        self.inner.lock().await.ctx.stage_database(db);
    }

    /// The staged database clone, if any DDL ran in this transaction.
    pub async fn staged_database(&self) -> Option<Database> {
        self.inner.lock().await.ctx.staged_database().cloned()
    }
}

// Metadata records flow through the same session so that raced DDL is
// detected by the KV layer and metadata mutations stay transactional with
// the DDL that caused them.
#[async_trait]
impl MetaStore for TxSession {
    async fn insert_meta(&self, key: Key, data: TableData) -> Result<()> {
        self.insert(&key, &data).await
    }

    async fn replace_meta(&self, key: Key, data: TableData) -> Result<()> {
        self.replace(&key, &data).await
    }

    async fn delete_meta(&self, key: Key) -> Result<()> {
        self.delete(&key).await
    }
}
