//! Store, transaction and iterator traits.
//!
//! The engine consumes the KV store exclusively through these traits.
//! Keys are opaque bytes ordered lexicographically; the tuple packing in
//! [`crate::tuple`] is the order-preserving format that makes engine keys
//! obey that ordering.

use async_trait::async_trait;
use folio_types::{Error, Result, TableData};

/// A row returned by a KV iterator.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    /// The full raw KV key (table prefix plus packed index parts). Doubles
    /// as the client's resume token.
    pub key: Vec<u8>,
    /// The decoded stored value.
    pub data: TableData,
}

impl Default for KeyValue {
    fn default() -> Self {
        Self {
            key: Vec::new(),
            data: TableData::with_timestamps(folio_types::Timestamp::default(), None, Vec::new()),
        }
    }
}

/// Read-modify-write callback for [`KvTx::update`].
pub type ApplyFn<'a> = &'a mut (dyn FnMut(&TableData) -> Result<TableData> + Send);

/// Handle to the KV store; safe to share across tasks.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Begins a transaction. The returned transaction owns a consistent
    /// snapshot; writes are buffered until `commit`.
    async fn begin_tx(&self) -> Result<Box<dyn KvTx>>;
}

/// A single KV transaction.
///
/// Every mutation addresses a `(table, key)` pair where `key` is the
/// packed index-part bytes within the table.
#[async_trait]
pub trait KvTx: Send {
    /// Writes a new row. Fails with [`Error::DuplicateKey`] when the key
    /// is already visible to this transaction.
    async fn insert(&mut self, table: &[u8], key: &[u8], data: &TableData) -> Result<()>;

    /// Writes a row unconditionally.
    async fn replace(&mut self, table: &[u8], key: &[u8], data: &TableData) -> Result<()>;

    /// Reads the row, applies the caller's transformation, writes the
    /// result. Returns the number of rows modified: 0 when the key is
    /// absent, 1 otherwise.
    async fn update(&mut self, table: &[u8], key: &[u8], apply: ApplyFn<'_>) -> Result<i32>;

    /// Removes a row. Absent keys are not an error.
    async fn delete(&mut self, table: &[u8], key: &[u8]) -> Result<()>;

    /// Returns a lazy cursor over the contiguous range of keys beginning
    /// with `table || key`. An empty `key` scans the whole table. The
    /// cursor is detached from the transaction's lock; drive it to
    /// completion before issuing further operations.
    async fn read(&mut self, table: &[u8], key: &[u8]) -> Result<Box<dyn KvIterator>>;

    /// Raw point read of an arbitrary key, bypassing value decoding.
    async fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Writes `value` under a key whose versionstamp placeholder is filled
    /// in at commit.
    async fn set_versionstamped_key(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Writes a value whose versionstamp placeholder is filled in at
    /// commit.
    async fn set_versionstamped_value(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Commits the buffered writes. Fails with [`Error::Conflict`] when a
    /// concurrent transaction committed a written key first.
    async fn commit(&mut self) -> Result<()>;

    /// Discards the buffered writes.
    async fn rollback(&mut self) -> Result<()>;
}

/// Cursor over a key range.
///
/// Mirrors the row-reader contract: `next` fills the caller's row and
/// reports whether one was produced; a `false` answer may mean exhaustion
/// or an error, distinguished by [`KvIterator::err`].
pub trait KvIterator: Send {
    /// Advances to the next row.
    fn next(&mut self, row: &mut KeyValue) -> bool;

    /// Takes the error that stopped iteration, if any.
    fn err(&mut self) -> Option<Error>;
}
