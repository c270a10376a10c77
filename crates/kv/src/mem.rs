//! In-memory transactional backend.
//!
//! Snapshot isolation with optimistic concurrency: a transaction reads a
//! snapshot taken at begin, buffers its writes, and commit fails with a
//! retryable conflict when any written key was committed by someone else
//! after the snapshot. Used by the test suites and for local runs; the
//! production driver is an external collaborator behind the same traits.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use folio_types::{decode, encode, Error, Result, TableData};
use parking_lot::RwLock;

use crate::store::{ApplyFn, KeyValue, KeyValueStore, KvIterator, KvTx};

#[derive(Default)]
struct MemState {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    // Commit sequence that last touched each key, for conflict detection.
    versions: BTreeMap<Vec<u8>, u64>,
    commit_seq: u64,
}

/// Shared in-memory KV store.
#[derive(Clone, Default)]
pub struct MemKv {
    state: Arc<RwLock<MemState>>,
}

impl MemKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys, across all tables.
    pub fn committed_len(&self) -> usize {
        self.state.read().data.len()
    }
}

#[async_trait]
impl KeyValueStore for MemKv {
    async fn begin_tx(&self) -> Result<Box<dyn KvTx>> {
        let state = self.state.read();
        Ok(Box::new(MemTx {
            store: Arc::clone(&self.state),
            snapshot: state.data.clone(),
            snapshot_seq: state.commit_seq,
            writes: BTreeMap::new(),
            versionstamped: Vec::new(),
            done: false,
        }))
    }
}

struct MemTx {
    store: Arc<RwLock<MemState>>,
    snapshot: BTreeMap<Vec<u8>, Vec<u8>>,
    snapshot_seq: u64,
    // None marks a tombstone.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    // (key, value, stamp_key): placeholder suffix substituted at commit.
    versionstamped: Vec<(Vec<u8>, Vec<u8>, bool)>,
    done: bool,
}

impl MemTx {
    fn check_open(&self) -> Result<()> {
        if self.done {
            return Err(Error::internal("transaction is closed"));
        }
        Ok(())
    }

    fn view(&self, full_key: &[u8]) -> Option<&[u8]> {
        match self.writes.get(full_key) {
            Some(Some(v)) => Some(v.as_slice()),
            Some(None) => None,
            None => self.snapshot.get(full_key).map(Vec::as_slice),
        }
    }

    fn full_key(table: &[u8], key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(table.len() + key.len());
        full.extend_from_slice(table);
        full.extend_from_slice(key);
        full
    }
}

#[async_trait]
impl KvTx for MemTx {
    async fn insert(&mut self, table: &[u8], key: &[u8], data: &TableData) -> Result<()> {
        self.check_open()?;
        let full = Self::full_key(table, key);
        if self.view(&full).is_some() {
            return Err(Error::DuplicateKey);
        }
        let encoded = encode(data)?;
        self.writes.insert(full, Some(encoded));
        Ok(())
    }

    async fn replace(&mut self, table: &[u8], key: &[u8], data: &TableData) -> Result<()> {
        self.check_open()?;
        let full = Self::full_key(table, key);
        let encoded = encode(data)?;
        self.writes.insert(full, Some(encoded));
        Ok(())
    }

    async fn update(&mut self, table: &[u8], key: &[u8], apply: ApplyFn<'_>) -> Result<i32> {
        self.check_open()?;
        let full = Self::full_key(table, key);
        let Some(existing) = self.view(&full) else {
            return Ok(0);
        };
        let decoded = decode(existing)?;
        let updated = apply(&decoded)?;
        let encoded = encode(&updated)?;
        self.writes.insert(full, Some(encoded));
        Ok(1)
    }

    async fn delete(&mut self, table: &[u8], key: &[u8]) -> Result<()> {
        self.check_open()?;
        let full = Self::full_key(table, key);
        self.writes.insert(full, None);
        Ok(())
    }

    async fn read(&mut self, table: &[u8], key: &[u8]) -> Result<Box<dyn KvIterator>> {
        self.check_open()?;
        let prefix = Self::full_key(table, key);

        // Merge snapshot and buffered writes over the prefix; the result
        // is an owned cursor safe to consume outside any lock.
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .snapshot
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, w) in self.writes.range(prefix.clone()..) {
            if !k.starts_with(&prefix) {
                break;
            }
            match w {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                },
                None => {
                    merged.remove(k);
                },
            }
        }

        Ok(Box::new(MemIterator { rows: merged.into_iter().collect(), err: None }))
    }

    async fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.view(key).map(<[u8]>::to_vec))
    }

    async fn set_versionstamped_key(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        self.versionstamped.push((key.to_vec(), value.to_vec(), true));
        Ok(())
    }

    async fn set_versionstamped_value(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        self.versionstamped.push((key.to_vec(), value.to_vec(), false));
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        self.done = true;

        let mut state = self.store.write();
        for key in self.writes.keys() {
            if state.versions.get(key).copied().unwrap_or(0) > self.snapshot_seq {
                return Err(Error::Conflict);
            }
        }

        state.commit_seq += 1;
        let seq = state.commit_seq;
        for (key, write) in std::mem::take(&mut self.writes) {
            match write {
                Some(value) => {
                    state.data.insert(key.clone(), value);
                },
                None => {
                    state.data.remove(&key);
                },
            }
            state.versions.insert(key, seq);
        }

        // Versionstamped writes get the commit sequence spliced over the
        // 8-byte placeholder at the tail of the stamped side.
        for (mut key, mut value, stamp_key) in std::mem::take(&mut self.versionstamped) {
            let stamp = seq.to_be_bytes();
            let target = if stamp_key { &mut key } else { &mut value };
            let len = target.len();
            if len >= stamp.len() {
                target[len - stamp.len()..].copy_from_slice(&stamp);
            }
            state.data.insert(key.clone(), value);
            state.versions.insert(key, seq);
        }

        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        self.done = true;
        self.writes.clear();
        self.versionstamped.clear();
        Ok(())
    }
}

struct MemIterator {
    rows: std::collections::VecDeque<(Vec<u8>, Vec<u8>)>,
    err: Option<Error>,
}

impl KvIterator for MemIterator {
    fn next(&mut self, row: &mut KeyValue) -> bool {
        if self.err.is_some() {
            return false;
        }
        let Some((key, value)) = self.rows.pop_front() else {
            return false;
        };
        match decode(&value) {
            Ok(data) => {
                row.key = key;
                row.data = data;
                true
            },
            Err(e) => {
                self.err = Some(e.into());
                false
            },
        }
    }

    fn err(&mut self) -> Option<Error> {
        self.err.take()
    }
}
