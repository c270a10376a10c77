//! Row readers: one cursor shape over two row sources.
//!
//! Reads are answered either from the KV store (a list of primary keys,
//! each expanded to its contiguous range) or from the search engine
//! (paginated hits). Both sources sit behind [`RowReader`], which mirrors
//! the KV iterator contract: `next_row` fills the caller's row, `err`
//! explains a `false` answer.

use std::sync::Arc;

use folio_kv::{Key, KeyValue, KvIterator};
use folio_search::{SearchHit, SearchStore};
use folio_types::{Error, Result, TableData, Timestamp};
use serde_json::Value;

use crate::transaction::TxSession;

/// Search pagination size. A page with fewer hits than this is the last.
pub const SEARCH_PER_PAGE: usize = 5;

/// One row produced by a reader.
#[derive(Debug, Clone)]
pub struct Row {
    /// The row's key: the raw KV key, or the search document id.
    pub key: Vec<u8>,
    /// The row's data.
    pub data: TableData,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            key: Vec::new(),
            data: TableData::with_timestamps(Timestamp::default(), None, Vec::new()),
        }
    }
}

/// A cursor over one of the two row sources.
pub enum RowReader<'a> {
    /// Rows from the KV store.
    Database(DatabaseRowReader<'a>),
    /// Rows from the search engine.
    Search(SearchRowReader),
}

impl RowReader<'_> {
    /// Advances to the next row.
    pub async fn next_row(&mut self, row: &mut Row) -> bool {
        match self {
            RowReader::Database(reader) => reader.next_row(row).await,
            RowReader::Search(reader) => reader.next_row(row).await,
        }
    }

    /// Takes the error that stopped iteration, if any.
    pub fn err(&mut self) -> Option<Error> {
        match self {
            RowReader::Database(reader) => reader.err(),
            RowReader::Search(reader) => reader.err(),
        }
    }
}

/// Chains KV cursors over a list of keys: a cursor per key, advanced to
/// the next key on exhaustion.
pub struct DatabaseRowReader<'a> {
    session: &'a TxSession,
    keys: Vec<Key>,
    next_key: usize,
    iterator: Option<Box<dyn KvIterator>>,
    err: Option<Error>,
}

impl<'a> DatabaseRowReader<'a> {
    /// Creates a reader over the given keys.
    pub fn new(session: &'a TxSession, keys: Vec<Key>) -> Self {
        Self { session, keys, next_key: 0, iterator: None, err: None }
    }

    /// Advances to the next row, opening per-key cursors as needed.
    pub async fn next_row(&mut self, row: &mut Row) -> bool {
        if self.err.is_some() {
            return false;
        }

        let mut kv_row = KeyValue::default();
        loop {
            match self.iterator.as_mut() {
                Some(it) => {
                    if it.next(&mut kv_row) {
                        row.key = kv_row.key;
                        row.data = kv_row.data;
                        return true;
                    }
                    if let Some(e) = it.err() {
                        self.err = Some(e);
                        return false;
                    }
                    self.iterator = None;
                },
                None => {
                    if self.next_key >= self.keys.len() {
                        return false;
                    }
                    match self.session.read(&self.keys[self.next_key]).await {
                        Ok(it) => self.iterator = Some(it),
                        Err(e) => {
                            self.err = Some(e);
                            return false;
                        },
                    }
                    self.next_key += 1;
                },
            }
        }
    }

    /// Takes the error that stopped iteration, if any.
    pub fn err(&mut self) -> Option<Error> {
        self.err.take()
    }
}

struct SearchPage {
    idx: usize,
    hits: Vec<SearchHit>,
}

impl SearchPage {
    // Unpacks the next hit back into the canonical document shape: the
    // injected id becomes the row key and is stripped from the document.
    fn read_row(&mut self, row: &mut Row) -> Result<bool> {
        while self.idx < self.hits.len() {
            let hit = &self.hits[self.idx];
            self.idx += 1;

            let Some(id) = hit.document.get("id").and_then(Value::as_str) else {
                return Err(Error::internal("search hit is missing a string id"));
            };
            let id = id.to_string();

            let mut document = hit.document.clone();
            document.remove("id");
            let data = serde_json::to_vec(&Value::Object(document))
                .map_err(|e| Error::internal(e.to_string()))?;

            row.key = id.into_bytes();
            row.data = TableData::with_timestamps(Timestamp::default(), None, data);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Paginates over the search engine, [`SEARCH_PER_PAGE`] hits at a time.
pub struct SearchRowReader {
    store: Arc<dyn SearchStore>,
    table: String,
    filter: String,
    page_no: usize,
    page: Option<SearchPage>,
    last_page: bool,
    err: Option<Error>,
}

impl SearchRowReader {
    /// Creates a reader over one search collection with a pre-built
    /// search filter expression.
    pub fn new(store: Arc<dyn SearchStore>, table: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            filter: filter.into(),
            page_no: 1,
            page: None,
            last_page: false,
            err: None,
        }
    }

    async fn read_page(&mut self) -> Result<bool> {
        let results =
            self.store.search(&self.table, &self.filter, self.page_no, SEARCH_PER_PAGE).await?;

        let hits: Vec<SearchHit> = results.into_iter().flat_map(|r| r.hits).collect();
        let last = hits.len() < SEARCH_PER_PAGE;
        self.page = Some(SearchPage { idx: 0, hits });
        Ok(last)
    }

    /// Advances to the next row, fetching pages as needed.
    pub async fn next_row(&mut self, row: &mut Row) -> bool {
        if self.err.is_some() {
            return false;
        }

        loop {
            if self.page.is_none() {
                match self.read_page().await {
                    Ok(last) => self.last_page = last,
                    Err(e) => {
                        self.err = Some(e);
                        return false;
                    },
                }
            }
            let Some(page) = self.page.as_mut() else {
                return false;
            };

            match page.read_row(row) {
                Ok(true) => return true,
                Ok(false) => {},
                Err(e) => {
                    self.err = Some(e);
                    return false;
                },
            }

            if self.last_page {
                return false;
            }
            self.page = None;
            self.page_no += 1;
        }
    }

    /// Takes the error that stopped iteration, if any.
    pub fn err(&mut self) -> Option<Error> {
        self.err.take()
    }
}
