//! The folio engine core.
//!
//! This crate wires the write and read pipeline together:
//!
//! - [`TxManager`] / [`TxSession`]: the per-transaction session state
//!   machine over the KV store, with mutation-event capture
//! - Query runners ([`QueryRunnerFactory`]): one runner per request kind,
//!   orchestrating schema lookup, key building, execution and streaming
//! - [`RowReader`]: a uniform cursor over KV key ranges and paginated
//!   search results
//! - [`SearchIndexer`]: the post-commit hook that fans committed
//!   mutations out to the search store with bounded retry
//! - [`execute`]: run-with-transaction glue used by the host

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod executor;
mod request;
mod response;
mod row_reader;
mod runner;
mod search_indexer;
mod transaction;

pub use executor::{execute, ExecuteOutcome};
pub use request::{
    CreateDatabaseRequest, CreateOrUpdateCollectionRequest, DeleteRequest,
    DescribeCollectionRequest, DescribeDatabaseRequest, DropCollectionRequest,
    DropDatabaseRequest, InsertRequest, ListCollectionsRequest, ListDatabasesRequest,
    ReadOptions, ReadRequest, ReplaceRequest, UpdateRequest,
};
pub use response::{
    CollectionDescription, ReadResponse, Response, ResponsePayload, Status, Streaming,
    VecStreaming,
};
pub use row_reader::{DatabaseRowReader, Row, RowReader, SearchRowReader, SEARCH_PER_PAGE};
pub use runner::{
    BaseQueryRunner, CollectionQueryRunner, DatabaseQueryRunner, DeleteQueryRunner,
    InsertQueryRunner, QueryRunner, QueryRunnerFactory, ReplaceQueryRunner,
    StreamingQueryRunner, Tenant, UpdateQueryRunner,
};
pub use search_indexer::{NoopTxListener, SearchIndexer, TxListener};
pub use transaction::{SessionCtx, TxCtx, TxManager, TxSession};
