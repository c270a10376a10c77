//! Key-value store interfaces for the folio document engine.
//!
//! This crate defines the seam between the engine and the ordered,
//! transactional KV store underneath it:
//!
//! - Order-preserving tuple packing ([`tuple`]) so packed keys sort the
//!   same way their components do
//! - [`Key`], the (table prefix, index parts) pair the engine addresses
//!   rows by
//! - Mutation events and the transaction-scoped [`EventListener`]
//! - The [`KeyValueStore`] / [`KvTx`] / [`KvIterator`] traits consumed by
//!   the transaction layer
//! - [`MemKv`], a snapshot-isolated in-memory backend for tests and local
//!   runs

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod event;
mod key;
mod mem;
mod store;
pub mod tuple;

pub use event::{BufferingListener, Event, EventListener, NoopListener, OpType};
pub use key::Key;
pub use mem::MemKv;
pub use store::{ApplyFn, KeyValue, KeyValueStore, KvIterator, KvTx};
pub use tuple::TupleValue;
