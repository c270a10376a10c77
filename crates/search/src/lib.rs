//! Search engine interfaces for the folio document engine.
//!
//! The engine treats the full-text search store as an eventually
//! consistent secondary: committed KV mutations are fanned out to it
//! post-commit with bounded retry. This crate defines that seam:
//!
//! - [`SearchStore`], the async trait the HTTP client implements
//! - Result and schema types mirroring the wire shapes
//! - [`SearchError`] with the HTTP-status mapping
//! - [`RetryPolicy`], the typed retry knob consumed by the indexer
//! - [`MemSearch`], an in-memory backend for tests

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod mem;
mod retry;
mod store;
mod types;

pub use error::SearchError;
pub use mem::MemSearch;
pub use retry::RetryPolicy;
pub use store::SearchStore;
pub use types::{
    FacetCount, IndexAction, IndexDocumentsOptions, SearchField, SearchHit, SearchResult,
    SearchSchema,
};
