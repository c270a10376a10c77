//! Core types for the folio document engine.
//!
//! This crate is the dependency root of the workspace and provides:
//!
//! - [`Timestamp`] and [`TableData`], the value types stored in the KV store
//! - The type-tagged value codec ([`encode`] / [`decode`])
//! - The unified [`Error`] type shared by every layer
//! - Engine configuration ([`EngineConfig`])

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod data;
mod error;

pub use config::{EngineConfig, IndexerConfig};
pub use data::{decode, encode, CodecError, DataType, TableData, Timestamp, JSON_ENCODING};
pub use error::{Error, ErrorCode, Result};
