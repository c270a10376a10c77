//! Query helpers consumed by the query runners.
//!
//! - [`filter`]: parse request filters and resolve them to primary-key
//!   point lookups (or report that only a full scan can answer them)
//! - [`update`]: parse update operator documents (`$set`) and merge them
//!   onto stored rows
//! - [`read`]: build the projection applied to rows before streaming

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod filter;
pub mod read;
pub mod update;

pub use filter::{is_full_collection_scan, Filter, KeyBuilder};
pub use read::FieldFactory;
pub use update::FieldOperatorFactory;
