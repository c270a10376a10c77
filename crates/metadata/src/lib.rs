//! Tenancy metadata for the folio document engine.
//!
//! The tenancy hierarchy is namespace → database → collection, each level
//! carrying a numeric dictionary id. Ids — never names — go into KV keys,
//! which keeps keys stable across renames and makes reverse lookup O(1).
//!
//! - [`SchemaFactory`] parses user schemas; [`Collection`] validates
//!   documents against them
//! - [`TenantManager`] caches the hierarchy, allocates dictionary ids and
//!   persists records through the transaction's [`MetaStore`] seam
//! - [`KeyEncoder`] encodes `(namespace, database, collection)` into the
//!   fixed 16-byte table prefix and decodes it back

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod encoder;
mod schema;
mod tenant;

pub use encoder::{KeyEncoder, TABLE_PREFIX_LEN};
pub use schema::{Collection, Field, FieldType, SchemaFactory, PRIMARY_KEY_INDEX_ID};
pub use tenant::{Database, MetaStore, Namespace, TenantManager};
