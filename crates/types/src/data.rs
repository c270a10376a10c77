//! Stored value types and the type-tagged value codec.
//!
//! Every value written to the KV store is a [`TableData`] record serialized
//! behind a single [`DataType`] lead byte. The lead byte lets the format
//! evolve: a future record type gets a new tag without disturbing existing
//! blobs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::error::Error;

/// Encoding id for raw JSON documents carried in [`TableData::raw`].
pub const JSON_ENCODING: i32 = 1;

/// Tag byte identifying the record type of a stored blob.
///
/// Do not reorder: the discriminant is the first byte of every stored
/// value and is read back by [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    /// Reserved zero value; never stored.
    Unknown = 0,
    /// A [`TableData`] record.
    TableData = 1,
}

/// Engine-generated creation/update time, never produced by clients.
///
/// Ordering is lexicographic on `(seconds, nanoseconds)`, which matches
/// chronological order for timestamps produced within one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the Unix epoch, UTC.
    pub seconds: i64,
    /// Nanosecond remainder within the second.
    pub nanoseconds: i64,
}

impl Timestamp {
    /// Captures the current UTC time.
    pub fn now() -> Self {
        let ts = Utc::now();
        Self { seconds: ts.timestamp(), nanoseconds: i64::from(ts.timestamp_subsec_nanos()) }
    }

    /// Renders the timestamp as RFC 3339, for responses and logs.
    pub fn to_rfc3339(self) -> String {
        let nanos = u32::try_from(self.nanoseconds).unwrap_or(0);
        match chrono::DateTime::from_timestamp(self.seconds, nanos) {
            Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            None => String::new(),
        }
    }
}

/// A stored document row: the caller's raw payload wrapped with engine
/// timestamps and an encoding id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    /// Set when the row is first written; shared by all documents of a
    /// write batch.
    pub created_at: Timestamp,
    /// Set on every update; absent on a freshly inserted row.
    pub updated_at: Option<Timestamp>,
    /// Payload encoding, [`JSON_ENCODING`] for JSON.
    pub encoding: i32,
    /// The caller's document, byte-for-byte. Stored in the msgpack bin
    /// format rather than an integer array.
    #[serde(with = "serde_bytes")]
    pub raw: Vec<u8>,
}

impl TableData {
    /// Wraps a raw JSON document with `created_at = now`.
    pub fn new(raw: Vec<u8>) -> Self {
        Self { created_at: Timestamp::now(), updated_at: None, encoding: JSON_ENCODING, raw }
    }

    /// Wraps a raw document with explicit timestamps; used by writes that
    /// share one batch timestamp and by updates that preserve the original
    /// creation time.
    pub fn with_timestamps(
        created_at: Timestamp,
        updated_at: Option<Timestamp>,
        raw: Vec<u8>,
    ) -> Self {
        Self { created_at, updated_at, encoding: JSON_ENCODING, raw }
    }

    /// Wraps a raw document with an explicit encoding id.
    pub fn with_encoding(raw: Vec<u8>, encoding: i32) -> Self {
        Self { created_at: Timestamp::now(), updated_at: None, encoding, raw }
    }
}

/// Errors produced by the value codec.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// Serializing a record failed.
    #[snafu(display("Encoding failed: {source}"))]
    Encode {
        /// The underlying msgpack error.
        source: rmp_serde::encode::Error,
    },

    /// Deserializing a record failed.
    #[snafu(display("Decoding failed: {source}"))]
    Decode {
        /// The underlying msgpack error.
        source: rmp_serde::decode::Error,
    },

    /// The blob is empty; no lead byte to dispatch on.
    #[snafu(display("empty value"))]
    Empty,

    /// The lead byte names no known record type.
    #[snafu(display("unable to decode type {tag}"))]
    UnknownType {
        /// The offending lead byte.
        tag: u8,
    },
}

impl From<CodecError> for Error {
    #[track_caller]
    fn from(err: CodecError) -> Self {
        Error::internal(err.to_string())
    }
}

/// Encodes a record to the bytes stored as a KV value: the [`DataType`]
/// lead byte followed by the self-describing msgpack encoding of the
/// record.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode(data: &TableData) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![DataType::TableData as u8];
    data.serialize(&mut rmp_serde::Serializer::new(&mut buf).with_struct_map())
        .context(EncodeSnafu)?;
    Ok(buf)
}

/// Decodes bytes returned by the KV store back into a [`TableData`],
/// dispatching on the lead byte.
///
/// # Errors
///
/// Returns [`CodecError::Empty`] on an empty blob,
/// [`CodecError::UnknownType`] on an unrecognized lead byte, and
/// [`CodecError::Decode`] if the record body is malformed.
pub fn decode(bytes: &[u8]) -> Result<TableData, CodecError> {
    let Some((&tag, body)) = bytes.split_first() else {
        return Err(CodecError::Empty);
    };

    match tag {
        t if t == DataType::TableData as u8 => rmp_serde::from_slice(body).context(DecodeSnafu),
        other => Err(CodecError::UnknownType { tag: other }),
    }
}
