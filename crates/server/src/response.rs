//! Responses and the streaming seam.

use async_trait::async_trait;
use folio_types::{Result, Timestamp};

/// Outcome status of a mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// DDL created an entity.
    Created,
    /// Documents were inserted.
    Inserted,
    /// Documents were replaced.
    Replaced,
    /// Rows were updated.
    Updated,
    /// Rows were deleted.
    Deleted,
    /// DDL dropped an entity.
    Dropped,
}

/// Description of one collection, for List/Describe responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescription {
    /// Collection name.
    pub collection: String,
    /// The user schema document, verbatim.
    pub schema: Vec<u8>,
}

/// Structured payload of a DDL read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    /// Collection names, sorted.
    ListCollections(Vec<String>),
    /// Database names, sorted.
    ListDatabases(Vec<String>),
    /// One collection's description.
    DescribeCollection(CollectionDescription),
    /// One database's description.
    DescribeDatabase {
        /// Database name.
        db: String,
        /// Its collections.
        collections: Vec<CollectionDescription>,
    },
}

/// Response of a non-streaming request.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Outcome status, for mutating requests.
    pub status: Option<Status>,
    /// Shared batch write time, for inserts/replaces.
    pub created_at: Option<Timestamp>,
    /// Update/delete time.
    pub updated_at: Option<Timestamp>,
    /// Rows actually modified by an update.
    pub modified_count: i32,
    /// DDL read payload.
    pub payload: Option<ResponsePayload>,
}

impl Response {
    /// A bare status response.
    pub fn with_status(status: Status) -> Self {
        Self { status: Some(status), ..Self::default() }
    }
}

/// One streamed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// The row's JSON document after projection.
    pub data: Vec<u8>,
    /// Row creation time.
    pub created_at: Option<Timestamp>,
    /// Row update time.
    pub updated_at: Option<Timestamp>,
    /// The raw KV key of the row; lets the client resume a scan.
    pub resume_token: Vec<u8>,
}

/// The transport's send half for streaming reads.
#[async_trait]
pub trait Streaming: Send {
    /// Sends one row to the client.
    async fn send(&mut self, response: ReadResponse) -> Result<()>;
}

/// Collects streamed rows into a vector; the test transport.
#[derive(Debug, Default)]
pub struct VecStreaming {
    /// Rows received so far.
    pub responses: Vec<ReadResponse>,
}

#[async_trait]
impl Streaming for VecStreaming {
    async fn send(&mut self, response: ReadResponse) -> Result<()> {
        self.responses.push(response);
        Ok(())
    }
}
