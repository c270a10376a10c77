//! Unified error type for folio.
//!
//! Every layer of the engine reports failures through [`Error`]. The
//! variants map one-to-one onto the error codes surfaced to clients, plus
//! two KV-level sentinels (`DuplicateKey`, `Conflict`) that the query
//! runners translate before a response leaves the engine.

use snafu::{Location, Snafu};

/// Unified result type for engine operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type for engine operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Malformed request: missing required field, empty documents or
    /// filter, missing primary-key field in a document.
    #[snafu(display("Invalid argument: {message}"))]
    InvalidArgument {
        /// Error description.
        message: String,
    },

    /// Database or collection absent.
    #[snafu(display("Not found: {message}"))]
    NotFound {
        /// Error description.
        message: String,
    },

    /// Duplicate primary key on insert, duplicate database or collection
    /// on create.
    #[snafu(display("Already exists: {message}"))]
    AlreadyExists {
        /// Error description.
        message: String,
    },

    /// Race detected, e.g. concurrent DDL allocating the same dictionary
    /// entry. Retryable by the client.
    #[snafu(display("Aborted: {message}"))]
    Aborted {
        /// Error description.
        message: String,
    },

    /// Session misuse, decode failure, or an unexpected KV error.
    #[snafu(display("Internal error at {location}: {message}"))]
    Internal {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// Request shape does not match any dispatchable variant.
    #[snafu(display("Unknown: {message}"))]
    Unknown {
        /// Error description.
        message: String,
    },

    /// KV sentinel: the key already exists. Runners rewrap this as
    /// [`Error::AlreadyExists`] (insert) or [`Error::Aborted`] (raced DDL).
    #[snafu(display("duplicate key"))]
    DuplicateKey,

    /// KV sentinel: optimistic concurrency detected a conflicting commit.
    /// Retryable.
    #[snafu(display("transaction conflict, retry"))]
    Conflict,
}

/// Client-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed request.
    InvalidArgument,
    /// Entity absent.
    NotFound,
    /// Entity already present.
    AlreadyExists,
    /// Retryable race.
    Aborted,
    /// Engine-internal failure.
    Internal,
    /// Undispatchable request.
    Unknown,
}

impl Error {
    /// Returns the client-visible code for this error.
    ///
    /// The KV sentinels report the code a client would observe after the
    /// runners rewrap them.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::AlreadyExists { .. } | Error::DuplicateKey => ErrorCode::AlreadyExists,
            Error::Aborted { .. } | Error::Conflict => ErrorCode::Aborted,
            Error::Internal { .. } => ErrorCode::Internal,
            Error::Unknown { .. } => ErrorCode::Unknown,
        }
    }

    /// Builds an `InvalidArgument` error from a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument { message: message.into() }
    }

    /// Builds a `NotFound` error from a message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound { message: message.into() }
    }

    /// Builds an `AlreadyExists` error from a message.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Error::AlreadyExists { message: message.into() }
    }

    /// Builds an `Aborted` error from a message.
    pub fn aborted(message: impl Into<String>) -> Self {
        Error::Aborted { message: message.into() }
    }

    /// Builds an `Internal` error from a message, capturing the caller's
    /// location.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Error::Internal {
            message: message.into(),
            location: Location::new(loc.file(), loc.line(), loc.column()),
        }
    }

    /// Builds an `Unknown` error from a message.
    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown { message: message.into() }
    }
}
