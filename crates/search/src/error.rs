//! Search store errors.

use snafu::Snafu;

use folio_types::Error;

/// Errors surfaced by a search store implementation.
#[derive(Debug, Snafu)]
pub enum SearchError {
    /// The entity (collection or document) already exists. HTTP 409.
    #[snafu(display("entity already exists"))]
    Duplicate,

    /// The entity is absent. HTTP 404.
    #[snafu(display("not found"))]
    NotFound,

    /// The engine rejected a bulk ingestion.
    #[snafu(display("failed to index documents: {message}"))]
    Indexing {
        /// Engine-reported reason.
        message: String,
    },

    /// Anything else the engine reported.
    #[snafu(display("search engine error (status {status}): {message}"))]
    Unhandled {
        /// HTTP status code.
        status: u16,
        /// Engine-reported reason.
        message: String,
    },
}

impl SearchError {
    /// Maps an HTTP status to the engine's error taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            409 => SearchError::Duplicate,
            404 => SearchError::NotFound,
            other => SearchError::Unhandled { status: other, message: message.into() },
        }
    }
}

impl From<SearchError> for Error {
    #[track_caller]
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Duplicate => Error::already_exists("search entity already exists"),
            SearchError::NotFound => Error::not_found("search entity not found"),
            other => Error::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use folio_types::ErrorCode;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(SearchError::from_status(409, ""), SearchError::Duplicate));
        assert!(matches!(SearchError::from_status(404, ""), SearchError::NotFound));
        assert!(matches!(
            SearchError::from_status(500, "boom"),
            SearchError::Unhandled { status: 500, .. }
        ));
    }

    #[test]
    fn test_unified_conversion() {
        let err: Error = SearchError::from_status(409, "").into();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        let err: Error = SearchError::from_status(404, "").into();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err: Error = SearchError::Indexing { message: "bad doc".to_string() }.into();
        assert_eq!(err.code(), ErrorCode::Internal);
    }
}
