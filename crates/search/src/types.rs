//! Wire shapes for the search store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema of a search collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSchema {
    /// Collection name, `"{ns}-{db}-{coll}"`.
    pub name: String,
    /// Indexed fields.
    pub fields: Vec<SearchField>,
}

/// One indexed field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchField {
    /// Field name.
    pub name: String,
    /// Engine-side type name (e.g. `"string"`, `"int64"`).
    #[serde(rename = "type")]
    pub field_type: String,
}

/// One matching document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The stored document, including its `id` field.
    pub document: Map<String, Value>,
}

/// A facet bucket for one field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetCount {
    /// Faceted field name.
    pub field_name: String,
    /// (value, occurrences) buckets.
    pub counts: Vec<(String, u64)>,
}

/// One page of results for one collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching documents on this page.
    pub hits: Vec<SearchHit>,
    /// Facet buckets accompanying the page.
    pub facet_counts: Vec<FacetCount>,
}

impl SearchResult {
    /// Builds a page from hit documents, without facets.
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        Self { hits, facet_counts: Vec::new() }
    }
}

/// Bulk indexing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAction {
    /// Create or fully replace by id.
    Upsert,
    /// Partially update an existing document by id.
    Update,
}

/// Options for a bulk indexing call.
#[derive(Debug, Clone, Copy)]
pub struct IndexDocumentsOptions {
    /// What to do with each document.
    pub action: IndexAction,
    /// Engine-side ingestion batch size.
    pub batch_size: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&IndexAction::Upsert).unwrap(), r#""upsert""#);
        assert_eq!(serde_json::to_string(&IndexAction::Update).unwrap(), r#""update""#);
    }

    #[test]
    fn test_field_type_rename() {
        let field = SearchField { name: "K1".to_string(), field_type: "string".to_string() };
        assert_eq!(serde_json::to_string(&field).unwrap(), r#"{"name":"K1","type":"string"}"#);
    }
}
