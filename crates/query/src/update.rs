//! Update operator documents.
//!
//! An update request carries `{ "$set": { field: value, ... } }`. The
//! factory parses the operators once, exposes the operand for
//! pre-validation, and merges it onto stored rows.

use folio_types::{Error, Result};
use serde_json::Value;

/// Parsed update operators.
#[derive(Debug, Clone)]
pub struct FieldOperatorFactory {
    set_doc: Value,
}

impl FieldOperatorFactory {
    /// Parses an update operator document.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on malformed JSON, an empty document, an unknown
    /// operator, or a `$set` operand that is not an object.
    pub fn build(fields: &[u8]) -> Result<Self> {
        let parsed: Value = serde_json::from_slice(fields).map_err(|e| {
            Error::invalid_argument(format!("update document is not valid JSON: {e}"))
        })?;
        let obj = parsed
            .as_object()
            .ok_or_else(|| Error::invalid_argument("update document must be a JSON object"))?;
        if obj.is_empty() {
            return Err(Error::invalid_argument("empty update document"));
        }

        let mut set_doc = None;
        for (op, operand) in obj {
            match op.as_str() {
                "$set" => {
                    if !operand.is_object() {
                        return Err(Error::invalid_argument("$set expects an object"));
                    }
                    set_doc = Some(operand.clone());
                },
                other => {
                    return Err(Error::invalid_argument(format!(
                        "unknown update operator '{other}'"
                    )));
                },
            }
        }

        let set_doc =
            set_doc.ok_or_else(|| Error::invalid_argument("update document needs $set"))?;
        Ok(Self { set_doc })
    }

    /// The `$set` operand, for validating the incoming values against the
    /// collection schema before any row is touched.
    pub fn set_document(&self) -> &Value {
        &self.set_doc
    }

    /// Merges the operators onto an existing raw document: the `$set`
    /// fields are overwritten, everything else is preserved.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the stored document is not a JSON object
    /// (which would indicate a corrupted row).
    pub fn merge(&self, existing: &[u8]) -> Result<Vec<u8>> {
        let mut doc: Value = serde_json::from_slice(existing).map_err(|e| {
            Error::invalid_argument(format!("stored document is not valid JSON: {e}"))
        })?;
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| Error::invalid_argument("stored document must be a JSON object"))?;

        if let Some(set) = self.set_doc.as_object() {
            for (field, value) in set {
                obj.insert(field.clone(), value.clone());
            }
        }

        serde_json::to_vec(&doc).map_err(|e| Error::internal(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_merge_overwrites_only_named_fields() {
        let factory = FieldOperatorFactory::build(br#"{"$set":{"D1":"1000"}}"#).expect("build");
        let merged = factory.merge(br#"{"K1":"vK1","K2":2,"D1":"vD2"}"#).expect("merge");
        let doc: Value = serde_json::from_slice(&merged).expect("json");
        assert_eq!(doc, json!({"K1":"vK1","K2":2,"D1":"1000"}));
    }

    #[test]
    fn test_merge_adds_new_fields() {
        let factory = FieldOperatorFactory::build(br#"{"$set":{"D2":true}}"#).expect("build");
        let merged = factory.merge(br#"{"K1":"a"}"#).expect("merge");
        let doc: Value = serde_json::from_slice(&merged).expect("json");
        assert_eq!(doc, json!({"K1":"a","D2":true}));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(FieldOperatorFactory::build(b"{}").is_err());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = FieldOperatorFactory::build(br#"{"$inc":{"K2":1}}"#).unwrap_err();
        assert!(err.to_string().contains("$inc"));
    }

    #[test]
    fn test_non_object_set_rejected() {
        assert!(FieldOperatorFactory::build(br#"{"$set":[1,2]}"#).is_err());
    }

    #[test]
    fn test_set_document_exposed() {
        let factory = FieldOperatorFactory::build(br#"{"$set":{"x":1}}"#).expect("build");
        assert_eq!(factory.set_document(), &json!({"x":1}));
    }
}
