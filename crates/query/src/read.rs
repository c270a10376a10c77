//! Read projection.
//!
//! A read request may name the fields it wants back:
//! `{ "f": true, ... }` keeps exactly the named fields,
//! `{ "f": false, ... }` drops them, and an empty document streams rows
//! unchanged.

use std::collections::BTreeSet;

use folio_types::{Error, Result};
use serde_json::Value;

enum Projection {
    Identity,
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

/// Applies the request's field selection to each streamed row.
pub struct FieldFactory {
    projection: Projection,
}

impl FieldFactory {
    /// Parses a field-selection document.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on malformed JSON, non-boolean selections, or a
    /// mix of include and exclude selections.
    pub fn build(fields: &[u8]) -> Result<Self> {
        if fields.is_empty() {
            return Ok(Self { projection: Projection::Identity });
        }

        let parsed: Value = serde_json::from_slice(fields).map_err(|e| {
            Error::invalid_argument(format!("fields document is not valid JSON: {e}"))
        })?;
        let obj = parsed
            .as_object()
            .ok_or_else(|| Error::invalid_argument("fields document must be a JSON object"))?;
        if obj.is_empty() {
            return Ok(Self { projection: Projection::Identity });
        }

        let mut included = BTreeSet::new();
        let mut excluded = BTreeSet::new();
        for (field, selection) in obj {
            match selection.as_bool() {
                Some(true) => {
                    included.insert(field.clone());
                },
                Some(false) => {
                    excluded.insert(field.clone());
                },
                None => {
                    return Err(Error::invalid_argument(format!(
                        "field selection for '{field}' must be a boolean"
                    )));
                },
            }
        }

        match (included.is_empty(), excluded.is_empty()) {
            (false, true) => Ok(Self { projection: Projection::Include(included) }),
            (true, false) => Ok(Self { projection: Projection::Exclude(excluded) }),
            _ => Err(Error::invalid_argument(
                "fields document cannot mix included and excluded fields",
            )),
        }
    }

    /// Projects one raw document.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the stored document is not a JSON object.
    pub fn apply(&self, raw: &[u8]) -> Result<Vec<u8>> {
        if matches!(self.projection, Projection::Identity) {
            return Ok(raw.to_vec());
        }

        let doc: Value = serde_json::from_slice(raw).map_err(|e| {
            Error::invalid_argument(format!("stored document is not valid JSON: {e}"))
        })?;
        let obj = doc
            .as_object()
            .ok_or_else(|| Error::invalid_argument("stored document must be a JSON object"))?;

        let projected: serde_json::Map<String, Value> = match &self.projection {
            Projection::Include(fields) => obj
                .iter()
                .filter(|(k, _)| fields.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Projection::Exclude(fields) => obj
                .iter()
                .filter(|(k, _)| !fields.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Projection::Identity => unreachable!("handled above"),
        };

        serde_json::to_vec(&Value::Object(projected)).map_err(|e| Error::internal(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use serde_json::json;

    use super::*;

    const DOC: &[u8] = br#"{"K1":"a","K2":1,"D1":"x"}"#;

    fn applied(factory: &FieldFactory) -> Value {
        serde_json::from_slice(&factory.apply(DOC).expect("apply")).expect("json")
    }

    #[test]
    fn test_identity_on_empty() {
        let factory = FieldFactory::build(b"").expect("build");
        assert_eq!(factory.apply(DOC).expect("apply"), DOC);
        let factory = FieldFactory::build(b"{}").expect("build");
        assert_eq!(factory.apply(DOC).expect("apply"), DOC);
    }

    #[test]
    fn test_include_projection() {
        let factory = FieldFactory::build(br#"{"K1":true,"D1":true}"#).expect("build");
        assert_eq!(applied(&factory), json!({"K1":"a","D1":"x"}));
    }

    #[test]
    fn test_exclude_projection() {
        let factory = FieldFactory::build(br#"{"D1":false}"#).expect("build");
        assert_eq!(applied(&factory), json!({"K1":"a","K2":1}));
    }

    #[test]
    fn test_mixed_selection_rejected() {
        assert!(FieldFactory::build(br#"{"K1":true,"D1":false}"#).is_err());
    }

    #[test]
    fn test_non_boolean_selection_rejected() {
        assert!(FieldFactory::build(br#"{"K1":1}"#).is_err());
    }
}
