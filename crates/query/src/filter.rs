//! Request filters and the filter→keys builder.
//!
//! A filter either resolves to equality on every primary-key field —
//! possibly disjoined via `$or`, yielding one key per disjunct — or the
//! collection must be answered by a full scan. The builder never
//! fabricates keys; the caller supplies the composer closure that turns
//! primary-key parts into an encoded key.

use std::collections::BTreeMap;

use folio_kv::{Key, TupleValue};
use folio_metadata::Field;
use folio_types::{Error, Result};
use serde_json::Value;

/// A parsed filter node.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`.
    Eq {
        /// Field name.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// All sub-filters hold.
    And(Vec<Filter>),
    /// Any sub-filter holds.
    Or(Vec<Filter>),
}

impl Filter {
    /// Parses a filter document into a conjunction of filter nodes.
    ///
    /// Bare `{ "f": v, ... }` entries are equalities; `"$and"` / `"$or"`
    /// take arrays of sub-filters.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on malformed JSON or an unknown `$` operator.
    pub fn parse(raw: &[u8]) -> Result<Vec<Filter>> {
        let parsed: Value = serde_json::from_slice(raw)
            .map_err(|e| Error::invalid_argument(format!("filter is not valid JSON: {e}")))?;
        Self::parse_object(&parsed)
    }

    fn parse_object(value: &Value) -> Result<Vec<Filter>> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::invalid_argument("filter must be a JSON object"))?;

        let mut filters = Vec::with_capacity(obj.len());
        for (field, v) in obj {
            match field.as_str() {
                "$and" => filters.push(Filter::And(Self::parse_list(v)?)),
                "$or" => filters.push(Filter::Or(Self::parse_list(v)?)),
                op if op.starts_with('$') => {
                    return Err(Error::invalid_argument(format!(
                        "unknown filter operator '{op}'"
                    )));
                },
                _ => filters.push(Filter::Eq { field: field.clone(), value: v.clone() }),
            }
        }
        Ok(filters)
    }

    fn parse_list(value: &Value) -> Result<Vec<Filter>> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::invalid_argument("$and/$or expects an array"))?;

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut parsed = Self::parse_object(item)?;
            if parsed.len() == 1 {
                out.push(parsed.remove(0));
            } else {
                out.push(Filter::And(parsed));
            }
        }
        Ok(out)
    }
}

/// True when the filter matches everything and the read must fall back to
/// a full collection scan.
pub fn is_full_collection_scan(raw: &[u8]) -> bool {
    if raw.is_empty() {
        return true;
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Null) => true,
        Ok(Value::Object(m)) => m.is_empty(),
        _ => false,
    }
}

/// Composer closure turning primary-key parts into an encoded key.
pub type KeyComposer<'a> = &'a dyn Fn(Vec<TupleValue>) -> Result<Key>;

/// Resolves filters to primary-key point lookups.
pub struct KeyBuilder;

impl KeyBuilder {
    /// Builds one key per disjunct of the filter.
    ///
    /// Every disjunct must pin **every** primary-key field with an
    /// equality; values are converted to the declared scalar types in
    /// schema order.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when a disjunct leaves a primary-key field
    /// unpinned, pins one field to two different values, or pins a field
    /// with a value of the wrong type.
    pub fn build(
        filters: &[Filter],
        primary_key: &[Field],
        composer: KeyComposer<'_>,
    ) -> Result<Vec<Key>> {
        let mut candidates: Vec<BTreeMap<&str, &Value>> = vec![BTreeMap::new()];
        for filter in filters {
            candidates = Self::apply(filter, candidates)?;
        }

        let mut keys = Vec::with_capacity(candidates.len());
        for bindings in candidates {
            let mut parts = Vec::with_capacity(primary_key.len());
            for field in primary_key {
                let value = *bindings.get(field.name.as_str()).ok_or_else(|| {
                    Error::invalid_argument("filters doesn't contain primary key fields")
                })?;
                parts.push(field.field_type.tuple_value(&field.name, value)?);
            }
            keys.push(composer(parts)?);
        }
        Ok(keys)
    }

    // Threads a filter node through the current disjunct set: equalities
    // and $and refine every disjunct, $or multiplies them.
    fn apply<'f>(
        filter: &'f Filter,
        candidates: Vec<BTreeMap<&'f str, &'f Value>>,
    ) -> Result<Vec<BTreeMap<&'f str, &'f Value>>> {
        match filter {
            Filter::Eq { field, value } => {
                let mut out = Vec::with_capacity(candidates.len());
                for mut bindings in candidates {
                    if let Some(existing) = bindings.get(field.as_str()) {
                        if *existing != value {
                            return Err(Error::invalid_argument(format!(
                                "field '{field}' is pinned to conflicting values"
                            )));
                        }
                    }
                    bindings.insert(field.as_str(), value);
                    out.push(bindings);
                }
                Ok(out)
            },
            Filter::And(subs) => {
                let mut out = candidates;
                for sub in subs {
                    out = Self::apply(sub, out)?;
                }
                Ok(out)
            },
            Filter::Or(subs) => {
                let mut out = Vec::new();
                for sub in subs {
                    out.extend(Self::apply(sub, candidates.clone())?);
                }
                Ok(out)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use folio_metadata::SchemaFactory;

    use super::*;

    fn pk_fields() -> Vec<Field> {
        let factory = SchemaFactory::build(
            "c1",
            br#"{"properties":{"K1":{"type":"string"},"K2":{"type":"integer"}},"primary_key":["K1","K2"]}"#,
        )
        .expect("schema");
        factory.primary_key
    }

    fn compose(parts: Vec<TupleValue>) -> Result<Key> {
        Ok(Key::new(b"t".to_vec(), parts))
    }

    #[test]
    fn test_full_scan_detection() {
        assert!(is_full_collection_scan(b""));
        assert!(is_full_collection_scan(b"{}"));
        assert!(is_full_collection_scan(b"null"));
        assert!(!is_full_collection_scan(br#"{"K1":"v"}"#));
    }

    #[test]
    fn test_bare_equalities_build_one_key() {
        let filters = Filter::parse(br#"{"K1":"vK1","K2":1}"#).expect("parse");
        let keys = KeyBuilder::build(&filters, &pk_fields(), &compose).expect("build");
        assert_eq!(keys.len(), 1);
        assert_eq!(
            keys[0].index_parts(),
            &[TupleValue::String("vK1".to_string()), TupleValue::Int(1)]
        );
    }

    #[test]
    fn test_or_of_ands_builds_one_key_per_disjunct() {
        let raw = br#"{"$or":[
            {"$and":[{"K1":"vK1"},{"K2":1}]},
            {"$and":[{"K1":"vK1"},{"K2":3}]}
        ]}"#;
        let filters = Filter::parse(raw).expect("parse");
        let keys = KeyBuilder::build(&filters, &pk_fields(), &compose).expect("build");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].index_parts()[1], TupleValue::Int(1));
        assert_eq!(keys[1].index_parts()[1], TupleValue::Int(3));
    }

    #[test]
    fn test_partial_pk_is_rejected() {
        let filters = Filter::parse(br#"{"K1":"vK1"}"#).expect("parse");
        let err = KeyBuilder::build(&filters, &pk_fields(), &compose).unwrap_err();
        assert!(err.to_string().contains("primary key fields"));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let filters = Filter::parse(br#"{"K1":"vK1","K2":"one"}"#).expect("parse");
        assert!(KeyBuilder::build(&filters, &pk_fields(), &compose).is_err());
    }

    #[test]
    fn test_conflicting_equalities_rejected() {
        let filters =
            Filter::parse(br#"{"$and":[{"K1":"a"},{"K1":"b"},{"K2":1}]}"#).expect("parse");
        assert!(KeyBuilder::build(&filters, &pk_fields(), &compose).is_err());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = Filter::parse(br#"{"$gt":{"K2":1}}"#).unwrap_err();
        assert!(err.to_string().contains("$gt"));
    }

    #[test]
    fn test_pk_order_follows_schema_not_filter() {
        let filters = Filter::parse(br#"{"K2":5,"K1":"z"}"#).expect("parse");
        let keys = KeyBuilder::build(&filters, &pk_fields(), &compose).expect("build");
        assert_eq!(
            keys[0].index_parts(),
            &[TupleValue::String("z".to_string()), TupleValue::Int(5)]
        );
    }
}
