//! Collection schemas: parsing, validation, primary-key typing.
//!
//! A user schema is JSON of the shape
//! `{ "title"?, "properties": { field: { "type": ..., "format"? } },
//! "primary_key": [field, ...] }`. The primary key is mandatory and its
//! fields must be declared with scalar types.

use std::sync::Arc;

use folio_kv::TupleValue;
use folio_types::{Error, Result};
use serde_json::Value;

/// Dictionary id of the mandatory primary-key index. Every collection's
/// key tuples start with this id.
pub const PRIMARY_KEY_INDEX_ID: u32 = 1;

/// Scalar type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON boolean.
    Bool,
    /// JSON integer, 64-bit signed.
    Int64,
    /// JSON number.
    Double,
    /// JSON string.
    String,
    /// JSON string carrying bytes (`"format": "byte"`).
    Bytes,
    /// JSON object; not usable in a primary key.
    Object,
    /// JSON array; not usable in a primary key.
    Array,
}

impl FieldType {
    fn from_schema(type_name: &str, format: Option<&str>) -> Result<Self> {
        match (type_name, format) {
            ("boolean", _) => Ok(FieldType::Bool),
            ("integer", _) => Ok(FieldType::Int64),
            ("number", _) => Ok(FieldType::Double),
            ("string", Some("byte")) => Ok(FieldType::Bytes),
            ("string", _) => Ok(FieldType::String),
            ("object", _) => Ok(FieldType::Object),
            ("array", _) => Ok(FieldType::Array),
            (other, _) => {
                Err(Error::invalid_argument(format!("unsupported field type '{other}'")))
            },
        }
    }

    /// True for types a primary key may use.
    pub fn is_scalar(self) -> bool {
        !matches!(self, FieldType::Object | FieldType::Array)
    }

    /// Checks a document value against this type. Integers are accepted
    /// where `Double` is declared; a fractional literal where `Int64` is
    /// declared is a mismatch.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::Bool => value.is_boolean(),
            FieldType::Int64 => value.as_i64().is_some(),
            FieldType::Double => value.is_number(),
            FieldType::String | FieldType::Bytes => value.is_string(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }

    /// Converts a document value of this type into a key tuple element.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the value does not match the declared type
    /// or the type is not scalar.
    pub fn tuple_value(self, field: &str, value: &Value) -> Result<TupleValue> {
        let mismatch = || {
            Error::invalid_argument(format!("value of field '{field}' doesn't match its type"))
        };
        match self {
            FieldType::Bool => value.as_bool().map(TupleValue::Bool).ok_or_else(mismatch),
            FieldType::Int64 => value.as_i64().map(TupleValue::Int).ok_or_else(mismatch),
            FieldType::Double => value.as_f64().map(TupleValue::Double).ok_or_else(mismatch),
            FieldType::String => {
                value.as_str().map(|s| TupleValue::String(s.to_string())).ok_or_else(mismatch)
            },
            FieldType::Bytes => value
                .as_str()
                .map(|s| TupleValue::Bytes(s.as_bytes().to_vec()))
                .ok_or_else(mismatch),
            FieldType::Object | FieldType::Array => Err(Error::invalid_argument(format!(
                "field '{field}' is not usable in a key"
            ))),
        }
    }
}

/// A declared schema field.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
}

/// A parsed, validated user schema, ready to be registered as a
/// collection.
#[derive(Debug, Clone)]
pub struct SchemaFactory {
    /// Collection name.
    pub name: String,
    /// All declared fields, in schema order.
    pub fields: Vec<Field>,
    /// Primary-key fields, in `primary_key` order.
    pub primary_key: Vec<Field>,
    /// The original schema document, kept verbatim for Describe.
    pub schema: Vec<u8>,
}

impl SchemaFactory {
    /// Parses and validates a user schema.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on malformed JSON, a missing or empty
    /// `primary_key`, an undeclared primary-key field, or a non-scalar
    /// primary-key type.
    pub fn build(coll_name: &str, schema: &[u8]) -> Result<Self> {
        let parsed: Value = serde_json::from_slice(schema)
            .map_err(|e| Error::invalid_argument(format!("schema is not valid JSON: {e}")))?;

        let properties = parsed
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::invalid_argument("schema is missing 'properties'"))?;

        let mut fields = Vec::with_capacity(properties.len());
        for (name, decl) in properties {
            let type_name = decl
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::invalid_argument(format!("field '{name}' is missing a type"))
                })?;
            let format = decl.get("format").and_then(Value::as_str);
            fields.push(Field {
                name: name.clone(),
                field_type: FieldType::from_schema(type_name, format)?,
            });
        }

        let pk_names = parsed
            .get("primary_key")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::invalid_argument("schema is missing 'primary_key'"))?;
        if pk_names.is_empty() {
            return Err(Error::invalid_argument("primary_key cannot be empty"));
        }

        let mut primary_key = Vec::with_capacity(pk_names.len());
        for pk in pk_names {
            let pk_name = pk
                .as_str()
                .ok_or_else(|| Error::invalid_argument("primary_key entries must be strings"))?;
            let field = fields
                .iter()
                .find(|f| f.name == pk_name)
                .ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "primary key field '{pk_name}' is not declared"
                    ))
                })?
                .clone();
            if !field.field_type.is_scalar() {
                return Err(Error::invalid_argument(format!(
                    "primary key field '{pk_name}' must be scalar"
                )));
            }
            primary_key.push(field);
        }

        Ok(Self {
            name: coll_name.to_string(),
            fields,
            primary_key,
            schema: schema.to_vec(),
        })
    }
}

/// A registered collection.
#[derive(Debug, Clone)]
pub struct Collection {
    /// Dictionary id within the database.
    pub id: u32,
    /// Collection name.
    pub name: String,
    /// Declared fields.
    pub fields: Vec<Field>,
    /// Primary-key fields, in key order.
    pub primary_key: Vec<Field>,
    /// The original schema document.
    pub schema: Vec<u8>,
}

impl Collection {
    /// Builds a collection from a parsed schema and an allocated id.
    pub fn new(id: u32, factory: SchemaFactory) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: factory.name,
            fields: factory.fields,
            primary_key: factory.primary_key,
            schema: factory.schema,
        })
    }

    /// Looks up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates a document against the schema: it must be a JSON object,
    /// and every present field with a declaration must match its declared
    /// type. Undeclared fields pass through.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` describing the first mismatching field.
    pub fn validate(&self, doc: &Value) -> Result<()> {
        let obj = doc
            .as_object()
            .ok_or_else(|| Error::invalid_argument("document must be a JSON object"))?;

        for field in &self.fields {
            if let Some(value) = obj.get(&field.name) {
                if value.is_null() {
                    continue;
                }
                if !field.field_type.matches(value) {
                    return Err(Error::invalid_argument(format!(
                        "value of field '{}' doesn't match its type",
                        field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use serde_json::json;

    use super::*;

    const SCHEMA: &[u8] = br#"{
        "title": "c1",
        "properties": {
            "K1": {"type": "string"},
            "K2": {"type": "integer"},
            "D1": {"type": "string"}
        },
        "primary_key": ["K1", "K2"]
    }"#;

    #[test]
    fn test_build_orders_primary_key() {
        let factory = SchemaFactory::build("c1", SCHEMA).expect("build");
        let names: Vec<_> = factory.primary_key.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["K1", "K2"]);
        assert_eq!(factory.primary_key[1].field_type, FieldType::Int64);
    }

    #[test]
    fn test_build_rejects_missing_primary_key() {
        let err = SchemaFactory::build("c1", br#"{"properties":{"a":{"type":"string"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("primary_key"));
    }

    #[test]
    fn test_build_rejects_undeclared_pk_field() {
        let schema = br#"{"properties":{"a":{"type":"string"}},"primary_key":["b"]}"#;
        let err = SchemaFactory::build("c1", schema).unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_build_rejects_object_pk() {
        let schema = br#"{"properties":{"a":{"type":"object"}},"primary_key":["a"]}"#;
        assert!(SchemaFactory::build("c1", schema).is_err());
    }

    #[test]
    fn test_validate_accepts_matching_doc() {
        let coll = Collection::new(1, SchemaFactory::build("c1", SCHEMA).expect("build"));
        coll.validate(&json!({"K1": "vK1", "K2": 1, "D1": "vD1"})).expect("valid");
    }

    #[test]
    fn test_validate_rejects_float_in_int_field() {
        let coll = Collection::new(1, SchemaFactory::build("c1", SCHEMA).expect("build"));
        let err = coll.validate(&json!({"K1": "vK1", "K2": 1.5})).unwrap_err();
        assert!(err.to_string().contains("K2"));
    }

    #[test]
    fn test_validate_allows_undeclared_fields() {
        let coll = Collection::new(1, SchemaFactory::build("c1", SCHEMA).expect("build"));
        coll.validate(&json!({"K1": "a", "K2": 2, "extra": [1, 2]})).expect("valid");
    }

    #[test]
    fn test_tuple_value_conversions() {
        assert_eq!(
            FieldType::Int64.tuple_value("k", &json!(7)).expect("int"),
            TupleValue::Int(7)
        );
        assert_eq!(
            FieldType::String.tuple_value("k", &json!("v")).expect("string"),
            TupleValue::String("v".to_string())
        );
        assert!(FieldType::Int64.tuple_value("k", &json!("v")).is_err());
        assert!(FieldType::Object.tuple_value("k", &json!({})).is_err());
    }
}
