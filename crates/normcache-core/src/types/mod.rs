//! # Core Type Definitions
//!
//! This module contains the data model of the normalized store:
//! - Identity references (`IdValue`)
//! - Stored values (`StoreValue`) and object records (`StoreRecord`)
//! - Resolved field arguments (`Arguments`)
//! - Error types (`CacheError`, `ErrorKind`)
//!
//! ## Normalization Invariant
//!
//! A stored value is never a bare nested object. Nesting is always expressed
//! through `StoreValue::Reference`, and opaque objects are explicitly wrapped
//! in `StoreValue::Json`. The JSON interchange shape enforces this when a
//! snapshot is loaded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::primitives::TYPENAME_FIELD;

/// Field arguments after variable substitution, keyed by argument name.
pub type Arguments = BTreeMap<String, Value>;

/// Tag key used by the JSON interchange shape of tagged store values.
const TAG_KEY: &str = "type";

// =============================================================================
// IDENTITY REFERENCE
// =============================================================================

/// A pointer from one record to another record in the same store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdValue {
    /// Identifier of the target record.
    pub id: String,
    /// Whether the identifier was synthesized by the writer because the
    /// object had no natural identity. The read path ignores it.
    #[serde(default)]
    pub generated: bool,
}

impl IdValue {
    /// Reference to a record with a natural identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            generated: false,
        }
    }

    /// Reference to a record whose identifier was synthesized.
    #[must_use]
    pub fn generated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            generated: true,
        }
    }
}

// =============================================================================
// STORE VALUE
// =============================================================================

/// A value stored under one store key of an object record.
///
/// An absent value is not a variant: it is a key missing from the record.
///
/// The JSON interchange shape is:
/// - plain scalars and arrays map to `Scalar` and `List`
/// - `{"type": "id", "id": "...", "generated": false}` is a `Reference`
/// - `{"type": "json", "json": ...}` is a `Json` blob
/// - any other object is rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum StoreValue {
    /// String, number, boolean or null.
    Scalar(Value),
    /// Opaque JSON payload, never interpreted field by field.
    Json(Value),
    /// Link to another record.
    Reference(IdValue),
    /// Ordered sequence, used for list fields.
    List(Vec<StoreValue>),
}

impl StoreValue {
    /// Scalar value.
    #[must_use]
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    /// Opaque JSON payload.
    #[must_use]
    pub fn json(value: impl Into<Value>) -> Self {
        Self::Json(value.into())
    }

    /// Reference to the record `id`.
    #[must_use]
    pub fn reference(id: impl Into<String>) -> Self {
        Self::Reference(IdValue::new(id))
    }

    /// List of values.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = StoreValue>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Whether this is a JSON-wrapped value.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Whether this is an identity reference.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Parse the JSON interchange shape.
    pub fn from_json(value: Value) -> Result<Self, CacheError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Value::Object(mut object) => {
                let tag = object.get(TAG_KEY).and_then(Value::as_str).map(str::to_owned);
                match tag.as_deref() {
                    Some("id") => {
                        let id = object
                            .remove("id")
                            .and_then(|id| id.as_str().map(str::to_owned))
                            .ok_or_else(|| {
                                CacheError::InvalidStoreValue(
                                    "identity reference without a string `id`".to_string(),
                                )
                            })?;
                        let generated = object
                            .get("generated")
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        Ok(Self::Reference(IdValue { id, generated }))
                    }
                    Some("json") => object.remove("json").map(Self::Json).ok_or_else(|| {
                        CacheError::InvalidStoreValue(
                            "json value without a `json` payload".to_string(),
                        )
                    }),
                    _ => Err(CacheError::InvalidStoreValue(format!(
                        "nested object is not normalized: {}",
                        Value::Object(object)
                    ))),
                }
            }
            scalar => Ok(Self::Scalar(scalar)),
        }
    }

    /// Render the JSON interchange shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Json(value) => {
                let mut object = Map::new();
                object.insert(TAG_KEY.to_string(), Value::from("json"));
                object.insert("json".to_string(), value.clone());
                Value::Object(object)
            }
            Self::Reference(id) => {
                let mut object = Map::new();
                object.insert(TAG_KEY.to_string(), Value::from("id"));
                object.insert("id".to_string(), Value::from(id.id.clone()));
                object.insert("generated".to_string(), Value::from(id.generated));
                Value::Object(object)
            }
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl TryFrom<Value> for StoreValue {
    type Error = CacheError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl From<StoreValue> for Value {
    fn from(value: StoreValue) -> Self {
        value.to_json()
    }
}

// =============================================================================
// STORE RECORD
// =============================================================================

/// All stored fields of one object, keyed by store key.
///
/// Uses `BTreeMap` for deterministic iteration and rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreRecord(BTreeMap<String, StoreValue>);

impl StoreRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `store_key`, if it was ever written.
    #[must_use]
    pub fn get(&self, store_key: &str) -> Option<&StoreValue> {
        self.0.get(store_key)
    }

    /// Whether a value was written under `store_key`.
    #[must_use]
    pub fn contains_key(&self, store_key: &str) -> bool {
        self.0.contains_key(store_key)
    }

    /// Store a value, returning the previous one.
    pub fn insert(&mut self, store_key: impl Into<String>, value: StoreValue) -> Option<StoreValue> {
        self.0.insert(store_key.into(), value)
    }

    /// Builder form of `insert`.
    #[must_use]
    pub fn with(mut self, store_key: impl Into<String>, value: StoreValue) -> Self {
        self.insert(store_key, value);
        self
    }

    /// The concrete type name stored under `__typename`, if any.
    #[must_use]
    pub fn typename(&self) -> Option<&str> {
        match self.0.get(TYPENAME_FIELD) {
            Some(StoreValue::Scalar(Value::String(name))) => Some(name),
            _ => None,
        }
    }

    /// Number of stored fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field was ever written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in store key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StoreValue)> {
        self.0.iter()
    }

    /// Render the JSON interchange shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, StoreValue)> for StoreRecord {
    fn from_iter<I: IntoIterator<Item = (String, StoreValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for StoreRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of a `CacheError`.
///
/// `Field` marks a data-availability signal (a field the query needs is
/// not in the store). Callers react to it, e.g. by fetching from a server.
/// The other kinds are defects in the inputs or the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required field is missing from the store.
    Field,
    /// The query document is malformed.
    Document,
    /// The store could not be read or decoded.
    Storage,
}

/// Errors that can occur while reading from the cache.
///
/// - No silent failures
/// - Use `Result<T, CacheError>` for fallible operations
/// - The read path never panics; all errors are returned to the caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    /// Strict resolution hit a field that was never written to the store.
    #[error(
        "Can't find field {store_key} on object ({object_id}) {record}.\n\
         Perhaps you want to use the `return_partial_data` option?"
    )]
    MissingField {
        /// The store key that was looked up.
        store_key: String,
        /// The object the field was looked up on.
        object_id: String,
        /// Snapshot of the record at the time of the lookup.
        record: StoreRecord,
    },

    /// A fragment spread names a fragment the document does not define.
    #[error("No fragment named {0}")]
    UnknownFragment(String),

    /// The query document cannot be executed.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A stored value violates the normalization invariant.
    #[error("Invalid store value: {0}")]
    InvalidStoreValue(String),

    /// The storage engine failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CacheError {
    /// Structured marker distinguishing field-level errors from the rest.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } => ErrorKind::Field,
            Self::UnknownFragment(_) | Self::InvalidDocument(_) => ErrorKind::Document,
            Self::InvalidStoreValue(_) | Self::Storage(_) | Self::Serialization(_) | Self::Io(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Whether this error is a field-level data-availability signal.
    #[must_use]
    pub const fn is_missing_field(&self) -> bool {
        matches!(self.kind(), ErrorKind::Field)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_shape_parses_tagged_values() {
        let value = StoreValue::from_json(json!({"type": "id", "id": "User:1"})).expect("parse");
        assert_eq!(value, StoreValue::reference("User:1"));
        assert!(value.is_reference());

        let value =
            StoreValue::from_json(json!({"type": "json", "json": {"a": [1, 2]}})).expect("parse");
        assert_eq!(value, StoreValue::json(json!({"a": [1, 2]})));
        assert!(value.is_json());
    }

    #[test]
    fn json_shape_keeps_generated_flag() {
        let value = StoreValue::from_json(json!({"type": "id", "id": "$ROOT_QUERY.viewer", "generated": true}))
            .expect("parse");
        assert_eq!(
            value,
            StoreValue::Reference(IdValue::generated("$ROOT_QUERY.viewer"))
        );
    }

    #[test]
    fn json_shape_rejects_bare_objects() {
        let err = StoreValue::from_json(json!({"name": "Ada"})).expect_err("must reject");
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn json_shape_lists_mix_variants() {
        let value = StoreValue::from_json(json!([1, null, {"type": "id", "id": "A"}])).expect("parse");
        assert_eq!(
            value,
            StoreValue::list([
                StoreValue::scalar(1),
                StoreValue::Scalar(Value::Null),
                StoreValue::reference("A"),
            ])
        );
        assert_eq!(value.to_json(), json!([1, null, {"type": "id", "id": "A", "generated": false}]));
    }

    #[test]
    fn record_typename() {
        let record = StoreRecord::new().with("__typename", StoreValue::scalar("Dog"));
        assert_eq!(record.typename(), Some("Dog"));
        assert_eq!(StoreRecord::new().typename(), None);
    }

    #[test]
    fn missing_field_error_suggests_partial_data() {
        let err = CacheError::MissingField {
            store_key: "name".to_string(),
            object_id: "User:1".to_string(),
            record: StoreRecord::new().with("id", StoreValue::scalar(1)),
        };
        let message = err.to_string();
        assert!(message.contains("name"));
        assert!(message.contains("User:1"));
        assert!(message.contains("return_partial_data"));
        assert!(err.is_missing_field());
    }
}
