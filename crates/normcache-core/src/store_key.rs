//! # Store Keys
//!
//! Maps a field name plus its resolved arguments to the key its value is
//! stored under inside an object record.
//!
//! - A field without arguments is stored under its bare name.
//! - A field with arguments is stored under `name(<json>)`, where `<json>`
//!   is the compact JSON rendering of the arguments with every object's
//!   keys sorted. Semantically identical argument sets therefore always map
//!   to the same key, whatever order the arguments were written in.

use crate::types::Arguments;
use serde_json::{Map, Value};

/// Compute the store key for `field_name` called with `args`.
///
/// `None` means the field declares no arguments. `Some` of an empty map
/// (every argument referenced an unset variable) renders as `name({})`.
#[must_use]
pub fn store_key_name(field_name: &str, args: Option<&Arguments>) -> String {
    let Some(args) = args else {
        return field_name.to_string();
    };

    // BTreeMap iteration is already sorted; nested values are not.
    let canonical: Map<String, Value> = args
        .iter()
        .map(|(name, value)| (name.clone(), canonicalize(value)))
        .collect();

    format!("{}({})", field_name, Value::Object(canonical))
}

/// Rebuild `value` with all object keys in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .filter_map(|key| object.get(key).map(|v| (key.clone(), canonicalize(v))))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        scalar => scalar.clone(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
