//! # Struct -> Hash Encoding
//!
//! Turns any serde record into `(field, value)` pairs ready for a multi-field
//! `HSET`. Field names come from serde, so `#[serde(rename = "...")]` plays the
//! role of a field tag.

use serde::Serialize;
use serde_json::Value;

use crate::error::{HashError, Result};

/// Encode a record into hash field/value pairs.
///
/// Scalars keep their natural text form, booleans become `"1"`/`"0"`,
/// `None` becomes an empty string and nested maps or sequences are written
/// as JSON text. Time fields are only rendered with the hash layout when the
/// field is annotated with [`crate::time`].
///
/// # Errors
///
/// Returns [`HashError::NotAMap`] when `value` does not serialize to a map or
/// struct, or the serializer's own error when a field fails to serialize.
pub fn to_hash<T: Serialize + ?Sized>(value: &T) -> Result<Vec<(String, String)>> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => fields
            .into_iter()
            .map(|(name, value)| Ok((name, field_text(value)?)))
            .collect(),
        other => Err(HashError::NotAMap(kind_of(&other))),
    }
}

fn field_text(value: Value) -> Result<String> {
    let text = match value {
        Value::Null => String::new(),
        Value::Bool(flag) => String::from(if flag { "1" } else { "0" }),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text,
        nested @ (Value::Array(_) | Value::Object(_)) => serde_json::to_string(&nested)?,
    };
    Ok(text)
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}
