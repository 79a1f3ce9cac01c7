// classify.rs

use crate::schema::FieldKind;
use serde_json::Value;

/// A dynamic value of a kind the template layer cannot represent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedValueError {
    /// Native kind of the rejected value (e.g. `null`).
    pub kind: &'static str,
}

impl std::fmt::Display for UnsupportedValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported value kind '{}': expected a string, number, boolean, array, or object",
            self.kind
        )
    }
}

impl std::error::Error for UnsupportedValueError {}

/// Classify a dynamic value into the five-way field kind taxonomy.
///
/// Used only where a schema was not declared ahead of time (dynamically
/// assembled payloads). Arrays classify as `Array` regardless of element
/// type; any other non-primitive, non-array value is an `Object`. `null`
/// (the JSON rendition of the native kinds the taxonomy has no slot for)
/// fails with [`UnsupportedValueError`].
pub fn classify_value(value: &Value) -> Result<FieldKind, UnsupportedValueError> {
    match value {
        Value::String(_) => Ok(FieldKind::String),
        Value::Number(_) => Ok(FieldKind::Number),
        Value::Bool(_) => Ok(FieldKind::Boolean),
        Value::Array(_) => Ok(FieldKind::Array),
        Value::Object(_) => Ok(FieldKind::Object),
        Value::Null => Err(UnsupportedValueError { kind: "null" }),
    }
}
