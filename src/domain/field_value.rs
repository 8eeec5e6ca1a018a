use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

/// A single decoded measurement value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    /// The companion value key was not part of the payload.
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Absent,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map_or(FieldValue::Absent, FieldValue::Float),
            },
            Value::String(s) => FieldValue::Text(s.clone()),
            // Nested structures are not expected, keep them readable rather than drop them
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Float(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Absent => write!(f, "<absent>"),
        }
    }
}
