use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One record as delivered by an input source, before format detection.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// A single line of text (syslog, firewall text, IDS alert...).
    Text(String),
    /// A structured key/value record, usually a decoded JSON object.
    Mapping(Map<String, Value>),
    /// Any other shape. Parsers treat it as unparseable.
    Unrecognized(Value),
}

impl RawRecord {
    /// Classify a decoded JSON value: strings become text, objects become mappings.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => RawRecord::Text(s),
            Value::Object(map) => RawRecord::Mapping(map),
            other => RawRecord::Unrecognized(other),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawRecord::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Map<String, Value>> {
        match self {
            RawRecord::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// The original payload, carried verbatim on the canonical event.
    pub fn to_value(&self) -> Value {
        match self {
            RawRecord::Text(s) => Value::String(s.clone()),
            RawRecord::Mapping(m) => Value::Object(m.clone()),
            RawRecord::Unrecognized(v) => v.clone(),
        }
    }
}

impl From<&str> for RawRecord {
    fn from(s: &str) -> Self {
        RawRecord::Text(s.to_string())
    }
}

impl From<String> for RawRecord {
    fn from(s: String) -> Self {
        RawRecord::Text(s)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(m: Map<String, Value>) -> Self {
        RawRecord::Mapping(m)
    }
}

/// Typed column values for derived features.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl FieldValue {
    /// Convert a JSON value, keeping scalars typed and rendering containers as JSON text.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Text(n.to_string())
                }
            }
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Null => FieldValue::Null,
            other => FieldValue::Text(other.to_string()),
        }
    }

    /// Extract as string, returning None for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view used when building model inputs. Booleans map to 0/1,
    /// text and null have no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(_) | FieldValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// JSON rendering; non-finite floats become null.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Null => Value::Null,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
