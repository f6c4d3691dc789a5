use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A single field value read from a partition.
///
/// Partitions may carry nested lists and maps as well as raw byte blobs
/// holding encoded text. [`Value::normalize`] turns every blob into text so
/// the output log only ever contains JSON-representable data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Recursively decode byte blobs to UTF-8 text, dropping invalid sequences.
    pub fn normalize(self) -> Value {
        match self {
            Value::Bytes(bytes) => Value::Text(decode_utf8_ignoring_invalid(&bytes)),
            Value::List(items) => Value::List(items.into_iter().map(Value::normalize).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.normalize()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Coerce this value to an integer ID.
    ///
    /// Integers pass through, finite floats truncate toward zero, booleans map
    /// to 0/1 and strings are trimmed and parsed as base-10. Anything else
    /// yields `None`.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => {
                let truncated = f.trunc();
                if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                    Some(truncated as i64)
                } else {
                    None
                }
            }
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            Value::Bytes(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            // JSON has no NaN or infinity
            Value::Float(f) if !f.is_finite() => serializer.serialize_unit(),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => serializer.serialize_str(&decode_utf8_ignoring_invalid(bytes)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => serialize_entries(entries, serializer),
        }
    }
}

/// One record read from a partition, fields kept in source column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    pub fn with_field<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.push(key, value);
        self
    }

    pub fn push<K: Into<String>>(&mut self, key: K, value: Value) {
        self.fields.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn id(&self, id_field: &str) -> Option<i64> {
        self.get(id_field).and_then(Value::as_id)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn normalize(self) -> Row {
        Row {
            fields: self
                .fields
                .into_iter()
                .map(|(key, value)| (key, value.normalize()))
                .collect(),
        }
    }

    /// Build a row from a parsed JSON object; other JSON shapes are rejected.
    pub fn from_json(value: serde_json::Value) -> Option<Row> {
        match value {
            serde_json::Value::Object(map) => Some(Row {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            _ => None,
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_entries(&self.fields, serializer)
    }
}

fn serialize_entries<S: Serializer>(
    entries: &[(String, Value)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

fn decode_utf8_ignoring_invalid(mut bytes: &[u8]) -> String {
    let mut decoded = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                decoded.push_str(valid);
                return decoded;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                // valid_up_to guarantees this prefix is UTF-8
                decoded.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match err.error_len() {
                    Some(len) => bytes = &rest[len..],
                    None => return decoded,
                }
            }
        }
    }
}
