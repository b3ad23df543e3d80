use std::fmt;

use arbor_types::Key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar value the remote store can hold at a single path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Key(Key),
}

impl PropertyValue {
    /// Short name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::String(_) => "string",
            PropertyValue::Bytes(_) => "bytes",
            PropertyValue::Timestamp(_) => "timestamp",
            PropertyValue::Key(_) => "key",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Approximate stored size in bytes, used for limit checks.
    pub fn stored_len(&self) -> usize {
        match self {
            PropertyValue::Null => 0,
            PropertyValue::Bool(_) => 1,
            PropertyValue::Int(_) | PropertyValue::Float(_) | PropertyValue::Timestamp(_) => 8,
            PropertyValue::String(s) => s.len(),
            PropertyValue::Bytes(b) => b.len(),
            PropertyValue::Key(k) => k.to_bytes().len(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => f.write_str("null"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(n) => write!(f, "{n}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::String(s) => write!(f, "{s:?}"),
            PropertyValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            PropertyValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            PropertyValue::Key(k) => write!(f, "{k}"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Int(n)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_len_counts_payload() {
        assert_eq!(PropertyValue::Null.stored_len(), 0);
        assert_eq!(PropertyValue::from("abc").stored_len(), 3);
        assert_eq!(PropertyValue::Bytes(vec![0; 10]).stored_len(), 10);
        assert_eq!(PropertyValue::Int(1).stored_len(), 8);
    }

    #[test]
    fn display_formats() {
        assert_eq!(PropertyValue::from("x").to_string(), "\"x\"");
        assert_eq!(PropertyValue::Int(5).to_string(), "5");
        assert_eq!(PropertyValue::Bytes(vec![1, 2]).to_string(), "<2 bytes>");
    }
}
