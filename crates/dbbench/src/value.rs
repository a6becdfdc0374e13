//! Scalar values, records and result rows.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar value inserted into or read back from a backend.
///
/// Generated records only ever hold `Int` and `Text`; `Null` and `Float`
/// appear in query results (aggregates, nullable columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Returns the text payload, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One synthetic record: field name to value.
pub type Record = BTreeMap<String, Value>;

/// One result row, in the column order the backend returned.
pub type Row = Vec<Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_untagged() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 42, 1.5, "abc"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(42),
                Value::Float(1.5),
                Value::Text("abc".to_string())
            ]
        );
    }

    #[test]
    fn test_record_serializes_as_object() {
        let mut record = Record::new();
        record.insert("name".to_string(), "abc".into());
        record.insert("id".to_string(), 7i64.into());

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":7,"name":"abc"}"#);
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }
}
