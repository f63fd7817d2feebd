//! Literal values carried through the operation graph into parameters.
//!
//! A [`Value`] is what the capture front-end records when a caller compares a
//! column against a concrete Rust value. The compiler never interpolates a
//! `Value` into SQL text (except as a documented last resort); it hands it to
//! the parameter bag and emits an opaque token instead.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Inferred database type of a parameter or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Boolean,
    BigInt,
    Double,
    Text,
    Bytea,
    Uuid,
    Timestamp,
    Json,
    Unknown,
}

/// A literal value captured from the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    /// A list of values; flattened by `IN`/`BETWEEN` handling.
    Array(Vec<Value>),
}

impl Value {
    /// Build an array value from anything convertible.
    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Map a JSON scalar onto the closest SQL value; objects stay JSON.
    pub(crate) fn from_json(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            obj @ serde_json::Value::Object(_) => Value::Json(obj),
        }
    }

    /// Infer the database type of this value.
    pub fn db_type(&self) -> DbType {
        match self {
            Value::Null => DbType::Unknown,
            Value::Bool(_) => DbType::Boolean,
            Value::Int(_) => DbType::BigInt,
            Value::Float(_) => DbType::Double,
            Value::Text(_) => DbType::Text,
            Value::Bytes(_) => DbType::Bytea,
            Value::Uuid(_) => DbType::Uuid,
            Value::Timestamp(_) => DbType::Timestamp,
            Value::Json(_) => DbType::Json,
            Value::Array(items) => items.first().map(Value::db_type).unwrap_or(DbType::Unknown),
        }
    }

    /// Last-resort textual rendering, used only when no parameter sink is
    /// available to the compiler.
    pub(crate) fn render_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => format!("'\\x{}'", hex(b)),
            Value::Uuid(u) => format!("'{u}'"),
            Value::Timestamp(t) => format!("'{}'", t.to_rfc3339()),
            Value::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
            Value::Array(items) => items
                .iter()
                .map(Value::render_literal)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_type_inference() {
        assert_eq!(Value::from(5i32).db_type(), DbType::BigInt);
        assert_eq!(Value::from("x").db_type(), DbType::Text);
        assert_eq!(Value::Null.db_type(), DbType::Unknown);
        assert_eq!(Value::array([1i64, 2]).db_type(), DbType::BigInt);
    }

    #[test]
    fn literal_rendering_escapes_quotes() {
        assert_eq!(Value::from("o'brien").render_literal(), "'o''brien'");
        assert_eq!(Value::from(true).render_literal(), "TRUE");
        assert_eq!(Value::Null.render_literal(), "NULL");
    }

    #[test]
    fn option_none_becomes_null() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
    }
}
