use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::error::{DatabaseError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Varchar(u32),
}

impl DataType {
    /// Whether a value may be stored in a column of this type. Null is
    /// accepted everywhere since partial inserts pad with nulls.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null) | (DataType::Integer, Value::Integer(_)) | (DataType::Varchar(_), Value::Text(_))
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Integer => write!(f, "INT"),
            DataType::Varchar(len) => write!(f, "VARCHAR({})", len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    pub fn data_type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INT",
            Value::Text(_) => "VARCHAR",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Comparison used by predicates and by the typed index ordering.
    /// Integers compare numerically, strings by code point. Comparing
    /// across types, or against null, is an error rather than an ordering.
    pub fn typed_cmp(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (a, b) => Err(DatabaseError::TypeMismatch {
                expected: a.data_type_name().to_string(),
                actual: b.data_type_name().to_string(),
            }),
        }
    }

    /// Total order used only for tree key placement. Null sorts before any
    /// typed value so padded columns still have an index position; queries
    /// never reach them because null comparisons are rejected at planning.
    pub fn storage_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Integer(_) => 1,
                Value::Text(_) => 2,
            }
        }
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}
