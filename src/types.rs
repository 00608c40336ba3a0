// src/types.rs
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single cell fetched from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::DateTime(dt) => write!(f, "'{}'", dt),
            Value::Date(d) => write!(f, "'{}'", d),
        }
    }
}

/// Declared column types that are summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericType {
    Int,
    Float,
    Double,
    Decimal,
}

impl NumericType {
    /// Map a declared SQL type (`DOUBLE`, `decimal(6,2)`, `int unsigned`,
    /// SQLite's `INTEGER`/`REAL`/`NUMERIC`) to a numeric type.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let normalized = declared.trim().to_ascii_lowercase();
        let base = normalized
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "int" | "integer" => Some(NumericType::Int),
            "float" => Some(NumericType::Float),
            "double" | "real" => Some(NumericType::Double),
            "decimal" | "numeric" => Some(NumericType::Decimal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericType::Int => "int",
            NumericType::Float => "float",
            NumericType::Double => "double",
            NumericType::Decimal => "decimal",
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
