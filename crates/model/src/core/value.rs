use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Boolean(bool),
    Json(serde_json::Value),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    TimestampNaive(NaiveDateTime),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for string values made only of whitespace, including the empty string.
    pub fn is_blank_string(&self) -> bool {
        match self {
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            Value::String(v) => v.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Uint(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Decimal(v) => Some(v.to_string()),
            Value::String(v) => Some(v.clone()),
            Value::Boolean(v) => Some(v.to_string()),
            Value::Json(v) => v.as_str().map(|s| s.to_string()),
            Value::Uuid(v) => Some(v.to_string()),
            Value::Date(v) => Some(v.to_string()),
            Value::Timestamp(v) => Some(v.to_rfc3339()),
            Value::TimestampNaive(v) => Some(v.to_string()),
            Value::Bytes(_) | Value::Null => None,
        }
    }

    /// Milliseconds since the Unix epoch for temporal values.
    ///
    /// Dates count from midnight and naive timestamps are read as UTC.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis()),
            Value::Timestamp(ts) => Some(ts.timestamp_millis()),
            Value::TimestampNaive(ts) => Some(ts.and_utc().timestamp_millis()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: &str, value: Value) -> Self {
        FieldValue {
            name: name.to_string(),
            value,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "'{}'", v.to_string().replace('\'', "''")),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Bytes(v) => {
                let hex = v
                    .iter()
                    .fold(String::new(), |acc, byte: &u8| acc + &format!("{byte:02x}"));
                write!(f, "x'{hex}'")
            }
            Value::Date(v) => write!(f, "'{v}'"),
            Value::Timestamp(v) => write!(f, "'{v}'"),
            Value::TimestampNaive(v) => write!(f, "'{v}'"),
            Value::Null => write!(f, "NULL"),
        }
    }
}
