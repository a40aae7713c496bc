//! Converts row fields into bind-ready values for the declared column types.

use crate::sql::base::{connection::DatabaseKind, metadata::column::ColumnSpec};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::{core::value::Value, records::row::RowData};
use std::collections::HashSet;
use thiserror::Error;

const TEXT_TYPES: [&str; 13] = [
    "CHAR",
    "VARCHAR",
    "VARCHAR2",
    "NVARCHAR2",
    "NVARCHAR",
    "TINYBLOB",
    "TINYTEXT",
    "BLOB",
    "TEXT",
    "MEDIUMBLOB",
    "MEDIUMTEXT",
    "LONGBLOB",
    "LONGTEXT",
];
const DATE_TYPES: [&str; 1] = ["DATE"];
const TIMESTAMP_TYPES: [&str; 2] = ["DATETIME", "TIMESTAMP"];
const BIGINT_TYPES: [&str; 1] = ["BIGINT"];

// Catalog names reported by Postgres through `udt_name`.
const PG_TEXT_TYPES: [&str; 4] = ["BPCHAR", "CITEXT", "NAME", "BYTEA"];
const PG_TIMESTAMP_TYPES: [&str; 1] = ["TIMESTAMP"];
const PG_TIMESTAMP_TZ_TYPES: [&str; 1] = ["TIMESTAMPTZ"];
const PG_BIGINT_TYPES: [&str; 2] = ["INT8", "BIGSERIAL"];

#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
    #[error("Column {column_index} ({type_name}): cannot read {value} as a date")]
    InvalidDate {
        column_index: usize,
        type_name: String,
        value: String,
    },

    #[error("Column {column_index} ({type_name}): cannot read {value} as a timestamp")]
    InvalidTimestamp {
        column_index: usize,
        type_name: String,
        value: String,
    },
}

impl CoercionError {
    pub fn column_index(&self) -> usize {
        match self {
            CoercionError::InvalidDate { column_index, .. }
            | CoercionError::InvalidTimestamp { column_index, .. } => *column_index,
        }
    }
}

/// Type names the coercion rules recognise, compared after normalisation
/// (upper-cased, length/precision suffix removed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVocabulary {
    text: HashSet<String>,
    date: HashSet<String>,
    timestamp: HashSet<String>,
    timestamp_tz: HashSet<String>,
    bigint: HashSet<String>,
}

impl Default for TypeVocabulary {
    fn default() -> Self {
        Self {
            text: to_set(&TEXT_TYPES),
            date: to_set(&DATE_TYPES),
            timestamp: to_set(&TIMESTAMP_TYPES),
            timestamp_tz: HashSet::new(),
            bigint: to_set(&BIGINT_TYPES),
        }
    }
}

impl TypeVocabulary {
    pub fn for_kind(kind: DatabaseKind) -> Self {
        match kind {
            DatabaseKind::MySql => Self::default(),
            DatabaseKind::Postgres => Self::default()
                .with_text_types(&PG_TEXT_TYPES)
                .with_timestamp_types(&PG_TIMESTAMP_TYPES)
                .with_timestamp_tz_types(&PG_TIMESTAMP_TZ_TYPES)
                .with_bigint_types(&PG_BIGINT_TYPES),
        }
    }

    pub fn with_text_types(mut self, names: &[&str]) -> Self {
        self.text.extend(to_set(names));
        self
    }

    pub fn with_timestamp_types(mut self, names: &[&str]) -> Self {
        self.timestamp.extend(to_set(names));
        self
    }

    pub fn with_timestamp_tz_types(mut self, names: &[&str]) -> Self {
        self.timestamp_tz.extend(to_set(names));
        self
    }

    pub fn with_bigint_types(mut self, names: &[&str]) -> Self {
        self.bigint.extend(to_set(names));
        self
    }

    pub fn is_text(&self, type_name: &str) -> bool {
        self.text.contains(type_name)
    }

    fn family(&self, type_name: &str) -> TypeFamily {
        if self.date.contains(type_name) {
            TypeFamily::Date
        } else if self.timestamp_tz.contains(type_name) {
            TypeFamily::TimestampTz
        } else if self.timestamp.contains(type_name) {
            TypeFamily::Timestamp
        } else if self.bigint.contains(type_name) {
            TypeFamily::BigInt
        } else {
            TypeFamily::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeFamily {
    Date,
    Timestamp,
    TimestampTz,
    BigInt,
    Other,
}

/// Per-column coercion rules resolved once at open.
#[derive(Debug, Clone)]
pub struct FieldCoercer {
    vocabulary: TypeVocabulary,
    /// Normalised declared type per write column; `None` when unknown.
    types: Vec<Option<String>>,
}

impl FieldCoercer {
    pub fn new(vocabulary: TypeVocabulary, columns: &[ColumnSpec]) -> Self {
        let types = columns
            .iter()
            .map(|c| c.type_name.as_deref().map(normalize_type))
            .collect();
        Self { vocabulary, types }
    }

    /// Bind-ready value of the field at `column_index`.
    pub fn coerce(&self, row: &RowData, column_index: usize) -> Result<Value, CoercionError> {
        self.coerce_value(row.value_at(column_index).clone(), column_index)
    }

    /// Coerces every write column of `row`, in column order.
    pub fn coerce_row(&self, row: &RowData) -> Result<Vec<Value>, CoercionError> {
        (0..self.types.len())
            .map(|index| self.coerce(row, index))
            .collect()
    }

    pub fn coerce_value(&self, value: Value, column_index: usize) -> Result<Value, CoercionError> {
        // Columns without a declared type are bound as-is.
        let Some(type_name) = self.types.get(column_index).and_then(|t| t.as_deref()) else {
            return Ok(value);
        };

        if value.is_blank_string() && !self.vocabulary.is_text(type_name) {
            return Ok(Value::Null);
        }

        let family = self.vocabulary.family(type_name);
        let value = match family {
            TypeFamily::Date => match to_date(&value) {
                Some(date) => Value::Date(date),
                None if value.is_null() => Value::Null,
                None => {
                    return Err(CoercionError::InvalidDate {
                        column_index,
                        type_name: type_name.to_string(),
                        value: value.to_string(),
                    });
                }
            },
            TypeFamily::Timestamp | TypeFamily::TimestampTz => match to_timestamp(&value) {
                Some(ts) if family == TypeFamily::TimestampTz => Value::Timestamp(ts.and_utc()),
                Some(ts) => Value::TimestampNaive(ts),
                None if value.is_null() => Value::Null,
                None => {
                    return Err(CoercionError::InvalidTimestamp {
                        column_index,
                        type_name: type_name.to_string(),
                        value: value.to_string(),
                    });
                }
            },
            TypeFamily::BigInt | TypeFamily::Other => value,
        };

        if family == TypeFamily::BigInt
            && let Some(millis) = value.epoch_millis()
        {
            return Ok(Value::Int(millis));
        }

        Ok(value)
    }
}

/// Upper-cases a declared type and strips any `(len)` suffix and modifiers
/// such as `UNSIGNED`.
pub fn normalize_type(type_name: &str) -> String {
    let base = type_name.split('(').next().unwrap_or(type_name).trim();
    let base = base
        .strip_suffix(" unsigned")
        .or_else(|| base.strip_suffix(" UNSIGNED"))
        .unwrap_or(base);
    base.trim().to_ascii_uppercase()
}

fn to_set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| normalize_type(n)).collect()
}

fn to_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::TimestampNaive(ts) => Some(ts.date()),
        Value::Timestamp(ts) => Some(ts.date_naive()),
        Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_naive_datetime(s).map(|dt| dt.date()))
        }
        Value::Int(_) | Value::Uint(_) => from_epoch_millis(value).map(|dt| dt.date()),
        _ => None,
    }
}

fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::TimestampNaive(ts) => Some(*ts),
        Value::Timestamp(ts) => Some(ts.naive_utc()),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::String(s) => {
            let s = s.trim();
            parse_naive_datetime(s).or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        }
        Value::Int(_) | Value::Uint(_) => from_epoch_millis(value),
        _ => None,
    }
}

fn from_epoch_millis(value: &Value) -> Option<NaiveDateTime> {
    value
        .as_i64()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.naive_utc())
}

fn parse_naive_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.naive_utc())
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn coercer(columns: &[(&str, Option<&str>)]) -> FieldCoercer {
        let specs: Vec<ColumnSpec> = columns
            .iter()
            .map(|(name, ty)| match ty {
                Some(ty) => ColumnSpec::typed(name, ty),
                None => ColumnSpec::new(name),
            })
            .collect();
        FieldCoercer::new(TypeVocabulary::default(), &specs)
    }

    fn naive(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap(),
        )
    }

    #[test]
    fn test_blank_string_to_null_for_non_text_columns() {
        let coercer = coercer(&[("id", Some("INT")), ("name", Some("VARCHAR"))]);
        let row = RowData::from_pairs(
            "users",
            [
                ("id", Value::String("".into())),
                ("name", Value::String("".into())),
            ],
        );

        assert_eq!(
            coercer.coerce_row(&row).unwrap(),
            vec![Value::Null, Value::String("".into())]
        );

        let row = RowData::from_pairs(
            "users",
            [
                ("id", Value::String("  \t".into())),
                ("name", Value::String("   ".into())),
            ],
        );
        assert_eq!(coercer.coerce(&row, 0).unwrap(), Value::Null);
        assert_eq!(coercer.coerce(&row, 1).unwrap(), Value::String("   ".into()));
    }

    #[test]
    fn test_declared_type_is_normalized() {
        let coercer = coercer(&[("name", Some("varchar(255)")), ("n", Some("int unsigned"))]);
        assert_eq!(
            coercer.coerce_value(Value::String("".into()), 0).unwrap(),
            Value::String("".into())
        );
        assert_eq!(
            coercer.coerce_value(Value::String(" ".into()), 1).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_date_and_timestamp_parsing() {
        let coercer = coercer(&[("d", Some("date")), ("ts", Some("DATETIME"))]);

        assert_eq!(
            coercer.coerce_value(Value::String("2024-03-01".into()), 0).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(
            coercer
                .coerce_value(Value::String("2024-03-01 10:20:30".into()), 0)
                .unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(
            coercer
                .coerce_value(Value::String("2024-03-01T10:20:30".into()), 1)
                .unwrap(),
            Value::TimestampNaive(naive("2024-03-01", "10:20:30"))
        );
        assert_eq!(
            coercer.coerce_value(Value::Int(0), 1).unwrap(),
            Value::TimestampNaive(naive("1970-01-01", "00:00:00"))
        );
        assert_eq!(coercer.coerce_value(Value::Null, 1).unwrap(), Value::Null);
    }

    #[test]
    fn test_unparseable_temporal_reports_column() {
        let coercer = coercer(&[("id", Some("INT")), ("created", Some("TIMESTAMP"))]);
        let err = coercer
            .coerce_value(Value::String("yesterday".into()), 1)
            .unwrap_err();
        assert_eq!(err.column_index(), 1);
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_bigint_takes_epoch_millis() {
        let coercer = coercer(&[("at", Some("BIGINT"))]);
        let ts = naive("2024-01-01", "00:00:01");
        assert_eq!(
            coercer.coerce_value(Value::TimestampNaive(ts), 0).unwrap(),
            Value::Int(1_704_067_201_000)
        );
        assert_eq!(
            coercer.coerce_value(Value::Int(5), 0).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let coercer = coercer(&[("x", None), ("y", Some("GEOMETRY"))]);
        assert_eq!(
            coercer.coerce_value(Value::String("".into()), 0).unwrap(),
            Value::String("".into())
        );
        assert_eq!(
            coercer.coerce_value(Value::Bytes(vec![1, 2]), 1).unwrap(),
            Value::Bytes(vec![1, 2])
        );
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let coercer = coercer(&[
            ("id", Some("INT")),
            ("name", Some("VARCHAR")),
            ("d", Some("DATE")),
            ("ts", Some("TIMESTAMP")),
            ("at", Some("BIGINT")),
        ]);
        let inputs = [
            Value::String(" ".into()),
            Value::String("".into()),
            Value::String("2024-02-29".into()),
            Value::String("2024-02-29 23:59:59.250".into()),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
        ];

        for (index, input) in inputs.into_iter().enumerate() {
            let once = coercer.coerce_value(input, index).unwrap();
            let twice = coercer.coerce_value(once.clone(), index).unwrap();
            assert_eq!(once, twice, "column {index}");
        }
    }

    #[test]
    fn test_postgres_vocabulary() {
        let specs = vec![
            ColumnSpec::typed("code", "bpchar"),
            ColumnSpec::typed("seen", "timestamptz"),
            ColumnSpec::typed("at", "int8"),
        ];
        let coercer = FieldCoercer::new(TypeVocabulary::for_kind(DatabaseKind::Postgres), &specs);

        assert_eq!(
            coercer.coerce_value(Value::String("".into()), 0).unwrap(),
            Value::String("".into())
        );
        assert_eq!(
            coercer
                .coerce_value(Value::String("2024-03-01 00:00:00".into()), 1)
                .unwrap(),
            Value::Timestamp(naive("2024-03-01", "00:00:00").and_utc())
        );
        assert_eq!(
            coercer
                .coerce_value(Value::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 2)
                .unwrap(),
            Value::Int(86_400_000)
        );
    }
}
