use bigdecimal::ToPrimitive;
use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime};
use model::core::value::Value;
use rust_decimal::{Decimal as RustDecimal, prelude::FromPrimitive};
use std::{error::Error, str::FromStr};
use tokio_postgres::types::{IsNull, Json as PgJson, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn Error + Sync + Send>;

/// A bind parameter that adapts to the column type the server reports for
/// its placeholder, so one `Value` binds to `INT4`, `INT8`, `NUMERIC`, etc.
#[derive(Debug)]
pub struct PgParam(Value);

impl PgParam {
    pub fn from_value(value: Value) -> Self {
        PgParam(value)
    }
}

impl ToSql for PgParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let value = &self.0;
        if value.is_null() {
            return Ok(IsNull::Yes);
        }

        match *ty {
            Type::BOOL => match value {
                Value::Boolean(b) => b.to_sql(ty, out),
                other => (integer(other, ty)? != 0).to_sql(ty, out),
            },
            Type::INT2 => i16::try_from(integer(value, ty)?)?.to_sql(ty, out),
            Type::INT4 => i32::try_from(integer(value, ty)?)?.to_sql(ty, out),
            Type::INT8 => integer(value, ty)?.to_sql(ty, out),
            Type::FLOAT4 => (float(value, ty)? as f32).to_sql(ty, out),
            Type::FLOAT8 => float(value, ty)?.to_sql(ty, out),
            Type::NUMERIC => decimal(value, ty)?.to_sql(ty, out),
            Type::JSON | Type::JSONB => match value {
                Value::Json(v) => PgJson(v).to_sql(ty, out),
                Value::String(s) => PgJson(serde_json::from_str::<serde_json::Value>(s)?)
                    .to_sql(ty, out),
                other => Err(mismatch(other, ty)),
            },
            Type::UUID => match value {
                Value::Uuid(u) => u.to_sql(ty, out),
                Value::String(s) => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
                other => Err(mismatch(other, ty)),
            },
            Type::BYTEA => match value {
                Value::Bytes(b) => b.to_sql(ty, out),
                Value::String(s) => s.as_bytes().to_sql(ty, out),
                other => Err(mismatch(other, ty)),
            },
            Type::DATE => match value {
                Value::Date(d) => d.to_sql(ty, out),
                Value::TimestampNaive(ts) => ts.date().to_sql(ty, out),
                Value::Timestamp(ts) => ts.date_naive().to_sql(ty, out),
                Value::String(s) => NaiveDate::from_str(s.trim())?.to_sql(ty, out),
                other => Err(mismatch(other, ty)),
            },
            Type::TIMESTAMP => match value {
                Value::TimestampNaive(ts) => ts.to_sql(ty, out),
                Value::Timestamp(ts) => ts.naive_utc().to_sql(ty, out),
                Value::Date(d) => d.and_hms_opt(0, 0, 0).to_sql(ty, out),
                Value::String(s) => NaiveDateTime::from_str(s.trim())?.to_sql(ty, out),
                other => Err(mismatch(other, ty)),
            },
            Type::TIMESTAMPTZ => match value {
                Value::Timestamp(ts) => ts.to_sql(ty, out),
                Value::TimestampNaive(ts) => ts.and_utc().to_sql(ty, out),
                Value::Date(d) => d
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc())
                    .to_sql(ty, out),
                other => Err(mismatch(other, ty)),
            },
            _ => match value {
                // Text-like columns take the display form of any scalar.
                Value::Bytes(b) => b.to_sql(ty, out),
                Value::Json(v) => v.to_string().to_sql(ty, out),
                other => match other.as_string() {
                    Some(s) => s.to_sql(ty, out),
                    None => Err(mismatch(other, ty)),
                },
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn integer(value: &Value, ty: &Type) -> Result<i64, BoxError> {
    match value {
        Value::Boolean(b) => Ok(i64::from(*b)),
        Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        Value::Decimal(d) => d.to_i64().ok_or_else(|| mismatch(value, ty)),
        other => other.as_i64().ok_or_else(|| mismatch(other, ty)),
    }
}

fn float(value: &Value, ty: &Type) -> Result<f64, BoxError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::Uint(u) => Ok(*u as f64),
        Value::Decimal(d) => d.to_f64().ok_or_else(|| mismatch(value, ty)),
        Value::String(s) => Ok(s.trim().parse::<f64>()?),
        other => Err(mismatch(other, ty)),
    }
}

fn decimal(value: &Value, ty: &Type) -> Result<RustDecimal, BoxError> {
    match value {
        // A value outside the range of NUMERIC's binary form is refused.
        Value::Decimal(v) => {
            let text = v.to_string();
            RustDecimal::from_str(&text)
                .or_else(|_| RustDecimal::from_scientific(&text))
                .map_err(|_| mismatch(value, ty))
        }
        Value::Int(i) => Ok(RustDecimal::from(*i)),
        Value::Uint(u) => Ok(RustDecimal::from(*u)),
        Value::Float(f) => RustDecimal::from_f64(*f).ok_or_else(|| mismatch(value, ty)),
        Value::String(s) => Ok(RustDecimal::from_str(s.trim())?),
        other => Err(mismatch(other, ty)),
    }
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot bind {value} to a {ty} column").into()
}

pub struct PgParamStore {
    pub params: Vec<PgParam>,
}

impl PgParamStore {
    pub fn from_values(values: &[Value]) -> Self {
        Self {
            params: values.iter().cloned().map(PgParam::from_value).collect(),
        }
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param as &(dyn ToSql + Sync))
            .collect::<Vec<_>>()
    }
}
