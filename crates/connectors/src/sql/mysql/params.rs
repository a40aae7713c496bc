use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use model::core::value::Value;
use mysql_async::Value as MySqlValue;
use mysql_common::params::Params;

pub struct MySqlParam(MySqlValue);

impl MySqlParam {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Int(i) => MySqlParam(MySqlValue::Int(*i)),
            Value::Uint(u) => MySqlParam(MySqlValue::UInt(*u)),
            Value::Float(f) => MySqlParam(MySqlValue::Double(*f)),
            Value::Decimal(d) => MySqlParam(MySqlValue::Bytes(d.to_string().into_bytes())),
            Value::String(s) => MySqlParam(MySqlValue::Bytes(s.clone().into_bytes())),
            Value::Boolean(b) => MySqlParam(MySqlValue::Int(if *b { 1 } else { 0 })),
            Value::Json(j) => MySqlParam(MySqlValue::Bytes(j.to_string().into_bytes())),
            Value::Uuid(u) => MySqlParam(MySqlValue::Bytes(u.to_string().into_bytes())),
            Value::Bytes(b) => MySqlParam(MySqlValue::Bytes(b.clone())),
            Value::Date(d) => MySqlParam(date_value(d)),
            Value::Timestamp(ts) => MySqlParam(datetime_value(&ts.naive_utc())),
            Value::TimestampNaive(ts) => MySqlParam(datetime_value(ts)),
            Value::Null => MySqlParam(MySqlValue::NULL),
        }
    }
}

fn date_value(d: &NaiveDate) -> MySqlValue {
    MySqlValue::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
}

fn datetime_value(ts: &NaiveDateTime) -> MySqlValue {
    MySqlValue::Date(
        ts.year() as u16,
        ts.month() as u8,
        ts.day() as u8,
        ts.hour() as u8,
        ts.minute() as u8,
        ts.second() as u8,
        ts.and_utc().timestamp_subsec_micros(),
    )
}

pub struct MySqlParamStore {
    pub params: Vec<MySqlParam>,
}

impl MySqlParamStore {
    pub fn from_values(values: &[Value]) -> Self {
        let params = values.iter().map(MySqlParam::from_value).collect();
        MySqlParamStore { params }
    }

    pub fn params(&self) -> Params {
        let mysql_values: Vec<MySqlValue> = self.params.iter().map(|p| p.0.clone()).collect();
        Params::Positional(mysql_values)
    }
}
