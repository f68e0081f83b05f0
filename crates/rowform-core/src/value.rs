//! Row, context and output value types

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One input record: field name → value
pub type Row = BTreeMap<String, RecordValue>;

/// A date or time value as carried by rows and stream/batch contexts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Temporal {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl fmt::Display for Temporal {
    /// Canonical text form: `2022-02-10`, `2022-02-10 10:23:54[.ffffff]`,
    /// and `+HH:MM` appended for zoned values
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_datetime(f: &mut fmt::Formatter<'_>, dt: &NaiveDateTime) -> fmt::Result {
            write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))?;
            let micros = dt.nanosecond() / 1_000 % 1_000_000;
            if micros != 0 {
                write!(f, ".{:06}", micros)?;
            }
            Ok(())
        }

        match self {
            Temporal::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Temporal::DateTime(dt) => write_datetime(f, dt),
            Temporal::Zoned(dt) => {
                write_datetime(f, &dt.naive_local())?;
                write!(f, "{}", dt.format("%:z"))
            }
        }
    }
}

/// A value stored in a row or in a stream/batch context
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum RecordValue {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    Temporal(Temporal),
    List(Vec<RecordValue>),
    Map(BTreeMap<String, RecordValue>),
}

impl RecordValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RecordValue::Null)
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            RecordValue::Null => "null",
            RecordValue::Boolean(_) => "boolean",
            RecordValue::Number(_) => "number",
            RecordValue::Text(_) => "string",
            RecordValue::Temporal(_) => "temporal",
            RecordValue::List(_) => "array",
            RecordValue::Map(_) => "object",
        }
    }

    /// Replace every temporal value, at any depth, with its canonical text form
    pub fn stringify_temporals(self) -> Self {
        match self {
            RecordValue::Temporal(t) => RecordValue::Text(t.to_string()),
            RecordValue::List(items) => {
                RecordValue::List(items.into_iter().map(Self::stringify_temporals).collect())
            }
            RecordValue::Map(map) => RecordValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, v.stringify_temporals()))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl From<serde_json::Value> for RecordValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RecordValue::Null,
            serde_json::Value::Bool(b) => RecordValue::Boolean(b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(RecordValue::Number)
                .unwrap_or(RecordValue::Null),
            serde_json::Value::String(s) => RecordValue::Text(s),
            serde_json::Value::Array(items) => {
                RecordValue::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                RecordValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<RecordValue> for serde_json::Value {
    fn from(value: RecordValue) -> Self {
        match value {
            RecordValue::Null => serde_json::Value::Null,
            RecordValue::Boolean(b) => serde_json::Value::Bool(b),
            RecordValue::Number(n) => number_to_json(n),
            RecordValue::Text(s) => serde_json::Value::String(s),
            RecordValue::Temporal(t) => serde_json::Value::String(t.to_string()),
            RecordValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            RecordValue::Map(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Integral values are emitted as JSON integers so `100.0` round-trips as `100`
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::Text(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::Text(s)
    }
}

impl From<f64> for RecordValue {
    fn from(n: f64) -> Self {
        RecordValue::Number(n)
    }
}

impl From<i64> for RecordValue {
    fn from(n: i64) -> Self {
        RecordValue::Number(n as f64)
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        RecordValue::Boolean(b)
    }
}

impl From<Temporal> for RecordValue {
    fn from(t: Temporal) -> Self {
        RecordValue::Temporal(t)
    }
}

impl From<NaiveDateTime> for RecordValue {
    fn from(dt: NaiveDateTime) -> Self {
        RecordValue::Temporal(Temporal::DateTime(dt))
    }
}

impl<T: Into<RecordValue>> From<Option<T>> for RecordValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RecordValue::Null)
    }
}

/// The outcome of casting a formula value to a declared output type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    DateTime(Temporal),
    /// The source value cannot be mapped into the output type. Distinct from
    /// every valid value of the type, null included.
    Unrepresentable,
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    pub fn is_unrepresentable(&self) -> bool {
        matches!(self, TypedValue::Unrepresentable)
    }

    /// JSON rendering for hosts that exchange rows as JSON. Decimals render as
    /// strings to keep their scale; an unrepresentable value renders as
    /// `{"unrepresentable": true}` so it never reads as null or false.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TypedValue::Null => serde_json::Value::Null,
            TypedValue::String(s) => serde_json::Value::String(s.clone()),
            TypedValue::Integer(i) => serde_json::Value::from(*i),
            TypedValue::Decimal(d) => serde_json::Value::String(d.to_string()),
            TypedValue::Boolean(b) => serde_json::Value::Bool(*b),
            TypedValue::DateTime(t) => serde_json::Value::String(t.to_string()),
            TypedValue::Unrepresentable => serde_json::json!({ "unrepresentable": true }),
        }
    }
}
