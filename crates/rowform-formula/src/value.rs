//! Values produced and consumed by formulas

use rowform_core::RecordValue;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<FormulaValue>),
    Object(BTreeMap<String, FormulaValue>),
}

impl FormulaValue {
    /// Type name as reported by the `type` built-in
    pub fn type_name(&self) -> &'static str {
        match self {
            FormulaValue::Null => "null",
            FormulaValue::Boolean(_) => "boolean",
            FormulaValue::Number(_) => "number",
            FormulaValue::String(_) => "string",
            FormulaValue::Array(_) => "array",
            FormulaValue::Object(_) => "object",
        }
    }

    /// Only `false` and `null` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, FormulaValue::Null | FormulaValue::Boolean(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FormulaValue::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormulaValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Compact JSON text, as produced by `tojson`
    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        match self {
            FormulaValue::Null => out.push_str("null"),
            FormulaValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            FormulaValue::Number(n) => out.push_str(&format_number(*n)),
            FormulaValue::String(s) => {
                out.push_str(&serde_json::Value::String(s.clone()).to_string())
            }
            FormulaValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_json(out);
                }
                out.push(']');
            }
            FormulaValue::Object(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::Value::String(key.clone()).to_string());
                    out.push(':');
                    value.write_json(out);
                }
                out.push('}');
            }
        }
    }

    /// Text form used by `tostring` and string interpolation: strings are
    /// taken verbatim, everything else is rendered as JSON
    pub fn to_text(&self) -> String {
        match self {
            FormulaValue::String(s) => s.clone(),
            other => other.to_json_string(),
        }
    }

    /// Short rendering used inside error messages, e.g. `string ("twenty")`
    pub fn describe(&self) -> String {
        let mut dump = self.to_json_string();
        if dump.len() > 11 {
            let mut cut = 11;
            while !dump.is_char_boundary(cut) {
                cut -= 1;
            }
            dump.truncate(cut);
            dump.push_str("...");
        }
        format!("{} ({})", self.type_name(), dump)
    }

    /// Message carried by an error raised with this value
    pub fn error_message(&self) -> String {
        match self {
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Null => "null (null)".to_string(),
            other => format!("{} (not a string)", other.to_json_string()),
        }
    }

    /// Total ordering: null < false < true < numbers < strings < arrays < objects
    pub fn compare(&self, other: &FormulaValue) -> Ordering {
        fn rank(v: &FormulaValue) -> u8 {
            match v {
                FormulaValue::Null => 0,
                FormulaValue::Boolean(false) => 1,
                FormulaValue::Boolean(true) => 2,
                FormulaValue::Number(_) => 3,
                FormulaValue::String(_) => 4,
                FormulaValue::Array(_) => 5,
                FormulaValue::Object(_) => 6,
            }
        }

        match (self, other) {
            (FormulaValue::Number(l), FormulaValue::Number(r)) => {
                l.partial_cmp(r).unwrap_or(Ordering::Equal)
            }
            (FormulaValue::String(l), FormulaValue::String(r)) => l.cmp(r),
            (FormulaValue::Array(l), FormulaValue::Array(r)) => {
                for (a, b) in l.iter().zip(r.iter()) {
                    let ord = a.compare(b);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                l.len().cmp(&r.len())
            }
            (FormulaValue::Object(l), FormulaValue::Object(r)) => {
                // Keys first, then values in key order
                let lk: Vec<&String> = l.keys().collect();
                let rk: Vec<&String> = r.keys().collect();
                match lk.cmp(&rk) {
                    Ordering::Equal => {
                        for (a, b) in l.values().zip(r.values()) {
                            let ord = a.compare(b);
                            if ord != Ordering::Equal {
                                return ord;
                            }
                        }
                        Ordering::Equal
                    }
                    ord => ord,
                }
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }

    /// Structural equality as used by `==`
    pub fn loose_eq(&self, other: &FormulaValue) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

/// Format a number the way formulas print it: integral values without a
/// fractional part, non-finite values clamped
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "null".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "1.7976931348623157e+308".to_string()
        } else {
            "-1.7976931348623157e+308".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e17 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl From<serde_json::Value> for FormulaValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FormulaValue::Null,
            serde_json::Value::Bool(b) => FormulaValue::Boolean(b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(FormulaValue::Number)
                .unwrap_or(FormulaValue::Null),
            serde_json::Value::String(s) => FormulaValue::String(s),
            serde_json::Value::Array(items) => {
                FormulaValue::Array(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                FormulaValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<FormulaValue> for serde_json::Value {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Null => serde_json::Value::Null,
            FormulaValue::Boolean(b) => serde_json::Value::Bool(b),
            FormulaValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::from(n as i64)
                } else {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            FormulaValue::String(s) => serde_json::Value::String(s),
            FormulaValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            FormulaValue::Object(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Temporal values are exposed to formulas as their canonical text form
impl From<RecordValue> for FormulaValue {
    fn from(value: RecordValue) -> Self {
        match value {
            RecordValue::Null => FormulaValue::Null,
            RecordValue::Boolean(b) => FormulaValue::Boolean(b),
            RecordValue::Number(n) => FormulaValue::Number(n),
            RecordValue::Text(s) => FormulaValue::String(s),
            RecordValue::Temporal(t) => FormulaValue::String(t.to_string()),
            RecordValue::List(items) => {
                FormulaValue::Array(items.into_iter().map(Into::into).collect())
            }
            RecordValue::Map(map) => {
                FormulaValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::String(s)
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(0.2), "0.2");
        assert_eq!(format_number(-3.5), "-3.5");
        assert_eq!(format_number(f64::INFINITY), "1.7976931348623157e+308");
    }

    #[test]
    fn test_to_json_string() {
        let value = FormulaValue::from(json!({"b": [1, "x", null], "a": true}));
        assert_eq!(value.to_json_string(), r#"{"a":true,"b":[1,"x",null]}"#);
    }

    #[test]
    fn test_describe_truncates() {
        assert_eq!(
            FormulaValue::from("twenty").describe(),
            r#"string ("twenty")"#
        );
        assert_eq!(
            FormulaValue::from("a rather long string").describe(),
            r#"string ("a rather l...)"#
        );
    }

    #[test]
    fn test_ordering() {
        let ordered = vec![
            FormulaValue::Null,
            FormulaValue::Boolean(false),
            FormulaValue::Boolean(true),
            FormulaValue::Number(-1.0),
            FormulaValue::Number(2.0),
            FormulaValue::from("a"),
            FormulaValue::from(json!([])),
            FormulaValue::from(json!({})),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].compare(&pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!FormulaValue::Null.is_truthy());
        assert!(!FormulaValue::Boolean(false).is_truthy());
        assert!(FormulaValue::Number(0.0).is_truthy());
        assert!(FormulaValue::from("").is_truthy());
    }
}
