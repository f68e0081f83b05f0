//! Text and conversion functions

use super::type_error;
use crate::error::{FormulaError, FormulaResult};
use crate::value::FormulaValue;
use regex::Regex;

fn string_args<'v>(
    input: &'v FormulaValue,
    arg: &'v FormulaValue,
    what: &str,
) -> FormulaResult<(&'v str, &'v str)> {
    match (input.as_str(), arg.as_str()) {
        (Some(s), Some(a)) => Ok((s, a)),
        _ => Err(FormulaError::eval(format!("{} requires string inputs", what))),
    }
}

/// Whether `text` looks like a number literal. Rejects forms such as
/// `inf` or `NaN` that `f64::from_str` would otherwise accept.
fn is_numeric_literal(text: &str) -> bool {
    !text.is_empty()
        && text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

/// tostring
pub fn fn_tostring(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::String(input.to_text()))
}

/// tonumber
pub fn fn_tonumber(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    match input {
        FormulaValue::Number(_) => Ok(input.clone()),
        FormulaValue::String(s) => {
            let trimmed = s.trim();
            if is_numeric_literal(trimmed) {
                if let Ok(n) = trimmed.parse::<f64>() {
                    return Ok(FormulaValue::Number(n));
                }
            }
            Err(FormulaError::eval(format!("Cannot parse '{}' as JSON", s)))
        }
        _ => Err(type_error(input, "cannot be parsed as a number")),
    }
}

/// tojson
pub fn fn_tojson(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::String(input.to_json_string()))
}

/// fromjson
pub fn fn_fromjson(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let text = input
        .as_str()
        .ok_or_else(|| type_error(input, "only strings can be parsed"))?;
    serde_json::from_str::<serde_json::Value>(text)
        .map(FormulaValue::from)
        .map_err(|e| FormulaError::eval(format!("{} (while parsing '{}')", e, text)))
}

/// ascii_downcase
pub fn fn_ascii_downcase(
    input: &FormulaValue,
    _args: &[FormulaValue],
) -> FormulaResult<FormulaValue> {
    input
        .as_str()
        .map(|s| FormulaValue::String(s.to_ascii_lowercase()))
        .ok_or_else(|| FormulaError::eval("ascii_downcase input must be a string"))
}

/// ascii_upcase
pub fn fn_ascii_upcase(
    input: &FormulaValue,
    _args: &[FormulaValue],
) -> FormulaResult<FormulaValue> {
    input
        .as_str()
        .map(|s| FormulaValue::String(s.to_ascii_uppercase()))
        .ok_or_else(|| FormulaError::eval("ascii_upcase input must be a string"))
}

/// ltrimstr(prefix): non-strings pass through unchanged
pub fn fn_ltrimstr(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    if let (Some(s), Some(prefix)) = (input.as_str(), args[0].as_str()) {
        if let Some(rest) = s.strip_prefix(prefix) {
            return Ok(FormulaValue::from(rest));
        }
    }
    Ok(input.clone())
}

/// rtrimstr(suffix): non-strings pass through unchanged
pub fn fn_rtrimstr(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    if let (Some(s), Some(suffix)) = (input.as_str(), args[0].as_str()) {
        if let Some(rest) = s.strip_suffix(suffix) {
            return Ok(FormulaValue::from(rest));
        }
    }
    Ok(input.clone())
}

/// startswith(prefix)
pub fn fn_startswith(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let (s, prefix) = string_args(input, &args[0], "startswith()")?;
    Ok(FormulaValue::Boolean(s.starts_with(prefix)))
}

/// endswith(suffix)
pub fn fn_endswith(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let (s, suffix) = string_args(input, &args[0], "endswith()")?;
    Ok(FormulaValue::Boolean(s.ends_with(suffix)))
}

/// split(separator)
pub fn fn_split(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let (s, separator) = string_args(input, &args[0], "split")?;
    let parts: Vec<FormulaValue> = if s.is_empty() {
        Vec::new()
    } else if separator.is_empty() {
        s.chars().map(|c| FormulaValue::String(c.to_string())).collect()
    } else {
        s.split(separator).map(FormulaValue::from).collect()
    };
    Ok(FormulaValue::Array(parts))
}

/// join(separator)
pub fn fn_join(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let items = match input {
        FormulaValue::Array(items) => items,
        _ => {
            return Err(FormulaError::eval(format!(
                "Cannot iterate over {}",
                input.describe()
            )))
        }
    };
    let separator = args[0]
        .as_str()
        .ok_or_else(|| type_error(&args[0], "cannot be used as a join separator"))?;

    let mut joined = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            joined.push_str(separator);
        }
        match item {
            FormulaValue::Null => {}
            FormulaValue::String(s) => joined.push_str(s),
            FormulaValue::Number(_) | FormulaValue::Boolean(_) => {
                joined.push_str(&item.to_text())
            }
            other => {
                return Err(FormulaError::eval(format!(
                    "Cannot join with {}",
                    other.type_name()
                )))
            }
        }
    }
    Ok(FormulaValue::String(joined))
}

/// test(regex)
pub fn fn_test(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let text = input
        .as_str()
        .ok_or_else(|| type_error(input, "cannot be matched, as it is not a string"))?;
    let pattern = args[0]
        .as_str()
        .ok_or_else(|| type_error(&args[0], "is not a string"))?;
    let regex = Regex::new(pattern).map_err(|e| {
        FormulaError::eval(format!("{} (at offset 0) is not a valid regex: {}", pattern, e))
    })?;
    Ok(FormulaValue::Boolean(regex.is_match(text)))
}
