//! Type and size functions

use super::type_error;
use crate::error::FormulaResult;
use crate::value::FormulaValue;

/// length
pub fn fn_length(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let len = match input {
        FormulaValue::Null => 0.0,
        FormulaValue::Number(n) => n.abs(),
        FormulaValue::String(s) => s.chars().count() as f64,
        FormulaValue::Array(items) => items.len() as f64,
        FormulaValue::Object(map) => map.len() as f64,
        FormulaValue::Boolean(_) => return Err(type_error(input, "has no length")),
    };
    Ok(FormulaValue::Number(len))
}

/// utf8bytelength
pub fn fn_utf8bytelength(
    input: &FormulaValue,
    _args: &[FormulaValue],
) -> FormulaResult<FormulaValue> {
    match input {
        FormulaValue::String(s) => Ok(FormulaValue::Number(s.len() as f64)),
        _ => Err(type_error(input, "only strings have UTF-8 byte length")),
    }
}

/// not
pub fn fn_not(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(!input.is_truthy()))
}

/// type
pub fn fn_type(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::from(input.type_name()))
}

/// infinite
pub fn fn_infinite(_input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(f64::INFINITY))
}

/// nan
pub fn fn_nan(_input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(f64::NAN))
}

/// isnan
pub fn fn_isnan(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    match input {
        FormulaValue::Number(n) => Ok(FormulaValue::Boolean(n.is_nan())),
        _ => Err(type_error(input, "number required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length() {
        let cases = [
            (json!(null), 0.0),
            (json!(-5), 5.0),
            (json!("héllo"), 5.0),
            (json!([1, 2]), 2.0),
            (json!({"a": 1}), 1.0),
        ];
        for (input, expected) in cases {
            assert_eq!(
                fn_length(&FormulaValue::from(input), &[]).unwrap(),
                FormulaValue::Number(expected)
            );
        }

        let err = fn_length(&FormulaValue::Boolean(true), &[]).unwrap_err();
        assert_eq!(err.to_string(), "boolean (true) has no length");
    }

    #[test]
    fn test_utf8bytelength() {
        assert_eq!(
            fn_utf8bytelength(&FormulaValue::from("é"), &[]).unwrap(),
            FormulaValue::Number(2.0)
        );
        assert!(fn_utf8bytelength(&FormulaValue::Number(1.0), &[]).is_err());
    }
}
