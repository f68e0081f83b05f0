//! Array and object functions

use super::type_error;
use crate::ast::BinaryOperator;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::apply_binary;
use crate::value::FormulaValue;
use std::cmp::Ordering;

fn array<'v>(input: &'v FormulaValue, what: &str) -> FormulaResult<&'v [FormulaValue]> {
    match input {
        FormulaValue::Array(items) => Ok(items),
        _ => Err(type_error(input, what)),
    }
}

fn sorted(items: &[FormulaValue]) -> Vec<FormulaValue> {
    let mut items = items.to_vec();
    items.sort_by(|a, b| a.compare(b));
    items
}

/// keys: sorted object keys, or array indices
pub fn fn_keys(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    match input {
        FormulaValue::Object(map) => Ok(FormulaValue::Array(
            map.keys().map(|k| FormulaValue::String(k.clone())).collect(),
        )),
        FormulaValue::Array(items) => Ok(FormulaValue::Array(
            (0..items.len())
                .map(|i| FormulaValue::Number(i as f64))
                .collect(),
        )),
        _ => Err(type_error(input, "has no keys")),
    }
}

/// has(key)
pub fn fn_has(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    match (input, &args[0]) {
        (FormulaValue::Object(map), FormulaValue::String(key)) => {
            Ok(FormulaValue::Boolean(map.contains_key(key)))
        }
        (FormulaValue::Array(items), FormulaValue::Number(n)) => {
            Ok(FormulaValue::Boolean(*n >= 0.0 && (*n as usize) < items.len()))
        }
        (value, key) => Err(FormulaError::eval(format!(
            "Cannot check whether {} has a {} key",
            value.type_name(),
            key.type_name()
        ))),
    }
}

fn contains(a: &FormulaValue, b: &FormulaValue) -> bool {
    match (a, b) {
        (FormulaValue::Object(a), FormulaValue::Object(b)) => b
            .iter()
            .all(|(key, b_value)| a.get(key).map_or(false, |a_value| contains(a_value, b_value))),
        (FormulaValue::Array(a), FormulaValue::Array(b)) => b
            .iter()
            .all(|b_item| a.iter().any(|a_item| contains(a_item, b_item))),
        (FormulaValue::String(a), FormulaValue::String(b)) => a.contains(b.as_str()),
        _ => a.type_name() == b.type_name() && a.loose_eq(b),
    }
}

/// contains(b): only a mismatch between the top-level kinds is an error
pub fn fn_contains(input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let needle = &args[0];
    if input.type_name() != needle.type_name() {
        return Err(FormulaError::eval(format!(
            "{} and {} cannot have their containment checked",
            input.describe(),
            needle.describe()
        )));
    }
    Ok(FormulaValue::Boolean(contains(input, needle)))
}

/// add: fold with `+`, `null` for an empty input
pub fn fn_add(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let items: Vec<&FormulaValue> = match input {
        FormulaValue::Null => return Ok(FormulaValue::Null),
        FormulaValue::Array(items) => items.iter().collect(),
        FormulaValue::Object(map) => map.values().collect(),
        _ => {
            return Err(FormulaError::eval(format!(
                "Cannot iterate over {}",
                input.describe()
            )))
        }
    };

    let mut total = FormulaValue::Null;
    for item in items {
        total = apply_binary(BinaryOperator::Add, &total, item)?;
    }
    Ok(total)
}

/// reverse
pub fn fn_reverse(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    match input {
        FormulaValue::Null => Ok(FormulaValue::Array(Vec::new())),
        FormulaValue::String(s) => Ok(FormulaValue::String(s.chars().rev().collect())),
        FormulaValue::Array(items) => Ok(FormulaValue::Array(items.iter().rev().cloned().collect())),
        _ => Err(type_error(input, "cannot be reversed, as it is not an array")),
    }
}

/// sort
pub fn fn_sort(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let items = array(input, "cannot be sorted, as it is not an array")?;
    Ok(FormulaValue::Array(sorted(items)))
}

/// unique: sorted, without duplicates
pub fn fn_unique(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let items = array(input, "cannot be sorted, as it is not an array")?;
    let mut items = sorted(items);
    items.dedup_by(|a, b| a.compare(b) == Ordering::Equal);
    Ok(FormulaValue::Array(items))
}

/// min
pub fn fn_min(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let items = array(input, "cannot be searched, as it is not an array")?;
    Ok(items
        .iter()
        .min_by(|a, b| a.compare(b))
        .cloned()
        .unwrap_or(FormulaValue::Null))
}

/// max
pub fn fn_max(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let items = array(input, "cannot be searched, as it is not an array")?;
    Ok(items
        .iter()
        .max_by(|a, b| a.compare(b))
        .cloned()
        .unwrap_or(FormulaValue::Null))
}
