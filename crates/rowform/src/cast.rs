//! Casting formula values to declared output types

use crate::error::{EvalResult, EvaluationError};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use lazy_regex::regex_captures;
use rowform_core::{OutputType, Temporal, TypedValue};
use rowform_formula::FormulaValue;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

const TRUE_TOKENS: &[&str] = &["true", "1", "y", "yes"];
const FALSE_TOKENS: &[&str] = &["false", "0", "n", "no"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%d %B %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Cast `value` to `output_type`. Null and empty text become null for every type.
///
/// `precision` is the number of fractional digits of decimal outputs.
pub fn cast(
    value: &FormulaValue,
    output_type: OutputType,
    precision: Option<u32>,
) -> EvalResult<TypedValue> {
    match value {
        FormulaValue::Null => return Ok(TypedValue::Null),
        FormulaValue::String(s) if s.is_empty() => return Ok(TypedValue::Null),
        _ => {}
    }

    match output_type {
        OutputType::String => Ok(TypedValue::String(value.to_text())),
        OutputType::Integer => to_integer(value).map(TypedValue::Integer),
        OutputType::Decimal => to_decimal(value, precision).map(TypedValue::Decimal),
        OutputType::Boolean => Ok(to_boolean(value)),
        OutputType::Datetime => to_datetime(value).map(TypedValue::DateTime),
    }
}

fn cast_error(value: &FormulaValue, output_type: OutputType) -> EvaluationError {
    EvaluationError::Cast {
        value: value.describe(),
        output_type,
    }
}

fn to_integer(value: &FormulaValue) -> EvalResult<i64> {
    let number = match value {
        FormulaValue::Boolean(b) => return Ok(i64::from(*b)),
        FormulaValue::Number(n) => Some(*n),
        FormulaValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    number
        .filter(|n| n.is_finite() && n.abs() < 9.2e18)
        .map(|n| n.trunc() as i64)
        .ok_or_else(|| cast_error(value, OutputType::Integer))
}

fn to_decimal(value: &FormulaValue, precision: Option<u32>) -> EvalResult<Decimal> {
    let decimal = match value {
        FormulaValue::Number(n) => Decimal::from_f64(*n),
        FormulaValue::String(s) => {
            let normalized = s.trim().replace(',', ".");
            Decimal::from_str(&normalized)
                .or_else(|_| Decimal::from_scientific(&normalized))
                .ok()
        }
        _ => None,
    }
    .ok_or_else(|| cast_error(value, OutputType::Decimal))?;

    Ok(match precision {
        Some(dp) => {
            let mut rounded =
                decimal.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
            rounded.rescale(dp);
            rounded
        }
        None => decimal,
    })
}

fn to_boolean(value: &FormulaValue) -> TypedValue {
    let token = match value {
        FormulaValue::Boolean(b) => return TypedValue::Boolean(*b),
        FormulaValue::Number(_) | FormulaValue::String(_) => value.to_text().trim().to_lowercase(),
        _ => return TypedValue::Unrepresentable,
    };

    if TRUE_TOKENS.contains(&token.as_str()) {
        TypedValue::Boolean(true)
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        TypedValue::Boolean(false)
    } else {
        TypedValue::Unrepresentable
    }
}

fn to_datetime(value: &FormulaValue) -> EvalResult<Temporal> {
    value
        .as_str()
        .and_then(parse_datetime)
        .ok_or_else(|| cast_error(value, OutputType::Datetime))
}

/// Parse a date or date-time in one of the common notations, with an optional
/// trailing zone (`UTC`, `GMT`, `Z` or a `±HH:MM` offset)
pub fn parse_datetime(text: &str) -> Option<Temporal> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Temporal::Zoned(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(Temporal::Zoned(dt));
    }

    if let Some((_, local, zone)) =
        regex_captures!(r"^(.*\d)\s*(UTC|GMT|Z|[+-]\d{2}:?\d{2})$"i, text)
    {
        let offset = parse_offset(zone)?;
        let naive = parse_naive(local)?;
        return offset
            .from_local_datetime(&naive)
            .single()
            .map(Temporal::Zoned);
    }

    parse_naive(text).map(Temporal::DateTime)
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    if zone.eq_ignore_ascii_case("utc")
        || zone.eq_ignore_ascii_case("gmt")
        || zone.eq_ignore_ascii_case("z")
    {
        return FixedOffset::east_opt(0);
    }
    let (_, sign, hours, minutes) = regex_captures!(r"^([+-])(\d{2}):?(\d{2})$", zone)?;
    let seconds = hours.parse::<i32>().ok()? * 3600 + minutes.parse::<i32>().ok()? * 60;
    if sign == "-" {
        FixedOffset::west_opt(seconds)
    } else {
        FixedOffset::east_opt(seconds)
    }
}
