//! Math functions

use super::type_error;
use crate::error::FormulaResult;
use crate::value::FormulaValue;

fn number(value: &FormulaValue) -> FormulaResult<f64> {
    value
        .as_number()
        .ok_or_else(|| type_error(value, "number required"))
}

fn unary(input: &FormulaValue, f: fn(f64) -> f64) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(f(number(input)?)))
}

/// floor
pub fn fn_floor(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::floor)
}

/// ceil
pub fn fn_ceil(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::ceil)
}

/// round: half away from zero
pub fn fn_round(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::round)
}

/// trunc
pub fn fn_trunc(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::trunc)
}

/// fabs
pub fn fn_fabs(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::abs)
}

/// sqrt
pub fn fn_sqrt(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::sqrt)
}

/// log (natural)
pub fn fn_log(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::ln)
}

/// log10
pub fn fn_log10(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::log10)
}

/// exp
pub fn fn_exp(input: &FormulaValue, _args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    unary(input, f64::exp)
}

/// pow(base; exponent)
pub fn fn_pow(_input: &FormulaValue, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let base = number(&args[0])?;
    let exponent = number(&args[1])?;
    Ok(FormulaValue::Number(base.powf(exponent)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> FormulaValue {
        FormulaValue::Number(v)
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(fn_round(&n(2.5), &[]).unwrap(), n(3.0));
        assert_eq!(fn_round(&n(-2.5), &[]).unwrap(), n(-3.0));
        assert_eq!(fn_round(&n(1056.7), &[]).unwrap(), n(1057.0));
    }

    #[test]
    fn test_floor_ceil_trunc() {
        assert_eq!(fn_floor(&n(-1.5), &[]).unwrap(), n(-2.0));
        assert_eq!(fn_ceil(&n(-1.5), &[]).unwrap(), n(-1.0));
        assert_eq!(fn_trunc(&n(-1.5), &[]).unwrap(), n(-1.0));
    }

    #[test]
    fn test_pow() {
        assert_eq!(fn_pow(&FormulaValue::Null, &[n(10.0), n(2.0)]).unwrap(), n(100.0));
        assert_eq!(fn_pow(&FormulaValue::Null, &[n(2.0), n(-2.0)]).unwrap(), n(0.25));
    }

    #[test]
    fn test_number_required() {
        let err = fn_floor(&FormulaValue::from("x"), &[]).unwrap_err();
        assert_eq!(err.to_string(), r#"string ("x") number required"#);
    }
}
