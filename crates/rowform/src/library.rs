//! Helper definitions available in every compiled expression
//!
//! The definitions are written in the formula language and joined into a
//! single prelude that is placed in front of each user formula.
//!
//! `round/1` takes the number to round as its argument and drops the
//! fractional part, so `round(10.567)` is `10`. It has no pipe form: in
//! `.price | round(2)` the `2` is the number rounded and the piped value is
//! ignored. Piped values are rounded with `round(.; 2)`.

use once_cell::sync::Lazy;

/// Numeric parsing and precision-aware rounding
const COMMON: &[&str] = &[
    // tonumber("2") -> 2
    r#"
    def tonumber($value):
        $value | tonumber
    ;
    "#,
    // round(10.567; 2) -> 10.57, round(10.567; 1) -> 10.6, round(10.567) -> 10
    r#"
    def round($number; $precision):
        pow(10; $precision | floor) as $m | $number * $m | round / $m
    ;
    def round($number):
        $number | trunc
    ;
    "#,
];

/// Pricing ratios, in percent
const PRICING: &[&str] = &[
    r#"
    def gross_profit($list_price; $cogs):
        $list_price - $cogs
    ;
    "#,
    r#"
    def margin($list_price; $cogs):
        gross_profit($list_price; $cogs) / $list_price * 100
    ;
    "#,
    r#"
    def markup($list_price; $cogs):
        gross_profit($list_price; $cogs) / $cogs * 100
    ;
    "#,
];

static PRELUDE: Lazy<String> = Lazy::new(|| {
    COMMON
        .iter()
        .chain(PRICING)
        .flat_map(|definition| definition.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
});

/// The whole prelude as one line of definitions
pub fn prelude() -> &'static str {
    &PRELUDE
}

/// Names and arities of the prelude definitions
pub fn definitions() -> Vec<(&'static str, usize)> {
    vec![
        ("tonumber", 1),
        ("round", 2),
        ("round", 1),
        ("gross_profit", 2),
        ("margin", 2),
        ("markup", 2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowform_formula::{parse_formula, Expr, FormulaValue, Program};

    fn eval(formula: &str) -> Option<FormulaValue> {
        let source = format!("{} {}", prelude(), formula);
        Program::compile(&source, Vec::<(String, FormulaValue)>::new())
            .unwrap()
            .first(&FormulaValue::Null)
            .unwrap()
    }

    #[test]
    fn test_prelude_is_one_line() {
        assert!(!prelude().contains('\n'));
        assert!(prelude().starts_with("def tonumber($value): $value | tonumber ;"));
    }

    #[test]
    fn test_prelude_defines_listed_functions() {
        let mut expr = parse_formula(&format!("{} .", prelude())).unwrap();
        let mut found = Vec::new();
        while let Expr::Define { def, body } = expr {
            found.push((def.name.clone(), def.arity()));
            expr = *body;
        }
        let expected: Vec<(String, usize)> = definitions()
            .into_iter()
            .map(|(name, arity)| (name.to_string(), arity))
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(eval("round(10.567; 2)"), Some(FormulaValue::Number(10.57)));
        assert_eq!(eval("round(10.567; 1)"), Some(FormulaValue::Number(10.6)));
        assert_eq!(eval("round(10.567)"), Some(FormulaValue::Number(10.0)));
        assert_eq!(eval("round(-10.567)"), Some(FormulaValue::Number(-10.0)));
        assert_eq!(eval("round(1250; -2)"), Some(FormulaValue::Number(1300.0)));
    }

    #[test]
    fn test_rounding_piped_values() {
        assert_eq!(eval("10.567 | round(.; 1)"), Some(FormulaValue::Number(10.6)));
        assert_eq!(eval("10.567 | round(2)"), Some(FormulaValue::Number(2.0)));
        assert_eq!(eval("10.567 | round"), Some(FormulaValue::Number(11.0)));
    }

    #[test]
    fn test_tonumber() {
        assert_eq!(eval(r#"tonumber("2")"#), Some(FormulaValue::Number(2.0)));
        assert_eq!(eval(r#""2.5" | tonumber"#), Some(FormulaValue::Number(2.5)));
    }

    #[test]
    fn test_pricing() {
        assert_eq!(
            eval("round(gross_profit(115.23; 110); 2)"),
            Some(FormulaValue::Number(5.23))
        );
        assert_eq!(
            eval("round(margin(115.23; 110); 2)"),
            Some(FormulaValue::Number(4.54))
        );
        assert_eq!(
            eval("round(markup(115.23; 110); 2)"),
            Some(FormulaValue::Number(4.75))
        );
    }
}
