//! Static validation of formula configurations
//!
//! Everything that can be known about a configuration without rows is
//! checked here: required fields, unique output names, decimal precision,
//! column references and compilation.

use crate::compiler::compile_formula;
use crate::context::Context;
use crate::error::{
    ConfigResult, ConfigurationError, BODY_WITHOUT_COLUMNS, BODY_WITHOUT_EXPRESSIONS,
    EXPRESSIONS_REQUIRED, EXPRESSION_FIELDS_REQUIRED, INVALID_INPUT, OUTPUT_NOT_UNIQUE,
};
use crate::resolver::ColumnResolver;
use ahash::AHashSet;
use rowform_core::{Column, Configuration, Expression, OutputType};
use serde_json::Value;

/// Validate `configuration` and return its overview text.
///
/// Formulas are compiled with [`Context::placeholders`], so `$period` and
/// `$pricelist_version` are accepted.
pub fn validate(configuration: &Configuration) -> ConfigResult<String> {
    validate_with_context(configuration, &Context::placeholders())
}

/// Validate `configuration`, compiling formulas against `context`
pub fn validate_with_context(
    configuration: &Configuration,
    context: &Context,
) -> ConfigResult<String> {
    let settings = configuration.settings.as_ref();
    let input = configuration.columns.as_ref().and_then(|c| c.input.as_ref());
    let (Some(settings), Some(input)) = (settings, input) else {
        return Err(ConfigurationError::structural(INVALID_INPUT));
    };
    let expressions = settings
        .expressions
        .as_deref()
        .ok_or_else(|| ConfigurationError::structural(EXPRESSIONS_REQUIRED))?;

    for expression in expressions {
        if expression.output_name().trim().is_empty() || expression.formula_text().trim().is_empty()
        {
            return Err(ConfigurationError::structural(EXPRESSION_FIELDS_REQUIRED));
        }
    }

    check_output_names(expressions, input, configuration.output_columns())?;

    let resolver = ColumnResolver::new(input);
    for expression in expressions {
        check_precision(expression)?;

        let formula = expression.formula_text();
        resolver.resolve_formula(formula)?;
        compile_formula(formula, context).map_err(|e| ConfigurationError::syntax(formula, &e))?;
    }

    tracing::debug!("Validated {} formula expressions", expressions.len());
    Ok(overview(expressions))
}

/// Output names must be unique and must not shadow an input column, unless
/// that column is itself one of the outputs
fn check_output_names(
    expressions: &[Expression],
    input: &[Column],
    output: &[Column],
) -> ConfigResult<()> {
    let input_names: AHashSet<&str> = input.iter().map(|c| c.name.as_str()).collect();
    let output_names: AHashSet<&str> = output.iter().map(|c| c.name.as_str()).collect();
    let mut seen = AHashSet::with_capacity(expressions.len());

    for expression in expressions {
        let name = expression.output_name();
        if !seen.insert(name) {
            return Err(ConfigurationError::structural(OUTPUT_NOT_UNIQUE));
        }
        if input_names.contains(name) && !output_names.contains(name) {
            return Err(ConfigurationError::structural(format!(
                "Column `{name}` already exists."
            )));
        }
    }
    Ok(())
}

fn check_precision(expression: &Expression) -> ConfigResult<()> {
    let name = expression.output_name();
    match (expression.output_type(), expression.precision) {
        (OutputType::Decimal, None) => Err(ConfigurationError::structural(format!(
            "Expression `{name}` of type decimal must have `precision`."
        ))),
        (output_type, Some(_)) if output_type != OutputType::Decimal => {
            Err(ConfigurationError::structural(format!(
                "Expression `{name}` of type {output_type} must not have `precision`."
            )))
        }
        _ => Ok(()),
    }
}

/// One `to = formula` line per expression
pub fn overview(expressions: &[Expression]) -> String {
    expressions
        .iter()
        .map(|e| format!("{} = {}\n", e.output_name(), e.formula_text()))
        .collect()
}

/// Validate a configuration given as a raw JSON document
pub fn validate_json(data: &Value) -> ConfigResult<String> {
    let settings = data.get("settings").filter(|s| s.is_object());
    let input = data.get("columns").and_then(|c| c.get("input"));
    let (Some(settings), Some(_)) = (settings, input) else {
        return Err(ConfigurationError::structural(INVALID_INPUT));
    };

    let expressions = settings
        .get("expressions")
        .and_then(Value::as_array)
        .ok_or_else(|| ConfigurationError::structural(EXPRESSIONS_REQUIRED))?;

    for expression in expressions {
        let has_text = |field: &str| expression.get(field).map_or(false, Value::is_string);
        if !has_text("to") || !has_text("formula") {
            return Err(ConfigurationError::structural(EXPRESSION_FIELDS_REQUIRED));
        }
        if let Some(output_type) = expression.get("type").filter(|t| !t.is_null()) {
            output_type
                .as_str()
                .unwrap_or_default()
                .parse::<OutputType>()
                .map_err(|e| ConfigurationError::structural(e.to_string()))?;
        }
    }

    let configuration: Configuration = serde_json::from_value(data.clone())
        .map_err(|_| ConfigurationError::structural(INVALID_INPUT))?;
    validate(&configuration)
}

/// The catalog columns referenced by any of `formulas`, without duplicates, in
/// order of first reference. Any unresolved reference is an error.
pub fn extract_referenced_columns<'f, I>(formulas: I, catalog: &[Column]) -> ConfigResult<Vec<Column>>
where
    I: IntoIterator<Item = &'f str>,
{
    let resolver = ColumnResolver::new(catalog);
    let mut seen = AHashSet::new();
    let mut columns = Vec::new();

    for formula in formulas {
        for column in resolver.resolve_formula(formula)? {
            let key = column.id.as_deref().unwrap_or(&column.name);
            if seen.insert(key.to_string()) {
                columns.push(column.clone());
            }
        }
    }

    Ok(columns)
}

/// [`extract_referenced_columns`] over a JSON body with `expressions` and
/// `columns` lists
pub fn extract_input(body: &Value) -> ConfigResult<Vec<Column>> {
    let expressions = body
        .get("expressions")
        .and_then(Value::as_array)
        .ok_or_else(|| ConfigurationError::structural(BODY_WITHOUT_EXPRESSIONS))?;
    let columns = body
        .get("columns")
        .and_then(Value::as_array)
        .ok_or_else(|| ConfigurationError::structural(BODY_WITHOUT_COLUMNS))?;

    let catalog = columns
        .iter()
        .map(|column| serde_json::from_value::<Column>(column.clone()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigurationError::structural(INVALID_INPUT))?;

    let formulas = expressions
        .iter()
        .filter_map(|expression| expression.get("formula").and_then(Value::as_str));

    extract_referenced_columns(formulas, &catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("COL-1-0001", "price"),
            Column::new("COL-1-0002", "tax"),
            Column::new("COL-1-0003", "Unit count"),
        ]
    }

    #[test]
    fn test_overview() {
        let config = Configuration::new(
            vec![
                Expression::new("Total", ".price * .\"Unit count\""),
                Expression::new("Period", "$period.start"),
            ],
            columns(),
        );
        assert_eq!(
            validate(&config).unwrap(),
            "Total = .price * .\"Unit count\"\nPeriod = $period.start\n"
        );
    }

    #[test]
    fn test_duplicate_output_regardless_of_formula() {
        let config = Configuration::new(
            vec![
                Expression::new("Out", ".missing +"),
                Expression::new("Out", ".price"),
            ],
            columns(),
        );
        assert_eq!(
            validate(&config).unwrap_err(),
            ConfigurationError::Structural(OUTPUT_NOT_UNIQUE.into())
        );
    }

    #[test]
    fn test_output_shadowing_input() {
        let config = Configuration::new(vec![Expression::new("price", ".price")], columns());
        assert_eq!(
            validate(&config).unwrap_err().to_string(),
            "Column `price` already exists."
        );
    }

    #[test]
    fn test_precision_rules() {
        let missing = Configuration::new(
            vec![Expression::new("Total", ".price").with_type(OutputType::Decimal)],
            columns(),
        );
        assert_eq!(validate(&missing).unwrap_err().kind(), "structural");

        let extra = Configuration::new(
            vec![Expression::new("Total", ".price").with_precision(2)],
            columns(),
        );
        assert_eq!(validate(&extra).unwrap_err().kind(), "structural");
    }

    #[test]
    fn test_resolution_and_syntax_errors() {
        let config = Configuration::new(vec![Expression::new("A", ".price + .qty")], columns());
        assert_eq!(
            validate(&config).unwrap_err(),
            ConfigurationError::resolution(".price + .qty", "qty")
        );

        let config = Configuration::new(vec![Expression::new("A", ".price +")], columns());
        assert_eq!(validate(&config).unwrap_err().kind(), "syntax");

        let config = Configuration::new(vec![Expression::new("A", "nosuch(.price)")], columns());
        let err = validate(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Settings contains invalid formula `nosuch(.price)`: nosuch/1 is not defined"
        );
    }

    #[test]
    fn test_validate_json_structure() {
        let err = validate_json(&json!({"settings": {}})).unwrap_err();
        assert_eq!(err.to_string(), INVALID_INPUT);

        let err = validate_json(&json!({"settings": {}, "columns": {"input": []}})).unwrap_err();
        assert_eq!(err.to_string(), EXPRESSIONS_REQUIRED);

        let err = validate_json(&json!({
            "settings": {"expressions": [{"to": "A"}]},
            "columns": {"input": []}
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), EXPRESSION_FIELDS_REQUIRED);

        let err = validate_json(&json!({
            "settings": {"expressions": [{"to": "A", "formula": "1", "type": "money"}]},
            "columns": {"input": []}
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Unknown output type: money");

        let overview = validate_json(&json!({
            "settings": {"expressions": [{"to": "A", "formula": ".price", "type": "integer"}]},
            "columns": {"input": [{"id": "COL-1", "name": "price"}], "output": []}
        }))
        .unwrap();
        assert_eq!(overview, "A = .price\n");
    }

    #[test]
    fn test_extract_referenced_columns() {
        let catalog = columns();
        let found = extract_referenced_columns(
            [".tax * .price", ".price + .\"Unit count\"", "1"],
            &catalog,
        )
        .unwrap();
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["tax", "price", "Unit count"]);

        let err = extract_referenced_columns([".price + .discount"], &catalog).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::resolution(".price + .discount", "discount")
        );
    }

    #[test]
    fn test_extract_input_body() {
        let err = extract_input(&json!({"columns": []})).unwrap_err();
        assert_eq!(err.to_string(), BODY_WITHOUT_EXPRESSIONS);
        let err = extract_input(&json!({"expressions": []})).unwrap_err();
        assert_eq!(err.to_string(), BODY_WITHOUT_COLUMNS);

        let found = extract_input(&json!({
            "expressions": [{"to": "B", "formula": ".a + .a"}],
            "columns": [{"id": "COL-1", "name": "a"}, {"id": "COL-2", "name": "b"}]
        }))
        .unwrap();
        assert_eq!(found, vec![Column::new("COL-1", "a")]);
    }
}
