//! Per-instance row transformation
//!
//! A [`FormulaTransformation`] owns one transformation request. Expressions
//! are compiled on the first row (exactly once, even when rows arrive
//! concurrently) and shared read-only by every later row.

use crate::cast::cast;
use crate::compiler::{CompiledExpression, CompiledSet};
use crate::context::Context;
use crate::error::{ConfigResult, EvalResult};
use ahash::AHashSet;
use once_cell::sync::OnceCell;
use rowform_core::{Row, TransformationRequest, TypedValue, DELETE_ROW_SENTINEL};
use rowform_formula::FormulaValue;
use std::collections::BTreeMap;

/// The result of transforming one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Output column → typed value
    Done(BTreeMap<String, TypedValue>),
    /// A formula asked for the row to be removed
    Delete,
    /// The row could not be transformed
    Fail(String),
}

impl RowOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, RowOutcome::Done(_))
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, RowOutcome::Delete)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, RowOutcome::Fail(_))
    }

    /// JSON rendering: `{"status": "success", "row": {..}}`,
    /// `{"status": "delete"}` or `{"status": "fail", "output": ".."}`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RowOutcome::Done(row) => {
                let row: serde_json::Map<String, serde_json::Value> = row
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect();
                serde_json::json!({"status": "success", "row": row})
            }
            RowOutcome::Delete => serde_json::json!({"status": "delete"}),
            RowOutcome::Fail(output) => serde_json::json!({"status": "fail", "output": output}),
        }
    }
}

/// What evaluating one expression contributes to the row
enum Step {
    Value(TypedValue),
    Delete,
}

/// The formula transformation of one processing instance
#[derive(Debug)]
pub struct FormulaTransformation {
    request: TransformationRequest,
    context: Context,
    temporal_fields: AHashSet<String>,
    compiled: OnceCell<CompiledSet>,
}

impl FormulaTransformation {
    /// Create the transformation, building the context from the request
    pub fn new(request: TransformationRequest) -> Self {
        let context = Context::build(&request);
        Self::with_context(request, context)
    }

    /// Create the transformation with an explicit context
    pub fn with_context(request: TransformationRequest, context: Context) -> Self {
        // Rows may key a column by its name or by its alias label
        let temporal_fields = request
            .input_columns()
            .iter()
            .filter(|column| column.is_temporal())
            .flat_map(|column| std::iter::once(column.name.clone()).chain(column.alias_label()))
            .collect();

        Self {
            request,
            context,
            temporal_fields,
            compiled: OnceCell::new(),
        }
    }

    pub fn request(&self) -> &TransformationRequest {
        &self.request
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Compile every expression unless that already happened. A failed
    /// compilation leaves nothing cached and is retried on the next call.
    pub fn precompile(&self) -> ConfigResult<&CompiledSet> {
        self.compiled.get_or_try_init(|| {
            let expressions = self.request.expressions();
            tracing::debug!("Compiling {} formula expressions", expressions.len());
            CompiledSet::compile(expressions, &self.context)
        })
    }

    /// Transform one row
    pub fn evaluate(&self, row: &Row) -> RowOutcome {
        let compiled = match self.precompile() {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::warn!("Formula compilation failed: {e}");
                return RowOutcome::Fail(e.to_string());
            }
        };

        let input = self.formula_input(row);
        let mut result = BTreeMap::new();

        for expression in compiled.iter() {
            let name = expression.output_name();
            match evaluate_expression(expression, &input) {
                Ok(Step::Value(value)) => {
                    result.insert(name.to_string(), value);
                }
                Ok(Step::Delete) => return RowOutcome::Delete,
                Err(e) if expression.expression().ignores_errors() => {
                    tracing::warn!("Ignoring error in expression `{name}`: {e}");
                    result.insert(name.to_string(), TypedValue::Null);
                }
                Err(e) => {
                    tracing::warn!("Expression `{name}` failed: {e}");
                    return RowOutcome::Fail(e.to_string());
                }
            }
        }

        RowOutcome::Done(result)
    }

    /// The row as formula input, temporal columns as text
    fn formula_input(&self, row: &Row) -> FormulaValue {
        let fields = row
            .iter()
            .map(|(name, value)| {
                let value = FormulaValue::from(value.clone());
                let value = if self.temporal_fields.contains(name) && !value.is_null() {
                    FormulaValue::String(value.to_text())
                } else {
                    value
                };
                (name.clone(), value)
            })
            .collect();
        FormulaValue::Object(fields)
    }
}

fn evaluate_expression(compiled: &CompiledExpression, input: &FormulaValue) -> EvalResult<Step> {
    let value = compiled
        .program()
        .first(input)?
        .unwrap_or(FormulaValue::Null);

    // Only formulas calling `drop_row` can delete; a row value equal to the
    // sentinel is ordinary text elsewhere
    if compiled.can_delete_row() && value.as_str() == Some(DELETE_ROW_SENTINEL) {
        return Ok(Step::Delete);
    }

    let expression = compiled.expression();
    cast(&value, expression.output_type(), expression.precision).map(Step::Value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowform_core::{Column, ColumnType, Expression, OutputType, RecordValue};

    fn row(fields: &[(&str, RecordValue)]) -> Row {
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn transformation(expressions: Vec<Expression>, input: Vec<Column>) -> FormulaTransformation {
        let request = TransformationRequest::new(expressions, input);
        FormulaTransformation::with_context(request, Context::default())
    }

    #[test]
    fn test_compiles_once() {
        let t = transformation(
            vec![Expression::new("Double", ".a * 2").with_type(OutputType::Integer)],
            vec![Column::new("COL-1", "a")],
        );
        assert!(!t.is_compiled());

        let outcome = t.evaluate(&row(&[("a", 4i64.into())]));
        assert_eq!(
            outcome,
            RowOutcome::Done(BTreeMap::from([("Double".to_string(), TypedValue::Integer(8))]))
        );
        assert!(t.is_compiled());

        let first = t.precompile().unwrap() as *const CompiledSet;
        let second = t.precompile().unwrap() as *const CompiledSet;
        assert_eq!(first, second);
    }

    #[test]
    fn test_compile_failure_fails_rows_without_caching() {
        let t = transformation(vec![Expression::new("Bad", ".a +")], vec![]);
        let outcome = t.evaluate(&row(&[]));
        assert!(outcome.is_fail());
        assert!(!t.is_compiled());
    }

    #[test]
    fn test_empty_stream_is_null() {
        let t = transformation(vec![Expression::new("Nothing", "empty")], vec![]);
        assert_eq!(
            t.evaluate(&row(&[])),
            RowOutcome::Done(BTreeMap::from([("Nothing".to_string(), TypedValue::Null)]))
        );
    }

    #[test]
    fn test_ignore_errors() {
        let expressions = vec![
            Expression::new("Ratio", ".a / .b").with_ignore_errors(true),
            Expression::new("Copy", ".a"),
        ];
        let t = transformation(expressions, vec![]);
        let outcome = t.evaluate(&row(&[("a", "x".into()), ("b", 2i64.into())]));
        assert_eq!(
            outcome,
            RowOutcome::Done(BTreeMap::from([
                ("Copy".to_string(), TypedValue::String("x".into())),
                ("Ratio".to_string(), TypedValue::Null),
            ]))
        );
    }

    #[test]
    fn test_sentinel_text_deletes_only_through_drop_row() {
        let t = transformation(
            vec![
                Expression::new("Note", ".note"),
                Expression::new("Keep", r#"if .drop then drop_row else "yes" end"#),
            ],
            vec![],
        );

        let outcome = t.evaluate(&row(&[
            ("note", DELETE_ROW_SENTINEL.into()),
            ("drop", false.into()),
        ]));
        assert_eq!(
            outcome,
            RowOutcome::Done(BTreeMap::from([
                ("Keep".to_string(), TypedValue::String("yes".into())),
                ("Note".to_string(), TypedValue::String(DELETE_ROW_SENTINEL.into())),
            ]))
        );

        let outcome = t.evaluate(&row(&[("note", "x".into()), ("drop", true.into())]));
        assert_eq!(outcome, RowOutcome::Delete);
    }

    #[test]
    fn test_temporal_columns_are_text() {
        let created = chrono::NaiveDate::from_ymd_opt(2022, 2, 10)
            .unwrap()
            .and_hms_opt(10, 23, 54)
            .unwrap();
        let t = transformation(
            vec![Expression::new("Day", r#".Created | split(" ") | first"#)],
            vec![Column::new("COL-1", "Created").with_type(ColumnType::Datetime)],
        );
        let outcome = t.evaluate(&row(&[("Created", created.into())]));
        assert_eq!(
            outcome,
            RowOutcome::Done(BTreeMap::from([(
                "Day".to_string(),
                TypedValue::String("2022-02-10".into())
            )]))
        );
    }

    #[test]
    fn test_outcome_json() {
        let done = RowOutcome::Done(BTreeMap::from([("A".to_string(), TypedValue::Integer(1))]));
        assert_eq!(
            done.to_json(),
            serde_json::json!({"status": "success", "row": {"A": 1}})
        );
        assert_eq!(RowOutcome::Delete.to_json(), serde_json::json!({"status": "delete"}));
        assert_eq!(
            RowOutcome::Fail("boom".into()).to_json(),
            serde_json::json!({"status": "fail", "output": "boom"})
        );
    }
}
