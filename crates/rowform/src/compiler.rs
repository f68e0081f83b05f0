//! Expression compilation
//!
//! Each expression is compiled once per processing instance: the prelude, an
//! optional `drop_row` definition and the user formula are joined into one
//! program with the context bound as arguments.

use crate::context::Context;
use crate::error::{ConfigResult, ConfigurationError};
use crate::library;
use rowform_core::{Expression, DELETE_ROW_SENTINEL, DELETE_ROW_SYMBOL};
use rowform_formula::{tokenize, FormulaError, Program, Token};

/// Whether `formula` calls the reserved delete-row symbol. String contents
/// and `.drop_row` field accesses do not count.
pub fn uses_delete_row(formula: &str) -> bool {
    let Ok(tokens) = tokenize(formula) else {
        return false;
    };
    tokens.iter().enumerate().any(|(i, spanned)| {
        matches!(&spanned.token, Token::Ident(name) if name == DELETE_ROW_SYMBOL)
            && !(i > 0 && tokens[i - 1].token == Token::Dot)
    })
}

/// Compile a single formula text against `context`
pub fn compile_formula(formula: &str, context: &Context) -> Result<Program, FormulaError> {
    let mut source = String::with_capacity(library::prelude().len() + formula.len() + 64);
    source.push_str(library::prelude());
    source.push(' ');
    if uses_delete_row(formula) {
        source.push_str(&format!(
            "def {}: \"{}\"; ",
            DELETE_ROW_SYMBOL, DELETE_ROW_SENTINEL
        ));
    }
    let base = source.len();
    source.push_str(formula);

    Program::compile(&source, context.arguments()).map_err(|e| match e {
        // Point into the user formula rather than the combined text
        FormulaError::Syntax { message, offset } => FormulaError::Syntax {
            message,
            offset: offset.saturating_sub(base),
        },
        other => other,
    })
}

/// The executable form of one expression
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    expression: Expression,
    program: Program,
    can_delete_row: bool,
}

impl CompiledExpression {
    pub fn output_name(&self) -> &str {
        self.expression.output_name()
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Whether the formula may ask for the row to be deleted
    pub fn can_delete_row(&self) -> bool {
        self.can_delete_row
    }
}

/// Compile one expression
pub fn compile(expression: &Expression, context: &Context) -> ConfigResult<CompiledExpression> {
    let formula = expression.formula_text();
    let program = compile_formula(formula, context)
        .map_err(|e| ConfigurationError::syntax(formula, &e))?;

    tracing::debug!(
        "Compiled expression `{}` = {}",
        expression.output_name(),
        formula
    );

    Ok(CompiledExpression {
        expression: expression.clone(),
        program,
        can_delete_row: uses_delete_row(formula),
    })
}

/// All compiled expressions of a configuration, in declaration order
#[derive(Debug, Clone, Default)]
pub struct CompiledSet {
    expressions: Vec<CompiledExpression>,
}

impl CompiledSet {
    /// Compile every expression; the first failure aborts
    pub fn compile(expressions: &[Expression], context: &Context) -> ConfigResult<Self> {
        let expressions = expressions
            .iter()
            .map(|expression| compile(expression, context))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self { expressions })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledExpression> {
        self.expressions.iter()
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowform_formula::FormulaValue;
    use serde_json::json;

    #[test]
    fn test_uses_delete_row() {
        assert!(uses_delete_row("if .tax > 10 then drop_row else \"OK\" end"));
        assert!(uses_delete_row("drop_row"));
        assert!(!uses_delete_row(".drop_row"));
        assert!(!uses_delete_row(r#""drop_row""#));
        assert!(!uses_delete_row("$drop_row"));
        assert!(!uses_delete_row("drop_rows"));
    }

    #[test]
    fn test_delete_row_sentinel() {
        let program =
            compile_formula(r#"if .tax > 10 then drop_row else "OK" end"#, &Context::default())
                .unwrap();
        let high = FormulaValue::from(json!({"tax": 20}));
        let low = FormulaValue::from(json!({"tax": 8}));
        assert_eq!(
            program.first(&high).unwrap(),
            Some(FormulaValue::from(DELETE_ROW_SENTINEL))
        );
        assert_eq!(program.first(&low).unwrap(), Some(FormulaValue::from("OK")));
    }

    #[test]
    fn test_syntax_offset_is_relative_to_formula() {
        let err = compile_formula(".a + + .b", &Context::default()).unwrap_err();
        match err {
            FormulaError::Syntax { offset, .. } => assert_eq!(offset, 5),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_context_variables_are_bound() {
        let context = Context::placeholders();
        assert!(compile_formula("$period", &context).is_ok());
        assert_eq!(
            compile_formula("$region", &context).unwrap_err(),
            FormulaError::UndefinedVariable("region".into())
        );
    }

    #[test]
    fn test_compiled_set() {
        let expressions = vec![
            Expression::new("Total", ".price * .qty"),
            Expression::new("Flag", "drop_row"),
        ];
        let set = CompiledSet::compile(&expressions, &Context::default()).unwrap();
        assert_eq!(set.len(), 2);
        let flags: Vec<(&str, bool)> = set
            .iter()
            .map(|compiled| (compiled.output_name(), compiled.can_delete_row()))
            .collect();
        assert_eq!(flags, vec![("Total", false), ("Flag", true)]);

        let bad = vec![Expression::new("Broken", ".a +")];
        let err = CompiledSet::compile(&bad, &Context::default()).unwrap_err();
        assert_eq!(err.kind(), "syntax");
    }
}
