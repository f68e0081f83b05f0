//! Compiled formulas

use crate::ast::Expr;
use crate::checker;
use crate::error::FormulaResult;
use crate::evaluator::{Env, Flow, Interpreter};
use crate::parser::parse_formula;
use crate::value::FormulaValue;

/// A parsed and checked formula together with its named arguments.
///
/// Programs are immutable and can be shared between threads; every
/// evaluation builds its own environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    expr: Expr,
    args: Vec<(String, FormulaValue)>,
}

impl Program {
    /// Parse and check `source`. Each argument becomes a `$name` variable.
    pub fn compile<I, K>(source: &str, args: I) -> FormulaResult<Self>
    where
        I: IntoIterator<Item = (K, FormulaValue)>,
        K: Into<String>,
    {
        let expr = parse_formula(source)?;
        let args: Vec<(String, FormulaValue)> =
            args.into_iter().map(|(k, v)| (k.into(), v)).collect();
        checker::check(&expr, args.iter().map(|(name, _)| name.as_str()))?;

        Ok(Self {
            source: source.to_string(),
            expr,
            args,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Names of the `$` arguments the program was compiled with
    pub fn arg_names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|(name, _)| name.as_str())
    }

    fn env(&self) -> Env<'_> {
        self.args
            .iter()
            .fold(Env::new(), |env, (name, value)| env.bind(name, value.clone()))
    }

    /// Feed every output value for `input` to `f` until it returns [`Flow::Stop`]
    pub fn for_each<F>(&self, input: &FormulaValue, mut f: F) -> FormulaResult<()>
    where
        F: FnMut(FormulaValue) -> FormulaResult<Flow>,
    {
        Interpreter::new().eval(&self.expr, input, &self.env(), &mut f)?;
        Ok(())
    }

    /// The first output value for `input`. Later values are never computed.
    pub fn first(&self, input: &FormulaValue) -> FormulaResult<Option<FormulaValue>> {
        Interpreter::new().first(&self.expr, input, &self.env())
    }

    /// Every output value for `input`
    pub fn run(&self, input: &FormulaValue) -> FormulaResult<Vec<FormulaValue>> {
        Interpreter::new().collect(&self.expr, input, &self.env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use serde_json::json;

    #[test]
    fn test_compile_checks_arguments() {
        let program = Program::compile("$rate * .price", [("rate", FormulaValue::Number(0.5))]);
        assert!(program.is_ok());

        let err = Program::compile("$rate * .price", Vec::<(String, FormulaValue)>::new())
            .unwrap_err();
        assert_eq!(err, FormulaError::UndefinedVariable("rate".into()));
        assert!(err.is_compile_error());
    }

    #[test]
    fn test_first_and_run() {
        let program = Program::compile(".[]", Vec::<(String, FormulaValue)>::new()).unwrap();
        let input = FormulaValue::from(json!([1, 2, 3]));
        assert_eq!(program.first(&input).unwrap(), Some(FormulaValue::Number(1.0)));
        assert_eq!(program.run(&input).unwrap().len(), 3);

        let empty = FormulaValue::from(json!([]));
        assert_eq!(program.first(&empty).unwrap(), None);
    }

    #[test]
    fn test_for_each_stops() {
        let program = Program::compile("range(1000000)", Vec::<(String, FormulaValue)>::new())
            .unwrap();
        let mut seen = 0;
        program
            .for_each(&FormulaValue::Null, |_| {
                seen += 1;
                Ok(if seen == 3 { Flow::Stop } else { Flow::Continue })
            })
            .unwrap();
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_program_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Program>();
    }
}
