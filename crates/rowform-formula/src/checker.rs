//! Static checks run at compile time
//!
//! Every `$variable` must be bound and every call must resolve to a
//! definition in scope or a built-in. A formula that passes never fails at
//! evaluation time with an undefined-name error.

use crate::ast::{Expr, ObjectKey, Param, TemplatePart};
use crate::error::{FormulaError, FormulaResult};
use crate::functions;

/// Names visible at one point of the formula
struct Scope<'a> {
    variables: Vec<&'a str>,
    functions: Vec<(&'a str, usize)>,
}

impl<'a> Scope<'a> {
    fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| *v == name)
    }

    fn has_function(&self, name: &str, arity: usize) -> bool {
        self.functions
            .iter()
            .any(|&(n, a)| n == name && a == arity)
    }
}

/// Check `expr` given the names of variables supplied from outside
pub fn check<'a, I>(expr: &'a Expr, globals: I) -> FormulaResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scope = Scope {
        variables: globals.into_iter().collect(),
        functions: Vec::new(),
    };
    check_expr(expr, &mut scope)
}

fn check_expr<'a>(expr: &'a Expr, scope: &mut Scope<'a>) -> FormulaResult<()> {
    match expr {
        Expr::Identity | Expr::RecurseAll | Expr::Literal(_) | Expr::Array(None) => Ok(()),

        Expr::Field { target, .. } | Expr::Iterate(target) | Expr::Neg(target) => {
            check_expr(target, scope)
        }

        Expr::Index { target, key } => {
            check_expr(target, scope)?;
            check_expr(key, scope)
        }

        Expr::Slice { target, from, to } => {
            check_expr(target, scope)?;
            for bound in [from, to].into_iter().flatten() {
                check_expr(bound, scope)?;
            }
            Ok(())
        }

        Expr::Template(parts) => {
            for part in parts {
                if let TemplatePart::Expr(inner) = part {
                    check_expr(inner, scope)?;
                }
            }
            Ok(())
        }

        Expr::Array(Some(inner)) => check_expr(inner, scope),

        Expr::Object(entries) => {
            for (key, value) in entries {
                if let ObjectKey::Expr(key) = key {
                    check_expr(key, scope)?;
                }
                check_expr(value, scope)?;
            }
            Ok(())
        }

        Expr::Binary { left, right, .. }
        | Expr::And(left, right)
        | Expr::Or(left, right)
        | Expr::Alternative(left, right)
        | Expr::Pipe(left, right)
        | Expr::Comma(left, right) => {
            check_expr(left, scope)?;
            check_expr(right, scope)
        }

        Expr::If {
            condition,
            then,
            otherwise,
        } => {
            check_expr(condition, scope)?;
            check_expr(then, scope)?;
            if let Some(otherwise) = otherwise {
                check_expr(otherwise, scope)?;
            }
            Ok(())
        }

        Expr::Try { body, handler } => {
            check_expr(body, scope)?;
            if let Some(handler) = handler {
                check_expr(handler, scope)?;
            }
            Ok(())
        }

        Expr::Reduce {
            source,
            var,
            init,
            update,
        } => {
            check_expr(source, scope)?;
            check_expr(init, scope)?;
            with_variable(scope, var, |scope| check_expr(update, scope))
        }

        Expr::Bind { source, var, body } => {
            check_expr(source, scope)?;
            with_variable(scope, var, |scope| check_expr(body, scope))
        }

        Expr::Variable(name) => {
            if scope.has_variable(name) {
                Ok(())
            } else {
                Err(FormulaError::UndefinedVariable(name.clone()))
            }
        }

        Expr::Call { name, args } => {
            if !scope.has_function(name, args.len()) && !functions::is_builtin(name, args.len())? {
                return Err(FormulaError::UndefinedFunction {
                    name: name.clone(),
                    arity: args.len(),
                });
            }
            for arg in args {
                check_expr(arg, scope)?;
            }
            Ok(())
        }

        Expr::Define { def, body } => {
            let functions_len = scope.functions.len();
            let variables_len = scope.variables.len();

            // Visible to its own body and to everything after it
            scope.functions.push((def.name.as_str(), def.arity()));
            for param in &def.params {
                scope.functions.push((param.name(), 0));
                if let Param::Value(name) = param {
                    scope.variables.push(name);
                }
            }
            let result = check_expr(&def.body, scope);
            scope.functions.truncate(functions_len + 1);
            scope.variables.truncate(variables_len);
            result?;

            let result = check_expr(body, scope);
            scope.functions.truncate(functions_len);
            result
        }
    }
}

fn with_variable<'a>(
    scope: &mut Scope<'a>,
    name: &'a str,
    f: impl FnOnce(&mut Scope<'a>) -> FormulaResult<()>,
) -> FormulaResult<()> {
    scope.variables.push(name);
    let result = f(scope);
    scope.variables.pop();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;

    fn check_source(source: &str, globals: &[&str]) -> FormulaResult<()> {
        let expr = parse_formula(source)?;
        check(&expr, globals.iter().copied())
    }

    #[test]
    fn test_variables() {
        assert!(check_source(". as $x | $x", &[]).is_ok());
        assert!(check_source("$period.start", &["period"]).is_ok());
        assert_eq!(
            check_source("$period", &[]),
            Err(FormulaError::UndefinedVariable("period".into()))
        );
        // Bindings do not leak out of their body
        assert!(check_source("(. as $x | $x), $x", &[]).is_err());
    }

    #[test]
    fn test_functions() {
        assert!(check_source("length", &[]).is_ok());
        assert!(check_source("map(. + 1)", &[]).is_ok());
        assert_eq!(
            check_source("frobnicate(1)", &[]),
            Err(FormulaError::UndefinedFunction {
                name: "frobnicate".into(),
                arity: 1,
            })
        );
        assert!(check_source("length(1)", &[]).is_err());
    }

    #[test]
    fn test_definitions_scope() {
        assert!(check_source("def f($a; g): $a + g; f(1; 2)", &[]).is_ok());
        assert!(check_source("def f: f; f", &[]).is_ok());
        // Parameters are local to the definition
        assert!(check_source("def f(g): g; g", &[]).is_err());
        assert!(check_source("def f($a): $a; $a", &[]).is_err());
    }
}
