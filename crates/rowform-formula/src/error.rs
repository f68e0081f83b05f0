//! Formula error types

use crate::value::FormulaValue;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula compilation or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Malformed formula text
    #[error("syntax error: {message} at offset {offset}")]
    Syntax { message: String, offset: usize },

    /// Call to a function that no definition or built-in provides
    #[error("{name}/{arity} is not defined")]
    UndefinedFunction { name: String, arity: usize },

    /// Reference to a variable that is not bound
    #[error("${0} is not defined")]
    UndefinedVariable(String),

    /// Type or domain error raised while evaluating
    #[error("{0}")]
    Evaluation(String),

    /// Error raised by the formula itself through `error`
    #[error("{}", .0.error_message())]
    Raised(FormulaValue),

    /// Recursion went deeper than the evaluator allows
    #[error("maximum call depth of {0} exceeded")]
    DepthExceeded(usize),
}

impl FormulaError {
    pub(crate) fn syntax<S: Into<String>>(message: S, offset: usize) -> Self {
        FormulaError::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub(crate) fn eval<S: Into<String>>(message: S) -> Self {
        FormulaError::Evaluation(message.into())
    }

    /// Whether this error is detected before any input is seen
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            FormulaError::Syntax { .. }
                | FormulaError::UndefinedFunction { .. }
                | FormulaError::UndefinedVariable(_)
        )
    }

    /// Whether `try` and `//` may intercept this error
    pub(crate) fn is_catchable(&self) -> bool {
        matches!(self, FormulaError::Evaluation(_) | FormulaError::Raised(_))
    }

    /// The value a `catch` handler receives
    pub(crate) fn into_value(self) -> FormulaValue {
        match self {
            FormulaError::Raised(value) => value,
            other => FormulaValue::String(other.to_string()),
        }
    }
}
