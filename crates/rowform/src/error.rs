//! Error types for the rowform engine
//!
//! Configuration problems are reported before any row is processed and are
//! split by kind, since callers render each kind differently. Row problems
//! only ever end the row they occur in.

use rowform_core::OutputType;
use rowform_formula::FormulaError;
use thiserror::Error;

/// Result type for configuration-time operations
pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// Result type for row-time operations
pub type EvalResult<T> = std::result::Result<T, EvaluationError>;

pub const INVALID_INPUT: &str = "Invalid input data.";
pub const EXPRESSIONS_REQUIRED: &str =
    "The settings must have `expressions` field which contains list of formulas.";
pub const EXPRESSION_FIELDS_REQUIRED: &str =
    "Each expression must have not empty `to` and `formula` fields.";
pub const OUTPUT_NOT_UNIQUE: &str = "Each `output column` must be unique.";
pub const BODY_WITHOUT_EXPRESSIONS: &str = "The body does not contain `expressions` list";
pub const BODY_WITHOUT_COLUMNS: &str = "The body does not contain `columns` list";

/// A configuration that must not reach row processing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Missing or malformed fields, duplicate output names, bad type settings
    #[error("{0}")]
    Structural(String),

    /// A formula that does not compile
    #[error("Settings contains invalid formula `{formula}`: {message}")]
    Syntax { formula: String, message: String },

    /// A formula referencing a column missing from the input schema
    #[error(
        "Settings contains formula `{formula}` with column `{reference}` that does not exist on columns.input."
    )]
    Resolution { formula: String, reference: String },
}

impl ConfigurationError {
    pub fn structural<S: Into<String>>(message: S) -> Self {
        ConfigurationError::Structural(message.into())
    }

    pub(crate) fn syntax(formula: &str, error: &FormulaError) -> Self {
        ConfigurationError::Syntax {
            formula: formula.to_string(),
            message: error.to_string(),
        }
    }

    pub(crate) fn resolution(formula: &str, reference: &str) -> Self {
        ConfigurationError::Resolution {
            formula: formula.to_string(),
            reference: reference.to_string(),
        }
    }

    /// Short name of the error kind, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigurationError::Structural(_) => "structural",
            ConfigurationError::Syntax { .. } => "syntax",
            ConfigurationError::Resolution { .. } => "resolution",
        }
    }
}

/// A failure while evaluating or casting one expression for one row
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("Cannot cast {value} to {output_type}")]
    Cast {
        value: String,
        output_type: OutputType,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
