//! Formula expression settings

use crate::column::Columns;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of an output column produced by an expression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    Datetime,
}

impl OutputType {
    /// All output types, in the order they are offered to users
    pub const ALL: [OutputType; 5] = [
        OutputType::String,
        OutputType::Integer,
        OutputType::Decimal,
        OutputType::Boolean,
        OutputType::Datetime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::String => "string",
            OutputType::Integer => "integer",
            OutputType::Decimal => "decimal",
            OutputType::Boolean => "boolean",
            OutputType::Datetime => "datetime",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownOutputType(s.to_string()))
    }
}

/// One user-declared rule mapping a formula over input columns to one output column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Output column name, unique within a configuration
    #[serde(default)]
    pub to: Option<String>,
    /// Formula text
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_errors: Option<bool>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<OutputType>,
    /// Fractional digits, required iff the output type is decimal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

impl Expression {
    /// Create a string-typed expression
    pub fn new<T: Into<String>, F: Into<String>>(to: T, formula: F) -> Self {
        Self {
            to: Some(to.into()),
            formula: Some(formula.into()),
            ..Default::default()
        }
    }

    /// Set the output type
    pub fn with_type(mut self, output_type: OutputType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    /// Set the decimal precision
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set the ignore-errors flag
    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = Some(ignore_errors);
        self
    }

    /// Output column name, or "" when missing
    pub fn output_name(&self) -> &str {
        self.to.as_deref().unwrap_or_default()
    }

    /// Formula text, or "" when missing
    pub fn formula_text(&self) -> &str {
        self.formula.as_deref().unwrap_or_default()
    }

    /// Declared output type, defaulting to string
    pub fn output_type(&self) -> OutputType {
        self.output_type.unwrap_or_default()
    }

    pub fn ignores_errors(&self) -> bool {
        self.ignore_errors.unwrap_or(false)
    }
}

/// Transformation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub expressions: Option<Vec<Expression>>,
}

/// A full formula configuration as edited by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub columns: Option<Columns>,
}

impl Configuration {
    /// Build a configuration from expressions and input columns
    pub fn new(expressions: Vec<Expression>, input: Vec<crate::Column>) -> Self {
        Self {
            settings: Some(Settings {
                expressions: Some(expressions),
            }),
            columns: Some(Columns {
                input: Some(input),
                output: Some(Vec::new()),
            }),
        }
    }

    /// The expression list, empty when absent
    pub fn expressions(&self) -> &[Expression] {
        self.settings
            .as_ref()
            .and_then(|s| s.expressions.as_deref())
            .unwrap_or_default()
    }

    /// The input columns, empty when absent
    pub fn input_columns(&self) -> &[crate::Column] {
        self.columns
            .as_ref()
            .and_then(|c| c.input.as_deref())
            .unwrap_or_default()
    }

    /// The output columns, empty when absent
    pub fn output_columns(&self) -> &[crate::Column] {
        self.columns
            .as_ref()
            .and_then(|c| c.output.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_type_from_str() {
        assert_eq!("decimal".parse::<OutputType>().unwrap(), OutputType::Decimal);
        assert!("money".parse::<OutputType>().is_err());
    }

    #[test]
    fn test_deserialize_expression() {
        let expr: Expression = serde_json::from_str(
            r#"{"to": "Total", "formula": ".a + .b", "type": "decimal", "precision": 2, "ignore_errors": null}"#,
        )
        .unwrap();
        assert_eq!(
            expr,
            Expression::new("Total", ".a + .b")
                .with_type(OutputType::Decimal)
                .with_precision(2)
        );
        assert!(!expr.ignores_errors());
    }

    #[test]
    fn test_default_output_type() {
        let expr: Expression = serde_json::from_str(r#"{"to": "A", "formula": "."}"#).unwrap();
        assert_eq!(expr.output_type(), OutputType::String);
    }
}
