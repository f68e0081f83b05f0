//! # rowform
//!
//! Row-by-row formula transformation engine.
//!
//! Users declare output columns as formulas over the input columns of the
//! same row. This crate validates such configurations, compiles every
//! formula once per processing instance and evaluates the compiled formulas
//! row by row, casting results to the declared output types.
//!
//! ## Features
//!
//! - Column references as `.name`, `."any name"`, `.["any name"]` and the
//!   legacy alias label `Name (C0001)`
//! - A prelude of helpers: `round`, `tonumber`, `gross_profit`, `margin`, `markup`
//! - Context variables such as `$period` for billing streams
//! - Row deletion through the reserved `drop_row` symbol
//! - Typed outputs: string, integer, decimal, boolean, datetime
//!
//! ## Example
//!
//! ```rust
//! use rowform::prelude::*;
//!
//! let request = TransformationRequest::new(
//!     vec![Expression::new("Total", "round(.price * .qty; 2)")
//!         .with_type(OutputType::Decimal)
//!         .with_precision(2)],
//!     vec![Column::new("COL-1-0001", "price"), Column::new("COL-1-0002", "qty")],
//! );
//! let transformation = FormulaTransformation::new(request);
//!
//! let mut row = Row::new();
//! row.insert("price".into(), RecordValue::from(2.5));
//! row.insert("qty".into(), RecordValue::from(3i64));
//!
//! match transformation.evaluate(&row) {
//!     RowOutcome::Done(values) => assert_eq!(values["Total"].to_json(), "7.50"),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

pub mod cast;
pub mod compiler;
pub mod context;
pub mod error;
pub mod library;
pub mod prelude;
pub mod resolver;
pub mod transformation;
pub mod validator;

pub use cast::{cast, parse_datetime};
pub use compiler::{compile, compile_formula, uses_delete_row, CompiledExpression, CompiledSet};
pub use context::Context;
pub use error::{ConfigResult, ConfigurationError, EvalResult, EvaluationError};
pub use resolver::{references, ColumnResolver};
pub use transformation::{FormulaTransformation, RowOutcome};
pub use validator::{
    extract_input, extract_referenced_columns, overview, validate, validate_json,
    validate_with_context,
};

// Re-export the data model
pub use rowform_core::{
    Batch, Column, ColumnType, Columns, Configuration, Expression, OutputType, RecordValue, Row,
    Settings, Stream, Temporal, Transformation, TransformationRequest, TypedValue,
    DELETE_ROW_SENTINEL, DELETE_ROW_SYMBOL,
};
pub use rowform_formula::{FormulaError, FormulaValue, Program};
