//! # rowform-core
//!
//! Core data model for the rowform formula transformation engine.
//!
//! This crate provides the fundamental types shared by the formula language
//! and the engine:
//! - [`Column`] and [`ColumnType`] - the declared input/output column schema
//! - [`Expression`], [`OutputType`] and [`Configuration`] - user formula settings
//! - [`TransformationRequest`] - the batch a processing instance works on
//! - [`RecordValue`], [`Temporal`] and [`Row`] - row and context values
//! - [`TypedValue`] - the result of casting a formula value to an output type
//!
//! ## Example
//!
//! ```rust
//! use rowform_core::{Column, ColumnType};
//!
//! let column = Column::new("COL-123-0001", "Quantity").with_type(ColumnType::Integer);
//! assert_eq!(column.id_suffix(), Some("0001"));
//! assert_eq!(column.alias_label().as_deref(), Some("Quantity (C0001)"));
//! ```

pub mod column;
pub mod error;
pub mod expression;
pub mod request;
pub mod value;

pub use column::{Column, ColumnType, Columns};
pub use error::{CoreError, Result};
pub use expression::{Configuration, Expression, OutputType, Settings};
pub use request::{Batch, Stream, Transformation, TransformationRequest};
pub use value::{RecordValue, Row, Temporal, TypedValue};

/// Reserved value a formula emits to ask for the current row to be deleted
pub const DELETE_ROW_SENTINEL: &str = "#INSTRUCTION/DELETE_ROW";

/// Name of the reserved formula symbol that evaluates to [`DELETE_ROW_SENTINEL`]
pub const DELETE_ROW_SYMBOL: &str = "drop_row";
