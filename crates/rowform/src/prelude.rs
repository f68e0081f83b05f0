//! Prelude module - common imports for rowform users
//!
//! ```rust
//! use rowform::prelude::*;
//! ```

pub use crate::{
    // Data model
    Batch,
    Column,
    ColumnType,
    Configuration,
    // Errors
    ConfigurationError,
    Context,
    EvaluationError,
    Expression,
    // Engine
    FormulaTransformation,
    OutputType,
    RecordValue,
    Row,
    RowOutcome,
    Stream,
    Temporal,
    TransformationRequest,
    TypedValue,
};
