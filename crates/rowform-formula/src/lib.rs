//! # rowform-formula
//!
//! The formula language used by rowform expressions: a jq-compatible filter
//! language evaluated over one row at a time.
//!
//! This crate provides:
//! - Tokenizing (text → tokens), shared with column-reference discovery
//! - Parsing (tokens → AST) with jq operator precedence
//! - Static checking of variables and function calls at compile time
//! - A stream evaluator whose consumers can stop after the first value
//! - Built-in functions, both native and defined in the language itself
//!
//! ## Example
//!
//! ```rust
//! use rowform_formula::{FormulaValue, Program};
//!
//! let program = Program::compile(".price * (1 + $rate)", [("rate", FormulaValue::Number(0.2))]).unwrap();
//! let row = FormulaValue::from(serde_json::json!({"price": 100}));
//! assert_eq!(program.first(&row).unwrap(), Some(FormulaValue::Number(120.0)));
//! ```

pub mod ast;
pub mod checker;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod value;

pub use ast::{BinaryOperator, Expr, FunctionDef, ObjectKey, Param, TemplatePart};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{Env, Flow, Interpreter, MAX_CALL_DEPTH, MAX_STRING_LENGTH};
pub use lexer::{tokenize, Spanned, StrPart, Token, MAX_NESTING_DEPTH};
pub use parser::parse_formula;
pub use program::Program;
pub use value::FormulaValue;
