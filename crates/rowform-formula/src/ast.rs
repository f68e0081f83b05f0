//! Formula Abstract Syntax Tree types

use crate::value::FormulaValue;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // === Paths ===
    /// `.`
    Identity,
    /// `..`
    RecurseAll,
    /// `target.name`
    Field { target: Box<Expr>, name: String },
    /// `target[key]`
    Index { target: Box<Expr>, key: Box<Expr> },
    /// `target[from:to]`
    Slice {
        target: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
    },
    /// `target[]`
    Iterate(Box<Expr>),

    // === Literals and constructors ===
    Literal(FormulaValue),
    /// String with `\(...)` interpolations
    Template(Vec<TemplatePart>),
    /// `[f]`, or `[]` when empty
    Array(Option<Box<Expr>>),
    /// `{k: f, ...}`
    Object(Vec<(ObjectKey, Expr)>),

    // === Operators ===
    Neg(Box<Expr>),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `left // right`
    Alternative(Box<Expr>, Box<Expr>),
    Pipe(Box<Expr>, Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),

    // === Control forms ===
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    /// `try body catch handler`; a postfix `?` is a `try` without handler
    Try {
        body: Box<Expr>,
        handler: Option<Box<Expr>>,
    },
    /// `reduce source as $var (init; update)`
    Reduce {
        source: Box<Expr>,
        var: String,
        init: Box<Expr>,
        update: Box<Expr>,
    },
    /// `source as $var | body`
    Bind {
        source: Box<Expr>,
        var: String,
        body: Box<Expr>,
    },
    Variable(String),
    Call { name: String, args: Vec<Expr> },
    /// `def ...; body`
    Define { def: Box<FunctionDef>, body: Box<Expr> },
}

/// A `def name(params): body;` definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Expr,
}

impl FunctionDef {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// `f`: the argument is passed as an unevaluated filter
    Filter(String),
    /// `$v`: the argument is evaluated and bound as a variable (and as a filter)
    Value(String),
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Param::Filter(name) | Param::Value(name) => name,
        }
    }
}

/// Object construction key
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    /// Constant key: identifier, keyword or plain string
    Name(String),
    /// Computed key: `(f)` or an interpolated string
    Expr(Expr),
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Expr),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        !matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }
}

impl Expr {
    pub(crate) fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    /// `.name` applied to the input
    pub fn field(name: impl Into<String>) -> Expr {
        Expr::Field {
            target: Box::new(Expr::Identity),
            name: name.into(),
        }
    }
}
