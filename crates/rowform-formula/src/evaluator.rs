//! Formula evaluator
//!
//! Evaluates an AST against one input value. Every expression produces a
//! stream of zero or more values which is pushed into a consumer callback.
//! The consumer answers with [`Flow::Stop`] once it has seen enough, which
//! unwinds the producers without evaluating the rest of the stream.

use crate::ast::{BinaryOperator, Expr, FunctionDef, ObjectKey, Param, TemplatePart};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{self, definitions, BUILTINS};
use crate::value::FormulaValue;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Maximum nesting of function calls
pub const MAX_CALL_DEPTH: usize = 100;

/// Longest string, in bytes, that string repetition may produce
pub const MAX_STRING_LENGTH: usize = 1 << 26;

/// What a consumer wants after receiving a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Stream consumer
pub type Sink<'s> = dyn FnMut(FormulaValue) -> FormulaResult<Flow> + 's;

// ============================================================================
// Environment
// ============================================================================

/// Lexical environment: a persistent linked list of bindings
#[derive(Clone, Default)]
pub struct Env<'a>(Option<Rc<Frame<'a>>>);

enum Frame<'a> {
    Var {
        name: &'a str,
        value: FormulaValue,
        next: Env<'a>,
    },
    Def {
        def: &'a FunctionDef,
        next: Env<'a>,
    },
    /// A filter argument bound to a parameter name
    Closure {
        name: &'a str,
        body: &'a Expr,
        env: Env<'a>,
        next: Env<'a>,
    },
}

/// Result of resolving a call against the environment
enum Callable<'a> {
    Def { def: &'a FunctionDef, env: Env<'a> },
    Closure { body: &'a Expr, env: Env<'a> },
}

impl<'a> Env<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: &'a str, value: FormulaValue) -> Env<'a> {
        Env(Some(Rc::new(Frame::Var {
            name,
            value,
            next: self.clone(),
        })))
    }

    fn define(&self, def: &'a FunctionDef) -> Env<'a> {
        Env(Some(Rc::new(Frame::Def {
            def,
            next: self.clone(),
        })))
    }

    fn closure(&self, name: &'a str, body: &'a Expr, env: Env<'a>) -> Env<'a> {
        Env(Some(Rc::new(Frame::Closure {
            name,
            body,
            env,
            next: self.clone(),
        })))
    }

    pub fn lookup_var(&self, name: &str) -> Option<&FormulaValue> {
        let mut current = self;
        while let Some(frame) = &current.0 {
            current = match frame.as_ref() {
                Frame::Var {
                    name: n,
                    value,
                    next,
                } => {
                    if *n == name {
                        return Some(value);
                    }
                    next
                }
                Frame::Def { next, .. } | Frame::Closure { next, .. } => next,
            };
        }
        None
    }

    fn lookup_function(&self, name: &str, arity: usize) -> Option<Callable<'a>> {
        let mut current = self;
        while let Some(frame) = &current.0 {
            current = match frame.as_ref() {
                Frame::Def { def, next } => {
                    if def.name == name && def.arity() == arity {
                        // The definition sees itself, so recursion works
                        return Some(Callable::Def {
                            def: *def,
                            env: current.clone(),
                        });
                    }
                    next
                }
                Frame::Closure {
                    name: n,
                    body,
                    env,
                    next,
                } => {
                    if arity == 0 && *n == name {
                        return Some(Callable::Closure {
                            body: *body,
                            env: env.clone(),
                        });
                    }
                    next
                }
                Frame::Var { next, .. } => next,
            };
        }
        None
    }
}

// ============================================================================
// Interpreter
// ============================================================================

/// Formula interpreter for a single evaluation
pub struct Interpreter {
    depth: Cell<usize>,
    max_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            depth: Cell::new(0),
            max_depth,
        }
    }

    /// Evaluate `expr` against `input`, pushing every produced value into `out`
    pub fn eval<'a>(
        &self,
        expr: &'a Expr,
        input: &FormulaValue,
        env: &Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        match expr {
            Expr::Identity => out(input.clone()),

            Expr::RecurseAll => recurse_all(input, out),

            Expr::Literal(value) => out(value.clone()),

            Expr::Field { target, name } => self.eval(target, input, env, &mut |value| {
                out(index_field(&value, name)?)
            }),

            Expr::Index { target, key } => self.eval(target, input, env, &mut |value| {
                self.eval(key, input, env, &mut |k| out(index_value(&value, &k)?))
            }),

            Expr::Slice { target, from, to } => self.eval(target, input, env, &mut |value| {
                self.eval_optional(from.as_deref(), input, env, &mut |start| {
                    self.eval_optional(to.as_deref(), input, env, &mut |end| {
                        out(slice_value(&value, &start, &end)?)
                    })
                })
            }),

            Expr::Iterate(target) => self.eval(target, input, env, &mut |value| {
                iterate(&value, &mut *out)
            }),

            Expr::Template(parts) => self.eval_template(parts, input, env, String::new(), out),

            Expr::Array(None) => out(FormulaValue::Array(Vec::new())),

            Expr::Array(Some(inner)) => {
                let items = self.collect(inner, input, env)?;
                out(FormulaValue::Array(items))
            }

            Expr::Object(entries) => self.eval_object(entries, input, env, BTreeMap::new(), out),

            Expr::Neg(operand) => self.eval(operand, input, env, &mut |value| match value {
                FormulaValue::Number(n) => out(FormulaValue::Number(-n)),
                other => Err(FormulaError::eval(format!(
                    "{} cannot be negated",
                    other.describe()
                ))),
            }),

            Expr::Binary { op, left, right } => self.eval(right, input, env, &mut |r| {
                self.eval(left, input, env, &mut |l| out(apply_binary(*op, &l, &r)?))
            }),

            Expr::And(left, right) => self.eval(left, input, env, &mut |l| {
                if !l.is_truthy() {
                    return out(FormulaValue::Boolean(false));
                }
                self.eval(right, input, env, &mut |r| {
                    out(FormulaValue::Boolean(r.is_truthy()))
                })
            }),

            Expr::Or(left, right) => self.eval(left, input, env, &mut |l| {
                if l.is_truthy() {
                    return out(FormulaValue::Boolean(true));
                }
                self.eval(right, input, env, &mut |r| {
                    out(FormulaValue::Boolean(r.is_truthy()))
                })
            }),

            Expr::Alternative(left, right) => self.eval_alternative(left, right, input, env, out),

            Expr::Pipe(left, right) => self.eval(left, input, env, &mut |value| {
                self.eval(right, &value, env, &mut *out)
            }),

            Expr::Comma(left, right) => {
                if self.eval(left, input, env, out)? == Flow::Stop {
                    return Ok(Flow::Stop);
                }
                self.eval(right, input, env, out)
            }

            Expr::If {
                condition,
                then,
                otherwise,
            } => self.eval(condition, input, env, &mut |c| {
                if c.is_truthy() {
                    self.eval(then, input, env, &mut *out)
                } else {
                    match otherwise {
                        Some(otherwise) => self.eval(otherwise, input, env, &mut *out),
                        None => out(input.clone()),
                    }
                }
            }),

            Expr::Try { body, handler } => self.eval_try(body, handler.as_deref(), input, env, out),

            Expr::Reduce {
                source,
                var,
                init,
                update,
            } => self.eval(init, input, env, &mut |initial| {
                let mut acc = initial;
                self.eval(source, input, env, &mut |item| {
                    let scope = env.bind(var, item);
                    let mut last = None;
                    self.eval(update, &acc, &scope, &mut |next| {
                        last = Some(next);
                        Ok(Flow::Continue)
                    })?;
                    acc = last.unwrap_or(FormulaValue::Null);
                    Ok(Flow::Continue)
                })?;
                out(acc)
            }),

            Expr::Bind { source, var, body } => self.eval(source, input, env, &mut |value| {
                let scope = env.bind(var, value);
                self.eval(body, input, &scope, &mut *out)
            }),

            Expr::Variable(name) => match env.lookup_var(name) {
                Some(value) => out(value.clone()),
                None => Err(FormulaError::UndefinedVariable(name.clone())),
            },

            Expr::Call { name, args } => self.eval_call(name, args, input, env, out),

            Expr::Define { def, body } => self.eval(body, input, &env.define(def), out),
        }
    }

    /// Collect every value of a stream
    pub fn collect<'a>(
        &self,
        expr: &'a Expr,
        input: &FormulaValue,
        env: &Env<'a>,
    ) -> FormulaResult<Vec<FormulaValue>> {
        let mut values = Vec::new();
        self.eval(expr, input, env, &mut |value| {
            values.push(value);
            Ok(Flow::Continue)
        })?;
        Ok(values)
    }

    /// First value of a stream; the producer stops right after it
    pub fn first<'a>(
        &self,
        expr: &'a Expr,
        input: &FormulaValue,
        env: &Env<'a>,
    ) -> FormulaResult<Option<FormulaValue>> {
        let mut first = None;
        self.eval(expr, input, env, &mut |value| {
            first = Some(value);
            Ok(Flow::Stop)
        })?;
        Ok(first)
    }

    fn eval_optional<'a>(
        &self,
        expr: Option<&'a Expr>,
        input: &FormulaValue,
        env: &Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        match expr {
            Some(expr) => self.eval(expr, input, env, out),
            None => out(FormulaValue::Null),
        }
    }

    fn eval_template<'a>(
        &self,
        parts: &'a [TemplatePart],
        input: &FormulaValue,
        env: &Env<'a>,
        prefix: String,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        let (part, rest) = match parts.split_first() {
            Some(split) => split,
            None => return out(FormulaValue::String(prefix)),
        };
        match part {
            TemplatePart::Literal(text) => {
                self.eval_template(rest, input, env, prefix + text, out)
            }
            TemplatePart::Expr(expr) => self.eval(expr, input, env, &mut |value| {
                let text = format!("{}{}", prefix, value.to_text());
                self.eval_template(rest, input, env, text, &mut *out)
            }),
        }
    }

    fn eval_object<'a>(
        &self,
        entries: &'a [(ObjectKey, Expr)],
        input: &FormulaValue,
        env: &Env<'a>,
        built: BTreeMap<String, FormulaValue>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        let ((key, value_expr), rest) = match entries.split_first() {
            Some(split) => split,
            None => return out(FormulaValue::Object(built)),
        };

        let mut with_key = |key: String| -> FormulaResult<Flow> {
            self.eval(value_expr, input, env, &mut |value| {
                let mut next = built.clone();
                next.insert(key.clone(), value);
                self.eval_object(rest, input, env, next, &mut *out)
            })
        };

        match key {
            ObjectKey::Name(name) => with_key(name.clone()),
            ObjectKey::Expr(expr) => self.eval(expr, input, env, &mut |key| match key {
                FormulaValue::String(key) => with_key(key),
                other => Err(FormulaError::eval(format!(
                    "Object keys must be strings, got {}",
                    other.describe()
                ))),
            }),
        }
    }

    /// `left // right`: the truthy values of `left`, or else the values of
    /// `right`. Errors raised while producing `left` count as no value.
    fn eval_alternative<'a>(
        &self,
        left: &'a Expr,
        right: &'a Expr,
        input: &FormulaValue,
        env: &Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        let mut produced = false;
        let mut downstream = None;

        let result = self.eval(left, input, env, &mut |value| {
            if !value.is_truthy() {
                return Ok(Flow::Continue);
            }
            produced = true;
            out(value).map_err(|e| {
                downstream = Some(e.clone());
                e
            })
        });

        // Errors from the consumer are not ours to swallow
        if let Some(error) = downstream {
            return Err(error);
        }
        match result {
            Ok(Flow::Stop) => return Ok(Flow::Stop),
            Ok(Flow::Continue) => {}
            Err(e) if e.is_catchable() => {}
            Err(e) => return Err(e),
        }

        if produced {
            Ok(Flow::Continue)
        } else {
            self.eval(right, input, env, out)
        }
    }

    fn eval_try<'a>(
        &self,
        body: &'a Expr,
        handler: Option<&'a Expr>,
        input: &FormulaValue,
        env: &Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        let mut downstream = None;

        let result = self.eval(body, input, env, &mut |value| {
            out(value).map_err(|e| {
                downstream = Some(e.clone());
                e
            })
        });

        if let Some(error) = downstream {
            return Err(error);
        }
        match result {
            Err(e) if e.is_catchable() => match handler {
                Some(handler) => self.eval(handler, &e.into_value(), env, out),
                None => Ok(Flow::Continue),
            },
            other => other,
        }
    }

    // === Calls ===

    fn eval_call<'a>(
        &self,
        name: &str,
        args: &'a [Expr],
        input: &FormulaValue,
        env: &Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        // 1. Formula-local definitions and filter parameters
        if let Some(callable) = env.lookup_function(name, args.len()) {
            return match callable {
                Callable::Def { def, env: def_env } => {
                    self.call_definition(def, def_env, args, input, env, out)
                }
                Callable::Closure { body, env: closure_env } => {
                    self.enter()?;
                    let result = self.eval(body, input, &closure_env, out);
                    self.leave();
                    result
                }
            };
        }

        // 2. Control built-ins
        if functions::is_control(name, args.len()) {
            return self.call_control(name, args, input, env, out);
        }

        // 3. Core definitions, which resolve their own calls from an empty scope
        if let Some(def) = definitions::definition(name, args.len())? {
            return self.call_definition(def, Env::new(), args, input, env, out);
        }

        // 4. Native functions
        if let Some(native) = BUILTINS.get(name, args.len()) {
            let mut values = Vec::with_capacity(args.len());
            return self.call_native(native, args, input, env, &mut values, out);
        }

        Err(FormulaError::UndefinedFunction {
            name: name.to_string(),
            arity: args.len(),
        })
    }

    fn enter(&self) -> FormulaResult<()> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            return Err(FormulaError::DepthExceeded(self.max_depth));
        }
        self.depth.set(depth);
        Ok(())
    }

    fn leave(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }

    fn call_definition<'a>(
        &self,
        def: &'a FunctionDef,
        def_env: Env<'a>,
        args: &'a [Expr],
        input: &FormulaValue,
        caller_env: &Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        // Every parameter is callable as a filter over the caller's scope
        let mut scope = def_env;
        for (param, arg) in def.params.iter().zip(args) {
            scope = scope.closure(param.name(), arg, caller_env.clone());
        }

        self.enter()?;
        let result = self.bind_values(def, 0, args, input, caller_env, scope, out);
        self.leave();
        result
    }

    /// Bind `$name` parameters one by one, over every value of their argument
    #[allow(clippy::too_many_arguments)]
    fn bind_values<'a>(
        &self,
        def: &'a FunctionDef,
        index: usize,
        args: &'a [Expr],
        input: &FormulaValue,
        caller_env: &Env<'a>,
        scope: Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        let param = match def.params.get(index) {
            Some(param) => param,
            None => return self.eval(&def.body, input, &scope, out),
        };
        match param {
            Param::Filter(_) => self.bind_values(def, index + 1, args, input, caller_env, scope, out),
            Param::Value(name) => self.eval(&args[index], input, caller_env, &mut |value| {
                let scope = scope.bind(name, value);
                self.bind_values(def, index + 1, args, input, caller_env, scope, &mut *out)
            }),
        }
    }

    fn call_native<'a>(
        &self,
        native: &functions::FunctionDef,
        args: &'a [Expr],
        input: &FormulaValue,
        env: &Env<'a>,
        values: &mut Vec<FormulaValue>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        let index = values.len();
        if index == args.len() {
            return out((native.implementation)(input, values)?);
        }
        self.eval(&args[index], input, env, &mut |value| {
            values.push(value);
            let flow = self.call_native(native, args, input, env, values, &mut *out);
            values.pop();
            flow
        })
    }

    fn call_control<'a>(
        &self,
        name: &str,
        args: &'a [Expr],
        input: &FormulaValue,
        env: &Env<'a>,
        out: &mut Sink<'_>,
    ) -> FormulaResult<Flow> {
        match (name, args) {
            ("empty", []) => Ok(Flow::Continue),

            ("error", []) => Err(FormulaError::Raised(input.clone())),

            ("error", [message]) => self.eval(message, input, env, &mut |value| {
                Err(FormulaError::Raised(value))
            }),

            ("first", [source]) => match self.first(source, input, env)? {
                Some(value) => out(value),
                None => Ok(Flow::Continue),
            },

            ("limit", [count, source]) => self.eval(count, input, env, &mut |n| {
                let n = n.as_number().ok_or_else(|| {
                    FormulaError::eval(format!("Invalid limit {}", n.describe()))
                })?;
                if n <= 0.0 {
                    return Ok(Flow::Continue);
                }
                let mut taken = 0.0;
                let mut downstream_stop = false;
                self.eval(source, input, env, &mut |value| {
                    taken += 1.0;
                    if out(value)? == Flow::Stop {
                        downstream_stop = true;
                        return Ok(Flow::Stop);
                    }
                    Ok(if taken >= n { Flow::Stop } else { Flow::Continue })
                })?;
                Ok(if downstream_stop {
                    Flow::Stop
                } else {
                    Flow::Continue
                })
            }),

            ("range", [upto]) => self.eval(upto, input, env, &mut |upto| {
                emit_range(0.0, &upto, &mut *out)
            }),

            ("range", [from, upto]) => self.eval(from, input, env, &mut |from| {
                let start = from
                    .as_number()
                    .ok_or_else(|| FormulaError::eval("Range bounds must be numeric"))?;
                self.eval(upto, input, env, &mut |upto| emit_range(start, &upto, &mut *out))
            }),

            _ => Err(FormulaError::UndefinedFunction {
                name: name.to_string(),
                arity: args.len(),
            }),
        }
    }
}

fn emit_range(start: f64, upto: &FormulaValue, out: &mut Sink<'_>) -> FormulaResult<Flow> {
    let end = upto
        .as_number()
        .ok_or_else(|| FormulaError::eval("Range bounds must be numeric"))?;
    let mut i = start;
    while i < end {
        if out(FormulaValue::Number(i))? == Flow::Stop {
            return Ok(Flow::Stop);
        }
        i += 1.0;
    }
    Ok(Flow::Continue)
}

// ============================================================================
// Paths
// ============================================================================

fn recurse_all(value: &FormulaValue, out: &mut Sink<'_>) -> FormulaResult<Flow> {
    if out(value.clone())? == Flow::Stop {
        return Ok(Flow::Stop);
    }
    let children: Vec<&FormulaValue> = match value {
        FormulaValue::Array(items) => items.iter().collect(),
        FormulaValue::Object(map) => map.values().collect(),
        _ => return Ok(Flow::Continue),
    };
    for child in children {
        if recurse_all(child, out)? == Flow::Stop {
            return Ok(Flow::Stop);
        }
    }
    Ok(Flow::Continue)
}

fn iterate(value: &FormulaValue, out: &mut Sink<'_>) -> FormulaResult<Flow> {
    let items: Vec<FormulaValue> = match value {
        FormulaValue::Array(items) => items.clone(),
        FormulaValue::Object(map) => map.values().cloned().collect(),
        FormulaValue::Null => return Err(FormulaError::eval("Cannot iterate over null")),
        other => {
            return Err(FormulaError::eval(format!(
                "Cannot iterate over {}",
                other.describe()
            )))
        }
    };
    for item in items {
        if out(item)? == Flow::Stop {
            return Ok(Flow::Stop);
        }
    }
    Ok(Flow::Continue)
}

fn index_field(value: &FormulaValue, name: &str) -> FormulaResult<FormulaValue> {
    match value {
        FormulaValue::Object(map) => Ok(map.get(name).cloned().unwrap_or(FormulaValue::Null)),
        FormulaValue::Null => Ok(FormulaValue::Null),
        other => Err(FormulaError::eval(format!(
            "Cannot index {} with \"{}\"",
            other.type_name(),
            name
        ))),
    }
}

fn array_position(len: usize, index: f64) -> Option<usize> {
    let index = index.floor();
    let index = if index < 0.0 { len as f64 + index } else { index };
    if index < 0.0 || index >= len as f64 {
        None
    } else {
        Some(index as usize)
    }
}

fn index_value(value: &FormulaValue, key: &FormulaValue) -> FormulaResult<FormulaValue> {
    match (value, key) {
        (_, FormulaValue::String(name)) if !matches!(value, FormulaValue::Array(_)) => {
            index_field(value, name)
        }
        (FormulaValue::Array(items), FormulaValue::Number(n)) => Ok(array_position(items.len(), *n)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(FormulaValue::Null)),
        (FormulaValue::Null, FormulaValue::Number(_)) => Ok(FormulaValue::Null),
        (FormulaValue::Array(items), FormulaValue::Array(needle)) => Ok(FormulaValue::Array(
            find_indices(items, needle)
                .into_iter()
                .map(|i| FormulaValue::Number(i as f64))
                .collect(),
        )),
        (FormulaValue::Array(_), FormulaValue::String(name)) => Err(FormulaError::eval(format!(
            "Cannot index array with \"{}\"",
            name
        ))),
        (value, key) => Err(FormulaError::eval(format!(
            "Cannot index {} with {}",
            value.type_name(),
            key.type_name()
        ))),
    }
}

fn find_indices(items: &[FormulaValue], needle: &[FormulaValue]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > items.len() {
        return Vec::new();
    }
    (0..=items.len() - needle.len())
        .filter(|&start| {
            needle
                .iter()
                .enumerate()
                .all(|(offset, n)| items[start + offset].loose_eq(n))
        })
        .collect()
}

fn slice_bounds(len: usize, start: &FormulaValue, end: &FormulaValue) -> FormulaResult<(usize, usize)> {
    let clamp = |bound: &FormulaValue, default: usize| -> FormulaResult<usize> {
        match bound {
            FormulaValue::Null => Ok(default),
            FormulaValue::Number(n) => {
                let n = n.floor();
                let n = if n < 0.0 { len as f64 + n } else { n };
                Ok(n.max(0.0).min(len as f64) as usize)
            }
            _ => Err(FormulaError::eval(
                "Start and end indices of an array slice must be numbers",
            )),
        }
    };
    let from = clamp(start, 0)?;
    let to = clamp(end, len)?;
    Ok((from, to.max(from)))
}

fn slice_value(
    value: &FormulaValue,
    start: &FormulaValue,
    end: &FormulaValue,
) -> FormulaResult<FormulaValue> {
    match value {
        FormulaValue::Null => Ok(FormulaValue::Null),
        FormulaValue::Array(items) => {
            let (from, to) = slice_bounds(items.len(), start, end)?;
            Ok(FormulaValue::Array(items[from..to].to_vec()))
        }
        FormulaValue::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = slice_bounds(chars.len(), start, end)?;
            Ok(FormulaValue::String(chars[from..to].iter().collect()))
        }
        other => Err(FormulaError::eval(format!(
            "Cannot index {} with object",
            other.type_name()
        ))),
    }
}

// ============================================================================
// Operators
// ============================================================================

fn operator_error(l: &FormulaValue, r: &FormulaValue, verb: &str) -> FormulaError {
    FormulaError::eval(format!(
        "{} and {} cannot be {}",
        l.describe(),
        r.describe(),
        verb
    ))
}

fn deep_merge(
    mut left: BTreeMap<String, FormulaValue>,
    right: &BTreeMap<String, FormulaValue>,
) -> BTreeMap<String, FormulaValue> {
    for (key, r) in right {
        let merged = match (left.remove(key), r) {
            (Some(FormulaValue::Object(l)), FormulaValue::Object(r)) => {
                FormulaValue::Object(deep_merge(l, r))
            }
            (_, r) => r.clone(),
        };
        left.insert(key.clone(), merged);
    }
    left
}

fn repeat_string(s: &str, n: f64) -> FormulaResult<FormulaValue> {
    if n <= 0.0 {
        return Ok(FormulaValue::Null);
    }
    let count = n.ceil();
    let too_long = count >= MAX_STRING_LENGTH as f64
        || (count as usize)
            .checked_mul(s.len())
            .map_or(true, |len| len > MAX_STRING_LENGTH);
    if too_long {
        return Err(FormulaError::eval("Repeat string result too long"));
    }
    Ok(FormulaValue::String(s.repeat(count as usize)))
}

/// Apply a binary operator to two values
pub fn apply_binary(
    op: BinaryOperator,
    l: &FormulaValue,
    r: &FormulaValue,
) -> FormulaResult<FormulaValue> {
    use FormulaValue::*;

    let value = match op {
        BinaryOperator::Add => match (l, r) {
            (Null, other) | (other, Null) => other.clone(),
            (Number(a), Number(b)) => Number(a + b),
            (String(a), String(b)) => String(format!("{}{}", a, b)),
            (Array(a), Array(b)) => Array(a.iter().chain(b.iter()).cloned().collect()),
            (Object(a), Object(b)) => {
                let mut merged = a.clone();
                merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
                Object(merged)
            }
            _ => return Err(operator_error(l, r, "added")),
        },

        BinaryOperator::Subtract => match (l, r) {
            (Number(a), Number(b)) => Number(a - b),
            (Array(a), Array(b)) => Array(
                a.iter()
                    .filter(|item| !b.iter().any(|x| x.loose_eq(item)))
                    .cloned()
                    .collect(),
            ),
            _ => return Err(operator_error(l, r, "subtracted")),
        },

        BinaryOperator::Multiply => match (l, r) {
            (Number(a), Number(b)) => Number(a * b),
            (String(s), Number(n)) | (Number(n), String(s)) => repeat_string(s, *n)?,
            (Object(a), Object(b)) => Object(deep_merge(a.clone(), b)),
            _ => return Err(operator_error(l, r, "multiplied")),
        },

        BinaryOperator::Divide => match (l, r) {
            (Number(_), Number(b)) if *b == 0.0 => {
                return Err(operator_error(l, r, "divided because the divisor is zero"))
            }
            (Number(a), Number(b)) => Number(a / b),
            (String(_), String(_)) => crate::functions::text::fn_split(l, std::slice::from_ref(r))?,
            _ => return Err(operator_error(l, r, "divided")),
        },

        BinaryOperator::Modulo => match (l, r) {
            (Number(a), Number(b)) => {
                let divisor = b.trunc() as i64;
                if divisor == 0 {
                    return Err(operator_error(l, r, "divided because the divisor is zero"));
                }
                Number((a.trunc() as i64).wrapping_rem(divisor) as f64)
            }
            _ => return Err(operator_error(l, r, "divided")),
        },

        BinaryOperator::Equal => Boolean(l.loose_eq(r)),
        BinaryOperator::NotEqual => Boolean(!l.loose_eq(r)),
        BinaryOperator::LessThan => Boolean(l.compare(r).is_lt()),
        BinaryOperator::LessEqual => Boolean(l.compare(r).is_le()),
        BinaryOperator::GreaterThan => Boolean(l.compare(r).is_gt()),
        BinaryOperator::GreaterEqual => Boolean(l.compare(r).is_ge()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(formula: &str, input: serde_json::Value) -> FormulaResult<Vec<FormulaValue>> {
        let expr = parse_formula(formula)?;
        Interpreter::new().collect(&expr, &FormulaValue::from(input), &Env::new())
    }

    fn values(items: serde_json::Value) -> Vec<FormulaValue> {
        match FormulaValue::from(items) {
            FormulaValue::Array(items) => items,
            other => vec![other],
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run(".a + .b * 2", json!({"a": 1, "b": 3})).unwrap(), values(json!([7])));
        assert_eq!(run("null + 1", json!(null)).unwrap(), values(json!([1])));
        assert_eq!(run("7 % 3", json!(null)).unwrap(), values(json!([1])));
        assert_eq!(run(r#""ab" * 2"#, json!(null)).unwrap(), values(json!(["abab"])));
        assert_eq!(
            run(r#""a,b" / ",""#, json!(null)).unwrap(),
            vec![FormulaValue::from(json!(["a", "b"]))]
        );
    }

    #[test]
    fn test_repeat_string_limit() {
        assert_eq!(run(r#""ab" * 0"#, json!(null)).unwrap(), values(json!([null])));
        assert_eq!(run(r#"1.5 * "ab""#, json!(null)).unwrap(), values(json!(["abab"])));

        let err = run(".name * .count", json!({"name": "ab", "count": 1e19})).unwrap_err();
        assert_eq!(err.to_string(), "Repeat string result too long");
        assert!(err.is_catchable());

        let err = run(r#""abcd" * 20000000"#, json!(null)).unwrap_err();
        assert_eq!(err, FormulaError::eval("Repeat string result too long"));
    }

    #[test]
    fn test_type_errors() {
        let err = run(".a / .b", json!({"a": "twenty", "b": 100})).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"string ("twenty") and number (100) cannot be divided"#
        );

        let err = run(".a / 0", json!({"a": 5})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "number (5) and number (0) cannot be divided because the divisor is zero"
        );

        let err = run(".a.b", json!({"a": 5})).unwrap_err();
        assert_eq!(err.to_string(), r#"Cannot index number with "b""#);
    }

    #[test]
    fn test_comma_and_cartesian_order() {
        assert_eq!(
            run("(1, 2) + (10, 20)", json!(null)).unwrap(),
            values(json!([11, 12, 21, 22]))
        );
    }

    #[test]
    fn test_paths() {
        let input = json!({"items": [{"n": 1}, {"n": 2}], "s": "hello"});
        assert_eq!(run(".items[].n", input.clone()).unwrap(), values(json!([1, 2])));
        assert_eq!(run(".items[-1].n", input.clone()).unwrap(), values(json!([2])));
        assert_eq!(run(".s[1:3]", input.clone()).unwrap(), values(json!(["el"])));
        assert_eq!(run(".missing.deeper", input).unwrap(), values(json!([null])));
    }

    #[test]
    fn test_alternative_and_try() {
        assert_eq!(run(".a // 5", json!({"a": null})).unwrap(), values(json!([5])));
        assert_eq!(run(".a // 5", json!({"a": false})).unwrap(), values(json!([5])));
        assert_eq!(run(".a // 5", json!({"a": 0})).unwrap(), values(json!([0])));
        assert_eq!(run("(.a.b) // 5", json!({"a": 1})).unwrap(), values(json!([5])));
        assert_eq!(
            run(r#"try error("boom") catch ."#, json!(null)).unwrap(),
            values(json!(["boom"]))
        );
        assert_eq!(run(".a.b?", json!({"a": 1})).unwrap(), Vec::<FormulaValue>::new());
    }

    #[test]
    fn test_try_does_not_catch_downstream_errors() {
        // The error is raised after `try` produced its value
        let err = run("(try 1) | error(\"late\")", json!(null)).unwrap_err();
        assert_eq!(err, FormulaError::Raised(FormulaValue::from("late")));
    }

    #[test]
    fn test_reduce_and_bind() {
        assert_eq!(
            run("reduce .[] as $n (0; . + $n)", json!([1, 2, 3])).unwrap(),
            values(json!([6]))
        );
        assert_eq!(
            run(".a as $x | .b | . + $x", json!({"a": 1, "b": 2})).unwrap(),
            values(json!([3]))
        );
    }

    #[test]
    fn test_definitions_and_closures() {
        assert_eq!(
            run("def twice(f): f | f; 3 | twice(. * 2)", json!(null)).unwrap(),
            values(json!([12]))
        );
        assert_eq!(
            run("def add($a; $b): $a + $b; add(.x; 1)", json!({"x": 2})).unwrap(),
            values(json!([3]))
        );
        assert_eq!(
            run("def fact: if . <= 1 then 1 else . * (. - 1 | fact) end; 5 | fact", json!(null))
                .unwrap(),
            values(json!([120]))
        );
    }

    #[test]
    fn test_core_definitions() {
        assert_eq!(
            run("map(. * 2)", json!([1, 2])).unwrap(),
            vec![FormulaValue::from(json!([2, 4]))]
        );
        assert_eq!(
            run("[.[] | select(. > 1)]", json!([1, 2, 3])).unwrap(),
            vec![FormulaValue::from(json!([2, 3]))]
        );
        assert_eq!(
            run("with_entries({key, value: (.value + 1)})", json!({"a": 1})).unwrap(),
            vec![FormulaValue::from(json!({"a": 2}))]
        );
        assert_eq!(
            run("to_entries | from_entries", json!({"a": 1})).unwrap(),
            vec![FormulaValue::from(json!({"a": 1}))]
        );
        assert_eq!(run("-3 | abs", json!(null)).unwrap(), values(json!([3])));
    }

    #[test]
    fn test_object_construction() {
        assert_eq!(
            run(r#"{a: .x, "b": 2, (.k): 3}"#, json!({"x": 1, "k": "c"})).unwrap(),
            vec![FormulaValue::from(json!({"a": 1, "b": 2, "c": 3}))]
        );
        assert_eq!(
            run("{a: (1, 2)}", json!(null)).unwrap(),
            values(json!([{"a": 1}, {"a": 2}]))
        );
    }

    #[test]
    fn test_first_stops_producer() {
        let expr = parse_formula(r#"1, error("never")"#).unwrap();
        let first = Interpreter::new()
            .first(&expr, &FormulaValue::Null, &Env::new())
            .unwrap();
        assert_eq!(first, Some(FormulaValue::Number(1.0)));

        assert_eq!(
            run("first(range(10; 20))", json!(null)).unwrap(),
            values(json!([10]))
        );
        assert_eq!(
            run("[limit(3; range(100))]", json!(null)).unwrap(),
            vec![FormulaValue::from(json!([0, 1, 2]))]
        );
    }

    #[test]
    fn test_depth_limit_is_not_catchable() {
        let expr = parse_formula("def f: f; try f catch 0").unwrap();
        let err = Interpreter::with_max_depth(16)
            .collect(&expr, &FormulaValue::Null, &Env::new())
            .unwrap_err();
        assert_eq!(err, FormulaError::DepthExceeded(16));
    }

    #[test]
    fn test_string_interpolation() {
        assert_eq!(
            run(r#""\(.n) items at \(.p)""#, json!({"n": 2, "p": 1.5})).unwrap(),
            values(json!(["2 items at 1.5"]))
        );
    }
}
