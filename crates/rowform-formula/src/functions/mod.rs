//! Built-in formula functions
//!
//! Three kinds of built-ins exist:
//! - control built-ins (`empty`, `error`, `first/1`, `limit/2`, `range`) that
//!   need access to the stream and live in the evaluator,
//! - core definitions written in the formula language itself ([`definitions`]),
//! - native functions registered here, which receive the input value and
//!   their already-evaluated arguments.

pub mod collection;
pub mod definitions;
pub mod info;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use crate::value::FormulaValue;
use ahash::AHashMap;
use once_cell::sync::Lazy;

/// Native function signature: `(input, evaluated arguments) -> output`
pub type FunctionImpl = fn(&FormulaValue, &[FormulaValue]) -> FormulaResult<FormulaValue>;

/// Native function definition
pub struct FunctionDef {
    /// Function name as written in formulas
    pub name: &'static str,
    /// Number of arguments
    pub arity: usize,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// Control built-ins handled directly by the evaluator
pub(crate) const CONTROL_BUILTINS: &[(&str, usize)] = &[
    ("empty", 0),
    ("error", 0),
    ("error", 1),
    ("first", 1),
    ("limit", 2),
    ("range", 1),
    ("range", 2),
];

/// Process-wide registry of native functions
pub static BUILTINS: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// Function registry keyed by name, then arity
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, Vec<FunctionDef>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all native functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_info_functions();
        registry.register_math_functions();
        registry.register_text_functions();
        registry.register_collection_functions();

        registry
    }

    /// Look up a function by name and arity
    pub fn get(&self, name: &str, arity: usize) -> Option<&FunctionDef> {
        self.functions
            .get(name)
            .and_then(|defs| defs.iter().find(|def| def.arity == arity))
    }

    /// Register a function, replacing any previous one with the same name and arity
    pub fn register(&mut self, def: FunctionDef) {
        let defs = self.functions.entry(def.name).or_default();
        defs.retain(|existing| existing.arity != def.arity);
        defs.push(def);
    }

    pub fn len(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn add(&mut self, name: &'static str, arity: usize, implementation: FunctionImpl) {
        self.register(FunctionDef {
            name,
            arity,
            implementation,
        });
    }

    fn register_info_functions(&mut self) {
        self.add("length", 0, info::fn_length);
        self.add("utf8bytelength", 0, info::fn_utf8bytelength);
        self.add("not", 0, info::fn_not);
        self.add("type", 0, info::fn_type);
        self.add("infinite", 0, info::fn_infinite);
        self.add("nan", 0, info::fn_nan);
        self.add("isnan", 0, info::fn_isnan);
    }

    fn register_math_functions(&mut self) {
        self.add("floor", 0, math::fn_floor);
        self.add("ceil", 0, math::fn_ceil);
        self.add("round", 0, math::fn_round);
        self.add("trunc", 0, math::fn_trunc);
        self.add("fabs", 0, math::fn_fabs);
        self.add("sqrt", 0, math::fn_sqrt);
        self.add("log", 0, math::fn_log);
        self.add("log10", 0, math::fn_log10);
        self.add("exp", 0, math::fn_exp);
        self.add("pow", 2, math::fn_pow);
    }

    fn register_text_functions(&mut self) {
        self.add("tostring", 0, text::fn_tostring);
        self.add("tonumber", 0, text::fn_tonumber);
        self.add("tojson", 0, text::fn_tojson);
        self.add("fromjson", 0, text::fn_fromjson);
        self.add("ascii_downcase", 0, text::fn_ascii_downcase);
        self.add("ascii_upcase", 0, text::fn_ascii_upcase);
        self.add("ltrimstr", 1, text::fn_ltrimstr);
        self.add("rtrimstr", 1, text::fn_rtrimstr);
        self.add("startswith", 1, text::fn_startswith);
        self.add("endswith", 1, text::fn_endswith);
        self.add("split", 1, text::fn_split);
        self.add("join", 1, text::fn_join);
        self.add("test", 1, text::fn_test);
    }

    fn register_collection_functions(&mut self) {
        self.add("keys", 0, collection::fn_keys);
        self.add("has", 1, collection::fn_has);
        self.add("contains", 1, collection::fn_contains);
        self.add("add", 0, collection::fn_add);
        self.add("reverse", 0, collection::fn_reverse);
        self.add("sort", 0, collection::fn_sort);
        self.add("unique", 0, collection::fn_unique);
        self.add("min", 0, collection::fn_min);
        self.add("max", 0, collection::fn_max);
    }
}

/// Whether `name/arity` is provided by any kind of built-in
pub fn is_builtin(name: &str, arity: usize) -> FormulaResult<bool> {
    if is_control(name, arity) || BUILTINS.get(name, arity).is_some() {
        return Ok(true);
    }
    Ok(definitions::definition(name, arity)?.is_some())
}

pub(crate) fn is_control(name: &str, arity: usize) -> bool {
    CONTROL_BUILTINS
        .iter()
        .any(|&(n, a)| n == name && a == arity)
}

/// Error for a native function applied to an input of the wrong type
pub(crate) fn type_error(value: &FormulaValue, what: &str) -> crate::error::FormulaError {
    crate::error::FormulaError::eval(format!("{} {}", value.describe(), what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_by_arity() {
        assert!(BUILTINS.get("length", 0).is_some());
        assert!(BUILTINS.get("length", 1).is_none());
        assert!(BUILTINS.get("pow", 2).is_some());
        assert!(!BUILTINS.is_empty());
    }

    #[test]
    fn test_is_builtin_covers_every_kind() {
        assert!(is_builtin("empty", 0).unwrap());
        assert!(is_builtin("first", 1).unwrap());
        assert!(is_builtin("map", 1).unwrap());
        assert!(is_builtin("tonumber", 0).unwrap());
        assert!(!is_builtin("tonumber", 1).unwrap());
        assert!(!is_builtin("nope", 0).unwrap());
    }
}
