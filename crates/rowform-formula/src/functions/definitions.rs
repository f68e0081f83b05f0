//! Built-ins defined in the formula language itself
//!
//! The definitions are parsed once per process. They are looked up after
//! formula-local definitions and control built-ins, and before native
//! functions, so a definition here may call any native function.

use crate::ast::{Expr, FunctionDef};
use crate::error::{FormulaError, FormulaResult};
use crate::parser::parse_formula;
use once_cell::sync::Lazy;

/// Source of the core definitions. Later definitions may use earlier ones.
pub const CORE_DEFINITIONS: &str = r#"
def map(f): [.[] | f];
def select(f): if f then . else empty end;
def values: select(. != null);
def recurse(f): def r: ., (f | r); r;
def recurse: recurse(.[]?);
def to_entries: [keys[] as $k | {key: $k, value: .[$k]}];
def from_entries: map({(.key // .k // .name // .Name // .K // .Key | if type == "string" then . else tojson end): (if has("value") then .value else .v end)}) | add + {} // {};
def with_entries(f): to_entries | map(f) | from_entries;
def any: reduce .[] as $x (false; . or $x);
def all: reduce .[] as $x (true; . and $x);
def any(f): reduce (.[] | f) as $x (false; . or $x);
def all(f): reduce (.[] | f) as $x (true; . and $x);
def in(xs): . as $x | xs | has($x);
def first: .[0];
def last: .[-1];
def abs: if type == "number" and . < 0 then - . else . end;
"#;

static DEFINITIONS: Lazy<FormulaResult<Vec<FunctionDef>>> = Lazy::new(|| {
    let mut expr = parse_formula(&format!("{} .", CORE_DEFINITIONS))?;
    let mut defs = Vec::new();
    while let Expr::Define { def, body } = expr {
        defs.push(*def);
        expr = *body;
    }
    Ok(defs)
});

/// Find the core definition for `name/arity`
pub fn definition(name: &str, arity: usize) -> FormulaResult<Option<&'static FunctionDef>> {
    let defs = DEFINITIONS.as_ref().map_err(FormulaError::clone)?;
    Ok(defs
        .iter()
        .rev()
        .find(|def| def.name == name && def.arity() == arity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_definitions_parse() {
        let defs = DEFINITIONS.as_ref().unwrap();
        assert_eq!(defs.len(), 16);
        assert!(definition("map", 1).unwrap().is_some());
        assert!(definition("recurse", 0).unwrap().is_some());
        assert!(definition("recurse", 1).unwrap().is_some());
        assert!(definition("map", 2).unwrap().is_none());
    }
}
