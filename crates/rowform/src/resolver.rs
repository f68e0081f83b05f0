//! Column reference resolution
//!
//! Finds the columns a formula reads and maps them onto the declared input
//! schema. A reference is the head of a path: `.name`, `."any text"` or
//! `.["any text"]` not applied to a preceding term. `.a.b` therefore reads
//! `a` only and `$period.start` reads no column at all.
//!
//! Names may repeat across schema generations. The legacy alias form
//! `Name (C<suffix>)` picks the column whose id ends in `-<suffix>`.

use crate::error::{ConfigResult, ConfigurationError};
use ahash::AHashMap;
use lazy_regex::regex_is_match;
use rowform_core::Column;
use rowform_formula::{tokenize, FormulaResult, Spanned, StrPart, Token};

/// Every column reference in `formula`, in order of appearance. References
/// inside string interpolations are included.
pub fn references(formula: &str) -> FormulaResult<Vec<String>> {
    let mut found = Vec::new();
    collect_references(formula, &mut found)?;
    Ok(found)
}

fn collect_references(source: &str, found: &mut Vec<String>) -> FormulaResult<()> {
    let tokens = tokenize(source)?;

    for i in 0..tokens.len() {
        if let Token::Str(parts) = &tokens[i].token {
            for part in parts {
                if let StrPart::Interpolation { source, .. } = part {
                    collect_references(source, found)?;
                }
            }
        }

        let applied = i > 0 && tokens[i - 1].token.ends_term();
        if !applied {
            if let Some(name) = reference_at(&tokens[i..]) {
                found.push(name);
            }
        }
    }

    Ok(())
}

/// The column name read by the path starting at `tokens[0]`, if any
fn reference_at(tokens: &[Spanned]) -> Option<String> {
    match tokens {
        [Spanned {
            token: Token::Field(name),
            ..
        }, ..] => Some(name.clone()),
        [Spanned {
            token: Token::Dot, ..
        }, Spanned {
            token: quoted @ Token::Str(_),
            ..
        }, ..] => quoted.plain_string(),
        [Spanned {
            token: Token::Dot, ..
        }, Spanned {
            token: Token::LeftBracket,
            ..
        }, Spanned {
            token: quoted @ Token::Str(_),
            ..
        }, Spanned {
            token: Token::RightBracket,
            ..
        }, ..] => quoted.plain_string(),
        _ => None,
    }
}

/// Lookup of formula references against an input schema
#[derive(Debug)]
pub struct ColumnResolver<'c> {
    by_name: AHashMap<&'c str, &'c Column>,
    by_suffix: AHashMap<String, &'c Column>,
}

impl<'c> ColumnResolver<'c> {
    pub fn new(columns: &'c [Column]) -> Self {
        let mut by_name = AHashMap::with_capacity(columns.len());
        let mut by_suffix = AHashMap::with_capacity(columns.len());

        for column in columns {
            // Later columns replace earlier ones with the same name
            by_name.insert(column.name.as_str(), column);
            if let Some(token) = column.suffix_token() {
                by_suffix.insert(token, column);
            }
        }

        Self { by_name, by_suffix }
    }

    /// Resolve one reference by name, then by alias label
    pub fn resolve(&self, reference: &str) -> Option<&'c Column> {
        if let Some(column) = self.by_name.get(reference) {
            return Some(column);
        }
        self.resolve_alias(reference)
    }

    fn resolve_alias(&self, reference: &str) -> Option<&'c Column> {
        let mut words: Vec<&str> = reference.split_whitespace().collect();
        let token = words.pop()?;
        if !regex_is_match!(r"^\(C[^()\s]+\)$", token) {
            return None;
        }
        let column = self.by_suffix.get(token)?;
        if column.name == words.join(" ") {
            Some(column)
        } else {
            None
        }
    }

    /// Resolve every reference in `formula`. The first reference that does not
    /// resolve is reported together with the formula.
    pub fn resolve_formula(&self, formula: &str) -> ConfigResult<Vec<&'c Column>> {
        let names = references(formula).map_err(|e| ConfigurationError::syntax(formula, &e))?;
        names
            .iter()
            .map(|name| {
                self.resolve(name)
                    .ok_or_else(|| ConfigurationError::resolution(formula, name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn refs(formula: &str) -> Vec<String> {
        references(formula).unwrap()
    }

    #[test]
    fn test_reference_syntaxes() {
        assert_eq!(refs(".price"), vec!["price"]);
        assert_eq!(refs(r#"."price""#), vec!["price"]);
        assert_eq!(refs(r#".["price"]"#), vec!["price"]);
        assert_eq!(
            refs(r#".price * ."Unit count" + .["Tax (C0001)"]"#),
            vec!["price", "Unit count", "Tax (C0001)"]
        );
    }

    #[test]
    fn test_only_path_heads_count() {
        assert_eq!(refs(".order.lines[0].qty"), vec!["order"]);
        assert_eq!(refs(r#"$period.start, ."a"."b""#), vec!["a"]);
        assert_eq!(refs(r#"".price is text" + .x"#), vec!["x"]);
        assert_eq!(refs(r#""\(.first) \(.last)" + .title"#), vec!["first", "last", "title"]);
        assert_eq!(refs("(.a | .b) + [.c][0]"), vec!["a", "b", "c"]);
        assert_eq!(
            refs(r#"if .tax > 10 then .gross else .net end"#),
            vec!["tax", "gross", "net"]
        );
        assert!(refs(".[0] | .[\"x\" + .y]").contains(&"y".to_string()));
    }

    #[test]
    fn test_alias_resolution() {
        let columns = vec![
            Column::new("COL-123-0001", "Quantity"),
            Column::new("COL-123-0002", "Quantity"),
        ];
        let resolver = ColumnResolver::new(&columns);

        let column = resolver.resolve("Quantity (C0001)").unwrap();
        assert_eq!(column.id.as_deref(), Some("COL-123-0001"));
        let column = resolver.resolve("Quantity (C0002)").unwrap();
        assert_eq!(column.id.as_deref(), Some("COL-123-0002"));

        // Last entry wins on a plain name
        let column = resolver.resolve("Quantity").unwrap();
        assert_eq!(column.id.as_deref(), Some("COL-123-0002"));

        assert!(resolver.resolve("Price (C0001)").is_none());
        assert!(resolver.resolve("Quantity (C0003)").is_none());
        assert!(resolver.resolve("Quantity C0001").is_none());
    }

    #[test]
    fn test_resolve_formula_reports_first_missing() {
        let columns = vec![Column::new("COL-1", "price")];
        let resolver = ColumnResolver::new(&columns);

        assert_eq!(resolver.resolve_formula(".price * 2").unwrap().len(), 1);
        assert_eq!(
            resolver.resolve_formula(".price * .qty").unwrap_err(),
            ConfigurationError::Resolution {
                formula: ".price * .qty".into(),
                reference: "qty".into(),
            }
        );
    }
}
