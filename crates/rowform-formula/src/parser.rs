//! Formula parser
//!
//! A recursive descent parser over the token stream with jq operator
//! precedence.

use crate::ast::{BinaryOperator, Expr, FunctionDef, ObjectKey, Param, TemplatePart};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{is_keyword, tokenize_at, Spanned, StrPart, Token, MAX_NESTING_DEPTH};
use crate::value::FormulaValue;

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use rowform_formula::parse_formula;
///
/// let ast = parse_formula(".price * 2").unwrap();
/// let ast = parse_formula(r#"if .tax > 10 then "high" else "low" end"#).unwrap();
/// let ast = parse_formula("round(.price; 2)").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<Expr> {
    parse_fragment(formula, 0, 0)
}

fn parse_fragment(source: &str, base: usize, depth: usize) -> FormulaResult<Expr> {
    let tokens = tokenize_at(source, base)?;
    let mut parser = FormulaParser::new(tokens, depth);
    let expr = parser.parse_pipe()?;

    // Make sure we consumed all input
    if !parser.is_at_end() {
        return Err(parser.unexpected());
    }

    Ok(expr)
}

/// Formula parser
struct FormulaParser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Current nesting, bounded by [`MAX_NESTING_DEPTH`]
    depth: usize,
}

impl FormulaParser {
    fn new(tokens: Vec<Spanned>, depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth,
        }
    }

    // === Token access ===

    fn current_token(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_token(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.offset)
            .unwrap_or(0)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::syntax(
                format!("expected {:?}, got {:?}", expected, self.current_token()),
                self.offset(),
            ))
        }
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.current_token(), Token::Ident(w) if w == word)
    }

    fn expect_keyword(&mut self, word: &str) -> FormulaResult<()> {
        if self.at_keyword(word) {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::syntax(
                format!("expected '{}', got {:?}", word, self.current_token()),
                self.offset(),
            ))
        }
    }

    fn expect_variable(&mut self) -> FormulaResult<String> {
        match self.consume() {
            Token::Variable(name) => Ok(name),
            other => Err(FormulaError::syntax(
                format!("expected variable, got {:?}", other),
                self.offset(),
            )),
        }
    }

    fn descend(&mut self) -> FormulaResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(FormulaError::syntax(
                format!("formula nested more than {} levels deep", MAX_NESTING_DEPTH),
                self.offset(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one nesting level down
    fn nested<T>(&mut self, parse: fn(&mut Self) -> FormulaResult<T>) -> FormulaResult<T> {
        let depth = self.depth;
        self.descend()?;
        let result = parse(self);
        self.depth = depth;
        result
    }

    fn unexpected(&self) -> FormulaError {
        FormulaError::syntax(
            format!("unexpected token {:?}", self.current_token()),
            self.offset(),
        )
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Pipe `|` (right associative), `def`, `as` bindings
    // 2. Comma `,`
    // 3. Alternative `//` (right associative)
    // 4. `or`
    // 5. `and`
    // 6. Comparison (non-associative)
    // 7. Addition/Subtraction
    // 8. Multiplication/Division/Modulo
    // 9. Unary minus
    // 10. Postfix: field access, indexing, iteration, `?`
    // 11. Primary: literals, paths, calls, parentheses, control forms

    fn parse_pipe(&mut self) -> FormulaResult<Expr> {
        self.nested(Self::parse_pipe_level)
    }

    fn parse_pipe_level(&mut self) -> FormulaResult<Expr> {
        if self.at_keyword("def") {
            let def = self.parse_definition()?;
            let body = self.parse_pipe()?;
            return Ok(Expr::Define {
                def: Box::new(def),
                body: body.boxed(),
            });
        }

        let left = self.parse_comma()?;

        if self.at_keyword("as") {
            self.consume();
            let var = self.expect_variable()?;
            self.expect(&Token::Pipe)?;
            let body = self.parse_pipe()?;
            return Ok(Expr::Bind {
                source: left.boxed(),
                var,
                body: body.boxed(),
            });
        }

        if matches!(self.current_token(), Token::Pipe) {
            self.consume();
            let right = self.parse_pipe()?; // Right associative
            return Ok(Expr::Pipe(left.boxed(), right.boxed()));
        }

        Ok(left)
    }

    fn parse_definition(&mut self) -> FormulaResult<FunctionDef> {
        self.expect_keyword("def")?;
        let name = match self.consume() {
            Token::Ident(name) if !is_keyword(&name) => name,
            other => {
                return Err(FormulaError::syntax(
                    format!("expected function name, got {:?}", other),
                    self.offset(),
                ))
            }
        };

        let mut params = Vec::new();
        if matches!(self.current_token(), Token::LeftParen) {
            self.consume();
            loop {
                let param = match self.consume() {
                    Token::Ident(p) if !is_keyword(&p) => Param::Filter(p),
                    Token::Variable(p) => Param::Value(p),
                    other => {
                        return Err(FormulaError::syntax(
                            format!("expected parameter, got {:?}", other),
                            self.offset(),
                        ))
                    }
                };
                params.push(param);
                match self.current_token() {
                    Token::Semicolon => {
                        self.consume();
                    }
                    Token::RightParen => {
                        self.consume();
                        break;
                    }
                    _ => return Err(self.unexpected()),
                }
            }
        }

        self.expect(&Token::Colon)?;
        let body = self.parse_pipe()?;
        self.expect(&Token::Semicolon)?;

        Ok(FunctionDef { name, params, body })
    }

    fn parse_comma(&mut self) -> FormulaResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_alternative()?;

        while matches!(self.current_token(), Token::Comma) {
            self.consume();
            self.descend()?;
            let right = self.parse_alternative()?;
            left = Expr::Comma(left.boxed(), right.boxed());
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_alternative(&mut self) -> FormulaResult<Expr> {
        let left = self.parse_or()?;

        if matches!(self.current_token(), Token::Alternative) {
            self.consume();
            let right = self.nested(Self::parse_alternative)?; // Right associative
            return Ok(Expr::Alternative(left.boxed(), right.boxed()));
        }

        Ok(left)
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_and()?;

        while self.at_keyword("or") {
            self.consume();
            self.descend()?;
            let right = self.parse_and()?;
            left = Expr::Or(left.boxed(), right.boxed());
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_comparison()?;

        while self.at_keyword("and") {
            self.consume();
            self.descend()?;
            let right = self.parse_comparison()?;
            left = Expr::And(left.boxed(), right.boxed());
        }

        self.depth = depth;
        Ok(left)
    }

    fn comparison_operator(&self) -> Option<BinaryOperator> {
        match self.current_token() {
            Token::Equal => Some(BinaryOperator::Equal),
            Token::NotEqual => Some(BinaryOperator::NotEqual),
            Token::LessThan => Some(BinaryOperator::LessThan),
            Token::LessEqual => Some(BinaryOperator::LessEqual),
            Token::GreaterThan => Some(BinaryOperator::GreaterThan),
            Token::GreaterEqual => Some(BinaryOperator::GreaterEqual),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let left = self.parse_additive()?;

        let op = match self.comparison_operator() {
            Some(op) => op,
            None => return Ok(left),
        };
        self.consume();
        let right = self.parse_additive()?;

        // Comparisons do not chain
        if self.comparison_operator().is_some() {
            return Err(self.unexpected());
        }

        Ok(Expr::Binary {
            op,
            left: left.boxed(),
            right: right.boxed(),
        })
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: left.boxed(),
                right: right.boxed(),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: left.boxed(),
                right: right.boxed(),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        if matches!(self.current_token(), Token::Minus) {
            self.consume();
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Neg(operand.boxed()));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> FormulaResult<Expr> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;

        loop {
            if !matches!(
                self.current_token(),
                Token::Field(_) | Token::Dot | Token::LeftBracket | Token::Question
            ) {
                break;
            }
            self.descend()?;
            match self.current_token().clone() {
                Token::Field(name) => {
                    self.consume();
                    expr = Expr::Field {
                        target: expr.boxed(),
                        name,
                    };
                }
                Token::Dot => match self.peek_token(1).clone() {
                    Token::LeftBracket => {
                        self.consume();
                        expr = self.parse_bracket_suffix(expr)?;
                    }
                    token @ Token::Str(_) => {
                        self.consume();
                        let name = self.string_field_name(&token)?;
                        self.consume();
                        expr = Expr::Field {
                            target: expr.boxed(),
                            name,
                        };
                    }
                    _ => return Err(self.unexpected()),
                },
                Token::LeftBracket => {
                    expr = self.parse_bracket_suffix(expr)?;
                }
                Token::Question => {
                    self.consume();
                    expr = Expr::Try {
                        body: expr.boxed(),
                        handler: None,
                    };
                }
                _ => break,
            }
        }

        self.depth = depth;
        Ok(expr)
    }

    fn string_field_name(&self, token: &Token) -> FormulaResult<String> {
        token.plain_string().ok_or_else(|| {
            FormulaError::syntax("interpolated field names are not supported", self.offset())
        })
    }

    /// `[]`, `[e]`, `[e:]`, `[:e]`, `[e:e]` applied to `target`
    fn parse_bracket_suffix(&mut self, target: Expr) -> FormulaResult<Expr> {
        self.expect(&Token::LeftBracket)?;

        if matches!(self.current_token(), Token::RightBracket) {
            self.consume();
            return Ok(Expr::Iterate(target.boxed()));
        }

        if matches!(self.current_token(), Token::Colon) {
            self.consume();
            let to = self.parse_pipe()?;
            self.expect(&Token::RightBracket)?;
            return Ok(Expr::Slice {
                target: target.boxed(),
                from: None,
                to: Some(to.boxed()),
            });
        }

        let key = self.parse_pipe()?;

        if matches!(self.current_token(), Token::Colon) {
            self.consume();
            let to = if matches!(self.current_token(), Token::RightBracket) {
                None
            } else {
                Some(self.parse_pipe()?.boxed())
            };
            self.expect(&Token::RightBracket)?;
            return Ok(Expr::Slice {
                target: target.boxed(),
                from: Some(key.boxed()),
                to,
            });
        }

        self.expect(&Token::RightBracket)?;
        Ok(Expr::Index {
            target: target.boxed(),
            key: key.boxed(),
        })
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.current_token().clone() {
            Token::Dot => {
                self.consume();
                if let token @ Token::Str(_) = self.current_token().clone() {
                    let name = self.string_field_name(&token)?;
                    self.consume();
                    return Ok(Expr::field(name));
                }
                Ok(Expr::Identity)
            }

            Token::DotDot => {
                self.consume();
                Ok(Expr::RecurseAll)
            }

            Token::Field(name) => {
                self.consume();
                Ok(Expr::field(name))
            }

            Token::Number(n) => {
                self.consume();
                Ok(Expr::Literal(FormulaValue::Number(n)))
            }

            Token::Str(parts) => {
                self.consume();
                self.string_expr(parts)
            }

            Token::Variable(name) => {
                self.consume();
                Ok(Expr::Variable(name))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_pipe()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBracket => {
                self.consume();
                if matches!(self.current_token(), Token::RightBracket) {
                    self.consume();
                    return Ok(Expr::Array(None));
                }
                let inner = self.parse_pipe()?;
                self.expect(&Token::RightBracket)?;
                Ok(Expr::Array(Some(inner.boxed())))
            }

            Token::LeftBrace => self.parse_object(),

            Token::Ident(word) => match word.as_str() {
                "true" => {
                    self.consume();
                    Ok(Expr::Literal(FormulaValue::Boolean(true)))
                }
                "false" => {
                    self.consume();
                    Ok(Expr::Literal(FormulaValue::Boolean(false)))
                }
                "null" => {
                    self.consume();
                    Ok(Expr::Literal(FormulaValue::Null))
                }
                "if" => self.parse_if(),
                "try" => self.parse_try(),
                "reduce" => self.parse_reduce(),
                "def" => {
                    let def = self.parse_definition()?;
                    let body = self.parse_pipe()?;
                    Ok(Expr::Define {
                        def: Box::new(def),
                        body: body.boxed(),
                    })
                }
                w if is_keyword(w) => Err(self.unexpected()),
                _ => {
                    self.consume();
                    self.parse_call(word)
                }
            },

            _ => Err(self.unexpected()),
        }
    }

    fn string_expr(&self, parts: Vec<StrPart>) -> FormulaResult<Expr> {
        if let [StrPart::Literal(text)] = parts.as_slice() {
            return Ok(Expr::Literal(FormulaValue::String(text.clone())));
        }

        let mut template = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                StrPart::Literal(text) => template.push(TemplatePart::Literal(text)),
                StrPart::Interpolation { source, offset } => {
                    template.push(TemplatePart::Expr(parse_fragment(&source, offset, self.depth)?))
                }
            }
        }
        Ok(Expr::Template(template))
    }

    fn parse_call(&mut self, name: String) -> FormulaResult<Expr> {
        let mut args = Vec::new();

        if matches!(self.current_token(), Token::LeftParen) {
            self.consume();
            loop {
                args.push(self.parse_pipe()?);
                match self.current_token() {
                    Token::Semicolon => {
                        self.consume();
                    }
                    Token::RightParen => {
                        self.consume();
                        break;
                    }
                    _ => return Err(self.unexpected()),
                }
            }
        }

        Ok(Expr::Call { name, args })
    }

    fn parse_if(&mut self) -> FormulaResult<Expr> {
        self.expect_keyword("if")?;
        self.parse_if_tail()
    }

    /// Everything after `if` / `elif`
    fn parse_if_tail(&mut self) -> FormulaResult<Expr> {
        let condition = self.parse_pipe()?;
        self.expect_keyword("then")?;
        let then = self.parse_pipe()?;

        let otherwise = if self.at_keyword("elif") {
            self.consume();
            Some(self.nested(Self::parse_if_tail)?.boxed())
        } else if self.at_keyword("else") {
            self.consume();
            let otherwise = self.parse_pipe()?;
            self.expect_keyword("end")?;
            Some(otherwise.boxed())
        } else {
            self.expect_keyword("end")?;
            None
        };

        Ok(Expr::If {
            condition: condition.boxed(),
            then: then.boxed(),
            otherwise,
        })
    }

    fn parse_try(&mut self) -> FormulaResult<Expr> {
        self.expect_keyword("try")?;
        let body = self.nested(Self::parse_postfix)?;
        let handler = if self.at_keyword("catch") {
            self.consume();
            Some(self.nested(Self::parse_postfix)?.boxed())
        } else {
            None
        };
        Ok(Expr::Try {
            body: body.boxed(),
            handler,
        })
    }

    fn parse_reduce(&mut self) -> FormulaResult<Expr> {
        self.expect_keyword("reduce")?;
        let source = self.nested(Self::parse_postfix)?;
        self.expect_keyword("as")?;
        let var = self.expect_variable()?;
        self.expect(&Token::LeftParen)?;
        let init = self.parse_pipe()?;
        self.expect(&Token::Semicolon)?;
        let update = self.parse_pipe()?;
        self.expect(&Token::RightParen)?;
        Ok(Expr::Reduce {
            source: source.boxed(),
            var,
            init: init.boxed(),
            update: update.boxed(),
        })
    }

    fn parse_object(&mut self) -> FormulaResult<Expr> {
        self.expect(&Token::LeftBrace)?;
        let mut entries = Vec::new();

        if matches!(self.current_token(), Token::RightBrace) {
            self.consume();
            return Ok(Expr::Object(entries));
        }

        loop {
            entries.push(self.parse_object_entry()?);
            match self.current_token() {
                Token::Comma => {
                    self.consume();
                }
                Token::RightBrace => {
                    self.consume();
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }

        Ok(Expr::Object(entries))
    }

    fn parse_object_entry(&mut self) -> FormulaResult<(ObjectKey, Expr)> {
        let key = match self.consume() {
            Token::Ident(name) => ObjectKey::Name(name),
            Token::Variable(name) => {
                // `{$v}` is shorthand for `{v: $v}`
                return Ok((ObjectKey::Name(name.clone()), Expr::Variable(name)));
            }
            token @ Token::Str(_) => match token.plain_string() {
                Some(name) => ObjectKey::Name(name),
                None => match token {
                    Token::Str(parts) => ObjectKey::Expr(self.string_expr(parts)?),
                    _ => return Err(self.unexpected()),
                },
            },
            Token::LeftParen => {
                let key = self.parse_pipe()?;
                self.expect(&Token::RightParen)?;
                ObjectKey::Expr(key)
            }
            other => {
                return Err(FormulaError::syntax(
                    format!("invalid object key {:?}", other),
                    self.offset(),
                ))
            }
        };

        if matches!(self.current_token(), Token::Colon) {
            self.consume();
            let value = self.nested(Self::parse_object_value)?;
            return Ok((key, value));
        }

        // `{a}` and `{"a b"}` are shorthand for `{a: .a}`
        match key {
            ObjectKey::Name(name) => {
                let value = Expr::field(name.clone());
                Ok((ObjectKey::Name(name), value))
            }
            ObjectKey::Expr(_) => Err(self.unexpected()),
        }
    }

    /// Object values cannot contain a bare `,`
    fn parse_object_value(&mut self) -> FormulaResult<Expr> {
        let left = self.parse_alternative()?;
        if matches!(self.current_token(), Token::Pipe) {
            self.consume();
            let right = self.nested(Self::parse_object_value)?;
            return Ok(Expr::Pipe(left.boxed(), right.boxed()));
        }
        Ok(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Expr {
        Expr::Literal(FormulaValue::Number(n))
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(parse_formula(".").unwrap(), Expr::Identity);
        assert_eq!(parse_formula(".price").unwrap(), Expr::field("price"));
        assert_eq!(parse_formula(r#"."unit price""#).unwrap(), Expr::field("unit price"));
        assert_eq!(
            parse_formula(r#".["unit price"]"#).unwrap(),
            Expr::Index {
                target: Expr::Identity.boxed(),
                key: Expr::Literal(FormulaValue::from("unit price")).boxed(),
            }
        );
        assert_eq!(
            parse_formula(".a.b").unwrap(),
            Expr::Field {
                target: Expr::field("a").boxed(),
                name: "b".into(),
            }
        );
        assert_eq!(
            parse_formula(".items[]").unwrap(),
            Expr::Iterate(Expr::field("items").boxed())
        );
        assert_eq!(
            parse_formula(".a?").unwrap(),
            Expr::Try {
                body: Expr::field("a").boxed(),
                handler: None,
            }
        );
    }

    #[test]
    fn test_parse_slice() {
        assert_eq!(
            parse_formula(".[1:]").unwrap(),
            Expr::Slice {
                target: Expr::Identity.boxed(),
                from: Some(num(1.0).boxed()),
                to: None,
            }
        );
        assert_eq!(
            parse_formula(".[:2]").unwrap(),
            Expr::Slice {
                target: Expr::Identity.boxed(),
                from: None,
                to: Some(num(2.0).boxed()),
            }
        );
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        // 1 + (2 * 3)
        let ast = parse_formula("1 + 2 * 3").unwrap();
        assert_eq!(
            ast,
            Expr::Binary {
                op: BinaryOperator::Add,
                left: num(1.0).boxed(),
                right: Expr::Binary {
                    op: BinaryOperator::Multiply,
                    left: num(2.0).boxed(),
                    right: num(3.0).boxed(),
                }
                .boxed(),
            }
        );
    }

    #[test]
    fn test_parse_pipe_is_lowest() {
        let ast = parse_formula(".a, .b | length").unwrap();
        assert!(matches!(ast, Expr::Pipe(ref left, _) if matches!(**left, Expr::Comma(_, _))));
    }

    #[test]
    fn test_parse_comparison_does_not_chain() {
        assert!(parse_formula("1 < 2 < 3").is_err());
        assert!(parse_formula("1 < 2 and 2 < 3").is_ok());
    }

    #[test]
    fn test_parse_alternative_right_assoc() {
        let ast = parse_formula(".a // .b // 0").unwrap();
        match ast {
            Expr::Alternative(left, right) => {
                assert_eq!(*left, Expr::field("a"));
                assert!(matches!(*right, Expr::Alternative(_, _)));
            }
            other => panic!("Expected Alternative, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_elif() {
        let ast = parse_formula(r#"if . > 10 then "a" elif . > 5 then "b" end"#).unwrap();
        match ast {
            Expr::If { otherwise, .. } => {
                let nested = otherwise.expect("elif branch");
                assert!(matches!(*nested, Expr::If { otherwise: None, .. }));
            }
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_definitions() {
        let ast = parse_formula("def inc($x; f): $x + f; inc(1; 2)").unwrap();
        match ast {
            Expr::Define { def, body } => {
                assert_eq!(def.name, "inc");
                assert_eq!(
                    def.params,
                    vec![Param::Value("x".into()), Param::Filter("f".into())]
                );
                assert_eq!(
                    *body,
                    Expr::Call {
                        name: "inc".into(),
                        args: vec![num(1.0), num(2.0)],
                    }
                );
            }
            other => panic!("Expected Define, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_binding() {
        let ast = parse_formula(". as $x | $x").unwrap();
        assert_eq!(
            ast,
            Expr::Bind {
                source: Expr::Identity.boxed(),
                var: "x".into(),
                body: Expr::Variable("x".into()).boxed(),
            }
        );
    }

    #[test]
    fn test_parse_reduce() {
        let ast = parse_formula("reduce .[] as $n (0; . + $n)").unwrap();
        assert!(matches!(ast, Expr::Reduce { ref var, .. } if var == "n"));
    }

    #[test]
    fn test_parse_object() {
        let ast = parse_formula(r#"{a: 1, "b c": .x | length, $v, name, (.k): 2}"#).unwrap();
        match ast {
            Expr::Object(entries) => {
                assert_eq!(entries.len(), 5);
                assert_eq!(entries[0], (ObjectKey::Name("a".into()), num(1.0)));
                assert!(matches!(entries[1].1, Expr::Pipe(_, _)));
                assert_eq!(
                    entries[2],
                    (ObjectKey::Name("v".into()), Expr::Variable("v".into()))
                );
                assert_eq!(
                    entries[3],
                    (ObjectKey::Name("name".into()), Expr::field("name"))
                );
                assert!(matches!(entries[4].0, ObjectKey::Expr(_)));
            }
            other => panic!("Expected Object, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_interpolation() {
        let ast = parse_formula(r#""total: \(.a + 1)!""#).unwrap();
        match ast {
            Expr::Template(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], TemplatePart::Literal("total: ".into()));
                assert!(matches!(parts[1], TemplatePart::Expr(Expr::Binary { .. })));
            }
            other => panic!("Expected Template, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_offsets() {
        match parse_formula(".a + ") {
            Err(FormulaError::Syntax { offset, .. }) => assert_eq!(offset, 5),
            other => panic!("Expected syntax error, got {:?}", other),
        }
        match parse_formula(r#""x \(.a +)""#) {
            Err(FormulaError::Syntax { offset, .. }) => assert_eq!(offset, 9),
            other => panic!("Expected syntax error, got {:?}", other),
        }
        assert!(parse_formula("if . then 1").is_err());
        assert!(parse_formula("then").is_err());
        assert!(parse_formula("(1").is_err());
    }

    fn is_syntax_error(formula: &str) -> bool {
        matches!(parse_formula(formula), Err(FormulaError::Syntax { .. }))
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |open: &str, close: &str, n: usize| {
            format!("{}1{}", open.repeat(n), close.repeat(n))
        };

        assert!(parse_formula(&nested("[", "]", 50)).is_ok());
        assert!(parse_formula(&nested("(", ")", 50)).is_ok());

        assert!(is_syntax_error(&nested("[", "]", 20000)));
        assert!(is_syntax_error(&nested("(", ")", 20000)));
        assert!(is_syntax_error(&nested("{a: ", "}", 20000)));
        assert!(is_syntax_error(&nested("-", "", 20000)));
        assert!(is_syntax_error(&nested("try ", "", 20000)));
        assert!(is_syntax_error(&nested(r#""\("#, r#")""#, 20000)));
        assert!(is_syntax_error(&vec!["1"; 20000].join(" + ")));
        assert!(is_syntax_error(&vec!["."; 20000].join(" | ")));
        assert!(is_syntax_error(&format!(".a{}", "[0]".repeat(20000))));

        let err = parse_formula(&nested("[", "]", 200)).unwrap_err();
        let expected = format!("formula nested more than {} levels deep", MAX_NESTING_DEPTH);
        assert!(err.to_string().starts_with(&format!("syntax error: {}", expected)));
    }
}
