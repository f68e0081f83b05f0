//! Formula tokenizer
//!
//! Tokens carry their byte offset so that callers outside the parser (column
//! reference discovery, reserved-symbol detection) can work on the token
//! stream instead of raw text. Text inside string literals therefore never
//! looks like an identifier or a field access.

use crate::error::{FormulaError, FormulaResult};

/// Deepest nesting the lexer and parser accept, counting brackets, operator
/// chains and strings inside interpolations
pub const MAX_NESTING_DEPTH: usize = 128;

/// Words that cannot be used as function names
const KEYWORDS: &[&str] = &[
    "and", "or", "if", "then", "elif", "else", "end", "as", "def", "reduce", "foreach", "try",
    "catch", "label", "import", "include", "__loc__",
];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `.` not directly followed by a name
    Dot,
    /// `..`
    DotDot,
    /// `.name`
    Field(String),
    /// Bare identifier or keyword
    Ident(String),
    /// `$name`
    Variable(String),
    Number(f64),
    /// String literal, split at `\(...)` interpolations
    Str(Vec<StrPart>),

    Pipe,
    Comma,
    Colon,
    Semicolon,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Alternative,
    Assign,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    Eof,
}

/// A fragment of a string literal
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Literal(String),
    /// Source text of an interpolated expression and its byte offset
    Interpolation { source: String, offset: usize },
}

impl Token {
    /// The literal text of a string token without interpolations
    pub fn plain_string(&self) -> Option<String> {
        match self {
            Token::Str(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        StrPart::Literal(s) => text.push_str(s),
                        StrPart::Interpolation { .. } => return None,
                    }
                }
                Some(text)
            }
            _ => None,
        }
    }

    /// Whether this token can end a term, so that a following `.name` is
    /// applied to that term rather than to the input
    pub fn ends_term(&self) -> bool {
        if let Token::Ident(word) = self {
            return word == "end" || !is_keyword(word);
        }
        matches!(
            self,
            Token::Dot
                | Token::DotDot
                | Token::Field(_)
                | Token::Variable(_)
                | Token::Number(_)
                | Token::Str(_)
                | Token::Question
                | Token::RightParen
                | Token::RightBracket
                | Token::RightBrace
        )
    }
}

/// A token with the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Tokenize a whole formula. The result always ends with [`Token::Eof`].
pub fn tokenize(source: &str) -> FormulaResult<Vec<Spanned>> {
    tokenize_at(source, 0)
}

/// Tokenize a fragment that starts at `base` inside a larger formula
pub(crate) fn tokenize_at(source: &str, base: usize) -> FormulaResult<Vec<Spanned>> {
    let mut lexer = Lexer::with_base(source, base);
    let mut tokens = Vec::new();
    loop {
        let spanned = lexer.next_token()?;
        let done = spanned.token == Token::Eof;
        tokens.push(spanned);
        if done {
            return Ok(tokens);
        }
    }
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Offset of `input` inside the top-level formula, for interpolations
    base: usize,
    /// String literals currently open through interpolations
    strings: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn with_base(input: &'a str, base: usize) -> Self {
        Self {
            input,
            pos: 0,
            base,
            strings: 0,
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>, at: usize) -> FormulaError {
        FormulaError::syntax(message, self.base + at)
    }

    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_ident_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    fn scan_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek_char().map_or(false, Self::is_ident_char) {
            self.advance();
        }
        // Module-qualified names such as `a::b`
        while self.peek_char() == Some(':')
            && self.peek_char_at(1) == Some(':')
            && self.peek_char_at(2).map_or(false, Self::is_ident_start)
        {
            self.advance();
            self.advance();
            while self.peek_char().map_or(false, Self::is_ident_char) {
                self.advance();
            }
        }
        self.input[start..self.pos].to_string()
    }

    // === Token scanning ===

    pub(crate) fn next_token(&mut self) -> FormulaResult<Spanned> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let token = self.scan_token()?;
        Ok(Spanned {
            token,
            offset: self.base + start,
        })
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };
        let start = self.pos;

        let single = match c {
            '|' => Some(Token::Pipe),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            ';' => Some(Token::Semicolon),
            '?' => Some(Token::Question),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '%' => Some(Token::Percent),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match c {
            '/' => {
                self.advance();
                if self.peek_char() == Some('/') {
                    self.advance();
                    return Ok(Token::Alternative);
                }
                Ok(Token::Slash)
            }
            '=' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::Equal);
                }
                Ok(Token::Assign)
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::NotEqual);
                }
                Err(self.error("unexpected '!'", start))
            }
            '<' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::LessEqual);
                }
                Ok(Token::LessThan)
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::GreaterEqual);
                }
                Ok(Token::GreaterThan)
            }
            '"' => self.scan_string(),
            '$' => {
                self.advance();
                if !self.peek_char().map_or(false, Self::is_ident_start) {
                    return Err(self.error("expected variable name after '$'", start));
                }
                Ok(Token::Variable(self.scan_ident()))
            }
            '.' => {
                if self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()) {
                    return self.scan_number();
                }
                self.advance();
                match self.peek_char() {
                    Some('.') => {
                        self.advance();
                        Ok(Token::DotDot)
                    }
                    Some(c) if Self::is_ident_start(c) => Ok(Token::Field(self.scan_ident())),
                    _ => Ok(Token::Dot),
                }
            }
            c if c.is_ascii_digit() => self.scan_number(),
            c if Self::is_ident_start(c) => Ok(Token::Ident(self.scan_ident())),
            other => Err(self.error(format!("unexpected character '{}'", other), start)),
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let save = self.pos;
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            if !self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.pos = save;
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text), start))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        if self.strings >= MAX_NESTING_DEPTH {
            return Err(self.error("strings nested too deeply", self.pos));
        }
        self.strings += 1;
        let token = self.scan_string_parts();
        self.strings -= 1;
        token
    }

    fn scan_string_parts(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut parts = Vec::new();
        let mut literal = String::new();

        loop {
            let c = self
                .advance()
                .ok_or_else(|| self.error("unterminated string literal", start))?;
            match c {
                '"' => break,
                '\\' => {
                    let escape_at = self.pos - 1;
                    let e = self
                        .advance()
                        .ok_or_else(|| self.error("unterminated string literal", start))?;
                    match e {
                        '"' => literal.push('"'),
                        '\\' => literal.push('\\'),
                        '/' => literal.push('/'),
                        'b' => literal.push('\u{8}'),
                        'f' => literal.push('\u{c}'),
                        'n' => literal.push('\n'),
                        'r' => literal.push('\r'),
                        't' => literal.push('\t'),
                        'u' => literal.push(self.scan_unicode_escape(escape_at)?),
                        '(' => {
                            if !literal.is_empty() {
                                parts.push(StrPart::Literal(std::mem::take(&mut literal)));
                            }
                            let inner_start = self.pos;
                            let inner_end = self.skip_interpolation(escape_at)?;
                            parts.push(StrPart::Interpolation {
                                source: self.input[inner_start..inner_end].to_string(),
                                offset: self.base + inner_start,
                            });
                        }
                        other => {
                            return Err(
                                self.error(format!("invalid escape '\\{}'", other), escape_at)
                            )
                        }
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() || parts.is_empty() {
            parts.push(StrPart::Literal(literal));
        }
        Ok(Token::Str(parts))
    }

    fn scan_unicode_escape(&mut self, escape_at: usize) -> FormulaResult<char> {
        let high = self.scan_hex4(escape_at)?;
        if (0xD800..0xDC00).contains(&high) {
            // Surrogate pair
            if self.peek_char() == Some('\\') && self.peek_char_at(1) == Some('u') {
                self.advance();
                self.advance();
                let low = self.scan_hex4(escape_at)?;
                let code = 0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
                return char::from_u32(code)
                    .ok_or_else(|| self.error("invalid unicode escape", escape_at));
            }
            return Ok('\u{FFFD}');
        }
        char::from_u32(high).ok_or_else(|| self.error("invalid unicode escape", escape_at))
    }

    fn scan_hex4(&mut self, escape_at: usize) -> FormulaResult<u32> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .advance()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid unicode escape", escape_at))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    /// Skip the body of `\(...)`, returning the offset of its closing paren.
    /// Nested strings and parentheses are tokenized so they balance correctly.
    fn skip_interpolation(&mut self, escape_at: usize) -> FormulaResult<usize> {
        let mut depth = 1usize;
        loop {
            self.skip_whitespace_and_comments();
            let at = self.pos;
            match self.scan_token()? {
                Token::LeftParen => depth += 1,
                Token::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(at);
                    }
                }
                Token::Eof => return Err(self.error("unterminated interpolation", escape_at)),
                _ => {}
            }
        }
    }
}
