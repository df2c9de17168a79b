//! Textual notation for raw specifications and values.
//!
//! ```text
//! [Integer, {b: Float}] => Any        positional + keyword arguments
//! {a: :to_i} => nil                   keyword-only, returns nothing
//! [/^\d+$/, 1..10, [String, true]]    pattern, interval, tuple, truthy
//! ```
//!
//! Capitalized identifiers name scopes and are resolved by the caller. At
//! the top level `A => B` is shorthand for the one-entry map `{A => B}`.
//! Values use the same literals: `1`, `2.5`, `"x"`, `:sym`, `[1, 2]`,
//! `{a: 1}`, `nil`, `true`, `false`, and scope names.

use callguard_core::{ScopeId, Symbol, Value};

use crate::behavior::{Interval, Pattern, TypeRef};
use crate::runtime::Runtime;
use crate::signature::{RawKey, RawTerm, MAX_NESTING};

/// Syntax error at a byte offset of the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notation error at offset {offset}: {message}")]
pub struct NotationError {
    pub offset: usize,
    pub message: String,
}

impl NotationError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        NotationError {
            offset,
            message: message.into(),
        }
    }
}

/// Parses a raw specification (or a single behavior).
pub fn parse_spec(
    source: &str,
    resolve: impl Fn(&str) -> Option<ScopeId>,
) -> Result<RawTerm, NotationError> {
    let mut parser = Parser::new(source, &resolve)?;
    let lhs = parser.term()?;
    let term = if parser.eat(&Tok::Arrow) {
        RawTerm::spec(lhs, parser.term()?)
    } else {
        lhs
    };
    parser.finish()?;
    Ok(term)
}

/// Parses a value literal.
pub fn parse_value(
    source: &str,
    resolve: impl Fn(&str) -> Option<ScopeId>,
) -> Result<Value, NotationError> {
    let mut parser = Parser::new(source, &resolve)?;
    let value = parser.value()?;
    parser.finish()?;
    Ok(value)
}

impl Runtime {
    /// [`parse_spec`] with scope names resolved against this runtime.
    pub fn parse_spec(&self, source: &str) -> Result<RawTerm, NotationError> {
        parse_spec(source, |name| self.scope_named(name))
    }

    /// [`parse_value`] with scope names resolved against this runtime.
    pub fn parse_value(&self, source: &str) -> Result<Value, NotationError> {
        parse_value(source, |name| self.scope_named(name))
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Arrow,
    /// `..`
    Range,
    /// `...`
    RangeExclusive,
    Ident(String),
    /// `name:` map key.
    Label(String),
    /// `:name`
    Symbol(String),
    Int(i64),
    Float(f64),
    Str(String),
    Regex(String),
    End,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::LBracket => "'['".into(),
            Tok::RBracket => "']'".into(),
            Tok::LBrace => "'{'".into(),
            Tok::RBrace => "'}'".into(),
            Tok::Comma => "','".into(),
            Tok::Arrow => "'=>'".into(),
            Tok::Range => "'..'".into(),
            Tok::RangeExclusive => "'...'".into(),
            Tok::Ident(s) => format!("identifier '{}'", s),
            Tok::Label(s) => format!("label '{}:'", s),
            Tok::Symbol(s) => format!("symbol ':{}'", s),
            Tok::Int(i) => format!("integer {}", i),
            Tok::Float(x) => format!("float {}", x),
            Tok::Str(s) => format!("string {:?}", s),
            Tok::Regex(s) => format!("regexp /{}/", s),
            Tok::End => "end of input".into(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Tok)>, NotationError> {
        let mut tokens = Vec::new();
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push((start, Tok::End));
                return Ok(tokens);
            };
            let tok = match c {
                '[' => self.single(Tok::LBracket),
                ']' => self.single(Tok::RBracket),
                '{' => self.single(Tok::LBrace),
                '}' => self.single(Tok::RBrace),
                ',' => self.single(Tok::Comma),
                '=' if self.peek_at(1) == Some('>') => {
                    self.pos += 2;
                    Tok::Arrow
                }
                '.' if self.peek_at(1) == Some('.') => {
                    self.pos += 2;
                    if self.peek() == Some('.') {
                        self.pos += 1;
                        Tok::RangeExclusive
                    } else {
                        Tok::Range
                    }
                }
                ':' => {
                    self.bump();
                    let name = self.method_name();
                    if name.is_empty() {
                        return Err(NotationError::new(start, "expected a symbol name after ':'"));
                    }
                    Tok::Symbol(name)
                }
                '"' => Tok::Str(self.string(start)?),
                '/' => Tok::Regex(self.regex(start)?),
                c if c.is_ascii_digit() || (c == '-' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) => {
                    self.number(start)?
                }
                c if is_ident_start(c) => {
                    let name = self.method_name();
                    if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
                        self.bump();
                        Tok::Label(name)
                    } else {
                        Tok::Ident(name)
                    }
                }
                other => {
                    return Err(NotationError::new(start, format!("unexpected character '{}'", other)));
                }
            };
            tokens.push((start, tok));
        }
    }

    fn single(&mut self, tok: Tok) -> Tok {
        self.bump();
        tok
    }

    /// Identifier, optionally ending in `?`, `!` or `=`.
    fn method_name(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        if self.pos > start && matches!(self.peek(), Some('?' | '!')) {
            self.bump();
        } else if self.pos > start && self.peek() == Some('=') && self.peek_at(1) != Some('>') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn number(&mut self, start: usize) -> Result<Tok, NotationError> {
        if self.peek() == Some('-') {
            self.bump();
        }
        self.digits();
        // A '.' followed by a digit is a fraction; `1..` is a range.
        let is_float = self.peek() == Some('.') && self.peek_at(1).is_some_and(|d| d.is_ascii_digit());
        if is_float {
            self.bump();
            self.digits();
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|e| NotationError::new(start, format!("invalid float: {}", e)))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|e| NotationError::new(start, format!("invalid integer: {}", e)))
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn string(&mut self, start: usize) -> Result<String, NotationError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(NotationError::new(start, "unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('"' | '\\')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(NotationError::new(start, "unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Regex source between slashes; `\/` is an escaped slash, other escapes
    /// are kept for the regex engine.
    fn regex(&mut self, start: usize) -> Result<String, NotationError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(NotationError::new(start, "unterminated regexp")),
                Some('/') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('/') => out.push('/'),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(NotationError::new(start, "unterminated regexp")),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'r> {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    /// Open brackets and braces around the current position.
    depth: usize,
    resolve: &'r dyn Fn(&str) -> Option<ScopeId>,
}

impl<'r> Parser<'r> {
    fn new(source: &str, resolve: &'r dyn Fn(&str) -> Option<ScopeId>) -> Result<Self, NotationError> {
        let tokens = Lexer { src: source, pos: 0 }.tokenize()?;
        Ok(Parser {
            tokens,
            pos: 0,
            depth: 0,
            resolve,
        })
    }

    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).map(|(_, t)| t).unwrap_or(&Tok::End)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(o, _)| *o)
            .unwrap_or(0)
    }

    fn next(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), NotationError> {
        if self.eat(tok) {
            return Ok(());
        }
        Err(self.unexpected(&format!("expected {}", tok.describe())))
    }

    fn unexpected(&self, context: &str) -> NotationError {
        NotationError::new(self.offset(), format!("{}, found {}", context, self.peek().describe()))
    }

    fn finish(&mut self) -> Result<(), NotationError> {
        match self.peek() {
            Tok::End => Ok(()),
            _ => Err(self.unexpected("expected end of input")),
        }
    }

    fn scope(&self, name: &str, offset: usize) -> Result<ScopeId, NotationError> {
        (self.resolve)(name)
            .ok_or_else(|| NotationError::new(offset, format!("uninitialized constant {}", name)))
    }

    /// Comma-separated items up to `close`; a trailing comma is allowed.
    /// `offset` is where the opening bracket was.
    fn sequence<T>(
        &mut self,
        offset: usize,
        close: &Tok,
        mut item: impl FnMut(&mut Self) -> Result<T, NotationError>,
    ) -> Result<Vec<T>, NotationError> {
        if self.depth >= MAX_NESTING {
            return Err(NotationError::new(offset, "nesting too deep"));
        }
        self.depth += 1;
        let mut items = Vec::new();
        let result = loop {
            if self.eat(close) {
                break Ok(());
            }
            match item(self) {
                Ok(value) => items.push(value),
                Err(e) => break Err(e),
            }
            if !self.eat(&Tok::Comma) {
                break self.expect(close);
            }
        };
        self.depth -= 1;
        result.map(|()| items)
    }

    // -- specifications --

    fn term(&mut self) -> Result<RawTerm, NotationError> {
        let offset = self.offset();
        match self.next() {
            Tok::LBracket => Ok(RawTerm::List(self.sequence(offset, &Tok::RBracket, Self::term)?)),
            Tok::LBrace => Ok(RawTerm::Map(self.sequence(offset, &Tok::RBrace, Self::map_entry)?)),
            Tok::Symbol(name) => Ok(RawTerm::Symbol(Symbol::from(name))),
            Tok::Regex(source) => Pattern::new(&source)
                .map(RawTerm::Regex)
                .map_err(|e| NotationError::new(offset, format!("invalid regexp: {}", e))),
            Tok::Range => Ok(RawTerm::Range(self.beginless(false)?)),
            Tok::RangeExclusive => Ok(RawTerm::Range(self.beginless(true)?)),
            Tok::Int(i) => self.maybe_range(Value::Int(i), RawTerm::Int(i)),
            Tok::Float(x) => self.maybe_range(Value::Float(x), RawTerm::Float(x)),
            Tok::Str(s) => self.maybe_range(Value::Str(s.clone()), RawTerm::Text(s)),
            Tok::Ident(name) => match name.as_str() {
                "Any" => Ok(RawTerm::Any),
                "nil" => Ok(RawTerm::Nil),
                "true" => Ok(RawTerm::Bool(true)),
                "false" => Ok(RawTerm::Bool(false)),
                n if n.starts_with(|c: char| c.is_ascii_uppercase()) => {
                    let id = self.scope(n, offset)?;
                    Ok(RawTerm::Scope(TypeRef::new(id, n)))
                }
                n => Err(NotationError::new(offset, format!("undefined name '{}'", n))),
            },
            other => Err(NotationError::new(
                offset,
                format!("expected a term, found {}", other.describe()),
            )),
        }
    }

    fn map_entry(&mut self) -> Result<(RawKey, RawTerm), NotationError> {
        if let Tok::Label(name) = self.peek().clone() {
            self.pos += 1;
            return Ok((RawKey::Symbol(Symbol::from(name)), self.term()?));
        }
        let key = match self.term()? {
            RawTerm::Symbol(s) => RawKey::Symbol(s),
            RawTerm::Text(t) => RawKey::Text(t),
            other => RawKey::Term(other),
        };
        self.expect(&Tok::Arrow)?;
        Ok((key, self.term()?))
    }

    /// After a literal: `a..b`, `a...b`, `a..` or just the literal.
    fn maybe_range(&mut self, start: Value, literal: RawTerm) -> Result<RawTerm, NotationError> {
        let exclusive_end = match self.peek() {
            Tok::Range => false,
            Tok::RangeExclusive => true,
            _ => return Ok(literal),
        };
        self.pos += 1;
        let end = self.range_bound();
        Ok(RawTerm::Range(Interval {
            start: Some(start),
            exclusive_end: exclusive_end && end.is_some(),
            end,
        }))
    }

    fn beginless(&mut self, exclusive_end: bool) -> Result<Interval, NotationError> {
        match self.range_bound() {
            Some(end) => Ok(Interval {
                start: None,
                end: Some(end),
                exclusive_end,
            }),
            None => Err(self.unexpected("expected a range end")),
        }
    }

    fn range_bound(&mut self) -> Option<Value> {
        let bound = match self.peek() {
            Tok::Int(i) => Value::Int(*i),
            Tok::Float(x) => Value::Float(*x),
            Tok::Str(s) => Value::Str(s.clone()),
            _ => return None,
        };
        self.pos += 1;
        Some(bound)
    }

    // -- values --

    fn value(&mut self) -> Result<Value, NotationError> {
        let offset = self.offset();
        match self.next() {
            Tok::Int(i) => Ok(Value::Int(i)),
            Tok::Float(x) => Ok(Value::Float(x)),
            Tok::Str(s) => Ok(Value::Str(s)),
            Tok::Symbol(name) => Ok(Value::Symbol(Symbol::from(name))),
            Tok::LBracket => Ok(Value::Array(self.sequence(offset, &Tok::RBracket, Self::value)?)),
            Tok::LBrace => Ok(Value::Hash(self.sequence(offset, &Tok::RBrace, Self::hash_pair)?)),
            Tok::Ident(name) => match name.as_str() {
                "nil" => Ok(Value::Nil),
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                n if n.starts_with(|c: char| c.is_ascii_uppercase()) => {
                    Ok(Value::Scope(self.scope(n, offset)?))
                }
                n => Err(NotationError::new(offset, format!("undefined name '{}'", n))),
            },
            other => Err(NotationError::new(
                offset,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }

    fn hash_pair(&mut self) -> Result<(Value, Value), NotationError> {
        if let Tok::Label(name) = self.peek().clone() {
            self.pos += 1;
            return Ok((Value::Symbol(Symbol::from(name)), self.value()?));
        }
        let key = self.value()?;
        self.expect(&Tok::Arrow)?;
        Ok((key, self.value()?))
    }
}
