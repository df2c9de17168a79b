//! Raw, not yet validated contract literals.
//!
//! A [`RawTerm`] is what a caller writes down: it may be malformed in any of
//! the ways the compiler rejects. The notation parser produces raw terms, and
//! programmatic callers build them directly (predicates only exist here).

use std::fmt;

use callguard_core::Symbol;

use crate::behavior::{Interval, Pattern, Predicate, TypeRef};

/// A loosely typed contract literal.
#[derive(Debug, Clone)]
pub enum RawTerm {
    Scope(TypeRef),
    Symbol(Symbol),
    Regex(Pattern),
    Range(Interval),
    List(Vec<RawTerm>),
    /// Ordered entries. Used both for keyword maps and for the top-level
    /// `arguments => return` entry.
    Map(Vec<(RawKey, RawTerm)>),
    Predicate(Predicate),
    Bool(bool),
    /// The "nothing" token.
    Nil,
    /// The "match anything" token.
    Any,
    Int(i64),
    Float(f64),
    Text(String),
}

/// Key of a [`RawTerm::Map`] entry.
#[derive(Debug, Clone)]
pub enum RawKey {
    Symbol(Symbol),
    Text(String),
    Term(RawTerm),
}

impl RawTerm {
    /// The one-entry map `arguments => returns`.
    pub fn spec(arguments: RawTerm, returns: RawTerm) -> RawTerm {
        RawTerm::Map(vec![(RawKey::Term(arguments), returns)])
    }

    /// A keyword map from `(name, term)` pairs.
    pub fn keywords<'a>(entries: impl IntoIterator<Item = (&'a str, RawTerm)>) -> RawTerm {
        RawTerm::Map(
            entries
                .into_iter()
                .map(|(name, term)| (RawKey::Symbol(Symbol::from(name)), term))
                .collect(),
        )
    }

    pub fn scope(type_ref: TypeRef) -> RawTerm {
        RawTerm::Scope(type_ref)
    }

    pub fn symbol(name: &str) -> RawTerm {
        RawTerm::Symbol(Symbol::from(name))
    }
}

impl fmt::Display for RawTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTerm::Scope(t) => f.write_str(&t.name),
            RawTerm::Symbol(s) => f.write_str(&s.inspect()),
            RawTerm::Regex(p) => write!(f, "/{}/", p.as_str()),
            RawTerm::Range(r) => write!(f, "{}", r),
            RawTerm::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            RawTerm::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, term)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match key {
                        RawKey::Symbol(s) => write!(f, "{}: {}", s, term)?,
                        RawKey::Text(t) => write!(f, "{:?} => {}", t, term)?,
                        RawKey::Term(k) => write!(f, "{} => {}", k, term)?,
                    }
                }
                f.write_str("}")
            }
            RawTerm::Predicate(p) => write!(f, "#<Proc {}>", p.label()),
            RawTerm::Bool(b) => write!(f, "{}", b),
            RawTerm::Nil => f.write_str("nil"),
            RawTerm::Any => f.write_str("Any"),
            RawTerm::Int(i) => write!(f, "{}", i),
            RawTerm::Float(x) => write!(f, "{:?}", x),
            RawTerm::Text(t) => write!(f, "{:?}", t),
        }
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawKey::Symbol(s) => f.write_str(&s.inspect()),
            RawKey::Text(t) => write!(f, "{:?}", t),
            RawKey::Term(term) => write!(f, "{}", term),
        }
    }
}
