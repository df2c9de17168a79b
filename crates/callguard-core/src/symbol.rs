//! Interned-by-value member and keyword identifiers.
//!
//! A [`Symbol`] names a member or a keyword parameter. It is deliberately a
//! separate type from `String` so that keyword slots are identified by
//! identifier, never by arbitrary text.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A symbolic identifier such as a member name (`sum`, `odd?`, `name=`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The setter counterpart of an attribute name: `name` -> `name=`.
    pub fn setter(&self) -> Symbol {
        Symbol(format!("{}=", self.0))
    }

    /// Literal form, e.g. `:odd?`.
    pub fn inspect(&self) -> String {
        format!(":{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol(name.to_string())
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Symbol(name)
    }
}

impl From<&Symbol> for Symbol {
    fn from(sym: &Symbol) -> Self {
        sym.clone()
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}
