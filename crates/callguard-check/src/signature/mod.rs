//! Compiled signatures and the errors raised while compiling them.
//!
//! A [`CompiledSignature`] is built once from a [`RawTerm`] by
//! [`compile`](compile::compile) and never mutated afterwards. Re-registering
//! a contract replaces the whole signature.

pub mod compile;
pub mod raw;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use callguard_core::Symbol;

use crate::behavior::BehaviorDescriptor;

pub use compile::{compile, compile_behavior, Side, MAX_NESTING};
pub use raw::{RawKey, RawTerm};

/// An argument or return slot of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    /// Zero-based positional index.
    Position(usize),
    Keyword(Symbol),
    Return,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Position(i) => write!(f, "{} argument", ordinal(i + 1)),
            Slot::Keyword(name) => write!(f, "'{}' keyword argument", name),
            Slot::Return => f.write_str("return"),
        }
    }
}

/// `1` -> `1st`, `12` -> `12th`, `22` -> `22nd`.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Malformed contract. Raised at registration time, never at call time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid type signature: expected a single `arguments => return` entry, got {found}")]
    InvalidForm { found: String },

    #[error("invalid type signature: arguments must be a list or keyword map, got {found}")]
    InvalidArgumentSide { found: String },

    #[error("invalid type signature: keyword map must be the last argument entry (found at {})", ordinal(*index + 1))]
    MisplacedKeywords { index: usize },

    #[error("invalid type signature: keyword {key} is not a symbol")]
    NonSymbolKeyword { key: String },

    #[error("invalid type signature: duplicate keyword '{name}'")]
    DuplicateKeyword { name: Symbol },

    #[error("invalid type signature: unknown type behavior {literal} for {slot}")]
    InvalidBehavior { literal: String, slot: Slot },

    #[error("invalid type signature: nil can only be used for return ({slot})")]
    AbsentInArguments { slot: Slot },

    #[error("invalid type signature: tuples nested deeper than {limit} levels for {slot}")]
    TooDeep { limit: usize, slot: Slot },
}

/// Validated, immutable contract for one member.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSignature {
    positional: Vec<BehaviorDescriptor>,
    keyword: IndexMap<Symbol, BehaviorDescriptor>,
    returns: BehaviorDescriptor,
}

impl CompiledSignature {
    pub(crate) fn new(
        positional: Vec<BehaviorDescriptor>,
        keyword: IndexMap<Symbol, BehaviorDescriptor>,
        returns: BehaviorDescriptor,
    ) -> Self {
        CompiledSignature {
            positional,
            keyword,
            returns,
        }
    }

    pub fn positional(&self) -> &[BehaviorDescriptor] {
        &self.positional
    }

    pub fn keyword(&self) -> &IndexMap<Symbol, BehaviorDescriptor> {
        &self.keyword
    }

    pub fn returns(&self) -> &BehaviorDescriptor {
        &self.returns
    }

    /// Argument side in notation: `[Integer, {b: Float}]`, `{a: Float}` or `[]`.
    pub fn argument_type(&self) -> String {
        let keywords = || {
            let parts: Vec<String> = self
                .keyword
                .iter()
                .map(|(k, d)| format!("{}: {}", k, d))
                .collect();
            format!("{{{}}}", parts.join(", "))
        };
        if self.positional.is_empty() && !self.keyword.is_empty() {
            return keywords();
        }
        let mut parts: Vec<String> = self.positional.iter().map(ToString::to_string).collect();
        if !self.keyword.is_empty() {
            parts.push(keywords());
        }
        format!("[{}]", parts.join(", "))
    }

    /// Return side in notation.
    pub fn return_type(&self) -> String {
        self.returns.to_string()
    }

    /// The whole contract in notation: `[Integer] => Any`.
    pub fn info(&self) -> String {
        format!("{} => {}", self.argument_type(), self.return_type())
    }

    pub fn summary(&self) -> SignatureSummary {
        SignatureSummary {
            positional: self.positional.iter().map(ToString::to_string).collect(),
            keyword: self
                .keyword
                .iter()
                .map(|(k, d)| (k.to_string(), d.to_string()))
                .collect(),
            returns: self.return_type(),
            info: self.info(),
        }
    }
}

impl fmt::Display for CompiledSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.info())
    }
}

/// Serializable rendering of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub positional: Vec<String>,
    pub keyword: IndexMap<String, String>,
    pub returns: String,
    pub info: String,
}
