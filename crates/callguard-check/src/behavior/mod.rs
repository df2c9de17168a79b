//! Behavior descriptors: the constraint language of a contract.
//!
//! A [`BehaviorDescriptor`] describes what a single argument or return value
//! must look like. Descriptors are produced by the signature compiler and
//! evaluated by the [`Matcher`](matcher::Matcher).

pub mod matcher;

use std::fmt;
use std::sync::Arc;

use callguard_core::{ScopeId, Symbol, Value};

pub use matcher::{Matcher, TypeEnvironment};

/// A resolved class or module reference, carrying its name for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub id: ScopeId,
    pub name: String,
}

impl TypeRef {
    pub fn new(id: ScopeId, name: impl Into<String>) -> Self {
        TypeRef {
            id,
            name: name.into(),
        }
    }
}

/// A regular expression matched against a value's text form.
#[derive(Debug, Clone)]
pub struct Pattern(regex::Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        regex::Regex::new(source).map(Pattern)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// An ordered range with optional bounds. The start bound is always
/// inclusive; the end bound is inclusive unless `exclusive_end` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub start: Option<Value>,
    pub end: Option<Value>,
    pub exclusive_end: bool,
}

impl Interval {
    /// `start..end`
    pub fn inclusive(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Interval {
            start: Some(start.into()),
            end: Some(end.into()),
            exclusive_end: false,
        }
    }

    /// `start...end`
    pub fn exclusive(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Interval {
            start: Some(start.into()),
            end: Some(end.into()),
            exclusive_end: true,
        }
    }

    /// `start..`
    pub fn starting_at(start: impl Into<Value>) -> Self {
        Interval {
            start: Some(start.into()),
            end: None,
            exclusive_end: false,
        }
    }

    /// `..end`
    pub fn up_to(end: impl Into<Value>) -> Self {
        Interval {
            start: None,
            end: Some(end.into()),
            exclusive_end: false,
        }
    }

    /// Range membership. Values not comparable with a bound are outside.
    pub fn contains(&self, value: &Value) -> bool {
        use std::cmp::Ordering;

        if let Some(start) = &self.start {
            match value.compare(start) {
                Some(Ordering::Greater | Ordering::Equal) => {}
                _ => return false,
            }
        }
        if let Some(end) = &self.end {
            match value.compare(end) {
                Some(Ordering::Less) => {}
                Some(Ordering::Equal) if !self.exclusive_end => {}
                _ => return false,
            }
        }
        if self.start.is_none() && self.end.is_none() {
            // An unbounded range still only admits orderable values.
            return value.compare(value).is_some();
        }
        true
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |v: &Option<Value>| {
            v.as_ref()
                .and_then(Value::inspect)
                .unwrap_or_default()
        };
        let dots = if self.exclusive_end { "..." } else { ".." };
        write!(f, "{}{}{}", bound(&self.start), dots, bound(&self.end))
    }
}

/// Fault raised from inside a predicate. Never escapes the matcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("predicate fault: {message}")]
pub struct PredicateFault {
    pub message: String,
}

impl PredicateFault {
    pub fn new(message: impl Into<String>) -> Self {
        PredicateFault {
            message: message.into(),
        }
    }
}

pub type PredicateFn = dyn Fn(&Value) -> Result<bool, PredicateFault> + Send + Sync;

/// A labelled single-argument check.
#[derive(Clone)]
pub struct Predicate {
    label: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new(
        label: impl Into<String>,
        func: impl Fn(&Value) -> Result<bool, PredicateFault> + Send + Sync + 'static,
    ) -> Self {
        Predicate {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    /// Wraps an infallible check.
    pub fn from_fn(
        label: impl Into<String>,
        func: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(label, move |v| Ok(func(v)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn call(&self, value: &Value) -> Result<bool, PredicateFault> {
        (self.func)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("label", &self.label).finish()
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// One constraint on one value.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorDescriptor {
    /// Value's class is the type or a subtype of it.
    ExactType(TypeRef),
    /// Value publicly answers the named member.
    RespondsTo(Symbol),
    /// Value's text form matches.
    Pattern(Pattern),
    /// Value lies inside the range.
    Interval(Interval),
    /// Value is an array of the same length whose elements match positionally.
    Tuple(Vec<BehaviorDescriptor>),
    /// Predicate returns true.
    Predicate(Predicate),
    BooleanTrue,
    BooleanFalse,
    /// Value is `nil`. Return side only.
    Absent,
    /// Anything.
    Wildcard,
}

impl BehaviorDescriptor {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, BehaviorDescriptor::Wildcard)
    }
}

impl fmt::Display for BehaviorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorDescriptor::ExactType(t) => f.write_str(&t.name),
            BehaviorDescriptor::RespondsTo(sym) => f.write_str(&sym.inspect()),
            BehaviorDescriptor::Pattern(p) => write!(f, "/{}/", p.as_str()),
            BehaviorDescriptor::Interval(i) => write!(f, "{}", i),
            BehaviorDescriptor::Tuple(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            BehaviorDescriptor::Predicate(p) => write!(f, "#<Proc {}>", p.label()),
            BehaviorDescriptor::BooleanTrue => f.write_str("true"),
            BehaviorDescriptor::BooleanFalse => f.write_str("false"),
            BehaviorDescriptor::Absent => f.write_str("nil"),
            BehaviorDescriptor::Wildcard => f.write_str("Any"),
        }
    }
}
