//! Runtime value representation.
//!
//! [`Value`] is the dynamic value every argument and return value is carried
//! as. `Value::Nil` doubles as the "nothing was produced" sentinel: a member
//! that returns nothing returns `Nil`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::id::{ObjectId, ScopeId};
use crate::symbol::Symbol;

/// Reference to an object instance: its identity and its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub class: ScopeId,
}

/// A runtime value passed into or produced by a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(Symbol),
    Array(Vec<Value>),
    /// Key/value pairs in insertion order.
    Hash(Vec<(Value, Value)>),
    Object(ObjectRef),
    /// A class or module used as a value (receiver of singleton members).
    Scope(ScopeId),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Returns a human-readable description of the value's kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "NilClass",
            Value::Bool(true) => "TrueClass",
            Value::Bool(false) => "FalseClass",
            Value::Int(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::Object(_) => "Object",
            Value::Scope(_) => "Scope",
        }
    }

    /// Canonical text form.
    ///
    /// Returns `None` for objects and scopes, whose text form depends on the
    /// scope table (their class name).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Nil => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::Str(s) => Some(s.clone()),
            Value::Symbol(s) => Some(s.as_str().to_string()),
            Value::Array(_) | Value::Hash(_) => self.inspect(),
            Value::Object(_) | Value::Scope(_) => None,
        }
    }

    /// Literal form used in diagnostics: strings quoted, symbols prefixed.
    pub fn inspect(&self) -> Option<String> {
        match self {
            Value::Nil => Some("nil".to_string()),
            Value::Str(s) => Some(format!("{:?}", s)),
            Value::Symbol(s) => Some(s.inspect()),
            Value::Array(items) => {
                let parts: Option<Vec<String>> = items.iter().map(Value::inspect).collect();
                Some(format!("[{}]", parts?.join(", ")))
            }
            Value::Hash(pairs) => {
                let mut parts = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    parts.push(format!("{}=>{}", k.inspect()?, v.inspect()?));
                }
                Some(format!("{{{}}}", parts.join(", ")))
            }
            Value::Object(_) | Value::Scope(_) => None,
            other => other.to_text(),
        }
    }

    /// Ordering between comparable values.
    ///
    /// Integers and floats compare numerically with each other, strings
    /// lexically. Every other pairing is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => compare_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => compare_int_float(*b, *a).map(Ordering::reverse),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Floats always show a fractional part (`2.0`, not `2`).
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

/// Exact ordering of an integer against a float; `as f64` rounds above 2^53.
fn compare_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, the first float past i64::MAX.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() {
        return None;
    }
    if float >= LIMIT {
        return Some(Ordering::Less);
    }
    if float < -LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    // `whole` is within i64 range here, so the cast is exact.
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&float),
        unequal => Some(unequal),
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
