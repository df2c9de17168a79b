//! Native members of the built-in classes.
//!
//! These exist so capability probes (`RespondsTo`) and nested calls find
//! real members on built-in values.

use std::sync::Arc;

use callguard_core::{MethodDef, ParamList, ScopeId, Symbol, Value, Visibility};

use super::error::CallError;
use super::state::{CallFrame, Runtime};

type Native = fn(&Runtime, &CallFrame) -> Result<Value, CallError>;

pub(super) fn install(rt: &Runtime) {
    // Kernel
    unary(rt, ScopeId::KERNEL, "to_s", |rt, f| Ok(Value::Str(to_s(rt, &f.receiver))));
    unary(rt, ScopeId::KERNEL, "inspect", |rt, f| Ok(Value::Str(rt.inspect(&f.receiver))));
    unary(rt, ScopeId::KERNEL, "nil?", |_, f| Ok(Value::Bool(f.receiver.is_nil())));
    unary(rt, ScopeId::KERNEL, "class", |rt, f| Ok(Value::Scope(rt.class_of(&f.receiver))));
    binary(rt, ScopeId::KERNEL, "==", |_, f| Ok(Value::Bool(f.receiver == f.arg(0))));
    binary(rt, ScopeId::KERNEL, "respond_to?", |rt, f| match f.arg(0) {
        Value::Symbol(name) => Ok(Value::Bool(rt.respond_to(&f.receiver, &name))),
        Value::Str(name) => Ok(Value::Bool(rt.respond_to(&f.receiver, &Symbol::from(name)))),
        other => Err(CallError::raised(format!(
            "{} is not a symbol nor a string",
            rt.inspect(&other)
        ))),
    });

    // Integer
    unary(rt, ScopeId::INTEGER, "to_i", |_, f| Ok(f.receiver.clone()));
    unary(rt, ScopeId::INTEGER, "to_f", |_, f| Ok(Value::Float(f.receiver.as_int().unwrap_or(0) as f64)));
    unary(rt, ScopeId::INTEGER, "odd?", |_, f| Ok(Value::Bool(f.receiver.as_int().unwrap_or(0) % 2 != 0)));
    unary(rt, ScopeId::INTEGER, "even?", |_, f| Ok(Value::Bool(f.receiver.as_int().unwrap_or(0) % 2 == 0)));
    unary(rt, ScopeId::INTEGER, "zero?", |_, f| Ok(Value::Bool(f.receiver.as_int() == Some(0))));
    unary(rt, ScopeId::INTEGER, "succ", |_, f| add(&f.receiver, &Value::Int(1)));
    unary(rt, ScopeId::INTEGER, "abs", |_, f| match f.receiver {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| CallError::raised("integer overflow")),
        _ => Ok(f.receiver.clone()),
    });
    binary(rt, ScopeId::INTEGER, "+", |_, f| add(&f.receiver, &f.arg(0)));

    // Float
    unary(rt, ScopeId::FLOAT, "to_i", |_, f| match f.receiver {
        Value::Float(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
        Value::Float(x) => Err(CallError::raised(format!("FloatDomainError: {}", x))),
        _ => Ok(f.receiver.clone()),
    });
    unary(rt, ScopeId::FLOAT, "to_f", |_, f| Ok(f.receiver.clone()));
    unary(rt, ScopeId::FLOAT, "zero?", |_, f| Ok(Value::Bool(f.receiver == Value::Float(0.0))));
    unary(rt, ScopeId::FLOAT, "abs", |_, f| match f.receiver {
        Value::Float(x) => Ok(Value::Float(x.abs())),
        _ => Ok(f.receiver.clone()),
    });
    binary(rt, ScopeId::FLOAT, "+", |_, f| add(&f.receiver, &f.arg(0)));

    // String
    unary(rt, ScopeId::STRING, "to_i", |_, f| Ok(Value::Int(leading_int(f.receiver.as_str().unwrap_or("")))));
    unary(rt, ScopeId::STRING, "to_f", |_, f| {
        Ok(Value::Float(leading_float(f.receiver.as_str().unwrap_or(""))))
    });
    unary(rt, ScopeId::STRING, "to_sym", |_, f| {
        Ok(Value::Symbol(Symbol::from(f.receiver.as_str().unwrap_or(""))))
    });
    unary(rt, ScopeId::STRING, "length", |_, f| {
        Ok(count(f.receiver.as_str().map_or(0, |s| s.chars().count())))
    });
    unary(rt, ScopeId::STRING, "upcase", |_, f| {
        Ok(Value::Str(f.receiver.as_str().unwrap_or("").to_uppercase()))
    });
    binary(rt, ScopeId::STRING, "+", |rt, f| match (&f.receiver, f.arg(0)) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (_, other) => Err(CallError::raised(format!(
            "no implicit conversion of {} into String",
            rt.scope_name(rt.class_of(&other))
        ))),
    });

    // Symbol
    unary(rt, ScopeId::SYMBOL, "to_sym", |_, f| Ok(f.receiver.clone()));
    unary(rt, ScopeId::SYMBOL, "length", |_, f| match &f.receiver {
        Value::Symbol(s) => Ok(count(s.as_str().chars().count())),
        _ => Ok(count(0)),
    });

    // Array
    unary(rt, ScopeId::ARRAY, "length", |_, f| Ok(count(array(&f.receiver).len())));
    unary(rt, ScopeId::ARRAY, "empty?", |_, f| Ok(Value::Bool(array(&f.receiver).is_empty())));
    unary(rt, ScopeId::ARRAY, "first", |_, f| Ok(array(&f.receiver).first().cloned().unwrap_or(Value::Nil)));
    unary(rt, ScopeId::ARRAY, "last", |_, f| Ok(array(&f.receiver).last().cloned().unwrap_or(Value::Nil)));

    // Hash
    unary(rt, ScopeId::HASH, "length", |_, f| match &f.receiver {
        Value::Hash(pairs) => Ok(count(pairs.len())),
        _ => Ok(count(0)),
    });
    unary(rt, ScopeId::HASH, "keys", |_, f| match &f.receiver {
        Value::Hash(pairs) => Ok(Value::Array(pairs.iter().map(|(k, _)| k.clone()).collect())),
        _ => Ok(Value::Array(Vec::new())),
    });

    // NilClass
    unary(rt, ScopeId::NIL_CLASS, "to_i", |_, _| Ok(Value::Int(0)));
    unary(rt, ScopeId::NIL_CLASS, "to_f", |_, _| Ok(Value::Float(0.0)));
    unary(rt, ScopeId::NIL_CLASS, "to_a", |_, _| Ok(Value::Array(Vec::new())));
}

fn unary(rt: &Runtime, scope: ScopeId, name: &str, body: Native) {
    define(rt, scope, name, ParamList::new(), body);
}

fn binary(rt: &Runtime, scope: ScopeId, name: &str, body: Native) {
    define(rt, scope, name, ParamList::new().required("other"), body);
}

fn define(rt: &Runtime, scope: ScopeId, name: &str, params: ParamList, body: Native) {
    let def = MethodDef::new(Symbol::from(name), scope, Visibility::Public, params);
    rt.insert_method(def, Arc::new(body));
}

fn to_s(rt: &Runtime, value: &Value) -> String {
    use crate::behavior::TypeEnvironment;

    rt.text_of(value).unwrap_or_default()
}

fn count(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn array(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

fn add(a: &Value, b: &Value) -> Result<Value, CallError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or_else(|| CallError::raised("integer overflow")),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 + y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x + *y as f64)),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x + y)),
        (_, other) => Err(CallError::raised(format!(
            "{} can't be coerced into {}",
            other.type_name(),
            a.type_name()
        ))),
    }
}

/// Leading `[+-]?\d+` of `text`, `0` when there is none.
fn leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// Longest numeric prefix of `text` as a float, `0.0` when there is none.
fn leading_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    (1..=trimmed.len())
        .rev()
        .filter(|end| trimmed.is_char_boundary(*end))
        .find_map(|end| trimmed[..end].parse::<f64>().ok())
        .filter(|x| x.is_finite())
        .unwrap_or(0.0)
}
