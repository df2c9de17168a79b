//! Member definitions, parameter lists and native argument binding.
//!
//! [`MethodDef`] is member metadata only; bodies live in the runtime.
//! [`bind`] is the native binder: it matches an [`Args`] list against a
//! [`ParamList`] and rejects arity and keyword mismatches before any
//! contract check sees the call.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::ScopeId;
use crate::symbol::Symbol;
use crate::value::Value;

/// Caller-visible access level of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        };
        f.write_str(s)
    }
}

/// A named keyword parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordParam {
    pub name: Symbol,
    pub required: bool,
}

/// Declared parameters of a member, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamList {
    pub required: Vec<Symbol>,
    pub optional: Vec<Symbol>,
    /// Collects surplus positional arguments.
    pub rest: Option<Symbol>,
    pub keywords: Vec<KeywordParam>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str) -> Self {
        self.required.push(Symbol::from(name));
        self
    }

    pub fn optional(mut self, name: &str) -> Self {
        self.optional.push(Symbol::from(name));
        self
    }

    pub fn rest(mut self, name: &str) -> Self {
        self.rest = Some(Symbol::from(name));
        self
    }

    pub fn keyword(mut self, name: &str) -> Self {
        self.keywords.push(KeywordParam {
            name: Symbol::from(name),
            required: true,
        });
        self
    }

    pub fn optional_keyword(mut self, name: &str) -> Self {
        self.keywords.push(KeywordParam {
            name: Symbol::from(name),
            required: false,
        });
        self
    }

    /// Largest accepted positional count, `None` when a rest parameter exists.
    pub fn max_positional(&self) -> Option<usize> {
        match self.rest {
            Some(_) => None,
            None => Some(self.required.len() + self.optional.len()),
        }
    }

    fn keyword_param(&self, name: &Symbol) -> Option<&KeywordParam> {
        self.keywords.iter().find(|k| &k.name == name)
    }
}

/// Arguments supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: IndexMap<Symbol, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(values: Vec<Value>) -> Self {
        Args {
            positional: values,
            keywords: IndexMap::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn keyword(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.keywords.insert(Symbol::from(name), value.into());
        self
    }
}

/// Arguments after a successful bind.
///
/// `positional` holds only the values the caller supplied; optional slots
/// left to their default are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundArgs {
    pub positional: Vec<Value>,
    pub keywords: IndexMap<Symbol, Value>,
}

impl BoundArgs {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }
}

/// Native binding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BindError {
    #[error("wrong number of arguments (given {given}, expected {expected})")]
    WrongArity { given: usize, expected: String },

    #[error("unknown keyword: {name}")]
    UnknownKeyword { name: Symbol },

    #[error("missing keyword: {name}")]
    MissingKeyword { name: Symbol },
}

/// Binds caller arguments to a parameter list.
pub fn bind(params: &ParamList, args: &Args) -> Result<BoundArgs, BindError> {
    let given = args.positional.len();
    let min = params.required.len();
    let max = params.max_positional();
    if given < min || max.is_some_and(|m| given > m) {
        let expected = match max {
            Some(m) if m == min => min.to_string(),
            Some(m) => format!("{}..{}", min, m),
            None => format!("{}+", min),
        };
        return Err(BindError::WrongArity { given, expected });
    }

    for name in args.keywords.keys() {
        if params.keyword_param(name).is_none() {
            return Err(BindError::UnknownKeyword { name: name.clone() });
        }
    }
    for param in params.keywords.iter().filter(|k| k.required) {
        if !args.keywords.contains_key(&param.name) {
            return Err(BindError::MissingKeyword {
                name: param.name.clone(),
            });
        }
    }

    Ok(BoundArgs {
        positional: args.positional.clone(),
        keywords: args.keywords.clone(),
    })
}

/// Member metadata: identity, owner, access level and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: Symbol,
    pub owner: ScopeId,
    pub visibility: Visibility,
    pub params: ParamList,
}

impl MethodDef {
    pub fn new(name: Symbol, owner: ScopeId, visibility: Visibility, params: ParamList) -> Self {
        MethodDef {
            name,
            owner,
            visibility,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_params() -> ParamList {
        ParamList::new().required("a").required("b")
    }

    #[test]
    fn binds_exact_arity() {
        let bound = bind(&sum_params(), &Args::new().arg(1).arg(2)).unwrap();
        assert_eq!(bound.positional, vec![Value::Int(1), Value::Int(2)]);
        assert!(bound.keywords.is_empty());
    }

    #[test]
    fn rejects_too_few_and_too_many() {
        let err = bind(&sum_params(), &Args::new().arg(1)).unwrap_err();
        assert_eq!(
            err,
            BindError::WrongArity {
                given: 1,
                expected: "2".into()
            }
        );

        let err = bind(&sum_params(), &Args::new().arg(1).arg(2).arg(3)).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments (given 3, expected 2)");
    }

    #[test]
    fn optional_and_rest_widen_arity() {
        let params = ParamList::new().required("a").optional("b");
        assert!(bind(&params, &Args::new().arg(1)).is_ok());
        assert!(bind(&params, &Args::new().arg(1).arg(2)).is_ok());
        let err = bind(&params, &Args::new()).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments (given 0, expected 1..2)");

        let variadic = ParamList::new().required("a").rest("more");
        assert!(bind(&variadic, &Args::new().arg(1).arg(2).arg(3).arg(4)).is_ok());
        let err = bind(&variadic, &Args::new()).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments (given 0, expected 1+)");
    }

    #[test]
    fn keyword_binding() {
        let params = ParamList::new().required("a").keyword("b").optional_keyword("c");
        let bound = bind(&params, &Args::new().arg(1).keyword("b", 2)).unwrap();
        assert_eq!(bound.keyword("b"), Some(&Value::Int(2)));
        assert_eq!(bound.keyword("c"), None);

        let err = bind(&params, &Args::new().arg(1)).unwrap_err();
        assert_eq!(err, BindError::MissingKeyword { name: "b".into() });

        let err = bind(&params, &Args::new().arg(1).keyword("b", 2).keyword("z", 3)).unwrap_err();
        assert_eq!(err, BindError::UnknownKeyword { name: "z".into() });
    }

    proptest::proptest! {
        #[test]
        fn arity_window(given in 0usize..8) {
            let params = ParamList::new().required("a").optional("b").optional("c");
            let args = Args::positional(vec![Value::Nil; given]);
            proptest::prop_assert_eq!(bind(&params, &args).is_ok(), (1..=3).contains(&given));
        }
    }
}
