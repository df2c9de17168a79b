//! Trace of checked calls.
//!
//! When [`RuntimeConfig::trace_enabled`](super::RuntimeConfig::trace_enabled)
//! is set, the interceptor records an [`InterceptedCall`] for every call that
//! went through contract checks, whether it succeeded or failed.

use indexmap::IndexMap;
use serde::Serialize;

use callguard_core::{ScopeId, Symbol, Value};

/// One checked invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterceptedCall {
    /// Nearest scope whose contract applied.
    pub scope: ScopeId,
    pub member: Symbol,
    pub positional: Vec<Value>,
    pub keywords: IndexMap<Symbol, Value>,
    /// Produced value; `None` if the call failed before producing one.
    pub returned: Option<Value>,
    /// Text of the violation or fault, if the call failed.
    pub error: Option<String>,
}

impl InterceptedCall {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_json() {
        let call = InterceptedCall {
            scope: ScopeId(17),
            member: Symbol::from("sum"),
            positional: vec![Value::Int(1)],
            keywords: IndexMap::new(),
            returned: None,
            error: Some("Calculator#sum for 1st argument: expected 1 to match String".into()),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["scope"], serde_json::json!(17));
        assert_eq!(json["member"], serde_json::json!("sum"));
        assert!(json["returned"].is_null());
        assert!(!call.succeeded());
    }
}
