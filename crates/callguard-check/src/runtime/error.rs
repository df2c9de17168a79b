//! Call-time error types.
//!
//! [`ArgumentTypeError`] and [`ReturnTypeError`] are contract violations
//! raised by the interceptor. [`CallError`] is the umbrella every call
//! returns, which also carries native failures (missing member, binding,
//! depth) and faults raised by member bodies.

use callguard_core::{BindError, CoreError, Symbol, Visibility};

use crate::signature::Slot;

/// An argument failed its descriptor. Raised before the body runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{owner}#{member} for {slot}: expected {actual} to match {expected}")]
pub struct ArgumentTypeError {
    /// Scope whose contract was violated.
    pub owner: String,
    pub member: Symbol,
    pub slot: Slot,
    /// Expected descriptor in notation.
    pub expected: String,
    /// Offending value, inspected.
    pub actual: String,
}

/// The produced value failed the return descriptor. Raised after the body
/// ran; its side effects are not rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{owner}#{member} for return: expected {actual} to match {expected}")]
pub struct ReturnTypeError {
    pub owner: String,
    pub member: Symbol,
    pub expected: String,
    pub actual: String,
}

/// Failure of a single call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("undefined method '{member}' for {receiver}")]
    NoMethod { member: Symbol, receiver: String },

    #[error("{visibility} method '{member}' called for {receiver}")]
    Inaccessible {
        member: Symbol,
        visibility: Visibility,
        receiver: String,
    },

    #[error("{member}: {source}")]
    Bind {
        member: Symbol,
        #[source]
        source: BindError,
    },

    #[error(transparent)]
    ArgumentType(#[from] ArgumentTypeError),

    #[error(transparent)]
    ReturnType(#[from] ReturnTypeError),

    #[error("stack level too deep (limit {limit})")]
    DepthExceeded { limit: usize },

    /// A fault raised by a member body.
    #[error("{message}")]
    Raised { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CallError {
    pub fn raised(message: impl Into<String>) -> Self {
        CallError::Raised {
            message: message.into(),
        }
    }

    /// `true` for both an undefined member and one hidden by its visibility.
    pub fn is_no_method(&self) -> bool {
        matches!(self, CallError::NoMethod { .. } | CallError::Inaccessible { .. })
    }

    pub fn is_argument_type(&self) -> bool {
        matches!(self, CallError::ArgumentType(_))
    }

    pub fn is_return_type(&self) -> bool {
        matches!(self, CallError::ReturnType(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_error_message_names_slot() {
        let err = ArgumentTypeError {
            owner: "Calculator".into(),
            member: "sum".into(),
            slot: Slot::Position(1),
            expected: "Integer".into(),
            actual: "2.0".into(),
        };
        assert_eq!(
            err.to_string(),
            "Calculator#sum for 2nd argument: expected 2.0 to match Integer"
        );
    }

    #[test]
    fn keyword_slot_in_message() {
        let err = CallError::from(ArgumentTypeError {
            owner: "Calculator".into(),
            member: "kwarg".into(),
            slot: Slot::Keyword("a".into()),
            expected: "Float".into(),
            actual: "1".into(),
        });
        assert!(err.is_argument_type());
        assert_eq!(
            err.to_string(),
            "Calculator#kwarg for 'a' keyword argument: expected 1 to match Float"
        );
    }

    #[test]
    fn bind_errors_keep_source() {
        use std::error::Error;

        let err = CallError::Bind {
            member: "sum".into(),
            source: BindError::WrongArity {
                given: 1,
                expected: "2".into(),
            },
        };
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "sum: wrong number of arguments (given 1, expected 2)");
    }
}
