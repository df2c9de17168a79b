//! Core error types for callguard-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the object model: scope definition and lookup, module
//! inclusion, instantiation and singleton scopes.

use crate::id::ScopeId;
use thiserror::Error;

/// Core errors produced by the callguard-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Attempting to define a scope whose name is already taken.
    #[error("duplicate scope name: '{name}'")]
    DuplicateScopeName { name: String },

    /// A ScopeId was not found in the scope table.
    #[error("scope not found: ScopeId({id})", id = id.0)]
    ScopeNotFound { id: ScopeId },

    /// A superclass must be a class, not a module or singleton scope.
    #[error("superclass must be a class: '{name}'")]
    InvalidSuperclass { name: String },

    /// Only modules can be included into another scope.
    #[error("'{name}' is not a module")]
    NotAModule { name: String },

    /// Objects can only be instantiated from classes.
    #[error("'{name}' is not a class")]
    NotAClass { name: String },

    /// The value cannot carry a singleton scope (immediates like integers).
    #[error("can't define singleton for {type_name}")]
    NoSingleton { type_name: String },
}
