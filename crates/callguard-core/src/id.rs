//! Stable ID newtypes for runtime entities.
//!
//! Scope and object ids are distinct newtype wrappers over `u32`, so a
//! `ScopeId` cannot be passed where an `ObjectId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a class, module or singleton scope in the [`ScopeTable`](crate::ScopeTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

/// Identity of an object instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
