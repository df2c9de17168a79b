//! Call-time behavioral contracts for a dynamic object runtime.
//!
//! A contract says, for one member of one scope, which behavior each
//! argument and the return value must exhibit. Contracts are compiled once,
//! stored in a shared registry and enforced by an interception layer on
//! every call.
//!
//! - [`behavior`]: descriptors and the [`Matcher`](behavior::Matcher).
//! - [`signature`]: raw terms and the signature compiler.
//! - [`registry`]: the concurrent `(runtime, scope, member) -> signature` store.
//! - [`runtime`]: object runtime, dispatch and interception.
//! - [`contract`]: registration API, annotations, typed accessors.
//! - [`notation`]: text syntax for specifications and values.

pub mod behavior;
pub mod contract;
pub mod notation;
pub mod registry;
pub mod runtime;
pub mod signature;

pub use behavior::{BehaviorDescriptor, Matcher, TypeEnvironment};
pub use contract::{ContractError, MemberInfo};
pub use notation::NotationError;
pub use registry::{RuntimeId, SignatureRegistry};
pub use runtime::{ArgumentTypeError, CallError, CallFrame, ReturnTypeError, Runtime, RuntimeConfig};
pub use signature::{compile, CompiledSignature, RawKey, RawTerm, SignatureError, Slot};
