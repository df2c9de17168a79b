//! Call interception.
//!
//! Every scope that has at least one contract gets exactly one
//! [`InterceptionLayer`], a set of member names. The layer does not hold a
//! definition: when a call resolves through a scope whose layer lists the
//! member, the checks run around whatever definition resolution found at
//! that moment. That makes registration and definition order irrelevant and
//! keeps redefinitions checked.
//!
//! When several layers on the resolution path list the member (a subclass
//! and its parent both contracted), argument checks run nearest first and
//! return checks in reverse, so the body still runs exactly once.

use std::sync::Arc;

use indexmap::IndexSet;

use callguard_core::{BoundArgs, ScopeId, Symbol, Value};

use crate::signature::{CompiledSignature, Slot};

use super::error::{ArgumentTypeError, CallError, ReturnTypeError};
use super::state::{CallFrame, Resolved, Runtime};
use super::trace::InterceptedCall;

/// Members a scope routes through contract checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptionLayer {
    members: IndexSet<Symbol>,
}

impl InterceptionLayer {
    pub fn contains(&self, member: &Symbol) -> bool {
        self.members.contains(member)
    }

    /// Adds `member`; returns `false` if it was already listed.
    pub(crate) fn insert(&mut self, member: Symbol) -> bool {
        self.members.insert(member)
    }

    pub fn members(&self) -> impl Iterator<Item = &Symbol> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Runtime {
    /// Lists `member` in the layer of `scope`, creating the layer on first
    /// use. Idempotent.
    pub(crate) fn install_interception(&self, scope: ScopeId, member: Symbol) {
        let mut layer = self.layers.entry(scope).or_insert_with(|| {
            tracing::debug!(scope = %scope, "interception layer created");
            InterceptionLayer::default()
        });
        if layer.insert(member.clone()) {
            tracing::debug!(scope = %scope, member = %member, "member intercepted");
        }
    }

    /// Snapshot of the interception layer of `scope`, if it has one.
    pub fn interception_layer(&self, scope: ScopeId) -> Option<InterceptionLayer> {
        self.layers.get(&scope).map(|layer| layer.clone())
    }
}

/// Runs `resolved` for `frame` between the argument and return checks of
/// every intercepting scope.
pub(crate) fn invoke_checked(
    rt: &Runtime,
    resolved: &Resolved,
    frame: &CallFrame,
) -> Result<Value, CallError> {
    let member = &frame.member;
    // Signatures are read once per call; a concurrent re-registration affects
    // the next call, never half of this one.
    let signatures: Vec<(ScopeId, Arc<CompiledSignature>)> = resolved
        .interceptors
        .iter()
        .filter_map(|scope| rt.registry().lookup(rt.id(), *scope, member).map(|sig| (*scope, sig)))
        .collect();

    let mut produced = None;
    let outcome = signatures
        .iter()
        .try_for_each(|(scope, signature)| {
            tracing::trace!(scope = %scope, member = %member, %signature, "checking arguments");
            check_arguments(rt, *scope, member, signature, &frame.args).map_err(CallError::from)
        })
        .and_then(|()| (resolved.entry.body)(rt, frame))
        .and_then(|value| {
            produced = Some(value.clone());
            signatures.iter().rev().try_for_each(|(scope, signature)| {
                check_return(rt, *scope, member, signature, &value).map_err(CallError::from)
            })?;
            Ok(value)
        });

    if rt.config().trace_enabled {
        if let Some(scope) = resolved.interceptors.first() {
            rt.record(InterceptedCall {
                scope: *scope,
                member: member.clone(),
                positional: frame.args.positional.clone(),
                keywords: frame.args.keywords.clone(),
                returned: produced,
                error: outcome.as_ref().err().map(ToString::to_string),
            });
        }
    }
    outcome
}

/// Checks supplied arguments against `signature`.
///
/// Positional descriptors apply to supplied positions only; a descriptor
/// for a slot the caller left to its default is skipped, as is a keyword
/// descriptor for a keyword that was not passed.
pub fn check_arguments(
    rt: &Runtime,
    scope: ScopeId,
    member: &Symbol,
    signature: &CompiledSignature,
    args: &BoundArgs,
) -> Result<(), ArgumentTypeError> {
    let matcher = rt.matcher();
    let violation = |slot: Slot, expected: String, actual: &Value| ArgumentTypeError {
        owner: rt.scope_name(scope),
        member: member.clone(),
        slot,
        expected,
        actual: rt.inspect(actual),
    };

    for (index, (descriptor, value)) in signature.positional().iter().zip(&args.positional).enumerate() {
        if !matcher.matches(descriptor, value) {
            return Err(violation(Slot::Position(index), descriptor.to_string(), value));
        }
    }
    for (name, descriptor) in signature.keyword() {
        let Some(value) = args.keywords.get(name) else {
            continue;
        };
        if !matcher.matches(descriptor, value) {
            return Err(violation(Slot::Keyword(name.clone()), descriptor.to_string(), value));
        }
    }
    Ok(())
}

/// Checks a produced value against the return descriptor of `signature`.
pub fn check_return(
    rt: &Runtime,
    scope: ScopeId,
    member: &Symbol,
    signature: &CompiledSignature,
    value: &Value,
) -> Result<(), ReturnTypeError> {
    if rt.matcher().matches(signature.returns(), value) {
        return Ok(());
    }
    Err(ReturnTypeError {
        owner: rt.scope_name(scope),
        member: member.clone(),
        expected: signature.return_type(),
        actual: rt.inspect(value),
    })
}
