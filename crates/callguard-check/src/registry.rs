//! Process-wide store of compiled signatures.
//!
//! [`SignatureRegistry`] maps `(runtime, scope, member)` to an
//! `Arc<CompiledSignature>`. Scope ids are indexes into one runtime's scope
//! table, so every key carries the [`RuntimeId`] of the runtime that owns the
//! scope; runtimes sharing a registry never see each other's entries.
//! Signatures are immutable once published, so a reader holding an `Arc`
//! observes either the old or the new signature in full while a writer
//! replaces the entry.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use callguard_core::{ScopeId, Symbol};

use crate::signature::CompiledSignature;

static NEXT_RUNTIME: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeId(u32);

impl RuntimeId {
    /// Allocates an id no other runtime in this process holds.
    pub fn fresh() -> Self {
        RuntimeId(NEXT_RUNTIME.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rt{}", self.0)
    }
}

type Key = (RuntimeId, ScopeId, Symbol);

/// Concurrent `(runtime, scope, member) -> signature` map.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    entries: DashMap<Key, Arc<CompiledSignature>>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `signature`, replacing and returning any previous entry.
    pub fn register(
        &self,
        runtime: RuntimeId,
        scope: ScopeId,
        member: Symbol,
        signature: Arc<CompiledSignature>,
    ) -> Option<Arc<CompiledSignature>> {
        self.entries.insert((runtime, scope, member), signature)
    }

    pub fn lookup(
        &self,
        runtime: RuntimeId,
        scope: ScopeId,
        member: &Symbol,
    ) -> Option<Arc<CompiledSignature>> {
        self.entries
            .get(&(runtime, scope, member.clone()))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, runtime: RuntimeId, scope: ScopeId, member: &Symbol) -> bool {
        self.entries.contains_key(&(runtime, scope, member.clone()))
    }

    /// Contracted member names of one scope, sorted.
    pub fn members_of(&self, runtime: RuntimeId, scope: ScopeId) -> Vec<Symbol> {
        let mut members: Vec<Symbol> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == runtime && entry.key().1 == scope)
            .map(|entry| entry.key().2.clone())
            .collect();
        members.sort();
        members
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{compile, RawTerm};

    const RT: RuntimeId = RuntimeId(1);

    fn signature(ret: RawTerm) -> Arc<CompiledSignature> {
        Arc::new(compile(&RawTerm::spec(RawTerm::List(vec![]), ret)).unwrap())
    }

    #[test]
    fn register_and_lookup() {
        let registry = SignatureRegistry::new();
        assert!(registry.is_empty());

        let sig = signature(RawTerm::Any);
        assert!(registry.register(RT, ScopeId(20), "run".into(), sig.clone()).is_none());
        assert!(registry.contains(RT, ScopeId(20), &"run".into()));
        assert!(Arc::ptr_eq(&registry.lookup(RT, ScopeId(20), &"run".into()).unwrap(), &sig));
        assert!(registry.lookup(RT, ScopeId(20), &"walk".into()).is_none());
    }

    #[test]
    fn scopes_are_independent() {
        let registry = SignatureRegistry::new();
        registry.register(RT, ScopeId(20), "run".into(), signature(RawTerm::Any));
        registry.register(RT, ScopeId(21), "run".into(), signature(RawTerm::Nil));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(RT, ScopeId(20), &"run".into()).unwrap().info(), "[] => Any");
        assert_eq!(registry.lookup(RT, ScopeId(21), &"run".into()).unwrap().info(), "[] => nil");
    }

    #[test]
    fn reregistration_replaces_wholesale() {
        let registry = SignatureRegistry::new();
        let old = signature(RawTerm::Any);
        registry.register(RT, ScopeId(20), "run".into(), old.clone());

        let previous = registry.register(RT, ScopeId(20), "run".into(), signature(RawTerm::Nil));
        assert!(Arc::ptr_eq(&previous.unwrap(), &old));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(RT, ScopeId(20), &"run".into()).unwrap().info(), "[] => nil");
        // The old Arc is still complete for anyone holding it.
        assert_eq!(old.info(), "[] => Any");
    }

    #[test]
    fn members_of_scope() {
        let registry = SignatureRegistry::new();
        registry.register(RT, ScopeId(20), "walk".into(), signature(RawTerm::Any));
        registry.register(RT, ScopeId(20), "run".into(), signature(RawTerm::Any));
        registry.register(RT, ScopeId(21), "fly".into(), signature(RawTerm::Any));
        assert_eq!(registry.members_of(RT, ScopeId(20)), vec![Symbol::from("run"), Symbol::from("walk")]);
    }

    #[test]
    fn concurrent_registration_of_distinct_keys() {
        let registry = Arc::new(SignatureRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        registry.register(RT, ScopeId(i), Symbol::from(format!("m{}", j)), signature(RawTerm::Any));
                        assert!(registry.lookup(RT, ScopeId(i), &Symbol::from(format!("m{}", j))).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 400);
    }

    #[test]
    fn runtimes_are_independent() {
        let registry = SignatureRegistry::new();
        let (a, b) = (RuntimeId::fresh(), RuntimeId::fresh());
        assert_ne!(a, b);

        registry.register(a, ScopeId(17), "m".into(), signature(RawTerm::Any));
        assert!(registry.contains(a, ScopeId(17), &"m".into()));
        assert!(!registry.contains(b, ScopeId(17), &"m".into()));

        registry.register(b, ScopeId(17), "m".into(), signature(RawTerm::Nil));
        assert_eq!(registry.lookup(a, ScopeId(17), &"m".into()).unwrap().info(), "[] => Any");
        assert_eq!(registry.lookup(b, ScopeId(17), &"m".into()).unwrap().info(), "[] => nil");
        assert_eq!(registry.members_of(a, ScopeId(17)), vec![Symbol::from("m")]);
    }
}
