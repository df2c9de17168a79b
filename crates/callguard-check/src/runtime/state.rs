//! Runtime state, member tables and dispatch.
//!
//! [`Runtime`] is `Send + Sync`. The scope table sits behind an `RwLock`;
//! member tables, interception layers, instance variables and pending
//! annotations live in `DashMap`s. Member bodies are cloned out of their
//! table before they run, so no lock is held while user code executes and
//! bodies may call back into the runtime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use indexmap::IndexMap;

use callguard_core::{
    bind, Args, Attachment, BoundArgs, CoreError, MethodDef, ObjectId, ObjectRef, ParamList,
    ScopeId, ScopeKind, ScopeTable, Symbol, Value, Visibility,
};

use crate::behavior::matcher::DEFAULT_MAX_MATCH_DEPTH;
use crate::behavior::{Matcher, TypeEnvironment};
use crate::registry::{RuntimeId, SignatureRegistry};
use crate::signature::{ordinal, CompiledSignature};

use super::builtins;
use super::error::CallError;
use super::intercept::{self, InterceptionLayer};
use super::trace::InterceptedCall;

/// Configuration for the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Whether to record an [`InterceptedCall`] for every checked call.
    pub trace_enabled: bool,
    /// Most recent checked calls kept in the trace; older ones are dropped.
    /// Default: 1024.
    pub trace_capacity: usize,
    /// Maximum nesting of calls. Default: 256.
    pub max_call_depth: usize,
    /// Maximum nesting of tuple descriptors during matching. Default: 32.
    pub max_match_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            trace_enabled: false,
            trace_capacity: 1024,
            max_call_depth: 256,
            max_match_depth: DEFAULT_MAX_MATCH_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Reads `CALLGUARD_TRACE`, `CALLGUARD_TRACE_CAPACITY`,
    /// `CALLGUARD_MAX_CALL_DEPTH` and `CALLGUARD_MAX_MATCH_DEPTH`. Unset or
    /// unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = RuntimeConfig::default();
        if let Some(flag) = lookup("CALLGUARD_TRACE") {
            config.trace_enabled = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());
        if let Some(capacity) = number("CALLGUARD_TRACE_CAPACITY") {
            config.trace_capacity = capacity;
        }
        if let Some(depth) = number("CALLGUARD_MAX_CALL_DEPTH") {
            config.max_call_depth = depth;
        }
        if let Some(depth) = number("CALLGUARD_MAX_MATCH_DEPTH") {
            config.max_match_depth = depth;
        }
        config
    }
}

/// A member body. Receives the runtime so it can make nested calls.
pub type MethodBody = Arc<dyn Fn(&Runtime, &CallFrame) -> Result<Value, CallError> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct MethodEntry {
    pub(crate) def: MethodDef,
    pub(crate) body: MethodBody,
}

/// Outcome of member resolution: the definition that runs, plus every scope
/// passed on the way whose interception layer lists the member (nearest
/// first).
pub(crate) struct Resolved {
    pub(crate) entry: MethodEntry,
    pub(crate) interceptors: Vec<ScopeId>,
}

/// The invocation a member body is running for.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub receiver: Value,
    pub member: Symbol,
    pub args: BoundArgs,
    depth: usize,
}

impl CallFrame {
    /// Positional argument `index`, `Nil` when not supplied.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Nil)
    }

    /// Keyword argument `name`, `Nil` when not supplied.
    pub fn keyword(&self, name: &str) -> Value {
        self.args.keyword(name).cloned().unwrap_or(Value::Nil)
    }

    /// Positional argument `index` as an integer.
    pub fn int(&self, index: usize) -> Result<i64, CallError> {
        match self.args.get(index) {
            Some(Value::Int(i)) => Ok(*i),
            other => Err(CallError::raised(format!(
                "{}: {} argument is not an Integer ({})",
                self.member,
                ordinal(index + 1),
                other.map(Value::type_name).unwrap_or("missing")
            ))),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Calls `member` on another receiver from inside this body. Protected
    /// members are reachable when this frame's receiver is an instance of
    /// the member's owner.
    pub fn call(
        &self,
        rt: &Runtime,
        receiver: &Value,
        member: impl Into<Symbol>,
        args: Args,
    ) -> Result<Value, CallError> {
        let mode = CallMode::Nested {
            caller: &self.receiver,
        };
        rt.dispatch(receiver, &member.into(), args, mode, self.depth)
    }

    /// Calls `member` on this frame's own receiver; private members are
    /// reachable.
    pub fn send(
        &self,
        rt: &Runtime,
        member: impl Into<Symbol>,
        args: Args,
    ) -> Result<Value, CallError> {
        rt.dispatch(&self.receiver, &member.into(), args, CallMode::SelfSend, self.depth)
    }
}

enum CallMode<'a> {
    /// From outside any receiver.
    External,
    /// From a member body running for `caller`.
    Nested { caller: &'a Value },
    /// Receiver calling itself.
    SelfSend,
}

/// The object runtime.
pub struct Runtime {
    id: RuntimeId,
    config: RuntimeConfig,
    scopes: RwLock<ScopeTable>,
    methods: DashMap<ScopeId, IndexMap<Symbol, MethodEntry>>,
    pub(crate) layers: DashMap<ScopeId, InterceptionLayer>,
    registry: Arc<SignatureRegistry>,
    ivars: DashMap<Attachment, IndexMap<Symbol, Value>>,
    next_object: AtomicU32,
    /// Annotations waiting for the next member defined on their scope.
    pub(crate) pending: DashMap<ScopeId, Arc<CompiledSignature>>,
    trace: Mutex<VecDeque<InterceptedCall>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime with default configuration and its own registry.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(config, Arc::new(SignatureRegistry::new()))
    }

    /// Creates a runtime that stores contracts in a shared `registry`. Its
    /// entries are keyed by this runtime's [`RuntimeId`].
    pub fn with_registry(config: RuntimeConfig, registry: Arc<SignatureRegistry>) -> Self {
        let rt = Runtime {
            id: RuntimeId::fresh(),
            config,
            scopes: RwLock::new(ScopeTable::new()),
            methods: DashMap::new(),
            layers: DashMap::new(),
            registry,
            ivars: DashMap::new(),
            next_object: AtomicU32::new(1),
            pending: DashMap::new(),
            trace: Mutex::new(VecDeque::new()),
        };
        builtins::install(&rt);
        rt
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SignatureRegistry> {
        &self.registry
    }

    fn scopes(&self) -> RwLockReadGuard<'_, ScopeTable> {
        self.scopes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn scopes_mut(&self) -> RwLockWriteGuard<'_, ScopeTable> {
        self.scopes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn trace_log(&self) -> MutexGuard<'_, VecDeque<InterceptedCall>> {
        self.trace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- scopes and objects --

    pub fn define_class(&self, name: &str, superclass: Option<ScopeId>) -> Result<ScopeId, CoreError> {
        let id = self.scopes_mut().define_class(name, superclass)?;
        tracing::debug!(scope = %id, name, "class defined");
        Ok(id)
    }

    pub fn define_module(&self, name: &str) -> Result<ScopeId, CoreError> {
        let id = self.scopes_mut().define_module(name)?;
        tracing::debug!(scope = %id, name, "module defined");
        Ok(id)
    }

    pub fn include_module(&self, scope: ScopeId, module: ScopeId) -> Result<(), CoreError> {
        self.scopes_mut().include(scope, module)
    }

    /// Runs `f` with read access to the scope table.
    pub fn with_scopes<R>(&self, f: impl FnOnce(&ScopeTable) -> R) -> R {
        f(&self.scopes())
    }

    pub fn scope_named(&self, name: &str) -> Option<ScopeId> {
        self.scopes().get_by_name(name)
    }

    pub fn scope_name(&self, id: ScopeId) -> String {
        self.scopes().name(id).to_string()
    }

    pub(crate) fn ensure_scope(&self, id: ScopeId) -> Result<(), CoreError> {
        match self.scopes().get(id) {
            Some(_) => Ok(()),
            None => Err(CoreError::ScopeNotFound { id }),
        }
    }

    /// Instantiates `class`.
    pub fn new_object(&self, class: ScopeId) -> Result<Value, CoreError> {
        {
            let scopes = self.scopes();
            let def = scopes.get(class).ok_or(CoreError::ScopeNotFound { id: class })?;
            if def.kind != ScopeKind::Class {
                return Err(CoreError::NotAClass {
                    name: def.name.clone(),
                });
            }
        }
        let id = ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed));
        Ok(Value::Object(ObjectRef { id, class }))
    }

    /// The singleton scope of `receiver`, created on first use. Only objects
    /// and scopes can carry one.
    pub fn singleton_scope(&self, receiver: &Value) -> Result<ScopeId, CoreError> {
        let attachment = attachment_of(receiver).ok_or_else(|| CoreError::NoSingleton {
            type_name: receiver.type_name().to_string(),
        })?;
        self.scopes_mut().singleton_of(attachment)
    }

    /// Runtime class of `value`.
    pub fn class_of(&self, value: &Value) -> ScopeId {
        class_of_in(&self.scopes(), value)
    }

    pub fn ivar_get(&self, receiver: &Value, name: &str) -> Value {
        attachment_of(receiver)
            .and_then(|attachment| {
                self.ivars
                    .get(&attachment)
                    .and_then(|vars| vars.get(name).cloned())
            })
            .unwrap_or(Value::Nil)
    }

    pub fn ivar_set(&self, receiver: &Value, name: &str, value: Value) -> Result<(), CallError> {
        let attachment = attachment_of(receiver).ok_or_else(|| {
            CallError::raised(format!("can't modify frozen {}", receiver.type_name()))
        })?;
        self.ivars
            .entry(attachment)
            .or_default()
            .insert(Symbol::from(name), value);
        Ok(())
    }

    /// Diagnostic form of `value`: strings quoted, symbols prefixed, objects
    /// by class name.
    pub fn inspect(&self, value: &Value) -> String {
        match value {
            Value::Object(obj) => format!("#<{}>", self.scope_name(obj.class)),
            Value::Scope(id) => self.scope_name(*id),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.inspect(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Hash(pairs) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}=>{}", self.inspect(k), self.inspect(v)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            other => other.inspect().unwrap_or_default(),
        }
    }

    // -- members --

    /// Defines (or redefines) a member on `scope`. A pending annotation on
    /// `scope` is consumed and registered for the new member. When `scope`
    /// is the singleton of a class or module, that scope's annotation is
    /// consumed too, so annotations cover class-level members.
    pub fn define_method<F>(
        &self,
        scope: ScopeId,
        name: impl Into<Symbol>,
        visibility: Visibility,
        params: ParamList,
        body: F,
    ) -> Result<MethodDef, CoreError>
    where
        F: Fn(&Runtime, &CallFrame) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.ensure_scope(scope)?;
        let def = MethodDef::new(name.into(), scope, visibility, params);
        self.insert_method(def.clone(), Arc::new(body));
        tracing::debug!(scope = %scope, member = %def.name, %visibility, "member defined");

        let pending = self
            .pending
            .remove(&scope)
            .or_else(|| self.attached_scope(scope).and_then(|owner| self.pending.remove(&owner)));
        if let Some((_, signature)) = pending {
            self.register_signature(scope, def.name.clone(), signature);
        }
        Ok(def)
    }

    /// The class or module `scope` is the singleton of.
    fn attached_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        match self.scopes().get(scope).map(|def| def.kind) {
            Some(ScopeKind::Singleton {
                attached: Attachment::Scope(owner),
            }) => Some(owner),
            _ => None,
        }
    }

    pub(crate) fn insert_method(&self, def: MethodDef, body: MethodBody) {
        self.methods
            .entry(def.owner)
            .or_default()
            .insert(def.name.clone(), MethodEntry { def, body });
    }

    /// Changes the visibility of a member defined directly on `scope`.
    pub fn set_visibility(
        &self,
        scope: ScopeId,
        name: impl Into<Symbol>,
        visibility: Visibility,
    ) -> Result<(), CallError> {
        let name = name.into();
        let updated = self
            .methods
            .get_mut(&scope)
            .and_then(|mut table| {
                table.get_mut(&name).map(|entry| entry.def.visibility = visibility)
            })
            .is_some();
        if !updated {
            return Err(CallError::NoMethod {
                receiver: self.scope_name(scope),
                member: name,
            });
        }
        Ok(())
    }

    /// `true` if instances of `scope` have `name`, whatever its visibility.
    pub fn method_defined(&self, scope: ScopeId, name: &Symbol) -> bool {
        let chain = self.scopes().ancestors(scope);
        chain.into_iter().any(|s| self.own_method(s, name).is_some())
    }

    /// `true` if `receiver` answers `name` publicly.
    pub fn respond_to(&self, receiver: &Value, name: &Symbol) -> bool {
        self.resolve(receiver, name)
            .is_some_and(|resolved| resolved.entry.def.visibility == Visibility::Public)
    }

    fn own_method(&self, scope: ScopeId, name: &Symbol) -> Option<MethodEntry> {
        self.methods
            .get(&scope)
            .and_then(|table| table.get(name).cloned())
    }

    /// Scopes searched for a member of `receiver`, nearest first: singleton
    /// scopes, then the ancestors of its class.
    fn lookup_chain(&self, receiver: &Value) -> Vec<ScopeId> {
        let scopes = self.scopes();
        let mut chain = Vec::new();
        match receiver {
            Value::Object(obj) => {
                chain.extend(scopes.existing_singleton(Attachment::Object(obj.id)));
            }
            Value::Scope(scope) => {
                // Class-level members are inherited along the superclass chain.
                for ancestor in scopes.superclass_chain(*scope) {
                    chain.extend(scopes.existing_singleton(Attachment::Scope(ancestor)));
                }
            }
            _ => {}
        }
        chain.extend(scopes.ancestors(class_of_in(&scopes, receiver)));
        chain
    }

    pub(crate) fn resolve(&self, receiver: &Value, member: &Symbol) -> Option<Resolved> {
        let mut interceptors = Vec::new();
        for scope in self.lookup_chain(receiver) {
            if self
                .layers
                .get(&scope)
                .is_some_and(|layer| layer.contains(member))
            {
                interceptors.push(scope);
            }
            if let Some(entry) = self.own_method(scope, member) {
                return Some(Resolved {
                    entry,
                    interceptors,
                });
            }
        }
        None
    }

    // -- calls --

    /// Public call: private and protected members are not reachable.
    pub fn call(
        &self,
        receiver: &Value,
        member: impl Into<Symbol>,
        args: Args,
    ) -> Result<Value, CallError> {
        self.dispatch(receiver, &member.into(), args, CallMode::External, 0)
    }

    /// Self-call: the receiver calling one of its own members, private ones
    /// included.
    pub fn send(
        &self,
        receiver: &Value,
        member: impl Into<Symbol>,
        args: Args,
    ) -> Result<Value, CallError> {
        self.dispatch(receiver, &member.into(), args, CallMode::SelfSend, 0)
    }

    fn dispatch(
        &self,
        receiver: &Value,
        member: &Symbol,
        args: Args,
        mode: CallMode<'_>,
        depth: usize,
    ) -> Result<Value, CallError> {
        if depth >= self.config.max_call_depth {
            return Err(CallError::DepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        let resolved = self
            .resolve(receiver, member)
            .ok_or_else(|| CallError::NoMethod {
                member: member.clone(),
                receiver: self.inspect(receiver),
            })?;
        self.check_access(&resolved.entry.def, receiver, &mode)?;

        let bound = bind(&resolved.entry.def.params, &args).map_err(|source| CallError::Bind {
            member: member.clone(),
            source,
        })?;
        let frame = CallFrame {
            receiver: receiver.clone(),
            member: member.clone(),
            args: bound,
            depth: depth + 1,
        };

        if resolved.interceptors.is_empty() {
            (resolved.entry.body)(self, &frame)
        } else {
            intercept::invoke_checked(self, &resolved, &frame)
        }
    }

    fn check_access(&self, def: &MethodDef, receiver: &Value, mode: &CallMode<'_>) -> Result<(), CallError> {
        let allowed = match (def.visibility, mode) {
            (Visibility::Public, _) | (_, CallMode::SelfSend) => true,
            (Visibility::Protected, CallMode::Nested { caller }) => {
                self.is_instance_of(caller, def.owner)
            }
            _ => false,
        };
        if allowed {
            return Ok(());
        }
        Err(CallError::Inaccessible {
            member: def.name.clone(),
            visibility: def.visibility,
            receiver: self.inspect(receiver),
        })
    }

    // -- matching and tracing --

    /// A matcher over this runtime, bounded by `max_match_depth`.
    pub fn matcher(&self) -> Matcher<'_, Self> {
        Matcher::new(self).with_max_depth(self.config.max_match_depth)
    }

    /// Recorded checked calls, oldest first. At most
    /// [`RuntimeConfig::trace_capacity`] entries are kept.
    pub fn trace(&self) -> Vec<InterceptedCall> {
        self.trace_log().iter().cloned().collect()
    }

    pub fn clear_trace(&self) {
        self.trace_log().clear();
    }

    pub(crate) fn record(&self, call: InterceptedCall) {
        let capacity = self.config.trace_capacity;
        if capacity == 0 {
            return;
        }
        let mut log = self.trace_log();
        while log.len() >= capacity {
            log.pop_front();
        }
        log.push_back(call);
    }
}

impl TypeEnvironment for Runtime {
    fn is_instance_of(&self, value: &Value, scope: ScopeId) -> bool {
        let scopes = self.scopes();
        // Same singleton walk as `lookup_chain`: a class is an instance of
        // its superclasses' singletons too.
        let in_singleton = match value {
            Value::Object(obj) => scopes.existing_singleton(Attachment::Object(obj.id)) == Some(scope),
            Value::Scope(id) => scopes
                .superclass_chain(*id)
                .into_iter()
                .any(|ancestor| scopes.existing_singleton(Attachment::Scope(ancestor)) == Some(scope)),
            _ => false,
        };
        in_singleton || scopes.is_subtype(class_of_in(&scopes, value), scope)
    }

    fn responds_to(&self, value: &Value, member: &Symbol) -> bool {
        self.respond_to(value, member)
    }

    fn text_of(&self, value: &Value) -> Option<String> {
        match value {
            Value::Object(_) | Value::Scope(_) | Value::Array(_) | Value::Hash(_) => {
                Some(self.inspect(value))
            }
            other => other.to_text(),
        }
    }
}

fn attachment_of(value: &Value) -> Option<Attachment> {
    match value {
        Value::Object(obj) => Some(Attachment::Object(obj.id)),
        Value::Scope(id) => Some(Attachment::Scope(*id)),
        _ => None,
    }
}

fn class_of_in(scopes: &ScopeTable, value: &Value) -> ScopeId {
    match value {
        Value::Nil => ScopeId::NIL_CLASS,
        Value::Bool(true) => ScopeId::TRUE_CLASS,
        Value::Bool(false) => ScopeId::FALSE_CLASS,
        Value::Int(_) => ScopeId::INTEGER,
        Value::Float(_) => ScopeId::FLOAT,
        Value::Str(_) => ScopeId::STRING,
        Value::Symbol(_) => ScopeId::SYMBOL,
        Value::Array(_) => ScopeId::ARRAY,
        Value::Hash(_) => ScopeId::HASH,
        Value::Object(obj) => obj.class,
        Value::Scope(id) => match scopes.get(*id).map(|def| def.kind) {
            Some(ScopeKind::Class) => ScopeId::CLASS,
            _ => ScopeId::MODULE,
        },
    }
}
