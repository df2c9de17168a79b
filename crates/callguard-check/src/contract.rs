//! Contract API on top of the runtime.
//!
//! Registration compiles a raw specification, stores the result in the
//! registry and lists the member in the scope's interception layer. It can
//! happen before or after the member is defined.
//!
//! - [`Runtime::rtype`] contracts an instance member of a scope.
//! - [`Runtime::rtype_self`] contracts a class-level member.
//! - [`Runtime::rtype_on`] dispatches on the receiver kind (scope or object).
//! - [`Runtime::annotate`] holds a contract for the next member defined.
//! - [`Runtime::typed_reader`] and friends define contracted accessors.
//! - [`Runtime::member_info`] reports what a resolved member is checked by.

use std::sync::Arc;

use callguard_core::{CoreError, ParamList, ScopeId, Symbol, Value, Visibility};

use crate::runtime::Runtime;
use crate::signature::{compile, CompiledSignature, RawTerm, SignatureError};

/// Errors from the contract API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("names contain an empty name")]
    MissingName,

    #[error("unknown scope: ScopeId({id})", id = id.0)]
    UnknownScope { id: ScopeId },

    #[error("{receiver} is not a class or module")]
    NotAScope { receiver: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// What checks a resolved member.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: Symbol,
    /// Scope that defines the body.
    pub owner: ScopeId,
    pub visibility: Visibility,
    /// Whether any interception layer on the resolution path lists the member.
    pub typed: bool,
    /// Nearest contract applying to the member.
    pub signature: Option<Arc<CompiledSignature>>,
}

impl MemberInfo {
    pub fn argument_type(&self) -> Option<String> {
        self.signature.as_ref().map(|s| s.argument_type())
    }

    pub fn return_type(&self) -> Option<String> {
        self.signature.as_ref().map(|s| s.return_type())
    }

    pub fn info(&self) -> Option<String> {
        self.signature.as_ref().map(|s| s.info())
    }
}

impl Runtime {
    /// Compiles `raw`, stores it for `(scope, member)` and installs
    /// interception. Replaces any earlier contract for the same key.
    pub fn compile_and_register(
        &self,
        scope: ScopeId,
        member: impl Into<Symbol>,
        raw: &RawTerm,
    ) -> Result<Arc<CompiledSignature>, SignatureError> {
        let signature = Arc::new(compile(raw)?);
        self.register_signature(scope, member.into(), Arc::clone(&signature));
        Ok(signature)
    }

    pub(crate) fn register_signature(
        &self,
        scope: ScopeId,
        member: Symbol,
        signature: Arc<CompiledSignature>,
    ) {
        let replaced = self
            .registry()
            .register(self.id(), scope, member.clone(), Arc::clone(&signature))
            .is_some();
        tracing::debug!(scope = %scope, member = %member, %signature, replaced, "contract registered");
        self.install_interception(scope, member);
    }

    /// `true` if `(scope, member)` has a contract.
    pub fn is_checked(&self, scope: ScopeId, member: &Symbol) -> bool {
        self.registry().contains(self.id(), scope, member)
    }

    pub fn signature_of(&self, scope: ScopeId, member: &Symbol) -> Option<Arc<CompiledSignature>> {
        self.registry().lookup(self.id(), scope, member)
    }

    /// Contracts instance member `member` of `scope`.
    pub fn rtype(
        &self,
        scope: ScopeId,
        member: impl Into<Symbol>,
        raw: &RawTerm,
    ) -> Result<Arc<CompiledSignature>, ContractError> {
        self.ensure_scope(scope)
            .map_err(|_| ContractError::UnknownScope { id: scope })?;
        Ok(self.compile_and_register(scope, member, raw)?)
    }

    /// Contracts class-level member `member` of `scope`.
    pub fn rtype_self(
        &self,
        scope: ScopeId,
        member: impl Into<Symbol>,
        raw: &RawTerm,
    ) -> Result<Arc<CompiledSignature>, ContractError> {
        self.ensure_scope(scope)
            .map_err(|_| ContractError::UnknownScope { id: scope })?;
        // Validate before creating the singleton scope.
        let signature = Arc::new(compile(raw)?);
        let meta = self.singleton_scope(&Value::Scope(scope))?;
        self.register_signature(meta, member.into(), Arc::clone(&signature));
        Ok(signature)
    }

    /// Contracts `member` for `receiver`: an instance member when `receiver`
    /// is a scope, a singleton member of the object otherwise.
    pub fn rtype_on(
        &self,
        receiver: &Value,
        member: impl Into<Symbol>,
        raw: &RawTerm,
    ) -> Result<Arc<CompiledSignature>, ContractError> {
        match receiver {
            Value::Scope(scope) => self.rtype(*scope, member, raw),
            _ => {
                let signature = Arc::new(compile(raw)?);
                let meta = self.singleton_scope(receiver)?;
                self.register_signature(meta, member.into(), Arc::clone(&signature));
                Ok(signature)
            }
        }
    }

    /// Validates `raw` now and keeps it for the next member defined on
    /// `receiver`. A second annotation before that definition replaces the
    /// first.
    pub fn annotate(&self, receiver: &Value, raw: &RawTerm) -> Result<(), ContractError> {
        let Value::Scope(scope) = receiver else {
            return Err(ContractError::NotAScope {
                receiver: self.inspect(receiver),
            });
        };
        self.ensure_scope(*scope)
            .map_err(|_| ContractError::UnknownScope { id: *scope })?;
        let signature = Arc::new(compile(raw)?);
        tracing::debug!(scope = %scope, %signature, "annotation pending");
        self.pending.insert(*scope, signature);
        Ok(())
    }

    /// `true` if an annotation on `scope` is waiting for a definition.
    pub fn has_pending_annotation(&self, scope: ScopeId) -> bool {
        self.pending.contains_key(&scope)
    }

    // -- typed accessors --

    /// Defines instance-variable readers for `names` where missing and
    /// contracts them `[] => behavior`.
    pub fn typed_reader(&self, scope: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        self.ensure_scope(scope)
            .map_err(|_| ContractError::UnknownScope { id: scope })?;
        self.define_typed_readers(scope, names, behavior)
    }

    /// Defines instance-variable writers `name=` for `names` where missing and
    /// contracts them `[behavior] => Any`.
    pub fn typed_writer(&self, scope: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        self.ensure_scope(scope)
            .map_err(|_| ContractError::UnknownScope { id: scope })?;
        self.define_typed_writers(scope, names, behavior)
    }

    pub fn typed_accessor(&self, scope: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        self.typed_reader(scope, names, behavior)?;
        self.typed_writer(scope, names, behavior)
    }

    /// Class-level variants: accessors backed by the scope's own variables.
    pub fn typed_reader_self(&self, scope: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        let meta = self.singleton_of_known(scope)?;
        self.define_typed_readers(meta, names, behavior)
    }

    pub fn typed_writer_self(&self, scope: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        let meta = self.singleton_of_known(scope)?;
        self.define_typed_writers(meta, names, behavior)
    }

    pub fn typed_accessor_self(&self, scope: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        self.typed_reader_self(scope, names, behavior)?;
        self.typed_writer_self(scope, names, behavior)
    }

    fn singleton_of_known(&self, scope: ScopeId) -> Result<ScopeId, ContractError> {
        self.ensure_scope(scope)
            .map_err(|_| ContractError::UnknownScope { id: scope })?;
        Ok(self.singleton_scope(&Value::Scope(scope))?)
    }

    fn define_typed_readers(&self, owner: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        check_names(names)?;
        let raw = RawTerm::spec(RawTerm::List(Vec::new()), behavior.clone());
        let signature = Arc::new(compile(&raw)?);
        for name in names {
            let member = Symbol::from(*name);
            if !self.method_defined(owner, &member) {
                let var = name.to_string();
                self.define_method(owner, member.clone(), Visibility::Public, ParamList::new(), move |rt, frame| {
                    Ok(rt.ivar_get(&frame.receiver, &var))
                })?;
            }
            self.register_signature(owner, member, Arc::clone(&signature));
        }
        Ok(())
    }

    fn define_typed_writers(&self, owner: ScopeId, names: &[&str], behavior: &RawTerm) -> Result<(), ContractError> {
        check_names(names)?;
        let raw = RawTerm::spec(RawTerm::List(vec![behavior.clone()]), RawTerm::Any);
        let signature = Arc::new(compile(&raw)?);
        for name in names {
            let member = Symbol::from(*name).setter();
            if !self.method_defined(owner, &member) {
                let var = name.to_string();
                let params = ParamList::new().required("value");
                self.define_method(owner, member.clone(), Visibility::Public, params, move |rt, frame| {
                    let value = frame.arg(0);
                    rt.ivar_set(&frame.receiver, &var, value.clone())?;
                    Ok(value)
                })?;
            }
            self.register_signature(owner, member, Arc::clone(&signature));
        }
        Ok(())
    }

    // -- introspection --

    /// Resolves `member` on `receiver` and reports the contract it runs
    /// under. `None` if the receiver has no such member.
    pub fn member_info(&self, receiver: &Value, member: impl Into<Symbol>) -> Option<MemberInfo> {
        let member = member.into();
        let resolved = self.resolve(receiver, &member)?;
        let signature = resolved
            .interceptors
            .iter()
            .find_map(|scope| self.registry().lookup(self.id(), *scope, &member));
        Some(MemberInfo {
            name: member,
            owner: resolved.entry.def.owner,
            visibility: resolved.entry.def.visibility,
            typed: signature.is_some(),
            signature,
        })
    }
}

fn check_names(names: &[&str]) -> Result<(), ContractError> {
    if names.iter().any(|name| name.is_empty()) {
        return Err(ContractError::MissingName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use callguard_core::Args;

    use super::*;
    use crate::runtime::CallError;

    fn spec(rt: &Runtime, text: &str) -> RawTerm {
        rt.parse_spec(text).unwrap()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn rtype_registers_and_reports() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        assert!(!rt.is_checked(c, &"run".into()));

        let sig = rt.rtype(c, "run", &spec(&rt, "[Integer] => Any")).unwrap();
        assert!(rt.is_checked(c, &"run".into()));
        assert_eq!(sig.info(), "[Integer] => Any");
        assert!(Arc::ptr_eq(&rt.signature_of(c, &"run".into()).unwrap(), &sig));
    }

    #[test]
    fn rtype_rejects_unknown_scope_and_bad_specs() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        assert_eq!(
            rt.rtype(ScopeId(999), "run", &RawTerm::Any).unwrap_err(),
            ContractError::UnknownScope { id: ScopeId(999) }
        );
        let err = rt.rtype(c, "run", &spec(&rt, "[nil] => Any")).unwrap_err();
        assert!(matches!(err, ContractError::Signature(SignatureError::AbsentInArguments { .. })));
        assert!(!rt.is_checked(c, &"run".into()));
        assert!(rt.interception_layer(c).is_none());
    }

    #[test]
    fn rtype_self_checks_class_members() {
        let rt = Runtime::new();
        let c = rt.define_class("Factory", None).unwrap();
        let meta = rt.singleton_scope(&Value::Scope(c)).unwrap();
        rt.define_method(meta, "build", Visibility::Public, ParamList::new().required("n"), |_, f| {
            Ok(f.arg(0))
        })
        .unwrap();
        rt.rtype_self(c, "build", &spec(&rt, "[Integer] => Integer")).unwrap();

        let class = Value::Scope(c);
        assert_eq!(rt.call(&class, "build", Args::new().arg(2)).unwrap(), Value::Int(2));
        assert!(rt.call(&class, "build", Args::new().arg("2")).unwrap_err().is_argument_type());
        assert!(rt.is_checked(meta, &"build".into()));
        assert!(!rt.is_checked(c, &"build".into()));
    }

    #[test]
    fn rtype_on_single_object() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        rt.define_method(c, "id", Visibility::Public, ParamList::new().required("x"), |_, f| Ok(f.arg(0)))
            .unwrap();
        let special = rt.new_object(c).unwrap();
        let plain = rt.new_object(c).unwrap();

        rt.rtype_on(&special, "id", &spec(&rt, "[String] => Any")).unwrap();
        assert!(rt.call(&special, "id", Args::new().arg(1)).is_err());
        assert!(rt.call(&plain, "id", Args::new().arg(1)).is_ok());
        assert!(rt.rtype_on(&Value::Int(1), "id", &RawTerm::spec(RawTerm::List(vec![]), RawTerm::Any)).is_err());
    }

    // -----------------------------------------------------------------------
    // Annotation mode
    // -----------------------------------------------------------------------

    #[test]
    fn annotation_applies_to_next_definition_only() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        rt.annotate(&Value::Scope(c), &spec(&rt, "[Integer] => Any")).unwrap();
        assert!(rt.has_pending_annotation(c));

        rt.define_method(c, "first", Visibility::Public, ParamList::new().required("x"), |_, f| Ok(f.arg(0)))
            .unwrap();
        rt.define_method(c, "second", Visibility::Public, ParamList::new().required("x"), |_, f| Ok(f.arg(0)))
            .unwrap();

        assert!(!rt.has_pending_annotation(c));
        assert!(rt.is_checked(c, &"first".into()));
        assert!(!rt.is_checked(c, &"second".into()));

        let obj = rt.new_object(c).unwrap();
        assert!(rt.call(&obj, "first", Args::new().arg("x")).is_err());
        assert!(rt.call(&obj, "second", Args::new().arg("x")).is_ok());
    }

    #[test]
    fn annotation_covers_class_level_members() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        let meta = rt.singleton_scope(&Value::Scope(c)).unwrap();
        rt.annotate(&Value::Scope(c), &spec(&rt, "[Integer] => Any")).unwrap();

        rt.define_method(meta, "build", Visibility::Public, ParamList::new().required("x"), |_, f| Ok(f.arg(0)))
            .unwrap();
        assert!(!rt.has_pending_annotation(c));
        assert!(rt.is_checked(meta, &"build".into()));
        assert!(rt.call(&Value::Scope(c), "build", Args::new().arg("x")).unwrap_err().is_argument_type());

        rt.define_method(c, "unrelated", Visibility::Public, ParamList::new().required("x"), |_, f| Ok(f.arg(0)))
            .unwrap();
        let obj = rt.new_object(c).unwrap();
        assert_eq!(rt.call(&obj, "unrelated", Args::new().arg("x")).unwrap(), Value::from("x"));
    }

    #[test]
    fn annotation_is_validated_eagerly() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        assert!(rt.annotate(&Value::Scope(c), &RawTerm::Int(1)).is_err());
        assert!(!rt.has_pending_annotation(c));
        assert!(matches!(
            rt.annotate(&Value::Int(1), &RawTerm::Any),
            Err(ContractError::NotAScope { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    #[test]
    fn typed_accessor_round_trip() {
        let rt = Runtime::new();
        let c = rt.define_class("Person", None).unwrap();
        rt.typed_accessor(c, &["name", "nick"], &spec(&rt, "String")).unwrap();
        let p = rt.new_object(c).unwrap();

        assert_eq!(rt.call(&p, "name=", Args::new().arg("Ann")).unwrap(), Value::from("Ann"));
        assert_eq!(rt.call(&p, "name", Args::new()).unwrap(), Value::from("Ann"));

        let err = rt.call(&p, "name=", Args::new().arg(1)).unwrap_err();
        assert!(err.is_argument_type());
        // Unset variable reads nil, which is not a String.
        let err = rt.call(&p, "nick", Args::new()).unwrap_err();
        assert!(matches!(err, CallError::ReturnType(_)));
    }

    #[test]
    fn typed_reader_keeps_existing_definition() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        rt.define_method(c, "size", Visibility::Public, ParamList::new(), |_, _| Ok(Value::Int(3)))
            .unwrap();
        rt.typed_reader(c, &["size"], &spec(&rt, "Integer")).unwrap();

        let obj = rt.new_object(c).unwrap();
        assert_eq!(rt.call(&obj, "size", Args::new()).unwrap(), Value::Int(3));
        assert!(rt.is_checked(c, &"size".into()));
    }

    #[test]
    fn typed_accessor_errors() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        assert_eq!(
            rt.typed_reader(c, &["ok", ""], &RawTerm::Any).unwrap_err(),
            ContractError::MissingName
        );
        assert!(!rt.method_defined(c, &"ok".into()));
        // nil is valid as a reader's return but not as a writer's argument.
        assert!(rt.typed_reader(c, &["a"], &RawTerm::Nil).is_ok());
        assert!(rt.typed_writer(c, &["a"], &RawTerm::Nil).is_err());
    }

    #[test]
    fn typed_accessor_self_uses_class_variables() {
        let rt = Runtime::new();
        let c = rt.define_class("Config", None).unwrap();
        rt.typed_accessor_self(c, &["level"], &spec(&rt, "Integer")).unwrap();
        let class = Value::Scope(c);

        rt.call(&class, "level=", Args::new().arg(3)).unwrap();
        assert_eq!(rt.call(&class, "level", Args::new()).unwrap(), Value::Int(3));
        assert!(rt.call(&class, "level=", Args::new().arg("high")).is_err());
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    #[test]
    fn member_info_reports_contract() {
        let rt = Runtime::new();
        let c = rt.define_class("C", None).unwrap();
        rt.define_method(c, "typed", Visibility::Public, ParamList::new().required("a"), |_, f| Ok(f.arg(0)))
            .unwrap();
        rt.define_method(c, "plain", Visibility::Public, ParamList::new(), |_, _| Ok(Value::Nil))
            .unwrap();
        rt.rtype(c, "typed", &spec(&rt, "[Integer] => Any")).unwrap();
        let obj = rt.new_object(c).unwrap();

        let info = rt.member_info(&obj, "typed").unwrap();
        assert!(info.typed);
        assert_eq!(info.owner, c);
        assert_eq!(info.argument_type().as_deref(), Some("[Integer]"));
        assert_eq!(info.return_type().as_deref(), Some("Any"));
        assert_eq!(info.info().as_deref(), Some("[Integer] => Any"));

        let info = rt.member_info(&obj, "plain").unwrap();
        assert!(!info.typed);
        assert!(info.info().is_none());
        assert!(rt.member_info(&obj, "missing").is_none());
    }
}
