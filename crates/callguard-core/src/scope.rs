//! Scopes (classes, modules, singleton scopes) and the [`ScopeTable`].
//!
//! Every member is owned by a scope. The table pre-registers the built-in
//! hierarchy on construction and answers ancestry questions: which scopes
//! does a class inherit from or include, and is one scope a subtype of
//! another.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{ObjectId, ScopeId};

/// What a singleton scope is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attachment {
    Scope(ScopeId),
    Object(ObjectId),
}

/// The kind of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    Class,
    Module,
    /// Per-receiver scope holding singleton members.
    Singleton { attached: Attachment },
}

/// A single scope definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeDef {
    pub id: ScopeId,
    pub name: String,
    pub kind: ScopeKind,
    /// Parent class, `None` for `BasicObject`, modules and singleton scopes.
    pub superclass: Option<ScopeId>,
    /// Included modules in inclusion order.
    pub includes: Vec<ScopeId>,
}

/// Pre-registered ScopeId constants for built-in scopes.
impl ScopeId {
    pub const BASIC_OBJECT: ScopeId = ScopeId(0);
    pub const OBJECT: ScopeId = ScopeId(1);
    pub const MODULE: ScopeId = ScopeId(2);
    pub const CLASS: ScopeId = ScopeId(3);
    pub const KERNEL: ScopeId = ScopeId(4);
    pub const COMPARABLE: ScopeId = ScopeId(5);
    pub const BOOLEAN: ScopeId = ScopeId(6);
    pub const NUMERIC: ScopeId = ScopeId(7);
    pub const INTEGER: ScopeId = ScopeId(8);
    pub const FLOAT: ScopeId = ScopeId(9);
    pub const STRING: ScopeId = ScopeId(10);
    pub const SYMBOL: ScopeId = ScopeId(11);
    pub const ARRAY: ScopeId = ScopeId(12);
    pub const HASH: ScopeId = ScopeId(13);
    pub const NIL_CLASS: ScopeId = ScopeId(14);
    pub const TRUE_CLASS: ScopeId = ScopeId(15);
    pub const FALSE_CLASS: ScopeId = ScopeId(16);
}

/// Registry of all scopes, providing identity via [`ScopeId`] and ancestry
/// queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeTable {
    /// Scopes indexed by ScopeId.0
    scopes: Vec<ScopeDef>,
    /// Named lookup for classes and modules
    names: HashMap<String, ScopeId>,
    /// Lazily created singleton scopes
    #[serde(skip)]
    singletons: HashMap<Attachment, ScopeId>,
}

impl ScopeTable {
    /// Number of built-in scopes pre-registered on construction.
    pub const BUILTIN_COUNT: u32 = 17;

    /// Creates a table with the built-in hierarchy:
    ///
    /// - `BasicObject` <- `Object` (includes `Kernel`) <- `Module` <- `Class`
    /// - `Object` <- `Numeric` (includes `Comparable`) <- `Integer`, `Float`
    /// - `Object` <- `String` (includes `Comparable`), `Symbol`, `Array`, `Hash`,
    ///   `NilClass`
    /// - `Object` <- `TrueClass`, `FalseClass` (both include `Boolean`)
    pub fn new() -> Self {
        let mut table = ScopeTable {
            scopes: Vec::new(),
            names: HashMap::new(),
            singletons: HashMap::new(),
        };

        let builtins: [(&str, ScopeKind, Option<ScopeId>, &[ScopeId]); 17] = [
            ("BasicObject", ScopeKind::Class, None, &[]),
            ("Object", ScopeKind::Class, Some(ScopeId::BASIC_OBJECT), &[ScopeId::KERNEL]),
            ("Module", ScopeKind::Class, Some(ScopeId::OBJECT), &[]),
            ("Class", ScopeKind::Class, Some(ScopeId::MODULE), &[]),
            ("Kernel", ScopeKind::Module, None, &[]),
            ("Comparable", ScopeKind::Module, None, &[]),
            ("Boolean", ScopeKind::Module, None, &[]),
            ("Numeric", ScopeKind::Class, Some(ScopeId::OBJECT), &[ScopeId::COMPARABLE]),
            ("Integer", ScopeKind::Class, Some(ScopeId::NUMERIC), &[]),
            ("Float", ScopeKind::Class, Some(ScopeId::NUMERIC), &[]),
            ("String", ScopeKind::Class, Some(ScopeId::OBJECT), &[ScopeId::COMPARABLE]),
            ("Symbol", ScopeKind::Class, Some(ScopeId::OBJECT), &[]),
            ("Array", ScopeKind::Class, Some(ScopeId::OBJECT), &[]),
            ("Hash", ScopeKind::Class, Some(ScopeId::OBJECT), &[]),
            ("NilClass", ScopeKind::Class, Some(ScopeId::OBJECT), &[]),
            ("TrueClass", ScopeKind::Class, Some(ScopeId::OBJECT), &[ScopeId::BOOLEAN]),
            ("FalseClass", ScopeKind::Class, Some(ScopeId::OBJECT), &[ScopeId::BOOLEAN]),
        ];

        for (name, kind, superclass, includes) in builtins {
            table.push(name.to_string(), kind, superclass, includes.to_vec());
        }
        table
    }

    fn push(
        &mut self,
        name: String,
        kind: ScopeKind,
        superclass: Option<ScopeId>,
        includes: Vec<ScopeId>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        if !matches!(kind, ScopeKind::Singleton { .. }) {
            self.names.insert(name.clone(), id);
        }
        self.scopes.push(ScopeDef {
            id,
            name,
            kind,
            superclass,
            includes,
        });
        id
    }

    /// Defines a new class. `superclass` defaults to `Object`.
    pub fn define_class(
        &mut self,
        name: &str,
        superclass: Option<ScopeId>,
    ) -> Result<ScopeId, CoreError> {
        self.ensure_unique(name)?;
        let parent = superclass.unwrap_or(ScopeId::OBJECT);
        let parent_def = self.try_get(parent)?;
        if parent_def.kind != ScopeKind::Class {
            return Err(CoreError::InvalidSuperclass {
                name: parent_def.name.clone(),
            });
        }
        Ok(self.push(name.to_string(), ScopeKind::Class, Some(parent), Vec::new()))
    }

    /// Defines a new module.
    pub fn define_module(&mut self, name: &str) -> Result<ScopeId, CoreError> {
        self.ensure_unique(name)?;
        Ok(self.push(name.to_string(), ScopeKind::Module, None, Vec::new()))
    }

    fn ensure_unique(&self, name: &str) -> Result<(), CoreError> {
        if self.names.contains_key(name) {
            return Err(CoreError::DuplicateScopeName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Includes `module` into `scope`. Including the same module twice is a
    /// no-op.
    pub fn include(&mut self, scope: ScopeId, module: ScopeId) -> Result<(), CoreError> {
        let module_def = self.try_get(module)?;
        if module_def.kind != ScopeKind::Module {
            return Err(CoreError::NotAModule {
                name: module_def.name.clone(),
            });
        }
        let def = self
            .scopes
            .get_mut(scope.0 as usize)
            .ok_or(CoreError::ScopeNotFound { id: scope })?;
        if !def.includes.contains(&module) {
            def.includes.push(module);
        }
        Ok(())
    }

    /// Returns the singleton scope attached to `attachment`, creating it on
    /// first use.
    pub fn singleton_of(&mut self, attachment: Attachment) -> Result<ScopeId, CoreError> {
        if let Some(id) = self.singletons.get(&attachment) {
            return Ok(*id);
        }
        let name = match attachment {
            Attachment::Scope(scope) => format!("#<Class:{}>", self.try_get(scope)?.name),
            Attachment::Object(object) => format!("#<Class:#<Object:{}>>", object),
        };
        let id = self.push(name, ScopeKind::Singleton { attached: attachment }, None, Vec::new());
        self.singletons.insert(attachment, id);
        Ok(id)
    }

    /// Returns the singleton scope for `attachment` if one was created.
    pub fn existing_singleton(&self, attachment: Attachment) -> Option<ScopeId> {
        self.singletons.get(&attachment).copied()
    }

    /// Looks up a scope by its [`ScopeId`].
    pub fn get(&self, id: ScopeId) -> Option<&ScopeDef> {
        self.scopes.get(id.0 as usize)
    }

    fn try_get(&self, id: ScopeId) -> Result<&ScopeDef, CoreError> {
        self.get(id).ok_or(CoreError::ScopeNotFound { id })
    }

    /// Looks up a class or module by name.
    pub fn get_by_name(&self, name: &str) -> Option<ScopeId> {
        self.names.get(name).copied()
    }

    /// Name of a scope, or `"?"` for unknown ids.
    pub fn name(&self, id: ScopeId) -> &str {
        self.get(id).map(|d| d.name.as_str()).unwrap_or("?")
    }

    /// Method resolution order of a scope: the scope itself, its included
    /// modules (most recently included first), then the same for each
    /// superclass.
    pub fn ancestors(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut order = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(def) = self.get(id) else { break };
            order.push(id);
            for module in def.includes.iter().rev() {
                self.push_module(*module, &mut order);
            }
            current = def.superclass;
        }
        order
    }

    fn push_module(&self, module: ScopeId, order: &mut Vec<ScopeId>) {
        if order.contains(&module) {
            return;
        }
        order.push(module);
        if let Some(def) = self.get(module) {
            for nested in def.includes.iter().rev() {
                self.push_module(*nested, order);
            }
        }
    }

    /// Superclass chain of a class, starting with the class itself. Modules
    /// yield only themselves.
    pub fn superclass_chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(def) = self.get(id) else { break };
            chain.push(id);
            current = def.superclass;
        }
        chain
    }

    /// `true` if `sub` is `sup`, inherits from it, or includes it.
    pub fn is_subtype(&self, sub: ScopeId, sup: ScopeId) -> bool {
        sub == sup || self.ancestors(sub).contains(&sup)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_has_builtin_scopes() {
        let table = ScopeTable::new();
        assert_eq!(table.len(), ScopeTable::BUILTIN_COUNT as usize);
        assert_eq!(table.get_by_name("Integer"), Some(ScopeId::INTEGER));
        assert_eq!(table.get_by_name("Boolean"), Some(ScopeId::BOOLEAN));
        assert_eq!(table.name(ScopeId::FALSE_CLASS), "FalseClass");
    }

    #[test]
    fn integer_ancestry() {
        let table = ScopeTable::new();
        assert_eq!(
            table.ancestors(ScopeId::INTEGER),
            vec![
                ScopeId::INTEGER,
                ScopeId::NUMERIC,
                ScopeId::COMPARABLE,
                ScopeId::OBJECT,
                ScopeId::KERNEL,
                ScopeId::BASIC_OBJECT,
            ]
        );
        assert!(table.is_subtype(ScopeId::INTEGER, ScopeId::NUMERIC));
        assert!(table.is_subtype(ScopeId::INTEGER, ScopeId::COMPARABLE));
        assert!(!table.is_subtype(ScopeId::INTEGER, ScopeId::FLOAT));
    }

    #[test]
    fn booleans_include_boolean_module() {
        let table = ScopeTable::new();
        assert!(table.is_subtype(ScopeId::TRUE_CLASS, ScopeId::BOOLEAN));
        assert!(table.is_subtype(ScopeId::FALSE_CLASS, ScopeId::BOOLEAN));
        assert!(!table.is_subtype(ScopeId::NIL_CLASS, ScopeId::BOOLEAN));
    }

    #[test]
    fn define_class_defaults_to_object() {
        let mut table = ScopeTable::new();
        let id = table.define_class("Point", None).unwrap();
        assert_eq!(id, ScopeId(ScopeTable::BUILTIN_COUNT));
        assert_eq!(table.get(id).unwrap().superclass, Some(ScopeId::OBJECT));
        assert!(table.is_subtype(id, ScopeId::BASIC_OBJECT));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut table = ScopeTable::new();
        table.define_class("Point", None).unwrap();
        let err = table.define_module("Point").unwrap_err();
        assert_eq!(
            err,
            CoreError::DuplicateScopeName {
                name: "Point".into()
            }
        );
    }

    #[test]
    fn superclass_must_be_class() {
        let mut table = ScopeTable::new();
        let err = table.define_class("Bad", Some(ScopeId::KERNEL)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSuperclass { .. }));
    }

    #[test]
    fn include_requires_module() {
        let mut table = ScopeTable::new();
        let point = table.define_class("Point", None).unwrap();
        let err = table.include(point, ScopeId::STRING).unwrap_err();
        assert!(matches!(err, CoreError::NotAModule { .. }));

        let greet = table.define_module("Greet").unwrap();
        table.include(point, greet).unwrap();
        table.include(point, greet).unwrap();
        assert_eq!(table.get(point).unwrap().includes, vec![greet]);
        assert!(table.is_subtype(point, greet));
    }

    #[test]
    fn singleton_scopes_are_created_once() {
        let mut table = ScopeTable::new();
        let point = table.define_class("Point", None).unwrap();
        assert_eq!(table.existing_singleton(Attachment::Scope(point)), None);

        let s1 = table.singleton_of(Attachment::Scope(point)).unwrap();
        let s2 = table.singleton_of(Attachment::Scope(point)).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(table.name(s1), "#<Class:Point>");
        // Singleton scopes are not reachable by name.
        assert_eq!(table.get_by_name("#<Class:Point>"), None);
    }

    #[test]
    fn superclass_chain_skips_modules() {
        let mut table = ScopeTable::new();
        let base = table.define_class("Base", None).unwrap();
        let derived = table.define_class("Derived", Some(base)).unwrap();
        assert_eq!(
            table.superclass_chain(derived),
            vec![derived, base, ScopeId::OBJECT, ScopeId::BASIC_OBJECT]
        );
    }
}
