//! Per-package bookkeeping for generic declarations and their usages.
//!
//! The checker populates a [`GenericRegistry`] while elaborating a package;
//! after checking it is read-only and consumed by the transformer. The
//! [`InstanceCache`] dedupes concrete instantiations across the checker's
//! internal recursions and is keyed by (generic parent, usage key); entries
//! are inserted *before* recursive substitution so self-referential types
//! terminate.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::{TypeArena, TypeId, TypeMap};

/// Instantiation cache: (generic parent, usage key) → concrete type.
pub type InstanceCache = HashMap<(TypeId, String), TypeId>;

/// Partial instantiations recorded against an enclosing generic
/// declaration, to be completed when that declaration is instantiated
/// concretely. Keyed by declaration key.
pub type Dependents = BTreeMap<String, Vec<TypeId>>;

/// One generic declaration and every concrete usage recorded for it.
#[derive(Debug, Clone)]
pub struct GenericDecl {
    pub name: String,
    pub typ: TypeId,
    /// Declared parameter names in declaration order (mangling order).
    pub params: Vec<String>,
    /// Usage key → concrete instantiation.
    pub usages: BTreeMap<String, TypeId>,
}

#[derive(Debug, Default)]
pub struct GenericRegistry {
    pub decls: BTreeMap<String, GenericDecl>,
}

impl GenericRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_decl(&mut self, key: String, name: String, typ: TypeId, params: Vec<String>) {
        self.decls.insert(
            key,
            GenericDecl {
                name,
                typ,
                params,
                usages: BTreeMap::new(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&GenericDecl> {
        self.decls.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.decls.contains_key(key)
    }

    /// Record a fully concrete usage. A missing declaration entry is an
    /// internal invariant violation, not a user error.
    pub fn record_usage(&mut self, key: &str, usage_key: String, concrete: TypeId) {
        let decl = self
            .decls
            .get_mut(key)
            .unwrap_or_else(|| panic!("internal error: declaration not found for generic {}", key));
        decl.usages.insert(usage_key, concrete);
    }

    /// Whether any declaration's method part matches `method` (used when
    /// upgrading ambiguous selector instantiations).
    pub fn has_method_decl(&self, method: &str) -> bool {
        self.decls
            .keys()
            .any(|key| key.split_once('.').is_some_and(|(_, m)| m == method))
    }

    pub fn total_usages(&self) -> usize {
        self.decls.values().map(|d| d.usages.len()).sum()
    }

    pub fn summary(&self, arena: &TypeArena) -> RegistrySummary {
        RegistrySummary {
            decls: self
                .decls
                .iter()
                .map(|(key, decl)| DeclSummary {
                    key: key.clone(),
                    name: decl.name.clone(),
                    params: decl.params.clone(),
                    usages: decl
                        .usages
                        .iter()
                        .map(|(ukey, id)| UsageSummary {
                            key: ukey.clone(),
                            typ: arena.display(*id),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// A deterministic key for a particular usage, derived from its type
/// arguments: bindings sorted by parameter name, each bound type's
/// canonical string, joined with `;`. Another usage with type-equivalent
/// arguments produces the same key.
pub fn usage_key(arena: &TypeArena, type_map: &TypeMap) -> String {
    // BTreeMap iteration is already sorted by parameter name.
    let parts: Vec<String> = type_map.values().map(|id| arena.display(*id)).collect();
    parts.join(";")
}

/// Registry declaration key: the object name for free generics,
/// `Receiver.Method` for generic methods.
pub fn decl_key(recv: Option<&str>, name: &str) -> String {
    match recv {
        Some(recv) => format!("{}.{}", recv, name),
        None => name.to_string(),
    }
}

/// Serializable registry snapshot for tooling (`--emit-registry`).
#[derive(Debug, Serialize)]
pub struct RegistrySummary {
    pub decls: Vec<DeclSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeclSummary {
    pub key: String,
    pub name: String,
    pub params: Vec<String>,
    pub usages: Vec<UsageSummary>,
}

#[derive(Debug, Serialize)]
pub struct UsageSummary {
    pub key: String,
    pub typ: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicKind;

    #[test]
    fn test_usage_key_sorted_by_param_name() {
        let arena = TypeArena::new();
        let mut map = TypeMap::new();
        map.insert("U".to_string(), arena.basic(BasicKind::Int));
        map.insert("T".to_string(), arena.basic(BasicKind::Str));
        // T sorts before U regardless of insertion order.
        assert_eq!(usage_key(&arena, &map), "string;int");
    }

    #[test]
    fn test_decl_key_forms() {
        assert_eq!(decl_key(None, "Print"), "Print");
        assert_eq!(decl_key(Some("A"), "f2"), "A.f2");
    }

    #[test]
    fn test_record_usage_and_totals() {
        let arena = TypeArena::new();
        let mut registry = GenericRegistry::new();
        registry.add_decl(
            "Box".to_string(),
            "Box".to_string(),
            arena.invalid(),
            vec!["T".to_string()],
        );
        registry.record_usage("Box", "int".to_string(), arena.basic(BasicKind::Int));
        registry.record_usage("Box", "int".to_string(), arena.basic(BasicKind::Int));
        registry.record_usage("Box", "string".to_string(), arena.basic(BasicKind::Str));
        assert_eq!(registry.total_usages(), 2);
    }

    #[test]
    #[should_panic(expected = "declaration not found")]
    fn test_missing_decl_is_internal_error() {
        let arena = TypeArena::new();
        let mut registry = GenericRegistry::new();
        registry.record_usage("Ghost", "int".to_string(), arena.invalid());
    }

    #[test]
    fn test_method_decl_lookup() {
        let arena = TypeArena::new();
        let mut registry = GenericRegistry::new();
        registry.add_decl(
            "A.f2".to_string(),
            "f2".to_string(),
            arena.invalid(),
            vec!["U".to_string(), "V".to_string()],
        );
        assert!(registry.has_method_decl("f2"));
        assert!(!registry.has_method_decl("f3"));
    }
}
