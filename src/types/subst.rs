//! Substitution through compound types and the instantiation engine.
//!
//! [`InstCtx`] bundles the mutable state instantiation needs: the type
//! arena, the instantiation cache, the registry, and the dependents table.
//! The checker constructs one per call site.
//!
//! Substitution is identity-free for ordinary types: a fresh value is
//! allocated if and only if some descendant changed. A replacement value
//! that is itself a type parameter is *not* substituted; such a binding is
//! an inherited parameter that the enclosing generic will fill in later.

use super::registry::{usage_key, Dependents, GenericRegistry, InstanceCache};
use super::{
    ConcreteNamedData, ConcreteSigData, Method, NamedData, Param, PartialData, SigData,
    StructData, Type, TypeArena, TypeId, TypeMap,
};

/// Reconciliation is a fixpoint; runaway growth here means a broken
/// invariant, not a bigger input.
const MAX_RECONCILE_ROUNDS: usize = 64;

pub struct InstCtx<'a> {
    pub arena: &'a mut TypeArena,
    pub cache: &'a mut InstanceCache,
    pub registry: &'a mut GenericRegistry,
    pub dependents: &'a mut Dependents,
    /// Declaration key of the innermost generic declaration being checked;
    /// partials created while it is set become its dependents.
    pub current_key: Option<String>,
}

impl InstCtx<'_> {
    /// Replace every type parameter in `root` that `map` binds to a
    /// non-parameter type.
    pub fn replace_types(&mut self, root: TypeId, map: &TypeMap) -> TypeId {
        match self.arena.get(root).clone() {
            Type::TypeParam(name) => match map.get(&name) {
                Some(&replacement) if !self.arena.is_type_param(replacement) => replacement,
                _ => root,
            },
            Type::Pointer(base) => {
                let new_base = self.replace_types(base, map);
                if new_base == base {
                    root
                } else {
                    self.arena.alloc(Type::Pointer(new_base))
                }
            }
            Type::Slice(elem) => {
                let new_elem = self.replace_types(elem, map);
                if new_elem == elem {
                    root
                } else {
                    self.arena.alloc(Type::Slice(new_elem))
                }
            }
            Type::Array { len, elem } => {
                let new_elem = self.replace_types(elem, map);
                if new_elem == elem {
                    root
                } else {
                    self.arena.alloc(Type::Array {
                        len,
                        elem: new_elem,
                    })
                }
            }
            Type::Chan { dir, elem } => {
                let new_elem = self.replace_types(elem, map);
                if new_elem == elem {
                    root
                } else {
                    self.arena.alloc(Type::Chan {
                        dir,
                        elem: new_elem,
                    })
                }
            }
            Type::Map { key, elem } => {
                let new_key = self.replace_types(key, map);
                let new_elem = self.replace_types(elem, map);
                if new_key == key && new_elem == elem {
                    root
                } else {
                    self.arena.alloc(Type::Map {
                        key: new_key,
                        elem: new_elem,
                    })
                }
            }
            Type::Struct(data) => {
                let new_data = self.replace_in_struct(&data, map);
                if new_data == data {
                    root
                } else {
                    self.arena.alloc(Type::Struct(new_data))
                }
            }
            Type::Tuple(elems) => {
                let new_elems: Vec<TypeId> =
                    elems.iter().map(|&e| self.replace_types(e, map)).collect();
                if new_elems == elems {
                    root
                } else {
                    self.arena.alloc(Type::Tuple(new_elems))
                }
            }
            Type::Signature(sig) => {
                let new_sig = self.replace_in_signature(&sig, map);
                if new_sig == sig {
                    root
                } else {
                    self.arena.alloc(Type::Signature(new_sig))
                }
            }
            Type::Named(data) => {
                let new_underlying = self.replace_types(data.underlying, map);
                if new_underlying == data.underlying {
                    root
                } else {
                    self.arena.alloc(Type::Named(NamedData {
                        underlying: new_underlying,
                        ..data
                    }))
                }
            }
            Type::GenericNamed(g) => {
                // A bare generic inside a substituted type: drive
                // instantiation with the bindings the map provides, leaving
                // the rest as parameters.
                let sub = self.restrict_map(&g.params, map);
                if sub.values().all(|&v| self.arena.is_type_param(v)) {
                    return root;
                }
                self.instantiate(root, sub)
            }
            Type::GenericSignature(g) => {
                let sub = self.restrict_map(&g.params, map);
                if sub.values().all(|&v| self.arena.is_type_param(v)) {
                    return root;
                }
                self.instantiate(root, sub)
            }
            Type::PartialNamed(p) | Type::PartialSignature(p) => {
                // Merge the incoming bindings into the stored map and
                // re-drive instantiation.
                let remapped = self.remap(&p.type_map, map);
                self.instantiate(p.parent, remapped)
            }
            // Concrete instantiations are already fully substituted.
            Type::ConcreteNamed(_) | Type::ConcreteSignature(_) => root,
            Type::Invalid | Type::Basic(_) | Type::Interface => root,
        }
    }

    /// Central instantiation: bind `map` over the parameters of the generic
    /// `parent` and produce a partial or concrete instantiation.
    ///
    /// A partial parent contributes its stored bindings first, with `map`
    /// overwriting. `map` must bind every remaining parameter (possibly to
    /// parameters of an enclosing scope); arity is the caller's
    /// responsibility.
    pub fn instantiate(&mut self, parent: TypeId, map: TypeMap) -> TypeId {
        let (parent, map) = match self.arena.get(parent).clone() {
            Type::PartialNamed(p) | Type::PartialSignature(p) => {
                let mut merged = p.type_map.clone();
                for (key, value) in map {
                    merged.insert(key, value);
                }
                (p.parent, merged)
            }
            _ => (parent, map),
        };
        // A binding to a partial instantiation is still parameter-bearing:
        // the enclosing generic completes it later.
        let is_partial = map
            .values()
            .any(|&v| self.arena.is_type_param(v) || self.arena.is_partial(v));
        let parent_ty = self.arena.get(parent).clone();

        if is_partial {
            let data = PartialData {
                parent,
                type_map: map,
            };
            let id = match &parent_ty {
                Type::GenericNamed(_) => self.arena.alloc(Type::PartialNamed(data)),
                Type::GenericSignature(_) => self.arena.alloc(Type::PartialSignature(data)),
                other => panic!(
                    "internal error: cannot instantiate non-generic type {:?}",
                    std::mem::discriminant(other)
                ),
            };
            if let Some(key) = self.current_key.clone() {
                self.dependents.entry(key).or_default().push(id);
            }
            return id;
        }

        let key = usage_key(self.arena, &map);
        if let Some(&cached) = self.cache.get(&(parent, key.clone())) {
            return cached;
        }

        match parent_ty {
            Type::GenericNamed(g) => {
                // Place the shell in the cache before substituting so
                // self-referential definitions terminate.
                let invalid = self.arena.invalid();
                let shell = ConcreteNamedData {
                    parent,
                    type_map: map.clone(),
                    named: NamedData {
                        name: g.named.name.clone(),
                        pkg: g.named.pkg.clone(),
                        underlying: invalid,
                        methods: Vec::new(),
                    },
                };
                let id = self.arena.alloc(Type::ConcreteNamed(shell));
                self.cache.insert((parent, key.clone()), id);

                let new_underlying = self.replace_types(g.named.underlying, &map);
                if let Type::ConcreteNamed(data) = self.arena.get_mut(id) {
                    data.named.underlying = new_underlying;
                }
                let new_methods = self.replace_in_methods(&g.named.methods, &map);
                if let Type::ConcreteNamed(data) = self.arena.get_mut(id) {
                    data.named.methods = new_methods;
                }
                self.registry.record_usage(&g.named.name, key, id);
                id
            }
            Type::GenericSignature(g) => {
                let new_sig = self.replace_in_signature(&g.sig, &map);
                let id = self.arena.alloc(Type::ConcreteSignature(ConcreteSigData {
                    parent,
                    type_map: map,
                    sig: new_sig,
                }));
                self.cache.insert((parent, key.clone()), id);
                self.registry.record_usage(&g.decl_key, key, id);
                id
            }
            other => panic!(
                "internal error: cannot instantiate non-generic type {:?}",
                std::mem::discriminant(&other)
            ),
        }
    }

    /// Bindings for `params` taken from `map`; parameters `map` does not
    /// mention stay bound to themselves.
    fn restrict_map(&mut self, params: &[String], map: &TypeMap) -> TypeMap {
        let mut sub = TypeMap::new();
        for param in params {
            let value = match map.get(param) {
                Some(&v) => v,
                None => self.arena.alloc(Type::TypeParam(param.clone())),
            };
            sub.insert(param.clone(), value);
        }
        sub
    }

    /// Compose a stored partial map with incoming bindings: every stored
    /// value that is a parameter bound by `incoming` takes the incoming
    /// value; nested partial values are re-driven recursively; everything
    /// else is kept.
    fn remap(&mut self, stored: &TypeMap, incoming: &TypeMap) -> TypeMap {
        let mut result = TypeMap::new();
        for (key, &value) in stored {
            let new_value = match self.arena.get(value).clone() {
                Type::TypeParam(name) => incoming.get(&name).copied().unwrap_or(value),
                Type::PartialNamed(_) | Type::PartialSignature(_) => {
                    self.replace_types(value, incoming)
                }
                _ => value,
            };
            result.insert(key.clone(), new_value);
        }
        result
    }

    fn replace_in_struct(&mut self, data: &StructData, map: &TypeMap) -> StructData {
        StructData {
            fields: data
                .fields
                .iter()
                .map(|f| Param {
                    name: f.name.clone(),
                    typ: self.replace_types(f.typ, map),
                })
                .collect(),
            tags: data.tags.clone(),
        }
    }

    pub fn replace_in_signature(&mut self, sig: &SigData, map: &TypeMap) -> SigData {
        let recv = sig.recv.as_ref().map(|r| {
            // A receiver that is already concrete is left alone.
            let base = self.arena.deref(r.typ);
            if self.arena.is_concrete_instance(base) {
                r.clone()
            } else {
                Param {
                    name: r.name.clone(),
                    typ: self.replace_types(r.typ, map),
                }
            }
        });
        SigData {
            recv,
            params: sig
                .params
                .iter()
                .map(|p| Param {
                    name: p.name.clone(),
                    typ: self.replace_types(p.typ, map),
                })
                .collect(),
            results: sig
                .results
                .iter()
                .map(|r| Param {
                    name: r.name.clone(),
                    typ: self.replace_types(r.typ, map),
                })
                .collect(),
            variadic: sig.variadic,
        }
    }

    /// Substitute a concrete named type's method set.
    fn replace_in_methods(&mut self, methods: &[Method], map: &TypeMap) -> Vec<Method> {
        let mut out = Vec::with_capacity(methods.len());
        for method in methods {
            match self.arena.get(method.typ).clone() {
                Type::Signature(sig) => {
                    let method_map = self.method_type_map(&sig, map);
                    let new_sig = self.replace_in_signature(&sig, &method_map);
                    let typ = self.arena.alloc(Type::Signature(new_sig));
                    out.push(Method {
                        name: method.name.clone(),
                        typ,
                    });
                }
                Type::GenericSignature(g) => {
                    // A method that is itself generic: bind the receiver's
                    // arguments now, keep its own parameters open, and
                    // record the partial for later completion.
                    let mut method_map = self.method_type_map(&g.sig, map);
                    for param in &g.params {
                        let tp = self.arena.alloc(Type::TypeParam(param.clone()));
                        method_map.insert(param.clone(), tp);
                    }
                    let data = PartialData {
                        parent: method.typ,
                        type_map: method_map,
                    };
                    let partial = self.arena.alloc(Type::PartialSignature(data));
                    self.dependents
                        .entry(g.decl_key.clone())
                        .or_default()
                        .push(partial);
                    out.push(Method {
                        name: method.name.clone(),
                        typ: partial,
                    });
                }
                other => panic!(
                    "internal error: unexpected method type {:?}",
                    std::mem::discriminant(&other)
                ),
            }
        }
        out
    }

    /// Build a method-local substitution: copy `map`, then remap each
    /// receiver type parameter to the corresponding bound value. Receivers
    /// may rename the declared parameters, so the mapping goes through the
    /// receiver's own type map.
    fn method_type_map(&self, sig: &SigData, map: &TypeMap) -> TypeMap {
        let recv = match &sig.recv {
            Some(recv) => self.arena.deref(recv.typ),
            None => return map.clone(),
        };
        let recv_map = match self.arena.type_map(recv) {
            Some(m) => m.clone(),
            None => return map.clone(),
        };
        if self.arena.type_params(recv).is_empty() {
            return map.clone();
        }
        let mut result = map.clone();
        for (declared, &bound) in &recv_map {
            if let Type::TypeParam(local) = self.arena.get(bound) {
                if let Some(&value) = map.get(declared) {
                    result.insert(local.clone(), value);
                }
            }
        }
        result
    }
}

/// Re-drive every recorded dependent under every concrete usage of its
/// enclosing declaration. Closes the loop for generics mentioned only
/// inside the body (or signature) of another generic.
pub fn reconcile_dependents(
    arena: &mut TypeArena,
    cache: &mut InstanceCache,
    registry: &mut GenericRegistry,
    dependents: &mut Dependents,
) {
    for _ in 0..MAX_RECONCILE_ROUNDS {
        let before_usages = registry.total_usages();
        let before_dependents: usize = dependents.values().map(Vec::len).sum();

        let snapshot: Vec<(String, Vec<TypeId>)> = dependents
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, partials) in snapshot {
            let usages: Vec<TypeMap> = match registry.get(&key) {
                Some(decl) => decl
                    .usages
                    .values()
                    .filter_map(|&id| arena.type_map(id).cloned())
                    .collect(),
                None => continue,
            };
            for partial in partials {
                for usage in &usages {
                    let mut ctx = InstCtx {
                        arena,
                        cache,
                        registry,
                        dependents,
                        current_key: None,
                    };
                    ctx.replace_types(partial, usage);
                }
            }
        }

        let after_dependents: usize = dependents.values().map(Vec::len).sum();
        if registry.total_usages() == before_usages && after_dependents == before_dependents {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BasicKind, GenericNamedData, GenericSigData};

    struct Fixture {
        arena: TypeArena,
        cache: InstanceCache,
        registry: GenericRegistry,
        dependents: Dependents,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                arena: TypeArena::new(),
                cache: InstanceCache::new(),
                registry: GenericRegistry::new(),
                dependents: Dependents::new(),
            }
        }

        fn ctx(&mut self) -> InstCtx<'_> {
            InstCtx {
                arena: &mut self.arena,
                cache: &mut self.cache,
                registry: &mut self.registry,
                dependents: &mut self.dependents,
                current_key: None,
            }
        }

        /// `type Box[T] struct { val T }`
        fn generic_box(&mut self) -> TypeId {
            let tp = self.arena.alloc(Type::TypeParam("T".to_string()));
            let underlying = self.arena.alloc(Type::Struct(StructData {
                fields: vec![Param {
                    name: "val".to_string(),
                    typ: tp,
                }],
                tags: vec![None],
            }));
            let generic = self.arena.alloc(Type::GenericNamed(GenericNamedData {
                named: NamedData {
                    name: "Box".to_string(),
                    pkg: None,
                    underlying,
                    methods: Vec::new(),
                },
                params: vec!["T".to_string()],
            }));
            self.registry.add_decl(
                "Box".to_string(),
                "Box".to_string(),
                generic,
                vec!["T".to_string()],
            );
            generic
        }
    }

    fn single_map(param: &str, typ: TypeId) -> TypeMap {
        let mut map = TypeMap::new();
        map.insert(param.to_string(), typ);
        map
    }

    #[test]
    fn test_substitute_through_compounds() {
        let mut fx = Fixture::new();
        let tp = fx.arena.alloc(Type::TypeParam("T".to_string()));
        let slice = fx.arena.alloc(Type::Slice(tp));
        let ptr = fx.arena.alloc(Type::Pointer(slice));
        let int = fx.arena.basic(BasicKind::Int);
        let map = single_map("T", int);

        let result = fx.ctx().replace_types(ptr, &map);
        assert_eq!(fx.arena.display(result), "*[]int");
    }

    #[test]
    fn test_substitution_is_identity_free() {
        let mut fx = Fixture::new();
        let int = fx.arena.basic(BasicKind::Int);
        let slice = fx.arena.alloc(Type::Slice(int));
        let map = single_map("T", fx.arena.basic(BasicKind::Str));

        // No descendant mentions T, so the very same handle comes back.
        let result = fx.ctx().replace_types(slice, &map);
        assert_eq!(result, slice);
    }

    #[test]
    fn test_param_to_param_binding_is_skipped() {
        let mut fx = Fixture::new();
        let t = fx.arena.alloc(Type::TypeParam("T".to_string()));
        let u = fx.arena.alloc(Type::TypeParam("U".to_string()));
        let map = single_map("T", u);

        // Binding T to another parameter leaves T in place; the enclosing
        // generic will fill it in later.
        let result = fx.ctx().replace_types(t, &map);
        assert_eq!(result, t);
    }

    #[test]
    fn test_concrete_instantiation_and_cache() {
        let mut fx = Fixture::new();
        let generic = fx.generic_box();
        let int = fx.arena.basic(BasicKind::Int);

        let first = fx.ctx().instantiate(generic, single_map("T", int));
        let second = fx.ctx().instantiate(generic, single_map("T", int));
        assert_eq!(first, second);
        assert_eq!(fx.arena.display(first), "Box[int]");
        let underlying = fx.arena.underlying(first);
        assert_eq!(fx.arena.display(underlying), "struct{val int}");
        assert_eq!(fx.registry.get("Box").unwrap().usages.len(), 1);
    }

    #[test]
    fn test_partial_instantiation_records_dependent() {
        let mut fx = Fixture::new();
        let generic = fx.generic_box();
        let outer_param = fx.arena.alloc(Type::TypeParam("U".to_string()));

        let mut ctx = fx.ctx();
        ctx.current_key = Some("Outer".to_string());
        let partial = ctx.instantiate(generic, single_map("T", outer_param));
        assert!(fx.arena.is_partial(partial));
        assert_eq!(fx.dependents.get("Outer").unwrap().len(), 1);
        assert_eq!(fx.registry.get("Box").unwrap().usages.len(), 0);
    }

    #[test]
    fn test_partial_completion_through_remap() {
        let mut fx = Fixture::new();
        let generic = fx.generic_box();
        let outer_param = fx.arena.alloc(Type::TypeParam("U".to_string()));
        let partial = fx.ctx().instantiate(generic, single_map("T", outer_param));

        let string = fx.arena.basic(BasicKind::Str);
        let completed = fx.ctx().replace_types(partial, &single_map("U", string));
        assert!(fx.arena.is_concrete_instance(completed));
        assert_eq!(fx.arena.display(completed), "Box[string]");
        assert_eq!(fx.registry.get("Box").unwrap().usages.len(), 1);
    }

    #[test]
    fn test_self_referential_type_terminates() {
        // type List[T] struct { next *List[T]; val T }
        let mut fx = Fixture::new();
        let tp = fx.arena.alloc(Type::TypeParam("T".to_string()));
        let generic = fx.arena.alloc(Type::GenericNamed(GenericNamedData {
            named: NamedData {
                name: "List".to_string(),
                pkg: None,
                underlying: fx.arena.invalid(),
                methods: Vec::new(),
            },
            params: vec!["T".to_string()],
        }));
        fx.registry.add_decl(
            "List".to_string(),
            "List".to_string(),
            generic,
            vec!["T".to_string()],
        );
        let self_partial = fx.arena.alloc(Type::PartialNamed(PartialData {
            parent: generic,
            type_map: single_map("T", tp),
        }));
        let next_ptr = fx.arena.alloc(Type::Pointer(self_partial));
        let underlying = fx.arena.alloc(Type::Struct(StructData {
            fields: vec![
                Param {
                    name: "next".to_string(),
                    typ: next_ptr,
                },
                Param {
                    name: "val".to_string(),
                    typ: tp,
                },
            ],
            tags: vec![None, None],
        }));
        if let Type::GenericNamed(g) = fx.arena.get_mut(generic) {
            g.named.underlying = underlying;
        }

        let int = fx.arena.basic(BasicKind::Int);
        let conc = fx.ctx().instantiate(generic, single_map("T", int));
        assert!(fx.arena.is_concrete_instance(conc));
        // The recursive reference resolved to the same instantiation.
        let under = fx.arena.underlying(conc);
        if let Type::Struct(data) = fx.arena.get(under) {
            let next = data.fields[0].typ;
            if let Type::Pointer(base) = fx.arena.get(next) {
                assert_eq!(*base, conc);
            } else {
                panic!("expected pointer field");
            }
        } else {
            panic!("expected struct underlying");
        }
    }

    #[test]
    fn test_reconcile_completes_dependents() {
        let mut fx = Fixture::new();
        let generic = fx.generic_box();

        // A generic function Outer[U] whose body mentions Box[U].
        let sig = SigData {
            recv: None,
            params: Vec::new(),
            results: Vec::new(),
            variadic: false,
        };
        let outer = fx.arena.alloc(Type::GenericSignature(GenericSigData {
            sig,
            params: vec!["U".to_string()],
            recv_params: Vec::new(),
            decl_key: "Outer".to_string(),
        }));
        fx.registry.add_decl(
            "Outer".to_string(),
            "Outer".to_string(),
            outer,
            vec!["U".to_string()],
        );

        let outer_param = fx.arena.alloc(Type::TypeParam("U".to_string()));
        let mut ctx = fx.ctx();
        ctx.current_key = Some("Outer".to_string());
        ctx.instantiate(generic, single_map("T", outer_param));

        // Now Outer gets used at int.
        let int = fx.arena.basic(BasicKind::Int);
        fx.ctx().instantiate(outer, single_map("U", int));
        assert_eq!(fx.registry.get("Box").unwrap().usages.len(), 0);

        reconcile_dependents(
            &mut fx.arena,
            &mut fx.cache,
            &mut fx.registry,
            &mut fx.dependents,
        );
        let box_decl = fx.registry.get("Box").unwrap();
        assert_eq!(box_decl.usages.len(), 1);
        let (key, _) = box_decl.usages.iter().next().unwrap();
        assert_eq!(key, "int");
    }
}
