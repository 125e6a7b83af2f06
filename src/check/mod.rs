//! The generics-aware type checker.
//!
//! A conventional two-pass elaborator: package-level objects are collected
//! first, then declarations are checked in source order (lazily forcing
//! forward references), with function bodies last. The generics extension
//! adds type parameters as first-class types, instantiation at use sites,
//! the per-package generic registry, and the array-versus-type-parameter
//! repair for `type A[N] E`.
//!
//! Errors are collected on a diagnostic list; affected subtrees get the
//! `Invalid` type and checking continues. The checker never mutates the
//! syntax tree.

pub mod scope;

mod expr;

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ast::{Decl, DeclTok, Expr, Field, File, FuncDecl, Ident, Span, Spec};
use crate::importer::{Importer, Package};
use crate::types::registry::{decl_key, Dependents, GenericRegistry, InstanceCache};
use crate::types::subst::{reconcile_dependents, InstCtx};
use crate::types::{
    BasicKind, GenericNamedData, GenericSigData, Method, NamedData, Param, SigData, Type,
    TypeArena, TypeId, TypeMap,
};

use scope::{Builtin, ObjId, ObjKind, Object, ScopeTree};

/// A collected checker diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}: {}", self.span.start, self.message)
    }
}

/// Result of checking one file: the type arena, the generic registry, and
/// any diagnostics. The registry is read-only from here on.
#[derive(Debug)]
pub struct Checked {
    pub pkg_name: String,
    pub arena: TypeArena,
    pub registry: GenericRegistry,
    pub diagnostics: Vec<Diagnostic>,
}

impl Checked {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Check a single-file package.
pub fn check_file(file: &File, importer: &mut dyn Importer) -> Checked {
    let mut checker = Checker::new(file, importer);
    checker.run();
    Checked {
        pkg_name: file.package.name.clone(),
        arena: checker.arena,
        registry: checker.registry,
        diagnostics: checker.diagnostics,
    }
}

#[derive(Debug, Clone, Copy)]
enum PkgDeclRef {
    Type { di: usize, si: usize },
    Value { di: usize, si: usize },
    Func { di: usize },
}

pub(crate) struct Checker<'a> {
    file: &'a File,
    importer: &'a mut dyn Importer,
    pub(crate) arena: TypeArena,
    cache: InstanceCache,
    registry: GenericRegistry,
    dependents: Dependents,
    pub(crate) scopes: ScopeTree,
    pkg_scope: usize,
    file_scope: usize,
    pub(crate) current: usize,
    diagnostics: Vec<Diagnostic>,
    current_key: Option<String>,
    obj_decls: HashMap<String, PkgDeclRef>,
    in_progress: HashSet<String>,
    checked_specs: HashSet<(usize, usize)>,
    methods: HashMap<String, Vec<usize>>,
    imports: HashMap<String, Package>,
}

impl<'a> Checker<'a> {
    fn new(file: &'a File, importer: &'a mut dyn Importer) -> Self {
        let mut arena = TypeArena::new();
        let mut scopes = ScopeTree::new();
        let universe = scopes.new_scope(None);
        setup_universe(&mut scopes, &mut arena, universe);
        let pkg_scope = scopes.new_scope(Some(universe));
        let file_scope = scopes.new_scope(Some(pkg_scope));
        Self {
            file,
            importer,
            arena,
            cache: InstanceCache::new(),
            registry: GenericRegistry::new(),
            dependents: Dependents::new(),
            scopes,
            pkg_scope,
            file_scope,
            current: file_scope,
            diagnostics: Vec::new(),
            current_key: None,
            obj_decls: HashMap::new(),
            in_progress: HashSet::new(),
            checked_specs: HashSet::new(),
            methods: HashMap::new(),
            imports: HashMap::new(),
        }
    }

    pub(crate) fn errorf(&mut self, span: Span, message: String) {
        self.diagnostics.push(Diagnostic { span, message });
    }

    pub(crate) fn inst(&mut self) -> InstCtx<'_> {
        InstCtx {
            arena: &mut self.arena,
            cache: &mut self.cache,
            registry: &mut self.registry,
            dependents: &mut self.dependents,
            current_key: self.current_key.clone(),
        }
    }

    fn run(&mut self) {
        self.collect();
        self.check_decls();
        self.check_orphan_methods();
        self.check_bodies();
        reconcile_dependents(
            &mut self.arena,
            &mut self.cache,
            &mut self.registry,
            &mut self.dependents,
        );
    }

    // --- collection pass ---

    fn collect(&mut self) {
        let file = self.file;
        for (di, decl) in file.decls.iter().enumerate() {
            match decl {
                Decl::Gen(g) => match g.tok {
                    DeclTok::Import => {
                        for spec in &g.specs {
                            if let Spec::Import { name, path, span } = spec {
                                self.collect_import(name.as_ref(), &path.value, *span);
                            }
                        }
                    }
                    DeclTok::Const | DeclTok::Var => {
                        let kind = if g.tok == DeclTok::Const {
                            ObjKind::Const
                        } else {
                            ObjKind::Var
                        };
                        for (si, spec) in g.specs.iter().enumerate() {
                            if let Spec::Value { names, .. } = spec {
                                for name in names {
                                    self.declare_pkg_level(
                                        name,
                                        kind.clone(),
                                        PkgDeclRef::Value { di, si },
                                    );
                                }
                            }
                        }
                    }
                    DeclTok::Type => {
                        for (si, spec) in g.specs.iter().enumerate() {
                            if let Spec::Type { name, .. } = spec {
                                self.declare_pkg_level(
                                    name,
                                    ObjKind::TypeName,
                                    PkgDeclRef::Type { di, si },
                                );
                            }
                        }
                    }
                },
                Decl::Func(f) => match &f.recv {
                    None => {
                        self.declare_pkg_level(&f.name, ObjKind::Func, PkgDeclRef::Func { di })
                    }
                    Some(recv) => match receiver_base_name(recv) {
                        Some(base) => self.methods.entry(base).or_default().push(di),
                        None => self.errorf(
                            recv.span,
                            "unsupported receiver type expression".to_string(),
                        ),
                    },
                },
                Decl::Bad(_) => {}
            }
        }
    }

    fn collect_import(&mut self, name: Option<&Ident>, quoted: &str, span: Span) {
        let path = quoted.trim_matches('"').trim_matches('`').to_string();
        let pkg = match self.importer.import(&path, &mut self.arena) {
            Ok(pkg) => pkg,
            Err(err) => {
                self.errorf(span, format!("could not import {}: {}", path, err));
                return;
            }
        };
        let local = name.map(|n| n.name.clone()).unwrap_or_else(|| pkg.name.clone());
        self.imports.insert(path.clone(), pkg);
        let mut obj = Object::new(local, ObjKind::Pkg, span);
        obj.import_path = Some(path);
        if let Err(existing) = self.scopes.insert(self.file_scope, obj) {
            let prev = self.scopes.obj(existing).name.clone();
            self.errorf(span, format!("{} redeclared in this block", prev));
        }
    }

    fn declare_pkg_level(&mut self, name: &Ident, kind: ObjKind, decl_ref: PkgDeclRef) {
        if name.name != "_" {
            self.obj_decls.insert(name.name.clone(), decl_ref);
        }
        let obj = Object::new(name.name.clone(), kind, name.span);
        if let Err(_existing) = self.scopes.insert(self.pkg_scope, obj) {
            self.errorf(
                name.span,
                format!("{} redeclared in this block", name.name),
            );
        }
    }

    // --- declaration pass ---

    fn check_decls(&mut self) {
        let file = self.file;
        for (di, decl) in file.decls.iter().enumerate() {
            match decl {
                Decl::Gen(g) => match g.tok {
                    DeclTok::Const | DeclTok::Var => {
                        for si in 0..g.specs.len() {
                            self.check_value_spec(di, si);
                        }
                    }
                    DeclTok::Type => {
                        for spec in &g.specs {
                            if let Spec::Type { name, .. } = spec {
                                self.force(&name.name);
                            }
                        }
                    }
                    DeclTok::Import => {}
                },
                Decl::Func(f) => {
                    if f.recv.is_none() {
                        self.force(&f.name.name);
                    }
                }
                Decl::Bad(_) => {}
            }
        }
    }

    /// Methods whose receiver base never resolved to a declared type.
    fn check_orphan_methods(&mut self) {
        let file = self.file;
        let mut orphans: Vec<(String, Vec<usize>)> = self.methods.drain().collect();
        orphans.sort_by(|a, b| a.0.cmp(&b.0));
        for (base, decl_indices) in orphans {
            for di in decl_indices {
                if let Decl::Func(f) = &file.decls[di] {
                    self.errorf(
                        f.span,
                        format!("invalid receiver type {} (undeclared name)", base),
                    );
                }
            }
        }
    }

    /// Force the package-level object `name` to have a type.
    pub(crate) fn force(&mut self, name: &str) -> TypeId {
        let oid = match self.scopes.lookup_local(self.pkg_scope, name) {
            Some(oid) => oid,
            None => return self.arena.invalid(),
        };
        if let Some(typ) = self.scopes.obj(oid).typ {
            return typ;
        }
        if self.in_progress.contains(name) {
            // A named type installs its shell before elaborating, so
            // reaching here means a genuinely invalid cycle.
            let span = self.scopes.obj(oid).span;
            self.errorf(span, format!("invalid cyclic declaration of {}", name));
            let invalid = self.arena.invalid();
            self.scopes.obj_mut(oid).typ = Some(invalid);
            return invalid;
        }
        let decl_ref = match self.obj_decls.get(name) {
            Some(r) => *r,
            None => return self.arena.invalid(),
        };
        self.in_progress.insert(name.to_string());
        match decl_ref {
            PkgDeclRef::Type { di, si } => self.check_type_spec(di, si, oid),
            PkgDeclRef::Value { di, si } => self.check_value_spec(di, si),
            PkgDeclRef::Func { di } => self.check_func_sig(di, oid),
        }
        self.in_progress.remove(name);
        self.scopes
            .obj(oid)
            .typ
            .unwrap_or_else(|| self.arena.invalid())
    }

    fn check_type_spec(&mut self, di: usize, si: usize, oid: ObjId) {
        let file = self.file;
        let (name, type_params, assign, typ) = match &file.decls[di] {
            Decl::Gen(g) => match &g.specs[si] {
                Spec::Type {
                    name,
                    type_params,
                    assign,
                    typ,
                    ..
                } => (name, type_params, *assign, typ),
                _ => return,
            },
            _ => return,
        };

        // Disambiguate `type A[N] E`: parsed as an array type, but when `N`
        // does not resolve to a declared constant it is a one-parameter
        // type-parameter declaration with underlying `E`.
        let mut params: Vec<Ident> = Vec::new();
        let mut underlying_expr: &Expr = typ;
        if let Some(tp) = type_params {
            params = tp.names.clone();
        } else if let Expr::ArrayType {
            len: Some(len),
            elt,
            ..
        } = typ
        {
            if let Some(len_ident) = len.as_ident() {
                if self.scopes.lookup(self.current, &len_ident.name).is_none() {
                    params = vec![len_ident.clone()];
                    underlying_expr = elt;
                }
            }
        }

        if assign {
            if !params.is_empty() {
                self.errorf(
                    name.span,
                    "generic type aliases are not supported".to_string(),
                );
            }
            let t = self.type_expr(typ);
            self.scopes.obj_mut(oid).typ = Some(t);
            return;
        }

        if params.is_empty() {
            let invalid = self.arena.invalid();
            let shell = self.arena.alloc(Type::Named(NamedData {
                name: name.name.clone(),
                pkg: None,
                underlying: invalid,
                methods: Vec::new(),
            }));
            self.scopes.obj_mut(oid).typ = Some(shell);
            let u = self.type_expr(underlying_expr);
            let chased = self.chase_underlying(u);
            if let Type::Named(data) = self.arena.get_mut(shell) {
                data.underlying = chased;
            }
            let type_name = name.name.clone();
            self.check_methods_for(&type_name, shell);
            return;
        }

        // Generic named type.
        let param_names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
        let invalid = self.arena.invalid();
        let shell = self.arena.alloc(Type::GenericNamed(GenericNamedData {
            named: NamedData {
                name: name.name.clone(),
                pkg: None,
                underlying: invalid,
                methods: Vec::new(),
            },
            params: param_names.clone(),
        }));
        self.scopes.obj_mut(oid).typ = Some(shell);
        self.registry.add_decl(
            name.name.clone(),
            name.name.clone(),
            shell,
            param_names.clone(),
        );

        let saved = self.current;
        self.current = self.scopes.new_scope(Some(saved));
        for param in &params {
            if param.name == name.name {
                self.errorf(
                    param.span,
                    format!(
                        "type parameter {} shadows its enclosing declaration",
                        param.name
                    ),
                );
            }
            let tp = self.arena.alloc(Type::TypeParam(param.name.clone()));
            let obj = Object::new(param.name.clone(), ObjKind::TypeName, param.span).with_type(tp);
            if let Err(_existing) = self.scopes.insert(self.current, obj) {
                self.errorf(
                    param.span,
                    format!("{} redeclared in this block", param.name),
                );
            }
        }
        let u = self.type_expr(underlying_expr);
        self.current = saved;

        let chased = self.chase_underlying(u);
        if matches!(self.arena.get(chased), Type::Interface) {
            self.errorf(
                underlying_expr.span(),
                "generic interface types are not supported".to_string(),
            );
        }
        if let Type::GenericNamed(data) = self.arena.get_mut(shell) {
            data.named.underlying = chased;
        }
        let type_name = name.name.clone();
        self.check_methods_for(&type_name, shell);
    }

    /// Resolve forward chains of named types so the stored underlying type
    /// is always unnamed.
    fn chase_underlying(&self, mut id: TypeId) -> TypeId {
        loop {
            match self.arena.get(id) {
                Type::Named(n) => id = n.underlying,
                _ => return id,
            }
        }
    }

    // --- methods ---

    fn check_methods_for(&mut self, type_name: &str, base: TypeId) {
        let decl_indices = match self.methods.remove(type_name) {
            Some(list) => list,
            None => return,
        };
        let mut member_names: HashSet<String> = HashSet::new();
        let under = self.arena.underlying(base);
        if let Type::Struct(data) = self.arena.get(under) {
            for field in &data.fields {
                member_names.insert(field.name.clone());
            }
        }
        for di in decl_indices {
            self.check_method_sig(di, type_name, base, &mut member_names);
        }
    }

    fn check_method_sig(
        &mut self,
        di: usize,
        type_name: &str,
        base: TypeId,
        member_names: &mut HashSet<String>,
    ) {
        let file = self.file;
        let f = match &file.decls[di] {
            Decl::Func(f) => f,
            _ => return,
        };
        let recv = f.recv.as_ref().expect("method has a receiver");
        let method_name = f.name.name.clone();

        if method_name != "_" && !member_names.insert(method_name.clone()) {
            let is_field = {
                let under = self.arena.underlying(base);
                matches!(self.arena.get(under), Type::Struct(data)
                    if data.fields.iter().any(|fld| fld.name == method_name))
            };
            if is_field {
                self.errorf(
                    f.name.span,
                    format!("field and method with the same name {}", method_name),
                );
            } else {
                self.errorf(
                    f.name.span,
                    format!("method {} already declared for {}", method_name, type_name),
                );
            }
            return;
        }

        let (is_ptr, local_params) = receiver_shape(recv);
        let declared = self.arena.type_params(base);
        let saved = self.current;
        self.current = self.scopes.new_scope(Some(self.file_scope));

        let recv_base = if declared.is_empty() {
            if !local_params.is_empty() {
                self.errorf(
                    recv.span,
                    format!("{} is not a generic type", type_name),
                );
            }
            base
        } else {
            let locals: Vec<Ident> = if local_params.is_empty() {
                declared
                    .iter()
                    .map(|name| Ident::new(name.clone()))
                    .collect()
            } else {
                local_params
            };
            if locals.len() != declared.len() {
                self.errorf(
                    recv.span,
                    format!(
                        "wrong number of type arguments (expected {} but got {})",
                        declared.len(),
                        locals.len()
                    ),
                );
            }
            // Bind each local receiver parameter name to a type parameter
            // carrying the *declared* name, so substitution maps compose
            // across renames.
            let mut map = TypeMap::new();
            for (local, declared_name) in locals.iter().zip(&declared) {
                let tp = self.arena.alloc(Type::TypeParam(declared_name.clone()));
                let obj =
                    Object::new(local.name.clone(), ObjKind::TypeName, local.span).with_type(tp);
                if let Err(_existing) = self.scopes.insert(self.current, obj) {
                    self.errorf(
                        local.span,
                        format!("{} redeclared in this block", local.name),
                    );
                }
                map.insert(declared_name.clone(), tp);
            }
            self.inst().instantiate(base, map)
        };
        let recv_tid = if is_ptr {
            self.arena.alloc(Type::Pointer(recv_base))
        } else {
            recv_base
        };

        let own_params: Vec<String> = f
            .type_params
            .as_ref()
            .map(|tp| tp.names.iter().map(|n| n.name.clone()).collect())
            .unwrap_or_default();
        if let Some(tp) = &f.type_params {
            for param in &tp.names {
                let t = self.arena.alloc(Type::TypeParam(param.name.clone()));
                let obj =
                    Object::new(param.name.clone(), ObjKind::TypeName, param.span).with_type(t);
                let _ = self.scopes.insert(self.current, obj);
            }
        }

        let recv_name = recv
            .names
            .first()
            .map(|n| n.name.clone())
            .unwrap_or_default();
        let mut sig = self.sig_data(&f.typ);
        sig.recv = Some(Param {
            name: recv_name,
            typ: recv_tid,
        });
        self.current = saved;

        let method_tid = if own_params.is_empty() {
            self.arena.alloc(Type::Signature(sig))
        } else {
            let key = decl_key(Some(type_name), &method_name);
            let tid = self.arena.alloc(Type::GenericSignature(GenericSigData {
                sig,
                params: own_params.clone(),
                recv_params: declared.clone(),
                decl_key: key.clone(),
            }));
            self.registry
                .add_decl(key, method_name.clone(), tid, own_params);
            tid
        };

        match self.arena.get_mut(base) {
            Type::Named(data) => data.methods.push(Method {
                name: method_name,
                typ: method_tid,
            }),
            Type::GenericNamed(data) => data.named.methods.push(Method {
                name: method_name,
                typ: method_tid,
            }),
            _ => {}
        }
    }

    // --- functions ---

    fn check_func_sig(&mut self, di: usize, oid: ObjId) {
        let file = self.file;
        let f = match &file.decls[di] {
            Decl::Func(f) => f,
            _ => return,
        };
        let name = f.name.name.clone();
        let saved = self.current;
        self.current = self.scopes.new_scope(Some(self.file_scope));

        let own_params: Vec<String> = f
            .type_params
            .as_ref()
            .map(|tp| tp.names.iter().map(|n| n.name.clone()).collect())
            .unwrap_or_default();
        if let Some(tp) = &f.type_params {
            for param in &tp.names {
                if param.name == name {
                    self.errorf(
                        param.span,
                        format!(
                            "type parameter {} shadows its enclosing declaration",
                            param.name
                        ),
                    );
                }
                let t = self.arena.alloc(Type::TypeParam(param.name.clone()));
                let obj =
                    Object::new(param.name.clone(), ObjKind::TypeName, param.span).with_type(t);
                let _ = self.scopes.insert(self.current, obj);
            }
        }

        let sig = self.sig_data(&f.typ);
        self.current = saved;

        if name == "main" || name == "init" {
            if !sig.params.is_empty() || !sig.results.is_empty() {
                self.errorf(
                    f.span,
                    format!("func {} must have no arguments and no return values", name),
                );
            }
            if !own_params.is_empty() {
                self.errorf(f.span, format!("func {} must have no type parameters", name));
            }
        }

        let tid = if own_params.is_empty() {
            self.arena.alloc(Type::Signature(sig))
        } else {
            let key = decl_key(None, &name);
            let tid = self.arena.alloc(Type::GenericSignature(GenericSigData {
                sig,
                params: own_params.clone(),
                recv_params: Vec::new(),
                decl_key: key.clone(),
            }));
            self.registry.add_decl(key, name.clone(), tid, own_params);
            tid
        };
        self.scopes.obj_mut(oid).typ = Some(tid);
    }

    /// Elaborate a function type in the current scope.
    pub(crate) fn sig_data(&mut self, ft: &crate::ast::FuncType) -> SigData {
        let mut params = Vec::new();
        for field in &ft.params {
            let t = self.type_expr(&field.typ);
            if field.names.is_empty() {
                params.push(Param {
                    name: String::new(),
                    typ: t,
                });
            } else {
                for name in &field.names {
                    params.push(Param {
                        name: name.name.clone(),
                        typ: t,
                    });
                }
            }
        }
        let mut results = Vec::new();
        for field in &ft.results {
            let t = self.type_expr(&field.typ);
            if field.names.is_empty() {
                results.push(Param {
                    name: String::new(),
                    typ: t,
                });
            } else {
                for name in &field.names {
                    results.push(Param {
                        name: name.name.clone(),
                        typ: t,
                    });
                }
            }
        }
        SigData {
            recv: None,
            params,
            results,
            variadic: ft.variadic,
        }
    }

    // --- values ---

    fn check_value_spec(&mut self, di: usize, si: usize) {
        if !self.checked_specs.insert((di, si)) {
            return;
        }
        let file = self.file;
        let (g_tok, names, typ, values) = match &file.decls[di] {
            Decl::Gen(g) => match &g.specs[si] {
                Spec::Value {
                    names, typ, values, ..
                } => (g.tok, names, typ, values),
                _ => return,
            },
            _ => return,
        };
        let is_const = g_tok == DeclTok::Const;

        let annotated = typ.as_ref().map(|t| self.type_expr(t));
        let mut value_types = Vec::with_capacity(values.len());
        for value in values {
            value_types.push(self.expr(value));
        }
        if !values.is_empty() && values.len() != names.len() && values.len() != 1 {
            let span = names.first().map(|n| n.span).unwrap_or_default();
            self.errorf(span, "wrong number of initialization values".to_string());
        }

        for (i, name) in names.iter().enumerate() {
            if name.name == "_" {
                continue;
            }
            let t = annotated.unwrap_or_else(|| {
                value_types
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| self.arena.invalid())
            });
            let t = if is_const { t } else { self.default_type(t) };
            if let Some(oid) = self.scopes.lookup_local(self.pkg_scope, &name.name) {
                self.scopes.obj_mut(oid).typ = Some(t);
                if is_const {
                    if let Some(Expr::BasicLit(lit)) = values.get(i) {
                        if let Ok(v) = parse_int_literal(&lit.value) {
                            self.scopes.obj_mut(oid).const_val = Some(v);
                        }
                    }
                }
            }
        }
    }

    /// The declared type an untyped constant assumes in a variable.
    pub(crate) fn default_type(&self, t: TypeId) -> TypeId {
        match self.arena.get(t) {
            Type::Basic(kind) => {
                let default = match kind {
                    BasicKind::UntypedBool => BasicKind::Bool,
                    BasicKind::UntypedInt => BasicKind::Int,
                    BasicKind::UntypedFloat => BasicKind::Float64,
                    BasicKind::UntypedRune => BasicKind::Rune,
                    BasicKind::UntypedStr => BasicKind::Str,
                    _ => return t,
                };
                self.arena.basic(default)
            }
            _ => t,
        }
    }

    // --- bodies ---

    fn check_bodies(&mut self) {
        let file = self.file;
        for decl in &file.decls {
            if let Decl::Func(f) = decl {
                if f.body.is_some() {
                    self.check_body(f);
                }
            }
        }
    }

    fn check_body(&mut self, f: &'a FuncDecl) {
        let saved = self.current;
        self.current = self.scopes.new_scope(Some(self.file_scope));

        let mut recv_decl_key: Option<String> = None;
        if let Some(recv) = &f.recv {
            if let Some(base_name) = receiver_base_name(recv) {
                let base = self.force(&base_name);
                let declared = self.arena.type_params(base);
                let (is_ptr, local_params) = receiver_shape(recv);
                let recv_base = if declared.is_empty() {
                    base
                } else {
                    recv_decl_key = Some(base_name.clone());
                    let locals: Vec<Ident> = if local_params.is_empty() {
                        declared.iter().map(|n| Ident::new(n.clone())).collect()
                    } else {
                        local_params
                    };
                    let mut map = TypeMap::new();
                    for (local, declared_name) in locals.iter().zip(&declared) {
                        let tp = self.arena.alloc(Type::TypeParam(declared_name.clone()));
                        let obj = Object::new(local.name.clone(), ObjKind::TypeName, local.span)
                            .with_type(tp);
                        let _ = self.scopes.insert(self.current, obj);
                        map.insert(declared_name.clone(), tp);
                    }
                    self.inst().instantiate(base, map)
                };
                let recv_tid = if is_ptr {
                    self.arena.alloc(Type::Pointer(recv_base))
                } else {
                    recv_base
                };
                if let Some(name) = recv.names.first() {
                    let obj =
                        Object::new(name.name.clone(), ObjKind::Var, name.span).with_type(recv_tid);
                    let _ = self.scopes.insert(self.current, obj);
                }
            }
        }

        if let Some(tp) = &f.type_params {
            for param in &tp.names {
                let t = self.arena.alloc(Type::TypeParam(param.name.clone()));
                let obj =
                    Object::new(param.name.clone(), ObjKind::TypeName, param.span).with_type(t);
                let _ = self.scopes.insert(self.current, obj);
            }
        }

        // Instantiations inside a generic declaration's body are dependents
        // of that declaration, completed when it is itself instantiated.
        self.current_key = if f.type_params.is_some() {
            match &f.recv {
                Some(recv) => receiver_base_name(recv).map(|base| decl_key(Some(&base), &f.name.name)),
                None => Some(decl_key(None, &f.name.name)),
            }
        } else {
            recv_decl_key
        };

        for field in &f.typ.params {
            let t = self.type_expr(&field.typ);
            let is_last_variadic = f.typ.variadic
                && std::ptr::eq(field, f.typ.params.last().expect("variadic list is non-empty"));
            let t = if is_last_variadic {
                self.arena.alloc(Type::Slice(t))
            } else {
                t
            };
            for name in &field.names {
                let obj = Object::new(name.name.clone(), ObjKind::Var, name.span).with_type(t);
                let _ = self.scopes.insert(self.current, obj);
            }
        }
        for field in &f.typ.results {
            let t = self.type_expr(&field.typ);
            for name in &field.names {
                let obj = Object::new(name.name.clone(), ObjKind::Var, name.span).with_type(t);
                let _ = self.scopes.insert(self.current, obj);
            }
        }

        if let Some(body) = &f.body {
            self.check_stmts(&body.stmts);
        }

        self.current_key = None;
        self.current = saved;
    }
}

/// Base type name of a method receiver (`A` in `(a *A[T])`).
fn receiver_base_name(recv: &Field) -> Option<String> {
    let mut typ = &recv.typ;
    if let Expr::Star { x, .. } = typ {
        typ = x;
    }
    match typ {
        Expr::Ident(id) => Some(id.name.clone()),
        Expr::TypeArgs { x, .. } | Expr::Index { x, .. } => {
            x.as_ident().map(|id| id.name.clone())
        }
        _ => None,
    }
}

/// Pointer flag and bracketed receiver type-parameter names.
fn receiver_shape(recv: &Field) -> (bool, Vec<Ident>) {
    let mut typ = &recv.typ;
    let mut is_ptr = false;
    if let Expr::Star { x, .. } = typ {
        is_ptr = true;
        typ = x;
    }
    let params = match typ {
        Expr::TypeArgs { args, .. } => args
            .iter()
            .filter_map(|a| a.as_ident().cloned())
            .collect(),
        Expr::Index { index, .. } => index.as_ident().cloned().into_iter().collect(),
        _ => Vec::new(),
    };
    (is_ptr, params)
}

fn parse_int_literal(text: &str) -> Result<i64, std::num::ParseIntError> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        text.parse()
    }
}

fn setup_universe(scopes: &mut ScopeTree, arena: &mut TypeArena, universe: usize) {
    let typed = [
        BasicKind::Bool,
        BasicKind::Int,
        BasicKind::Int8,
        BasicKind::Int16,
        BasicKind::Int32,
        BasicKind::Int64,
        BasicKind::Uint,
        BasicKind::Uint8,
        BasicKind::Uint16,
        BasicKind::Uint32,
        BasicKind::Uint64,
        BasicKind::Uintptr,
        BasicKind::Float32,
        BasicKind::Float64,
        BasicKind::Complex64,
        BasicKind::Complex128,
        BasicKind::Str,
        BasicKind::Byte,
        BasicKind::Rune,
    ];
    for kind in typed {
        let obj = Object::new(kind.name(), ObjKind::TypeName, Span::default())
            .with_type(arena.basic(kind));
        let _ = scopes.insert(universe, obj);
    }

    let iface = arena.alloc(Type::Interface);
    let error_under = arena.alloc(Type::Interface);
    let error_t = arena.alloc(Type::Named(NamedData {
        name: "error".to_string(),
        pkg: None,
        underlying: error_under,
        methods: Vec::new(),
    }));
    let _ = scopes.insert(
        universe,
        Object::new("any", ObjKind::TypeName, Span::default()).with_type(iface),
    );
    let _ = scopes.insert(
        universe,
        Object::new("error", ObjKind::TypeName, Span::default()).with_type(error_t),
    );

    let untyped_bool = arena.basic(BasicKind::UntypedBool);
    let untyped_nil = arena.basic(BasicKind::UntypedNil);
    let untyped_int = arena.basic(BasicKind::UntypedInt);
    let _ = scopes.insert(
        universe,
        Object::new("true", ObjKind::Const, Span::default()).with_type(untyped_bool),
    );
    let _ = scopes.insert(
        universe,
        Object::new("false", ObjKind::Const, Span::default()).with_type(untyped_bool),
    );
    let _ = scopes.insert(
        universe,
        Object::new("nil", ObjKind::Const, Span::default()).with_type(untyped_nil),
    );
    let mut iota = Object::new("iota", ObjKind::Const, Span::default()).with_type(untyped_int);
    iota.const_val = Some(0);
    let _ = scopes.insert(universe, iota);

    let builtins = [
        ("make", Builtin::Make),
        ("len", Builtin::Len),
        ("cap", Builtin::Cap),
        ("new", Builtin::New),
        ("append", Builtin::Append),
        ("copy", Builtin::Copy),
        ("delete", Builtin::Delete),
        ("panic", Builtin::Panic),
        ("print", Builtin::Print),
        ("println", Builtin::Println),
    ];
    for (name, builtin) in builtins {
        let _ = scopes.insert(
            universe,
            Object::new(name, ObjKind::Builtin(builtin), Span::default()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::StdImporter;
    use crate::parser::parse_file;

    fn check_src(src: &str) -> Checked {
        let file = parse_file(src).unwrap();
        let mut importer = StdImporter::new();
        check_file(&file, &mut importer)
    }

    #[test]
    fn test_empty_main() {
        let checked = check_src("package main\n\nfunc main() {\n}\n");
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
    }

    #[test]
    fn test_generic_struct_usage_recorded() {
        let checked = check_src(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box[string]{}\n\nvar _ = &Box[int]{}\n\nfunc main() {\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        let decl = checked.registry.get("Box").expect("Box is registered");
        let keys: Vec<&String> = decl.usages.keys().collect();
        assert_eq!(keys, vec!["int", "string"]);
    }

    #[test]
    fn test_unused_generic_has_no_usages() {
        let checked = check_src(
            "package main\n\ntype T[U] struct{}\n\nfunc f[T](x T) {}\n\nfunc main() {\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        assert_eq!(checked.registry.get("T").unwrap().usages.len(), 0);
        assert_eq!(checked.registry.get("f").unwrap().usages.len(), 0);
    }

    #[test]
    fn test_generic_func_usages() {
        let checked = check_src(
            "package main\n\nfunc Print[T](t T) {\n\tprintln(t)\n}\n\nfunc main() {\n\tPrint[int](5)\n\tPrint[string](\"x\")\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        let decl = checked.registry.get("Print").unwrap();
        let keys: Vec<&String> = decl.usages.keys().collect();
        assert_eq!(keys, vec!["int", "string"]);
    }

    #[test]
    fn test_inherited_usage_recorded_via_dependents() {
        let checked = check_src(
            "package main\n\ntype Tuple[T, U] struct {\n\tfirst T\n\tsecond U\n}\n\ntype Boxed[T, U] struct {\n\tv Tuple[T, U]\n}\n\nvar _ = Boxed[string, int]{}\n\nfunc main() {\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        let tuple = checked.registry.get("Tuple").unwrap();
        assert_eq!(
            tuple.usages.keys().collect::<Vec<_>>(),
            vec!["string;int"]
        );
        let boxed = checked.registry.get("Boxed").unwrap();
        assert_eq!(boxed.usages.len(), 1);
    }

    #[test]
    fn test_wrong_arity_diagnostic() {
        let checked = check_src(
            "package main\n\ntype Tuple[T, U] struct {\n\tfirst T\n\tsecond U\n}\n\nvar _ = Tuple[int]{}\n\nfunc main() {\n}\n",
        );
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "wrong number of type arguments (expected 2 but got 1)"));
    }

    #[test]
    fn test_missing_type_arguments_diagnostic() {
        let checked = check_src(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box{}\n\nfunc main() {\n}\n",
        );
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "missing type arguments for type Box"));
    }

    #[test]
    fn test_generic_interface_rejected() {
        let checked = check_src("package main\n\ntype I[T] interface{}\n\nfunc main() {\n}\n");
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "generic interface types are not supported"));
    }

    #[test]
    fn test_generic_main_rejected() {
        let checked = check_src("package main\n\nfunc main[T]() {\n}\n");
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "func main must have no type parameters"));
    }

    #[test]
    fn test_main_with_args_rejected() {
        let checked = check_src("package main\n\nfunc main(x int) {\n}\n");
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "func main must have no arguments and no return values"));
    }

    #[test]
    fn test_redeclaration_diagnostic() {
        let checked = check_src("package main\n\nvar x = 1\n\nvar x = 2\n\nfunc main() {\n}\n");
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "x redeclared in this block"));
    }

    #[test]
    fn test_array_disambiguation_keeps_real_arrays() {
        let checked = check_src(
            "package main\n\nconst N = 3\n\ntype A [N]int\n\nvar _ A\n\nfunc main() {\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        assert!(checked.registry.get("A").is_none());
    }

    #[test]
    fn test_array_disambiguation_repairs_params() {
        let checked = check_src(
            "package main\n\ntype A[T] T\n\nvar _ = A[string](\"\")\n\nfunc main() {\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        let decl = checked.registry.get("A").unwrap();
        assert_eq!(decl.params, vec!["T".to_string()]);
        assert_eq!(decl.usages.keys().collect::<Vec<_>>(), vec!["string"]);
    }

    #[test]
    fn test_method_set_on_concrete_instance() {
        let checked = check_src(
            "package main\n\ntype A[T] T\n\nfunc (a A[T]) f1() T {\n\treturn T(a)\n}\n\nvar x = A[string](\"\")\n\nfunc main() {\n\tx.f1()\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        let a = checked.registry.get("A").unwrap();
        let (_, &conc) = a.usages.iter().next().unwrap();
        let methods = checked.arena.methods(conc);
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "f1");
        assert_eq!(checked.arena.display(methods[0].typ), "func() string");
    }

    #[test]
    fn test_generic_method_usage() {
        let checked = check_src(
            "package main\n\ntype A[T] T\n\nfunc (a A[T]) f2[U, V]() (T, U, V) {\n\tvar x U\n\tvar y V\n\treturn T(a), x, y\n}\n\nfunc main() {\n\tvar x A[uint]\n\tx.f2[float64, int8]()\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        let f2 = checked.registry.get("A.f2").unwrap();
        assert_eq!(f2.usages.len(), 1);
        let (key, _) = f2.usages.iter().next().unwrap();
        // Sorted by parameter name: T, U, V.
        assert_eq!(key, "uint;float64;int8");
    }

    #[test]
    fn test_undeclared_name() {
        let checked = check_src("package main\n\nfunc main() {\n\tprintln(zzz)\n}\n");
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "undeclared name: zzz"));
    }

    #[test]
    fn test_selector_type_argument_usage_key() {
        let checked = check_src(
            "package main\n\nimport \"bytes\"\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box[bytes.Buffer]{}\n\nfunc main() {\n}\n",
        );
        assert!(checked.is_ok(), "diagnostics: {:?}", checked.diagnostics);
        let decl = checked.registry.get("Box").unwrap();
        assert_eq!(
            decl.usages.keys().collect::<Vec<_>>(),
            vec!["bytes.Buffer"]
        );
    }
}
