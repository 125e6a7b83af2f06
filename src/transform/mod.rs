//! The monomorphizing transformer.
//!
//! Consumes a checked file and its generic registry and produces a file
//! with no type parameters and no type-argument expressions, in two passes:
//!
//! 1. Every generic declaration is replaced by one specialized clone per
//!    recorded concrete usage (a generic with no usages vanishes). Clones
//!    substitute type-parameter identifiers with the bound types rendered
//!    as type expressions, take their mangled name, and lose their
//!    parameter lists; generic receivers are expanded to the usage's
//!    concrete receiver.
//! 2. Every instantiation site is rewritten to the specialization's
//!    mangled identifier. Ambiguous index expressions are upgraded first
//!    when their head names a generic declaration (or their selector names
//!    a generic method).
//!
//! The transformer never reports user-visible errors: with a consistent
//! registry it succeeds, and anything else is an internal invariant
//! violation.

pub mod mangle;

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::clone::{
    clone_block, clone_decl, clone_expr, clone_field, clone_func_decl, clone_func_type, clone_spec,
};
use crate::ast::{Decl, DeclTok, Expr, Field, File, FuncDecl, GenDecl, Ident, Spec, Stmt};
use crate::check::Checked;
use crate::printer::{expr_string, print_decl};
use crate::types::registry::{GenericDecl, GenericRegistry};
use crate::types::{TypeArena, TypeId};

use mangle::{type_to_expr, Mangler};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransformError {
    #[error("internal error: {0}")]
    Internal(String),
}

/// Transform a checked file into its monomorphized form.
pub fn transform_file(file: &File, checked: &Checked) -> Result<File, TransformError> {
    let mut transformer = Transformer {
        arena: &checked.arena,
        registry: &checked.registry,
        mangler: Mangler::new(),
    };
    transformer.file(file)
}

struct Transformer<'a> {
    arena: &'a TypeArena,
    registry: &'a GenericRegistry,
    mangler: Mangler,
}

impl Transformer<'_> {
    fn file(&mut self, file: &File) -> Result<File, TransformError> {
        let mut decls = Vec::new();
        for decl in &file.decls {
            self.expand_decl(decl, &mut decls)?;
        }
        let mut out = File {
            package: file.package.clone(),
            decls,
            unresolved: file.unresolved.clone(),
            span: file.span,
        };
        for decl in &mut out.decls {
            self.rewrite_decl(decl)?;
        }
        Ok(out)
    }

    // =========================================================================
    // Pass 1 — expand generic declarations
    // =========================================================================

    fn expand_decl(&mut self, decl: &Decl, out: &mut Vec<Decl>) -> Result<(), TransformError> {
        match decl {
            Decl::Gen(g) if g.tok == DeclTok::Type => {
                let mut specs: Vec<Spec> = Vec::new();
                let mut clones: Vec<(String, Spec)> = Vec::new();
                for spec in &g.specs {
                    let generic = match spec {
                        Spec::Type { name, .. } => self.registry.get(&name.name),
                        _ => None,
                    };
                    match generic {
                        Some(gdecl) => {
                            for &conc in gdecl.usages.values() {
                                clones.push(self.specialize_type_spec(spec, gdecl, conc)?);
                            }
                        }
                        None => specs.push(clone_spec(spec)),
                    }
                }
                clones.sort_by(|a, b| a.0.cmp(&b.0));
                specs.extend(clones.into_iter().map(|(_, spec)| spec));
                if specs.is_empty() {
                    return Ok(());
                }
                let grouped = g.grouped || specs.len() > 1;
                out.push(Decl::Gen(GenDecl {
                    tok: g.tok,
                    specs,
                    grouped,
                    span: g.span,
                }));
                Ok(())
            }
            Decl::Gen(_) | Decl::Bad(_) => {
                out.push(clone_decl(decl));
                Ok(())
            }
            Decl::Func(f) => self.expand_func(f, out),
        }
    }

    fn specialize_type_spec(
        &mut self,
        spec: &Spec,
        gdecl: &GenericDecl,
        conc: TypeId,
    ) -> Result<(String, Spec), TransformError> {
        let (name, type_params, assign, typ, span) = match spec {
            Spec::Type {
                name,
                type_params,
                assign,
                typ,
                span,
            } => (name, type_params, *assign, typ, *span),
            _ => {
                return Err(TransformError::Internal(
                    "specializing a non-type spec".to_string(),
                ))
            }
        };
        let type_map = self.arena.type_map(conc).ok_or_else(|| {
            TransformError::Internal(format!("usage of {} is not concrete", gdecl.name))
        })?;

        let mut subst = HashMap::new();
        let mut arg_strings = Vec::with_capacity(gdecl.params.len());
        for param in &gdecl.params {
            let arg = type_map.get(param).copied().ok_or_else(|| {
                TransformError::Internal(format!(
                    "missing binding for type parameter {} of {}",
                    param, gdecl.name
                ))
            })?;
            let arg_expr = type_to_expr(self.arena, arg, &mut self.mangler)?;
            arg_strings.push(expr_string(&arg_expr));
            subst.insert(param.clone(), arg_expr);
        }
        let mangled = self.mangler.mangled_name(&name.name, &arg_strings);

        // The single-parameter form parses as an array type; its element is
        // the real underlying type.
        let underlying = match (type_params, typ) {
            (None, Expr::ArrayType { len: Some(len), elt, .. }) if len.as_ident().is_some() => {
                elt.as_ref()
            }
            _ => typ,
        };
        let mut new_typ = clone_expr(underlying);
        substitute_idents_expr(&mut new_typ, &subst);

        Ok((
            mangled.clone(),
            Spec::Type {
                name: Ident::with_span(mangled, name.span),
                type_params: None,
                assign,
                typ: new_typ,
                span,
            },
        ))
    }

    fn expand_func(&mut self, f: &FuncDecl, out: &mut Vec<Decl>) -> Result<(), TransformError> {
        let recv_base = f.recv.as_ref().and_then(receiver_base_name);

        if f.type_params.is_some() {
            let key = match &recv_base {
                Some(base) => format!("{}.{}", base, f.name.name),
                None => f.name.name.clone(),
            };
            let gdecl = self.registry.get(&key).ok_or_else(|| {
                TransformError::Internal(format!("missing registry entry for generic {}", key))
            })?;
            let mut clones: Vec<(String, String, Decl)> = Vec::new();
            for &conc in gdecl.usages.values() {
                let decl = self.specialize_func(f, gdecl, recv_base.as_deref(), conc)?;
                let name = match &decl {
                    Decl::Func(nf) => nf.name.name.clone(),
                    _ => String::new(),
                };
                let printed = print_decl(&decl);
                clones.push((name, printed, decl));
            }
            clones.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            out.extend(clones.into_iter().map(|(_, _, d)| d));
            return Ok(());
        }

        if let Some(base) = &recv_base {
            if let Some(gdecl) = self.registry.get(base) {
                let mut clones: Vec<(String, String, Decl)> = Vec::new();
                for &conc in gdecl.usages.values() {
                    let decl = self.specialize_method(f, gdecl, conc)?;
                    let printed = print_decl(&decl);
                    clones.push((f.name.name.clone(), printed, decl));
                }
                clones.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
                out.extend(clones.into_iter().map(|(_, _, d)| d));
                return Ok(());
            }
        }

        out.push(Decl::Func(clone_func_decl(f)));
        Ok(())
    }

    /// Specialize a generic function (free or method) for one usage.
    fn specialize_func(
        &mut self,
        f: &FuncDecl,
        gdecl: &GenericDecl,
        recv_base: Option<&str>,
        conc: TypeId,
    ) -> Result<Decl, TransformError> {
        let type_map = self
            .arena
            .type_map(conc)
            .ok_or_else(|| {
                TransformError::Internal(format!("usage of {} is not concrete", gdecl.name))
            })?
            .clone();

        let mut subst = HashMap::new();
        let mut own_args = Vec::with_capacity(gdecl.params.len());
        for param in &gdecl.params {
            let arg = type_map.get(param).copied().ok_or_else(|| {
                TransformError::Internal(format!(
                    "missing binding for type parameter {} of {}",
                    param, gdecl.name
                ))
            })?;
            let arg_expr = type_to_expr(self.arena, arg, &mut self.mangler)?;
            own_args.push(expr_string(&arg_expr));
            subst.insert(param.clone(), arg_expr);
        }
        let mangled = self.mangler.mangled_name(&f.name.name, &own_args);

        let new_recv = match (&f.recv, recv_base) {
            // Only a generic receiver is expanded; a plain receiver of a
            // generic method is kept as written.
            (Some(recv), Some(base)) if self.registry.contains(base) => {
                Some(self.expand_receiver(recv, base, &type_map, &mut subst)?)
            }
            (Some(recv), _) => Some(clone_field(recv)),
            (None, _) => None,
        };

        let mut new_typ = clone_func_type(&f.typ);
        for field in new_typ.params.iter_mut().chain(new_typ.results.iter_mut()) {
            substitute_idents_expr(&mut field.typ, &subst);
        }
        let mut new_body = f.body.as_ref().map(clone_block);
        if let Some(body) = &mut new_body {
            for stmt in &mut body.stmts {
                substitute_idents_stmt(stmt, &subst);
            }
        }

        Ok(Decl::Func(FuncDecl {
            recv: new_recv,
            name: Ident::with_span(mangled, f.name.span),
            type_params: None,
            typ: new_typ,
            body: new_body,
            span: f.span,
        }))
    }

    /// Specialize a plain method of a generic receiver for one receiver
    /// usage. The method name is left unchanged; receivers distinguish the
    /// copies.
    fn specialize_method(
        &mut self,
        f: &FuncDecl,
        recv_decl: &GenericDecl,
        conc: TypeId,
    ) -> Result<Decl, TransformError> {
        let type_map = self
            .arena
            .type_map(conc)
            .ok_or_else(|| {
                TransformError::Internal(format!("usage of {} is not concrete", recv_decl.name))
            })?
            .clone();
        let recv = f.recv.as_ref().ok_or_else(|| {
            TransformError::Internal("method declaration without receiver".to_string())
        })?;

        let mut subst = HashMap::new();
        let new_recv = self.expand_receiver(recv, &recv_decl.name, &type_map, &mut subst)?;

        let mut new_typ = clone_func_type(&f.typ);
        for field in new_typ.params.iter_mut().chain(new_typ.results.iter_mut()) {
            substitute_idents_expr(&mut field.typ, &subst);
        }
        let mut new_body = f.body.as_ref().map(clone_block);
        if let Some(body) = &mut new_body {
            for stmt in &mut body.stmts {
                substitute_idents_stmt(stmt, &subst);
            }
        }

        Ok(Decl::Func(FuncDecl {
            recv: Some(new_recv),
            name: f.name.clone(),
            type_params: None,
            typ: new_typ,
            body: new_body,
            span: f.span,
        }))
    }

    /// Rewrite a receiver to the usage's concrete form and extend the
    /// identifier substitution with the receiver's (possibly abbreviated)
    /// local parameter names.
    fn expand_receiver(
        &mut self,
        recv: &Field,
        base: &str,
        type_map: &crate::types::TypeMap,
        subst: &mut HashMap<String, Expr>,
    ) -> Result<Field, TransformError> {
        let decl = self.registry.get(base).ok_or_else(|| {
            TransformError::Internal(format!("missing registry entry for receiver {}", base))
        })?;
        let (is_ptr, locals) = receiver_shape(recv);

        let mut recv_args = Vec::with_capacity(decl.params.len());
        for (i, declared) in decl.params.iter().enumerate() {
            let arg = type_map.get(declared).copied().ok_or_else(|| {
                TransformError::Internal(format!(
                    "missing binding for receiver type parameter {} of {}",
                    declared, base
                ))
            })?;
            let arg_expr = type_to_expr(self.arena, arg, &mut self.mangler)?;
            recv_args.push(expr_string(&arg_expr));
            // Only the receiver's local names are visible in the body; an
            // abbreviated receiver binds nothing.
            if let Some(local) = locals.get(i) {
                subst.insert(local.clone(), arg_expr);
            }
        }
        let mangled = self.mangler.mangled_name(base, &recv_args);

        let mut typ = Expr::Ident(Ident::new(mangled));
        if is_ptr {
            typ = Expr::Star {
                x: Box::new(typ),
                span: recv.span,
            };
        }
        Ok(Field {
            names: recv.names.clone(),
            typ,
            tag: None,
            span: recv.span,
        })
    }

    // =========================================================================
    // Pass 2 — rewrite instantiation sites
    // =========================================================================

    fn rewrite_decl(&mut self, decl: &mut Decl) -> Result<(), TransformError> {
        match decl {
            Decl::Bad(_) => Ok(()),
            Decl::Gen(g) => {
                for spec in &mut g.specs {
                    match spec {
                        Spec::Import { .. } => {}
                        Spec::Value { typ, values, .. } => {
                            if let Some(typ) = typ {
                                self.rewrite_expr(typ)?;
                            }
                            for value in values {
                                self.rewrite_expr(value)?;
                            }
                        }
                        Spec::Type { typ, .. } => self.rewrite_expr(typ)?,
                    }
                }
                Ok(())
            }
            Decl::Func(f) => {
                if let Some(recv) = &mut f.recv {
                    self.rewrite_expr(&mut recv.typ)?;
                }
                for field in f.typ.params.iter_mut().chain(f.typ.results.iter_mut()) {
                    self.rewrite_expr(&mut field.typ)?;
                }
                if let Some(body) = &mut f.body {
                    for stmt in &mut body.stmts {
                        self.rewrite_stmt(stmt)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn rewrite_stmt(&mut self, stmt: &mut Stmt) -> Result<(), TransformError> {
        match stmt {
            Stmt::Bad(_) | Stmt::Empty(_) | Stmt::Branch { .. } => Ok(()),
            Stmt::Decl(decl) => self.rewrite_decl(decl),
            Stmt::Expr(e) => self.rewrite_expr(e),
            Stmt::Send { chan, value, .. } => {
                self.rewrite_expr(chan)?;
                self.rewrite_expr(value)
            }
            Stmt::IncDec { x, .. } => self.rewrite_expr(x),
            Stmt::Assign { lhs, rhs, .. } => {
                for l in lhs {
                    self.rewrite_expr(l)?;
                }
                for r in rhs {
                    self.rewrite_expr(r)?;
                }
                Ok(())
            }
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => self.rewrite_expr(call),
            Stmt::Return { results, .. } => {
                for r in results {
                    self.rewrite_expr(r)?;
                }
                Ok(())
            }
            Stmt::Block(b) => {
                for s in &mut b.stmts {
                    self.rewrite_stmt(s)?;
                }
                Ok(())
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                if let Some(init) = init {
                    self.rewrite_stmt(init)?;
                }
                self.rewrite_expr(cond)?;
                for s in &mut then.stmts {
                    self.rewrite_stmt(s)?;
                }
                if let Some(els) = els {
                    self.rewrite_stmt(els)?;
                }
                Ok(())
            }
            Stmt::Switch {
                init, tag, cases, ..
            } => {
                if let Some(init) = init {
                    self.rewrite_stmt(init)?;
                }
                if let Some(tag) = tag {
                    self.rewrite_expr(tag)?;
                }
                for case in cases {
                    for e in &mut case.exprs {
                        self.rewrite_expr(e)?;
                    }
                    for s in &mut case.body {
                        self.rewrite_stmt(s)?;
                    }
                }
                Ok(())
            }
            Stmt::TypeSwitch { init, x, cases, .. } => {
                if let Some(init) = init {
                    self.rewrite_stmt(init)?;
                }
                self.rewrite_expr(x)?;
                for case in cases {
                    for e in &mut case.exprs {
                        self.rewrite_expr(e)?;
                    }
                    for s in &mut case.body {
                        self.rewrite_stmt(s)?;
                    }
                }
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.rewrite_stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.rewrite_expr(cond)?;
                }
                if let Some(post) = post {
                    self.rewrite_stmt(post)?;
                }
                for s in &mut body.stmts {
                    self.rewrite_stmt(s)?;
                }
                Ok(())
            }
            Stmt::Range {
                key, value, x, body, ..
            } => {
                for part in [key, value].into_iter().flatten() {
                    self.rewrite_expr(part)?;
                }
                self.rewrite_expr(x)?;
                for s in &mut body.stmts {
                    self.rewrite_stmt(s)?;
                }
                Ok(())
            }
        }
    }

    /// Children first, so nested instantiations contribute their mangled
    /// names to the enclosing argument texts.
    fn rewrite_expr(&mut self, e: &mut Expr) -> Result<(), TransformError> {
        match e {
            Expr::Bad(_) | Expr::Ident(_) | Expr::BasicLit(_) | Expr::InterfaceType { .. } => {
                return Ok(())
            }
            Expr::CompositeLit { typ, elts, .. } => {
                if let Some(typ) = typ {
                    self.rewrite_expr(typ)?;
                }
                for elt in elts {
                    self.rewrite_expr(elt)?;
                }
                return Ok(());
            }
            Expr::KeyValue { key, value, .. } => {
                if key.as_ident().is_none() {
                    self.rewrite_expr(key)?;
                }
                self.rewrite_expr(value)?;
                return Ok(());
            }
            Expr::FuncLit { typ, body, .. } => {
                for field in typ.params.iter_mut().chain(typ.results.iter_mut()) {
                    self.rewrite_expr(&mut field.typ)?;
                }
                for stmt in &mut body.stmts {
                    self.rewrite_stmt(stmt)?;
                }
                return Ok(());
            }
            Expr::Paren { x, .. } | Expr::Star { x, .. } | Expr::Unary { x, .. } => {
                self.rewrite_expr(x)?;
                return Ok(());
            }
            Expr::Selector { x, .. } => {
                self.rewrite_expr(x)?;
                return Ok(());
            }
            Expr::Slice { x, low, high, .. } => {
                self.rewrite_expr(x)?;
                for part in [low, high].into_iter().flatten() {
                    self.rewrite_expr(part)?;
                }
                return Ok(());
            }
            Expr::TypeAssert { x, typ, .. } => {
                self.rewrite_expr(x)?;
                if let Some(typ) = typ {
                    self.rewrite_expr(typ)?;
                }
                return Ok(());
            }
            Expr::Call { fun, args, .. } => {
                self.rewrite_expr(fun)?;
                for arg in args {
                    self.rewrite_expr(arg)?;
                }
                return Ok(());
            }
            Expr::Binary { x, y, .. } => {
                self.rewrite_expr(x)?;
                self.rewrite_expr(y)?;
                return Ok(());
            }
            Expr::ArrayType { len, elt, .. } => {
                if let Some(len) = len {
                    self.rewrite_expr(len)?;
                }
                self.rewrite_expr(elt)?;
                return Ok(());
            }
            Expr::StructType { fields, .. } => {
                for field in fields {
                    self.rewrite_expr(&mut field.typ)?;
                }
                return Ok(());
            }
            Expr::FuncTypeExpr(ft) => {
                for field in ft.params.iter_mut().chain(ft.results.iter_mut()) {
                    self.rewrite_expr(&mut field.typ)?;
                }
                return Ok(());
            }
            Expr::MapType { key, value, .. } => {
                self.rewrite_expr(key)?;
                self.rewrite_expr(value)?;
                return Ok(());
            }
            Expr::ChanType { value, .. } => {
                self.rewrite_expr(value)?;
                return Ok(());
            }
            Expr::TypeArgs { .. } | Expr::Index { .. } => {}
        }

        // Instantiation-shaped nodes: recurse, then rewrite in place.
        match e {
            Expr::TypeArgs { x, args, .. } => {
                self.rewrite_expr(x)?;
                for arg in args.iter_mut() {
                    self.rewrite_expr(arg)?;
                }
                let replacement = self.mangle_use(x, args)?;
                *e = replacement;
                Ok(())
            }
            Expr::Index { x, index, .. } => {
                self.rewrite_expr(x)?;
                self.rewrite_expr(index)?;
                let upgrade = match x.as_ref() {
                    Expr::Ident(id) => self.registry.contains(&id.name),
                    Expr::Selector { sel, .. } => self.registry.has_method_decl(&sel.name),
                    _ => false,
                };
                if upgrade {
                    let args = vec![clone_expr(index)];
                    let replacement = self.mangle_use(x, &args)?;
                    *e = replacement;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The mangled reference for an instantiation site.
    fn mangle_use(&mut self, head: &Expr, args: &[Expr]) -> Result<Expr, TransformError> {
        let arg_strings: Vec<String> = args.iter().map(expr_string).collect();
        match head {
            Expr::Ident(id) => {
                let mangled = self.mangler.mangled_name(&id.name, &arg_strings);
                Ok(Expr::Ident(Ident::with_span(mangled, id.span)))
            }
            Expr::Selector { x, sel, span } => {
                let mangled = self.mangler.mangled_name(&sel.name, &arg_strings);
                Ok(Expr::Selector {
                    x: Box::new(clone_expr(x)),
                    sel: Ident::with_span(mangled, sel.span),
                    span: *span,
                })
            }
            other => Err(TransformError::Internal(format!(
                "unsupported instantiation head: {}",
                expr_string(other)
            ))),
        }
    }
}

/// Base type name of a method receiver.
fn receiver_base_name(recv: &Field) -> Option<String> {
    let mut typ = &recv.typ;
    if let Expr::Star { x, .. } = typ {
        typ = x;
    }
    match typ {
        Expr::Ident(id) => Some(id.name.clone()),
        Expr::TypeArgs { x, .. } | Expr::Index { x, .. } => x.as_ident().map(|id| id.name.clone()),
        _ => None,
    }
}

/// Pointer flag and local receiver type-parameter names.
fn receiver_shape(recv: &Field) -> (bool, Vec<String>) {
    let mut typ = &recv.typ;
    let mut is_ptr = false;
    if let Expr::Star { x, .. } = typ {
        is_ptr = true;
        typ = x;
    }
    let locals = match typ {
        Expr::TypeArgs { args, .. } => args
            .iter()
            .filter_map(|a| a.as_ident().map(|id| id.name.clone()))
            .collect(),
        Expr::Index { index, .. } => index
            .as_ident()
            .map(|id| id.name.clone())
            .into_iter()
            .collect(),
        _ => Vec::new(),
    };
    (is_ptr, locals)
}

// =============================================================================
// Identifier substitution inside cloned declarations
// =============================================================================

/// Replace type-parameter identifiers with rendered type expressions.
/// Selector fields, composite-literal keys, and declared names are not
/// uses and stay untouched.
fn substitute_idents_expr(e: &mut Expr, subst: &HashMap<String, Expr>) {
    match e {
        Expr::Ident(id) => {
            if let Some(replacement) = subst.get(&id.name) {
                *e = clone_expr(replacement);
            }
        }
        Expr::Bad(_) | Expr::BasicLit(_) | Expr::InterfaceType { .. } => {}
        Expr::CompositeLit { typ, elts, .. } => {
            if let Some(typ) = typ {
                substitute_idents_expr(typ, subst);
            }
            for elt in elts {
                match elt {
                    Expr::KeyValue { key, value, .. } => {
                        if key.as_ident().is_none() {
                            substitute_idents_expr(key, subst);
                        }
                        substitute_idents_expr(value, subst);
                    }
                    other => substitute_idents_expr(other, subst),
                }
            }
        }
        Expr::KeyValue { key, value, .. } => {
            substitute_idents_expr(key, subst);
            substitute_idents_expr(value, subst);
        }
        Expr::FuncLit { typ, body, .. } => {
            for field in typ.params.iter_mut().chain(typ.results.iter_mut()) {
                substitute_idents_expr(&mut field.typ, subst);
            }
            for stmt in &mut body.stmts {
                substitute_idents_stmt(stmt, subst);
            }
        }
        Expr::Paren { x, .. } | Expr::Star { x, .. } | Expr::Unary { x, .. } => {
            substitute_idents_expr(x, subst)
        }
        Expr::Selector { x, .. } => substitute_idents_expr(x, subst),
        Expr::Index { x, index, .. } => {
            substitute_idents_expr(x, subst);
            substitute_idents_expr(index, subst);
        }
        Expr::TypeArgs { x, args, .. } => {
            substitute_idents_expr(x, subst);
            for arg in args {
                substitute_idents_expr(arg, subst);
            }
        }
        Expr::Slice { x, low, high, .. } => {
            substitute_idents_expr(x, subst);
            for part in [low, high].into_iter().flatten() {
                substitute_idents_expr(part, subst);
            }
        }
        Expr::TypeAssert { x, typ, .. } => {
            substitute_idents_expr(x, subst);
            if let Some(typ) = typ {
                substitute_idents_expr(typ, subst);
            }
        }
        Expr::Call { fun, args, .. } => {
            substitute_idents_expr(fun, subst);
            for arg in args {
                substitute_idents_expr(arg, subst);
            }
        }
        Expr::Binary { x, y, .. } => {
            substitute_idents_expr(x, subst);
            substitute_idents_expr(y, subst);
        }
        Expr::ArrayType { len, elt, .. } => {
            if let Some(len) = len {
                substitute_idents_expr(len, subst);
            }
            substitute_idents_expr(elt, subst);
        }
        Expr::StructType { fields, .. } => {
            for field in fields {
                substitute_idents_expr(&mut field.typ, subst);
            }
        }
        Expr::FuncTypeExpr(ft) => {
            for field in ft.params.iter_mut().chain(ft.results.iter_mut()) {
                substitute_idents_expr(&mut field.typ, subst);
            }
        }
        Expr::MapType { key, value, .. } => {
            substitute_idents_expr(key, subst);
            substitute_idents_expr(value, subst);
        }
        Expr::ChanType { value, .. } => substitute_idents_expr(value, subst),
    }
}

fn substitute_idents_stmt(stmt: &mut Stmt, subst: &HashMap<String, Expr>) {
    match stmt {
        Stmt::Bad(_) | Stmt::Empty(_) | Stmt::Branch { .. } => {}
        Stmt::Decl(decl) => substitute_idents_decl(decl, subst),
        Stmt::Expr(e) => substitute_idents_expr(e, subst),
        Stmt::Send { chan, value, .. } => {
            substitute_idents_expr(chan, subst);
            substitute_idents_expr(value, subst);
        }
        Stmt::IncDec { x, .. } => substitute_idents_expr(x, subst),
        Stmt::Assign { lhs, rhs, .. } => {
            for l in lhs {
                substitute_idents_expr(l, subst);
            }
            for r in rhs {
                substitute_idents_expr(r, subst);
            }
        }
        Stmt::Go { call, .. } | Stmt::Defer { call, .. } => substitute_idents_expr(call, subst),
        Stmt::Return { results, .. } => {
            for r in results {
                substitute_idents_expr(r, subst);
            }
        }
        Stmt::Block(b) => {
            for s in &mut b.stmts {
                substitute_idents_stmt(s, subst);
            }
        }
        Stmt::If {
            init,
            cond,
            then,
            els,
            ..
        } => {
            if let Some(init) = init {
                substitute_idents_stmt(init, subst);
            }
            substitute_idents_expr(cond, subst);
            for s in &mut then.stmts {
                substitute_idents_stmt(s, subst);
            }
            if let Some(els) = els {
                substitute_idents_stmt(els, subst);
            }
        }
        Stmt::Switch {
            init, tag, cases, ..
        } => {
            if let Some(init) = init {
                substitute_idents_stmt(init, subst);
            }
            if let Some(tag) = tag {
                substitute_idents_expr(tag, subst);
            }
            for case in cases {
                for e in &mut case.exprs {
                    substitute_idents_expr(e, subst);
                }
                for s in &mut case.body {
                    substitute_idents_stmt(s, subst);
                }
            }
        }
        Stmt::TypeSwitch { init, x, cases, .. } => {
            if let Some(init) = init {
                substitute_idents_stmt(init, subst);
            }
            substitute_idents_expr(x, subst);
            for case in cases {
                for e in &mut case.exprs {
                    substitute_idents_expr(e, subst);
                }
                for s in &mut case.body {
                    substitute_idents_stmt(s, subst);
                }
            }
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            if let Some(init) = init {
                substitute_idents_stmt(init, subst);
            }
            if let Some(cond) = cond {
                substitute_idents_expr(cond, subst);
            }
            if let Some(post) = post {
                substitute_idents_stmt(post, subst);
            }
            for s in &mut body.stmts {
                substitute_idents_stmt(s, subst);
            }
        }
        Stmt::Range {
            key, value, x, body, ..
        } => {
            for part in [key, value].into_iter().flatten() {
                substitute_idents_expr(part, subst);
            }
            substitute_idents_expr(x, subst);
            for s in &mut body.stmts {
                substitute_idents_stmt(s, subst);
            }
        }
    }
}

fn substitute_idents_decl(decl: &mut Decl, subst: &HashMap<String, Expr>) {
    match decl {
        Decl::Bad(_) => {}
        Decl::Gen(g) => {
            for spec in &mut g.specs {
                match spec {
                    Spec::Import { .. } => {}
                    Spec::Value { typ, values, .. } => {
                        if let Some(typ) = typ {
                            substitute_idents_expr(typ, subst);
                        }
                        for value in values {
                            substitute_idents_expr(value, subst);
                        }
                    }
                    Spec::Type { typ, .. } => substitute_idents_expr(typ, subst),
                }
            }
        }
        Decl::Func(f) => {
            for field in f.typ.params.iter_mut().chain(f.typ.results.iter_mut()) {
                substitute_idents_expr(&mut field.typ, subst);
            }
            if let Some(body) = &mut f.body {
                for stmt in &mut body.stmts {
                    substitute_idents_stmt(stmt, subst);
                }
            }
        }
    }
}
