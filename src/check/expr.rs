//! Expression, type-expression, and statement checking.
//!
//! Expression checking here is pragmatic: it resolves names, assigns types
//! to the subset's expressions, and is permissive about untyped-constant
//! conversions. Its load-bearing duty is detecting every instantiation —
//! including upgrading ambiguous index expressions whose head turns out to
//! be generic — and populating the generic registry.

use crate::ast::{CaseClause, Decl, DeclTok, Expr, Ident, Span, Spec, Stmt};
use crate::check::scope::{Builtin, ObjId, ObjKind, Object};
use crate::check::Checker;
use crate::types::{BasicKind, Param, StructData, Type, TypeId, TypeMap};

impl Checker<'_> {
    fn lookup(&self, name: &str) -> Option<ObjId> {
        self.scopes.lookup(self.current, name)
    }

    fn obj_type(&mut self, oid: ObjId) -> TypeId {
        if let Some(t) = self.scopes.obj(oid).typ {
            return t;
        }
        let name = self.scopes.obj(oid).name.clone();
        self.force(&name)
    }

    // =========================================================================
    // Type expressions
    // =========================================================================

    /// Elaborate a type expression; generic types are invalid here without
    /// type arguments.
    pub(crate) fn type_expr(&mut self, e: &Expr) -> TypeId {
        let t = self.type_expr_allow(e);
        self.type_args_required(e.span(), t);
        t
    }

    /// Report a generic type appearing where only instantiated types are
    /// valid.
    pub(crate) fn type_args_required(&mut self, span: Span, t: TypeId) {
        match self.arena.get(t) {
            Type::GenericNamed(_) | Type::GenericSignature(_) => {
                let display = self.arena.display(t);
                self.errorf(span, format!("missing type arguments for type {}", display));
            }
            Type::PartialNamed(_) | Type::PartialSignature(_) => {
                let params = self.arena.type_params(t);
                let map_len = self.arena.type_map(t).map(|m| m.len()).unwrap_or(0);
                if params.len() != map_len {
                    let display = self.arena.display(t);
                    self.errorf(
                        span,
                        format!(
                            "wrong number of type arguments for type {} (expected {} but got {}, including implicit type arguments)",
                            display,
                            params.len(),
                            map_len
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    /// Elaborate a type expression, allowing a generic result (for
    /// instantiation heads).
    fn type_expr_allow(&mut self, e: &Expr) -> TypeId {
        match e {
            Expr::Ident(id) => self.type_ident(id),
            Expr::Selector { x, sel, span } => self.selector_type(x, sel, *span, true),
            Expr::Star { x, .. } => {
                let base = self.type_expr(x);
                self.arena.alloc(Type::Pointer(base))
            }
            Expr::ArrayType { len, elt, .. } => {
                let elem = self.type_expr(elt);
                match len {
                    None => self.arena.alloc(Type::Slice(elem)),
                    Some(len) => {
                        let n = self.array_len(len);
                        self.arena.alloc(Type::Array { len: n, elem })
                    }
                }
            }
            Expr::MapType { key, value, .. } => {
                let k = self.type_expr(key);
                let v = self.type_expr(value);
                self.arena.alloc(Type::Map { key: k, elem: v })
            }
            Expr::ChanType { dir, value, .. } => {
                let elem = self.type_expr(value);
                self.arena.alloc(Type::Chan { dir: *dir, elem })
            }
            Expr::StructType { fields, .. } => {
                let mut data = StructData {
                    fields: Vec::new(),
                    tags: Vec::new(),
                };
                for field in fields {
                    let t = self.type_expr(&field.typ);
                    let tag = field.tag.as_ref().map(|lit| lit.value.clone());
                    if field.names.is_empty() {
                        let name = embedded_field_name(&field.typ);
                        data.fields.push(Param { name, typ: t });
                        data.tags.push(tag.clone());
                    } else {
                        for name in &field.names {
                            data.fields.push(Param {
                                name: name.name.clone(),
                                typ: t,
                            });
                            data.tags.push(tag.clone());
                        }
                    }
                }
                self.arena.alloc(Type::Struct(data))
            }
            Expr::FuncTypeExpr(ft) => {
                let sig = self.sig_data(ft);
                self.arena.alloc(Type::Signature(sig))
            }
            Expr::InterfaceType { .. } => self.arena.alloc(Type::Interface),
            Expr::Paren { x, .. } => self.type_expr_allow(x),
            Expr::TypeArgs { x, args, span, .. } => {
                let head = self.type_expr_allow(x);
                let arg_refs: Vec<&Expr> = args.iter().collect();
                self.instantiate_args(head, &arg_refs, *span)
            }
            Expr::Index { x, index, span, .. } => {
                let head = self.type_expr_allow(x);
                if self.arena.is_instantiable(head) {
                    self.instantiate_args(head, &[&**index], *span)
                } else if self.arena.is_invalid(head) {
                    head
                } else {
                    let display = self.arena.display(head);
                    self.errorf(
                        *span,
                        format!("cannot use type arguments on non-generic type {}", display),
                    );
                    self.arena.invalid()
                }
            }
            other => {
                self.errorf(other.span(), "expected a type".to_string());
                self.arena.invalid()
            }
        }
    }

    fn type_ident(&mut self, id: &Ident) -> TypeId {
        match self.lookup(&id.name) {
            None => {
                self.errorf(id.span, format!("undeclared name: {}", id.name));
                self.arena.invalid()
            }
            Some(oid) => match self.scopes.obj(oid).kind.clone() {
                ObjKind::TypeName => self.obj_type(oid),
                ObjKind::Pkg => {
                    self.errorf(
                        id.span,
                        format!("use of package {} without selector", id.name),
                    );
                    self.arena.invalid()
                }
                _ => {
                    self.errorf(id.span, format!("{} is not a type", id.name));
                    self.arena.invalid()
                }
            },
        }
    }

    fn array_len(&mut self, len: &Expr) -> u64 {
        match len {
            Expr::BasicLit(lit) => {
                if let Ok(v) = super::parse_int_literal(&lit.value) {
                    return v as u64;
                }
                self.errorf(lit.span, format!("invalid array bound {}", lit.value));
                0
            }
            Expr::Ident(id) => {
                if let Some(oid) = self.lookup(&id.name) {
                    if let Some(v) = self.scopes.obj(oid).const_val {
                        return v as u64;
                    }
                }
                self.errorf(id.span, format!("invalid array bound {}", id.name));
                0
            }
            other => {
                self.errorf(other.span(), "invalid array bound".to_string());
                0
            }
        }
    }

    /// Drive `head[args…]`: arity check, argument elaboration, and the
    /// instantiation engine.
    fn instantiate_args(&mut self, head: TypeId, args: &[&Expr], span: Span) -> TypeId {
        if self.arena.is_invalid(head) {
            for arg in args {
                self.type_expr(arg);
            }
            return head;
        }
        if !self.arena.is_instantiable(head) {
            let display = self.arena.display(head);
            self.errorf(
                span,
                format!("cannot use type arguments on non-generic type {}", display),
            );
            for arg in args {
                self.type_expr(arg);
            }
            return self.arena.invalid();
        }
        let params = self.instantiation_params(head);
        if args.len() != params.len() {
            self.errorf(
                span,
                format!(
                    "wrong number of type arguments (expected {} but got {})",
                    params.len(),
                    args.len()
                ),
            );
            return self.arena.invalid();
        }
        let mut map = TypeMap::new();
        for (param, arg) in params.iter().zip(args) {
            let t = self.type_expr(arg);
            map.insert(param.clone(), t);
        }
        self.inst().instantiate(head, map)
    }

    /// The parameters an explicit argument list binds: a partial signature
    /// binds its parent's *own* parameters (the receiver's are implicit).
    fn instantiation_params(&self, head: TypeId) -> Vec<String> {
        match self.arena.get(head) {
            Type::GenericNamed(g) => g.params.clone(),
            Type::GenericSignature(g) => g.params.clone(),
            Type::PartialSignature(p) => match self.arena.get(p.parent) {
                Type::GenericSignature(g) => g.params.clone(),
                _ => Vec::new(),
            },
            Type::PartialNamed(p) => self.arena.type_params(p.parent),
            _ => Vec::new(),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub(crate) fn expr(&mut self, e: &Expr) -> TypeId {
        match e {
            Expr::Bad(_) => self.arena.invalid(),
            Expr::Ident(id) => self.expr_ident(id),
            Expr::BasicLit(lit) => {
                let kind = match lit.kind {
                    crate::ast::LitKind::Int => BasicKind::UntypedInt,
                    crate::ast::LitKind::Float => BasicKind::UntypedFloat,
                    crate::ast::LitKind::Str => BasicKind::UntypedStr,
                    crate::ast::LitKind::Rune => BasicKind::UntypedRune,
                };
                self.arena.basic(kind)
            }
            Expr::CompositeLit { typ, elts, span: _ } => self.composite_lit(typ.as_deref(), elts),
            Expr::KeyValue { value, .. } => self.expr(value),
            Expr::FuncLit { typ, body, .. } => {
                let saved = self.current;
                self.current = self.scopes.new_scope(Some(saved));
                let sig = self.sig_data(typ);
                for field in &typ.params {
                    let t = self.type_expr(&field.typ);
                    for name in &field.names {
                        let obj =
                            Object::new(name.name.clone(), ObjKind::Var, name.span).with_type(t);
                        let _ = self.scopes.insert(self.current, obj);
                    }
                }
                self.check_stmts(&body.stmts);
                self.current = saved;
                self.arena.alloc(Type::Signature(sig))
            }
            Expr::Paren { x, .. } => self.expr(x),
            Expr::Selector { x, sel, span } => self.selector_type(x, sel, *span, false),
            Expr::Index { x, index, span, .. } => {
                let head = self.resolve_head(x);
                if self.arena.is_instantiable(head) {
                    return self.instantiate_args(head, &[&**index], *span);
                }
                self.expr(index);
                if self.arena.is_invalid(head) {
                    return head;
                }
                let base = self.arena.deref(head);
                let under = self.arena.underlying(base);
                match self.arena.get(under) {
                    Type::Slice(elem) => *elem,
                    Type::Array { elem, .. } => *elem,
                    Type::Map { elem, .. } => *elem,
                    Type::Basic(BasicKind::Str) | Type::Basic(BasicKind::UntypedStr) => {
                        self.arena.basic(BasicKind::Byte)
                    }
                    Type::TypeParam(_) | Type::Invalid => self.arena.invalid(),
                    _ => {
                        let display = self.arena.display(head);
                        self.errorf(*span, format!("cannot index {}", display));
                        self.arena.invalid()
                    }
                }
            }
            Expr::TypeArgs { x, args, span, .. } => {
                let head = self.resolve_head(x);
                let arg_refs: Vec<&Expr> = args.iter().collect();
                self.instantiate_args(head, &arg_refs, *span)
            }
            Expr::Slice { x, low, high, .. } => {
                for part in [low, high].into_iter().flatten() {
                    self.expr(part);
                }
                let t = self.expr(x);
                let under = self.arena.underlying(self.arena.deref(t));
                match self.arena.get(under) {
                    Type::Array { elem, .. } => {
                        let elem = *elem;
                        self.arena.alloc(Type::Slice(elem))
                    }
                    _ => t,
                }
            }
            Expr::TypeAssert { x, typ, .. } => {
                self.expr(x);
                match typ {
                    Some(t) => self.type_expr(t),
                    None => self.arena.invalid(),
                }
            }
            Expr::Call {
                fun, args, span, ..
            } => self.call(fun, args, *span),
            Expr::Star { x, span } => {
                if self.denotes_type(x) {
                    let base = self.type_expr(x);
                    return self.arena.alloc(Type::Pointer(base));
                }
                let t = self.expr(x);
                match self.arena.get(self.arena.underlying(t)) {
                    Type::Pointer(base) => *base,
                    Type::Invalid => self.arena.invalid(),
                    _ => {
                        let display = self.arena.display(t);
                        self.errorf(*span, format!("invalid indirect of {}", display));
                        self.arena.invalid()
                    }
                }
            }
            Expr::Unary { op, x, .. } => {
                let t = self.expr(x);
                match op {
                    crate::ast::UnOp::Addr => self.arena.alloc(Type::Pointer(t)),
                    crate::ast::UnOp::Not => self.arena.basic(BasicKind::Bool),
                    crate::ast::UnOp::Recv => {
                        let under = self.arena.underlying(t);
                        match self.arena.get(under) {
                            Type::Chan { elem, .. } => *elem,
                            _ => self.arena.invalid(),
                        }
                    }
                    _ => t,
                }
            }
            Expr::Binary { op, x, y, .. } => {
                let lt = self.expr(x);
                let rt = self.expr(y);
                use crate::ast::BinOp;
                match op {
                    BinOp::Eq
                    | BinOp::Ne
                    | BinOp::Lt
                    | BinOp::Le
                    | BinOp::Gt
                    | BinOp::Ge
                    | BinOp::LAnd
                    | BinOp::LOr => self.arena.basic(BasicKind::UntypedBool),
                    _ => {
                        if self.arena.is_invalid(lt) || self.is_untyped(lt) {
                            rt
                        } else {
                            lt
                        }
                    }
                }
            }
            // Type syntax in expression position (conversion heads,
            // arguments to make/new).
            Expr::ArrayType { .. }
            | Expr::MapType { .. }
            | Expr::ChanType { .. }
            | Expr::StructType { .. }
            | Expr::FuncTypeExpr(_)
            | Expr::InterfaceType { .. } => self.type_expr(e),
        }
    }

    fn is_untyped(&self, t: TypeId) -> bool {
        matches!(
            self.arena.get(t),
            Type::Basic(
                BasicKind::UntypedBool
                    | BasicKind::UntypedInt
                    | BasicKind::UntypedFloat
                    | BasicKind::UntypedRune
                    | BasicKind::UntypedStr
                    | BasicKind::UntypedNil
            )
        )
    }

    fn expr_ident(&mut self, id: &Ident) -> TypeId {
        if id.name == "_" {
            // The blank identifier is assignable but has no type.
            return self.arena.invalid();
        }
        match self.lookup(&id.name) {
            None => {
                self.errorf(id.span, format!("undeclared name: {}", id.name));
                self.arena.invalid()
            }
            Some(oid) => match self.scopes.obj(oid).kind.clone() {
                ObjKind::Pkg => {
                    self.errorf(
                        id.span,
                        format!("use of package {} without selector", id.name),
                    );
                    self.arena.invalid()
                }
                ObjKind::Builtin(_) => {
                    self.errorf(
                        id.span,
                        format!("use of builtin {} not in function call", id.name),
                    );
                    self.arena.invalid()
                }
                _ => self.obj_type(oid),
            },
        }
    }

    /// Resolve the head of a call, index, or type-argument expression,
    /// allowing generic results.
    fn resolve_head(&mut self, e: &Expr) -> TypeId {
        match e {
            Expr::Ident(id) => match self.lookup(&id.name) {
                None => {
                    self.errorf(id.span, format!("undeclared name: {}", id.name));
                    self.arena.invalid()
                }
                Some(oid) => match self.scopes.obj(oid).kind.clone() {
                    ObjKind::Pkg => {
                        self.errorf(
                            id.span,
                            format!("use of package {} without selector", id.name),
                        );
                        self.arena.invalid()
                    }
                    ObjKind::Builtin(_) => {
                        self.errorf(
                            id.span,
                            format!("use of builtin {} not in function call", id.name),
                        );
                        self.arena.invalid()
                    }
                    _ => self.obj_type(oid),
                },
            },
            Expr::Selector { x, sel, span } => self.selector_type(x, sel, *span, false),
            Expr::Paren { x, .. } => self.resolve_head(x),
            Expr::TypeArgs { .. } | Expr::Index { .. } => self.expr(e),
            Expr::Star { .. }
            | Expr::ArrayType { .. }
            | Expr::MapType { .. }
            | Expr::ChanType { .. }
            | Expr::StructType { .. }
            | Expr::FuncTypeExpr(_)
            | Expr::InterfaceType { .. } => self.type_expr_allow(e),
            other => self.expr(other),
        }
    }

    /// Whether the expression syntactically denotes a type.
    fn denotes_type(&self, e: &Expr) -> bool {
        match e {
            Expr::Ident(id) => self
                .lookup(&id.name)
                .map(|oid| self.scopes.obj(oid).kind == ObjKind::TypeName)
                .unwrap_or(false),
            Expr::Selector { x, sel, .. } => {
                let Some(id) = x.as_ident() else { return false };
                let Some(oid) = self.lookup(&id.name) else {
                    return false;
                };
                let obj = self.scopes.obj(oid);
                if obj.kind != ObjKind::Pkg {
                    return false;
                }
                let Some(path) = &obj.import_path else {
                    return false;
                };
                match self.imports.get(path).and_then(|p| p.exports.get(&sel.name)) {
                    Some(&member) => !matches!(
                        self.arena.get(member),
                        Type::Signature(_) | Type::GenericSignature(_)
                    ),
                    None => false,
                }
            }
            Expr::Paren { x, .. } => self.denotes_type(x),
            Expr::Star { x, .. } => self.denotes_type(x),
            Expr::TypeArgs { x, .. } | Expr::Index { x, .. } => self.denotes_type(x),
            Expr::ArrayType { .. }
            | Expr::MapType { .. }
            | Expr::ChanType { .. }
            | Expr::StructType { .. }
            | Expr::FuncTypeExpr(_)
            | Expr::InterfaceType { .. } => true,
            _ => false,
        }
    }

    /// Resolve `x.sel` — package member, struct field, or method.
    fn selector_type(&mut self, x: &Expr, sel: &Ident, span: Span, in_type_pos: bool) -> TypeId {
        if let Some(id) = x.as_ident() {
            if let Some(oid) = self.lookup(&id.name) {
                if self.scopes.obj(oid).kind == ObjKind::Pkg {
                    let path = self
                        .scopes
                        .obj(oid)
                        .import_path
                        .clone()
                        .unwrap_or_default();
                    return match self.imports.get(&path).and_then(|p| p.exports.get(&sel.name)) {
                        Some(&member) => member,
                        None => {
                            self.errorf(
                                span,
                                format!("undefined: {}.{}", id.name, sel.name),
                            );
                            self.arena.invalid()
                        }
                    };
                }
            }
        }
        if in_type_pos {
            self.errorf(span, format!("{} is not a type", sel.name));
            return self.arena.invalid();
        }
        let t = self.expr(x);
        if self.arena.is_invalid(t) {
            return t;
        }
        match self.field_or_method(t, &sel.name) {
            Some(member) => member,
            None => {
                let display = self.arena.display(t);
                self.errorf(
                    span,
                    format!("type {} has no field or method {}", display, sel.name),
                );
                self.arena.invalid()
            }
        }
    }

    fn field_or_method(&self, t: TypeId, name: &str) -> Option<TypeId> {
        let base = self.arena.deref(t);
        let under = self.arena.underlying(base);
        if let Type::Struct(data) = self.arena.get(under) {
            if let Some(field) = data.fields.iter().find(|f| f.name == name) {
                return Some(field.typ);
            }
        }
        self.arena
            .methods(base)
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.typ)
    }

    fn composite_lit(&mut self, typ: Option<&Expr>, elts: &[Expr]) -> TypeId {
        let t = match typ {
            Some(typ) => self.type_expr(typ),
            None => self.arena.invalid(),
        };
        let under = self.arena.underlying(t);
        match self.arena.get(under).clone() {
            Type::Struct(data) => {
                let display = self.arena.display(t);
                for elt in elts {
                    match elt {
                        Expr::KeyValue { key, value, .. } => {
                            if let Some(kid) = key.as_ident() {
                                if !data.fields.iter().any(|f| f.name == kid.name) {
                                    self.errorf(
                                        kid.span,
                                        format!(
                                            "unknown field {} in struct literal of type {}",
                                            kid.name, display
                                        ),
                                    );
                                }
                            }
                            self.expr(value);
                        }
                        other => {
                            self.expr(other);
                        }
                    }
                }
            }
            Type::Map { .. } => {
                for elt in elts {
                    match elt {
                        Expr::KeyValue { key, value, .. } => {
                            self.expr(key);
                            self.expr(value);
                        }
                        other => {
                            self.expr(other);
                        }
                    }
                }
            }
            _ => {
                for elt in elts {
                    match elt {
                        Expr::KeyValue { key, value, .. } => {
                            if key.as_ident().is_none() {
                                self.expr(key);
                            }
                            self.expr(value);
                        }
                        other => {
                            self.expr(other);
                        }
                    }
                }
            }
        }
        t
    }

    fn call(&mut self, fun: &Expr, args: &[Expr], span: Span) -> TypeId {
        // Builtins first; they take type arguments in value positions.
        if let Some(id) = fun.as_ident() {
            if let Some(oid) = self.lookup(&id.name) {
                if let ObjKind::Builtin(builtin) = &self.scopes.obj(oid).kind {
                    let builtin = *builtin;
                    return self.builtin_call(builtin, args, span);
                }
            }
        }

        if self.denotes_type(fun) {
            // Conversion. A bare generic conversion target is reported by
            // type_expr.
            let t = self.type_expr(fun);
            for arg in args {
                self.expr(arg);
            }
            if args.len() != 1 && !self.arena.is_invalid(t) {
                self.errorf(
                    span,
                    format!("conversion requires exactly one argument, got {}", args.len()),
                );
            }
            return t;
        }

        let ft = self.resolve_head(fun);
        if self.arena.is_invalid(ft) {
            for arg in args {
                self.expr(arg);
            }
            return ft;
        }
        match self.arena.get(ft).clone() {
            Type::Signature(sig) => self.checked_call(&sig.results, args),
            Type::ConcreteSignature(c) => self.checked_call(&c.sig.results, args),
            Type::GenericSignature(_) | Type::PartialSignature(_) => {
                self.type_args_required(span, ft);
                for arg in args {
                    self.expr(arg);
                }
                self.arena.invalid()
            }
            Type::GenericNamed(_) | Type::PartialNamed(_) => {
                self.type_args_required(span, ft);
                for arg in args {
                    self.expr(arg);
                }
                self.arena.invalid()
            }
            _ => {
                let under = self.arena.underlying(ft);
                if let Type::Signature(sig) = self.arena.get(under).clone() {
                    return self.checked_call(&sig.results, args);
                }
                if let Type::TypeParam(_) = self.arena.get(ft) {
                    for arg in args {
                        self.expr(arg);
                    }
                    // Conversion through a type parameter (T(x) inside a
                    // generic body).
                    return ft;
                }
                for arg in args {
                    self.expr(arg);
                }
                let display = self.arena.display(ft);
                self.errorf(span, format!("cannot call non-function {}", display));
                self.arena.invalid()
            }
        }
    }

    fn checked_call(&mut self, results: &[Param], args: &[Expr]) -> TypeId {
        for arg in args {
            self.expr(arg);
        }
        match results.len() {
            0 => self.arena.alloc(Type::Tuple(Vec::new())),
            1 => results[0].typ,
            _ => {
                let elems = results.iter().map(|r| r.typ).collect();
                self.arena.alloc(Type::Tuple(elems))
            }
        }
    }

    fn builtin_call(&mut self, builtin: Builtin, args: &[Expr], span: Span) -> TypeId {
        match builtin {
            Builtin::Make | Builtin::New => {
                if args.is_empty() {
                    self.errorf(span, "missing argument to make or new".to_string());
                    return self.arena.invalid();
                }
                let t = self.type_expr(&args[0]);
                for arg in &args[1..] {
                    self.expr(arg);
                }
                if builtin == Builtin::New {
                    self.arena.alloc(Type::Pointer(t))
                } else {
                    t
                }
            }
            Builtin::Len | Builtin::Cap | Builtin::Copy => {
                for arg in args {
                    self.expr(arg);
                }
                self.arena.basic(BasicKind::Int)
            }
            Builtin::Append => {
                let mut result = self.arena.invalid();
                for (i, arg) in args.iter().enumerate() {
                    let t = self.expr(arg);
                    if i == 0 {
                        result = t;
                    }
                }
                result
            }
            Builtin::Delete | Builtin::Panic | Builtin::Print | Builtin::Println => {
                for arg in args {
                    self.expr(arg);
                }
                self.arena.alloc(Type::Tuple(Vec::new()))
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub(crate) fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Bad(_) | Stmt::Empty(_) | Stmt::Branch { .. } => {}
            Stmt::Decl(decl) => self.local_decl(decl),
            Stmt::Expr(e) => {
                self.expr(e);
            }
            Stmt::Send { chan, value, .. } => {
                self.expr(chan);
                self.expr(value);
            }
            Stmt::IncDec { x, .. } => {
                self.expr(x);
            }
            Stmt::Assign { op, lhs, rhs, .. } => self.assign(*op, lhs, rhs),
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => {
                self.expr(call);
            }
            Stmt::Return { results, .. } => {
                for result in results {
                    self.expr(result);
                }
            }
            Stmt::Block(block) => {
                let saved = self.current;
                self.current = self.scopes.new_scope(Some(saved));
                self.check_stmts(&block.stmts);
                self.current = saved;
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                let saved = self.current;
                self.current = self.scopes.new_scope(Some(saved));
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                self.expr(cond);
                let body_scope = self.scopes.new_scope(Some(self.current));
                let header = self.current;
                self.current = body_scope;
                self.check_stmts(&then.stmts);
                self.current = header;
                if let Some(els) = els {
                    self.check_stmt(els);
                }
                self.current = saved;
            }
            Stmt::Switch {
                init, tag, cases, ..
            } => {
                let saved = self.current;
                self.current = self.scopes.new_scope(Some(saved));
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                for case in cases {
                    let case_scope = self.scopes.new_scope(Some(self.current));
                    let header = self.current;
                    self.current = case_scope;
                    for ce in &case.exprs {
                        self.expr(ce);
                    }
                    self.check_stmts(&case.body);
                    self.current = header;
                }
                self.current = saved;
            }
            Stmt::TypeSwitch {
                init,
                bind,
                x,
                cases,
                ..
            } => self.type_switch(init.as_deref(), bind.as_ref(), x, cases),
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                let saved = self.current;
                self.current = self.scopes.new_scope(Some(saved));
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                if let Some(post) = post {
                    self.check_stmt(post);
                }
                let header = self.current;
                self.current = self.scopes.new_scope(Some(header));
                self.check_stmts(&body.stmts);
                self.current = saved;
            }
            Stmt::Range {
                key,
                value,
                define,
                x,
                body,
                ..
            } => {
                let saved = self.current;
                self.current = self.scopes.new_scope(Some(saved));
                let xt = self.expr(x);
                let (kt, vt) = self.range_types(xt);
                let bindings = [(key, kt), (value, vt)];
                for (binding, t) in bindings {
                    if let Some(binding) = binding {
                        if *define {
                            if let Some(id) = binding.as_ident() {
                                let obj = Object::new(id.name.clone(), ObjKind::Var, id.span)
                                    .with_type(t);
                                let _ = self.scopes.insert(self.current, obj);
                            }
                        } else {
                            self.expr(binding);
                        }
                    }
                }
                self.check_stmts(&body.stmts);
                self.current = saved;
            }
        }
    }

    fn range_types(&mut self, xt: TypeId) -> (TypeId, TypeId) {
        let under = self.arena.underlying(self.arena.deref(xt));
        let int = self.arena.basic(BasicKind::Int);
        let rune = self.arena.basic(BasicKind::Rune);
        let invalid = self.arena.invalid();
        match self.arena.get(under) {
            Type::Slice(elem) => (int, *elem),
            Type::Array { elem, .. } => (int, *elem),
            Type::Map { key, elem } => (*key, *elem),
            Type::Basic(BasicKind::Str | BasicKind::UntypedStr) => (int, rune),
            Type::Chan { elem, .. } => (*elem, invalid),
            _ => (invalid, invalid),
        }
    }

    fn type_switch(
        &mut self,
        init: Option<&Stmt>,
        bind: Option<&Ident>,
        x: &Expr,
        cases: &[CaseClause],
    ) {
        let saved = self.current;
        self.current = self.scopes.new_scope(Some(saved));
        if let Some(init) = init {
            self.check_stmt(init);
        }
        let xt = self.expr(x);
        for case in cases {
            let header = self.current;
            self.current = self.scopes.new_scope(Some(header));
            let mut case_types = Vec::new();
            for ce in &case.exprs {
                // `case nil:` names the nil constant, not a type.
                if ce.as_ident().map(|id| id.name.as_str()) == Some("nil") {
                    case_types.push(self.arena.basic(BasicKind::UntypedNil));
                } else {
                    case_types.push(self.type_expr(ce));
                }
            }
            if let Some(bind) = bind {
                let t = if case_types.len() == 1 {
                    case_types[0]
                } else {
                    xt
                };
                let obj = Object::new(bind.name.clone(), ObjKind::Var, bind.span).with_type(t);
                let _ = self.scopes.insert(self.current, obj);
            }
            self.check_stmts(&case.body);
            self.current = header;
        }
        self.current = saved;
    }

    fn assign(&mut self, op: crate::ast::AssignOp, lhs: &[Expr], rhs: &[Expr]) {
        let mut rhs_types = Vec::with_capacity(rhs.len());
        for r in rhs {
            let t = self.expr(r);
            self.type_args_required(r.span(), t);
            rhs_types.push(t);
        }
        if op == crate::ast::AssignOp::Define {
            // Multi-assignment from one call distributes the result tuple.
            let distributed: Vec<TypeId> = if rhs.len() == 1 && lhs.len() > 1 {
                match self.arena.get(rhs_types[0]).clone() {
                    Type::Tuple(elems) => elems,
                    _ => vec![self.arena.invalid(); lhs.len()],
                }
            } else {
                rhs_types
            };
            for (i, l) in lhs.iter().enumerate() {
                if let Some(id) = l.as_ident() {
                    let t = distributed
                        .get(i)
                        .copied()
                        .unwrap_or_else(|| self.arena.invalid());
                    let t = self.default_type(t);
                    let obj = Object::new(id.name.clone(), ObjKind::Var, id.span).with_type(t);
                    let _ = self.scopes.insert(self.current, obj);
                } else {
                    self.errorf(
                        l.span(),
                        "non-name on left side of :=".to_string(),
                    );
                }
            }
        } else {
            for l in lhs {
                self.expr(l);
            }
        }
    }

    fn local_decl(&mut self, decl: &Decl) {
        let g = match decl {
            Decl::Gen(g) => g,
            _ => return,
        };
        match g.tok {
            DeclTok::Import => {}
            DeclTok::Const | DeclTok::Var => {
                let is_const = g.tok == DeclTok::Const;
                for spec in &g.specs {
                    if let Spec::Value {
                        names, typ, values, ..
                    } = spec
                    {
                        let annotated = typ.as_ref().map(|t| self.type_expr(t));
                        let mut value_types = Vec::with_capacity(values.len());
                        for value in values {
                            let t = self.expr(value);
                            self.type_args_required(value.span(), t);
                            value_types.push(t);
                        }
                        for (i, name) in names.iter().enumerate() {
                            let t = annotated.unwrap_or_else(|| {
                                value_types
                                    .get(i)
                                    .copied()
                                    .unwrap_or_else(|| self.arena.invalid())
                            });
                            let t = if is_const { t } else { self.default_type(t) };
                            let kind = if is_const { ObjKind::Const } else { ObjKind::Var };
                            let mut obj =
                                Object::new(name.name.clone(), ObjKind::Var, name.span).with_type(t);
                            obj.kind = kind;
                            if is_const {
                                if let Some(Expr::BasicLit(lit)) = values.get(i) {
                                    if let Ok(v) = super::parse_int_literal(&lit.value) {
                                        obj.const_val = Some(v);
                                    }
                                }
                            }
                            if let Err(_existing) = self.scopes.insert(self.current, obj) {
                                self.errorf(
                                    name.span,
                                    format!("{} redeclared in this block", name.name),
                                );
                            }
                        }
                    }
                }
            }
            DeclTok::Type => {
                for spec in &g.specs {
                    if let Spec::Type {
                        name,
                        type_params,
                        typ,
                        ..
                    } = spec
                    {
                        if type_params.is_some() {
                            self.errorf(
                                name.span,
                                "generic types must be declared at package level".to_string(),
                            );
                        }
                        let t = self.type_expr(typ);
                        let named = self.arena.alloc(Type::Named(crate::types::NamedData {
                            name: name.name.clone(),
                            pkg: None,
                            underlying: t,
                            methods: Vec::new(),
                        }));
                        let obj = Object::new(name.name.clone(), ObjKind::TypeName, name.span)
                            .with_type(named);
                        if let Err(_existing) = self.scopes.insert(self.current, obj) {
                            self.errorf(
                                name.span,
                                format!("{} redeclared in this block", name.name),
                            );
                        }
                    }
                }
            }
        }
    }
}

fn embedded_field_name(typ: &Expr) -> String {
    match typ {
        Expr::Ident(id) => id.name.clone(),
        Expr::Selector { sel, .. } => sel.name.clone(),
        Expr::Star { x, .. } => embedded_field_name(x),
        _ => String::new(),
    }
}
