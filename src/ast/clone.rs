//! Deep copies of syntax-tree fragments.
//!
//! Every node and every child list in the result is freshly allocated;
//! scalar fields (spans, node ids, tokens) are copied by value. Clones share
//! `NodeId`s with their originals, so callers must not depend on node
//! identity for semantic decisions.

use super::*;

pub fn clone_file(f: &File) -> File {
    File {
        package: f.package.clone(),
        decls: f.decls.iter().map(clone_decl).collect(),
        unresolved: f.unresolved.clone(),
        span: f.span,
    }
}

pub fn clone_decl(d: &Decl) -> Decl {
    match d {
        Decl::Bad(span) => Decl::Bad(*span),
        Decl::Gen(g) => Decl::Gen(clone_gen_decl(g)),
        Decl::Func(f) => Decl::Func(clone_func_decl(f)),
    }
}

pub fn clone_gen_decl(g: &GenDecl) -> GenDecl {
    GenDecl {
        tok: g.tok,
        specs: g.specs.iter().map(clone_spec).collect(),
        grouped: g.grouped,
        span: g.span,
    }
}

pub fn clone_func_decl(f: &FuncDecl) -> FuncDecl {
    FuncDecl {
        recv: f.recv.as_ref().map(clone_field),
        name: f.name.clone(),
        type_params: f.type_params.as_ref().map(clone_type_param_decl),
        typ: clone_func_type(&f.typ),
        body: f.body.as_ref().map(clone_block),
        span: f.span,
    }
}

pub fn clone_spec(s: &Spec) -> Spec {
    match s {
        Spec::Import { name, path, span } => Spec::Import {
            name: name.clone(),
            path: path.clone(),
            span: *span,
        },
        Spec::Value {
            names,
            typ,
            values,
            span,
        } => Spec::Value {
            names: names.clone(),
            typ: typ.as_ref().map(clone_expr),
            values: values.iter().map(clone_expr).collect(),
            span: *span,
        },
        Spec::Type {
            name,
            type_params,
            assign,
            typ,
            span,
        } => Spec::Type {
            name: name.clone(),
            type_params: type_params.as_ref().map(clone_type_param_decl),
            assign: *assign,
            typ: clone_expr(typ),
            span: *span,
        },
    }
}

pub fn clone_type_param_decl(tp: &TypeParamDecl) -> TypeParamDecl {
    TypeParamDecl {
        names: tp.names.clone(),
        span: tp.span,
    }
}

pub fn clone_field(f: &Field) -> Field {
    Field {
        names: f.names.clone(),
        typ: clone_expr(&f.typ),
        tag: f.tag.clone(),
        span: f.span,
    }
}

pub fn clone_func_type(ft: &FuncType) -> FuncType {
    FuncType {
        params: ft.params.iter().map(clone_field).collect(),
        results: ft.results.iter().map(clone_field).collect(),
        variadic: ft.variadic,
        span: ft.span,
    }
}

pub fn clone_block(b: &Block) -> Block {
    Block {
        stmts: b.stmts.iter().map(clone_stmt).collect(),
        span: b.span,
    }
}

pub fn clone_case(c: &CaseClause) -> CaseClause {
    CaseClause {
        exprs: c.exprs.iter().map(clone_expr).collect(),
        body: c.body.iter().map(clone_stmt).collect(),
        span: c.span,
    }
}

pub fn clone_stmt(s: &Stmt) -> Stmt {
    match s {
        Stmt::Bad(span) => Stmt::Bad(*span),
        Stmt::Decl(d) => Stmt::Decl(clone_decl(d)),
        Stmt::Empty(span) => Stmt::Empty(*span),
        Stmt::Expr(e) => Stmt::Expr(clone_expr(e)),
        Stmt::Send { chan, value, span } => Stmt::Send {
            chan: clone_expr(chan),
            value: clone_expr(value),
            span: *span,
        },
        Stmt::IncDec { x, inc, span } => Stmt::IncDec {
            x: clone_expr(x),
            inc: *inc,
            span: *span,
        },
        Stmt::Assign { op, lhs, rhs, span } => Stmt::Assign {
            op: *op,
            lhs: lhs.iter().map(clone_expr).collect(),
            rhs: rhs.iter().map(clone_expr).collect(),
            span: *span,
        },
        Stmt::Go { call, span } => Stmt::Go {
            call: clone_expr(call),
            span: *span,
        },
        Stmt::Defer { call, span } => Stmt::Defer {
            call: clone_expr(call),
            span: *span,
        },
        Stmt::Return { results, span } => Stmt::Return {
            results: results.iter().map(clone_expr).collect(),
            span: *span,
        },
        Stmt::Branch { kind, span } => Stmt::Branch {
            kind: *kind,
            span: *span,
        },
        Stmt::Block(b) => Stmt::Block(clone_block(b)),
        Stmt::If {
            init,
            cond,
            then,
            els,
            span,
        } => Stmt::If {
            init: init.as_deref().map(|s| Box::new(clone_stmt(s))),
            cond: clone_expr(cond),
            then: clone_block(then),
            els: els.as_deref().map(|s| Box::new(clone_stmt(s))),
            span: *span,
        },
        Stmt::Switch {
            init,
            tag,
            cases,
            span,
        } => Stmt::Switch {
            init: init.as_deref().map(|s| Box::new(clone_stmt(s))),
            tag: tag.as_ref().map(clone_expr),
            cases: cases.iter().map(clone_case).collect(),
            span: *span,
        },
        Stmt::TypeSwitch {
            init,
            bind,
            x,
            cases,
            span,
        } => Stmt::TypeSwitch {
            init: init.as_deref().map(|s| Box::new(clone_stmt(s))),
            bind: bind.clone(),
            x: clone_expr(x),
            cases: cases.iter().map(clone_case).collect(),
            span: *span,
        },
        Stmt::For {
            init,
            cond,
            post,
            body,
            span,
        } => Stmt::For {
            init: init.as_deref().map(|s| Box::new(clone_stmt(s))),
            cond: cond.as_ref().map(clone_expr),
            post: post.as_deref().map(|s| Box::new(clone_stmt(s))),
            body: clone_block(body),
            span: *span,
        },
        Stmt::Range {
            key,
            value,
            define,
            x,
            body,
            span,
        } => Stmt::Range {
            key: key.as_ref().map(clone_expr),
            value: value.as_ref().map(clone_expr),
            define: *define,
            x: clone_expr(x),
            body: clone_block(body),
            span: *span,
        },
    }
}

pub fn clone_expr(e: &Expr) -> Expr {
    match e {
        Expr::Bad(span) => Expr::Bad(*span),
        Expr::Ident(id) => Expr::Ident(id.clone()),
        Expr::BasicLit(lit) => Expr::BasicLit(lit.clone()),
        Expr::CompositeLit { typ, elts, span } => Expr::CompositeLit {
            typ: typ.as_deref().map(|t| Box::new(clone_expr(t))),
            elts: elts.iter().map(clone_expr).collect(),
            span: *span,
        },
        Expr::KeyValue { key, value, span } => Expr::KeyValue {
            key: Box::new(clone_expr(key)),
            value: Box::new(clone_expr(value)),
            span: *span,
        },
        Expr::FuncLit { typ, body, span } => Expr::FuncLit {
            typ: clone_func_type(typ),
            body: clone_block(body),
            span: *span,
        },
        Expr::Paren { x, span } => Expr::Paren {
            x: Box::new(clone_expr(x)),
            span: *span,
        },
        Expr::Selector { x, sel, span } => Expr::Selector {
            x: Box::new(clone_expr(x)),
            sel: sel.clone(),
            span: *span,
        },
        Expr::Index { id, x, index, span } => Expr::Index {
            id: *id,
            x: Box::new(clone_expr(x)),
            index: Box::new(clone_expr(index)),
            span: *span,
        },
        Expr::TypeArgs { id, x, args, span } => Expr::TypeArgs {
            id: *id,
            x: Box::new(clone_expr(x)),
            args: args.iter().map(clone_expr).collect(),
            span: *span,
        },
        Expr::Slice { x, low, high, span } => Expr::Slice {
            x: Box::new(clone_expr(x)),
            low: low.as_deref().map(|e| Box::new(clone_expr(e))),
            high: high.as_deref().map(|e| Box::new(clone_expr(e))),
            span: *span,
        },
        Expr::TypeAssert { x, typ, span } => Expr::TypeAssert {
            x: Box::new(clone_expr(x)),
            typ: typ.as_deref().map(|t| Box::new(clone_expr(t))),
            span: *span,
        },
        Expr::Call {
            fun,
            args,
            ellipsis,
            span,
        } => Expr::Call {
            fun: Box::new(clone_expr(fun)),
            args: args.iter().map(clone_expr).collect(),
            ellipsis: *ellipsis,
            span: *span,
        },
        Expr::Star { x, span } => Expr::Star {
            x: Box::new(clone_expr(x)),
            span: *span,
        },
        Expr::Unary { op, x, span } => Expr::Unary {
            op: *op,
            x: Box::new(clone_expr(x)),
            span: *span,
        },
        Expr::Binary { op, x, y, span } => Expr::Binary {
            op: *op,
            x: Box::new(clone_expr(x)),
            y: Box::new(clone_expr(y)),
            span: *span,
        },
        Expr::ArrayType { len, elt, span } => Expr::ArrayType {
            len: len.as_deref().map(|e| Box::new(clone_expr(e))),
            elt: Box::new(clone_expr(elt)),
            span: *span,
        },
        Expr::StructType { fields, span } => Expr::StructType {
            fields: fields.iter().map(clone_field).collect(),
            span: *span,
        },
        Expr::FuncTypeExpr(ft) => Expr::FuncTypeExpr(clone_func_type(ft)),
        Expr::InterfaceType { span } => Expr::InterfaceType { span: *span },
        Expr::MapType { key, value, span } => Expr::MapType {
            key: Box::new(clone_expr(key)),
            value: Box::new(clone_expr(value)),
            span: *span,
        },
        Expr::ChanType { dir, value, span } => Expr::ChanType {
            dir: *dir,
            value: Box::new(clone_expr(value)),
            span: *span,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::compare::{equal_expr, Mode};

    fn sample_expr() -> Expr {
        Expr::Call {
            fun: Box::new(Expr::TypeArgs {
                id: NodeId(7),
                x: Box::new(Expr::ident("Print")),
                args: vec![Expr::ident("int")],
                span: Span::new(0, 10),
            }),
            args: vec![Expr::BasicLit(BasicLit {
                kind: LitKind::Int,
                value: "5".to_string(),
                span: Span::new(11, 12),
            })],
            ellipsis: false,
            span: Span::new(0, 13),
        }
    }

    #[test]
    fn clone_is_structurally_equal() {
        let e = sample_expr();
        let c = clone_expr(&e);
        assert!(equal_expr(&e, &c, Mode::empty()));
    }

    #[test]
    fn clone_does_not_share_children() {
        let e = sample_expr();
        let mut c = clone_expr(&e);
        // Mutating the clone must leave the original untouched.
        if let Expr::Call { fun, .. } = &mut c {
            if let Expr::TypeArgs { args, .. } = fun.as_mut() {
                args[0] = Expr::ident("string");
            }
        }
        if let Expr::Call { fun, .. } = &e {
            if let Expr::TypeArgs { args, .. } = fun.as_ref() {
                assert_eq!(args[0].as_ident().unwrap().name, "int");
            }
        }
    }

    #[test]
    fn clone_preserves_node_ids_and_spans() {
        let e = sample_expr();
        let c = clone_expr(&e);
        match (&e, &c) {
            (Expr::Call { fun: f1, span: s1, .. }, Expr::Call { fun: f2, span: s2, .. }) => {
                assert_eq!(s1, s2);
                match (f1.as_ref(), f2.as_ref()) {
                    (Expr::TypeArgs { id: i1, .. }, Expr::TypeArgs { id: i2, .. }) => {
                        assert_eq!(i1, i2)
                    }
                    _ => panic!("expected type-arg expressions"),
                }
            }
            _ => panic!("expected call expressions"),
        }
    }
}
