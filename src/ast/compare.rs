//! Structural equality of syntax trees with configurable tolerances.
//!
//! Two nodes are equal when they have the same variant and equal children,
//! recursively, in source order. Spans are compared unless
//! [`Mode::IGNORE_POS`] is set; the per-file unresolved list is compared
//! unless [`Mode::IGNORE_UNRESOLVED`] is set. `NodeId`s are never compared.
//! This module drives the golden-file tests and has no effect on
//! compilation.

use std::ops::BitOr;

use super::*;

/// Comparison tolerance flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u8);

impl Mode {
    /// Ignore every source-position field.
    pub const IGNORE_POS: Mode = Mode(1);
    /// Ignore the per-file set of unresolved identifiers.
    pub const IGNORE_UNRESOLVED: Mode = Mode(2);

    pub fn empty() -> Mode {
        Mode(0)
    }

    pub fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Mode {
    type Output = Mode;

    fn bitor(self, rhs: Mode) -> Mode {
        Mode(self.0 | rhs.0)
    }
}

fn spans_eq(a: Span, b: Span, mode: Mode) -> bool {
    mode.contains(Mode::IGNORE_POS) || a == b
}

fn idents_eq(a: &Ident, b: &Ident, mode: Mode) -> bool {
    a.name == b.name && spans_eq(a.span, b.span, mode)
}

fn opt_idents_eq(a: &Option<Ident>, b: &Option<Ident>, mode: Mode) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => idents_eq(a, b, mode),
        _ => false,
    }
}

fn ident_lists_eq(a: &[Ident], b: &[Ident], mode: Mode) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| idents_eq(x, y, mode))
}

fn lits_eq(a: &BasicLit, b: &BasicLit, mode: Mode) -> bool {
    a.kind == b.kind && a.value == b.value && spans_eq(a.span, b.span, mode)
}

fn opt_exprs_eq(a: Option<&Expr>, b: Option<&Expr>, mode: Mode) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => equal_expr(a, b, mode),
        _ => false,
    }
}

fn expr_lists_eq(a: &[Expr], b: &[Expr], mode: Mode) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal_expr(x, y, mode))
}

fn opt_stmts_eq(a: Option<&Stmt>, b: Option<&Stmt>, mode: Mode) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => equal_stmt(a, b, mode),
        _ => false,
    }
}

fn stmt_lists_eq(a: &[Stmt], b: &[Stmt], mode: Mode) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal_stmt(x, y, mode))
}

pub fn equal_file(a: &File, b: &File, mode: Mode) -> bool {
    if !idents_eq(&a.package, &b.package, mode) || !spans_eq(a.span, b.span, mode) {
        return false;
    }
    if !mode.contains(Mode::IGNORE_UNRESOLVED) && a.unresolved != b.unresolved {
        return false;
    }
    a.decls.len() == b.decls.len()
        && a.decls
            .iter()
            .zip(&b.decls)
            .all(|(x, y)| equal_decl(x, y, mode))
}

pub fn equal_decl(a: &Decl, b: &Decl, mode: Mode) -> bool {
    match (a, b) {
        (Decl::Bad(s1), Decl::Bad(s2)) => spans_eq(*s1, *s2, mode),
        (Decl::Gen(g1), Decl::Gen(g2)) => {
            g1.tok == g2.tok
                && g1.grouped == g2.grouped
                && spans_eq(g1.span, g2.span, mode)
                && g1.specs.len() == g2.specs.len()
                && g1
                    .specs
                    .iter()
                    .zip(&g2.specs)
                    .all(|(x, y)| equal_spec(x, y, mode))
        }
        (Decl::Func(f1), Decl::Func(f2)) => equal_func_decl(f1, f2, mode),
        _ => false,
    }
}

pub fn equal_func_decl(a: &FuncDecl, b: &FuncDecl, mode: Mode) -> bool {
    let recv_eq = match (&a.recv, &b.recv) {
        (None, None) => true,
        (Some(r1), Some(r2)) => equal_field(r1, r2, mode),
        _ => false,
    };
    recv_eq
        && idents_eq(&a.name, &b.name, mode)
        && equal_type_params(&a.type_params, &b.type_params, mode)
        && equal_func_type(&a.typ, &b.typ, mode)
        && match (&a.body, &b.body) {
            (None, None) => true,
            (Some(b1), Some(b2)) => equal_block(b1, b2, mode),
            _ => false,
        }
        && spans_eq(a.span, b.span, mode)
}

pub fn equal_spec(a: &Spec, b: &Spec, mode: Mode) -> bool {
    match (a, b) {
        (
            Spec::Import {
                name: n1,
                path: p1,
                span: s1,
            },
            Spec::Import {
                name: n2,
                path: p2,
                span: s2,
            },
        ) => opt_idents_eq(n1, n2, mode) && lits_eq(p1, p2, mode) && spans_eq(*s1, *s2, mode),
        (
            Spec::Value {
                names: n1,
                typ: t1,
                values: v1,
                span: s1,
            },
            Spec::Value {
                names: n2,
                typ: t2,
                values: v2,
                span: s2,
            },
        ) => {
            ident_lists_eq(n1, n2, mode)
                && opt_exprs_eq(t1.as_ref(), t2.as_ref(), mode)
                && expr_lists_eq(v1, v2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Spec::Type {
                name: n1,
                type_params: tp1,
                assign: a1,
                typ: t1,
                span: s1,
            },
            Spec::Type {
                name: n2,
                type_params: tp2,
                assign: a2,
                typ: t2,
                span: s2,
            },
        ) => {
            idents_eq(n1, n2, mode)
                && equal_type_params(tp1, tp2, mode)
                && a1 == a2
                && equal_expr(t1, t2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        _ => false,
    }
}

fn equal_type_params(
    a: &Option<TypeParamDecl>,
    b: &Option<TypeParamDecl>,
    mode: Mode,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => ident_lists_eq(&a.names, &b.names, mode) && spans_eq(a.span, b.span, mode),
        _ => false,
    }
}

pub fn equal_field(a: &Field, b: &Field, mode: Mode) -> bool {
    let tag_eq = match (&a.tag, &b.tag) {
        (None, None) => true,
        (Some(t1), Some(t2)) => lits_eq(t1, t2, mode),
        _ => false,
    };
    ident_lists_eq(&a.names, &b.names, mode)
        && equal_expr(&a.typ, &b.typ, mode)
        && tag_eq
        && spans_eq(a.span, b.span, mode)
}

fn field_lists_eq(a: &[Field], b: &[Field], mode: Mode) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal_field(x, y, mode))
}

pub fn equal_func_type(a: &FuncType, b: &FuncType, mode: Mode) -> bool {
    field_lists_eq(&a.params, &b.params, mode)
        && field_lists_eq(&a.results, &b.results, mode)
        && a.variadic == b.variadic
        && spans_eq(a.span, b.span, mode)
}

pub fn equal_block(a: &Block, b: &Block, mode: Mode) -> bool {
    stmt_lists_eq(&a.stmts, &b.stmts, mode) && spans_eq(a.span, b.span, mode)
}

fn equal_case(a: &CaseClause, b: &CaseClause, mode: Mode) -> bool {
    expr_lists_eq(&a.exprs, &b.exprs, mode)
        && stmt_lists_eq(&a.body, &b.body, mode)
        && spans_eq(a.span, b.span, mode)
}

fn case_lists_eq(a: &[CaseClause], b: &[CaseClause], mode: Mode) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal_case(x, y, mode))
}

pub fn equal_stmt(a: &Stmt, b: &Stmt, mode: Mode) -> bool {
    match (a, b) {
        (Stmt::Bad(s1), Stmt::Bad(s2)) => spans_eq(*s1, *s2, mode),
        (Stmt::Decl(d1), Stmt::Decl(d2)) => equal_decl(d1, d2, mode),
        (Stmt::Empty(s1), Stmt::Empty(s2)) => spans_eq(*s1, *s2, mode),
        (Stmt::Expr(e1), Stmt::Expr(e2)) => equal_expr(e1, e2, mode),
        (
            Stmt::Send {
                chan: c1,
                value: v1,
                span: s1,
            },
            Stmt::Send {
                chan: c2,
                value: v2,
                span: s2,
            },
        ) => equal_expr(c1, c2, mode) && equal_expr(v1, v2, mode) && spans_eq(*s1, *s2, mode),
        (
            Stmt::IncDec {
                x: x1,
                inc: i1,
                span: s1,
            },
            Stmt::IncDec {
                x: x2,
                inc: i2,
                span: s2,
            },
        ) => equal_expr(x1, x2, mode) && i1 == i2 && spans_eq(*s1, *s2, mode),
        (
            Stmt::Assign {
                op: o1,
                lhs: l1,
                rhs: r1,
                span: s1,
            },
            Stmt::Assign {
                op: o2,
                lhs: l2,
                rhs: r2,
                span: s2,
            },
        ) => {
            o1 == o2
                && expr_lists_eq(l1, l2, mode)
                && expr_lists_eq(r1, r2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (Stmt::Go { call: c1, span: s1 }, Stmt::Go { call: c2, span: s2 }) => {
            equal_expr(c1, c2, mode) && spans_eq(*s1, *s2, mode)
        }
        (
            Stmt::Defer { call: c1, span: s1 },
            Stmt::Defer { call: c2, span: s2 },
        ) => equal_expr(c1, c2, mode) && spans_eq(*s1, *s2, mode),
        (
            Stmt::Return {
                results: r1,
                span: s1,
            },
            Stmt::Return {
                results: r2,
                span: s2,
            },
        ) => expr_lists_eq(r1, r2, mode) && spans_eq(*s1, *s2, mode),
        (
            Stmt::Branch { kind: k1, span: s1 },
            Stmt::Branch { kind: k2, span: s2 },
        ) => k1 == k2 && spans_eq(*s1, *s2, mode),
        (Stmt::Block(b1), Stmt::Block(b2)) => equal_block(b1, b2, mode),
        (
            Stmt::If {
                init: i1,
                cond: c1,
                then: t1,
                els: e1,
                span: s1,
            },
            Stmt::If {
                init: i2,
                cond: c2,
                then: t2,
                els: e2,
                span: s2,
            },
        ) => {
            opt_stmts_eq(i1.as_deref(), i2.as_deref(), mode)
                && equal_expr(c1, c2, mode)
                && equal_block(t1, t2, mode)
                && opt_stmts_eq(e1.as_deref(), e2.as_deref(), mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Stmt::Switch {
                init: i1,
                tag: t1,
                cases: c1,
                span: s1,
            },
            Stmt::Switch {
                init: i2,
                tag: t2,
                cases: c2,
                span: s2,
            },
        ) => {
            opt_stmts_eq(i1.as_deref(), i2.as_deref(), mode)
                && opt_exprs_eq(t1.as_ref(), t2.as_ref(), mode)
                && case_lists_eq(c1, c2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Stmt::TypeSwitch {
                init: i1,
                bind: b1,
                x: x1,
                cases: c1,
                span: s1,
            },
            Stmt::TypeSwitch {
                init: i2,
                bind: b2,
                x: x2,
                cases: c2,
                span: s2,
            },
        ) => {
            opt_stmts_eq(i1.as_deref(), i2.as_deref(), mode)
                && opt_idents_eq(b1, b2, mode)
                && equal_expr(x1, x2, mode)
                && case_lists_eq(c1, c2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Stmt::For {
                init: i1,
                cond: c1,
                post: p1,
                body: b1,
                span: s1,
            },
            Stmt::For {
                init: i2,
                cond: c2,
                post: p2,
                body: b2,
                span: s2,
            },
        ) => {
            opt_stmts_eq(i1.as_deref(), i2.as_deref(), mode)
                && opt_exprs_eq(c1.as_ref(), c2.as_ref(), mode)
                && opt_stmts_eq(p1.as_deref(), p2.as_deref(), mode)
                && equal_block(b1, b2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Stmt::Range {
                key: k1,
                value: v1,
                define: d1,
                x: x1,
                body: b1,
                span: s1,
            },
            Stmt::Range {
                key: k2,
                value: v2,
                define: d2,
                x: x2,
                body: b2,
                span: s2,
            },
        ) => {
            opt_exprs_eq(k1.as_ref(), k2.as_ref(), mode)
                && opt_exprs_eq(v1.as_ref(), v2.as_ref(), mode)
                && d1 == d2
                && equal_expr(x1, x2, mode)
                && equal_block(b1, b2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        _ => false,
    }
}

pub fn equal_expr(a: &Expr, b: &Expr, mode: Mode) -> bool {
    match (a, b) {
        (Expr::Bad(s1), Expr::Bad(s2)) => spans_eq(*s1, *s2, mode),
        (Expr::Ident(i1), Expr::Ident(i2)) => idents_eq(i1, i2, mode),
        (Expr::BasicLit(l1), Expr::BasicLit(l2)) => lits_eq(l1, l2, mode),
        (
            Expr::CompositeLit {
                typ: t1,
                elts: e1,
                span: s1,
            },
            Expr::CompositeLit {
                typ: t2,
                elts: e2,
                span: s2,
            },
        ) => {
            opt_exprs_eq(t1.as_deref(), t2.as_deref(), mode)
                && expr_lists_eq(e1, e2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Expr::KeyValue {
                key: k1,
                value: v1,
                span: s1,
            },
            Expr::KeyValue {
                key: k2,
                value: v2,
                span: s2,
            },
        ) => equal_expr(k1, k2, mode) && equal_expr(v1, v2, mode) && spans_eq(*s1, *s2, mode),
        (
            Expr::FuncLit {
                typ: t1,
                body: b1,
                span: s1,
            },
            Expr::FuncLit {
                typ: t2,
                body: b2,
                span: s2,
            },
        ) => equal_func_type(t1, t2, mode) && equal_block(b1, b2, mode) && spans_eq(*s1, *s2, mode),
        (Expr::Paren { x: x1, span: s1 }, Expr::Paren { x: x2, span: s2 }) => {
            equal_expr(x1, x2, mode) && spans_eq(*s1, *s2, mode)
        }
        (
            Expr::Selector {
                x: x1,
                sel: se1,
                span: s1,
            },
            Expr::Selector {
                x: x2,
                sel: se2,
                span: s2,
            },
        ) => equal_expr(x1, x2, mode) && idents_eq(se1, se2, mode) && spans_eq(*s1, *s2, mode),
        (
            Expr::Index {
                x: x1,
                index: i1,
                span: s1,
                ..
            },
            Expr::Index {
                x: x2,
                index: i2,
                span: s2,
                ..
            },
        ) => equal_expr(x1, x2, mode) && equal_expr(i1, i2, mode) && spans_eq(*s1, *s2, mode),
        (
            Expr::TypeArgs {
                x: x1,
                args: a1,
                span: s1,
                ..
            },
            Expr::TypeArgs {
                x: x2,
                args: a2,
                span: s2,
                ..
            },
        ) => equal_expr(x1, x2, mode) && expr_lists_eq(a1, a2, mode) && spans_eq(*s1, *s2, mode),
        (
            Expr::Slice {
                x: x1,
                low: l1,
                high: h1,
                span: s1,
            },
            Expr::Slice {
                x: x2,
                low: l2,
                high: h2,
                span: s2,
            },
        ) => {
            equal_expr(x1, x2, mode)
                && opt_exprs_eq(l1.as_deref(), l2.as_deref(), mode)
                && opt_exprs_eq(h1.as_deref(), h2.as_deref(), mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Expr::TypeAssert {
                x: x1,
                typ: t1,
                span: s1,
            },
            Expr::TypeAssert {
                x: x2,
                typ: t2,
                span: s2,
            },
        ) => {
            equal_expr(x1, x2, mode)
                && opt_exprs_eq(t1.as_deref(), t2.as_deref(), mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Expr::Call {
                fun: f1,
                args: a1,
                ellipsis: e1,
                span: s1,
            },
            Expr::Call {
                fun: f2,
                args: a2,
                ellipsis: e2,
                span: s2,
            },
        ) => {
            equal_expr(f1, f2, mode)
                && expr_lists_eq(a1, a2, mode)
                && e1 == e2
                && spans_eq(*s1, *s2, mode)
        }
        (Expr::Star { x: x1, span: s1 }, Expr::Star { x: x2, span: s2 }) => {
            equal_expr(x1, x2, mode) && spans_eq(*s1, *s2, mode)
        }
        (
            Expr::Unary {
                op: o1,
                x: x1,
                span: s1,
            },
            Expr::Unary {
                op: o2,
                x: x2,
                span: s2,
            },
        ) => o1 == o2 && equal_expr(x1, x2, mode) && spans_eq(*s1, *s2, mode),
        (
            Expr::Binary {
                op: o1,
                x: x1,
                y: y1,
                span: s1,
            },
            Expr::Binary {
                op: o2,
                x: x2,
                y: y2,
                span: s2,
            },
        ) => {
            o1 == o2
                && equal_expr(x1, x2, mode)
                && equal_expr(y1, y2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Expr::ArrayType {
                len: l1,
                elt: e1,
                span: s1,
            },
            Expr::ArrayType {
                len: l2,
                elt: e2,
                span: s2,
            },
        ) => {
            opt_exprs_eq(l1.as_deref(), l2.as_deref(), mode)
                && equal_expr(e1, e2, mode)
                && spans_eq(*s1, *s2, mode)
        }
        (
            Expr::StructType {
                fields: f1,
                span: s1,
            },
            Expr::StructType {
                fields: f2,
                span: s2,
            },
        ) => field_lists_eq(f1, f2, mode) && spans_eq(*s1, *s2, mode),
        (Expr::FuncTypeExpr(t1), Expr::FuncTypeExpr(t2)) => equal_func_type(t1, t2, mode),
        (Expr::InterfaceType { span: s1 }, Expr::InterfaceType { span: s2 }) => {
            spans_eq(*s1, *s2, mode)
        }
        (
            Expr::MapType {
                key: k1,
                value: v1,
                span: s1,
            },
            Expr::MapType {
                key: k2,
                value: v2,
                span: s2,
            },
        ) => equal_expr(k1, k2, mode) && equal_expr(v1, v2, mode) && spans_eq(*s1, *s2, mode),
        (
            Expr::ChanType {
                dir: d1,
                value: v1,
                span: s1,
            },
            Expr::ChanType {
                dir: d2,
                value: v2,
                span: s2,
            },
        ) => d1 == d2 && equal_expr(v1, v2, mode) && spans_eq(*s1, *s2, mode),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident_at(name: &str, start: usize) -> Expr {
        Expr::Ident(Ident::with_span(name, Span::new(start, start + name.len())))
    }

    #[test]
    fn different_variants_never_equal() {
        let a = Expr::ident("x");
        let b = Expr::BasicLit(BasicLit {
            kind: LitKind::Int,
            value: "1".to_string(),
            span: Span::default(),
        });
        assert!(!equal_expr(&a, &b, Mode::empty()));
        assert!(!equal_expr(&a, &b, Mode::IGNORE_POS));
    }

    #[test]
    fn positions_respected_by_default() {
        let a = ident_at("x", 0);
        let b = ident_at("x", 9);
        assert!(!equal_expr(&a, &b, Mode::empty()));
        assert!(equal_expr(&a, &b, Mode::IGNORE_POS));
    }

    #[test]
    fn node_ids_are_not_compared() {
        let a = Expr::Index {
            id: NodeId(1),
            x: Box::new(Expr::ident("xs")),
            index: Box::new(Expr::ident("i")),
            span: Span::default(),
        };
        let b = Expr::Index {
            id: NodeId(99),
            x: Box::new(Expr::ident("xs")),
            index: Box::new(Expr::ident("i")),
            span: Span::default(),
        };
        assert!(equal_expr(&a, &b, Mode::empty()));
    }

    #[test]
    fn unresolved_list_toleration() {
        let mk = |unresolved: Vec<&str>| File {
            package: Ident::new("main"),
            decls: vec![],
            unresolved: unresolved.into_iter().map(String::from).collect(),
            span: Span::default(),
        };
        let a = mk(vec!["fmt"]);
        let b = mk(vec![]);
        assert!(!equal_file(&a, &b, Mode::empty()));
        assert!(equal_file(&a, &b, Mode::IGNORE_UNRESOLVED));
        assert!(equal_file(
            &a,
            &b,
            Mode::IGNORE_POS | Mode::IGNORE_UNRESOLVED
        ));
    }

    #[test]
    fn slice_comparison_is_length_aware() {
        let a = Expr::TypeArgs {
            id: NodeId(0),
            x: Box::new(Expr::ident("Box")),
            args: vec![Expr::ident("int")],
            span: Span::default(),
        };
        let b = Expr::TypeArgs {
            id: NodeId(0),
            x: Box::new(Expr::ident("Box")),
            args: vec![Expr::ident("int"), Expr::ident("string")],
            span: Span::default(),
        };
        assert!(!equal_expr(&a, &b, Mode::empty()));
    }
}
