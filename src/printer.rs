//! Deterministic source renderer for syntax trees.
//!
//! The output format is fixed: tab indentation, a single blank line between
//! top-level declarations, no column alignment. Printing the same tree twice
//! yields byte-identical output; the golden transformer tests are written
//! against this exact format.
//!
//! [`expr_string`] renders a lone expression with the same rules. The
//! transformer uses it as the canonical text of a type argument, so its
//! output for type shapes must never change without updating the mangling
//! tests.

use crate::ast::*;

/// Render a whole file.
pub fn print_file(file: &File) -> String {
    let mut p = Printer::new();
    p.file(file);
    p.out
}

/// Render a declaration (top-level formatting, no trailing newline).
pub fn print_decl(decl: &Decl) -> String {
    let mut p = Printer::new();
    p.decl(decl);
    p.out
}

/// Render a lone expression (canonical text for type arguments).
pub fn expr_string(e: &Expr) -> String {
    let mut p = Printer::new();
    p.expr(e);
    p.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    // --- file and declarations ---

    fn file(&mut self, file: &File) {
        self.push("package ");
        self.push(&file.package.name);
        self.push("\n");
        for decl in &file.decls {
            self.push("\n");
            self.decl(decl);
            self.push("\n");
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Bad(_) => self.push("/* bad declaration */"),
            Decl::Gen(g) => self.gen_decl(g),
            Decl::Func(f) => self.func_decl(f),
        }
    }

    fn gen_decl(&mut self, g: &GenDecl) {
        self.push(g.tok.keyword());
        if g.grouped || g.specs.len() > 1 {
            self.push(" (");
            self.indent += 1;
            for spec in &g.specs {
                self.newline();
                self.spec(spec);
            }
            self.indent -= 1;
            self.newline();
            self.push(")");
        } else if let Some(spec) = g.specs.first() {
            self.push(" ");
            self.spec(spec);
        }
    }

    fn spec(&mut self, spec: &Spec) {
        match spec {
            Spec::Import { name, path, .. } => {
                if let Some(name) = name {
                    self.push(&name.name);
                    self.push(" ");
                }
                self.push(&path.value);
            }
            Spec::Value {
                names,
                typ,
                values,
                ..
            } => {
                self.ident_list(names);
                if let Some(typ) = typ {
                    self.push(" ");
                    self.expr(typ);
                }
                if !values.is_empty() {
                    self.push(" = ");
                    self.expr_list(values);
                }
            }
            Spec::Type {
                name,
                type_params,
                assign,
                typ,
                ..
            } => {
                self.push(&name.name);
                if let Some(tp) = type_params {
                    self.type_param_decl(tp);
                }
                if *assign {
                    self.push(" = ");
                } else {
                    self.push(" ");
                }
                self.expr(typ);
            }
        }
    }

    fn type_param_decl(&mut self, tp: &TypeParamDecl) {
        self.push("[");
        self.ident_list(&tp.names);
        self.push("]");
    }

    fn func_decl(&mut self, f: &FuncDecl) {
        self.push("func ");
        if let Some(recv) = &f.recv {
            self.push("(");
            self.field(recv);
            self.push(") ");
        }
        self.push(&f.name.name);
        if let Some(tp) = &f.type_params {
            self.type_param_decl(tp);
        }
        self.signature(&f.typ);
        if let Some(body) = &f.body {
            self.push(" ");
            self.block(body);
        }
    }

    fn signature(&mut self, ft: &FuncType) {
        self.push("(");
        for (i, param) in ft.params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            if ft.variadic && i == ft.params.len() - 1 {
                self.variadic_field(param);
            } else {
                self.field(param);
            }
        }
        self.push(")");
        match ft.results.len() {
            0 => {}
            1 if ft.results[0].names.is_empty() => {
                self.push(" ");
                self.expr(&ft.results[0].typ);
            }
            _ => {
                self.push(" (");
                for (i, res) in ft.results.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.field(res);
                }
                self.push(")");
            }
        }
    }

    fn field(&mut self, f: &Field) {
        if !f.names.is_empty() {
            self.ident_list(&f.names);
            self.push(" ");
        }
        self.expr(&f.typ);
        if let Some(tag) = &f.tag {
            self.push(" ");
            self.push(&tag.value);
        }
    }

    fn variadic_field(&mut self, f: &Field) {
        if !f.names.is_empty() {
            self.ident_list(&f.names);
            self.push(" ");
        }
        self.push("...");
        self.expr(&f.typ);
        if let Some(tag) = &f.tag {
            self.push(" ");
            self.push(&tag.value);
        }
    }

    fn ident_list(&mut self, names: &[Ident]) {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(&name.name);
        }
    }

    fn expr_list(&mut self, exprs: &[Expr]) {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(e);
        }
    }

    // --- statements ---

    fn block(&mut self, b: &Block) {
        if b.stmts.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.indent += 1;
        for stmt in &b.stmts {
            self.newline();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Bad(_) => self.push("/* bad statement */"),
            Stmt::Decl(d) => self.decl(d),
            Stmt::Empty(_) => {}
            Stmt::Expr(e) => self.expr(e),
            Stmt::Send { chan, value, .. } => {
                self.expr(chan);
                self.push(" <- ");
                self.expr(value);
            }
            Stmt::IncDec { x, inc, .. } => {
                self.expr(x);
                self.push(if *inc { "++" } else { "--" });
            }
            Stmt::Assign { op, lhs, rhs, .. } => {
                self.expr_list(lhs);
                self.push(" ");
                self.push(op.symbol());
                self.push(" ");
                self.expr_list(rhs);
            }
            Stmt::Go { call, .. } => {
                self.push("go ");
                self.expr(call);
            }
            Stmt::Defer { call, .. } => {
                self.push("defer ");
                self.expr(call);
            }
            Stmt::Return { results, .. } => {
                self.push("return");
                if !results.is_empty() {
                    self.push(" ");
                    self.expr_list(results);
                }
            }
            Stmt::Branch { kind, .. } => self.push(kind.keyword()),
            Stmt::Block(b) => self.block(b),
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                self.push("if ");
                if let Some(init) = init {
                    self.stmt(init);
                    self.push("; ");
                }
                self.expr(cond);
                self.push(" ");
                self.block_nonempty(then);
                if let Some(els) = els {
                    self.push(" else ");
                    self.stmt(els);
                }
            }
            Stmt::Switch {
                init, tag, cases, ..
            } => {
                self.push("switch ");
                if let Some(init) = init {
                    self.stmt(init);
                    self.push("; ");
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                    self.push(" ");
                }
                self.case_block(cases);
            }
            Stmt::TypeSwitch {
                init,
                bind,
                x,
                cases,
                ..
            } => {
                self.push("switch ");
                if let Some(init) = init {
                    self.stmt(init);
                    self.push("; ");
                }
                if let Some(bind) = bind {
                    self.push(&bind.name);
                    self.push(" := ");
                }
                self.expr(x);
                self.push(".(type) ");
                self.case_block(cases);
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.push("for ");
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        self.stmt(init);
                    }
                    self.push("; ");
                    if let Some(cond) = cond {
                        self.expr(cond);
                    }
                    self.push("; ");
                    if let Some(post) = post {
                        self.stmt(post);
                    }
                    self.push(" ");
                } else if let Some(cond) = cond {
                    self.expr(cond);
                    self.push(" ");
                }
                self.block_nonempty(body);
            }
            Stmt::Range {
                key,
                value,
                define,
                x,
                body,
                ..
            } => {
                self.push("for ");
                if let Some(key) = key {
                    self.expr(key);
                    if let Some(value) = value {
                        self.push(", ");
                        self.expr(value);
                    }
                    self.push(if *define { " := " } else { " = " });
                }
                self.push("range ");
                self.expr(x);
                self.push(" ");
                self.block_nonempty(body);
            }
        }
    }

    /// Control-flow bodies print `{` and `}` on separate lines even when
    /// empty, matching the statement layout around them.
    fn block_nonempty(&mut self, b: &Block) {
        if b.stmts.is_empty() {
            self.push("{");
            self.newline();
            self.push("}");
            return;
        }
        self.block(b);
    }

    fn case_block(&mut self, cases: &[CaseClause]) {
        self.push("{");
        for case in cases {
            self.newline();
            if case.exprs.is_empty() {
                self.push("default:");
            } else {
                self.push("case ");
                self.expr_list(&case.exprs);
                self.push(":");
            }
            self.indent += 1;
            for stmt in &case.body {
                self.newline();
                self.stmt(stmt);
            }
            self.indent -= 1;
        }
        self.newline();
        self.push("}");
    }

    // --- expressions ---

    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Bad(_) => self.push("/* bad expression */"),
            Expr::Ident(id) => self.push(&id.name),
            Expr::BasicLit(lit) => self.push(&lit.value),
            Expr::CompositeLit { typ, elts, .. } => {
                if let Some(typ) = typ {
                    self.expr(typ);
                }
                let keyed = elts.iter().any(|e| matches!(e, Expr::KeyValue { .. }));
                if elts.is_empty() {
                    self.push("{}");
                } else if keyed {
                    self.push("{");
                    self.indent += 1;
                    for elt in elts {
                        self.newline();
                        self.expr(elt);
                        self.push(",");
                    }
                    self.indent -= 1;
                    self.newline();
                    self.push("}");
                } else {
                    self.push("{");
                    self.expr_list(elts);
                    self.push("}");
                }
            }
            Expr::KeyValue { key, value, .. } => {
                self.expr(key);
                self.push(": ");
                self.expr(value);
            }
            Expr::FuncLit { typ, body, .. } => {
                self.push("func");
                self.signature(typ);
                self.push(" ");
                self.block(body);
            }
            Expr::Paren { x, .. } => {
                self.push("(");
                self.expr(x);
                self.push(")");
            }
            Expr::Selector { x, sel, .. } => {
                self.expr(x);
                self.push(".");
                self.push(&sel.name);
            }
            Expr::Index { x, index, .. } => {
                self.expr(x);
                self.push("[");
                self.expr(index);
                self.push("]");
            }
            Expr::TypeArgs { x, args, .. } => {
                self.expr(x);
                self.push("[");
                self.expr_list(args);
                self.push("]");
            }
            Expr::Slice { x, low, high, .. } => {
                self.expr(x);
                self.push("[");
                if let Some(low) = low {
                    self.expr(low);
                }
                self.push(":");
                if let Some(high) = high {
                    self.expr(high);
                }
                self.push("]");
            }
            Expr::TypeAssert { x, typ, .. } => {
                self.expr(x);
                self.push(".(");
                match typ {
                    Some(typ) => self.expr(typ),
                    None => self.push("type"),
                }
                self.push(")");
            }
            Expr::Call {
                fun,
                args,
                ellipsis,
                ..
            } => {
                self.expr(fun);
                self.push("(");
                self.expr_list(args);
                if *ellipsis {
                    self.push("...");
                }
                self.push(")");
            }
            Expr::Star { x, .. } => {
                self.push("*");
                self.expr(x);
            }
            Expr::Unary { op, x, .. } => {
                self.push(op.symbol());
                self.expr(x);
            }
            Expr::Binary { op, x, y, .. } => {
                self.expr(x);
                self.push(" ");
                self.push(op.symbol());
                self.push(" ");
                self.expr(y);
            }
            Expr::ArrayType { len, elt, .. } => {
                self.push("[");
                if let Some(len) = len {
                    self.expr(len);
                }
                self.push("]");
                self.expr(elt);
            }
            Expr::StructType { fields, .. } => {
                if fields.is_empty() {
                    self.push("struct{}");
                    return;
                }
                self.push("struct {");
                self.indent += 1;
                for field in fields {
                    self.newline();
                    self.field(field);
                }
                self.indent -= 1;
                self.newline();
                self.push("}");
            }
            Expr::FuncTypeExpr(ft) => {
                self.push("func");
                self.signature(ft);
            }
            Expr::InterfaceType { .. } => self.push("interface{}"),
            Expr::MapType { key, value, .. } => {
                self.push("map[");
                self.expr(key);
                self.push("]");
                self.expr(value);
            }
            Expr::ChanType { dir, value, .. } => {
                match dir {
                    ChanDir::Both => self.push("chan "),
                    ChanDir::Send => self.push("chan<- "),
                    ChanDir::Recv => self.push("<-chan "),
                }
                self.expr(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expr, parse_file};

    #[test]
    fn test_print_empty_main() {
        let file = parse_file("package main\n\nfunc main() {\n}\n").unwrap();
        assert_eq!(print_file(&file), "package main\n\nfunc main() {}\n");
    }

    #[test]
    fn test_print_generic_type_decl() {
        let src = "package main\n\ntype Tuple[T, U] struct {\n\tfirst T\n\tsecond U\n}\n";
        let file = parse_file(src).unwrap();
        assert_eq!(print_file(&file), src);
    }

    #[test]
    fn test_print_keyed_composite() {
        let src = "Tuple[int, string]{\n\tfirst: 2,\n\tsecond: \"foo\",\n}";
        let e = parse_expr(src).unwrap();
        assert_eq!(expr_string(&e), src);
    }

    #[test]
    fn test_print_unkeyed_composite_inline() {
        let e = parse_expr("[]int{1, 2, 3}").unwrap();
        assert_eq!(expr_string(&e), "[]int{1, 2, 3}");
    }

    #[test]
    fn test_print_types() {
        for src in [
            "[]Box",
            "[2]Box",
            "map[string]int",
            "chan int",
            "<-chan int",
            "chan<- int",
            "*bytes.Buffer",
            "func(int, string) bool",
            "interface{}",
        ] {
            let e = parse_expr(src).unwrap();
            assert_eq!(expr_string(&e), src);
        }
    }

    #[test]
    fn test_print_grouped_type_decl() {
        let src = "package main\n\ntype (\n\tA bool\n\tB string\n)\n";
        let file = parse_file(src).unwrap();
        assert_eq!(print_file(&file), src);
    }

    #[test]
    fn test_print_if_else_and_for() {
        let src = "package main\n\nfunc main() {\n\tif x > 0 {\n\t\tx--\n\t} else {\n\t\tx++\n\t}\n\tfor i := 0; i < 10; i++ {\n\t\tprintln(i)\n\t}\n}\n";
        let file = parse_file(src).unwrap();
        assert_eq!(print_file(&file), src);
    }

    #[test]
    fn test_print_type_switch() {
        let src = "package main\n\nfunc main() {\n\tswitch x.(type) {\n\tcase int:\n\tcase string:\n\t}\n}\n";
        let file = parse_file(src).unwrap();
        assert_eq!(print_file(&file), src);
    }

    #[test]
    fn test_print_is_deterministic() {
        let src = "package main\n\nfunc Print[T](t T) {\n\tprintln(t)\n}\n";
        let file = parse_file(src).unwrap();
        assert_eq!(print_file(&file), print_file(&file));
    }

    #[test]
    fn test_variadic_signature() {
        let src = "package main\n\nfunc f(args ...int) {}\n";
        let file = parse_file(src).unwrap();
        assert_eq!(print_file(&file), src);
    }
}
