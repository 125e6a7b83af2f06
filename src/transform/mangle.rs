//! Monomorphic name synthesis.
//!
//! A specialization's identifier joins the original name and the canonical
//! text of each type argument with `__`, after replacing characters that
//! cannot appear in identifiers. When two distinct canonical texts collide
//! after replacement, a counter suffix preserves a bijection; both
//! directions of the mapping are kept.

use std::collections::HashMap;

use super::TransformError;
use crate::ast::{BasicLit, Expr, Field, FuncType, Ident, LitKind, Span};
use crate::types::{Type, TypeArena, TypeId};

const MAX_COUNTER: usize = 1000;

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Default)]
pub struct Mangler {
    unsafe_to_safe: HashMap<String, String>,
    safe_to_unsafe: HashMap<String, String>,
}

impl Mangler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a canonical type text as an identifier fragment.
    pub fn safe(&mut self, raw: &str) -> String {
        let raw = raw.trim();
        if let Some(safe) = self.unsafe_to_safe.get(raw) {
            return safe.clone();
        }
        let mut safe: String = raw
            .chars()
            .map(|c| if is_safe_char(c) { c } else { '_' })
            .collect();
        if self.safe_to_unsafe.contains_key(&safe) {
            safe = self.append_counter(safe);
        }
        self.unsafe_to_safe.insert(raw.to_string(), safe.clone());
        self.safe_to_unsafe.insert(safe.clone(), raw.to_string());
        safe
    }

    fn append_counter(&self, base: String) -> String {
        for i in 0..MAX_COUNTER {
            let candidate = format!("{}_{}", base, i);
            if !self.safe_to_unsafe.contains_key(&candidate) {
                return candidate;
            }
        }
        panic!("internal error: could not find unique safe string for {}", base);
    }

    /// `Name__arg1__arg2` from the original name and canonical argument
    /// texts.
    pub fn mangled_name(&mut self, base: &str, args: &[String]) -> String {
        if args.is_empty() {
            return base.to_string();
        }
        let safe_args: Vec<String> = args.iter().map(|a| self.safe(a)).collect();
        format!("{}__{}", base, safe_args.join("__"))
    }
}

/// Render a checked type as a syntax-tree type expression. Concrete
/// instantiations render as their mangled identifier, so the result is
/// always expressible in the parameter-free output language.
pub fn type_to_expr(
    arena: &TypeArena,
    id: TypeId,
    mangler: &mut Mangler,
) -> Result<Expr, TransformError> {
    let expr = match arena.get(id) {
        Type::Invalid => {
            return Err(TransformError::Internal(
                "cannot render invalid type".to_string(),
            ))
        }
        Type::Basic(kind) => Expr::ident(kind.name()),
        Type::Pointer(base) => Expr::Star {
            x: Box::new(type_to_expr(arena, *base, mangler)?),
            span: Span::default(),
        },
        Type::Slice(elem) => Expr::ArrayType {
            len: None,
            elt: Box::new(type_to_expr(arena, *elem, mangler)?),
            span: Span::default(),
        },
        Type::Array { len, elem } => Expr::ArrayType {
            len: Some(Box::new(Expr::BasicLit(BasicLit {
                kind: LitKind::Int,
                value: len.to_string(),
                span: Span::default(),
            }))),
            elt: Box::new(type_to_expr(arena, *elem, mangler)?),
            span: Span::default(),
        },
        Type::Map { key, elem } => Expr::MapType {
            key: Box::new(type_to_expr(arena, *key, mangler)?),
            value: Box::new(type_to_expr(arena, *elem, mangler)?),
            span: Span::default(),
        },
        Type::Chan { dir, elem } => Expr::ChanType {
            dir: *dir,
            value: Box::new(type_to_expr(arena, *elem, mangler)?),
            span: Span::default(),
        },
        Type::Struct(data) => {
            let mut fields = Vec::with_capacity(data.fields.len());
            for (i, field) in data.fields.iter().enumerate() {
                let names = if field.name.is_empty() {
                    Vec::new()
                } else {
                    vec![Ident::new(field.name.clone())]
                };
                let tag = data.tags.get(i).and_then(|t| t.as_ref()).map(|t| BasicLit {
                    kind: LitKind::Str,
                    value: t.clone(),
                    span: Span::default(),
                });
                fields.push(Field {
                    names,
                    typ: type_to_expr(arena, field.typ, mangler)?,
                    tag,
                    span: Span::default(),
                });
            }
            Expr::StructType {
                fields,
                span: Span::default(),
            }
        }
        Type::Signature(sig) => Expr::FuncTypeExpr(signature_to_func_type(arena, sig, mangler)?),
        Type::ConcreteSignature(c) => {
            Expr::FuncTypeExpr(signature_to_func_type(arena, &c.sig, mangler)?)
        }
        Type::Interface => Expr::InterfaceType {
            span: Span::default(),
        },
        Type::Named(n) => match &n.pkg {
            Some(pkg) => Expr::Selector {
                x: Box::new(Expr::ident(pkg.clone())),
                sel: Ident::new(n.name.clone()),
                span: Span::default(),
            },
            None => Expr::ident(n.name.clone()),
        },
        Type::TypeParam(name) => Expr::ident(name.clone()),
        Type::GenericNamed(g) => Expr::ident(g.named.name.clone()),
        Type::GenericSignature(g) => {
            Expr::FuncTypeExpr(signature_to_func_type(arena, &g.sig, mangler)?)
        }
        Type::PartialNamed(p) => {
            let name = arena
                .named_name(p.parent)
                .unwrap_or_default()
                .to_string();
            Expr::ident(name)
        }
        Type::PartialSignature(_) => {
            return Err(TransformError::Internal(
                "cannot render partial signature".to_string(),
            ))
        }
        Type::ConcreteNamed(c) => {
            let params = arena.type_params(c.parent);
            let mut arg_strings = Vec::with_capacity(params.len());
            for param in &params {
                let arg = c.type_map.get(param).copied().ok_or_else(|| {
                    TransformError::Internal(format!(
                        "missing binding for type parameter {} of {}",
                        param, c.named.name
                    ))
                })?;
                let arg_expr = type_to_expr(arena, arg, mangler)?;
                arg_strings.push(crate::printer::expr_string(&arg_expr));
            }
            Expr::ident(mangler.mangled_name(&c.named.name, &arg_strings))
        }
        Type::Tuple(_) => {
            return Err(TransformError::Internal(
                "cannot render tuple type".to_string(),
            ))
        }
    };
    Ok(expr)
}

fn signature_to_func_type(
    arena: &TypeArena,
    sig: &crate::types::SigData,
    mangler: &mut Mangler,
) -> Result<FuncType, TransformError> {
    let mut params = Vec::with_capacity(sig.params.len());
    for param in &sig.params {
        params.push(Field {
            names: Vec::new(),
            typ: type_to_expr(arena, param.typ, mangler)?,
            tag: None,
            span: Span::default(),
        });
    }
    let mut results = Vec::with_capacity(sig.results.len());
    for result in &sig.results {
        results.push(Field {
            names: Vec::new(),
            typ: type_to_expr(arena, result.typ, mangler)?,
            tag: None,
            span: Span::default(),
        });
    }
    Ok(FuncType {
        params,
        results,
        variadic: sig.variadic,
        span: Span::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::expr_string;
    use crate::types::{BasicKind, NamedData, Param, StructData};

    #[test]
    fn test_safe_replaces_symbols() {
        let mut m = Mangler::new();
        assert_eq!(m.safe("bytes.Buffer"), "bytes_Buffer");
        assert_eq!(m.safe("[]int"), "__int");
        assert_eq!(m.safe("*Box"), "_Box");
        assert_eq!(m.safe("map[string]int"), "map_string_int");
    }

    #[test]
    fn test_safe_is_cached() {
        let mut m = Mangler::new();
        let a = m.safe("bytes.Buffer");
        let b = m.safe("bytes.Buffer");
        assert_eq!(a, b);
    }

    #[test]
    fn test_collision_counter() {
        let mut m = Mangler::new();
        let a = m.safe("a.b");
        let b = m.safe("a/b");
        let c = m.safe("a-b");
        assert_eq!(a, "a_b");
        assert_eq!(b, "a_b_0");
        assert_eq!(c, "a_b_1");
        // Bijection holds.
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_mangled_name() {
        let mut m = Mangler::new();
        assert_eq!(
            m.mangled_name("Tuple", &["string".to_string(), "int".to_string()]),
            "Tuple__string__int"
        );
        assert_eq!(m.mangled_name("f", &[]), "f");
        assert_eq!(
            m.mangled_name("Box", &["bytes.Buffer".to_string()]),
            "Box__bytes_Buffer"
        );
    }

    #[test]
    fn test_type_to_expr_roundtrip() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let slice = arena.alloc(Type::Slice(int));
        let ptr = arena.alloc(Type::Pointer(slice));
        let mut m = Mangler::new();
        let e = type_to_expr(&arena, ptr, &mut m).unwrap();
        assert_eq!(expr_string(&e), "*[]int");
    }

    #[test]
    fn test_qualified_named_to_expr() {
        let mut arena = TypeArena::new();
        let under = arena.alloc(Type::Struct(StructData {
            fields: Vec::new(),
            tags: Vec::new(),
        }));
        let buffer = arena.alloc(Type::Named(NamedData {
            name: "Buffer".to_string(),
            pkg: Some("bytes".to_string()),
            underlying: under,
            methods: Vec::new(),
        }));
        let mut m = Mangler::new();
        let e = type_to_expr(&arena, buffer, &mut m).unwrap();
        assert_eq!(expr_string(&e), "bytes.Buffer");
    }

    #[test]
    fn test_struct_to_expr() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let s = arena.alloc(Type::Struct(StructData {
            fields: vec![Param {
                name: "n".to_string(),
                typ: int,
            }],
            tags: vec![None],
        }));
        let mut m = Mangler::new();
        let e = type_to_expr(&arena, s, &mut m).unwrap();
        assert_eq!(
            expr_string(&e),
            "struct {\n\tn int\n}"
        );
    }
}
