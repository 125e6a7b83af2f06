//! The type universe the checker manipulates.
//!
//! All types live in a package-scoped [`TypeArena`] and are referenced by
//! [`TypeId`] handles, so self-referential named types are plain index
//! cycles rather than ownership cycles. Types partition into three
//! families:
//!
//! - ordinary types (basic, pointer, slice, array, map, chan, struct,
//!   tuple, signature, named);
//! - generic types, which carry unbound type parameters
//!   ([`Type::GenericNamed`], [`Type::GenericSignature`]);
//! - partial and concrete instantiations, which wrap their generic parent
//!   together with a substitution map.
//!
//! Substitution and the instantiation engine are in [`subst`]; the
//! per-package declaration/usage bookkeeping is in [`registry`].

pub mod registry;
pub mod subst;

use std::collections::BTreeMap;
use std::fmt::Write as _;

pub use crate::ast::ChanDir;

/// Handle to a type in a [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Substitution map: parameter name (within the parent's scope) to type.
pub type TypeMap = BTreeMap<String, TypeId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Str,
    Byte,
    Rune,
    UntypedBool,
    UntypedInt,
    UntypedFloat,
    UntypedRune,
    UntypedStr,
    UntypedNil,
}

impl BasicKind {
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::Str => "string",
            BasicKind::Byte => "byte",
            BasicKind::Rune => "rune",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedStr => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }
}

const BASIC_KINDS: &[BasicKind] = &[
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
    BasicKind::UntypedBool,
    BasicKind::UntypedInt,
    BasicKind::UntypedFloat,
    BasicKind::UntypedRune,
    BasicKind::UntypedStr,
    BasicKind::UntypedNil,
];

/// Parameter, result, or struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub typ: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructData {
    pub fields: Vec<Param>,
    pub tags: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SigData {
    pub recv: Option<Param>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub typ: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedData {
    pub name: String,
    /// Qualifying package name for imported types (`bytes` in
    /// `bytes.Buffer`); `None` for package-local types.
    pub pkg: Option<String>,
    pub underlying: TypeId,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericNamedData {
    pub named: NamedData,
    /// Declared parameter names, in declaration order.
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericSigData {
    pub sig: SigData,
    /// The signature's own parameters, in declaration order.
    pub params: Vec<String>,
    /// Parameters inherited from a generic receiver (declared names).
    pub recv_params: Vec<String>,
    /// Registry declaration key (`Name` or `Recv.Name`).
    pub decl_key: String,
}

/// Partial instantiation: at least one binding is still a type parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialData {
    pub parent: TypeId,
    pub type_map: TypeMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteNamedData {
    pub parent: TypeId,
    pub type_map: TypeMap,
    pub named: NamedData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteSigData {
    pub parent: TypeId,
    pub type_map: TypeMap,
    pub sig: SigData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Invalid,
    Basic(BasicKind),
    Pointer(TypeId),
    Slice(TypeId),
    Array { len: u64, elem: TypeId },
    Map { key: TypeId, elem: TypeId },
    Chan { dir: ChanDir, elem: TypeId },
    Struct(StructData),
    Tuple(Vec<TypeId>),
    Signature(SigData),
    /// The empty interface; method-set interfaces are outside the subset.
    Interface,
    Named(NamedData),
    TypeParam(String),
    GenericNamed(GenericNamedData),
    GenericSignature(GenericSigData),
    PartialNamed(PartialData),
    PartialSignature(PartialData),
    ConcreteNamed(ConcreteNamedData),
    ConcreteSignature(ConcreteSigData),
}

/// Owner of every type created while checking one package.
///
/// Entries are never removed; handles stay valid for the package's
/// lifetime.
#[derive(Debug)]
pub struct TypeArena {
    types: Vec<Type>,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    pub fn new() -> Self {
        let mut types = Vec::with_capacity(BASIC_KINDS.len() + 16);
        types.push(Type::Invalid);
        for kind in BASIC_KINDS {
            types.push(Type::Basic(*kind));
        }
        Self { types }
    }

    pub fn alloc(&mut self, t: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(t);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn invalid(&self) -> TypeId {
        TypeId(0)
    }

    pub fn basic(&self, kind: BasicKind) -> TypeId {
        let idx = BASIC_KINDS
            .iter()
            .position(|k| *k == kind)
            .expect("kind is listed in BASIC_KINDS");
        TypeId(1 + idx as u32)
    }

    // --- predicates and accessors ---

    pub fn is_invalid(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Invalid)
    }

    pub fn is_type_param(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::TypeParam(_))
    }

    /// Generic: carries at least one unbound parameter and no bindings.
    pub fn is_generic(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::GenericNamed(_) | Type::GenericSignature(_)
        )
    }

    /// Partial: some bindings, at least one of which is still a parameter.
    pub fn is_partial(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::PartialNamed(_) | Type::PartialSignature(_)
        )
    }

    /// Concrete instantiation of some generic parent.
    pub fn is_concrete_instance(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::ConcreteNamed(_) | Type::ConcreteSignature(_)
        )
    }

    /// Generic, partial, or anything else instantiation can be driven on.
    pub fn is_instantiable(&self, id: TypeId) -> bool {
        self.is_generic(id) || self.is_partial(id)
    }

    /// Parameters declared on the type (empty if not generic). For partial
    /// and concrete instantiations, the parent's parameters.
    pub fn type_params(&self, id: TypeId) -> Vec<String> {
        match self.get(id) {
            Type::GenericNamed(g) => g.params.clone(),
            Type::GenericSignature(g) => g.params.clone(),
            Type::PartialNamed(p) | Type::PartialSignature(p) => self.type_params(p.parent),
            Type::ConcreteNamed(c) => self.type_params(c.parent),
            Type::ConcreteSignature(c) => self.type_params(c.parent),
            _ => Vec::new(),
        }
    }

    /// Bindings of a partial or concrete instantiation.
    pub fn type_map(&self, id: TypeId) -> Option<&TypeMap> {
        match self.get(id) {
            Type::PartialNamed(p) | Type::PartialSignature(p) => Some(&p.type_map),
            Type::ConcreteNamed(c) => Some(&c.type_map),
            Type::ConcreteSignature(c) => Some(&c.type_map),
            _ => None,
        }
    }

    /// The declared name of a named-family type.
    pub fn named_name(&self, id: TypeId) -> Option<&str> {
        match self.get(id) {
            Type::Named(n) => Some(&n.name),
            Type::GenericNamed(g) => Some(&g.named.name),
            Type::ConcreteNamed(c) => Some(&c.named.name),
            Type::PartialNamed(p) => self.named_name(p.parent),
            _ => None,
        }
    }

    /// Unwrap named types to their underlying representation, following the
    /// named chain until an unnamed type is reached.
    pub fn underlying(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Named(n) => self.underlying(n.underlying),
            Type::GenericNamed(g) => self.underlying(g.named.underlying),
            Type::ConcreteNamed(c) => self.underlying(c.named.underlying),
            Type::PartialNamed(p) => self.underlying(p.parent),
            _ => id,
        }
    }

    /// Unwrap one level of pointer.
    pub fn deref(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Pointer(base) => *base,
            _ => id,
        }
    }

    /// Method set of a named-family type.
    pub fn methods(&self, id: TypeId) -> &[Method] {
        match self.get(id) {
            Type::Named(n) => &n.methods,
            Type::GenericNamed(g) => &g.named.methods,
            Type::ConcreteNamed(c) => &c.named.methods,
            Type::PartialNamed(p) => self.methods(p.parent),
            _ => &[],
        }
    }

    // --- canonical display ---

    /// Canonical string representation. Usage keys are built from this, so
    /// it must be stable and injective for all types that can appear as
    /// type arguments.
    pub fn display(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_type(&mut out, id);
        out
    }

    fn write_type(&self, out: &mut String, id: TypeId) {
        match self.get(id) {
            Type::Invalid => out.push_str("invalid type"),
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Pointer(base) => {
                out.push('*');
                self.write_type(out, *base);
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                self.write_type(out, *elem);
            }
            Type::Array { len, elem } => {
                let _ = write!(out, "[{}]", len);
                self.write_type(out, *elem);
            }
            Type::Map { key, elem } => {
                out.push_str("map[");
                self.write_type(out, *key);
                out.push(']');
                self.write_type(out, *elem);
            }
            Type::Chan { dir, elem } => {
                match dir {
                    ChanDir::Both => out.push_str("chan "),
                    ChanDir::Send => out.push_str("chan<- "),
                    ChanDir::Recv => out.push_str("<-chan "),
                }
                self.write_type(out, *elem);
            }
            Type::Struct(data) => {
                if data.fields.is_empty() {
                    out.push_str("struct{}");
                    return;
                }
                out.push_str("struct{");
                for (i, field) in data.fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    if !field.name.is_empty() {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    self.write_type(out, field.typ);
                }
                out.push('}');
            }
            Type::Tuple(elems) => {
                out.push('(');
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, *elem);
                }
                out.push(')');
            }
            Type::Signature(sig) => self.write_signature(out, sig),
            Type::Interface => out.push_str("interface{}"),
            Type::Named(n) => self.write_qualified(out, n),
            Type::TypeParam(name) => out.push_str(name),
            Type::GenericNamed(g) => self.write_qualified(out, &g.named),
            Type::GenericSignature(g) => self.write_signature(out, &g.sig),
            Type::PartialNamed(p) | Type::PartialSignature(p) => {
                self.write_type(out, p.parent);
            }
            Type::ConcreteNamed(c) => {
                self.write_qualified(out, &c.named);
                out.push('[');
                let params = self.type_params(c.parent);
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match c.type_map.get(param) {
                        Some(arg) => self.write_type(out, *arg),
                        None => out.push_str(param),
                    }
                }
                out.push(']');
            }
            Type::ConcreteSignature(c) => self.write_signature(out, &c.sig),
        }
    }

    fn write_qualified(&self, out: &mut String, n: &NamedData) {
        if let Some(pkg) = &n.pkg {
            out.push_str(pkg);
            out.push('.');
        }
        out.push_str(&n.name);
    }

    fn write_signature(&self, out: &mut String, sig: &SigData) {
        out.push_str("func(");
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if sig.variadic && i == sig.params.len() - 1 {
                out.push_str("...");
            }
            self.write_type(out, param.typ);
        }
        out.push(')');
        match sig.results.len() {
            0 => {}
            1 => {
                out.push(' ');
                self.write_type(out, sig.results[0].typ);
            }
            _ => {
                out.push_str(" (");
                for (i, res) in sig.results.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, res.typ);
                }
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_lookup() {
        let arena = TypeArena::new();
        assert_eq!(arena.display(arena.basic(BasicKind::Int)), "int");
        assert_eq!(arena.display(arena.basic(BasicKind::Str)), "string");
        assert_eq!(arena.display(arena.invalid()), "invalid type");
    }

    #[test]
    fn test_compound_display() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let string = arena.basic(BasicKind::Str);
        let slice = arena.alloc(Type::Slice(int));
        assert_eq!(arena.display(slice), "[]int");
        let array = arena.alloc(Type::Array { len: 2, elem: slice });
        assert_eq!(arena.display(array), "[2][]int");
        let map = arena.alloc(Type::Map {
            key: string,
            elem: int,
        });
        assert_eq!(arena.display(map), "map[string]int");
        let ptr = arena.alloc(Type::Pointer(map));
        assert_eq!(arena.display(ptr), "*map[string]int");
    }

    #[test]
    fn test_signature_display() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let string = arena.basic(BasicKind::Str);
        let sig = arena.alloc(Type::Signature(SigData {
            recv: None,
            params: vec![
                Param {
                    name: "a".to_string(),
                    typ: int,
                },
                Param {
                    name: "b".to_string(),
                    typ: string,
                },
            ],
            results: vec![Param {
                name: String::new(),
                typ: int,
            }],
            variadic: false,
        }));
        assert_eq!(arena.display(sig), "func(int, string) int");
    }

    #[test]
    fn test_named_chain_underlying() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let a = arena.alloc(Type::Named(NamedData {
            name: "A".to_string(),
            pkg: None,
            underlying: int,
            methods: Vec::new(),
        }));
        let b = arena.alloc(Type::Named(NamedData {
            name: "B".to_string(),
            pkg: None,
            underlying: a,
            methods: Vec::new(),
        }));
        assert_eq!(arena.underlying(b), int);
        assert_eq!(arena.display(b), "B");
    }

    #[test]
    fn test_concrete_display_uses_declaration_order() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let string = arena.basic(BasicKind::Str);
        let generic = arena.alloc(Type::GenericNamed(GenericNamedData {
            named: NamedData {
                name: "Tuple".to_string(),
                pkg: None,
                underlying: TypeId(0),
                methods: Vec::new(),
            },
            params: vec!["T".to_string(), "U".to_string()],
        }));
        let mut map = TypeMap::new();
        map.insert("T".to_string(), string);
        map.insert("U".to_string(), int);
        let conc = arena.alloc(Type::ConcreteNamed(ConcreteNamedData {
            parent: generic,
            type_map: map,
            named: NamedData {
                name: "Tuple".to_string(),
                pkg: None,
                underlying: TypeId(0),
                methods: Vec::new(),
            },
        }));
        assert_eq!(arena.display(conc), "Tuple[string, int]");
    }

    #[test]
    fn test_qualified_named_display() {
        let mut arena = TypeArena::new();
        let strukt = arena.alloc(Type::Struct(StructData {
            fields: Vec::new(),
            tags: Vec::new(),
        }));
        let buffer = arena.alloc(Type::Named(NamedData {
            name: "Buffer".to_string(),
            pkg: Some("bytes".to_string()),
            underlying: strukt,
            methods: Vec::new(),
        }));
        assert_eq!(arena.display(buffer), "bytes.Buffer");
    }

    #[test]
    fn test_predicates() {
        let mut arena = TypeArena::new();
        let int = arena.basic(BasicKind::Int);
        let tp = arena.alloc(Type::TypeParam("T".to_string()));
        let generic = arena.alloc(Type::GenericNamed(GenericNamedData {
            named: NamedData {
                name: "Box".to_string(),
                pkg: None,
                underlying: int,
                methods: Vec::new(),
            },
            params: vec!["T".to_string()],
        }));
        assert!(arena.is_type_param(tp));
        assert!(arena.is_generic(generic));
        assert!(!arena.is_generic(int));
        assert_eq!(arena.type_params(generic), vec!["T".to_string()]);
    }
}
