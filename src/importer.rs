//! Package resolution interface and the built-in standard-library table.
//!
//! The core only needs "given an import path, return a package with its
//! exported objects and types". [`StdImporter`] materializes a small fixed
//! table of standard-library packages directly into the checker's type
//! arena; there is no file-system resolution.

use std::collections::HashMap;

use thiserror::Error;

use crate::types::{
    BasicKind, NamedData, Param, SigData, StructData, Type, TypeArena, TypeId,
};

#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot find package {0}")]
pub struct ImportError(pub String);

/// An imported package: its short name and exported members.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub exports: HashMap<String, TypeId>,
}

pub trait Importer {
    fn import(&mut self, path: &str, arena: &mut TypeArena) -> Result<Package, ImportError>;
}

/// Built-in resolver for the handful of standard packages the tests use.
#[derive(Debug, Default)]
pub struct StdImporter;

impl StdImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for StdImporter {
    fn import(&mut self, path: &str, arena: &mut TypeArena) -> Result<Package, ImportError> {
        match path {
            "bytes" => {
                let mut exports = HashMap::new();
                exports.insert("Buffer".to_string(), opaque_struct(arena, "bytes", "Buffer"));
                Ok(Package {
                    name: "bytes".to_string(),
                    exports,
                })
            }
            "strings" => {
                let mut exports = HashMap::new();
                exports.insert(
                    "Builder".to_string(),
                    opaque_struct(arena, "strings", "Builder"),
                );
                let string = arena.basic(BasicKind::Str);
                let strings_slice = arena.alloc(Type::Slice(string));
                exports.insert(
                    "Join".to_string(),
                    func(arena, &[strings_slice, string], &[string], false),
                );
                Ok(Package {
                    name: "strings".to_string(),
                    exports,
                })
            }
            "fmt" => {
                let mut exports = HashMap::new();
                let any = arena.alloc(Type::Interface);
                let string = arena.basic(BasicKind::Str);
                exports.insert("Println".to_string(), func(arena, &[any], &[], true));
                exports.insert("Print".to_string(), func(arena, &[any], &[], true));
                let printf_any = arena.alloc(Type::Interface);
                exports.insert(
                    "Printf".to_string(),
                    func(arena, &[string, printf_any], &[], true),
                );
                let sprintf_any = arena.alloc(Type::Interface);
                exports.insert(
                    "Sprintf".to_string(),
                    func(arena, &[string, sprintf_any], &[string], true),
                );
                Ok(Package {
                    name: "fmt".to_string(),
                    exports,
                })
            }
            other => Err(ImportError(other.to_string())),
        }
    }
}

fn opaque_struct(arena: &mut TypeArena, pkg: &str, name: &str) -> TypeId {
    let underlying = arena.alloc(Type::Struct(StructData {
        fields: Vec::new(),
        tags: Vec::new(),
    }));
    arena.alloc(Type::Named(NamedData {
        name: name.to_string(),
        pkg: Some(pkg.to_string()),
        underlying,
        methods: Vec::new(),
    }))
}

fn func(arena: &mut TypeArena, params: &[TypeId], results: &[TypeId], variadic: bool) -> TypeId {
    arena.alloc(Type::Signature(SigData {
        recv: None,
        params: params
            .iter()
            .map(|&typ| Param {
                name: String::new(),
                typ,
            })
            .collect(),
        results: results
            .iter()
            .map(|&typ| Param {
                name: String::new(),
                typ,
            })
            .collect(),
        variadic,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_bytes() {
        let mut arena = TypeArena::new();
        let pkg = StdImporter::new().import("bytes", &mut arena).unwrap();
        assert_eq!(pkg.name, "bytes");
        let buffer = pkg.exports["Buffer"];
        assert_eq!(arena.display(buffer), "bytes.Buffer");
    }

    #[test]
    fn test_unknown_path() {
        let mut arena = TypeArena::new();
        let err = StdImporter::new()
            .import("net/mail", &mut arena)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot find package net/mail");
    }

    #[test]
    fn test_fmt_println_signature() {
        let mut arena = TypeArena::new();
        let pkg = StdImporter::new().import("fmt", &mut arena).unwrap();
        let println = pkg.exports["Println"];
        assert_eq!(arena.display(println), "func(...interface{})");
    }
}
