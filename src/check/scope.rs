//! Lexical scopes and the objects they bind.

use std::collections::HashMap;

use crate::ast::Span;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Make,
    Len,
    Cap,
    New,
    Append,
    Copy,
    Delete,
    Panic,
    Print,
    Println,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjKind {
    TypeName,
    Var,
    Func,
    Const,
    /// An imported package; `import_path` holds the path.
    Pkg,
    Builtin(Builtin),
}

#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub kind: ObjKind,
    /// Lazily filled for package-level objects.
    pub typ: Option<TypeId>,
    pub span: Span,
    /// Integer value for constants usable as array bounds.
    pub const_val: Option<i64>,
    pub import_path: Option<String>,
}

impl Object {
    pub fn new(name: impl Into<String>, kind: ObjKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            typ: None,
            span,
            const_val: None,
            import_path: None,
        }
    }

    pub fn with_type(mut self, typ: TypeId) -> Self {
        self.typ = Some(typ);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub usize);

#[derive(Debug)]
struct ScopeData {
    parent: Option<usize>,
    names: HashMap<String, ObjId>,
}

/// All scopes created while checking one package, plus the object table.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
    pub objects: Vec<Object>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, parent: Option<usize>) -> usize {
        self.scopes.push(ScopeData {
            parent,
            names: HashMap::new(),
        });
        self.scopes.len() - 1
    }

    pub fn parent(&self, scope: usize) -> Option<usize> {
        self.scopes[scope].parent
    }

    pub fn add_object(&mut self, obj: Object) -> ObjId {
        self.objects.push(obj);
        ObjId(self.objects.len() - 1)
    }

    /// Insert into a scope. The blank identifier introduces no binding.
    /// Returns the previously bound object on redeclaration.
    pub fn insert(&mut self, scope: usize, obj: Object) -> Result<ObjId, ObjId> {
        let name = obj.name.clone();
        let id = self.add_object(obj);
        if name == "_" {
            return Ok(id);
        }
        if let Some(&existing) = self.scopes[scope].names.get(&name) {
            return Err(existing);
        }
        self.scopes[scope].names.insert(name, id);
        Ok(id)
    }

    /// Look a name up through the scope chain.
    pub fn lookup(&self, mut scope: usize, name: &str) -> Option<ObjId> {
        loop {
            if let Some(&id) = self.scopes[scope].names.get(name) {
                return Some(id);
            }
            match self.scopes[scope].parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    pub fn lookup_local(&self, scope: usize, name: &str) -> Option<ObjId> {
        self.scopes[scope].names.get(name).copied()
    }

    pub fn obj(&self, id: ObjId) -> &Object {
        &self.objects[id.0]
    }

    pub fn obj_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_chain_lookup() {
        let mut tree = ScopeTree::new();
        let outer = tree.new_scope(None);
        let inner = tree.new_scope(Some(outer));
        tree.insert(outer, Object::new("x", ObjKind::Var, Span::default()))
            .unwrap();
        assert!(tree.lookup(inner, "x").is_some());
        assert!(tree.lookup_local(inner, "x").is_none());
    }

    #[test]
    fn test_shadowing() {
        let mut tree = ScopeTree::new();
        let outer = tree.new_scope(None);
        let inner = tree.new_scope(Some(outer));
        let a = tree
            .insert(outer, Object::new("x", ObjKind::Var, Span::default()))
            .unwrap();
        let b = tree
            .insert(inner, Object::new("x", ObjKind::Const, Span::default()))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(tree.lookup(inner, "x"), Some(b));
        assert_eq!(tree.lookup(outer, "x"), Some(a));
    }

    #[test]
    fn test_redeclaration_reports_existing() {
        let mut tree = ScopeTree::new();
        let scope = tree.new_scope(None);
        let first = tree
            .insert(scope, Object::new("x", ObjKind::Var, Span::default()))
            .unwrap();
        let err = tree
            .insert(scope, Object::new("x", ObjKind::Var, Span::default()))
            .unwrap_err();
        assert_eq!(err, first);
    }

    #[test]
    fn test_blank_is_not_bound() {
        let mut tree = ScopeTree::new();
        let scope = tree.new_scope(None);
        tree.insert(scope, Object::new("_", ObjKind::Var, Span::default()))
            .unwrap();
        tree.insert(scope, Object::new("_", ObjKind::Var, Span::default()))
            .unwrap();
        assert!(tree.lookup(scope, "_").is_none());
    }
}
