//! Per-unit state threaded through every pass.

use crate::ast::{Node, NodeKind};
use crate::diagnostic::Diagnostic;
use crate::factory::NodeFactory;
use crate::span::Span;
use crate::types::{ClassTable, Type, TypeSystem};

#[derive(Debug)]
enum Scope {
    Class {
        name: String,
        ty: Option<Type>,
        params: Vec<String>,
        fields: Vec<(String, Type)>,
    },
    Method {
        ret: Option<Type>,
        locals: Vec<(String, Type)>,
    },
}

/// What a delegate sees while a pass visits one unit.
///
/// The type system and node factory are the bootstrap's shared, read-only
/// instances. Diagnostics, class bindings and scopes belong to the unit.
pub struct PassContext<'a> {
    ts: &'a TypeSystem,
    nf: &'a dyn NodeFactory,
    classes: ClassTable,
    diagnostics: Vec<Diagnostic>,
    scopes: Vec<Scope>,
}

impl<'a> PassContext<'a> {
    pub fn new(ts: &'a TypeSystem, nf: &'a dyn NodeFactory) -> Self {
        PassContext {
            ts,
            nf,
            classes: ClassTable::new(),
            diagnostics: Vec::new(),
            scopes: Vec::new(),
        }
    }

    pub fn ts(&self) -> &'a TypeSystem {
        self.ts
    }

    pub fn nf(&self) -> &'a dyn NodeFactory {
        self.nf
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn classes_mut(&mut self) -> &mut ClassTable {
        &mut self.classes
    }

    pub fn lookup_class(&self, name: &str) -> Option<Type> {
        self.classes.lookup(self.ts, name)
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::warning(message, span));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Open the scope introduced by `node`, if any.
    pub fn enter(&mut self, node: &Node) {
        match node.kind() {
            NodeKind::ClassDecl {
                name,
                params,
                body,
                ty,
                ..
            } => {
                let fields = match body.kind() {
                    NodeKind::ClassBody { members } => members
                        .iter()
                        .filter_map(|member| match member.kind() {
                            NodeKind::FieldDecl { ty, name, .. } => ty
                                .type_of_type_node()
                                .map(|ty| (name.clone(), ty.clone())),
                            _ => None,
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                self.scopes.push(Scope::Class {
                    name: name.clone(),
                    ty: ty.clone(),
                    params: params.clone(),
                    fields,
                });
            }
            NodeKind::MethodDecl { ret, formals, .. } => {
                let locals = formals
                    .iter()
                    .filter_map(|formal| match formal.kind() {
                        NodeKind::Formal { ty, name } => ty
                            .type_of_type_node()
                            .map(|ty| (name.clone(), ty.clone())),
                        _ => None,
                    })
                    .collect();
                self.scopes.push(Scope::Method {
                    ret: ret.type_of_type_node().cloned(),
                    locals,
                });
            }
            _ => {}
        }
    }

    pub fn leave(&mut self, node: &Node) {
        if matches!(
            node.kind(),
            NodeKind::ClassDecl { .. } | NodeKind::MethodDecl { .. }
        ) {
            self.scopes.pop();
        }
    }

    /// Type of the innermost enclosing class, once it has been declared.
    pub fn current_class(&self) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| match scope {
            Scope::Class { ty, .. } => ty.as_ref(),
            Scope::Method { .. } => None,
        })
    }

    /// Declared return type of the innermost enclosing method.
    pub fn return_type(&self) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| match scope {
            Scope::Method { ret, .. } => ret.as_ref(),
            Scope::Class { .. } => None,
        })
    }

    pub fn in_method(&self) -> bool {
        self.scopes
            .iter()
            .any(|scope| matches!(scope, Scope::Method { .. }))
    }

    /// Resolve a type parameter declared by an enclosing class.
    pub fn type_param(&self, name: &str) -> Option<Type> {
        self.scopes.iter().rev().find_map(|scope| match scope {
            Scope::Class {
                name: owner,
                params,
                ..
            } if params.iter().any(|p| p == name) => Some(self.ts.type_param(owner, name)),
            _ => None,
        })
    }

    /// Formals first, then fields of the enclosing classes.
    pub fn lookup_local(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| {
            let vars = match scope {
                Scope::Class { fields, .. } => fields,
                Scope::Method { locals, .. } => locals,
            };
            vars.iter().rev().find(|(n, _)| n == name).map(|(_, ty)| ty)
        })
    }
}
