//! Syntax tree.
//!
//! Node kinds form a closed enumeration; layers change behavior by attaching
//! a [`Delegate`] to a node rather than by adding node types. A node is never
//! mutated in place: every `with_*`/`map_children` call returns a new value,
//! so a tree held by one pass stays valid while another pass rewrites it.

use std::fmt;

use crate::delegate::Delegate;
use crate::span::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeTag {
    SourceFile,
    ClassDecl,
    ClassBody,
    FieldDecl,
    MethodDecl,
    Formal,
    AmbTypeNode,
    ArrayTypeNode,
    CanonicalTypeNode,
    Block,
    Return,
    Local,
    IntLit,
    BoolLit,
    NullLit,
    Boxed,
}

impl NodeTag {
    pub const ALL: [NodeTag; 16] = [
        NodeTag::SourceFile,
        NodeTag::ClassDecl,
        NodeTag::ClassBody,
        NodeTag::FieldDecl,
        NodeTag::MethodDecl,
        NodeTag::Formal,
        NodeTag::AmbTypeNode,
        NodeTag::ArrayTypeNode,
        NodeTag::CanonicalTypeNode,
        NodeTag::Block,
        NodeTag::Return,
        NodeTag::Local,
        NodeTag::IntLit,
        NodeTag::BoolLit,
        NodeTag::NullLit,
        NodeTag::Boxed,
    ];

    /// The nearest ancestor kind, used when a layer has no specific behavior
    /// for this kind.
    pub fn category(self) -> NodeCategory {
        match self {
            NodeTag::SourceFile => NodeCategory::SourceFile,
            NodeTag::ClassDecl => NodeCategory::ClassDecl,
            NodeTag::ClassBody => NodeCategory::ClassBody,
            NodeTag::FieldDecl | NodeTag::MethodDecl => NodeCategory::ClassMember,
            NodeTag::Formal => NodeCategory::Formal,
            NodeTag::AmbTypeNode | NodeTag::ArrayTypeNode | NodeTag::CanonicalTypeNode => {
                NodeCategory::TypeNode
            }
            NodeTag::Block | NodeTag::Return => NodeCategory::Stmt,
            NodeTag::Local
            | NodeTag::IntLit
            | NodeTag::BoolLit
            | NodeTag::NullLit
            | NodeTag::Boxed => NodeCategory::Expr,
        }
    }
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Position classes a node can occupy in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    SourceFile,
    ClassDecl,
    ClassBody,
    ClassMember,
    Formal,
    TypeNode,
    Stmt,
    Expr,
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeCategory::SourceFile => "source file",
            NodeCategory::ClassDecl => "class declaration",
            NodeCategory::ClassBody => "class body",
            NodeCategory::ClassMember => "class member",
            NodeCategory::Formal => "formal parameter",
            NodeCategory::TypeNode => "type",
            NodeCategory::Stmt => "statement",
            NodeCategory::Expr => "expression",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    SourceFile {
        classes: Vec<Node>,
    },
    ClassDecl {
        name: String,
        params: Vec<String>,
        superclass: Option<Box<Node>>,
        body: Box<Node>,
        /// Set once the class has been declared.
        ty: Option<Type>,
    },
    ClassBody {
        members: Vec<Node>,
    },
    FieldDecl {
        ty: Box<Node>,
        name: String,
        init: Option<Box<Node>>,
    },
    MethodDecl {
        ret: Box<Node>,
        name: String,
        formals: Vec<Node>,
        body: Option<Box<Node>>,
        /// Set once the signature has been built.
        instance: Option<Type>,
    },
    Formal {
        ty: Box<Node>,
        name: String,
    },
    AmbTypeNode {
        name: String,
        args: Vec<Node>,
    },
    ArrayTypeNode {
        base: Box<Node>,
    },
    CanonicalTypeNode {
        ty: Type,
    },
    Block {
        stmts: Vec<Node>,
    },
    Return {
        expr: Option<Box<Node>>,
    },
    Local {
        name: String,
        ty: Option<Type>,
    },
    IntLit {
        value: i64,
    },
    BoolLit {
        value: bool,
    },
    NullLit,
    /// A primitive value wrapped in its object representation.
    Boxed {
        expr: Box<Node>,
        ty: Type,
    },
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::SourceFile { .. } => NodeTag::SourceFile,
            NodeKind::ClassDecl { .. } => NodeTag::ClassDecl,
            NodeKind::ClassBody { .. } => NodeTag::ClassBody,
            NodeKind::FieldDecl { .. } => NodeTag::FieldDecl,
            NodeKind::MethodDecl { .. } => NodeTag::MethodDecl,
            NodeKind::Formal { .. } => NodeTag::Formal,
            NodeKind::AmbTypeNode { .. } => NodeTag::AmbTypeNode,
            NodeKind::ArrayTypeNode { .. } => NodeTag::ArrayTypeNode,
            NodeKind::CanonicalTypeNode { .. } => NodeTag::CanonicalTypeNode,
            NodeKind::Block { .. } => NodeTag::Block,
            NodeKind::Return { .. } => NodeTag::Return,
            NodeKind::Local { .. } => NodeTag::Local,
            NodeKind::IntLit { .. } => NodeTag::IntLit,
            NodeKind::BoolLit { .. } => NodeTag::BoolLit,
            NodeKind::NullLit => NodeTag::NullLit,
            NodeKind::Boxed { .. } => NodeTag::Boxed,
        }
    }
}

/// A syntax tree node with at most one attached delegate.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    span: Span,
    del: Option<Box<dyn Delegate>>,
}

/// Structural equality. Delegates are behavior, not structure, and are
/// ignored.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.span == other.span && kinds_equal(&self.kind, &other.kind)
    }
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Node {
            kind,
            span,
            del: None,
        }
    }

    pub fn with_delegate(mut self, del: Option<Box<dyn Delegate>>) -> Self {
        self.del = del;
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    pub fn category(&self) -> NodeCategory {
        self.tag().category()
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn delegate(&self) -> Option<&dyn Delegate> {
        self.del.as_deref()
    }

    /// The resolved type of a canonical type node.
    pub fn type_of_type_node(&self) -> Option<&Type> {
        match &self.kind {
            NodeKind::CanonicalTypeNode { ty } => Some(ty),
            _ => None,
        }
    }

    /// Copy with the declared class type recorded. Other kinds are returned
    /// unchanged.
    pub fn with_class_type(&self, class: Type) -> Node {
        let mut node = self.clone();
        if let NodeKind::ClassDecl { ty, .. } = &mut node.kind {
            *ty = Some(class);
        }
        node
    }

    pub fn with_method_instance(&self, method: Type) -> Node {
        let mut node = self.clone();
        if let NodeKind::MethodDecl { instance, .. } = &mut node.kind {
            *instance = Some(method);
        }
        node
    }

    pub fn with_local_type(&self, local: Type) -> Node {
        let mut node = self.clone();
        if let NodeKind::Local { ty, .. } = &mut node.kind {
            *ty = Some(local);
        }
        node
    }

    /// Direct children, in source order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::SourceFile { classes } => classes.iter().collect(),
            NodeKind::ClassDecl {
                superclass, body, ..
            } => superclass
                .iter()
                .map(|s| s.as_ref())
                .chain(std::iter::once(body.as_ref()))
                .collect(),
            NodeKind::ClassBody { members } => members.iter().collect(),
            NodeKind::FieldDecl { ty, init, .. } => std::iter::once(ty.as_ref())
                .chain(init.iter().map(|i| i.as_ref()))
                .collect(),
            NodeKind::MethodDecl {
                ret, formals, body, ..
            } => std::iter::once(ret.as_ref())
                .chain(formals.iter())
                .chain(body.iter().map(|b| b.as_ref()))
                .collect(),
            NodeKind::Formal { ty, .. } => vec![ty.as_ref()],
            NodeKind::AmbTypeNode { args, .. } => args.iter().collect(),
            NodeKind::ArrayTypeNode { base } => vec![base.as_ref()],
            NodeKind::Block { stmts } => stmts.iter().collect(),
            NodeKind::Return { expr } => expr.iter().map(|e| e.as_ref()).collect(),
            NodeKind::Boxed { expr, .. } => vec![expr.as_ref()],
            NodeKind::CanonicalTypeNode { .. }
            | NodeKind::Local { .. }
            | NodeKind::IntLit { .. }
            | NodeKind::BoolLit { .. }
            | NodeKind::NullLit => Vec::new(),
        }
    }

    /// Rebuild this node with every child replaced by `f(child)`. The kind,
    /// span and delegate are kept.
    pub fn map_children<E>(
        &self,
        mut f: impl FnMut(&Node) -> Result<Node, E>,
    ) -> Result<Node, E> {
        let kind = match &self.kind {
            NodeKind::SourceFile { classes } => NodeKind::SourceFile {
                classes: map_all(classes, &mut f)?,
            },
            NodeKind::ClassDecl {
                name,
                params,
                superclass,
                body,
                ty,
            } => NodeKind::ClassDecl {
                name: name.clone(),
                params: params.clone(),
                superclass: match superclass {
                    Some(s) => Some(Box::new(f(s)?)),
                    None => None,
                },
                body: Box::new(f(body)?),
                ty: ty.clone(),
            },
            NodeKind::ClassBody { members } => NodeKind::ClassBody {
                members: map_all(members, &mut f)?,
            },
            NodeKind::FieldDecl { ty, name, init } => NodeKind::FieldDecl {
                ty: Box::new(f(ty)?),
                name: name.clone(),
                init: match init {
                    Some(i) => Some(Box::new(f(i)?)),
                    None => None,
                },
            },
            NodeKind::MethodDecl {
                ret,
                name,
                formals,
                body,
                instance,
            } => NodeKind::MethodDecl {
                ret: Box::new(f(ret)?),
                name: name.clone(),
                formals: map_all(formals, &mut f)?,
                body: match body {
                    Some(b) => Some(Box::new(f(b)?)),
                    None => None,
                },
                instance: instance.clone(),
            },
            NodeKind::Formal { ty, name } => NodeKind::Formal {
                ty: Box::new(f(ty)?),
                name: name.clone(),
            },
            NodeKind::AmbTypeNode { name, args } => NodeKind::AmbTypeNode {
                name: name.clone(),
                args: map_all(args, &mut f)?,
            },
            NodeKind::ArrayTypeNode { base } => NodeKind::ArrayTypeNode {
                base: Box::new(f(base)?),
            },
            NodeKind::Block { stmts } => NodeKind::Block {
                stmts: map_all(stmts, &mut f)?,
            },
            NodeKind::Return { expr } => NodeKind::Return {
                expr: match expr {
                    Some(e) => Some(Box::new(f(e)?)),
                    None => None,
                },
            },
            NodeKind::Boxed { expr, ty } => NodeKind::Boxed {
                expr: Box::new(f(expr)?),
                ty: ty.clone(),
            },
            leaf @ (NodeKind::CanonicalTypeNode { .. }
            | NodeKind::Local { .. }
            | NodeKind::IntLit { .. }
            | NodeKind::BoolLit { .. }
            | NodeKind::NullLit) => leaf.clone(),
        };
        Ok(Node {
            kind,
            span: self.span,
            del: self.del.clone(),
        })
    }

    /// Pre-order search for the first node satisfying `pred`.
    pub fn find(&self, pred: &dyn Fn(&Node) -> bool) -> Option<&Node> {
        if pred(self) {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(pred))
    }
}

fn map_all<E>(
    nodes: &[Node],
    f: &mut dyn FnMut(&Node) -> Result<Node, E>,
) -> Result<Vec<Node>, E> {
    nodes.iter().map(|n| f(n)).collect()
}

fn kinds_equal(left: &NodeKind, right: &NodeKind) -> bool {
    use NodeKind as K;
    match (left, right) {
        (K::SourceFile { classes: a }, K::SourceFile { classes: b }) => a == b,
        (
            K::ClassDecl {
                name: n1,
                params: p1,
                superclass: s1,
                body: b1,
                ty: t1,
            },
            K::ClassDecl {
                name: n2,
                params: p2,
                superclass: s2,
                body: b2,
                ty: t2,
            },
        ) => n1 == n2 && p1 == p2 && s1 == s2 && b1 == b2 && t1 == t2,
        (K::ClassBody { members: a }, K::ClassBody { members: b }) => a == b,
        (
            K::FieldDecl {
                ty: t1,
                name: n1,
                init: i1,
            },
            K::FieldDecl {
                ty: t2,
                name: n2,
                init: i2,
            },
        ) => t1 == t2 && n1 == n2 && i1 == i2,
        (
            K::MethodDecl {
                ret: r1,
                name: n1,
                formals: f1,
                body: b1,
                instance: i1,
            },
            K::MethodDecl {
                ret: r2,
                name: n2,
                formals: f2,
                body: b2,
                instance: i2,
            },
        ) => r1 == r2 && n1 == n2 && f1 == f2 && b1 == b2 && i1 == i2,
        (K::Formal { ty: t1, name: n1 }, K::Formal { ty: t2, name: n2 }) => t1 == t2 && n1 == n2,
        (K::AmbTypeNode { name: n1, args: a1 }, K::AmbTypeNode { name: n2, args: a2 }) => {
            n1 == n2 && a1 == a2
        }
        (K::ArrayTypeNode { base: a }, K::ArrayTypeNode { base: b }) => a == b,
        (K::CanonicalTypeNode { ty: a }, K::CanonicalTypeNode { ty: b }) => a == b,
        (K::Block { stmts: a }, K::Block { stmts: b }) => a == b,
        (K::Return { expr: a }, K::Return { expr: b }) => a == b,
        (K::Local { name: n1, ty: t1 }, K::Local { name: n2, ty: t2 }) => n1 == n2 && t1 == t2,
        (K::IntLit { value: a }, K::IntLit { value: b }) => a == b,
        (K::BoolLit { value: a }, K::BoolLit { value: b }) => a == b,
        (K::NullLit, K::NullLit) => true,
        (K::Boxed { expr: e1, ty: t1 }, K::Boxed { expr: e2, ty: t2 }) => e1 == e2 && t1 == t2,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> Node {
        Node::new(
            NodeKind::Local {
                name: name.into(),
                ty: None,
            },
            Span::synthetic(),
        )
    }

    #[test]
    fn rewriting_children_leaves_the_original_intact() {
        let ret = Node::new(
            NodeKind::Return {
                expr: Some(Box::new(local("x"))),
            },
            Span::synthetic(),
        );
        let rewritten = ret
            .map_children(|_| Ok::<_, ()>(local("y")))
            .expect("rewrite");
        assert_eq!(ret.children()[0], &local("x"));
        assert_eq!(rewritten.children()[0], &local("y"));
        assert_eq!(rewritten.tag(), NodeTag::Return);
    }

    #[test]
    fn every_tag_has_a_category() {
        for tag in NodeTag::ALL {
            let _ = tag.category();
        }
        assert_eq!(NodeTag::Boxed.category(), NodeCategory::Expr);
        assert_eq!(NodeTag::MethodDecl.category(), NodeCategory::ClassMember);
    }

    #[test]
    fn find_walks_in_source_order() {
        let block = Node::new(
            NodeKind::Block {
                stmts: vec![
                    Node::new(
                        NodeKind::Return {
                            expr: Some(Box::new(local("a"))),
                        },
                        Span::synthetic(),
                    ),
                    Node::new(
                        NodeKind::Return {
                            expr: Some(Box::new(local("b"))),
                        },
                        Span::synthetic(),
                    ),
                ],
            },
            Span::synthetic(),
        );
        let first = block
            .find(&|n| n.tag() == NodeTag::Local)
            .expect("local present");
        assert!(matches!(first.kind(), NodeKind::Local { name, .. } if name == "a"));
    }
}
