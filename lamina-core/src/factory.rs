//! Node and delegate factories.
//!
//! Each layer contributes at most one [`NodeFactory`] and one [`ExtFactory`],
//! each wrapping the factory of the layer below. A layer overrides exactly
//! the construction points it changes; everything else falls through to the
//! wrapped factory. The chains are composed bottom-up once, at bootstrap.

use std::fmt;
use std::sync::Arc;

use crate::ast::{Node, NodeCategory, NodeKind, NodeTag};
use crate::delegate::Delegate;
use crate::error::CoreError;
use crate::span::Span;
use crate::types::{Type, TypeSystem};

/// Produces the delegate chain attached to new nodes.
pub trait ExtFactory: fmt::Debug + Send + Sync {
    fn layer(&self) -> &str;

    fn inner(&self) -> Option<&dyn ExtFactory>;

    /// Delegate chain for a node of kind `tag`: the inner layers' chain,
    /// wrapped by this layer's delegate when it has one.
    fn ext(&self, tag: NodeTag) -> Option<Box<dyn Delegate>> {
        let inner = self.inner().and_then(|inner| inner.ext(tag));
        self.ext_impl(tag, inner)
    }

    /// This layer's contribution for `tag`. Kinds the layer does not know
    /// individually fall back to their ancestor category.
    fn ext_impl(
        &self,
        tag: NodeTag,
        inner: Option<Box<dyn Delegate>>,
    ) -> Option<Box<dyn Delegate>> {
        self.ext_category(tag.category(), inner)
    }

    fn ext_category(
        &self,
        _category: NodeCategory,
        inner: Option<Box<dyn Delegate>>,
    ) -> Option<Box<dyn Delegate>> {
        inner
    }
}

/// The innermost delegate factory: the base language attaches no delegates.
#[derive(Debug, Default)]
pub struct BaseExtFactory;

impl ExtFactory for BaseExtFactory {
    fn layer(&self) -> &str {
        "base"
    }

    fn inner(&self) -> Option<&dyn ExtFactory> {
        None
    }
}

fn gap<F: NodeFactory + ?Sized>(factory: &F, kind: NodeTag) -> CoreError {
    CoreError::FactoryGap {
        layer: factory.layer().to_string(),
        kind,
    }
}

/// One construction method per node kind.
///
/// The default of every method forwards to [`NodeFactory::inner`]; a chain
/// with no factory for a kind reports [`CoreError::FactoryGap`].
pub trait NodeFactory: fmt::Debug + Send + Sync {
    fn layer(&self) -> &str;

    fn inner(&self) -> Option<&dyn NodeFactory>;

    /// The composed delegate factory of the whole stack.
    fn ext_factory(&self) -> Option<&Arc<dyn ExtFactory>> {
        self.inner().and_then(|inner| inner.ext_factory())
    }

    /// Attach the stack's delegate chain for `kind` to a new node.
    fn finish(&self, kind: NodeKind, span: Span) -> Node {
        let tag = kind.tag();
        let del = self.ext_factory().and_then(|ext| ext.ext(tag));
        Node::new(kind, span).with_delegate(del)
    }

    fn source_file(&self, span: Span, classes: Vec<Node>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.source_file(span, classes),
            None => Err(gap(self, NodeTag::SourceFile)),
        }
    }

    fn class_decl(
        &self,
        span: Span,
        name: String,
        params: Vec<String>,
        superclass: Option<Node>,
        body: Node,
    ) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.class_decl(span, name, params, superclass, body),
            None => Err(gap(self, NodeTag::ClassDecl)),
        }
    }

    fn class_body(&self, span: Span, members: Vec<Node>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.class_body(span, members),
            None => Err(gap(self, NodeTag::ClassBody)),
        }
    }

    fn field_decl(
        &self,
        span: Span,
        ty: Node,
        name: String,
        init: Option<Node>,
    ) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.field_decl(span, ty, name, init),
            None => Err(gap(self, NodeTag::FieldDecl)),
        }
    }

    fn method_decl(
        &self,
        span: Span,
        ret: Node,
        name: String,
        formals: Vec<Node>,
        body: Option<Node>,
    ) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.method_decl(span, ret, name, formals, body),
            None => Err(gap(self, NodeTag::MethodDecl)),
        }
    }

    fn formal(&self, span: Span, ty: Node, name: String) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.formal(span, ty, name),
            None => Err(gap(self, NodeTag::Formal)),
        }
    }

    fn amb_type(&self, span: Span, name: String, args: Vec<Node>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.amb_type(span, name, args),
            None => Err(gap(self, NodeTag::AmbTypeNode)),
        }
    }

    fn array_type(&self, span: Span, base: Node) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.array_type(span, base),
            None => Err(gap(self, NodeTag::ArrayTypeNode)),
        }
    }

    fn canonical_type(&self, span: Span, ty: Type) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.canonical_type(span, ty),
            None => Err(gap(self, NodeTag::CanonicalTypeNode)),
        }
    }

    fn block(&self, span: Span, stmts: Vec<Node>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.block(span, stmts),
            None => Err(gap(self, NodeTag::Block)),
        }
    }

    fn return_stmt(&self, span: Span, expr: Option<Node>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.return_stmt(span, expr),
            None => Err(gap(self, NodeTag::Return)),
        }
    }

    fn local(&self, span: Span, name: String) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.local(span, name),
            None => Err(gap(self, NodeTag::Local)),
        }
    }

    fn int_lit(&self, span: Span, value: i64) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.int_lit(span, value),
            None => Err(gap(self, NodeTag::IntLit)),
        }
    }

    fn bool_lit(&self, span: Span, value: bool) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.bool_lit(span, value),
            None => Err(gap(self, NodeTag::BoolLit)),
        }
    }

    fn null_lit(&self, span: Span) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.null_lit(span),
            None => Err(gap(self, NodeTag::NullLit)),
        }
    }

    fn boxed(&self, span: Span, expr: Node, ty: Type) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.boxed(span, expr, ty),
            None => Err(gap(self, NodeTag::Boxed)),
        }
    }
}

/// Factory for every kind of the base language.
#[derive(Debug)]
pub struct BaseNodeFactory {
    ext: Arc<dyn ExtFactory>,
}

impl BaseNodeFactory {
    /// `ext` is the fully composed delegate factory of the stack.
    pub fn new(ext: Arc<dyn ExtFactory>) -> Self {
        BaseNodeFactory { ext }
    }
}

impl NodeFactory for BaseNodeFactory {
    fn layer(&self) -> &str {
        "base"
    }

    fn inner(&self) -> Option<&dyn NodeFactory> {
        None
    }

    fn ext_factory(&self) -> Option<&Arc<dyn ExtFactory>> {
        Some(&self.ext)
    }

    fn source_file(&self, span: Span, classes: Vec<Node>) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::SourceFile { classes }, span))
    }

    fn class_decl(
        &self,
        span: Span,
        name: String,
        params: Vec<String>,
        superclass: Option<Node>,
        body: Node,
    ) -> Result<Node, CoreError> {
        Ok(self.finish(
            NodeKind::ClassDecl {
                name,
                params,
                superclass: superclass.map(Box::new),
                body: Box::new(body),
                ty: None,
            },
            span,
        ))
    }

    fn class_body(&self, span: Span, members: Vec<Node>) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::ClassBody { members }, span))
    }

    fn field_decl(
        &self,
        span: Span,
        ty: Node,
        name: String,
        init: Option<Node>,
    ) -> Result<Node, CoreError> {
        Ok(self.finish(
            NodeKind::FieldDecl {
                ty: Box::new(ty),
                name,
                init: init.map(Box::new),
            },
            span,
        ))
    }

    fn method_decl(
        &self,
        span: Span,
        ret: Node,
        name: String,
        formals: Vec<Node>,
        body: Option<Node>,
    ) -> Result<Node, CoreError> {
        Ok(self.finish(
            NodeKind::MethodDecl {
                ret: Box::new(ret),
                name,
                formals,
                body: body.map(Box::new),
                instance: None,
            },
            span,
        ))
    }

    fn formal(&self, span: Span, ty: Node, name: String) -> Result<Node, CoreError> {
        Ok(self.finish(
            NodeKind::Formal {
                ty: Box::new(ty),
                name,
            },
            span,
        ))
    }

    fn amb_type(&self, span: Span, name: String, args: Vec<Node>) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::AmbTypeNode { name, args }, span))
    }

    fn array_type(&self, span: Span, base: Node) -> Result<Node, CoreError> {
        Ok(self.finish(
            NodeKind::ArrayTypeNode {
                base: Box::new(base),
            },
            span,
        ))
    }

    fn canonical_type(&self, span: Span, ty: Type) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::CanonicalTypeNode { ty }, span))
    }

    fn block(&self, span: Span, stmts: Vec<Node>) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::Block { stmts }, span))
    }

    fn return_stmt(&self, span: Span, expr: Option<Node>) -> Result<Node, CoreError> {
        Ok(self.finish(
            NodeKind::Return {
                expr: expr.map(Box::new),
            },
            span,
        ))
    }

    fn local(&self, span: Span, name: String) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::Local { name, ty: None }, span))
    }

    fn int_lit(&self, span: Span, value: i64) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::IntLit { value }, span))
    }

    fn bool_lit(&self, span: Span, value: bool) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::BoolLit { value }, span))
    }

    fn null_lit(&self, span: Span) -> Result<Node, CoreError> {
        Ok(self.finish(NodeKind::NullLit, span))
    }
}

/// Construct a placeholder node of kind `tag` through `nf`.
///
/// Used to verify at bootstrap that the composed chain can produce every
/// reachable kind.
pub fn probe(nf: &dyn NodeFactory, ts: &TypeSystem, tag: NodeTag) -> Result<Node, CoreError> {
    let span = Span::synthetic();
    let leaf = || Node::new(NodeKind::NullLit, span);
    let ty_node = || Node::new(NodeKind::CanonicalTypeNode { ty: ts.object() }, span);
    match tag {
        NodeTag::SourceFile => nf.source_file(span, Vec::new()),
        NodeTag::ClassDecl => nf.class_decl(
            span,
            "Probe".into(),
            Vec::new(),
            None,
            Node::new(NodeKind::ClassBody { members: Vec::new() }, span),
        ),
        NodeTag::ClassBody => nf.class_body(span, Vec::new()),
        NodeTag::FieldDecl => nf.field_decl(span, ty_node(), "probe".into(), None),
        NodeTag::MethodDecl => nf.method_decl(span, ty_node(), "probe".into(), Vec::new(), None),
        NodeTag::Formal => nf.formal(span, ty_node(), "probe".into()),
        NodeTag::AmbTypeNode => nf.amb_type(span, "Probe".into(), Vec::new()),
        NodeTag::ArrayTypeNode => nf.array_type(span, ty_node()),
        NodeTag::CanonicalTypeNode => nf.canonical_type(span, ts.object()),
        NodeTag::Block => nf.block(span, Vec::new()),
        NodeTag::Return => nf.return_stmt(span, None),
        NodeTag::Local => nf.local(span, "probe".into()),
        NodeTag::IntLit => nf.int_lit(span, 0),
        NodeTag::BoolLit => nf.bool_lit(span, false),
        NodeTag::NullLit => nf.null_lit(span),
        NodeTag::Boxed => nf.boxed(span, leaf(), ts.object()),
    }
}
