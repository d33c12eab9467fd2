//! Primitive boxing.
//!
//! Adds the `Boxed` node kind and a rewrite pass, run just before output,
//! that replaces every primitive value and primitive type in the tree with
//! its object representation from the runtime package. Until that pass runs,
//! primitives are also assignable to their box and to `Object`.

use std::sync::Arc;

use crate::ast::{Node, NodeKind, NodeTag};
use crate::bootstrap::Layer;
use crate::context::PassContext;
use crate::delegate::{Delegate, DelegateOp};
use crate::error::CoreError;
use crate::factory::{ExtFactory, NodeFactory};
use crate::pipeline::{self, PassEdit, VisitorPass};
use crate::span::Span;
use crate::typecheck;
use crate::types::{Next, Primitive, Type, TypeExtension, TypeSystem};

pub const NAME: &str = "boxing";
pub const BOX_PRIMITIVES: &str = "box-primitives";
pub const RUNTIME_PACKAGE: &str = "lamina.runtime";

/// The runtime class that boxes `primitive`.
pub fn boxed_type(ts: &TypeSystem, primitive: Primitive) -> Type {
    let name = match primitive {
        Primitive::Int => "Integer",
        Primitive::Boolean => "Boolean",
    };
    ts.class_type(&format!("{RUNTIME_PACKAGE}.{name}"), ts.object(), Vec::new())
}

/// The box of `ty`, when `ty` is primitive.
pub fn boxed_equivalent(ts: &TypeSystem, ty: &Type) -> Option<Type> {
    ty.as_primitive().map(|primitive| boxed_type(ts, primitive))
}

#[derive(Debug, Default)]
pub struct BoxingTypes;

impl TypeExtension for BoxingTypes {
    fn layer(&self) -> &str {
        NAME
    }

    fn is_assignable(&self, next: Next<'_>, from: &Type, to: &Type) -> bool {
        let ts = next.type_system();
        if let Some(boxed) = boxed_equivalent(ts, from) {
            if *to == boxed || to.is_object() {
                return true;
            }
        }
        if let Some(boxed) = boxed_equivalent(ts, to) {
            if *from == boxed {
                return true;
            }
        }
        next.is_assignable(from, to)
    }
}

#[derive(Debug)]
pub struct BoxingNodeFactory {
    inner: Box<dyn NodeFactory>,
}

impl NodeFactory for BoxingNodeFactory {
    fn layer(&self) -> &str {
        NAME
    }

    fn inner(&self) -> Option<&dyn NodeFactory> {
        Some(self.inner.as_ref())
    }

    fn boxed(&self, span: Span, expr: Node, ty: Type) -> Result<Node, CoreError> {
        Ok(self.finish(
            NodeKind::Boxed {
                expr: Box::new(expr),
                ty,
            },
            span,
        ))
    }
}

#[derive(Debug)]
pub struct BoxingExtFactory {
    inner: Box<dyn ExtFactory>,
}

impl ExtFactory for BoxingExtFactory {
    fn layer(&self) -> &str {
        NAME
    }

    fn inner(&self) -> Option<&dyn ExtFactory> {
        Some(self.inner.as_ref())
    }

    fn ext_impl(&self, tag: NodeTag, inner: Option<Box<dyn Delegate>>) -> Option<Box<dyn Delegate>> {
        match tag {
            NodeTag::CanonicalTypeNode
            | NodeTag::Local
            | NodeTag::IntLit
            | NodeTag::BoolLit
            | NodeTag::MethodDecl => Some(Box::new(BoxingDelegate { inner })),
            _ => self.ext_category(tag.category(), inner),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoxingDelegate {
    inner: Option<Box<dyn Delegate>>,
}

impl BoxingDelegate {
    fn forward(&self, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
        match &self.inner {
            Some(inner) => inner.rewrite(node, cx),
            None => Ok(node.clone()),
        }
    }

    fn box_literal(
        &self,
        node: &Node,
        primitive: Primitive,
        cx: &mut PassContext<'_>,
    ) -> Result<Node, CoreError> {
        let literal = self.forward(node, cx)?;
        let ty = boxed_type(cx.ts(), primitive);
        cx.nf().boxed(node.span(), literal, ty)
    }
}

impl Delegate for BoxingDelegate {
    fn layer(&self) -> &str {
        NAME
    }

    fn inner(&self) -> Option<&dyn Delegate> {
        self.inner.as_deref()
    }

    fn clone_box(&self) -> Box<dyn Delegate> {
        Box::new(self.clone())
    }

    fn rewrite(&self, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
        let ts = cx.ts();
        match node.kind() {
            NodeKind::CanonicalTypeNode { ty } => match boxed_equivalent(ts, ty) {
                Some(boxed) => cx.nf().canonical_type(node.span(), boxed),
                None => self.forward(node, cx),
            },
            NodeKind::Local { ty: Some(ty), .. } => match boxed_equivalent(ts, ty) {
                Some(boxed) => Ok(self.forward(node, cx)?.with_local_type(boxed)),
                None => self.forward(node, cx),
            },
            NodeKind::IntLit { .. } => self.box_literal(node, Primitive::Int, cx),
            NodeKind::BoolLit { .. } => self.box_literal(node, Primitive::Boolean, cx),
            NodeKind::MethodDecl {
                ret,
                name,
                formals,
                instance: Some(_),
                ..
            } => {
                let rewritten = self.forward(node, cx)?;
                match typecheck::method_shape(ret, name, formals, cx) {
                    Some(shape) => Ok(rewritten.with_method_instance(ts.method_instance(shape))),
                    None => Ok(rewritten),
                }
            }
            _ => self.forward(node, cx),
        }
    }
}

#[derive(Debug, Default)]
pub struct BoxingLayer;

impl Layer for BoxingLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn requires(&self) -> &[&str] {
        &[super::base::NAME]
    }

    fn file_extensions(&self) -> &[&str] {
        &["lmb"]
    }

    fn node_kinds(&self) -> &[NodeTag] {
        &[NodeTag::Boxed]
    }

    fn wrap_ext_factory(&self, inner: Box<dyn ExtFactory>) -> Box<dyn ExtFactory> {
        Box::new(BoxingExtFactory { inner })
    }

    fn wrap_node_factory(&self, inner: Box<dyn NodeFactory>) -> Box<dyn NodeFactory> {
        Box::new(BoxingNodeFactory { inner })
    }

    fn type_extension(&self) -> Option<Arc<dyn TypeExtension>> {
        Some(Arc::new(BoxingTypes))
    }

    fn pass_edits(&self) -> Vec<PassEdit> {
        vec![PassEdit::before(
            NAME,
            pipeline::OUTPUT,
            Arc::new(VisitorPass::new(BOX_PRIMITIVES, DelegateOp::Rewrite)),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, compile_source};
    use crate::delegate::chain_layers;
    use crate::layers;
    use crate::types::TypeVariant;

    const NARROWED: &str = "class A {\n    Object get(int key) {\n        return null;\n    }\n}\n\nclass B extends A {\n    B get(int key) {\n        return null;\n    }\n}\n";

    fn formal_type(report: &crate::compiler::UnitReport, class: &str) -> Type {
        let ast = report.ast.as_ref().expect("ast");
        let class = ast
            .find(&|n| matches!(n.kind(), NodeKind::ClassDecl { name, .. } if name == class))
            .expect("class");
        class
            .find(&|n| n.tag() == NodeTag::Formal)
            .and_then(|formal| formal.children()[0].type_of_type_node().cloned())
            .expect("formal type")
    }

    #[test]
    fn stack_accepts_narrowing_and_boxes_parameters() {
        let boxing = layers::bootstrap(NAME).expect("boxing");
        assert_eq!(boxing.layers(), ["base", "covariant", "boxing"]);
        assert!(
            boxing
                .pipeline()
                .ids()
                .ends_with(&[BOX_PRIMITIVES, pipeline::OUTPUT])
        );

        let report =
            compile_source(&boxing, NARROWED, &CompileOptions::default()).expect("compile");
        assert!(!report.failed, "{:?}", report.diagnostics);

        let param = formal_type(&report, "B");
        assert_eq!(param.to_string(), "lamina.runtime.Integer");
        assert_eq!(param, boxed_type(boxing.type_system(), Primitive::Int));
        let output = report.output.expect("output");
        assert!(output.contains("B get(lamina.runtime.Integer key)"), "{output}");
    }

    #[test]
    fn literals_are_wrapped_and_locals_retyped() {
        let source = "class C {\n    int count = 1;\n    boolean flag(int n) {\n        return true;\n    }\n    int same(int n) {\n        return n;\n    }\n}\n";
        let boxing = layers::bootstrap(NAME).expect("boxing");
        let report = compile_source(&boxing, source, &CompileOptions::default()).expect("compile");
        assert!(!report.failed, "{:?}", report.diagnostics);
        let output = report.output.expect("output");
        assert!(
            output.contains("lamina.runtime.Integer count = new lamina.runtime.Integer(1);"),
            "{output}"
        );
        assert!(output.contains("return new lamina.runtime.Boolean(true);"));

        let ast = report.ast.expect("ast");
        let local = ast.find(&|n| n.tag() == NodeTag::Local).expect("local");
        let NodeKind::Local { ty: Some(ty), .. } = local.kind() else {
            panic!("local was not typed");
        };
        assert_eq!(ty.to_string(), "lamina.runtime.Integer");

        let method = ast
            .find(&|n| matches!(n.kind(), NodeKind::MethodDecl { name, .. } if name == "same"))
            .expect("method");
        let NodeKind::MethodDecl {
            instance: Some(instance),
            ..
        } = method.kind()
        else {
            panic!("method has no signature");
        };
        assert!(matches!(instance.variant(), TypeVariant::CovariantMethod(_)));
        assert_eq!(
            instance.as_method().map(|m| m.ret.to_string()),
            Some("lamina.runtime.Integer".to_string())
        );
    }

    #[test]
    fn primitives_are_assignable_to_object_before_boxing() {
        let source = "class C {\n    Object any = 3;\n}\n";
        let boxing = layers::bootstrap(NAME).expect("boxing");
        let base = layers::bootstrap(layers::base::NAME).expect("base");
        let options = CompileOptions::default();
        assert!(!compile_source(&boxing, source, &options).expect("boxing").failed);
        assert!(compile_source(&base, source, &options).expect("base").failed);
    }

    #[test]
    fn literal_delegates_chain_through_the_stack() {
        let boxing = layers::bootstrap(NAME).expect("boxing");
        let literal = boxing
            .node_factory()
            .int_lit(Span::synthetic(), 7)
            .expect("literal");
        assert_eq!(chain_layers(&literal), vec![NAME]);
        let boxed = boxing
            .node_factory()
            .boxed(
                Span::synthetic(),
                literal,
                boxed_type(boxing.type_system(), Primitive::Int),
            )
            .expect("boxed");
        assert_eq!(boxed.tag(), NodeTag::Boxed);
    }

    #[test]
    fn stopping_before_the_rewrite_keeps_primitives() {
        let boxing = layers::bootstrap(NAME).expect("boxing");
        let options = CompileOptions {
            stop_after: Some(pipeline::TYPE_CHECK.to_string()),
            ..CompileOptions::default()
        };
        let report = compile_source(&boxing, NARROWED, &options).expect("compile");
        assert!(!report.failed);
        assert!(report.output.is_none());
        assert_eq!(formal_type(&report, "B").to_string(), "int");
    }
}
