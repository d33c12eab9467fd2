//! Whole-tree traversal.

use crate::ast::Node;
use crate::context::PassContext;
use crate::delegate::{DelegateOp, dispatch};
use crate::error::CoreError;

/// Apply `op` to every node of `root`, children before parents.
///
/// A replacement whose category differs from the node it replaces is
/// reported as a diagnostic and discarded; the rebuilt original is kept.
pub fn visit(op: DelegateOp, root: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
    cx.enter(root);
    let result = root
        .map_children(|child| visit(op, child, cx))
        .and_then(|rebuilt| dispatch(op, &rebuilt, cx).map(|replaced| (rebuilt, replaced)));
    cx.leave(root);
    let (rebuilt, replaced) = result?;

    if replaced.category() != root.category() {
        let layer = rebuilt
            .delegate()
            .map(|del| del.layer().to_string())
            .unwrap_or_else(|| "base".to_string());
        cx.error(
            format!(
                "layer `{layer}` replaced a {} with a {} ({op:?})",
                root.category(),
                replaced.category()
            ),
            root.span(),
        );
        return Ok(rebuilt);
    }
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ast::{NodeKind, NodeTag};
    use crate::delegate::Delegate;
    use crate::factory::{BaseExtFactory, BaseNodeFactory};
    use crate::span::Span;
    use crate::types::{TypeRegistry, TypeSystem};

    /// Turns the expression it is attached to into a statement.
    #[derive(Debug, Clone)]
    struct Misplaced;

    impl Delegate for Misplaced {
        fn layer(&self) -> &str {
            "misplaced"
        }

        fn inner(&self) -> Option<&dyn Delegate> {
            None
        }

        fn clone_box(&self) -> Box<dyn Delegate> {
            Box::new(self.clone())
        }

        fn rewrite(&self, node: &Node, _cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
            Ok(Node::new(NodeKind::Block { stmts: Vec::new() }, node.span()))
        }
    }

    #[test]
    fn category_changing_rewrite_becomes_a_diagnostic() {
        let ts = TypeSystem::new(Arc::new(TypeRegistry::new()), Vec::new());
        let nf = BaseNodeFactory::new(Arc::new(BaseExtFactory));
        let mut cx = PassContext::new(&ts, &nf);
        let literal = Node::new(NodeKind::IntLit { value: 3 }, Span::synthetic())
            .with_delegate(Some(Box::new(Misplaced)));
        let ret = Node::new(
            NodeKind::Return {
                expr: Some(Box::new(literal)),
            },
            Span::synthetic(),
        );

        let out = visit(DelegateOp::Rewrite, &ret, &mut cx).expect("no abort");
        assert_eq!(out.children()[0].tag(), NodeTag::IntLit);
        assert_eq!(cx.error_count(), 1);
        assert!(cx.diagnostics()[0].message.contains("misplaced"));
    }

    #[test]
    fn nodes_without_delegates_rewrite_to_themselves() {
        let ts = TypeSystem::new(Arc::new(TypeRegistry::new()), Vec::new());
        let nf = BaseNodeFactory::new(Arc::new(BaseExtFactory));
        let mut cx = PassContext::new(&ts, &nf);
        let ret = Node::new(
            NodeKind::Return {
                expr: Some(Box::new(Node::new(NodeKind::NullLit, Span::synthetic()))),
            },
            Span::synthetic(),
        );
        let out = visit(DelegateOp::Rewrite, &ret, &mut cx).expect("rewrite");
        assert_eq!(out, ret);
        assert_eq!(cx.error_count(), 0);
    }
}
