//! Per-node extension delegates.
//!
//! A delegate created by layer *k* owns the delegate layer *k-1* created for
//! the same node and forwards whatever it does not override. When the chain
//! runs out, the base language's behavior for the node kind applies.

use std::fmt;

use crate::ast::Node;
use crate::context::PassContext;
use crate::error::CoreError;
use crate::printer::{self, Printer};
use crate::typecheck;

/// The operations a pass can ask of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateOp {
    BuildTypes,
    Disambiguate,
    BuildSignatures,
    TypeCheck,
    Rewrite,
}

pub trait Delegate: fmt::Debug + Send + Sync {
    /// Name of the layer that contributed this delegate.
    fn layer(&self) -> &str;

    /// The wrapped delegate of the next-inner layer.
    fn inner(&self) -> Option<&dyn Delegate>;

    fn clone_box(&self) -> Box<dyn Delegate>;

    fn build_types(&self, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.build_types(node, cx),
            None => typecheck::build_types(node, cx),
        }
    }

    fn disambiguate(&self, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.disambiguate(node, cx),
            None => typecheck::disambiguate(node, cx),
        }
    }

    fn build_signatures(&self, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.build_signatures(node, cx),
            None => typecheck::build_signatures(node, cx),
        }
    }

    fn type_check(&self, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.type_check(node, cx),
            None => typecheck::type_check(node, cx),
        }
    }

    /// Desugaring rewrite. Without an override anywhere in the chain the node
    /// is returned unchanged.
    fn rewrite(&self, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
        match self.inner() {
            Some(inner) => inner.rewrite(node, cx),
            None => Ok(node.clone()),
        }
    }

    fn print(&self, node: &Node, out: &mut Printer) {
        match self.inner() {
            Some(inner) => inner.print(node, out),
            None => printer::print_base(node, out),
        }
    }
}

impl Clone for Box<dyn Delegate> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Iterate a delegation chain from the outermost delegate inward.
pub fn chain(outermost: &dyn Delegate) -> impl Iterator<Item = &dyn Delegate> {
    std::iter::successors(Some(outermost), |del| del.inner())
}

/// Layer names along a node's delegation chain, outermost first.
pub fn chain_layers(node: &Node) -> Vec<String> {
    node.delegate()
        .map(|del| chain(del).map(|d| d.layer().to_string()).collect())
        .unwrap_or_default()
}

/// Run `op` on `node`: through its delegate when one is attached, otherwise
/// with the base behavior for its kind.
pub fn dispatch(op: DelegateOp, node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
    match (op, node.delegate()) {
        (DelegateOp::BuildTypes, Some(del)) => del.build_types(node, cx),
        (DelegateOp::BuildTypes, None) => typecheck::build_types(node, cx),
        (DelegateOp::Disambiguate, Some(del)) => del.disambiguate(node, cx),
        (DelegateOp::Disambiguate, None) => typecheck::disambiguate(node, cx),
        (DelegateOp::BuildSignatures, Some(del)) => del.build_signatures(node, cx),
        (DelegateOp::BuildSignatures, None) => typecheck::build_signatures(node, cx),
        (DelegateOp::TypeCheck, Some(del)) => del.type_check(node, cx),
        (DelegateOp::TypeCheck, None) => typecheck::type_check(node, cx),
        (DelegateOp::Rewrite, Some(del)) => del.rewrite(node, cx),
        (DelegateOp::Rewrite, None) => Ok(node.clone()),
    }
}
