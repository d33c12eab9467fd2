use crate::ast::NodeTag;
use crate::bootstrap::Layer;

pub const NAME: &str = "base";

const KEYWORDS: &[&str] = &[
    "class", "extends", "return", "null", "true", "false", "int", "boolean", "void",
];

const NODE_KINDS: &[NodeTag] = &[
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
];

/// The base language. Its factories and type rules are the innermost links
/// of every chain, so the layer itself only declares the surface.
#[derive(Debug, Default)]
pub struct BaseLayer;

impl Layer for BaseLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn file_extensions(&self) -> &[&str] {
        &["lm"]
    }

    fn keywords(&self) -> &[&str] {
        KEYWORDS
    }

    fn node_kinds(&self) -> &[NodeTag] {
        NODE_KINDS
    }
}
