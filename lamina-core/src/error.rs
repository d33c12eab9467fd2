use std::path::PathBuf;

use thiserror::Error;

use crate::ast::NodeTag;
use crate::span::Span;

/// How a [`CoreError`] affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed layer composition. Detected before any unit is compiled.
    Authoring,
    /// A problem confined to one source unit.
    Unit,
    /// A defect in a layer implementation.
    Internal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("no layer is registered for source {0}")]
    UnsupportedSource(PathBuf),
    #[error("parse error at {span}: {message}")]
    ParseError { span: Span, message: String },

    #[error("layer stack is empty")]
    EmptyLayerStack,
    #[error("layer `{layer}` requires inner layer `{required}` which is not below it in the stack")]
    MissingInnerLayer { layer: String, required: String },
    #[error("file extension `.{extension}` is claimed by both `{first}` and `{second}`")]
    DuplicateFileExtension {
        extension: String,
        first: String,
        second: String,
    },
    #[error("layer stack `{layer}` cannot produce reachable node kind `{kind}`")]
    IncompleteFactoryChain { layer: String, kind: NodeTag },
    #[error("pass `{pass}` is anchored on `{anchor}`, which is not in the base pipeline")]
    MissingAnchor { pass: String, anchor: String },
    #[error("passes `{first}` and `{second}` both claim the slot {slot}")]
    DuplicateAnchor {
        slot: String,
        first: String,
        second: String,
    },
    #[error("pass `{0}` is registered more than once")]
    DuplicatePass(String),
    #[error("unknown pass `{0}`")]
    UnknownPass(String),
    #[error("array depth must be at least 1, got {0}")]
    InvalidArrayDepth(i32),

    #[error("internal error: factory chain `{layer}` produced no instance for node kind `{kind}`")]
    FactoryGap { layer: String, kind: NodeTag },
    #[error("internal error: canonicalization violated for `{shape}`")]
    CanonicalizationViolation { shape: String },
}

impl CoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CoreError::SourceIo(_)
            | CoreError::UnsupportedSource(_)
            | CoreError::ParseError { .. } => ErrorClass::Unit,
            CoreError::FactoryGap { .. } | CoreError::CanonicalizationViolation { .. } => {
                ErrorClass::Internal
            }
            _ => ErrorClass::Authoring,
        }
    }

    /// Whether the error aborts the whole session rather than one unit.
    pub fn is_fatal(&self) -> bool {
        self.class() != ErrorClass::Unit
    }
}
