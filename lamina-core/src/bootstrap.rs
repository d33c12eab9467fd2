//! Layer bootstrap: assembles one language stack.
//!
//! A [`Layer`] describes what one language layer adds. [`LayerBootstrap`]
//! composes a stack of them, innermost first, into the keyword set, factory
//! chains, type system and pass pipeline used to compile units. Everything is
//! built exactly once and validated before any unit is seen; a stack that
//! fails validation never yields a partial bootstrap.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::ast::NodeTag;
use crate::error::CoreError;
use crate::factory::{self, BaseExtFactory, BaseNodeFactory, ExtFactory, NodeFactory};
use crate::lexer::KeywordSet;
use crate::parser::{self, ParseResult};
use crate::pipeline::{self, PassEdit, Pipeline};
use crate::span::FileId;
use crate::types::{TypeExtension, TypeRegistry, TypeSystem};

/// One language layer's contribution to a stack.
pub trait Layer: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Layers that must appear below this one.
    fn requires(&self) -> &[&str] {
        &[]
    }

    /// Extensions of source files written in a stack topped by this layer.
    fn file_extensions(&self) -> &[&str] {
        &[]
    }

    fn keywords(&self) -> &[&str] {
        &[]
    }

    /// Node kinds this layer makes reachable.
    fn node_kinds(&self) -> &[NodeTag] {
        &[]
    }

    fn wrap_ext_factory(&self, inner: Box<dyn ExtFactory>) -> Box<dyn ExtFactory> {
        inner
    }

    fn wrap_node_factory(&self, inner: Box<dyn NodeFactory>) -> Box<dyn NodeFactory> {
        inner
    }

    fn type_extension(&self) -> Option<Arc<dyn TypeExtension>> {
        None
    }

    fn pass_edits(&self) -> Vec<PassEdit> {
        Vec::new()
    }
}

/// The assembled, immutable front end of one layer stack.
#[derive(Debug)]
pub struct LayerBootstrap {
    layers: Vec<String>,
    file_extensions: Vec<String>,
    keywords: KeywordSet,
    node_factory: Arc<dyn NodeFactory>,
    type_system: Arc<TypeSystem>,
    pipeline: Pipeline,
}

impl LayerBootstrap {
    /// Compose `stack`, innermost layer first.
    pub fn new(stack: Vec<Arc<dyn Layer>>) -> Result<Self, CoreError> {
        let outermost = stack.last().ok_or(CoreError::EmptyLayerStack)?;
        let name = outermost.name().to_string();

        for (depth, layer) in stack.iter().enumerate() {
            for required in layer.requires() {
                if !stack[..depth].iter().any(|below| below.name() == *required) {
                    return Err(CoreError::MissingInnerLayer {
                        layer: layer.name().to_string(),
                        required: required.to_string(),
                    });
                }
            }
        }

        let keywords: KeywordSet = stack
            .iter()
            .flat_map(|layer| layer.keywords().iter().copied())
            .collect();

        let mut ext: Box<dyn ExtFactory> = Box::new(BaseExtFactory);
        for layer in &stack {
            ext = layer.wrap_ext_factory(ext);
        }
        let ext: Arc<dyn ExtFactory> = Arc::from(ext);

        let mut nf: Box<dyn NodeFactory> = Box::new(BaseNodeFactory::new(ext));
        for layer in &stack {
            nf = layer.wrap_node_factory(nf);
        }
        let node_factory: Arc<dyn NodeFactory> = Arc::from(nf);

        let extensions: Vec<Arc<dyn TypeExtension>> = stack
            .iter()
            .rev()
            .filter_map(|layer| layer.type_extension())
            .collect();
        let type_system = Arc::new(TypeSystem::new(Arc::new(TypeRegistry::new()), extensions));

        let reachable: BTreeSet<NodeTag> = stack
            .iter()
            .flat_map(|layer| layer.node_kinds().iter().copied())
            .collect();
        for tag in reachable {
            let produced = factory::probe(node_factory.as_ref(), &type_system, tag);
            if !produced.is_ok_and(|node| node.tag() == tag) {
                return Err(CoreError::IncompleteFactoryChain {
                    layer: name.clone(),
                    kind: tag,
                });
            }
        }

        let edits = stack.iter().flat_map(|layer| layer.pass_edits()).collect();
        let pipeline = Pipeline::resolve(pipeline::base_passes(), edits)?;

        let bootstrap = LayerBootstrap {
            layers: stack.iter().map(|layer| layer.name().to_string()).collect(),
            file_extensions: outermost
                .file_extensions()
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            keywords,
            node_factory,
            type_system,
            pipeline,
        };
        debug!(
            layer = %name,
            stack = ?bootstrap.layers,
            type_layers = ?bootstrap.type_system.layers(),
            keywords = bootstrap.keywords.len(),
            "assembled layer bootstrap"
        );
        Ok(bootstrap)
    }

    /// Name of the outermost layer.
    pub fn name(&self) -> &str {
        self.layers.last().map(String::as_str).unwrap_or_default()
    }

    /// Layer names, innermost first.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn file_extensions(&self) -> &[String] {
        &self.file_extensions
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn node_factory(&self) -> &dyn NodeFactory {
        self.node_factory.as_ref()
    }

    pub fn type_system(&self) -> &TypeSystem {
        &self.type_system
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Parse a unit with this stack's keywords and node factory.
    pub fn parse(&self, file: FileId, source: &str) -> Result<ParseResult, CoreError> {
        parser::parse(file, source, &self.keywords, self.node_factory())
    }
}

/// Bootstraps of a session, selected by file extension.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    bootstraps: Vec<Arc<LayerBootstrap>>,
    by_extension: HashMap<String, usize>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bootstrap: LayerBootstrap) -> Result<(), CoreError> {
        let index = self.bootstraps.len();
        for extension in bootstrap.file_extensions() {
            if let Some(&existing) = self.by_extension.get(extension) {
                return Err(CoreError::DuplicateFileExtension {
                    extension: extension.clone(),
                    first: self.bootstraps[existing].name().to_string(),
                    second: bootstrap.name().to_string(),
                });
            }
        }
        for extension in bootstrap.file_extensions() {
            self.by_extension.insert(extension.clone(), index);
        }
        self.bootstraps.push(Arc::new(bootstrap));
        Ok(())
    }

    pub fn bootstraps(&self) -> &[Arc<LayerBootstrap>] {
        &self.bootstraps
    }

    pub fn for_extension(&self, extension: &str) -> Option<&Arc<LayerBootstrap>> {
        self.by_extension
            .get(extension)
            .map(|&index| &self.bootstraps[index])
    }

    pub fn for_path(&self, path: &Path) -> Option<&Arc<LayerBootstrap>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.for_extension(ext))
    }

    pub fn claims(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::DelegateOp;
    use crate::layers::{array, base, boxing, covariant};
    use crate::pipeline::VisitorPass;

    /// Claims a node kind without contributing a factory for it.
    #[derive(Debug)]
    struct Careless;

    impl Layer for Careless {
        fn name(&self) -> &str {
            "careless"
        }

        fn requires(&self) -> &[&str] {
            &[base::NAME]
        }

        fn keywords(&self) -> &[&str] {
            &["unless"]
        }

        fn node_kinds(&self) -> &[NodeTag] {
            &[NodeTag::Boxed]
        }
    }

    #[derive(Debug)]
    struct Anchored(&'static str);

    impl Layer for Anchored {
        fn name(&self) -> &str {
            "anchored"
        }

        fn keywords(&self) -> &[&str] {
            &["unless"]
        }

        fn pass_edits(&self) -> Vec<PassEdit> {
            vec![PassEdit::after(
                "anchored",
                self.0,
                Arc::new(VisitorPass::new("lint", DelegateOp::TypeCheck)),
            )]
        }
    }

    #[test]
    fn empty_stack_is_rejected() {
        assert!(matches!(
            LayerBootstrap::new(Vec::new()).unwrap_err(),
            CoreError::EmptyLayerStack
        ));
    }

    #[test]
    fn required_layers_must_sit_below() {
        let err = LayerBootstrap::new(vec![Arc::new(array::ArrayLayer)]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MissingInnerLayer { ref layer, ref required }
                if layer == array::NAME && required == base::NAME
        ));

        let inverted: Vec<Arc<dyn Layer>> =
            vec![Arc::new(covariant::CovariantLayer), Arc::new(base::BaseLayer)];
        assert!(LayerBootstrap::new(inverted).is_err());
    }

    #[test]
    fn reachable_kinds_need_a_factory() {
        let err = LayerBootstrap::new(vec![Arc::new(base::BaseLayer), Arc::new(Careless)])
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::IncompleteFactoryChain { ref layer, kind: NodeTag::Boxed } if layer == "careless"
        ));
        assert!(err.is_fatal());

        let complete = LayerBootstrap::new(vec![
            Arc::new(base::BaseLayer),
            Arc::new(boxing::BoxingLayer),
        ]);
        assert!(complete.is_ok());
    }

    #[test]
    fn keywords_are_the_union_of_the_stack() {
        let stacked = LayerBootstrap::new(vec![
            Arc::new(base::BaseLayer),
            Arc::new(Anchored(pipeline::TYPE_CHECK)),
        ])
        .expect("bootstrap");
        let keywords = stacked.keywords();
        assert!(keywords.contains("class"));
        assert!(keywords.contains("unless"));
        assert_eq!(keywords.len(), base::BaseLayer.keywords().len() + 1);
        assert!(stacked.pipeline().contains("lint"));
        assert!(stacked.file_extensions().is_empty());
    }

    #[test]
    fn unknown_anchor_fails_the_bootstrap() {
        let err = LayerBootstrap::new(vec![
            Arc::new(base::BaseLayer),
            Arc::new(Anchored("flatten")),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::MissingAnchor { ref anchor, .. } if anchor == "flatten"));
    }

    #[test]
    fn extensions_are_claimed_once() {
        let mut registry = LayerRegistry::new();
        registry
            .register(LayerBootstrap::new(vec![Arc::new(base::BaseLayer)]).expect("base"))
            .expect("first");
        let err = registry
            .register(LayerBootstrap::new(vec![Arc::new(base::BaseLayer)]).expect("base"))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::DuplicateFileExtension { ref extension, .. } if extension == "lm"
        ));
        assert_eq!(registry.bootstraps().len(), 1);
        assert!(registry.for_path(Path::new("a/b/Main.lm")).is_some());
        assert!(registry.for_path(Path::new("Main")).is_none());
    }
}
