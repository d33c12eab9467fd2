//! The language layers shipped with the compiler and the stacks built from
//! them.

use std::sync::Arc;

use crate::bootstrap::{Layer, LayerBootstrap, LayerRegistry};
use crate::error::CoreError;

pub mod array;
pub mod base;
pub mod boxing;
pub mod covariant;
pub mod param;

/// Names of the standard stacks, each named after its outermost layer.
pub const STACKS: &[&str] = &[
    base::NAME,
    array::NAME,
    covariant::NAME,
    boxing::NAME,
    param::NAME,
];

/// The layers of a standard stack, innermost first.
pub fn stack(name: &str) -> Option<Vec<Arc<dyn Layer>>> {
    let base: Arc<dyn Layer> = Arc::new(base::BaseLayer);
    let layers: Vec<Arc<dyn Layer>> = match name {
        base::NAME => vec![base],
        array::NAME => vec![base, Arc::new(array::ArrayLayer)],
        covariant::NAME => vec![base, Arc::new(covariant::CovariantLayer)],
        boxing::NAME => vec![
            base,
            Arc::new(covariant::CovariantLayer),
            Arc::new(boxing::BoxingLayer),
        ],
        param::NAME => vec![base, Arc::new(param::ParamLayer)],
        _ => return None,
    };
    Some(layers)
}

/// Bootstrap the standard stack `name`. An unknown name is an empty stack.
pub fn bootstrap(name: &str) -> Result<LayerBootstrap, CoreError> {
    LayerBootstrap::new(stack(name).unwrap_or_default())
}

/// Every standard stack, registered by file extension.
pub fn standard_registry() -> Result<LayerRegistry, CoreError> {
    let mut registry = LayerRegistry::new();
    for name in STACKS {
        registry.register(bootstrap(name)?)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn every_standard_stack_bootstraps() {
        let registry = standard_registry().expect("registry");
        assert_eq!(registry.bootstraps().len(), STACKS.len());
        for (name, ext) in [
            ("base", "lm"),
            ("array", "lma"),
            ("covariant", "lmc"),
            ("boxing", "lmb"),
            ("param", "lmg"),
        ] {
            let bootstrap = registry.for_extension(ext).expect(ext);
            assert_eq!(bootstrap.name(), name);
        }
        assert!(registry.claims(Path::new("src/Main.lmb")));
        assert!(!registry.claims(Path::new("README.md")));
    }

    #[test]
    fn unknown_stacks_do_not_bootstrap() {
        assert!(stack("nope").is_none());
        assert!(matches!(
            bootstrap("nope").unwrap_err(),
            CoreError::EmptyLayerStack
        ));
    }
}
