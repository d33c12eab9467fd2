//! Covariant return types: an overriding method may narrow its return type.

use std::sync::Arc;

use crate::bootstrap::Layer;
use crate::types::{MethodShape, Next, SubtypeResult, Type, TypeExtension, TypeVariant};

pub const NAME: &str = "covariant";

#[derive(Debug, Default)]
pub struct CovariantTypes;

impl TypeExtension for CovariantTypes {
    fn layer(&self) -> &str {
        NAME
    }

    fn method_instance(&self, next: Next<'_>, shape: MethodShape) -> Type {
        next.type_system()
            .registry()
            .intern(TypeVariant::CovariantMethod(shape))
    }

    fn subtype(&self, next: Next<'_>, sub: &Type, sup: &Type) -> SubtypeResult {
        let (overrider, overridden) = match (sub.variant(), sup.variant()) {
            (
                TypeVariant::CovariantMethod(left),
                TypeVariant::CovariantMethod(right) | TypeVariant::Method(right),
            ) => (left, right),
            _ => return next.subtype(sub, sup),
        };
        if sub == sup {
            return SubtypeResult::Equal;
        }
        if overrider.same_signature(overridden)
            && next
                .type_system()
                .is_subtype(&overrider.ret, &overridden.ret)
        {
            SubtypeResult::Strict
        } else {
            SubtypeResult::NotSubtype
        }
    }
}

#[derive(Debug, Default)]
pub struct CovariantLayer;

impl Layer for CovariantLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn requires(&self) -> &[&str] {
        &[super::base::NAME]
    }

    fn file_extensions(&self) -> &[&str] {
        &["lmc"]
    }

    fn type_extension(&self) -> Option<Arc<dyn TypeExtension>> {
        Some(Arc::new(CovariantTypes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, compile_source};
    use crate::layers;

    const NARROWED: &str = "class A {\n    Object get(int key) {\n        return null;\n    }\n}\n\nclass B extends A {\n    B get(int key) {\n        return null;\n    }\n}\n";

    #[test]
    fn narrowed_return_types_override() {
        let options = CompileOptions::default();
        let base = layers::bootstrap(layers::base::NAME).expect("base");
        let covariant = layers::bootstrap(NAME).expect("covariant");

        let rejected = compile_source(&base, NARROWED, &options).expect("base compile");
        assert!(rejected.failed);
        assert!(
            rejected
                .diagnostics
                .iter()
                .any(|d| d.message.contains("cannot override")),
            "{:?}",
            rejected.diagnostics
        );
        assert!(rejected.output.is_none());

        let accepted = compile_source(&covariant, NARROWED, &options).expect("covariant compile");
        assert!(!accepted.failed, "{:?}", accepted.diagnostics);
    }

    #[test]
    fn widened_return_types_are_still_rejected() {
        let source = "class A {\n    A get() {\n        return null;\n    }\n}\n\nclass B extends A {\n    Object get() {\n        return null;\n    }\n}\n";
        let covariant = layers::bootstrap(NAME).expect("covariant");
        let report = compile_source(&covariant, source, &CompileOptions::default()).expect("compile");
        assert!(report.failed);
    }
}
