//! Parameterized class types.
//!
//! Classes may declare type parameters and be used with type arguments.
//! Instantiations are invariant in their arguments: `List<B>` is not a
//! `List<A>`. An instantiation is a subtype of its raw generic class and of
//! its generic class's superclass with the arguments substituted in, so
//! `class Sorted<T> extends List<T>` makes `Sorted<A>` a `List<A>`.

use std::sync::Arc;

use crate::bootstrap::Layer;
use crate::types::{Bindings, Next, SubtypeResult, Type, TypeExtension, TypeVariant};

pub const NAME: &str = "param";

#[derive(Debug, Default)]
pub struct ParamTypes;

impl TypeExtension for ParamTypes {
    fn layer(&self) -> &str {
        NAME
    }

    fn instantiate(&self, next: Next<'_>, base: &Type, args: &[Type]) -> Result<Type, String> {
        let Some(class) = base.as_class() else {
            return next.instantiate(base, args);
        };
        if class.params.is_empty() {
            return Err(format!("class `{base}` is not generic"));
        }
        if class.params.len() != args.len() {
            return Err(format!(
                "class `{base}` expects {} type argument(s), found {}",
                class.params.len(),
                args.len()
            ));
        }
        Ok(next.type_system().registry().intern(TypeVariant::Parameterized {
            base: base.clone(),
            args: args.to_vec(),
        }))
    }

    fn subtype(&self, next: Next<'_>, sub: &Type, sup: &Type) -> SubtypeResult {
        match sub.variant() {
            TypeVariant::Parameterized { base, .. } if sub != sup => {
                let ts = next.type_system();
                let raw = sup.as_class().is_some() && ts.is_subtype(base, sup);
                let inherited = ts
                    .superclass(sub)
                    .is_some_and(|parent| ts.is_subtype(&parent, sup));
                if raw || inherited {
                    SubtypeResult::Strict
                } else {
                    SubtypeResult::NotSubtype
                }
            }
            _ => next.subtype(sub, sup),
        }
    }

    fn subst(&self, next: Next<'_>, ty: &Type, bindings: &Bindings) -> Type {
        let TypeVariant::Parameterized { base, args } = ty.variant() else {
            return next.subst(ty, bindings);
        };
        let ts = next.type_system();
        let args = args.iter().map(|arg| ts.subst(arg, bindings)).collect();
        ts.registry().intern(TypeVariant::Parameterized {
            base: base.clone(),
            args,
        })
    }
}

#[derive(Debug, Default)]
pub struct ParamLayer;

impl Layer for ParamLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn requires(&self) -> &[&str] {
        &[super::base::NAME]
    }

    fn file_extensions(&self) -> &[&str] {
        &["lmg"]
    }

    fn type_extension(&self) -> Option<Arc<dyn TypeExtension>> {
        Some(Arc::new(ParamTypes))
    }
}
