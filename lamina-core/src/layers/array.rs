//! Immutable arrays.
//!
//! Every array type written in this dialect is a const array: its elements
//! cannot be reassigned, so const arrays are covariant in their element type
//! and a mutable array may be used where a const array of the same element is
//! expected.

use std::sync::Arc;

use crate::bootstrap::Layer;
use crate::error::CoreError;
use crate::types::{Next, SubtypeResult, Type, TypeExtension, TypeSystem, TypeVariant};

pub const NAME: &str = "array";

/// The const array of `element`.
pub fn const_array_of(ts: &TypeSystem, element: &Type) -> Type {
    ts.registry()
        .intern(TypeVariant::ConstArray(element.clone()))
}

/// `depth` nested const arrays of `element`.
pub fn const_array_of_depth(
    ts: &TypeSystem,
    element: &Type,
    depth: i32,
) -> Result<Type, CoreError> {
    if depth <= 0 {
        return Err(CoreError::InvalidArrayDepth(depth));
    }
    let mut ty = element.clone();
    for _ in 0..depth {
        ty = const_array_of(ts, &ty);
    }
    Ok(ty)
}

#[derive(Debug, Default)]
pub struct ArrayTypes;

impl TypeExtension for ArrayTypes {
    fn layer(&self) -> &str {
        NAME
    }

    fn array_of(&self, next: Next<'_>, element: &Type) -> Type {
        const_array_of(next.type_system(), element)
    }

    fn subtype(&self, next: Next<'_>, sub: &Type, sup: &Type) -> SubtypeResult {
        match (sub.variant(), sup.variant()) {
            (
                TypeVariant::ConstArray(left) | TypeVariant::Array(left),
                TypeVariant::ConstArray(right),
            ) if sub != sup => {
                if next.type_system().is_subtype(left, right) {
                    SubtypeResult::Strict
                } else {
                    SubtypeResult::NotSubtype
                }
            }
            _ => next.subtype(sub, sup),
        }
    }
}

#[derive(Debug, Default)]
pub struct ArrayLayer;

impl Layer for ArrayLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn requires(&self) -> &[&str] {
        &[super::base::NAME]
    }

    fn file_extensions(&self) -> &[&str] {
        &["lma"]
    }

    fn type_extension(&self) -> Option<Arc<dyn TypeExtension>> {
        Some(Arc::new(ArrayTypes))
    }
}
