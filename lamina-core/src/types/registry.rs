use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CoreError;
use crate::types::{ClassShape, OBJECT, Type, TypeVariant};

/// Session-wide canonicalization cache.
///
/// This is the only type-level state shared between units compiled in
/// parallel. Every insertion is an insert-if-absent under the write lock, so
/// two units racing to build the same shape observe the same handle.
#[derive(Debug)]
pub struct TypeRegistry {
    interned: RwLock<HashMap<TypeVariant, Type>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let registry = TypeRegistry {
            interned: RwLock::new(HashMap::new()),
        };
        registry.intern(object_shape());
        registry
    }

    /// Return the canonical handle for `shape`, creating it on first use.
    pub fn intern(&self, shape: TypeVariant) -> Type {
        if let Some(found) = self.interned.read().get(&shape) {
            return found.clone();
        }
        let mut interned = self.interned.write();
        interned
            .entry(shape)
            .or_insert_with_key(|key| Type::from_interned(Arc::new(key.clone())))
            .clone()
    }

    /// Number of distinct shapes built so far.
    pub fn len(&self) -> usize {
        self.interned.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interned.read().is_empty()
    }

    /// The root class.
    pub fn object(&self) -> Type {
        self.intern(object_shape())
    }

    /// Check that `ty` is the handle this registry holds for its shape.
    pub fn check_canonical(&self, ty: &Type) -> Result<(), CoreError> {
        match self.interned.read().get(ty.variant()) {
            Some(found) if found == ty => Ok(()),
            _ => Err(CoreError::CanonicalizationViolation {
                shape: ty.to_string(),
            }),
        }
    }
}

fn object_shape() -> TypeVariant {
    TypeVariant::Class(ClassShape {
        name: OBJECT.to_string(),
        superclass: None,
        params: Vec::new(),
    })
}
