use std::collections::HashMap;

use crate::error::CoreError;
use crate::types::{OBJECT, Type, TypeSystem};

/// Class declarations visible inside one compilation unit.
///
/// Class types themselves are canonical and shared through the registry;
/// which names are bound, and which members each class has, is per unit.
#[derive(Debug, Default)]
pub struct ClassTable {
    classes: HashMap<String, Type>,
    members: HashMap<Type, Vec<Type>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, ts: &TypeSystem, name: &str) -> Option<Type> {
        if name == OBJECT {
            return Some(ts.object());
        }
        self.classes.get(name).cloned()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        name == OBJECT || self.classes.contains_key(name)
    }

    /// Bind `name` to its canonical class type.
    pub fn declare(
        &mut self,
        ts: &TypeSystem,
        name: &str,
        superclass: Type,
        params: Vec<String>,
    ) -> Result<Type, String> {
        if self.is_declared(name) {
            return Err(format!("class `{name}` is already declared"));
        }
        let ty = ts.class_type(name, superclass, params);
        self.classes.insert(name.to_string(), ty.clone());
        Ok(ty)
    }

    /// Register `method` on `class`. `Ok(false)` reports that a method with
    /// the same signature is already present.
    pub fn add_method(
        &mut self,
        ts: &TypeSystem,
        class: &Type,
        method: Type,
    ) -> Result<bool, CoreError> {
        ts.registry().check_canonical(class)?;
        ts.registry().check_canonical(&method)?;
        let entry = self.members.entry(class.clone()).or_default();
        let Some(shape) = method.as_method() else {
            return Ok(false);
        };
        if entry
            .iter()
            .filter_map(Type::as_method)
            .any(|existing| existing.same_signature(shape))
        {
            return Ok(false);
        }
        entry.push(method);
        Ok(true)
    }

    pub fn methods(&self, class: &Type) -> &[Type] {
        self.members.get(class).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{MethodShape, Primitive, TypeRegistry};

    fn ts() -> TypeSystem {
        TypeSystem::new(Arc::new(TypeRegistry::new()), Vec::new())
    }

    #[test]
    fn names_are_bound_once() {
        let ts = ts();
        let mut table = ClassTable::new();
        let a = table
            .declare(&ts, "A", ts.object(), Vec::new())
            .expect("declare");
        assert_eq!(table.lookup(&ts, "A"), Some(a));
        assert!(table.declare(&ts, "A", ts.object(), Vec::new()).is_err());
        assert!(table.declare(&ts, OBJECT, ts.object(), Vec::new()).is_err());
    }

    #[test]
    fn signature_clashes_are_reported() {
        let ts = ts();
        let mut table = ClassTable::new();
        let a = table
            .declare(&ts, "A", ts.object(), Vec::new())
            .expect("declare");
        let int = ts.primitive(Primitive::Int);
        let first = ts.method_instance(MethodShape {
            container: a.clone(),
            name: "get".into(),
            formals: vec![int.clone()],
            ret: int.clone(),
        });
        let second = ts.method_instance(MethodShape {
            container: a.clone(),
            name: "get".into(),
            formals: vec![int],
            ret: ts.object(),
        });
        assert!(table.add_method(&ts, &a, first).expect("canonical"));
        assert!(!table.add_method(&ts, &a, second).expect("canonical"));
        assert_eq!(table.methods(&a).len(), 1);
    }

    #[test]
    fn members_from_another_registry_abort() {
        let ts = ts();
        let other = TypeRegistry::new();
        let mut table = ClassTable::new();
        let a = table
            .declare(&ts, "A", ts.object(), Vec::new())
            .expect("declare");
        let foreign = other.intern(crate::types::TypeVariant::Null);
        let err = table.add_method(&ts, &a, foreign).unwrap_err();
        assert!(matches!(err, CoreError::CanonicalizationViolation { .. }));
    }
}
