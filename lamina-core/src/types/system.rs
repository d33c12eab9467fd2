use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{
    ClassShape, MethodShape, Primitive, SubtypeResult, Type, TypeRegistry, TypeVariant,
};

/// One layer's contribution to the type system.
///
/// Every method receives a [`Next`] handle for the layers below. A layer can
/// forward untouched (the default), call `next` and transform the result, or
/// ignore `next` entirely. `next.type_system()` is the whole stack, which is
/// what recursive checks must go through so outer rules stay in effect.
pub trait TypeExtension: fmt::Debug + Send + Sync {
    fn layer(&self) -> &str;

    fn array_of(&self, next: Next<'_>, element: &Type) -> Type {
        next.array_of(element)
    }

    fn method_instance(&self, next: Next<'_>, shape: MethodShape) -> Type {
        next.method_instance(shape)
    }

    fn subtype(&self, next: Next<'_>, sub: &Type, sup: &Type) -> SubtypeResult {
        next.subtype(sub, sup)
    }

    fn is_assignable(&self, next: Next<'_>, from: &Type, to: &Type) -> bool {
        next.is_assignable(from, to)
    }

    fn instantiate(&self, next: Next<'_>, base: &Type, args: &[Type]) -> Result<Type, String> {
        next.instantiate(base, args)
    }

    /// Replace the type parameters in `bindings` throughout `ty`.
    fn subst(&self, next: Next<'_>, ty: &Type, bindings: &Bindings) -> Type {
        next.subst(ty, bindings)
    }
}

/// Type parameters mapped to the types that replace them.
pub type Bindings = HashMap<Type, Type>;

/// The remainder of the extension chain below the current layer.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    ts: &'a TypeSystem,
    depth: usize,
}

impl<'a> Next<'a> {
    pub fn type_system(self) -> &'a TypeSystem {
        self.ts
    }

    fn step(self) -> Option<(&'a dyn TypeExtension, Next<'a>)> {
        self.ts.extensions.get(self.depth).map(|ext| {
            (
                ext.as_ref(),
                Next {
                    ts: self.ts,
                    depth: self.depth + 1,
                },
            )
        })
    }

    pub fn array_of(self, element: &Type) -> Type {
        match self.step() {
            Some((ext, next)) => ext.array_of(next, element),
            None => self
                .ts
                .registry
                .intern(TypeVariant::Array(element.clone())),
        }
    }

    pub fn method_instance(self, shape: MethodShape) -> Type {
        match self.step() {
            Some((ext, next)) => ext.method_instance(next, shape),
            None => self.ts.registry.intern(TypeVariant::Method(shape)),
        }
    }

    pub fn subtype(self, sub: &Type, sup: &Type) -> SubtypeResult {
        match self.step() {
            Some((ext, next)) => ext.subtype(next, sub, sup),
            None => base_subtype(self.ts, sub, sup),
        }
    }

    pub fn is_assignable(self, from: &Type, to: &Type) -> bool {
        match self.step() {
            Some((ext, next)) => ext.is_assignable(next, from, to),
            None => self.ts.is_subtype(from, to),
        }
    }

    pub fn instantiate(self, base: &Type, args: &[Type]) -> Result<Type, String> {
        match self.step() {
            Some((ext, next)) => ext.instantiate(next, base, args),
            None => Err(format!(
                "type `{base}` cannot take type arguments: parameterized types are not enabled"
            )),
        }
    }

    pub fn subst(self, ty: &Type, bindings: &Bindings) -> Type {
        match self.step() {
            Some((ext, next)) => ext.subst(next, ty, bindings),
            None => base_subst(self.ts, ty, bindings),
        }
    }
}

/// The composed type system of one layer stack.
///
/// Built once per bootstrap; afterwards it is only consulted, and the only
/// state it mutates is the registry's canonicalization cache.
pub struct TypeSystem {
    registry: Arc<TypeRegistry>,
    /// Outermost first.
    extensions: Vec<Arc<dyn TypeExtension>>,
}

impl fmt::Debug for TypeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSystem")
            .field("layers", &self.layers())
            .finish()
    }
}

impl TypeSystem {
    /// `extensions` are ordered outermost first.
    pub fn new(registry: Arc<TypeRegistry>, extensions: Vec<Arc<dyn TypeExtension>>) -> Self {
        TypeSystem {
            registry,
            extensions,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn layers(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.layer()).collect()
    }

    fn chain(&self) -> Next<'_> {
        Next { ts: self, depth: 0 }
    }

    pub fn primitive(&self, primitive: Primitive) -> Type {
        self.registry.intern(TypeVariant::Primitive(primitive))
    }

    pub fn void(&self) -> Type {
        self.registry.intern(TypeVariant::Void)
    }

    pub fn null(&self) -> Type {
        self.registry.intern(TypeVariant::Null)
    }

    pub fn object(&self) -> Type {
        self.registry.object()
    }

    pub fn type_param(&self, owner: &str, name: &str) -> Type {
        self.registry.intern(TypeVariant::TypeParam {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn array_of(&self, element: &Type) -> Type {
        self.chain().array_of(element)
    }

    pub fn method_instance(&self, shape: MethodShape) -> Type {
        self.chain().method_instance(shape)
    }

    pub fn subtype(&self, sub: &Type, sup: &Type) -> SubtypeResult {
        self.chain().subtype(sub, sup)
    }

    pub fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        self.subtype(sub, sup).holds()
    }

    pub fn is_assignable(&self, from: &Type, to: &Type) -> bool {
        self.chain().is_assignable(from, to)
    }

    pub fn instantiate(&self, base: &Type, args: &[Type]) -> Result<Type, String> {
        self.chain().instantiate(base, args)
    }

    pub fn subst(&self, ty: &Type, bindings: &Bindings) -> Type {
        if bindings.is_empty() {
            return ty.clone();
        }
        self.chain().subst(ty, bindings)
    }

    /// The arguments of an instantiation keyed by the parameters of its
    /// generic class. Empty for any other type.
    pub fn bindings(&self, ty: &Type) -> Bindings {
        let TypeVariant::Parameterized { base, args } = ty.variant() else {
            return Bindings::new();
        };
        let Some(class) = base.as_class() else {
            return Bindings::new();
        };
        class
            .params
            .iter()
            .map(|param| self.type_param(&class.name, param))
            .zip(args.iter().cloned())
            .collect()
    }

    /// Canonical class type for a declaration. Binding the name is the job
    /// of the unit's [`ClassTable`](crate::types::ClassTable).
    pub fn class_type(&self, name: &str, superclass: Type, params: Vec<String>) -> Type {
        self.registry.intern(TypeVariant::Class(ClassShape {
            name: name.to_string(),
            superclass: Some(superclass),
            params,
        }))
    }

    /// Direct superclass of a class-like type. For an instantiation this is
    /// the generic class's superclass with the arguments substituted in.
    pub fn superclass(&self, ty: &Type) -> Option<Type> {
        match ty.variant() {
            TypeVariant::Class(class) => class.superclass.clone(),
            TypeVariant::Parameterized { base, .. } => {
                let parent = base.as_class()?.superclass.as_ref()?;
                Some(self.subst(parent, &self.bindings(ty)))
            }
            _ => None,
        }
    }
}

/// Subtyping over the variants the base language knows.
///
/// Any other variant follows the default policy: it relates only to itself
/// and, when it denotes a reference, to `Object`.
fn base_subtype(ts: &TypeSystem, sub: &Type, sup: &Type) -> SubtypeResult {
    use SubtypeResult::*;

    if sub == sup {
        return Equal;
    }

    match (sub.variant(), sup.variant()) {
        (TypeVariant::Null, _) if sup.is_reference() => Strict,
        (TypeVariant::Class(class), TypeVariant::Class(_) | TypeVariant::Parameterized { .. }) => {
            let mut current = class.superclass.clone();
            while let Some(parent) = current {
                if parent == *sup {
                    return Strict;
                }
                // a parent from an outer layer is compared by the whole stack
                if parent.as_class().is_none() {
                    return if ts.is_subtype(&parent, sup) {
                        Strict
                    } else {
                        NotSubtype
                    };
                }
                current = ts.superclass(&parent);
            }
            NotSubtype
        }
        (TypeVariant::Array(left), TypeVariant::Array(right)) => {
            if left.is_reference() && right.is_reference() && ts.is_subtype(left, right) {
                Strict
            } else {
                NotSubtype
            }
        }
        (TypeVariant::Method(left), TypeVariant::Method(right)) => {
            if left.same_signature(right) && left.ret == right.ret {
                Strict
            } else {
                NotSubtype
            }
        }
        _ if sub.is_reference() && sup.is_object() => Strict,
        _ => NotSubtype,
    }
}

/// Substitution over the variants the base language knows. Any other
/// variant is returned unchanged.
fn base_subst(ts: &TypeSystem, ty: &Type, bindings: &Bindings) -> Type {
    if let Some(bound) = bindings.get(ty) {
        return bound.clone();
    }
    let variant = match ty.variant() {
        TypeVariant::Array(element) => TypeVariant::Array(ts.subst(element, bindings)),
        TypeVariant::Method(shape) => {
            TypeVariant::Method(shape.map_types(|t| ts.subst(t, bindings)))
        }
        TypeVariant::CovariantMethod(shape) => {
            TypeVariant::CovariantMethod(shape.map_types(|t| ts.subst(t, bindings)))
        }
        _ => return ty.clone(),
    };
    ts.registry.intern(variant)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_ts() -> TypeSystem {
        TypeSystem::new(Arc::new(TypeRegistry::new()), Vec::new())
    }

    #[test]
    fn class_chain_is_walked_to_object() {
        let ts = base_ts();
        let a = ts.class_type("A", ts.object(), Vec::new());
        let b = ts.class_type("B", a.clone(), Vec::new());
        assert_eq!(ts.subtype(&b, &a), SubtypeResult::Strict);
        assert!(ts.is_subtype(&b, &ts.object()));
        assert!(!ts.is_subtype(&a, &b));
    }

    #[test]
    fn primitives_only_relate_to_themselves() {
        let ts = base_ts();
        let int = ts.primitive(Primitive::Int);
        let boolean = ts.primitive(Primitive::Boolean);
        assert_eq!(ts.subtype(&int, &int), SubtypeResult::Equal);
        assert!(!ts.is_subtype(&int, &boolean));
        assert!(!ts.is_subtype(&int, &ts.object()));
        assert!(!ts.is_assignable(&ts.null(), &int));
    }

    #[test]
    fn reference_arrays_are_covariant() {
        let ts = base_ts();
        let a = ts.class_type("A", ts.object(), Vec::new());
        let b = ts.class_type("B", a.clone(), Vec::new());
        assert!(ts.is_subtype(&ts.array_of(&b), &ts.array_of(&a)));
        let int = ts.primitive(Primitive::Int);
        let ints = ts.array_of(&int);
        assert!(!ts.is_subtype(&ints, &ts.array_of(&ts.primitive(Primitive::Boolean))));
        assert!(ts.is_subtype(&ints, &ts.object()));
    }

    #[test]
    fn unknown_variants_relate_only_to_themselves_and_object() {
        let ts = base_ts();
        let int = ts.primitive(Primitive::Int);
        let frozen = ts.registry().intern(TypeVariant::ConstArray(int.clone()));
        let plain = ts.array_of(&int);
        assert_eq!(ts.subtype(&frozen, &frozen), SubtypeResult::Equal);
        assert!(ts.is_subtype(&frozen, &ts.object()));
        assert!(!ts.is_subtype(&frozen, &plain));
        assert!(!ts.is_subtype(&plain, &frozen));
    }

    #[test]
    fn base_overriding_requires_identical_return_types() {
        let ts = base_ts();
        let a = ts.class_type("A", ts.object(), Vec::new());
        let b = ts.class_type("B", a.clone(), Vec::new());
        let int = ts.primitive(Primitive::Int);
        let parent = ts.method_instance(MethodShape {
            container: a.clone(),
            name: "get".into(),
            formals: vec![int.clone()],
            ret: ts.object(),
        });
        let same = ts.method_instance(MethodShape {
            container: b.clone(),
            name: "get".into(),
            formals: vec![int.clone()],
            ret: ts.object(),
        });
        let narrowed = ts.method_instance(MethodShape {
            container: b.clone(),
            name: "get".into(),
            formals: vec![int],
            ret: b,
        });
        assert!(ts.is_subtype(&same, &parent));
        assert!(!ts.is_subtype(&narrowed, &parent));
    }

    #[test]
    fn instantiation_is_rejected_without_an_extension() {
        let ts = base_ts();
        let list = ts.class_type("List", ts.object(), vec!["T".into()]);
        let err = ts.instantiate(&list, &[ts.object()]).unwrap_err();
        assert!(err.contains("not enabled"));
    }

    #[test]
    fn substitution_reaches_into_arrays_and_signatures() {
        let ts = base_ts();
        let owner = ts.class_type("Box", ts.object(), vec!["T".into()]);
        let param = ts.type_param("Box", "T");
        let a = ts.class_type("A", ts.object(), Vec::new());
        let bindings = Bindings::from([(param.clone(), a.clone())]);

        assert_eq!(ts.subst(&ts.array_of(&param), &bindings), ts.array_of(&a));
        let get = ts.method_instance(MethodShape {
            container: owner.clone(),
            name: "get".into(),
            formals: vec![param.clone()],
            ret: param.clone(),
        });
        let expected = ts.method_instance(MethodShape {
            container: owner,
            name: "get".into(),
            formals: vec![a.clone()],
            ret: a.clone(),
        });
        assert_eq!(ts.subst(&get, &bindings), expected);
        assert_eq!(ts.subst(&a, &bindings), a);
        assert_eq!(ts.subst(&param, &Bindings::new()), param);
    }

    #[derive(Debug)]
    struct Tagging;

    impl TypeExtension for Tagging {
        fn layer(&self) -> &str {
            "tagging"
        }

        fn array_of(&self, next: Next<'_>, element: &Type) -> Type {
            let ts = next.type_system();
            ts.registry().intern(TypeVariant::ConstArray(element.clone()))
        }
    }

    #[test]
    fn outer_extension_replaces_base_construction() {
        let ts = TypeSystem::new(Arc::new(TypeRegistry::new()), vec![Arc::new(Tagging)]);
        let int = ts.primitive(Primitive::Int);
        let array = ts.array_of(&int);
        assert!(matches!(array.variant(), TypeVariant::ConstArray(_)));
        assert_eq!(ts.layers(), vec!["tagging"]);
    }
}
