//! Extensible type lattice.
//!
//! Every [`Type`] is a canonical handle produced by a [`TypeRegistry`]:
//! structurally identical shapes built by the same registry are the same
//! handle, so equality and hashing are by identity. Layers never build types
//! directly; they go through the [`TypeSystem`] chain, which lets an outer
//! layer replace how a shape is constructed or compared.

mod classes;
mod registry;
mod system;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use classes::ClassTable;
pub use registry::TypeRegistry;
pub use system::{Bindings, Next, TypeExtension, TypeSystem};

/// Canonical type handle.
#[derive(Clone)]
pub struct Type(Arc<TypeVariant>);

impl Type {
    pub(crate) fn from_interned(variant: Arc<TypeVariant>) -> Self {
        Type(variant)
    }

    pub fn variant(&self) -> &TypeVariant {
        &self.0
    }

    pub fn is_void(&self) -> bool {
        matches!(*self.0, TypeVariant::Void)
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match *self.0 {
            TypeVariant::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassShape> {
        match &*self.0 {
            TypeVariant::Class(class) => Some(class),
            _ => None,
        }
    }

    /// The signature of a method variant, covariant or not.
    pub fn as_method(&self) -> Option<&MethodShape> {
        match &*self.0 {
            TypeVariant::Method(shape) | TypeVariant::CovariantMethod(shape) => Some(shape),
            _ => None,
        }
    }

    /// Whether values of this type are object references.
    pub fn is_reference(&self) -> bool {
        matches!(
            *self.0,
            TypeVariant::Class(_)
                | TypeVariant::Array(_)
                | TypeVariant::ConstArray(_)
                | TypeVariant::TypeParam { .. }
                | TypeVariant::Parameterized { .. }
        )
    }

    pub fn is_object(&self) -> bool {
        matches!(&*self.0, TypeVariant::Class(c) if c.name == OBJECT && c.superclass.is_none())
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

pub const OBJECT: &str = "Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Boolean,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Boolean => "boolean",
        }
    }

    pub fn from_name(name: &str) -> Option<Primitive> {
        match name {
            "int" => Some(Primitive::Int),
            "boolean" => Some(Primitive::Boolean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassShape {
    pub name: String,
    /// `None` only for the root class.
    pub superclass: Option<Type>,
    /// Declared type parameter names, in order.
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodShape {
    pub container: Type,
    pub name: String,
    pub formals: Vec<Type>,
    pub ret: Type,
}

impl MethodShape {
    /// Same name and formal types, regardless of container or return type.
    pub fn same_signature(&self, other: &MethodShape) -> bool {
        self.name == other.name && self.formals == other.formals
    }

    /// The same signature with every formal and the return type mapped.
    pub fn map_types(&self, mut f: impl FnMut(&Type) -> Type) -> MethodShape {
        MethodShape {
            container: self.container.clone(),
            name: self.name.clone(),
            formals: self.formals.iter().map(&mut f).collect(),
            ret: f(&self.ret),
        }
    }
}

/// The structural shape of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeVariant {
    Null,
    Void,
    Primitive(Primitive),
    Class(ClassShape),
    Array(Type),
    /// Array whose elements cannot be reassigned.
    ConstArray(Type),
    Method(MethodShape),
    /// Method signature whose overriders may narrow the return type.
    CovariantMethod(MethodShape),
    TypeParam { owner: String, name: String },
    Parameterized { base: Type, args: Vec<Type> },
}

/// Result of a subtyping check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtypeResult {
    /// Left is a strict subtype of right.
    Strict,
    /// Left and right are equal types.
    Equal,
    /// Left is not a subtype of right.
    NotSubtype,
}

impl SubtypeResult {
    pub fn holds(self) -> bool {
        self != SubtypeResult::NotSubtype
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant() {
            TypeVariant::Null => f.write_str("null"),
            TypeVariant::Void => f.write_str("void"),
            TypeVariant::Primitive(p) => f.write_str(p.name()),
            TypeVariant::Class(class) => f.write_str(&class.name),
            TypeVariant::Array(element) => write!(f, "{element}[]"),
            TypeVariant::ConstArray(element) => {
                if matches!(element.variant(), TypeVariant::ConstArray(_)) {
                    write!(f, "{element}[]")
                } else {
                    write!(f, "const {element}[]")
                }
            }
            TypeVariant::Method(shape) | TypeVariant::CovariantMethod(shape) => {
                write!(f, "{} {}.{}(", shape.ret, shape.container, shape.name)?;
                for (i, formal) in shape.formals.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{formal}")?;
                }
                f.write_str(")")
            }
            TypeVariant::TypeParam { name, .. } => f.write_str(name),
            TypeVariant::Parameterized { base, args } => {
                write!(f, "{base}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
        }
    }
}
