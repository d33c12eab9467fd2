//! Base-language semantics for each pass.
//!
//! These are the behaviors a node falls back to when no delegate in its
//! chain overrides an operation. Every function receives a node whose
//! children have already been processed by the same pass and returns the
//! node's replacement.

use crate::ast::{Node, NodeKind};
use crate::context::PassContext;
use crate::error::CoreError;
use crate::span::Span;
use crate::types::{MethodShape, Primitive, Type, TypeVariant};

/// Type of an expression node, as far as earlier passes determined it.
pub fn expression_type(node: &Node, cx: &PassContext<'_>) -> Option<Type> {
    let ts = cx.ts();
    match node.kind() {
        NodeKind::IntLit { .. } => Some(ts.primitive(Primitive::Int)),
        NodeKind::BoolLit { .. } => Some(ts.primitive(Primitive::Boolean)),
        NodeKind::NullLit => Some(ts.null()),
        NodeKind::Local { ty, .. } => ty.clone(),
        NodeKind::Boxed { ty, .. } => Some(ty.clone()),
        _ => None,
    }
}

struct PendingClass<'n> {
    index: usize,
    name: &'n str,
    params: &'n [String],
    /// `None` extends `Object`.
    parent: Option<&'n Node>,
    parent_name: &'n str,
    span: Span,
}

pub fn build_types(node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
    match node.kind() {
        NodeKind::SourceFile { classes } => declare_classes(node, classes, cx),
        _ => Ok(node.clone()),
    }
}

/// Declare every class of the unit, parents before children.
fn declare_classes(
    node: &Node,
    classes: &[Node],
    cx: &mut PassContext<'_>,
) -> Result<Node, CoreError> {
    let ts = cx.ts();
    let mut pending = Vec::new();
    for (index, class) in classes.iter().enumerate() {
        let NodeKind::ClassDecl {
            name,
            params,
            superclass,
            ..
        } = class.kind()
        else {
            continue;
        };
        let (parent, parent_name) = match superclass.as_deref() {
            None => (None, crate::types::OBJECT),
            Some(parent) => match parent.kind() {
                NodeKind::AmbTypeNode {
                    name: parent_name, ..
                } => {
                    if Primitive::from_name(parent_name).is_some() || parent_name == "void" {
                        cx.error(
                            format!("class `{name}` cannot extend `{parent_name}`"),
                            parent.span(),
                        );
                        continue;
                    }
                    (Some(parent), parent_name.as_str())
                }
                _ => {
                    cx.error(format!("class `{name}` must extend a class"), parent.span());
                    continue;
                }
            },
        };
        pending.push(PendingClass {
            index,
            name,
            params,
            parent,
            parent_name,
            span: class.span(),
        });
    }

    let mut declared: Vec<Option<Type>> = vec![None; classes.len()];
    loop {
        let mut waiting = Vec::new();
        let mut progressed = false;
        for class in pending {
            let resolved = match class.parent {
                None => Ok(Some(ts.object())),
                Some(parent) => superclass_type(parent, class.name, class.params, cx),
            };
            let parent = match resolved {
                Ok(Some(parent)) => parent,
                Ok(None) => {
                    waiting.push(class);
                    continue;
                }
                Err(message) => {
                    progressed = true;
                    cx.error(message, class.span);
                    continue;
                }
            };
            progressed = true;
            if parent.as_class().is_none()
                && !matches!(parent.variant(), TypeVariant::Parameterized { .. })
            {
                cx.error(
                    format!("class `{}` must extend a class", class.name),
                    class.span,
                );
                continue;
            }
            match cx
                .classes_mut()
                .declare(ts, class.name, parent, class.params.to_vec())
            {
                Ok(ty) => declared[class.index] = Some(ty),
                Err(message) => cx.error(message, class.span),
            }
        }
        pending = waiting;
        if !progressed || pending.is_empty() {
            break;
        }
    }

    for class in &pending {
        let missing = match class.parent {
            Some(parent) => unresolved_name(parent, class.params, cx),
            None => None,
        }
        .unwrap_or(class.parent_name);
        let cyclic = missing == class.name || pending.iter().any(|other| other.name == missing);
        let message = if cyclic {
            format!("cyclic inheritance involving class `{}`", class.name)
        } else if missing == class.parent_name {
            format!("unknown superclass `{missing}` of class `{}`", class.name)
        } else {
            format!(
                "unknown type `{missing}` in the superclass of class `{}`",
                class.name
            )
        };
        cx.error(message, class.span);
    }

    let mut types = declared.into_iter();
    node.map_children(|class| {
        Ok(match types.next().flatten() {
            Some(ty) => class.with_class_type(ty),
            None => class.clone(),
        })
    })
}

/// Type named by a superclass node of class `owner`, which may refer to the
/// owner's own type parameters. `Ok(None)` while a class it names is not
/// declared yet.
fn superclass_type(
    node: &Node,
    owner: &str,
    params: &[String],
    cx: &PassContext<'_>,
) -> Result<Option<Type>, String> {
    let ts = cx.ts();
    match node.kind() {
        NodeKind::AmbTypeNode { name, args } => {
            let plain = if let Some(primitive) = Primitive::from_name(name) {
                Some(ts.primitive(primitive))
            } else if name == "void" {
                Some(ts.void())
            } else if params.iter().any(|param| param == name) {
                Some(ts.type_param(owner, name))
            } else {
                None
            };
            if let Some(ty) = plain {
                if !args.is_empty() {
                    return Err(format!("type `{name}` cannot take type arguments"));
                }
                return Ok(Some(ty));
            }

            let Some(class) = cx.lookup_class(name) else {
                return Ok(None);
            };
            if args.is_empty() {
                return Ok(Some(class));
            }
            let mut resolved = Vec::with_capacity(args.len());
            for arg in args {
                match superclass_type(arg, owner, params, cx)? {
                    Some(ty) if ty.is_reference() => resolved.push(ty),
                    Some(ty) => {
                        return Err(format!(
                            "type argument `{ty}` of `{name}` must be a reference type"
                        ));
                    }
                    None => return Ok(None),
                }
            }
            ts.instantiate(&class, &resolved).map(Some)
        }
        NodeKind::ArrayTypeNode { base } => match superclass_type(base, owner, params, cx)? {
            Some(element) if element.is_void() => {
                Err("array element type cannot be `void`".to_string())
            }
            Some(element) => Ok(Some(ts.array_of(&element))),
            None => Ok(None),
        },
        _ => Err(format!("class `{owner}` must extend a class")),
    }
}

/// First class name in a superclass node that is not declared.
fn unresolved_name<'n>(
    node: &'n Node,
    params: &[String],
    cx: &PassContext<'_>,
) -> Option<&'n str> {
    match node.kind() {
        NodeKind::AmbTypeNode { name, args } => {
            let known = Primitive::from_name(name).is_some()
                || name == "void"
                || params.iter().any(|param| param == name)
                || cx.lookup_class(name).is_some();
            if known {
                args.iter().find_map(|arg| unresolved_name(arg, params, cx))
            } else {
                Some(name.as_str())
            }
        }
        NodeKind::ArrayTypeNode { base } => unresolved_name(base, params, cx),
        _ => None,
    }
}

pub fn disambiguate(node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
    let ts = cx.ts();
    let resolved = match node.kind() {
        NodeKind::AmbTypeNode { name, args } => resolve_named(node, name, args, cx),
        NodeKind::ArrayTypeNode { base } => match base.type_of_type_node() {
            Some(element) if element.is_void() => {
                cx.error("array element type cannot be `void`", node.span());
                None
            }
            Some(element) => Some(ts.array_of(element)),
            None => None,
        },
        _ => None,
    };
    match resolved {
        Some(ty) => cx.nf().canonical_type(node.span(), ty),
        None => Ok(node.clone()),
    }
}

fn resolve_named(node: &Node, name: &str, args: &[Node], cx: &mut PassContext<'_>) -> Option<Type> {
    let ts = cx.ts();
    let plain = if let Some(primitive) = Primitive::from_name(name) {
        Some(ts.primitive(primitive))
    } else if name == "void" {
        Some(ts.void())
    } else {
        cx.type_param(name)
    };
    if let Some(ty) = plain {
        if !args.is_empty() {
            cx.error(format!("type `{name}` cannot take type arguments"), node.span());
            return None;
        }
        return Some(ty);
    }

    let Some(class) = cx.lookup_class(name) else {
        cx.error(format!("unknown type `{name}`"), node.span());
        return None;
    };
    if args.is_empty() {
        return Some(class);
    }
    let mut resolved = Vec::with_capacity(args.len());
    for arg in args {
        match arg.type_of_type_node() {
            Some(ty) if ty.is_reference() => resolved.push(ty.clone()),
            Some(ty) => {
                cx.error(
                    format!("type argument `{ty}` of `{name}` must be a reference type"),
                    arg.span(),
                );
                return None;
            }
            None => return None,
        }
    }
    match ts.instantiate(&class, &resolved) {
        Ok(ty) => Some(ty),
        Err(message) => {
            cx.error(message, node.span());
            None
        }
    }
}

pub fn build_signatures(node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
    let NodeKind::MethodDecl {
        ret, name, formals, ..
    } = node.kind()
    else {
        return Ok(node.clone());
    };
    match method_shape(ret, name, formals, cx) {
        Some(shape) => {
            let ts = cx.ts();
            let container = shape.container.clone();
            let instance = ts.method_instance(shape);
            if !cx
                .classes_mut()
                .add_method(ts, &container, instance.clone())?
            {
                cx.error(
                    format!("duplicate method `{name}` in class `{container}`"),
                    node.span(),
                );
            }
            Ok(node.with_method_instance(instance))
        }
        None => Ok(node.clone()),
    }
}

/// Signature of a method declared in the enclosing class, once all of its
/// types are resolved.
pub fn method_shape(
    ret: &Node,
    name: &str,
    formals: &[Node],
    cx: &PassContext<'_>,
) -> Option<MethodShape> {
    let container = cx.current_class()?.clone();
    let ret = ret.type_of_type_node()?.clone();
    let formals = formals
        .iter()
        .map(|formal| match formal.kind() {
            NodeKind::Formal { ty, .. } => ty.type_of_type_node().cloned(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(MethodShape {
        container,
        name: name.to_string(),
        formals,
        ret,
    })
}

pub fn type_check(node: &Node, cx: &mut PassContext<'_>) -> Result<Node, CoreError> {
    match node.kind() {
        NodeKind::Local { name, .. } => match cx.lookup_local(name).cloned() {
            Some(ty) => return Ok(node.with_local_type(ty)),
            None => cx.error(format!("unknown variable `{name}`"), node.span()),
        },
        NodeKind::Return { expr } => check_return(node, expr.as_deref(), cx),
        NodeKind::FieldDecl { ty, name, init } => {
            if let Some(field) = ty.type_of_type_node() {
                if field.is_void() {
                    cx.error(format!("field `{name}` cannot have type `void`"), node.span());
                } else if let Some(init) = init {
                    check_assignable(init, field, cx);
                }
            }
        }
        NodeKind::Formal { ty, name } => {
            if ty.type_of_type_node().is_some_and(Type::is_void) {
                cx.error(
                    format!("parameter `{name}` cannot have type `void`"),
                    node.span(),
                );
            }
        }
        NodeKind::ClassBody { members } => check_overrides(members, cx),
        NodeKind::Block { stmts } => {
            let after_return = stmts
                .iter()
                .position(|stmt| matches!(stmt.kind(), NodeKind::Return { .. }))
                .and_then(|index| stmts.get(index + 1));
            if let Some(stmt) = after_return {
                cx.warning("unreachable statement", stmt.span());
            }
        }
        _ => {}
    }
    Ok(node.clone())
}

fn check_assignable(expr: &Node, to: &Type, cx: &mut PassContext<'_>) {
    let Some(from) = expression_type(expr, cx) else {
        return;
    };
    if !cx.ts().is_assignable(&from, to) {
        cx.error(
            format!("type `{from}` is not assignable to `{to}`"),
            expr.span(),
        );
    }
}

fn check_return(node: &Node, expr: Option<&Node>, cx: &mut PassContext<'_>) {
    let Some(ret) = cx.return_type().cloned() else {
        if !cx.in_method() {
            cx.error("`return` outside of a method", node.span());
        }
        return;
    };
    match expr {
        None if !ret.is_void() => {
            cx.error(format!("missing return value of type `{ret}`"), node.span());
        }
        Some(_) if ret.is_void() => {
            cx.error("cannot return a value from a `void` method", node.span());
        }
        Some(expr) => check_assignable(expr, &ret, cx),
        None => {}
    }
}

/// Every method must be a subtype of each method it overrides.
fn check_overrides(members: &[Node], cx: &mut PassContext<'_>) {
    let Some(class) = cx.current_class().cloned() else {
        return;
    };
    let ts = cx.ts();
    for member in members {
        let NodeKind::MethodDecl {
            instance: Some(method),
            ..
        } = member.kind()
        else {
            continue;
        };
        let Some(shape) = method.as_method() else {
            continue;
        };
        let mut ancestor = ts.superclass(&class);
        'chain: while let Some(current) = ancestor {
            // members of an instantiation are those of its generic class
            let owner = match current.variant() {
                TypeVariant::Parameterized { base, .. } => base.clone(),
                _ => current.clone(),
            };
            let bindings = ts.bindings(&current);
            let inherited = cx.classes().methods(&owner).to_vec();
            for overridden in &inherited {
                let overridden = ts.subst(overridden, &bindings);
                let Some(other) = overridden.as_method() else {
                    continue;
                };
                if !shape.same_signature(other) {
                    continue;
                }
                if !ts.is_subtype(method, &overridden) {
                    let message = format!(
                        "`{}` in `{class}` cannot override `{}` in `{current}`: return type `{}` is not compatible with `{}`",
                        shape.name, other.name, shape.ret, other.ret
                    );
                    cx.error(message, member.span());
                }
                break 'chain;
            }
            ancestor = ts.superclass(&current);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::{CompileOptions, UnitReport, compile_source};
    use crate::diagnostic::Severity;
    use crate::layers;

    fn check(source: &str) -> UnitReport {
        let base = layers::bootstrap(layers::base::NAME).expect("base");
        compile_source(&base, source, &CompileOptions::default()).expect("compile")
    }

    fn assert_error(source: &str, needle: &str) {
        let report = check(source);
        assert!(report.failed, "expected failure for {source:?}");
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.is_error() && d.message.contains(needle)),
            "no `{needle}` in {:?}",
            report.diagnostics
        );
    }

    #[test]
    fn classes_may_be_declared_in_any_order() {
        let report = check("class C extends B {\n}\n\nclass B extends A {\n}\n\nclass A {\n}\n");
        assert!(!report.failed, "{:?}", report.diagnostics);
    }

    #[test]
    fn hierarchy_errors() {
        assert_error("class A extends Missing {\n}\n", "unknown superclass `Missing`");
        assert_error(
            "class A extends B {\n}\n\nclass B extends A {\n}\n",
            "cyclic inheritance",
        );
        assert_error("class A {\n}\n\nclass A {\n}\n", "already declared");
        assert_error("class A extends int {\n}\n", "cannot extend `int`");
    }

    #[test]
    fn member_errors() {
        assert_error(
            "class A {\n    int f() {\n        return 1;\n    }\n    int f() {\n        return 2;\n    }\n}\n",
            "duplicate method `f`",
        );
        assert_error("class A {\n    void v;\n}\n", "cannot have type `void`");
        assert_error("class A {\n    Nope n;\n}\n", "unknown type `Nope`");
        assert_error("class A {\n    void[] vs;\n}\n", "cannot be `void`");
    }

    #[test]
    fn statement_errors() {
        assert_error(
            "class A {\n    int f() {\n        return y;\n    }\n}\n",
            "unknown variable `y`",
        );
        assert_error(
            "class A {\n    void f() {\n        return 1;\n    }\n}\n",
            "cannot return a value",
        );
        assert_error(
            "class A {\n    int f() {\n        return;\n    }\n}\n",
            "missing return value",
        );
        assert_error(
            "class A {\n    boolean b = 1;\n}\n",
            "not assignable to `boolean`",
        );
    }

    #[test]
    fn null_is_assignable_to_references_only() {
        assert!(!check("class A {\n    A a = null;\n}\n").failed);
        assert_error("class A {\n    int i = null;\n}\n", "not assignable");
    }

    #[test]
    fn unreachable_statements_only_warn() {
        let report =
            check("class A {\n    int f(int x) {\n        return x;\n        return x;\n    }\n}\n");
        assert!(!report.failed, "{:?}", report.diagnostics);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
        assert!(report.output.is_some());
    }
}
