//! Renders a tree back to source text.

use crate::ast::{Node, NodeKind};

/// Indenting text sink. Nodes print through their delegate chain, so a layer
/// can change how its nodes are rendered.
#[derive(Debug)]
pub struct Printer {
    out: String,
    indent: usize,
    at_line_start: bool,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Printer {
            out: String::new(),
            indent: 0,
            at_line_start: true,
        }
    }

    pub fn print(&mut self, node: &Node) {
        match node.delegate() {
            Some(del) => del.print(node, self),
            None => print_base(node, self),
        }
    }

    pub fn write(&mut self, text: &str) {
        if self.at_line_start && !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    pub fn newline(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn list(&mut self, nodes: &[Node]) {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.print(node);
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Render a whole tree.
pub fn render(node: &Node) -> String {
    let mut printer = Printer::new();
    printer.print(node);
    printer.finish()
}

/// How the base language prints each kind.
pub fn print_base(node: &Node, out: &mut Printer) {
    match node.kind() {
        NodeKind::SourceFile { classes } => {
            for (i, class) in classes.iter().enumerate() {
                if i > 0 {
                    out.newline();
                }
                out.print(class);
            }
        }
        NodeKind::ClassDecl {
            name,
            params,
            superclass,
            body,
            ..
        } => {
            out.write("class ");
            out.write(name);
            if !params.is_empty() {
                out.write("<");
                out.write(&params.join(", "));
                out.write(">");
            }
            if let Some(superclass) = superclass {
                out.write(" extends ");
                out.print(superclass);
            }
            out.write(" ");
            out.print(body);
            out.newline();
        }
        NodeKind::ClassBody { members } => {
            out.write("{");
            out.newline();
            out.indent();
            for member in members {
                out.print(member);
                out.newline();
            }
            out.dedent();
            out.write("}");
        }
        NodeKind::FieldDecl { ty, name, init } => {
            out.print(ty);
            out.write(" ");
            out.write(name);
            if let Some(init) = init {
                out.write(" = ");
                out.print(init);
            }
            out.write(";");
        }
        NodeKind::MethodDecl {
            ret,
            name,
            formals,
            body,
            ..
        } => {
            out.print(ret);
            out.write(" ");
            out.write(name);
            out.write("(");
            out.list(formals);
            out.write(")");
            match body {
                Some(body) => {
                    out.write(" ");
                    out.print(body);
                }
                None => out.write(";"),
            }
        }
        NodeKind::Formal { ty, name } => {
            out.print(ty);
            out.write(" ");
            out.write(name);
        }
        NodeKind::AmbTypeNode { name, args } => {
            out.write(name);
            if !args.is_empty() {
                out.write("<");
                out.list(args);
                out.write(">");
            }
        }
        NodeKind::ArrayTypeNode { base } => {
            out.print(base);
            out.write("[]");
        }
        NodeKind::CanonicalTypeNode { ty } => out.write(&ty.to_string()),
        NodeKind::Block { stmts } => {
            out.write("{");
            out.newline();
            out.indent();
            for stmt in stmts {
                out.print(stmt);
                out.newline();
            }
            out.dedent();
            out.write("}");
        }
        NodeKind::Return { expr } => {
            out.write("return");
            if let Some(expr) = expr {
                out.write(" ");
                out.print(expr);
            }
            out.write(";");
        }
        NodeKind::Local { name, .. } => out.write(name),
        NodeKind::IntLit { value } => out.write(&value.to_string()),
        NodeKind::BoolLit { value } => out.write(if *value { "true" } else { "false" }),
        NodeKind::NullLit => out.write("null"),
        NodeKind::Boxed { expr, ty } => {
            out.write("new ");
            out.write(&ty.to_string());
            out.write("(");
            out.print(expr);
            out.write(")");
        }
    }
}
