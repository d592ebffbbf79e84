//! Indented tree dump of a loaded program, behind the CLI's `--dump-ast`.

use std::fmt::Write as _;

use crate::ast::{Decls, Expr, LiteralKind, Program, Resolved, Stmt};

pub fn print_program(program: &Program) -> String {
    let mut printer = Printer {
        decls: &program.decls,
        out: String::new(),
        depth: 0,
    };

    for module in &program.modules {
        printer.line(&format!("Module {} ({})", module.name, module.path));
        printer.depth += 1;
        for stmt in &module.stmts {
            printer.print_stmt(stmt);
        }
        printer.depth -= 1;
    }

    printer.out
}

struct Printer<'a> {
    decls: &'a Decls,
    out: String,
    depth: usize,
}

impl Printer<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, header: &str, body: impl FnOnce(&mut Self)) {
        self.line(header);
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Null => {}
            Stmt::Expression(expr_stmt) => {
                let expr = expr_stmt.expr.clone();
                self.nested("ExpressionStatement", |p| p.print_expr(&expr));
            }
            Stmt::VarDecl(id) => {
                let decl = self.decls.var(*id);
                let name = decl.name.clone();
                let init = decl.init.clone();
                self.nested(&format!("VariableDeclaration {name}"), |p| {
                    if !init.is_null() {
                        p.print_expr(&init);
                    }
                });
            }
            Stmt::FuncDecl(id) => {
                let decl = self.decls.func(*id);
                let mut header = format!("FunctionDeclaration {}", decl.name);
                let _ = write!(header, " ({} parameter(s))", decl.params.len());
                if decl.variadic {
                    header.push_str(" variadic");
                }
                let block = decl.block.clone();
                self.nested(&header, |p| {
                    if let Some(block) = &block {
                        for inner in &block.stmts {
                            p.print_stmt(inner);
                        }
                    }
                });
            }
            Stmt::StructDecl(id) => {
                let decl = self.decls.strct(*id);
                let names: Vec<String> = decl
                    .members
                    .iter()
                    .map(|&member| self.decls.var(member).name.clone())
                    .collect();
                self.line(&format!("StructDeclaration {} {{ {} }}", decl.name, names.join(", ")));
            }
            Stmt::Input(id) => {
                self.line(&format!("InputStatement {}", self.decls.input(*id).name));
            }
            Stmt::Desc(_) => self.line("DescStatement"),
            Stmt::Import(import) => self.line(&format!("Import \"{}\"", import.path)),
            Stmt::Modifier(_) => self.line("ModifierStatement"),
            Stmt::Section(section) => {
                let header = format!("Section @{}", section.kind);
                self.nested(&header, |p| {
                    for inner in &section.block.stmts {
                        p.print_stmt(inner);
                    }
                });
            }
            Stmt::Block(block) => {
                self.nested("Block", |p| {
                    for inner in &block.stmts {
                        p.print_stmt(inner);
                    }
                });
            }
            Stmt::If(if_stmt) => {
                self.nested("If", |p| {
                    p.print_expr(&if_stmt.cond);
                    for inner in &if_stmt.then_block.stmts {
                        p.print_stmt(inner);
                    }
                    if let Some(else_block) = &if_stmt.else_block {
                        p.nested("Else", |p| {
                            for inner in &else_block.stmts {
                                p.print_stmt(inner);
                            }
                        });
                    }
                });
            }
            Stmt::While(while_stmt) => {
                self.nested("While", |p| {
                    p.print_expr(&while_stmt.cond);
                    for inner in &while_stmt.body.stmts {
                        p.print_stmt(inner);
                    }
                });
            }
            Stmt::For(for_stmt) => {
                self.nested("For", |p| {
                    p.print_stmt(&for_stmt.init);
                    p.print_expr(&for_stmt.cond);
                    p.print_expr(&for_stmt.incr);
                    for inner in &for_stmt.body.stmts {
                        p.print_stmt(inner);
                    }
                });
            }
            Stmt::LoopControl(loop_control) => {
                self.line(match loop_control.kind {
                    crate::ast::LoopControlKind::Break => "Break",
                    crate::ast::LoopControlKind::Continue => "Continue",
                });
            }
            Stmt::Return(ret) => {
                let expr = ret.expr.clone();
                self.nested("Return", |p| {
                    if !expr.is_null() {
                        p.print_expr(&expr);
                    }
                });
            }
        }
    }

    fn print_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Null => {}
            Expr::Literal(literal) => match &literal.kind {
                LiteralKind::Number(text) => self.line(&format!("Number {text}")),
                LiteralKind::Str(text) => self.line(&format!("String \"{text}\"")),
                LiteralKind::Bool(value) => self.line(&format!("Boolean {value}")),
                LiteralKind::Primitive(primitive) => self.line(&format!("PrimitiveType {primitive}")),
            },
            Expr::Member(member) => {
                let mut header = String::from("MemberAccess");
                if !member.idents.is_empty() {
                    let _ = write!(header, " {}", member.idents.join("."));
                }
                if let Resolved::Var(var) = member.resolved {
                    let _ = write!(header, " -> {}", self.decls.var(var).name);
                }
                let base = member.base.clone();
                self.nested(&header, |p| p.print_expr(&base));
            }
            Expr::Binary(binary) => {
                let header = format!("Binary {}", binary.op);
                let (left, right) = (binary.left.clone(), binary.right.clone());
                self.nested(&header, |p| {
                    p.print_expr(&left);
                    p.print_expr(&right);
                });
            }
            Expr::Unary(unary) => {
                let header = format!("Unary {}{}", unary.op, if unary.postfix { " postfix" } else { "" });
                let inner = unary.expr.clone();
                self.nested(&header, |p| p.print_expr(&inner));
            }
            Expr::Subscript(subscript) => {
                let (base, index) = (subscript.base.clone(), subscript.index.clone());
                self.nested("Subscript", |p| {
                    p.print_expr(&base);
                    p.print_expr(&index);
                });
            }
            Expr::Call(call) => {
                let (base, args) = (call.base.clone(), call.args.clone());
                self.nested("FunctionCall", |p| {
                    p.print_expr(&base);
                    for arg in &args {
                        p.print_expr(arg);
                    }
                });
            }
            Expr::Block(block) => {
                let stmts = block.block.stmts.clone();
                self.nested("BlockExpression", |p| {
                    for inner in &stmts {
                        p.print_stmt(inner);
                    }
                });
            }
            Expr::SizeOf(sizeof) => {
                let inner = sizeof.expr.clone();
                self.nested("SizeOf", |p| p.print_expr(&inner));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{MapReader, load_program};

    #[test]
    fn dumps_the_parsed_tree() {
        let files = [("main.cres", "int a = 5;\n@init { a = a + 1; }")];
        let program = load_program("main.cres", &MapReader { files: &files }).unwrap();
        let dump = print_program(&program);

        assert!(dump.contains("Module main"));
        assert!(dump.contains("VariableDeclaration a"));
        assert!(dump.contains("Section @init"));
        assert!(dump.contains("Binary +"));
    }
}
