//! Deletes what the mark-unused pass condemned.
//!
//! Unused assignments and declarations vanish, or leave their right-hand
//! side behind as a bare expression statement when it has effects. Unused
//! functions disappear entirely.

use crate::ast::{Decls, Expr, ExprStmt, Program, Stmt};

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);

    let mut ctx = Pass {
        decls: &mut program.decls,
        assigns: &program.assigns,
    };

    for module in &mut modules {
        for stmt in &mut module.stmts {
            ctx.visit_stmt(stmt);
        }
    }

    program.modules = modules;
}

struct Pass<'a> {
    decls: &'a mut Decls,
    assigns: &'a Vec<crate::ast::AssignInfo>,
}

impl Pass<'_> {
    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Null
            | Stmt::Import(_)
            | Stmt::StructDecl(_)
            | Stmt::Input(_)
            | Stmt::Desc(_)
            | Stmt::Modifier(_)
            | Stmt::LoopControl(_)
            | Stmt::Return(_)
            | Stmt::For(_) => {}
            Stmt::Expression(expr_stmt) => {
                if let Some(assign) = expr_stmt.assign {
                    let info = &self.assigns[assign.index()];
                    if info.unused {
                        if info.keep_right {
                            if let Expr::Binary(binary) = expr_stmt.expr.take() {
                                expr_stmt.expr = binary.right;
                                expr_stmt.assign = None;
                            }
                        } else {
                            *stmt = Stmt::Null;
                        }
                    }
                }
            }
            Stmt::VarDecl(id) => {
                let id = *id;
                if self.decls.var(id).unused {
                    if self.decls.var(id).keep_right {
                        let init = self.decls.var_mut(id).init.take();
                        let line = init.line();
                        *stmt = Stmt::Expression(ExprStmt::new(init, line));
                    } else {
                        *stmt = Stmt::Null;
                    }
                }
            }
            Stmt::FuncDecl(id) => {
                let id = *id;
                if self.decls.func(id).unused {
                    *stmt = Stmt::Null;
                    return;
                }
                if let Some(mut block) = self.decls.func_mut(id).block.take() {
                    for inner in &mut block.stmts {
                        self.visit_stmt(inner);
                    }
                    self.decls.func_mut(id).block = Some(block);
                }
            }
            Stmt::Block(block) => {
                for inner in &mut block.stmts {
                    self.visit_stmt(inner);
                }
            }
            Stmt::If(if_stmt) => {
                if let Some(else_block) = &mut if_stmt.else_block {
                    for inner in &mut else_block.stmts {
                        self.visit_stmt(inner);
                    }
                }
                for inner in &mut if_stmt.then_block.stmts {
                    self.visit_stmt(inner);
                }
            }
            Stmt::While(while_stmt) => {
                for inner in &mut while_stmt.body.stmts {
                    self.visit_stmt(inner);
                }
            }
            Stmt::Section(section) => {
                for inner in &mut section.block.stmts {
                    self.visit_stmt(inner);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{make, VarDecl};
    use crate::types::{Primitive, TypeRef};

    #[test]
    fn unused_declaration_disappears() {
        let mut program = Program::default();
        let a = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(a).unused = true;

        let mut stmt = Stmt::VarDecl(a);
        let mut ctx = Pass {
            decls: &mut program.decls,
            assigns: &program.assigns,
        };
        ctx.visit_stmt(&mut stmt);
        assert!(stmt.is_null());
    }

    #[test]
    fn keep_right_leaves_the_initializer_behind() {
        let mut program = Program::default();
        let a = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(a).init = make::int(3, 1);
        program.decls.var_mut(a).unused = true;
        program.decls.var_mut(a).keep_right = true;

        let mut stmt = Stmt::VarDecl(a);
        let mut ctx = Pass {
            decls: &mut program.decls,
            assigns: &program.assigns,
        };
        ctx.visit_stmt(&mut stmt);
        assert!(matches!(&stmt, Stmt::Expression(e) if !e.expr.is_null()));
    }
}
