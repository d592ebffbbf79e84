//! Assigns every variable and function its unique integer suffix.
//!
//! A single monotonic counter, starting at 1, walked in source order. The
//! writer composes emitted names as `{name}_{unique}`, which keeps the flat
//! single-namespace output collision-free.

use crate::ast::{Decls, Expr, Program, Stmt};

pub fn run(program: &mut Program) {
    let mut counter = 0u32;

    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, &mut program.decls, &mut counter);
        }
    }
    program.modules = modules;

    // assignments can outlive their eliminated declaration; every variable
    // still needs a collision-free emitted name
    for var in &mut program.decls.vars {
        if var.unique == 0 && !var.modifiers.is_external() && var.input.is_none() {
            var.unique = next(&mut counter);
        }
    }
}

fn next(counter: &mut u32) -> u32 {
    *counter += 1;
    *counter
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut Decls, counter: &mut u32) {
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
        Stmt::Expression(expr_stmt) => visit_expr(&mut expr_stmt.expr, decls, counter),
        Stmt::VarDecl(id) => {
            decls.var_mut(*id).unique = next(counter);
        }
        Stmt::FuncDecl(id) => {
            let id = *id;
            decls.func_mut(id).unique = next(counter);

            let params = decls.func(id).params.clone();
            for param in params {
                decls.var_mut(param).unique = next(counter);
            }

            if let Some(mut block) = decls.func_mut(id).block.take() {
                for inner in &mut block.stmts {
                    visit_stmt(inner, decls, counter);
                }
                decls.func_mut(id).block = Some(block);
            }
        }
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, decls, counter);
            }
        }
        Stmt::If(if_stmt) => {
            if let Some(else_block) = &mut if_stmt.else_block {
                for inner in &mut else_block.stmts {
                    visit_stmt(inner, decls, counter);
                }
            }
            for inner in &mut if_stmt.then_block.stmts {
                visit_stmt(inner, decls, counter);
            }
        }
        Stmt::While(while_stmt) => {
            for inner in &mut while_stmt.body.stmts {
                visit_stmt(inner, decls, counter);
            }
        }
        Stmt::Section(section) => {
            for inner in &mut section.block.stmts {
                visit_stmt(inner, decls, counter);
            }
        }
    }
}

// inlined block expressions still hold declarations in expression position
fn visit_expr(expr: &mut Expr, decls: &mut Decls, counter: &mut u32) {
    match expr {
        Expr::Null | Expr::Literal(_) | Expr::SizeOf(_) => {}
        Expr::Member(member) => visit_expr(&mut member.base, decls, counter),
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left, decls, counter);
            visit_expr(&mut binary.right, decls, counter);
        }
        Expr::Unary(unary) => visit_expr(&mut unary.expr, decls, counter),
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base, decls, counter);
            visit_expr(&mut subscript.index, decls, counter);
        }
        Expr::Call(call) => {
            for arg in &mut call.args {
                visit_expr(arg, decls, counter);
            }
        }
        Expr::Block(block) => {
            for inner in &mut block.block.stmts {
                visit_stmt(inner, decls, counter);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, Module, SectionKind, SectionStmt, VarDecl};
    use crate::types::{Primitive, TypeRef};

    #[test]
    fn uniques_are_monotonic_and_injective() {
        let mut program = Program::default();
        let a = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        let b = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 2), 2));

        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![Stmt::Section(Box::new(SectionStmt {
                line: 1,
                kind: SectionKind::Init,
                block: Block {
                    line: 1,
                    stmts: vec![Stmt::VarDecl(a), Stmt::VarDecl(b)],
                },
                properties: None,
                width: None,
                height: None,
                id: None,
            }))],
        });

        run(&mut program);

        assert_eq!(program.decls.var(a).unique, 1);
        assert_eq!(program.decls.var(b).unique, 2);
    }
}
