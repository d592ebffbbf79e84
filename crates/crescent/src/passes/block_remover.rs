//! Final cleanup before emission: splices nested block statements into
//! their parents and drops empty else-arms. Empty blocks that survive
//! render as `(0)` in the writer, which needs at least one operand inside
//! parentheses.

use crate::ast::{Decls, Expr, Program, Stmt};

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, &mut program.decls);
        }
    }
    program.modules = modules;
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut Decls) {
    match stmt {
        Stmt::Null
        | Stmt::Import(_)
        | Stmt::StructDecl(_)
        | Stmt::Input(_)
        | Stmt::Desc(_)
        | Stmt::Modifier(_)
        | Stmt::LoopControl(_)
        | Stmt::Return(_)
        | Stmt::For(_)
        | Stmt::VarDecl(_) => {}
        Stmt::Expression(expr_stmt) => visit_expr(&mut expr_stmt.expr, decls),
        Stmt::FuncDecl(id) => {
            let id = *id;
            if let Some(mut block) = decls.func_mut(id).block.take() {
                flatten(&mut block.stmts, decls);
                decls.func_mut(id).block = Some(block);
            }
        }
        Stmt::Block(block) => flatten(&mut block.stmts, decls),
        Stmt::If(if_stmt) => {
            visit_expr(&mut if_stmt.cond, decls);
            flatten(&mut if_stmt.then_block.stmts, decls);

            if let Some(else_block) = &mut if_stmt.else_block {
                flatten(&mut else_block.stmts, decls);
                if else_block.stmts.is_empty() {
                    if_stmt.else_block = None;
                }
            }
        }
        Stmt::While(while_stmt) => {
            visit_expr(&mut while_stmt.cond, decls);
            flatten(&mut while_stmt.body.stmts, decls);
        }
        Stmt::Section(section) => flatten(&mut section.block.stmts, decls),
    }
}

fn visit_expr(expr: &mut Expr, decls: &mut Decls) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Member(member) => visit_expr(&mut member.base, decls),
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left, decls);
            visit_expr(&mut binary.right, decls);
        }
        Expr::Unary(unary) => visit_expr(&mut unary.expr, decls),
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base, decls);
            visit_expr(&mut subscript.index, decls);
        }
        Expr::Call(call) => {
            for arg in &mut call.args {
                visit_expr(arg, decls);
            }
        }
        Expr::SizeOf(sizeof) => visit_expr(&mut sizeof.expr, decls),
        Expr::Block(block) => flatten(&mut block.block.stmts, decls),
    }
}

/// Visits and splices: nested block statements dissolve into the parent
/// list, null statements disappear.
fn flatten(stmts: &mut Vec<Stmt>, decls: &mut Decls) {
    let mut index = 0;
    while index < stmts.len() {
        visit_stmt(&mut stmts[index], decls);

        match &mut stmts[index] {
            Stmt::Null => {
                stmts.remove(index);
            }
            Stmt::Block(_) => {
                let Stmt::Block(block) = stmts[index].take() else { unreachable!() };
                stmts.splice(index..=index, block.stmts);
            }
            _ => index += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, ExprStmt, IfStmt, make};

    #[test]
    fn nested_blocks_splice_into_parent() {
        let mut decls = Decls::default();
        let mut stmts = vec![
            Stmt::Expression(ExprStmt::new(make::int(1, 1), 1)),
            Stmt::Block(Block {
                line: 1,
                stmts: vec![
                    Stmt::Expression(ExprStmt::new(make::int(2, 2), 2)),
                    Stmt::Block(Block {
                        line: 2,
                        stmts: vec![Stmt::Expression(ExprStmt::new(make::int(3, 3), 3))],
                    }),
                ],
            }),
            Stmt::Null,
        ];

        flatten(&mut stmts, &mut decls);

        assert_eq!(stmts.len(), 3);
        assert!(stmts.iter().all(|stmt| matches!(stmt, Stmt::Expression(_))));
    }

    #[test]
    fn empty_else_arm_is_dropped() {
        let mut decls = Decls::default();
        let mut stmt = Stmt::If(Box::new(IfStmt {
            line: 1,
            cond: make::boolean(true, 1),
            then_block: Block::default(),
            else_block: Some(Block {
                line: 1,
                stmts: vec![Stmt::Null],
            }),
        }));

        visit_stmt(&mut stmt, &mut decls);

        let Stmt::If(if_stmt) = &stmt else { panic!() };
        assert!(if_stmt.then_block.stmts.is_empty());
        assert!(if_stmt.else_block.is_none());
    }
}
