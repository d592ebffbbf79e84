//! Rewrites `for` into `while` plus a prelude block.
//!
//! `for (init; cond; incr) body` becomes `{ init; while (cond) { body;
//! incr; } }`. Before the rewrite, every `continue` in the body grows a copy
//! of the increment in front of it, so increments run on every iteration
//! path once the control-flow pass turns `continue` into flags.

use crate::ast::{Block, Expr, ExprStmt, ForStmt, LoopControlKind, Program, Stmt, WhileStmt, make};

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, None);
        }
    }
    program.modules = modules;

    for index in 0..program.decls.funcs.len() {
        if let Some(mut block) = program.decls.funcs[index].block.take() {
            for stmt in &mut block.stmts {
                visit_stmt(stmt, None);
            }
            program.decls.funcs[index].block = Some(block);
        }
    }
    for index in 0..program.decls.vars.len() {
        let mut init = program.decls.vars[index].init.take();
        visit_expr(&mut init);
        program.decls.vars[index].init = init;
    }
}

fn visit_stmt(stmt: &mut Stmt, current_for_incr: Option<&Expr>) {
    match stmt {
        Stmt::Null
        | Stmt::VarDecl(_)
        | Stmt::FuncDecl(_)
        | Stmt::StructDecl(_)
        | Stmt::Import(_)
        | Stmt::Input(_)
        | Stmt::Desc(_)
        | Stmt::Modifier(_) => {}
        Stmt::Expression(expr_stmt) => visit_expr(&mut expr_stmt.expr),
        Stmt::Return(ret) => visit_expr(&mut ret.expr),
        Stmt::LoopControl(loop_control) => {
            if loop_control.kind == LoopControlKind::Continue
                && let Some(incr) = current_for_incr
                && !incr.is_null()
            {
                let line = loop_control.line;
                let increment = Stmt::Expression(ExprStmt::new(incr.clone(), line));
                let original = stmt.take();
                *stmt = Stmt::Block(make::block_of(vec![increment, original], line));
            }
        }
        Stmt::For(_) => visit_for(stmt),
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, current_for_incr);
            }
        }
        Stmt::If(if_stmt) => {
            visit_expr(&mut if_stmt.cond);
            for inner in &mut if_stmt.then_block.stmts {
                visit_stmt(inner, current_for_incr);
            }
            if let Some(else_block) = &mut if_stmt.else_block {
                for inner in &mut else_block.stmts {
                    visit_stmt(inner, current_for_incr);
                }
            }
        }
        Stmt::Section(section) => {
            for inner in &mut section.block.stmts {
                visit_stmt(inner, None);
            }
        }
        Stmt::While(while_stmt) => {
            visit_expr(&mut while_stmt.cond);
            for inner in &mut while_stmt.body.stmts {
                visit_stmt(inner, None);
            }
        }
    }
}

// a block expression is its own loop context; continues inside it never
// belong to the surrounding for
fn visit_expr(expr: &mut Expr) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left);
            visit_expr(&mut binary.right);
        }
        Expr::Unary(unary) => visit_expr(&mut unary.expr),
        Expr::Member(member) => visit_expr(&mut member.base),
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base);
            visit_expr(&mut subscript.index);
        }
        Expr::Call(call) => {
            visit_expr(&mut call.base);
            for arg in &mut call.args {
                visit_expr(arg);
            }
        }
        Expr::SizeOf(sizeof) => visit_expr(&mut sizeof.expr),
        Expr::Block(block) => {
            for inner in &mut block.block.stmts {
                visit_stmt(inner, None);
            }
        }
    }
}

fn visit_for(stmt: &mut Stmt) {
    let Stmt::For(for_stmt) = stmt.take() else {
        unreachable!("visit_for on a non-for statement");
    };
    let ForStmt {
        line,
        mut init,
        mut cond,
        mut incr,
        mut body,
    } = *for_stmt;

    visit_stmt(&mut init, None);
    visit_expr(&mut cond);
    visit_expr(&mut incr);
    for inner in &mut body.stmts {
        visit_stmt(inner, Some(&incr));
    }

    if cond.is_null() {
        cond = make::boolean(true, line);
    }

    if !incr.is_null() {
        body.stmts.push(Stmt::Expression(ExprStmt::new(incr, line)));
    }

    let while_stmt = Stmt::While(Box::new(WhileStmt { line, cond, body }));

    let mut outer = Vec::new();
    if !init.is_null() {
        outer.push(init);
    }
    outer.push(while_stmt);

    *stmt = Stmt::Block(Block { line, stmts: outer });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{LoopControlStmt, Program, VarDecl};
    use crate::types::{Primitive, TypeRef};

    fn count_fors(stmt: &Stmt) -> usize {
        match stmt {
            Stmt::For(for_stmt) => 1 + for_stmt.body.stmts.iter().map(count_fors).sum::<usize>(),
            Stmt::Block(block) => block.stmts.iter().map(count_fors).sum(),
            Stmt::While(while_stmt) => while_stmt.body.stmts.iter().map(count_fors).sum(),
            Stmt::If(if_stmt) => {
                if_stmt.then_block.stmts.iter().map(count_fors).sum::<usize>()
                    + if_stmt
                        .else_block
                        .as_ref()
                        .map_or(0, |b| b.stmts.iter().map(count_fors).sum())
            }
            Stmt::Section(section) => section.block.stmts.iter().map(count_fors).sum(),
            _ => 0,
        }
    }

    #[test]
    fn for_becomes_block_with_while() {
        let mut program = Program::default();
        let var = program.decls.alloc_var(VarDecl::new(
            "i".into(),
            TypeRef::primitive(Primitive::Int, 1),
            1,
        ));

        let mut stmt = Stmt::For(Box::new(ForStmt {
            line: 1,
            init: Stmt::VarDecl(var),
            cond: make::boolean(true, 1),
            incr: make::binary(
                crate::ast::BinaryOp::AddAssign,
                make::var_read(var, 1),
                make::int(1, 1),
                1,
            ),
            body: Block {
                line: 1,
                stmts: vec![Stmt::LoopControl(LoopControlStmt {
                    line: 2,
                    kind: LoopControlKind::Continue,
                })],
            },
        }));

        visit_stmt(&mut stmt, None);

        assert_eq!(count_fors(&stmt), 0);
        let Stmt::Block(outer) = &stmt else { panic!("expected block") };
        assert!(matches!(outer.stmts[0], Stmt::VarDecl(_)));
        let Stmt::While(while_stmt) = &outer.stmts[1] else {
            panic!("expected while")
        };

        // the continue grew an increment in front of it, and the loop tail
        // carries the increment as well
        let Stmt::Block(continue_block) = &while_stmt.body.stmts[0] else {
            panic!("expected rewritten continue")
        };
        assert!(matches!(continue_block.stmts[0], Stmt::Expression(_)));
        assert!(matches!(continue_block.stmts[1], Stmt::LoopControl(_)));
        assert!(matches!(while_stmt.body.stmts.last(), Some(Stmt::Expression(_))));
    }

    #[test]
    fn missing_condition_becomes_true() {
        let mut stmt = Stmt::For(Box::new(ForStmt {
            line: 1,
            init: Stmt::Null,
            cond: Expr::Null,
            incr: Expr::Null,
            body: Block::default(),
        }));
        visit_stmt(&mut stmt, None);

        let Stmt::Block(outer) = &stmt else { panic!() };
        let Stmt::While(while_stmt) = &outer.stmts[0] else { panic!() };
        assert!(matches!(
            &while_stmt.cond,
            Expr::Literal(l) if l.kind == crate::ast::LiteralKind::Bool(true)
        ));
    }
}
