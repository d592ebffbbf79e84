//! Lifts nested assignments into block expressions.
//!
//! The use-analysis passes only understand assignments in statement
//! position. `x = (y = expr)` becomes `x = T { y = expr; return y; }`, where
//! `T` is the effective type of the inner assignment's target; compound
//! inner assignments lift the same way.

use crate::ast::{BlockExpr, Expr, ExprStmt, Program, ReturnOwner, ReturnStmt, Stmt, make};
use crate::types::{TypeRef, struct_info_of_expr, type_of_expr};

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, &mut program.decls);
        }
    }
    program.modules = modules;

    for index in 0..program.decls.funcs.len() {
        if let Some(mut block) = program.decls.funcs[index].block.take() {
            for stmt in &mut block.stmts {
                visit_stmt(stmt, &mut program.decls);
            }
            program.decls.funcs[index].block = Some(block);
        }
    }
    for index in 0..program.decls.vars.len() {
        let mut init = program.decls.vars[index].init.take();
        visit_expr(&mut init, false, &mut program.decls);
        program.decls.vars[index].init = init;
    }
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut crate::ast::Decls) {
    match stmt {
        Stmt::Null
        | Stmt::StructDecl(_)
        | Stmt::LoopControl(_)
        | Stmt::Import(_)
        | Stmt::Input(_)
        | Stmt::Desc(_)
        | Stmt::Modifier(_)
        | Stmt::VarDecl(_)
        | Stmt::FuncDecl(_) => {}
        Stmt::Expression(expr_stmt) => visit_expr(&mut expr_stmt.expr, true, decls),
        Stmt::Return(ret) => visit_expr(&mut ret.expr, false, decls),
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::If(if_stmt) => {
            visit_expr(&mut if_stmt.cond, false, decls);
            for inner in &mut if_stmt.then_block.stmts {
                visit_stmt(inner, decls);
            }
            if let Some(else_block) = &mut if_stmt.else_block {
                for inner in &mut else_block.stmts {
                    visit_stmt(inner, decls);
                }
            }
        }
        Stmt::While(while_stmt) => {
            visit_expr(&mut while_stmt.cond, false, decls);
            for inner in &mut while_stmt.body.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::For(for_stmt) => {
            visit_stmt(&mut for_stmt.init, decls);
            visit_expr(&mut for_stmt.cond, false, decls);
            visit_expr(&mut for_stmt.incr, false, decls);
            for inner in &mut for_stmt.body.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::Section(section) => {
            for inner in &mut section.block.stmts {
                visit_stmt(inner, decls);
            }
        }
    }
}

fn visit_expr(expr: &mut Expr, is_stmt_top: bool, decls: &mut crate::ast::Decls) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left, false, decls);
            visit_expr(&mut binary.right, false, decls);

            if !is_stmt_top && binary.op.is_assignment() {
                lift(expr, decls);
            }
        }
        Expr::Unary(unary) => visit_expr(&mut unary.expr, false, decls),
        Expr::Member(member) => visit_expr(&mut member.base, false, decls),
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base, false, decls);
            visit_expr(&mut subscript.index, false, decls);
        }
        Expr::Call(call) => {
            for arg in &mut call.args {
                visit_expr(arg, false, decls);
            }
        }
        Expr::SizeOf(sizeof) => visit_expr(&mut sizeof.expr, false, decls),
        Expr::Block(block) => {
            for inner in &mut block.block.stmts {
                visit_stmt(inner, decls);
            }
        }
    }
}

fn lift(expr: &mut Expr, decls: &mut crate::ast::Decls) {
    let Expr::Binary(binary) = expr else {
        unreachable!("lift on a non-binary expression");
    };
    let line = binary.line;

    let ty = assignment_result_type(decls, &binary.left);
    let result = binary.left.clone();
    let inner = expr.take();

    *expr = Expr::Block(Box::new(BlockExpr {
        ty,
        block: make::block_of(
            vec![
                Stmt::Expression(ExprStmt::new(inner, line)),
                Stmt::Return(Box::new(ReturnStmt {
                    line,
                    expr: result,
                    owner: ReturnOwner::Untagged,
                })),
            ],
            line,
        ),
    }));
}

fn assignment_result_type(decls: &crate::ast::Decls, target: &Expr) -> TypeRef {
    if let Some(id) = struct_info_of_expr(decls, target).effective {
        TypeRef::to_struct(id)
    } else {
        type_of_expr(decls, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Decls, VarDecl};
    use crate::types::Primitive;

    #[test]
    fn nested_assignment_lifts_into_block() {
        let mut decls = Decls::default();
        let x = decls.alloc_var(VarDecl::new("x".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        let y = decls.alloc_var(VarDecl::new("y".into(), TypeRef::primitive(Primitive::Int, 1), 1));

        // x = (y = 1);
        let inner = make::binary(BinaryOp::Assign, make::var_read(y, 1), make::int(1, 1), 1);
        let mut stmt = Stmt::Expression(ExprStmt::new(
            make::binary(BinaryOp::Assign, make::var_read(x, 1), inner, 1),
            1,
        ));

        visit_stmt(&mut stmt, &mut decls);

        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        let Expr::Binary(outer) = &expr_stmt.expr else { panic!() };
        let Expr::Block(block) = &outer.right else {
            panic!("inner assignment was not lifted: {:?}", outer.right)
        };
        assert_eq!(block.block.stmts.len(), 2);
        assert!(matches!(&block.block.stmts[0], Stmt::Expression(_)));
        assert!(matches!(&block.block.stmts[1], Stmt::Return(_)));
    }

    #[test]
    fn statement_level_assignment_is_left_alone() {
        let mut decls = Decls::default();
        let x = decls.alloc_var(VarDecl::new("x".into(), TypeRef::primitive(Primitive::Int, 1), 1));

        let mut stmt = Stmt::Expression(ExprStmt::new(
            make::binary(BinaryOp::Assign, make::var_read(x, 1), make::int(1, 1), 1),
            1,
        ));
        visit_stmt(&mut stmt, &mut decls);

        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        assert!(matches!(&expr_stmt.expr, Expr::Binary(b) if b.op == BinaryOp::Assign));
    }

    #[test]
    fn compound_nested_assignment_lifts_too() {
        let mut decls = Decls::default();
        let x = decls.alloc_var(VarDecl::new("x".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        let y = decls.alloc_var(VarDecl::new("y".into(), TypeRef::primitive(Primitive::Int, 1), 1));

        let inner = make::binary(BinaryOp::AddAssign, make::var_read(y, 1), make::int(2, 1), 1);
        let mut stmt = Stmt::Expression(ExprStmt::new(
            make::binary(BinaryOp::Assign, make::var_read(x, 1), inner, 1),
            1,
        ));
        visit_stmt(&mut stmt, &mut decls);

        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        let Expr::Binary(outer) = &expr_stmt.expr else { panic!() };
        assert!(matches!(&outer.right, Expr::Block(_)));
    }
}
