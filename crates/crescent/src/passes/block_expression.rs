//! Outlines block expressions into synthetic functions.
//!
//! Every remaining block expression becomes a zero-argument function named
//! `block_expression`, flagged so the inliner can undo the split when the
//! function ends up with a single caller. The declaration is inserted ahead
//! of the statement the expression appeared in; the expression itself
//! becomes a call.

use smallvec::SmallVec;

use crate::ast::{
    Block, CallExpr, Decls, Expr, FuncDecl, FuncId, MemberAccessExpr, Modifiers, Program, Resolved, ReturnOwner,
    Stmt,
};

/// Name shared by every outlined block-expression function.
pub const BLOCK_EXPRESSION_NAME: &str = "block_expression";

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, &mut program.decls);
        }
    }
    program.modules = modules;

    // only functions that existed before the pass need a walk; outlined ones
    // are processed as they are created
    let existing = program.decls.funcs.len();
    for index in 0..existing {
        if let Some(mut block) = program.decls.funcs[index].block.take() {
            for stmt in &mut block.stmts {
                visit_stmt(stmt, &mut program.decls);
            }
            program.decls.funcs[index].block = Some(block);
        }
    }
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut Decls) {
    let mut outlined = Vec::new();

    match stmt {
        Stmt::Null
        | Stmt::LoopControl(_)
        | Stmt::Import(_)
        | Stmt::Input(_)
        | Stmt::Desc(_)
        | Stmt::Modifier(_)
        | Stmt::StructDecl(_)
        | Stmt::FuncDecl(_) => {}
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::Section(section) => {
            for inner in &mut section.block.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::If(if_stmt) => {
            visit_expr(&mut if_stmt.cond, &mut outlined, decls);
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
            // only the declaration moves out; the call stays in the
            // condition and still runs every iteration
            visit_expr(&mut while_stmt.cond, &mut outlined, decls);
            for inner in &mut while_stmt.body.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::For(for_stmt) => {
            visit_stmt(&mut for_stmt.init, decls);
            visit_expr(&mut for_stmt.cond, &mut outlined, decls);
            visit_expr(&mut for_stmt.incr, &mut outlined, decls);
            for inner in &mut for_stmt.body.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::Expression(expr_stmt) => visit_expr(&mut expr_stmt.expr, &mut outlined, decls),
        Stmt::Return(ret) => visit_expr(&mut ret.expr, &mut outlined, decls),
        Stmt::VarDecl(id) => {
            let mut init = decls.var_mut(*id).init.take();
            visit_expr(&mut init, &mut outlined, decls);
            decls.var_mut(*id).init = init;
        }
    }

    if !outlined.is_empty() {
        let line = match stmt {
            Stmt::Expression(expr_stmt) => expr_stmt.line,
            _ => 0,
        };
        let original = stmt.take();
        let mut stmts: Vec<Stmt> = outlined.into_iter().map(Stmt::FuncDecl).collect();
        stmts.push(original);
        *stmt = Stmt::Block(Block { line, stmts });
    }
}

fn visit_expr(expr: &mut Expr, outlined: &mut Vec<FuncId>, decls: &mut Decls) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Block(_) => {
            let Expr::Block(mut block_expr) = expr.take() else {
                unreachable!();
            };

            for inner in &mut block_expr.block.stmts {
                visit_stmt(inner, decls);
            }

            let line = block_expr.block.line;
            let func = decls.alloc_func(FuncDecl {
                line,
                name: BLOCK_EXPRESSION_NAME.to_owned(),
                external_name: None,
                ty: block_expr.ty,
                params: Vec::new(),
                block: Some(block_expr.block),
                variadic: false,
                modifiers: Modifiers::default(),
                unique: 0,
                is_block_expression: true,
                return_value: None,
                use_count: 0,
                unused: false,
                deps: SmallVec::new(),
            });
            tag_returns(decls, func);
            outlined.push(func);

            *expr = Expr::Call(Box::new(CallExpr {
                line,
                base: Expr::Member(Box::new(MemberAccessExpr {
                    line,
                    resolved: Resolved::Func(func),
                    ..MemberAccessExpr::default()
                })),
                args: Vec::new(),
            }));
        }
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left, outlined, decls);
            visit_expr(&mut binary.right, outlined, decls);
        }
        Expr::Unary(unary) => visit_expr(&mut unary.expr, outlined, decls),
        Expr::Member(member) => visit_expr(&mut member.base, outlined, decls),
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base, outlined, decls);
            visit_expr(&mut subscript.index, outlined, decls);
        }
        Expr::Call(call) => {
            visit_expr(&mut call.base, outlined, decls);
            for arg in &mut call.args {
                visit_expr(arg, outlined, decls);
            }
        }
        Expr::SizeOf(sizeof) => visit_expr(&mut sizeof.expr, outlined, decls),
    }
}

// the returns that used to yield the block expression's value now return
// from the outlined function
fn tag_returns(decls: &mut Decls, func: FuncId) {
    fn tag(stmts: &mut [Stmt], func: FuncId) {
        for stmt in stmts {
            match stmt {
                Stmt::Return(ret) => ret.owner = ReturnOwner::Func(func),
                Stmt::Block(block) => tag(&mut block.stmts, func),
                Stmt::If(if_stmt) => {
                    tag(&mut if_stmt.then_block.stmts, func);
                    if let Some(else_block) = &mut if_stmt.else_block {
                        tag(&mut else_block.stmts, func);
                    }
                }
                Stmt::While(while_stmt) => tag(&mut while_stmt.body.stmts, func),
                _ => {}
            }
        }
    }

    let mut block = decls.func_mut(func).block.take().expect("outlined function body");
    tag(&mut block.stmts, func);
    decls.func_mut(func).block = Some(block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BlockExpr, ExprStmt, ReturnStmt, VarDecl, make};
    use crate::types::{Primitive, TypeRef};

    #[test]
    fn block_expression_outlines_into_function_call() {
        let mut decls = Decls::default();
        let x = decls.alloc_var(VarDecl::new("x".into(), TypeRef::primitive(Primitive::Int, 1), 1));

        // x = int { return 5; };
        let block_expr = Expr::Block(Box::new(BlockExpr {
            ty: TypeRef::primitive(Primitive::Int, 1),
            block: make::block_of(
                vec![Stmt::Return(Box::new(ReturnStmt {
                    line: 1,
                    expr: make::int(5, 1),
                    owner: ReturnOwner::Untagged,
                }))],
                1,
            ),
        }));
        let mut stmt = Stmt::Expression(ExprStmt::new(
            make::binary(crate::ast::BinaryOp::Assign, make::var_read(x, 1), block_expr, 1),
            1,
        ));

        visit_stmt(&mut stmt, &mut decls);

        // the statement was wrapped: [function decl, original assignment]
        let Stmt::Block(wrapper) = &stmt else {
            panic!("expected wrapping block, got {stmt:?}")
        };
        let Stmt::FuncDecl(func) = &wrapper.stmts[0] else { panic!() };
        let decl = decls.func(*func);
        assert!(decl.is_block_expression);
        assert_eq!(decl.name, BLOCK_EXPRESSION_NAME);
        assert!(decl.params.is_empty());

        // the return inside now belongs to the outlined function
        let Some(block) = &decl.block else { panic!() };
        assert!(matches!(&block.stmts[0], Stmt::Return(ret) if ret.owner == ReturnOwner::Func(*func)));

        let Stmt::Expression(expr_stmt) = &wrapper.stmts[1] else { panic!() };
        let Expr::Binary(assign) = &expr_stmt.expr else { panic!() };
        assert!(matches!(&assign.right, Expr::Call(_)));
    }
}
