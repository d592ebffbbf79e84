//! Re-inlines single-use outlined block-expression functions.
//!
//! Outlining keeps the lowering simple; when the synthesized function ended
//! up with one caller, the call is replaced by a block expression wrapping
//! the function's body and the declaration is dropped. The writer renders
//! the block expression as an inline parenthesized sequence.

use ahash::AHashSet;

use crate::ast::{BlockExpr, Decls, Expr, FuncId, Program, Resolved, Stmt};

pub fn run(program: &mut Program) {
    let mut inlined = AHashSet::new();

    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, &mut program.decls, &mut inlined);
        }
    }

    // drop the emptied declarations
    for module in &mut modules {
        for stmt in &mut module.stmts {
            drop_inlined_decls(stmt, &inlined);
        }
    }
    program.modules = modules;
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut Decls, inlined: &mut AHashSet<FuncId>) {
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
        Stmt::Expression(expr_stmt) => visit_expr(&mut expr_stmt.expr, decls, inlined),
        Stmt::VarDecl(id) => {
            let id = *id;
            let mut init = decls.var_mut(id).init.take();
            visit_expr(&mut init, decls, inlined);
            decls.var_mut(id).init = init;
        }
        Stmt::FuncDecl(id) => {
            let id = *id;
            if let Some(mut block) = decls.func_mut(id).block.take() {
                for inner in &mut block.stmts {
                    visit_stmt(inner, decls, inlined);
                }
                decls.func_mut(id).block = Some(block);
            }
        }
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, decls, inlined);
            }
        }
        Stmt::If(if_stmt) => {
            visit_expr(&mut if_stmt.cond, decls, inlined);
            for inner in &mut if_stmt.then_block.stmts {
                visit_stmt(inner, decls, inlined);
            }
            if let Some(else_block) = &mut if_stmt.else_block {
                for inner in &mut else_block.stmts {
                    visit_stmt(inner, decls, inlined);
                }
            }
        }
        Stmt::While(while_stmt) => {
            visit_expr(&mut while_stmt.cond, decls, inlined);
            for inner in &mut while_stmt.body.stmts {
                visit_stmt(inner, decls, inlined);
            }
        }
        Stmt::Section(section) => {
            for inner in &mut section.block.stmts {
                visit_stmt(inner, decls, inlined);
            }
        }
    }
}

fn visit_expr(expr: &mut Expr, decls: &mut Decls, inlined: &mut AHashSet<FuncId>) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Member(member) => visit_expr(&mut member.base, decls, inlined),
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left, decls, inlined);
            visit_expr(&mut binary.right, decls, inlined);
        }
        Expr::Unary(unary) => visit_expr(&mut unary.expr, decls, inlined),
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base, decls, inlined);
            visit_expr(&mut subscript.index, decls, inlined);
        }
        Expr::SizeOf(sizeof) => visit_expr(&mut sizeof.expr, decls, inlined),
        Expr::Block(block) => {
            for inner in &mut block.block.stmts {
                visit_stmt(inner, decls, inlined);
            }
        }
        Expr::Call(call) => {
            visit_expr(&mut call.base, decls, inlined);
            for arg in &mut call.args {
                visit_expr(arg, decls, inlined);
            }

            let Expr::Member(member) = &call.base else { return };
            let Resolved::Func(func) = member.resolved else { return };
            let decl = decls.func(func);
            if !decl.is_block_expression || decl.use_count > 1 {
                return;
            }
            debug_assert!(decl.params.is_empty());

            let Some(block) = decls.func_mut(func).block.take() else {
                return;
            };
            let ty = decls.func(func).ty.clone();
            inlined.insert(func);

            *expr = Expr::Block(Box::new(BlockExpr { ty, block }));
        }
    }
}

fn drop_inlined_decls(stmt: &mut Stmt, inlined: &AHashSet<FuncId>) {
    match stmt {
        Stmt::FuncDecl(id) if inlined.contains(id) => *stmt = Stmt::Null,
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                drop_inlined_decls(inner, inlined);
            }
        }
        Stmt::If(if_stmt) => {
            for inner in &mut if_stmt.then_block.stmts {
                drop_inlined_decls(inner, inlined);
            }
            if let Some(else_block) = &mut if_stmt.else_block {
                for inner in &mut else_block.stmts {
                    drop_inlined_decls(inner, inlined);
                }
            }
        }
        Stmt::While(while_stmt) => {
            for inner in &mut while_stmt.body.stmts {
                drop_inlined_decls(inner, inlined);
            }
        }
        Stmt::Section(section) => {
            for inner in &mut section.block.stmts {
                drop_inlined_decls(inner, inlined);
            }
        }
        Stmt::Expression(expr_stmt) => drop_inlined_in_expr(&mut expr_stmt.expr, inlined),
        _ => {}
    }
}

// inlined bodies can themselves contain declarations of other inlined
// functions
fn drop_inlined_in_expr(expr: &mut Expr, inlined: &AHashSet<FuncId>) {
    match expr {
        Expr::Block(block) => {
            for inner in &mut block.block.stmts {
                drop_inlined_decls(inner, inlined);
            }
        }
        Expr::Binary(binary) => {
            drop_inlined_in_expr(&mut binary.left, inlined);
            drop_inlined_in_expr(&mut binary.right, inlined);
        }
        Expr::Unary(unary) => drop_inlined_in_expr(&mut unary.expr, inlined),
        Expr::Subscript(subscript) => {
            drop_inlined_in_expr(&mut subscript.base, inlined);
            drop_inlined_in_expr(&mut subscript.index, inlined);
        }
        Expr::Call(call) => {
            for arg in &mut call.args {
                drop_inlined_in_expr(arg, inlined);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, CallExpr, ExprStmt, FuncDecl, MemberAccessExpr, Modifiers, make};
    use crate::types::{Primitive, TypeRef};
    use smallvec::SmallVec;

    fn block_expr_func(decls: &mut Decls, use_count: i32) -> FuncId {
        decls.alloc_func(FuncDecl {
            line: 1,
            name: "block_expression".into(),
            external_name: None,
            ty: TypeRef::primitive(Primitive::Int, 1),
            params: Vec::new(),
            block: Some(Block {
                line: 1,
                stmts: vec![Stmt::Expression(ExprStmt::new(make::int(5, 1), 1))],
            }),
            variadic: false,
            modifiers: Modifiers::default(),
            unique: 0,
            is_block_expression: true,
            return_value: None,
            use_count,
            unused: false,
            deps: SmallVec::new(),
        })
    }

    fn call_to(func: FuncId) -> Expr {
        Expr::Call(Box::new(CallExpr {
            line: 1,
            base: Expr::Member(Box::new(MemberAccessExpr {
                line: 1,
                resolved: Resolved::Func(func),
                ..MemberAccessExpr::default()
            })),
            args: Vec::new(),
        }))
    }

    #[test]
    fn single_use_block_expression_inlines() {
        let mut decls = Decls::default();
        let func = block_expr_func(&mut decls, 1);

        let mut expr = call_to(func);
        let mut inlined = AHashSet::new();
        visit_expr(&mut expr, &mut decls, &mut inlined);

        assert!(matches!(expr, Expr::Block(_)));
        assert!(inlined.contains(&func));
        assert!(decls.func(func).block.is_none());
    }

    #[test]
    fn multi_use_block_expression_stays_outlined() {
        let mut decls = Decls::default();
        let func = block_expr_func(&mut decls, 2);

        let mut expr = call_to(func);
        let mut inlined = AHashSet::new();
        visit_expr(&mut expr, &mut decls, &mut inlined);

        assert!(matches!(expr, Expr::Call(_)));
        assert!(inlined.is_empty());
    }
}
