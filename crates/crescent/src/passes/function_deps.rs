//! Counts function references and records function-to-function dependency
//! edges, one entry per reference so the mark-unused cascade can decrement
//! them individually.

use crate::ast::{Decls, Expr, FuncId, Program, Resolved, Stmt};

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, &mut program.decls, None);
        }
    }
    program.modules = modules;
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut Decls, current: Option<FuncId>) {
    match stmt {
        Stmt::Null
        | Stmt::Import(_)
        | Stmt::StructDecl(_)
        | Stmt::Desc(_)
        | Stmt::Modifier(_)
        | Stmt::LoopControl(_)
        | Stmt::Return(_)
        | Stmt::For(_) => {}
        Stmt::Expression(expr_stmt) => visit_expr(&expr_stmt.expr, decls, current),
        Stmt::VarDecl(id) => {
            let init = decls.var_mut(*id).init.take();
            visit_expr(&init, decls, current);
            decls.var_mut(*id).init = init;
        }
        Stmt::Input(id) => {
            if let Some(var) = decls.input(*id).var {
                let init = decls.var_mut(var).init.take();
                visit_expr(&init, decls, current);
                decls.var_mut(var).init = init;
            }
        }
        Stmt::FuncDecl(id) => {
            let id = *id;
            if let Some(mut block) = decls.func_mut(id).block.take() {
                for inner in &mut block.stmts {
                    visit_stmt(inner, decls, Some(id));
                }
                decls.func_mut(id).block = Some(block);
            }
        }
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, decls, current);
            }
        }
        Stmt::If(if_stmt) => {
            visit_expr(&if_stmt.cond, decls, current);
            for inner in &mut if_stmt.else_block.iter_mut().flat_map(|b| b.stmts.iter_mut()) {
                visit_stmt(inner, decls, current);
            }
            for inner in &mut if_stmt.then_block.stmts {
                visit_stmt(inner, decls, current);
            }
        }
        Stmt::While(while_stmt) => {
            visit_expr(&while_stmt.cond, decls, current);
            for inner in &mut while_stmt.body.stmts {
                visit_stmt(inner, decls, current);
            }
        }
        Stmt::Section(section) => {
            for inner in &mut section.block.stmts {
                visit_stmt(inner, decls, current);
            }
        }
    }
}

fn visit_expr(expr: &Expr, decls: &mut Decls, current: Option<FuncId>) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Member(member) => {
            visit_expr(&member.base, decls, current);
            if let Resolved::Func(func) = member.resolved {
                decls.func_mut(func).use_count += 1;
                if let Some(current) = current {
                    decls.func_mut(current).deps.push(func);
                }
            }
        }
        Expr::Binary(binary) => {
            visit_expr(&binary.left, decls, current);
            visit_expr(&binary.right, decls, current);
        }
        Expr::Unary(unary) => visit_expr(&unary.expr, decls, current),
        Expr::Call(call) => {
            visit_expr(&call.base, decls, current);
            for arg in &call.args {
                visit_expr(arg, decls, current);
            }
        }
        Expr::Subscript(subscript) => {
            visit_expr(&subscript.base, decls, current);
            visit_expr(&subscript.index, decls, current);
        }
        Expr::SizeOf(sizeof) => visit_expr(&sizeof.expr, decls, current),
        Expr::Block(_) => unreachable!("block expressions were outlined before dependency analysis"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, CallExpr, ExprStmt, FuncDecl, MemberAccessExpr, Module, Modifiers, SectionKind, SectionStmt};
    use crate::types::{Primitive, TypeRef};
    use smallvec::SmallVec;

    #[test]
    fn call_counts_and_dependency_edges() {
        let mut program = Program::default();
        let callee = program.decls.alloc_func(FuncDecl {
            line: 1,
            name: "callee".into(),
            external_name: None,
            ty: TypeRef::primitive(Primitive::Void, 1),
            params: Vec::new(),
            block: Some(Block::default()),
            variadic: false,
            modifiers: Modifiers::default(),
            unique: 0,
            is_block_expression: false,
            return_value: None,
            use_count: 0,
            unused: false,
            deps: SmallVec::new(),
        });

        let call = Expr::Call(Box::new(CallExpr {
            line: 2,
            base: Expr::Member(Box::new(MemberAccessExpr {
                line: 2,
                resolved: Resolved::Func(callee),
                ..MemberAccessExpr::default()
            })),
            args: Vec::new(),
        }));

        let caller = program.decls.alloc_func(FuncDecl {
            line: 1,
            name: "caller".into(),
            external_name: None,
            ty: TypeRef::primitive(Primitive::Void, 1),
            params: Vec::new(),
            block: Some(Block {
                line: 1,
                stmts: vec![Stmt::Expression(ExprStmt::new(call, 2))],
            }),
            variadic: false,
            modifiers: Modifiers::default(),
            unique: 0,
            is_block_expression: false,
            return_value: None,
            use_count: 0,
            unused: false,
            deps: SmallVec::new(),
        });

        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![Stmt::Section(Box::new(SectionStmt {
                line: 1,
                kind: SectionKind::Init,
                block: Block {
                    line: 1,
                    stmts: vec![Stmt::FuncDecl(callee), Stmt::FuncDecl(caller)],
                },
                properties: None,
                width: None,
                height: None,
                id: None,
            }))],
        });

        run(&mut program);

        assert_eq!(program.decls.func(callee).use_count, 1);
        assert_eq!(program.decls.func(caller).use_count, 0);
        assert_eq!(program.decls.func(caller).deps.as_slice(), &[callee]);
    }
}
