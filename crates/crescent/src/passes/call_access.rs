//! Hoists member access off function calls and block expressions.
//!
//! The target runtime has no composite rvalues, so `f().x` cannot be read
//! directly. The base is moved into a freshly declared temporary inside a
//! block expression and the access reads from the temporary instead:
//! `f().x` becomes `T { S __temp = f(); return __temp.x; }`.

use crate::{
    ast::{BlockExpr, Decls, Expr, Program, ReturnOwner, ReturnStmt, Stmt, VarDecl, make},
    parse::TEMP_NAME,
    types::type_of_expr,
};

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
        visit_expr(&mut init, &mut program.decls);
        program.decls.vars[index].init = init;
    }
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut Decls) {
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
        Stmt::Expression(expr_stmt) => visit_expr(&mut expr_stmt.expr, decls),
        Stmt::Return(ret) => visit_expr(&mut ret.expr, decls),
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::If(if_stmt) => {
            for inner in &mut if_stmt.then_block.stmts {
                visit_stmt(inner, decls);
            }
            if let Some(else_block) = &mut if_stmt.else_block {
                for inner in &mut else_block.stmts {
                    visit_stmt(inner, decls);
                }
            }
            visit_expr(&mut if_stmt.cond, decls);
        }
        Stmt::While(while_stmt) => {
            visit_expr(&mut while_stmt.cond, decls);
            for inner in &mut while_stmt.body.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::For(for_stmt) => {
            visit_stmt(&mut for_stmt.init, decls);
            visit_expr(&mut for_stmt.cond, decls);
            visit_expr(&mut for_stmt.incr, decls);
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

fn visit_expr(expr: &mut Expr, decls: &mut Decls) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Member(_) => visit_member_access(expr, decls),
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left, decls);
            visit_expr(&mut binary.right, decls);
        }
        Expr::Unary(unary) => visit_expr(&mut unary.expr, decls),
        Expr::Call(call) => {
            for arg in &mut call.args {
                visit_expr(arg, decls);
            }
        }
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base, decls);
            visit_expr(&mut subscript.index, decls);
        }
        Expr::SizeOf(sizeof) => visit_expr(&mut sizeof.expr, decls),
        Expr::Block(block) => {
            for inner in &mut block.block.stmts {
                visit_stmt(inner, decls);
            }
        }
    }
}

fn visit_member_access(expr: &mut Expr, decls: &mut Decls) {
    let Expr::Member(member) = expr else {
        unreachable!("visit_member_access on a non-member expression");
    };
    visit_expr(&mut member.base, decls);

    if !matches!(member.base, Expr::Call(_) | Expr::Block(_)) {
        return;
    }

    let Expr::Member(mut member) = expr.take() else {
        unreachable!();
    };
    let line = member.line;

    let base = member.base.take();
    let temp = {
        let mut decl = VarDecl::new(TEMP_NAME.to_owned(), type_of_expr(decls, &base), line);
        decl.init = base;
        decls.alloc_var(decl)
    };
    member.root_var = Some(temp);

    let access_ty = type_of_expr(decls, &Expr::Member(member.clone()));

    *expr = Expr::Block(Box::new(BlockExpr {
        ty: access_ty,
        block: make::block_of(
            vec![
                Stmt::VarDecl(temp),
                Stmt::Return(Box::new(ReturnStmt {
                    line,
                    expr: Expr::Member(member),
                    owner: ReturnOwner::Untagged,
                })),
            ],
            line,
        ),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CallExpr, FuncDecl, MemberAccessExpr, Resolved, StructDecl, VarId};
    use crate::types::{Primitive, TypeRef};
    use smallvec::SmallVec;

    fn struct_with_member(decls: &mut Decls) -> (crate::ast::StructId, VarId) {
        let member = decls.alloc_var(VarDecl::new(
            "x".into(),
            TypeRef::primitive(Primitive::Float, 1),
            1,
        ));
        let id = decls.alloc_struct(StructDecl {
            line: 1,
            name: "V".into(),
            members: vec![member],
            modifiers: crate::ast::Modifiers::default(),
            is_array_type: false,
        });
        (id, member)
    }

    #[test]
    fn call_base_is_hoisted_into_temp() {
        let mut decls = Decls::default();
        let (struct_id, member) = struct_with_member(&mut decls);

        let func = decls.alloc_func(FuncDecl {
            line: 1,
            name: "make".into(),
            external_name: None,
            ty: TypeRef::to_struct(struct_id),
            params: Vec::new(),
            block: Some(crate::ast::Block::default()),
            variadic: false,
            modifiers: crate::ast::Modifiers::default(),
            unique: 0,
            is_block_expression: false,
            return_value: None,
            use_count: 0,
            unused: false,
            deps: SmallVec::new(),
        });

        // make().x
        let call = Expr::Call(Box::new(CallExpr {
            line: 1,
            base: Expr::Member(Box::new(MemberAccessExpr {
                line: 1,
                resolved: Resolved::Func(func),
                ..MemberAccessExpr::default()
            })),
            args: Vec::new(),
        }));
        let mut expr = Expr::Member(Box::new(MemberAccessExpr {
            line: 1,
            base: call,
            resolved: Resolved::Var(member),
            ..MemberAccessExpr::default()
        }));

        visit_expr(&mut expr, &mut decls);

        let Expr::Block(block) = &expr else {
            panic!("expected hoisted block expression, got {expr:?}")
        };
        let Stmt::VarDecl(temp) = &block.block.stmts[0] else { panic!() };
        assert!(matches!(&decls.var(*temp).init, Expr::Call(_)));
        let Stmt::Return(ret) = &block.block.stmts[1] else { panic!() };
        let Expr::Member(access) = &ret.expr else { panic!() };
        assert_eq!(access.root_var, Some(*temp));
        assert!(access.base.is_null());
    }

    #[test]
    fn plain_member_access_is_untouched() {
        let mut decls = Decls::default();
        let var = decls.alloc_var(VarDecl::new("v".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        let mut expr = make::var_read(var, 1);
        visit_expr(&mut expr, &mut decls);
        assert!(matches!(expr, Expr::Member(_)));
    }
}
