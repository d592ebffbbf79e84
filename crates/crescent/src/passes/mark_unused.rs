//! Marks dead assignments, declarations, and functions.
//!
//! Anything with a zero use count and no protective flag becomes `unused`;
//! when its right-hand side has observable effects the side keeps the
//! expression (`keep_right`). Removing one assignment gives back the uses
//! it held on its dependencies, cascading. Parameters, input-backed
//! variables, and external targets are pinned with `do_not_optimize`.

use crate::ast::{AssignInfo, AssignRef, Decls, Expr, FuncId, Program, Resolved, Stmt};

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);

    let mut ctx = Pass {
        decls: &mut program.decls,
        assigns: &mut program.assigns,
    };

    for module in &mut modules {
        for stmt in &mut module.stmts {
            ctx.visit_stmt(stmt, false);
        }
    }

    program.modules = modules;
}

struct Pass<'a> {
    decls: &'a mut Decls,
    assigns: &'a mut Vec<AssignInfo>,
}

impl Pass<'_> {
    fn visit_stmt(&mut self, stmt: &mut Stmt, end_of_function: bool) {
        match stmt {
            Stmt::Null
            | Stmt::Import(_)
            | Stmt::StructDecl(_)
            | Stmt::Desc(_)
            | Stmt::Modifier(_)
            | Stmt::LoopControl(_)
            | Stmt::Return(_)
            | Stmt::For(_) => {}
            Stmt::Expression(expr_stmt) => {
                if let Some((target, _)) = expr_stmt.expr.as_var_assignment() {
                    if let Some(assign) = expr_stmt.assign {
                        if self.decls.var(target).modifiers.is_external()
                            || self.decls.var(target).input.is_some()
                        {
                            self.assigns[assign.index()].do_not_optimize = true;
                        }
                        self.process_assignment(AssignRef::Stmt(assign), Some(&expr_stmt.expr));
                    }
                } else if !self.expr_has_side_effects(&expr_stmt.expr) && !end_of_function {
                    self.release_deps_of_expr(&expr_stmt.expr);
                    *stmt = Stmt::Null;
                }
            }
            Stmt::VarDecl(id) => {
                let id = *id;
                if self.decls.var(id).modifiers.is_external() {
                    self.decls.var_mut(id).do_not_optimize = true;
                }
                self.process_assignment(AssignRef::Var(id), None);
            }
            Stmt::Input(id) => {
                if let Some(var) = self.decls.input(*id).var {
                    self.decls.var_mut(var).do_not_optimize = true;
                }
            }
            Stmt::FuncDecl(id) => self.visit_func_decl(*id),
            Stmt::Block(block) => {
                for inner in &mut block.stmts {
                    self.visit_stmt(inner, false);
                }
            }
            Stmt::If(if_stmt) => {
                if let Some(else_block) = &mut if_stmt.else_block {
                    for inner in &mut else_block.stmts {
                        self.visit_stmt(inner, false);
                    }
                }
                for inner in &mut if_stmt.then_block.stmts {
                    self.visit_stmt(inner, false);
                }
            }
            Stmt::While(while_stmt) => {
                for inner in &mut while_stmt.body.stmts {
                    self.visit_stmt(inner, false);
                }
            }
            Stmt::Section(section) => {
                for inner in &mut section.block.stmts {
                    self.visit_stmt(inner, false);
                }
            }
        }
    }

    fn visit_func_decl(&mut self, id: FuncId) {
        let params = self.decls.func(id).params.clone();
        for param in params {
            self.decls.var_mut(param).do_not_optimize = true;
        }

        if !self.decls.func(id).modifiers.is_external()
            && let Some(mut block) = self.decls.func_mut(id).block.take()
        {
            let last = block.stmts.len().saturating_sub(1);
            for (index, inner) in block.stmts.iter_mut().enumerate() {
                self.visit_stmt(inner, index == last);
            }
            self.decls.func_mut(id).block = Some(block);
        }

        self.process_func(id);
    }

    /// Dead functions cascade through their dependency edges.
    fn process_func(&mut self, id: FuncId) {
        if self.decls.func(id).use_count != 0
            || self.decls.func(id).modifiers.is_external()
            || self.decls.func(id).unused
        {
            return;
        }

        self.decls.func_mut(id).unused = true;

        let deps = self.decls.func(id).deps.clone();
        for dep in deps {
            self.decls.func_mut(dep).use_count -= 1;
            self.process_func(dep);
        }
    }

    fn use_count(&self, assign: AssignRef) -> i32 {
        match assign {
            AssignRef::Var(var) => self.decls.var(var).use_count,
            AssignRef::Stmt(id) => self.assigns[id.index()].use_count,
        }
    }

    fn do_not_optimize(&self, assign: AssignRef) -> bool {
        match assign {
            AssignRef::Var(var) => self.decls.var(var).do_not_optimize,
            AssignRef::Stmt(id) => self.assigns[id.index()].do_not_optimize,
        }
    }

    fn already_unused(&self, assign: AssignRef) -> bool {
        match assign {
            AssignRef::Var(var) => self.decls.var(var).unused,
            AssignRef::Stmt(id) => self.assigns[id.index()].unused,
        }
    }

    fn set_unused(&mut self, assign: AssignRef) {
        match assign {
            AssignRef::Var(var) => self.decls.var_mut(var).unused = true,
            AssignRef::Stmt(id) => self.assigns[id.index()].unused = true,
        }
    }

    fn set_keep_right(&mut self, assign: AssignRef) {
        match assign {
            AssignRef::Var(var) => self.decls.var_mut(var).keep_right = true,
            AssignRef::Stmt(id) => self.assigns[id.index()].keep_right = true,
        }
    }

    /// The expression an assignment stores; `stmt_expr` carries it for
    /// tracked expression statements.
    fn assignment_right(&self, assign: AssignRef, stmt_expr: Option<&Expr>) -> Option<Expr> {
        match assign {
            AssignRef::Var(var) => Some(self.decls.var(var).init.clone()),
            AssignRef::Stmt(_) => stmt_expr.and_then(|expr| match expr {
                Expr::Binary(binary) => Some(binary.right.clone()),
                _ => None,
            }),
        }
    }

    fn process_assignment(&mut self, assign: AssignRef, stmt_expr: Option<&Expr>) {
        if self.do_not_optimize(assign) || self.already_unused(assign) || self.use_count(assign) != 0 {
            return;
        }

        self.set_unused(assign);
        let Some(right) = self.assignment_right(assign, stmt_expr) else {
            return;
        };
        if self.expr_has_side_effects(&right) {
            self.set_keep_right(assign);
        } else {
            self.release_deps_of_expr(&right);
        }
    }

    /// Gives back the uses an expression held, cascading into assignments
    /// that drop to zero.
    fn release_deps_of_expr(&mut self, expr: &Expr) {
        let mut deps = Vec::new();
        collect_deps(expr, &mut deps);
        for dep in deps {
            match dep {
                AssignRef::Var(var) => self.decls.var_mut(var).use_count -= 1,
                AssignRef::Stmt(id) => self.assigns[id.index()].use_count -= 1,
            }
            // cascaded targets are declarations or already-walked stores;
            // stores keep their right side reachable through the tree, so a
            // missing statement expression only means no further cascade
            self.process_assignment(dep, None);
        }
    }

    fn expr_has_side_effects(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Null | Expr::Literal(_) | Expr::Member(_) => false,
            Expr::Binary(binary) => {
                binary.op.is_assignment()
                    || self.expr_has_side_effects(&binary.left)
                    || self.expr_has_side_effects(&binary.right)
            }
            Expr::Unary(unary) => self.expr_has_side_effects(&unary.expr),
            Expr::Subscript(subscript) => {
                self.expr_has_side_effects(&subscript.base) || self.expr_has_side_effects(&subscript.index)
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    if self.expr_has_side_effects(arg) {
                        return true;
                    }
                }
                let Expr::Member(member) = &call.base else { return true };
                let Resolved::Func(func) = member.resolved else { return true };
                if self.decls.func(func).modifiers.is_external() {
                    return true;
                }
                self.decls
                    .func(func)
                    .block
                    .as_ref()
                    .is_some_and(|block| block.stmts.iter().any(|stmt| self.stmt_has_side_effects(stmt)))
            }
            Expr::SizeOf(_) | Expr::Block(_) => false,
        }
    }

    fn stmt_has_side_effects(&self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Null | Stmt::Import(_) | Stmt::StructDecl(_) | Stmt::Input(_) | Stmt::Desc(_)
            | Stmt::Modifier(_) | Stmt::LoopControl(_) | Stmt::Return(_) | Stmt::For(_)
            | Stmt::FuncDecl(_) | Stmt::Section(_) => false,
            Stmt::Expression(expr_stmt) => {
                expr_stmt.expr.as_var_assignment().is_some() || self.expr_has_side_effects(&expr_stmt.expr)
            }
            Stmt::VarDecl(_) => true,
            Stmt::Block(block) => block.stmts.iter().any(|inner| self.stmt_has_side_effects(inner)),
            Stmt::If(if_stmt) => {
                self.expr_has_side_effects(&if_stmt.cond)
                    || if_stmt.then_block.stmts.iter().any(|s| self.stmt_has_side_effects(s))
                    || if_stmt
                        .else_block
                        .as_ref()
                        .is_some_and(|b| b.stmts.iter().any(|s| self.stmt_has_side_effects(s)))
            }
            Stmt::While(while_stmt) => {
                self.expr_has_side_effects(&while_stmt.cond)
                    || while_stmt.body.stmts.iter().any(|s| self.stmt_has_side_effects(s))
            }
        }
    }
}

fn collect_deps(expr: &Expr, deps: &mut Vec<AssignRef>) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Member(member) => deps.extend(member.deps.iter().copied()),
        Expr::Binary(binary) => {
            collect_deps(&binary.left, deps);
            collect_deps(&binary.right, deps);
        }
        Expr::Unary(unary) => collect_deps(&unary.expr, deps),
        Expr::Subscript(subscript) => {
            collect_deps(&subscript.base, deps);
            collect_deps(&subscript.index, deps);
        }
        Expr::Call(call) => {
            for arg in &call.args {
                collect_deps(arg, deps);
            }
        }
        Expr::SizeOf(_) | Expr::Block(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, Module, SectionKind, SectionStmt, VarDecl, make};
    use crate::passes::variable_deps;
    use crate::types::{Primitive, TypeRef};

    #[test]
    fn unread_stores_are_marked_unused() {
        let mut program = Program::default();
        let a = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(a).init = make::int(5, 1);

        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![Stmt::Section(Box::new(SectionStmt {
                line: 1,
                kind: SectionKind::Init,
                block: Block {
                    line: 1,
                    stmts: vec![
                        Stmt::VarDecl(a),
                        make::set_var(a, make::int(7, 2), 2),
                        make::set_var(a, make::int(9, 3), 3),
                    ],
                },
                properties: None,
                width: None,
                height: None,
                id: Some(crate::ast::SectionId(0)),
            }))],
        });

        variable_deps::run(&mut program);
        run(&mut program);

        assert!(program.decls.var(a).unused);
        let Stmt::Section(section) = &program.modules[0].stmts[0] else { panic!() };
        for stmt in &section.block.stmts[1..] {
            let Stmt::Expression(expr_stmt) = stmt else { panic!() };
            assert!(program.assigns[expr_stmt.assign.unwrap().index()].unused);
        }
    }

    #[test]
    fn input_backed_variables_are_pinned() {
        let mut program = Program::default();
        let input = program.decls.alloc_input(crate::ast::InputDecl::new(
            "gain".into(),
            None,
            crate::ast::Modifiers::default(),
            1,
        ));
        let var = program
            .decls
            .alloc_var(VarDecl::new("gain".into(), TypeRef::primitive(Primitive::Float, 1), 1));
        program.decls.var_mut(var).input = Some(input);
        program.decls.input_mut(input).var = Some(var);

        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![Stmt::Input(input)],
        });

        run(&mut program);
        assert!(program.decls.var(var).do_not_optimize);
        assert!(!program.decls.var(var).unused);
    }
}
