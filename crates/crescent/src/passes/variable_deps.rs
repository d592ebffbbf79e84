//! Computes which assignments can reach each variable use.
//!
//! Walking sections in execution order (function bodies entered through
//! their call sites, while-loop bodies visited twice, if-branches walked
//! independently and merged), an environment maps every variable to the set
//! of assignments that could be its current value. A use observing an
//! assignment it has not seen before bumps that assignment's use count; an
//! assignment whose predecessors live in a different section accumulates
//! into the set instead of replacing it, since the host may run the earlier
//! section again in between.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::ast::{
    AssignRef, Decls, Expr, Program, Resolved, SectionId, SectionKind, Stmt, VarId,
};

type Env = IndexMap<VarId, SmallVec<[AssignRef; 2]>>;

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);

    let mut ctx = Pass {
        decls: &mut program.decls,
        assigns: &mut program.assigns,
    };

    let mut env = Env::new();
    for module in &mut modules {
        for stmt in &mut module.stmts {
            let Stmt::Section(section) = stmt else { continue };
            let id = section.id.expect("sections are numbered before dependency analysis");

            ctx.visit_stmts(&mut section.block.stmts, &mut env, id);
            // sections other than @init can run any number of times
            if section.kind != SectionKind::Init {
                ctx.visit_stmts(&mut section.block.stmts, &mut env, id);
            }
        }
    }

    program.modules = modules;
}

struct Pass<'a> {
    decls: &'a mut Decls,
    assigns: &'a mut Vec<crate::ast::AssignInfo>,
}

impl Pass<'_> {
    fn visit_stmts(&mut self, stmts: &mut [Stmt], env: &mut Env, section: SectionId) {
        for stmt in stmts {
            self.visit_stmt(stmt, env, section);
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt, env: &mut Env, section: SectionId) {
        match stmt {
            Stmt::Null
            | Stmt::Import(_)
            | Stmt::StructDecl(_)
            | Stmt::FuncDecl(_)
            | Stmt::Input(_)
            | Stmt::Desc(_)
            | Stmt::Modifier(_)
            | Stmt::Section(_)
            | Stmt::LoopControl(_)
            | Stmt::Return(_)
            | Stmt::For(_) => {}
            Stmt::Expression(expr_stmt) => {
                if let Some((target, _)) = expr_stmt.expr.as_var_assignment() {
                    let assign = match expr_stmt.assign {
                        Some(assign) => assign,
                        None => {
                            let id = crate::ast::AssignId(u32::try_from(self.assigns.len()).unwrap());
                            self.assigns.push(crate::ast::AssignInfo::default());
                            expr_stmt.assign = Some(id);
                            id
                        }
                    };
                    self.assigns[assign.index()].section = Some(section);

                    let Expr::Binary(binary) = &mut expr_stmt.expr else { unreachable!() };
                    self.visit_expr(&mut binary.right, env, section);

                    // a predecessor in another section stays a live
                    // candidate; one in this section is plainly overwritten
                    let crosses_sections = env.get(&target).is_some_and(|deps| {
                        deps.iter().any(|dep| self.section_of(*dep) != Some(section))
                    });

                    let entry = env.entry(target).or_default();
                    if !crosses_sections {
                        entry.clear();
                    }
                    entry.push(AssignRef::Stmt(assign));
                } else {
                    self.visit_expr(&mut expr_stmt.expr, env, section);
                }
            }
            Stmt::VarDecl(id) => {
                let id = *id;
                self.decls.var_mut(id).section = Some(section);

                let mut init = self.decls.var_mut(id).init.take();
                self.visit_expr(&mut init, env, section);
                self.decls.var_mut(id).init = init;

                let entry = env.entry(id).or_default();
                entry.clear();
                entry.push(AssignRef::Var(id));
            }
            Stmt::Block(block) => self.visit_stmts(&mut block.stmts, env, section),
            Stmt::If(if_stmt) => {
                self.visit_expr(&mut if_stmt.cond, env, section);

                let mut other = env.clone();
                self.visit_stmts(&mut if_stmt.then_block.stmts, &mut other, section);
                if let Some(else_block) = &mut if_stmt.else_block {
                    self.visit_stmts(&mut else_block.stmts, env, section);
                }
                merge_env(env, &other);
            }
            Stmt::While(while_stmt) => {
                let before = env.clone();

                // approximate the fixed point with two rounds
                self.visit_expr(&mut while_stmt.cond, env, section);
                self.visit_stmts(&mut while_stmt.body.stmts, env, section);
                self.visit_expr(&mut while_stmt.cond, env, section);
                self.visit_stmts(&mut while_stmt.body.stmts, env, section);

                merge_env(env, &before);
            }
        }
    }

    fn section_of(&self, dep: AssignRef) -> Option<SectionId> {
        match dep {
            AssignRef::Var(var) => self.decls.var(var).section,
            AssignRef::Stmt(assign) => self.assigns[assign.index()].section,
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr, env: &mut Env, section: SectionId) {
        match expr {
            Expr::Null | Expr::Literal(_) => {}
            Expr::Member(member) => {
                let Resolved::Var(var) = member.resolved else { return };
                if self.decls.var(var).input.is_some() {
                    return;
                }
                let Some(deps) = env.get(&var) else {
                    // read before any assignment; nothing to charge
                    return;
                };

                // charge each assignment this use has not observed yet
                let deps = deps.clone();
                for dep in &deps {
                    if !member.deps.contains(dep) {
                        match *dep {
                            AssignRef::Var(decl) => self.decls.var_mut(decl).use_count += 1,
                            AssignRef::Stmt(assign) => self.assigns[assign.index()].use_count += 1,
                        }
                        member.deps.push(*dep);
                    }
                }
            }
            Expr::Binary(binary) => {
                self.visit_expr(&mut binary.left, env, section);
                self.visit_expr(&mut binary.right, env, section);
            }
            Expr::Unary(unary) => self.visit_expr(&mut unary.expr, env, section),
            Expr::Subscript(subscript) => {
                self.visit_expr(&mut subscript.base, env, section);
                self.visit_expr(&mut subscript.index, env, section);
            }
            Expr::Call(call) => {
                for arg in &mut call.args {
                    self.visit_expr(arg, env, section);
                }

                // walk the way control flows: enter the callee here
                let Expr::Member(member) = &call.base else { return };
                let Resolved::Func(func) = member.resolved else { return };
                if self.decls.func(func).modifiers.is_external() {
                    return;
                }

                let params = self.decls.func(func).params.clone();
                for param in params {
                    self.visit_param(param, env, section);
                }
                if let Some(mut block) = self.decls.func_mut(func).block.take() {
                    self.visit_stmts(&mut block.stmts, env, section);
                    self.decls.func_mut(func).block = Some(block);
                }
            }
            Expr::SizeOf(_) | Expr::Block(_) => {
                unreachable!("sizeof and block expressions were lowered before dependency analysis")
            }
        }
    }

    fn visit_param(&mut self, param: VarId, env: &mut Env, section: SectionId) {
        self.decls.var_mut(param).section = Some(section);
        let entry = env.entry(param).or_default();
        entry.clear();
        entry.push(AssignRef::Var(param));
    }
}

/// Union of the branch environments.
fn merge_env(env: &mut Env, other: &Env) {
    for (var, deps) in other {
        let entry = env.entry(*var).or_default();
        for dep in deps {
            if !entry.contains(dep) {
                entry.push(*dep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, Module, SectionStmt, VarDecl, make};
    use crate::types::{Primitive, TypeRef};

    fn section(kind: SectionKind, id: u32, stmts: Vec<Stmt>) -> Stmt {
        Stmt::Section(Box::new(SectionStmt {
            line: 1,
            kind,
            block: Block { line: 1, stmts },
            properties: None,
            width: None,
            height: None,
            id: Some(SectionId(id)),
        }))
    }

    #[test]
    fn dead_stores_collect_no_uses_and_the_live_one_is_charged() {
        let mut program = Program::default();
        let a = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(a).init = make::int(5, 1);
        let sink = program
            .decls
            .alloc_var(VarDecl::new("sink".into(), TypeRef::primitive(Primitive::Int, 1), 1));

        // @init { int a = 5; a = 7; a = 9; }  @block { sink = a + 1; }
        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![
                section(
                    SectionKind::Init,
                    0,
                    vec![
                        Stmt::VarDecl(a),
                        make::set_var(a, make::int(7, 2), 2),
                        make::set_var(a, make::int(9, 3), 3),
                    ],
                ),
                section(
                    SectionKind::Block,
                    1,
                    vec![
                        Stmt::VarDecl(sink),
                        make::set_var(
                            sink,
                            make::binary(crate::ast::BinaryOp::Add, make::var_read(a, 5), make::int(1, 5), 5),
                            5,
                        ),
                    ],
                ),
            ],
        });

        run(&mut program);

        // decl a=5 and a=7 were overwritten in the same section: no uses
        assert_eq!(program.decls.var(a).use_count, 0);

        let Stmt::Section(init) = &program.modules[0].stmts[0] else { panic!() };
        let Stmt::Expression(first_store) = &init.block.stmts[1] else { panic!() };
        let Stmt::Expression(last_store) = &init.block.stmts[2] else { panic!() };
        let first_info = &program.assigns[first_store.assign.unwrap().index()];
        let last_info = &program.assigns[last_store.assign.unwrap().index()];
        assert_eq!(first_info.use_count, 0);
        // the read in @block charges the surviving store exactly once even
        // though non-init sections are walked twice
        assert_eq!(last_info.use_count, 1);
    }
}
