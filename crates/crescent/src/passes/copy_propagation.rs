//! Propagates copies and constants within each section.
//!
//! A per-section map tracks the last value assigned to each variable when
//! that value is a plain variable read or a side-effect-free constant
//! expression. Uses rewrite to the propagated value; a function parameter
//! only propagates while the walk is inside that function. Function bodies
//! are entered through call sites: once with a fresh map to propagate
//! inside the callee, and once against the caller's map with rewriting
//! disabled, so assignments to globals inside the callee invalidate what
//! the caller knows.

use indexmap::IndexMap;

use crate::ast::{Decls, Expr, FuncId, LiteralKind, Program, Resolved, Stmt, VarId};

type CopyMap = IndexMap<VarId, CopyValue>;

#[derive(Debug, Clone)]
enum CopyValue {
    Var(VarId),
    Expr(Expr),
}

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);

    let mut ctx = Pass {
        decls: &mut program.decls,
        current_function: None,
    };

    for module in &mut modules {
        for stmt in &mut module.stmts {
            if let Stmt::Section(section) = stmt {
                let mut map = CopyMap::new();
                ctx.visit_stmts(&mut section.block.stmts, &mut map, true, true);
            }
        }
    }

    program.modules = modules;
}

struct Pass<'a> {
    decls: &'a mut Decls,
    current_function: Option<FuncId>,
}

impl Pass<'_> {
    fn visit_stmts(&mut self, stmts: &mut [Stmt], map: &mut CopyMap, modify_ast: bool, modify_map: bool) {
        for stmt in stmts {
            self.visit_stmt(stmt, map, modify_ast, modify_map);
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt, map: &mut CopyMap, modify_ast: bool, modify_map: bool) {
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
                if let Expr::Binary(binary) = &mut expr_stmt.expr
                    && binary.op == crate::ast::BinaryOp::Assign
                    && let Expr::Member(member) = &binary.left
                    && let Resolved::Var(target) = member.resolved
                {
                    self.visit_expr(&mut binary.right, map, modify_ast, modify_map);
                    if modify_map {
                        let right = binary.right.clone();
                        self.process_assignment(target, &right, map);
                    }
                } else {
                    self.visit_expr(&mut expr_stmt.expr, map, modify_ast, modify_map);
                }
            }
            Stmt::VarDecl(id) => {
                let id = *id;
                let mut init = self.decls.var_mut(id).init.take();
                self.visit_expr(&mut init, map, modify_ast, modify_map);
                if modify_map {
                    self.process_assignment(id, &init, map);
                }
                self.decls.var_mut(id).init = init;
            }
            Stmt::Block(block) => self.visit_stmts(&mut block.stmts, map, modify_ast, modify_map),
            Stmt::If(if_stmt) => {
                self.visit_expr(&mut if_stmt.cond, map, modify_ast, modify_map);

                let mut other = map.clone();
                if let Some(else_block) = &mut if_stmt.else_block {
                    self.visit_stmts(&mut else_block.stmts, &mut other, modify_ast, modify_map);
                }
                self.visit_stmts(&mut if_stmt.then_block.stmts, map, modify_ast, modify_map);
                merge(map, &other);
            }
            Stmt::While(while_stmt) => {
                let before = map.clone();

                // first round discovers what the body invalidates
                self.visit_expr(&mut while_stmt.cond, map, false, modify_map);
                self.visit_stmts(&mut while_stmt.body.stmts, map, false, modify_map);
                merge(map, &before);

                // second round rewrites against the stable map
                self.visit_expr(&mut while_stmt.cond, map, modify_ast, false);
                self.visit_stmts(&mut while_stmt.body.stmts, map, modify_ast, false);
            }
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr, map: &mut CopyMap, modify_ast: bool, modify_map: bool) {
        match expr {
            Expr::Null | Expr::Literal(_) => {}
            Expr::Member(member) => {
                if !modify_ast {
                    return;
                }
                let Resolved::Var(var) = member.resolved else { return };

                match map.get(&var) {
                    Some(CopyValue::Var(value)) => {
                        let value = *value;
                        let param_of = self.decls.var(value).param_of;
                        if param_of.is_none() || param_of == self.current_function {
                            member.resolved = Resolved::Var(value);
                        }
                    }
                    Some(CopyValue::Expr(value)) => {
                        *expr = value.clone();
                    }
                    None => {}
                }
            }
            Expr::Binary(binary) => {
                self.visit_expr(&mut binary.left, map, modify_ast, modify_map);
                self.visit_expr(&mut binary.right, map, modify_ast, modify_map);
            }
            Expr::Unary(unary) => self.visit_expr(&mut unary.expr, map, modify_ast, modify_map),
            Expr::Subscript(subscript) => {
                self.visit_expr(&mut subscript.base, map, modify_ast, modify_map);
                self.visit_expr(&mut subscript.index, map, modify_ast, modify_map);
            }
            Expr::Call(call) => {
                let func = match &call.base {
                    Expr::Member(member) => match member.resolved {
                        Resolved::Func(func) => func,
                        _ => return,
                    },
                    _ => return,
                };

                let external = self.decls.func(func).modifiers.is_external();
                for arg in &mut call.args {
                    // externals may write through their arguments
                    if external
                        && let Expr::Member(member) = arg
                        && let Resolved::Var(var) = member.resolved
                    {
                        delete_pairs_with(map, var);
                        continue;
                    }
                    self.visit_expr(arg, map, modify_ast, modify_map);
                }

                if external {
                    return;
                }

                // propagate inside the callee with its own map
                let saved = self.current_function.replace(func);
                if let Some(mut block) = self.decls.func_mut(func).block.take() {
                    let mut func_map = CopyMap::new();
                    self.visit_stmts(&mut block.stmts, &mut func_map, modify_ast, modify_map);
                    self.decls.func_mut(func).block = Some(block);
                }

                // then replay the body against the caller's map so callee
                // assignments invalidate it
                if let Some(mut block) = self.decls.func_mut(func).block.take() {
                    self.visit_stmts(&mut block.stmts, map, false, modify_map);
                    self.decls.func_mut(func).block = Some(block);
                }
                self.current_function = saved;
            }
            Expr::SizeOf(_) | Expr::Block(_) => {
                unreachable!("sizeof and block expressions were lowered before copy propagation")
            }
        }
    }

    fn process_assignment(&self, target: VarId, value: &Expr, map: &mut CopyMap) {
        delete_pairs_with(map, target);

        // host-driven slider values never propagate
        if self.decls.var(target).input.is_some() {
            return;
        }

        if let Expr::Member(member) = value
            && member.base.is_null()
            && let Resolved::Var(source) = member.resolved
            && source != target
        {
            map.insert(target, CopyValue::Var(source));
            return;
        }

        if !value.is_null() && is_constant(value) {
            map.insert(target, CopyValue::Expr(value.clone()));
        }
    }
}

fn delete_pairs_with(map: &mut CopyMap, var: VarId) {
    map.retain(|key, value| {
        if *key == var {
            return false;
        }
        !matches!(value, CopyValue::Var(source) if *source == var)
    });
}

/// Intersection merge after a branch: keep what both sides agree on.
fn merge(map: &mut CopyMap, other: &CopyMap) {
    map.retain(|key, value| match (other.get(key), value) {
        (Some(CopyValue::Var(a)), CopyValue::Var(b)) => a == b,
        (Some(CopyValue::Expr(a)), CopyValue::Expr(b)) => exprs_equal(a, b),
        _ => false,
    });
}

// conservative structural equality; only literals need to agree in practice
fn exprs_equal(a: &Expr, b: &Expr) -> bool {
    match (a, b) {
        (Expr::Literal(a), Expr::Literal(b)) => a.kind == b.kind,
        (Expr::Member(a), Expr::Member(b)) => a.resolved == b.resolved,
        _ => false,
    }
}

fn is_constant(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::Binary(binary) => {
            !binary.op.is_assignment() && is_constant(&binary.left) && is_constant(&binary.right)
        }
        Expr::Unary(unary) => is_constant(&unary.expr),
        _ => false,
    }
}
