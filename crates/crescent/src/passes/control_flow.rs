//! Flattens nonlocal control flow into a forward-only flag protocol.
//!
//! Every function body (user-written and outlined) and every section body is
//! wrapped so `return`, `break` and `continue` become assignments to
//! synthesized flag variables plus gated straight-line code:
//!
//! - a function grows `__return` (and `__returnValue` when non-void) ahead
//!   of its body and evaluates `__returnValue` at the end;
//! - a `while` is wrapped in a block declaring `__break`, its body leads
//!   with `__continue`, and its condition becomes `!__break && cond`;
//! - after the first statement that can transfer control, the rest of the
//!   block is gated behind `if (!__return)` or `if (__continue == false)`.

use crate::{
    ast::{
        Block, Decls, ExprStmt, FuncId, IfStmt, LoopControlKind, Program, Stmt, VarDecl, VarId, WhileStmt, make,
    },
    error::{CompileError, CompileResult},
    types::{Primitive, TypeRef},
};

const RETURN_FLAG: &str = "__return";
const RETURN_VALUE: &str = "__returnValue";
const BREAK_FLAG: &str = "__break";
const CONTINUE_FLAG: &str = "__continue";

pub fn run(program: &mut Program) -> CompileResult<()> {
    let mut modules = std::mem::take(&mut program.modules);

    let result: CompileResult<()> = (|| {
        for module in &mut modules {
            let mut ctx = Pass {
                decls: &mut program.decls,
                file: module.path.clone(),
            };
            for stmt in &mut module.stmts {
                ctx.visit_global_stmt(stmt)?;
            }
        }
        Ok(())
    })();

    program.modules = modules;
    result
}

struct Pass<'a> {
    decls: &'a mut Decls,
    file: String,
}

/// Loop context: the flag declarations of the innermost `while`.
#[derive(Clone, Copy)]
struct LoopFlags {
    break_flag: VarId,
    continue_flag: VarId,
}

#[derive(Clone, Copy)]
struct ReturnVars {
    return_flag: VarId,
    return_value: Option<VarId>,
}

impl Pass<'_> {
    fn error(&self, message: impl Into<String>, line: u32) -> CompileError {
        CompileError::new(message, line, &self.file)
    }

    fn visit_global_stmt(&mut self, stmt: &mut Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Section(section) => self.visit_function_block(&mut section.block, None, None),
            Stmt::FuncDecl(id) => self.visit_function_decl(*id),
            Stmt::Block(block) => {
                for inner in &mut block.stmts {
                    self.visit_global_stmt(inner)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn visit_function_decl(&mut self, id: FuncId) -> CompileResult<()> {
        let Some(mut block) = self.decls.func_mut(id).block.take() else {
            return Ok(());
        };

        let ty = self.decls.func(id).ty.clone();
        let result = self.visit_function_block(&mut block, Some(&ty), Some(id));
        self.decls.func_mut(id).block = Some(block);
        result
    }

    fn visit_function_block(
        &mut self,
        block: &mut Block,
        return_type: Option<&TypeRef>,
        func: Option<FuncId>,
    ) -> CompileResult<()> {
        let line = block.line;
        let is_void = return_type.is_none_or(TypeRef::is_void);

        // the body becomes an inner block behind the flag declarations
        let inner = Block {
            line,
            stmts: std::mem::take(&mut block.stmts),
        };
        let mut inner_stmt = Stmt::Block(inner);

        let return_flag = self.alloc_flag(RETURN_FLAG, line);
        let mut return_value = None;

        if !is_void {
            if !statement_returns(&inner_stmt, true) {
                return Err(self.error("Not all control paths return a value", line));
            }
            let ty = return_type.expect("non-void return type").clone();
            let value = self.decls.alloc_var(VarDecl::new(RETURN_VALUE.to_owned(), ty, line));
            return_value = Some(value);
        }

        let vars = ReturnVars {
            return_flag,
            return_value,
        };
        let Stmt::Block(inner_block) = &mut inner_stmt else { unreachable!() };
        self.visit_block(inner_block, vars, None, is_void)?;

        block.stmts.push(Stmt::VarDecl(return_flag));
        if let Some(value) = return_value {
            block.stmts.push(Stmt::VarDecl(value));
        }
        block.stmts.push(inner_stmt);
        if let Some(value) = return_value {
            block.stmts.push(Stmt::Expression(ExprStmt::new(make::var_read(value, 0), 0)));
        }

        if let Some(func) = func {
            self.decls.func_mut(func).return_value = return_value;
        }
        Ok(())
    }

    fn alloc_flag(&mut self, name: &str, line: u32) -> VarId {
        let mut decl = VarDecl::new(name.to_owned(), TypeRef::primitive(Primitive::Bool, line), line);
        decl.init = make::boolean(false, line);
        self.decls.alloc_var(decl)
    }

    fn visit_block(
        &mut self,
        block: &mut Block,
        return_vars: ReturnVars,
        loop_flags: Option<LoopFlags>,
        is_void: bool,
    ) -> CompileResult<()> {
        // gate everything after the first statement that can transfer
        // control; recursion gates the moved tail again
        for index in 1..block.stmts.len() {
            if !statement_returns(&block.stmts[index - 1], false) {
                continue;
            }

            let rest: Vec<Stmt> = block.stmts.drain(index..).collect();
            let cond = match loop_flags {
                None => make::unary(
                    crate::ast::UnaryOp::Negate,
                    make::var_read(return_vars.return_flag, 0),
                    0,
                ),
                Some(flags) => make::binary(
                    crate::ast::BinaryOp::IsEqual,
                    make::var_read(flags.continue_flag, 0),
                    make::boolean(false, 0),
                    0,
                ),
            };
            block.stmts.push(Stmt::If(Box::new(IfStmt {
                line: 0,
                cond,
                then_block: Block { line: 0, stmts: rest },
                else_block: None,
            })));
            break;
        }

        for index in 0..block.stmts.len() {
            let stmt = &mut block.stmts[index];
            match stmt {
                Stmt::Return(_) => {
                    let Stmt::Return(ret) = stmt.take() else { unreachable!() };
                    *stmt = self.rewrite_return(*ret, return_vars, loop_flags, is_void)?;
                }
                Stmt::LoopControl(_) => {
                    let Stmt::LoopControl(loop_control) = stmt.take() else {
                        unreachable!()
                    };
                    *stmt = self.rewrite_loop_control(&loop_control, loop_flags)?;
                }
                Stmt::Block(inner) => self.visit_block(inner, return_vars, loop_flags, is_void)?,
                Stmt::If(if_stmt) => {
                    self.visit_block(&mut if_stmt.then_block, return_vars, loop_flags, is_void)?;
                    if let Some(else_block) = &mut if_stmt.else_block {
                        self.visit_block(else_block, return_vars, loop_flags, is_void)?;
                    }
                }
                Stmt::While(_) => self.visit_while(stmt, return_vars, is_void)?,
                Stmt::FuncDecl(id) => self.visit_function_decl(*id)?,
                _ => {}
            }
        }

        Ok(())
    }

    fn visit_while(&mut self, stmt: &mut Stmt, return_vars: ReturnVars, is_void: bool) -> CompileResult<()> {
        let Stmt::While(mut while_stmt) = stmt.take() else {
            unreachable!("visit_while on a non-while statement");
        };
        let line = while_stmt.line;

        let flags = LoopFlags {
            break_flag: self.alloc_flag(BREAK_FLAG, line),
            continue_flag: self.alloc_flag(CONTINUE_FLAG, line),
        };

        while_stmt.body.stmts.insert(0, Stmt::VarDecl(flags.continue_flag));
        while_stmt.cond = make::binary(
            crate::ast::BinaryOp::BoolAnd,
            make::unary(crate::ast::UnaryOp::Negate, make::var_read(flags.break_flag, line), line),
            while_stmt.cond.take(),
            line,
        );

        self.visit_block(&mut while_stmt.body, return_vars, Some(flags), is_void)?;

        *stmt = Stmt::Block(Block {
            line,
            stmts: vec![Stmt::VarDecl(flags.break_flag), Stmt::While(while_stmt)],
        });
        Ok(())
    }

    fn rewrite_return(
        &mut self,
        ret: crate::ast::ReturnStmt,
        return_vars: ReturnVars,
        loop_flags: Option<LoopFlags>,
        is_void: bool,
    ) -> CompileResult<Stmt> {
        let line = ret.line;
        let mut stmts = vec![make::set_var(return_vars.return_flag, make::boolean(true, line), line)];

        if is_void {
            if !ret.expr.is_null() {
                return Err(self.error("Void function cannot return a value", line));
            }
        } else {
            if ret.expr.is_null() {
                return Err(self.error("Non-void function must return a value", line));
            }
            let value = return_vars.return_value.expect("non-void return slot");
            stmts.push(make::set_var(value, ret.expr, line));
        }

        if let Some(flags) = loop_flags {
            stmts.push(make::set_var(flags.continue_flag, make::boolean(true, line), line));
            stmts.push(make::set_var(flags.break_flag, make::boolean(true, line), line));
        }

        Ok(Stmt::Block(Block { line, stmts }))
    }

    fn rewrite_loop_control(
        &mut self,
        loop_control: &crate::ast::LoopControlStmt,
        loop_flags: Option<LoopFlags>,
    ) -> CompileResult<Stmt> {
        let line = loop_control.line;
        let Some(flags) = loop_flags else {
            return Err(self.error(
                match loop_control.kind {
                    LoopControlKind::Break => "\"break\" is not allowed here",
                    LoopControlKind::Continue => "\"continue\" is not allowed here",
                },
                line,
            ));
        };

        let mut stmts = vec![make::set_var(flags.continue_flag, make::boolean(true, line), line)];
        if loop_control.kind == LoopControlKind::Break {
            stmts.push(make::set_var(flags.break_flag, make::boolean(true, line), line));
        }

        Ok(Stmt::Block(Block { line, stmts }))
    }
}

/// Whether a statement transfers control: on every path (`all_paths`) or on
/// any path.
fn statement_returns(stmt: &Stmt, all_paths: bool) -> bool {
    match stmt {
        Stmt::Return(_) | Stmt::LoopControl(_) => true,
        Stmt::Block(block) => block.stmts.iter().any(|inner| statement_returns(inner, all_paths)),
        Stmt::If(if_stmt) => {
            let then_returns = if_stmt.then_block.stmts.iter().any(|s| statement_returns(s, all_paths));
            let else_returns = if_stmt
                .else_block
                .as_ref()
                .is_some_and(|b| b.stmts.iter().any(|s| statement_returns(s, all_paths)));
            if all_paths {
                then_returns && else_returns
            } else {
                then_returns || else_returns
            }
        }
        Stmt::While(while_stmt) => while_stmt.body.stmts.iter().any(|s| statement_returns(s, all_paths)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, LoopControlStmt, Module, ReturnOwner, ReturnStmt, SectionKind, SectionStmt};

    fn section_with(stmts: Vec<Stmt>) -> Program {
        let mut program = Program::default();
        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![Stmt::Section(Box::new(SectionStmt {
                line: 1,
                kind: SectionKind::Init,
                block: Block { line: 1, stmts },
                properties: None,
                width: None,
                height: None,
                id: None,
            }))],
        });
        program
    }

    fn contains_loop_control(stmt: &Stmt) -> bool {
        match stmt {
            Stmt::LoopControl(_) | Stmt::Return(_) => true,
            Stmt::Block(block) => block.stmts.iter().any(contains_loop_control),
            Stmt::If(if_stmt) => {
                if_stmt.then_block.stmts.iter().any(contains_loop_control)
                    || if_stmt
                        .else_block
                        .as_ref()
                        .is_some_and(|b| b.stmts.iter().any(contains_loop_control))
            }
            Stmt::While(while_stmt) => while_stmt.body.stmts.iter().any(contains_loop_control),
            Stmt::Section(section) => section.block.stmts.iter().any(contains_loop_control),
            _ => false,
        }
    }

    #[test]
    fn break_and_continue_become_flags() {
        let body = vec![
            Stmt::LoopControl(LoopControlStmt {
                line: 2,
                kind: LoopControlKind::Break,
            }),
            Stmt::LoopControl(LoopControlStmt {
                line: 3,
                kind: LoopControlKind::Continue,
            }),
        ];
        let mut program = section_with(vec![Stmt::While(Box::new(WhileStmt {
            line: 1,
            cond: make::boolean(true, 1),
            body: Block { line: 1, stmts: body },
        }))]);

        run(&mut program).unwrap();

        assert!(!program.modules[0].stmts.iter().any(contains_loop_control));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let mut program = section_with(vec![Stmt::LoopControl(LoopControlStmt {
            line: 4,
            kind: LoopControlKind::Break,
        })]);
        let err = run(&mut program).unwrap_err();
        assert_eq!(err.rendered_message(), "\"break\" is not allowed here");
        assert_eq!(err.line, Some(4));
    }

    #[test]
    fn return_with_value_in_section_is_rejected() {
        let mut program = section_with(vec![Stmt::Return(Box::new(ReturnStmt {
            line: 2,
            expr: make::int(1, 2),
            owner: ReturnOwner::Section,
        }))]);
        let err = run(&mut program).unwrap_err();
        assert_eq!(err.rendered_message(), "Void function cannot return a value");
    }

    #[test]
    fn bare_return_in_section_flattens() {
        let mut program = section_with(vec![
            Stmt::Return(Box::new(ReturnStmt {
                line: 2,
                expr: Expr::Null,
                owner: ReturnOwner::Section,
            })),
            Stmt::Expression(ExprStmt::new(make::int(1, 3), 3)),
        ]);
        run(&mut program).unwrap();
        assert!(!program.modules[0].stmts.iter().any(contains_loop_control));
    }

    #[test]
    fn statement_returns_all_paths_needs_both_branches() {
        let ret = || {
            Stmt::Return(Box::new(ReturnStmt {
                line: 1,
                expr: make::int(1, 1),
                owner: ReturnOwner::Untagged,
            }))
        };
        let only_then = Stmt::If(Box::new(IfStmt {
            line: 1,
            cond: make::boolean(true, 1),
            then_block: Block {
                line: 1,
                stmts: vec![ret()],
            },
            else_block: None,
        }));
        assert!(!statement_returns(&only_then, true));
        assert!(statement_returns(&only_then, false));

        let both = Stmt::If(Box::new(IfStmt {
            line: 1,
            cond: make::boolean(true, 1),
            then_block: Block {
                line: 1,
                stmts: vec![ret()],
            },
            else_block: Some(Block {
                line: 1,
                stmts: vec![ret()],
            }),
        }));
        assert!(statement_returns(&both, true));
    }
}
