//! Inserts the explicit conversions the flat target needs.
//!
//! Every operator receives operands whose runtime value kind matches the
//! typed tree: truncation toward zero is spelled `| 0`, boolean
//! normalization `!!`, compound assignments expand to `x = x op y`, prefix
//! `++`/`--` become compound assignments, and every initializer-less
//! declaration gains a zero initializer so the writer can always emit
//! `name = value;`.

use crate::{
    ast::{BinaryOp, Decls, Expr, FuncId, LiteralKind, Program, Resolved, Stmt, UnaryOp, VarId, make},
    error::{CompileError, CompileResult},
    types::{Primitive, PrimitiveInfo, primitive_info_of_type},
};

pub fn run(program: &mut Program) -> CompileResult<()> {
    let mut modules = std::mem::take(&mut program.modules);

    let result: CompileResult<()> = (|| {
        for module in &mut modules {
            let mut ctx = Pass {
                decls: &mut program.decls,
                file: module.path.clone(),
            };
            for stmt in &mut module.stmts {
                ctx.visit_stmt(stmt)?;
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

impl Pass<'_> {
    fn error(&self, message: impl Into<String>, line: u32) -> CompileError {
        CompileError::new(message, line, &self.file)
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Null
            | Stmt::Import(_)
            | Stmt::Input(_)
            | Stmt::Desc(_)
            | Stmt::StructDecl(_)
            | Stmt::Modifier(_) => Ok(()),
            Stmt::Expression(expr_stmt) => {
                self.visit_expr(&mut expr_stmt.expr)?;
                Ok(())
            }
            Stmt::VarDecl(id) => self.visit_var_decl(*id, true),
            Stmt::FuncDecl(id) => self.visit_func_decl(*id),
            Stmt::Block(block) => {
                for inner in &mut block.stmts {
                    self.visit_stmt(inner)?;
                }
                Ok(())
            }
            Stmt::If(if_stmt) => {
                self.visit_stmt_block(&mut if_stmt.then_block.stmts)?;
                if let Some(else_block) = &mut if_stmt.else_block {
                    self.visit_stmt_block(&mut else_block.stmts)?;
                }
                let line = if_stmt.line;
                let info = self.visit_expr(&mut if_stmt.cond)?;
                self.convert(&mut if_stmt.cond, info, PrimitiveInfo::plain(Primitive::Bool), line)
            }
            Stmt::While(while_stmt) => {
                self.visit_stmt_block(&mut while_stmt.body.stmts)?;
                let line = while_stmt.line;
                let info = self.visit_expr(&mut while_stmt.cond)?;
                self.convert(&mut while_stmt.cond, info, PrimitiveInfo::plain(Primitive::Bool), line)
            }
            Stmt::Section(section) => self.visit_stmt_block(&mut section.block.stmts),
            Stmt::Return(_) | Stmt::LoopControl(_) | Stmt::For(_) => {
                unreachable!("control flow was flattened before type conversion")
            }
        }
    }

    fn visit_stmt_block(&mut self, stmts: &mut [Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_func_decl(&mut self, id: FuncId) -> CompileResult<()> {
        let params = self.decls.func(id).params.clone();
        for param in params {
            self.visit_var_decl(param, false)?;
        }

        if let Some(mut block) = self.decls.func_mut(id).block.take() {
            let result = self.visit_stmt_block(&mut block.stmts);
            self.decls.func_mut(id).block = Some(block);
            result?;
        }
        Ok(())
    }

    fn visit_var_decl(&mut self, id: VarId, add_initializer: bool) -> CompileResult<()> {
        let line = self.decls.var(id).line;
        let target = primitive_info_of_type(&self.decls.var(id).ty);

        if add_initializer && !self.decls.var(id).modifiers.is_external() && self.decls.var(id).init.is_null() {
            self.decls.var_mut(id).init = match target.effective {
                Primitive::Bool => make::boolean(false, line),
                _ => make::int(0, line),
            };
        }

        let mut init = self.decls.var_mut(id).init.take();
        if !init.is_null() {
            let info = self.visit_expr(&mut init)?;
            self.convert(&mut init, info, target, line)?;
        }
        self.decls.var_mut(id).init = init;
        Ok(())
    }

    // ---- expressions -------------------------------------------------------

    fn visit_expr(&mut self, expr: &mut Expr) -> CompileResult<PrimitiveInfo> {
        match expr {
            Expr::Null => Ok(PrimitiveInfo::plain(Primitive::Void)),
            Expr::Literal(literal) => {
                let info = match &literal.kind {
                    LiteralKind::Number(text) => {
                        if text.contains('.') {
                            PrimitiveInfo::plain(Primitive::Float)
                        } else {
                            PrimitiveInfo::plain(Primitive::Int)
                        }
                    }
                    LiteralKind::Str(_) => PrimitiveInfo::plain(Primitive::Str),
                    LiteralKind::Bool(value) => {
                        literal.kind = LiteralKind::Number(u64::from(*value).to_string());
                        PrimitiveInfo::plain(Primitive::Bool)
                    }
                    LiteralKind::Primitive(_) => PrimitiveInfo::plain(Primitive::Any),
                };
                Ok(info)
            }
            Expr::Member(member) => {
                let info = match member.resolved {
                    Resolved::Var(var) => primitive_info_of_type(&self.decls.var(var).ty),
                    Resolved::Func(func) => primitive_info_of_type(&self.decls.func(func).ty),
                    _ => PrimitiveInfo::plain(Primitive::Any),
                };
                Ok(info)
            }
            Expr::Binary(_) => self.visit_binary(expr),
            Expr::Unary(_) => self.visit_unary(expr),
            Expr::Call(_) => self.visit_call(expr),
            Expr::Subscript(subscript) => {
                let line = subscript.line;
                let base_info = self.visit_expr(&mut subscript.base)?;
                self.convert(
                    &mut subscript.base,
                    base_info,
                    PrimitiveInfo::plain(Primitive::Int),
                    line,
                )?;

                let index_info = self.visit_expr(&mut subscript.index)?;
                self.convert(
                    &mut subscript.index,
                    index_info,
                    PrimitiveInfo::plain(Primitive::Int),
                    line,
                )?;

                if let Some(saved) = &subscript.type_before_collapse {
                    Ok(primitive_info_of_type(saved))
                } else if base_info.is_pointer {
                    Ok(PrimitiveInfo::plain(base_info.pointer))
                } else {
                    Ok(PrimitiveInfo::plain(Primitive::Any))
                }
            }
            Expr::Block(_) | Expr::SizeOf(_) => {
                unreachable!("block expressions and sizeof were lowered before type conversion")
            }
        }
    }

    fn visit_binary(&mut self, expr: &mut Expr) -> CompileResult<PrimitiveInfo> {
        let Expr::Binary(binary) = expr else { unreachable!() };
        let line = binary.line;
        let op = binary.op;

        // compound assignment: x op= y  =>  x = x op y
        if let Some(base) = op.compound_base() {
            let left_copy = binary.left.clone();
            let right = binary.right.take();
            binary.right = make::binary(base, left_copy, right, line);
            binary.op = BinaryOp::Assign;
            return self.visit_binary(expr);
        }

        let left_info = self.visit_expr(&mut binary.left)?;
        let right_info = self.visit_expr(&mut binary.right)?;

        let float = PrimitiveInfo::plain(Primitive::Float);
        let boolean = PrimitiveInfo::plain(Primitive::Bool);

        match op {
            BinaryOp::IsEqual | BinaryOp::NotEqual => {
                let comparable = left_info.effective == right_info.effective
                    || matches!(
                        (left_info.effective, right_info.effective),
                        (Primitive::Int, Primitive::Float)
                            | (Primitive::Float, Primitive::Int)
                            | (Primitive::Any, _)
                            | (_, Primitive::Any)
                    );
                if !comparable {
                    return Err(self.error(
                        format!(
                            "Cannot use operator \"{op}\" on type \"{}\" and \"{}\"",
                            left_info.effective, right_info.effective
                        ),
                        line,
                    ));
                }
                Ok(boolean)
            }

            BinaryOp::BoolAnd | BinaryOp::BoolOr => {
                self.convert(&mut binary.left, left_info, boolean, line)?;
                self.convert(&mut binary.right, right_info, boolean, line)?;
                Ok(boolean)
            }

            BinaryOp::GreaterThan | BinaryOp::GreaterOrEqual | BinaryOp::LessThan | BinaryOp::LessOrEqual => {
                self.convert(&mut binary.left, left_info, float, line)?;
                self.convert(&mut binary.right, right_info, float, line)?;
                Ok(boolean)
            }

            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Exponent => {
                self.convert(&mut binary.left, left_info, float, line)?;
                self.convert(&mut binary.right, right_info, float, line)?;

                let both_int =
                    left_info.effective == Primitive::Int && right_info.effective == Primitive::Int;

                // integer division and exponentiation truncate toward zero
                if both_int && matches!(op, BinaryOp::Divide | BinaryOp::Exponent) {
                    let inner = expr.take();
                    *expr = make::int_conversion(inner, line);
                }

                if both_int && !matches!(op, BinaryOp::Divide | BinaryOp::Exponent) {
                    Ok(PrimitiveInfo::plain(Primitive::Int))
                } else {
                    Ok(float)
                }
            }

            BinaryOp::Modulo
            | BinaryOp::LeftShift
            | BinaryOp::RightShift
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::Xor => {
                self.convert(&mut binary.left, left_info, float, line)?;
                self.convert(&mut binary.right, right_info, float, line)?;

                // the operator works in the float domain; the result is
                // truncated to yield an int
                if !is_int_conversion(expr) {
                    let inner = expr.take();
                    *expr = make::int_conversion(inner, line);
                }
                Ok(PrimitiveInfo::plain(Primitive::Int))
            }

            BinaryOp::Assign => {
                if !matches!(binary.left, Expr::Member(_) | Expr::Subscript(_) | Expr::Call(_)) {
                    return Err(self.error("Left operand of assignment must be a variable", line));
                }
                self.convert(&mut binary.right, right_info, left_info, line)?;
                Ok(left_info)
            }

            _ => unreachable!("compound assignment handled above"),
        }
    }

    fn visit_unary(&mut self, expr: &mut Expr) -> CompileResult<PrimitiveInfo> {
        let Expr::Unary(unary) = expr else { unreachable!() };
        let line = unary.line;

        match unary.op {
            UnaryOp::Increment | UnaryOp::Decrement => {
                let op = if unary.op == UnaryOp::Increment {
                    BinaryOp::AddAssign
                } else {
                    BinaryOp::SubtractAssign
                };
                let inner = unary.expr.take();
                *expr = make::binary(op, inner, make::int(1, line), line);
                self.visit_binary(expr)
            }
            UnaryOp::Minus | UnaryOp::Plus => {
                let info = self.visit_expr(&mut unary.expr)?;
                self.convert(&mut unary.expr, info, PrimitiveInfo::plain(Primitive::Float), line)?;
                Ok(info)
            }
            UnaryOp::Negate => {
                let info = self.visit_expr(&mut unary.expr)?;
                self.convert(&mut unary.expr, info, PrimitiveInfo::plain(Primitive::Bool), line)?;
                Ok(PrimitiveInfo::plain(Primitive::Bool))
            }
            UnaryOp::Dereference => unreachable!("dereference was desugared by the resolver"),
        }
    }

    fn visit_call(&mut self, expr: &mut Expr) -> CompileResult<PrimitiveInfo> {
        let Expr::Call(call) = expr else { unreachable!() };
        let line = call.line;

        let func = match &call.base {
            Expr::Member(member) => match member.resolved {
                Resolved::Func(func) => func,
                _ => unreachable!("calls resolve to functions"),
            },
            _ => unreachable!("calls resolve to functions"),
        };

        let params = self.decls.func(func).params.clone();
        let result = primitive_info_of_type(&self.decls.func(func).ty);

        for (index, arg) in call.args.iter_mut().enumerate() {
            let target = match params.get(index) {
                Some(&param) => primitive_info_of_type(&self.decls.var(param).ty),
                None => PrimitiveInfo::plain(Primitive::Any),
            };
            let info = self.visit_expr(arg)?;
            self.convert(arg, info, target, line)?;
        }

        Ok(result)
    }

    fn convert(
        &self,
        expr: &mut Expr,
        from: PrimitiveInfo,
        target: PrimitiveInfo,
        line: u32,
    ) -> CompileResult<()> {
        if from.effective == Primitive::Void || target.effective == Primitive::Void {
            return Err(self.conversion_error(from, target, line));
        }

        // `any` is compatible with everything in both directions
        if from.effective == Primitive::Any
            || target.effective == Primitive::Any
            || (!from.pointer_is_struct && from.pointer == Primitive::Any)
            || (!target.pointer_is_struct && target.pointer == Primitive::Any)
        {
            return Ok(());
        }

        if from.effective == target.effective
            && from.pointer == target.pointer
            && from.is_pointer == target.is_pointer
        {
            return Ok(());
        }

        match target.effective {
            Primitive::Float => {
                if from.effective != Primitive::Int {
                    return Err(self.conversion_error(from, target, line));
                }
                Ok(())
            }
            Primitive::Int => {
                if from.is_pointer && target.is_pointer && from.pointer != target.pointer {
                    return Err(self.conversion_error(from, target, line));
                }
                if !matches!(from.effective, Primitive::Float | Primitive::Int) {
                    return Err(self.conversion_error(from, target, line));
                }
                let inner = expr.take();
                *expr = make::int_conversion(inner, line);
                Ok(())
            }
            Primitive::Bool => {
                if !matches!(from.effective, Primitive::Float | Primitive::Int) {
                    return Err(self.conversion_error(from, target, line));
                }
                let inner = expr.take();
                *expr = make::bool_conversion(inner, line);
                Ok(())
            }
            _ => Err(self.conversion_error(from, target, line)),
        }
    }

    fn conversion_error(&self, from: PrimitiveInfo, target: PrimitiveInfo, line: u32) -> CompileError {
        self.error(format!("Cannot convert type \"{from}\" to \"{target}\""), line)
    }
}

/// Whether the expression already is a `x | 0` truncation.
fn is_int_conversion(expr: &Expr) -> bool {
    if let Expr::Binary(binary) = expr
        && binary.op == BinaryOp::BitOr
        && let Expr::Literal(literal) = &binary.right
        && literal.kind == LiteralKind::Number("0".into())
    {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprStmt, Module, VarDecl};
    use crate::types::TypeRef;

    fn pass_over(decls: &mut Decls, stmt: &mut Stmt) -> CompileResult<()> {
        let mut pass = Pass {
            decls,
            file: "test.cres".into(),
        };
        pass.visit_stmt(stmt)
    }

    fn int_var(decls: &mut Decls, name: &str) -> VarId {
        decls.alloc_var(VarDecl::new(name.into(), TypeRef::primitive(Primitive::Int, 1), 1))
    }

    fn float_var(decls: &mut Decls, name: &str) -> VarId {
        decls.alloc_var(VarDecl::new(name.into(), TypeRef::primitive(Primitive::Float, 1), 1))
    }

    #[test]
    fn integer_division_is_truncated() {
        let mut decls = Decls::default();
        let a = int_var(&mut decls, "a");
        let b = int_var(&mut decls, "b");
        let target = int_var(&mut decls, "t");

        let mut stmt = make::assign_stmt(
            make::var_read(target, 1),
            make::binary(BinaryOp::Divide, make::var_read(a, 1), make::var_read(b, 1), 1),
            1,
        );
        pass_over(&mut decls, &mut stmt).unwrap();

        // t = ((a / b) | 0)
        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        let Expr::Binary(assign) = &expr_stmt.expr else { panic!() };
        let Expr::Binary(wrap) = &assign.right else { panic!() };
        assert_eq!(wrap.op, BinaryOp::BitOr);
        assert!(matches!(&wrap.left, Expr::Binary(div) if div.op == BinaryOp::Divide));
    }

    #[test]
    fn float_to_int_assignment_truncates() {
        let mut decls = Decls::default();
        let f = float_var(&mut decls, "f");
        let i = int_var(&mut decls, "i");

        let mut stmt = make::assign_stmt(make::var_read(i, 1), make::var_read(f, 1), 1);
        pass_over(&mut decls, &mut stmt).unwrap();

        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        let Expr::Binary(assign) = &expr_stmt.expr else { panic!() };
        assert!(matches!(&assign.right, Expr::Binary(wrap) if wrap.op == BinaryOp::BitOr));
    }

    #[test]
    fn string_to_int_is_rejected() {
        let mut decls = Decls::default();
        let i = int_var(&mut decls, "i");

        let mut stmt = make::assign_stmt(
            make::var_read(i, 1),
            Expr::Literal(crate::ast::LiteralExpr {
                line: 1,
                kind: LiteralKind::Str("hello".into()),
            }),
            1,
        );
        let err = pass_over(&mut decls, &mut stmt).unwrap_err();
        assert_eq!(err.rendered_message(), "Cannot convert type \"string\" to \"int\"");
    }

    #[test]
    fn compound_assignment_expands() {
        let mut decls = Decls::default();
        let a = int_var(&mut decls, "a");

        let mut stmt = Stmt::Expression(ExprStmt::new(
            make::binary(BinaryOp::AddAssign, make::var_read(a, 1), make::int(2, 1), 1),
            1,
        ));
        pass_over(&mut decls, &mut stmt).unwrap();

        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        let Expr::Binary(assign) = &expr_stmt.expr else { panic!() };
        assert_eq!(assign.op, BinaryOp::Assign);
        let Expr::Binary(add) = &assign.right else { panic!() };
        assert_eq!(add.op, BinaryOp::Add);
    }

    #[test]
    fn prefix_increment_becomes_compound() {
        let mut decls = Decls::default();
        let a = int_var(&mut decls, "a");

        let mut stmt = Stmt::Expression(ExprStmt::new(
            make::unary(UnaryOp::Increment, make::var_read(a, 1), 1),
            1,
        ));
        pass_over(&mut decls, &mut stmt).unwrap();

        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        let Expr::Binary(assign) = &expr_stmt.expr else { panic!() };
        assert_eq!(assign.op, BinaryOp::Assign);
    }

    #[test]
    fn assignment_to_rvalue_is_rejected() {
        let mut decls = Decls::default();
        let mut stmt = Stmt::Expression(ExprStmt::new(
            make::binary(BinaryOp::Assign, make::int(1, 1), make::int(2, 1), 1),
            1,
        ));
        let err = pass_over(&mut decls, &mut stmt).unwrap_err();
        assert_eq!(err.rendered_message(), "Left operand of assignment must be a variable");
    }

    #[test]
    fn declarations_get_zero_initializers() {
        let mut program = Program::default();
        let var = int_var(&mut program.decls, "a");
        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![Stmt::VarDecl(var)],
        });

        run(&mut program).unwrap();
        assert!(matches!(
            &program.decls.var(var).init,
            Expr::Literal(l) if l.kind == LiteralKind::Number("0".into())
        ));
    }

    #[test]
    fn modulo_yields_int_even_for_floats() {
        let mut decls = Decls::default();
        let f = float_var(&mut decls, "f");
        let i = int_var(&mut decls, "i");

        // i = ((f % 2) | 0)
        let mut stmt = make::assign_stmt(
            make::var_read(i, 1),
            make::binary(BinaryOp::Modulo, make::var_read(f, 1), make::int(2, 1), 1),
            1,
        );
        pass_over(&mut decls, &mut stmt).unwrap();

        let Stmt::Expression(expr_stmt) = &stmt else { panic!() };
        let Expr::Binary(assign) = &expr_stmt.expr else { panic!() };
        let Expr::Binary(wrap) = &assign.right else { panic!() };
        assert_eq!(wrap.op, BinaryOp::BitOr);
        assert!(matches!(&wrap.left, Expr::Binary(b) if b.op == BinaryOp::Modulo));
    }
}
