//! Folds integer-literal subexpressions left behind by copy propagation.
//!
//! Only non-negative integer arithmetic folds; floats and anything with a
//! sign stay untouched. `lit | 0` collapses to the literal, which unwinds
//! truncations made redundant by folding.

use crate::ast::{BinaryOp, Decls, Expr, LiteralKind, Program, Stmt, UnaryOp, make};

pub fn run(program: &mut Program) {
    let mut modules = std::mem::take(&mut program.modules);
    for module in &mut modules {
        for stmt in &mut module.stmts {
            visit_stmt(stmt, &mut program.decls);
        }
    }
    program.modules = modules;
}

fn visit_stmt(stmt: &mut Stmt, decls: &mut Decls) {
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
        Stmt::Expression(expr_stmt) => {
            visit_expr(&mut expr_stmt.expr, decls);
        }
        Stmt::VarDecl(id) => {
            let id = *id;
            let mut init = decls.var_mut(id).init.take();
            visit_expr(&mut init, decls);
            decls.var_mut(id).init = init;
        }
        Stmt::FuncDecl(id) => {
            let id = *id;
            if let Some(mut block) = decls.func_mut(id).block.take() {
                for inner in &mut block.stmts {
                    visit_stmt(inner, decls);
                }
                decls.func_mut(id).block = Some(block);
            }
        }
        Stmt::Block(block) => {
            for inner in &mut block.stmts {
                visit_stmt(inner, decls);
            }
        }
        Stmt::If(if_stmt) => {
            visit_expr(&mut if_stmt.cond, decls);
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
            visit_expr(&mut while_stmt.cond, decls);
            for inner in &mut while_stmt.body.stmts {
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

fn int_value(expr: &Expr) -> Option<u64> {
    if let Expr::Literal(literal) = expr
        && let LiteralKind::Number(text) = &literal.kind
        && !text.contains('.')
        && !text.starts_with('-')
    {
        return text.parse().ok();
    }
    None
}

fn visit_expr(expr: &mut Expr, decls: &mut Decls) {
    match expr {
        Expr::Null | Expr::Literal(_) => {}
        Expr::Member(member) => visit_expr(&mut member.base, decls),
        Expr::Unary(unary) => {
            visit_expr(&mut unary.expr, decls);
            if unary.op == UnaryOp::Negate
                && let Some(value) = int_value(&unary.expr)
            {
                *expr = make::int(u64::from(value == 0), unary.line);
            }
        }
        Expr::Subscript(subscript) => {
            visit_expr(&mut subscript.base, decls);
            visit_expr(&mut subscript.index, decls);
        }
        Expr::Call(call) => {
            for arg in &mut call.args {
                visit_expr(arg, decls);
            }
        }
        Expr::SizeOf(sizeof) => visit_expr(&mut sizeof.expr, decls),
        Expr::Block(block) => {
            for inner in &mut block.block.stmts {
                visit_stmt(inner, decls);
            }
        }
        Expr::Binary(binary) => {
            visit_expr(&mut binary.left, decls);
            visit_expr(&mut binary.right, decls);

            if binary.op.is_assignment() {
                return;
            }
            let line = binary.line;
            let left = int_value(&binary.left);
            let right = int_value(&binary.right);

            // truncating an integer literal is a no-op
            if binary.op == BinaryOp::BitOr && right == Some(0) && left.is_some() {
                *expr = binary.left.take();
                return;
            }

            let (Some(a), Some(b)) = (left, right) else { return };
            let folded = match binary.op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => a.checked_div(b),
                BinaryOp::Modulo => a.checked_rem(b),
                BinaryOp::BitAnd => Some(a & b),
                BinaryOp::BitOr => Some(a | b),
                BinaryOp::Xor => Some(a ^ b),
                BinaryOp::LeftShift => (b < 64).then(|| a << b),
                BinaryOp::RightShift => (b < 64).then(|| a >> b),
                BinaryOp::BoolAnd => Some(u64::from(a != 0 && b != 0)),
                BinaryOp::BoolOr => Some(u64::from(a != 0 || b != 0)),
                BinaryOp::IsEqual => Some(u64::from(a == b)),
                BinaryOp::NotEqual => Some(u64::from(a != b)),
                BinaryOp::GreaterThan => Some(u64::from(a > b)),
                BinaryOp::GreaterOrEqual => Some(u64::from(a >= b)),
                BinaryOp::LessThan => Some(u64::from(a < b)),
                BinaryOp::LessOrEqual => Some(u64::from(a <= b)),
                _ => None,
            };
            if let Some(value) = folded {
                *expr = make::int(value, line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(mut expr: Expr) -> Expr {
        let mut decls = Decls::default();
        visit_expr(&mut expr, &mut decls);
        expr
    }

    fn number(expr: &Expr) -> Option<String> {
        if let Expr::Literal(literal) = expr
            && let LiteralKind::Number(text) = &literal.kind
        {
            return Some(text.clone());
        }
        None
    }

    #[test]
    fn folds_integer_arithmetic() {
        let expr = fold(make::binary(BinaryOp::Add, make::int(2, 1), make::int(3, 1), 1));
        assert_eq!(number(&expr), Some("5".into()));

        let expr = fold(make::binary(BinaryOp::Divide, make::int(5, 1), make::int(2, 1), 1));
        assert_eq!(number(&expr), Some("2".into()));
    }

    #[test]
    fn collapses_redundant_truncation() {
        let inner = make::binary(BinaryOp::Divide, make::int(5, 1), make::int(2, 1), 1);
        let expr = fold(make::int_conversion(inner, 1));
        assert_eq!(number(&expr), Some("2".into()));
    }

    #[test]
    fn leaves_floats_alone() {
        let lit = Expr::Literal(crate::ast::LiteralExpr {
            line: 1,
            kind: LiteralKind::Number("2.5".into()),
        });
        let expr = fold(make::binary(BinaryOp::Add, lit, make::int(1, 1), 1));
        assert!(matches!(expr, Expr::Binary(_)));
    }

    #[test]
    fn underflow_is_not_folded() {
        let expr = fold(make::binary(BinaryOp::Subtract, make::int(1, 1), make::int(2, 1), 1));
        assert!(matches!(expr, Expr::Binary(_)));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let expr = fold(make::binary(BinaryOp::Divide, make::int(1, 1), make::int(0, 1), 1));
        assert!(matches!(expr, Expr::Binary(_)));
    }
}
