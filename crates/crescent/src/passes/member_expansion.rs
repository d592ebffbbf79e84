//! Expands struct values into per-member scalar variables.
//!
//! Every struct-typed variable (locals, globals, parameters, the flattened
//! `__returnValue` slots) is instantiated into leaf variables named
//! `parent_member`. Member accesses collapse onto the leaf, whole-struct
//! assignments expand memberwise, struct-typed call arguments flatten into
//! their leaves, struct returns are read through the callee's expanded
//! `__returnValue`, indexing a struct pointer becomes stride arithmetic, and
//! `sizeof` collapses to the scalar slot count. Struct declarations
//! disappear from the tree afterwards.

use crate::{
    ast::{
        Block, Decls, Expr, ExprStmt, FuncId, Program, Stmt, StructId, SubscriptExpr, VarDecl, VarId, make,
    },
    error::{CompileError, CompileResult},
    types::{TypeModifier, scalar_size_of_type, struct_info_of_expr, struct_info_of_type, type_of_expr},
};

pub fn run(program: &mut Program) -> CompileResult<()> {
    // parameters first, so call sites and reassignment locals can reach the
    // incoming leaves in any module order
    for index in 0..program.decls.funcs.len() {
        expand_function_params(&mut program.decls, FuncId(u32::try_from(index).unwrap()));
    }

    let mut modules = std::mem::take(&mut program.modules);
    let result: CompileResult<()> = (|| {
        for module in &mut modules {
            let mut ctx = Pass {
                decls: &mut program.decls,
                file: module.path.clone(),
            };
            ctx.visit_stmts(&mut module.stmts)?;
        }
        Ok(())
    })();
    program.modules = modules;
    result
}

fn expand_function_params(decls: &mut Decls, func: FuncId) {
    let params = decls.func(func).params.clone();
    let mut expanded = Vec::with_capacity(params.len());
    for param in params {
        if struct_info_of_type(&decls.var(param).ty).effective.is_some() {
            instantiate(decls, param);
            for leaf in collect_leaves(decls, param) {
                decls.var_mut(leaf).param_of = Some(func);
                expanded.push(leaf);
            }
        } else {
            expanded.push(param);
        }
    }
    decls.func_mut(func).params = expanded;
}

/// Builds `sub_vars` for a struct-typed variable, recursively.
fn instantiate(decls: &mut Decls, var: VarId) {
    if !decls.var(var).sub_vars.is_empty() {
        return;
    }
    let Some(struct_id) = struct_info_of_type(&decls.var(var).ty).effective else {
        return;
    };

    let members = decls.strct(struct_id).members.clone();
    let mut sub_vars = Vec::with_capacity(members.len());
    for member in members {
        let name = format!("{}_{}", decls.var(var).name, decls.var(member).name);
        let ty = decls.var(member).ty.clone();
        let line = decls.var(var).line;
        let leaf = decls.alloc_var(VarDecl::new(name, ty, line));
        sub_vars.push(leaf);
    }
    decls.var_mut(var).sub_vars = sub_vars.clone();

    for leaf in sub_vars {
        instantiate(decls, leaf);
    }
}

/// All scalar leaves of a struct variable, in member order.
fn collect_leaves(decls: &Decls, var: VarId) -> Vec<VarId> {
    let mut leaves = Vec::new();
    collect_leaves_into(decls, var, &mut leaves);
    leaves
}

fn collect_leaves_into(decls: &Decls, var: VarId, leaves: &mut Vec<VarId>) {
    if decls.var(var).sub_vars.is_empty() {
        leaves.push(var);
        return;
    }
    for &sub in decls.var(var).sub_vars.clone().iter() {
        collect_leaves_into(decls, sub, leaves);
    }
}

/// A struct-valued location an assignment can read from or write to.
enum StructPlace {
    /// An instantiated struct variable.
    Var(VarId),
    /// A cell range behind a pointer: `base[index + k]` for each leaf `k`.
    Cells { base: Expr, index: Expr, size: u64 },
    /// A struct-returning call; reads go through the callee's return slot.
    Call(Expr, VarId),
}

struct Pass<'a> {
    decls: &'a mut Decls,
    file: String,
}

impl Pass<'_> {
    fn error(&self, message: impl Into<String>, line: u32) -> CompileError {
        CompileError::new(message, line, &self.file)
    }

    fn visit_stmts(&mut self, stmts: &mut Vec<Stmt>) -> CompileResult<()> {
        let mut index = 0;
        while index < stmts.len() {
            match &mut stmts[index] {
                Stmt::StructDecl(_) => stmts[index] = Stmt::Null,
                Stmt::VarDecl(id) => {
                    let id = *id;
                    if struct_info_of_type(&self.decls.var(id).ty).effective.is_some() {
                        let replacement = self.expand_var_decl(id)?;
                        stmts.splice(index..=index, replacement);
                        // freshly inserted leaf declarations need no revisit
                        continue;
                    }
                    let mut init = self.decls.var_mut(id).init.take();
                    self.visit_expr(&mut init)?;
                    self.decls.var_mut(id).init = init;
                }
                Stmt::FuncDecl(id) => {
                    let id = *id;
                    if let Some(mut block) = self.decls.func_mut(id).block.take() {
                        self.visit_stmts(&mut block.stmts)?;
                        self.decls.func_mut(id).block = Some(block);
                    }
                }
                Stmt::Expression(_) => {
                    let Stmt::Expression(mut expr_stmt) = stmts[index].take() else {
                        unreachable!()
                    };
                    let replacement = self.visit_expr_stmt(&mut expr_stmt)?;
                    stmts[index] = match replacement {
                        Some(stmt) => stmt,
                        None => Stmt::Expression(expr_stmt),
                    };
                }
                Stmt::Block(block) => {
                    let mut inner = std::mem::take(&mut block.stmts);
                    self.visit_stmts(&mut inner)?;
                    let Stmt::Block(block) = &mut stmts[index] else { unreachable!() };
                    block.stmts = inner;
                }
                Stmt::If(_) => {
                    let Stmt::If(mut if_stmt) = stmts[index].take() else { unreachable!() };
                    self.visit_expr(&mut if_stmt.cond)?;
                    self.visit_stmts(&mut if_stmt.then_block.stmts)?;
                    if let Some(else_block) = &mut if_stmt.else_block {
                        self.visit_stmts(&mut else_block.stmts)?;
                    }
                    stmts[index] = Stmt::If(if_stmt);
                }
                Stmt::While(_) => {
                    let Stmt::While(mut while_stmt) = stmts[index].take() else {
                        unreachable!()
                    };
                    self.visit_expr(&mut while_stmt.cond)?;
                    self.visit_stmts(&mut while_stmt.body.stmts)?;
                    stmts[index] = Stmt::While(while_stmt);
                }
                Stmt::Section(_) => {
                    let Stmt::Section(mut section) = stmts[index].take() else {
                        unreachable!()
                    };
                    self.visit_stmts(&mut section.block.stmts)?;
                    stmts[index] = Stmt::Section(section);
                }
                Stmt::Null
                | Stmt::Import(_)
                | Stmt::Input(_)
                | Stmt::Desc(_)
                | Stmt::Modifier(_)
                | Stmt::LoopControl(_)
                | Stmt::Return(_)
                | Stmt::For(_) => {}
            }
            index += 1;
        }
        Ok(())
    }

    /// Expands a struct-typed declaration into leaf declarations plus
    /// whatever its initializer requires.
    fn expand_var_decl(&mut self, id: VarId) -> CompileResult<Vec<Stmt>> {
        let line = self.decls.var(id).line;
        instantiate(self.decls, id);

        let mut init = self.decls.var_mut(id).init.take();
        let leaves = collect_leaves(self.decls, id);

        let mut stmts: Vec<Stmt> = leaves.iter().map(|&leaf| Stmt::VarDecl(leaf)).collect();

        if !init.is_null() {
            self.visit_expr(&mut init)?;
            let place = self.struct_place_of(init, line)?;
            stmts.extend(self.copy_into_leaves(&leaves, place, line));
        }

        Ok(stmts)
    }

    /// Classifies a struct-valued expression for memberwise copying.
    fn struct_place_of(&mut self, expr: Expr, line: u32) -> CompileResult<StructPlace> {
        match &expr {
            Expr::Member(member) => match member.resolved {
                crate::ast::Resolved::Var(var) if member.base.is_null() => {
                    instantiate(self.decls, var);
                    Ok(StructPlace::Var(var))
                }
                _ => Err(self.error("Struct values can only come from variables or function calls", line)),
            },
            Expr::Call(call) => {
                let func = call_target(call);
                let Some(slot) = self.decls.func(func).return_value else {
                    return Err(
                        self.error("Struct values can only come from variables or function calls", line)
                    );
                };
                instantiate(self.decls, slot);
                Ok(StructPlace::Call(expr, slot))
            }
            Expr::Subscript(subscript) => {
                let info = struct_info_of_expr(self.decls, &subscript.base);
                let Some(struct_id) = pointee_struct(self.decls, info) else {
                    return Err(
                        self.error("Struct values can only come from variables or function calls", line)
                    );
                };
                let size = self.struct_size(struct_id);
                let Expr::Subscript(subscript) = expr else { unreachable!() };
                Ok(StructPlace::Cells {
                    base: subscript.base,
                    index: scaled_index(subscript.index, size, line),
                    size,
                })
            }
            _ => Err(self.error("Struct values can only come from variables or function calls", line)),
        }
    }

    fn struct_size(&self, struct_id: StructId) -> u64 {
        scalar_size_of_type(self.decls, &crate::types::TypeRef::to_struct(struct_id))
    }

    /// Scalar read expressions for every leaf of a struct place. For calls,
    /// the call itself is pushed as a statement first.
    fn leaf_reads(&mut self, place: StructPlace, count: usize, line: u32, stmts: &mut Vec<Stmt>) -> Vec<Expr> {
        match place {
            StructPlace::Var(var) => collect_leaves(self.decls, var)
                .into_iter()
                .map(|leaf| make::var_read(leaf, line))
                .collect(),
            StructPlace::Cells { base, index, .. } => (0..count as u64)
                .map(|offset| cell_read(base.clone(), index.clone(), offset, line))
                .collect(),
            StructPlace::Call(call, slot) => {
                stmts.push(Stmt::Expression(ExprStmt::new(call, line)));
                collect_leaves(self.decls, slot)
                    .into_iter()
                    .map(|leaf| make::var_read(leaf, line))
                    .collect()
            }
        }
    }

    fn copy_into_leaves(&mut self, leaves: &[VarId], source: StructPlace, line: u32) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        let reads = self.leaf_reads(source, leaves.len(), line, &mut stmts);
        for (&leaf, read) in leaves.iter().zip(reads) {
            stmts.push(make::set_var(leaf, read, line));
        }
        stmts
    }

    /// Handles an expression statement; returns a replacement when the
    /// statement expands into several.
    fn visit_expr_stmt(&mut self, expr_stmt: &mut ExprStmt) -> CompileResult<Option<Stmt>> {
        let line = expr_stmt.line;
        self.visit_expr(&mut expr_stmt.expr)?;

        // whole-struct assignment expands memberwise
        if let Expr::Binary(binary) = &expr_stmt.expr
            && binary.op == crate::ast::BinaryOp::Assign
            && struct_info_of_expr(self.decls, &binary.left).effective.is_some()
        {
            let Expr::Binary(binary) = expr_stmt.expr.take() else { unreachable!() };

            let target = self.struct_place_of(binary.left, line)?;
            let source = self.struct_place_of(binary.right, line)?;

            let mut stmts = Vec::new();
            match target {
                StructPlace::Var(var) => {
                    let leaves = collect_leaves(self.decls, var);
                    stmts.extend(self.copy_into_leaves(&leaves, source, line));
                }
                StructPlace::Cells { base, index, size } => {
                    let reads = self.leaf_reads(source, size as usize, line, &mut stmts);
                    for (offset, read) in reads.into_iter().enumerate() {
                        stmts.push(crate::ast::make::assign_stmt(
                            cell_read(base.clone(), index.clone(), offset as u64, line),
                            read,
                            line,
                        ));
                    }
                }
                StructPlace::Call(..) => {
                    return Err(self.error("Left operand of assignment must be a variable", line));
                }
            }
            return Ok(Some(Stmt::Block(Block { line, stmts })));
        }

        // a bare struct read has no effect once expanded
        if let Expr::Member(member) = &expr_stmt.expr
            && member.base.is_null()
            && struct_info_of_expr(self.decls, &expr_stmt.expr).effective.is_some()
        {
            return Ok(Some(Stmt::Null));
        }

        Ok(None)
    }

    fn visit_expr(&mut self, expr: &mut Expr) -> CompileResult<()> {
        match expr {
            Expr::Null | Expr::Literal(_) => Ok(()),
            Expr::Binary(binary) => {
                self.visit_expr(&mut binary.left)?;
                self.visit_expr(&mut binary.right)
            }
            Expr::Unary(unary) => self.visit_expr(&mut unary.expr),
            Expr::Subscript(subscript) => {
                self.visit_expr(&mut subscript.base)?;
                self.visit_expr(&mut subscript.index)
            }
            Expr::SizeOf(_) => {
                let Expr::SizeOf(sizeof) = expr.take() else { unreachable!() };
                let ty = match &sizeof.ty {
                    Some(ty) => ty.clone(),
                    None => type_of_expr(self.decls, &sizeof.expr),
                };
                *expr = make::int(scalar_size_of_type(self.decls, &ty), sizeof.line);
                Ok(())
            }
            Expr::Call(call) => {
                for arg in &mut call.args {
                    self.visit_expr(arg)?;
                }
                self.flatten_struct_args(call)
            }
            Expr::Member(_) => self.collapse_member_access(expr),
            Expr::Block(block) => self.visit_stmts(&mut block.block.stmts),
        }
    }

    /// Struct-valued arguments become one argument per leaf.
    fn flatten_struct_args(&mut self, call: &mut crate::ast::CallExpr) -> CompileResult<()> {
        let line = call.line;
        let mut flattened = Vec::with_capacity(call.args.len());
        for arg in call.args.drain(..) {
            if struct_info_of_expr(self.decls, &arg).effective.is_none() {
                flattened.push(arg);
                continue;
            }
            let place = self.struct_place_of(arg, line)?;
            if matches!(place, StructPlace::Call(..)) {
                return Err(self.error("Struct arguments must be variables", line));
            }
            let count = match &place {
                StructPlace::Var(var) => collect_leaves(self.decls, *var).len(),
                StructPlace::Cells { size, .. } => *size as usize,
                StructPlace::Call(..) => unreachable!(),
            };
            let mut no_stmts = Vec::new();
            flattened.extend(self.leaf_reads(place, count, line, &mut no_stmts));
            debug_assert!(no_stmts.is_empty());
        }
        call.args = flattened;
        Ok(())
    }

    /// Rewrites a resolved member chain onto its instantiated leaf, or into
    /// stride arithmetic when the chain starts at a subscript.
    fn collapse_member_access(&mut self, expr: &mut Expr) -> CompileResult<()> {
        let Expr::Member(member) = expr else { unreachable!() };
        self.visit_expr(&mut member.base)?;

        let leaf = match member.resolved {
            crate::ast::Resolved::Var(var) => var,
            _ => return Ok(()),
        };

        // chain rooted in a declared variable: walk the instantiated tree
        if let Some(root) = member.root_var {
            instantiate(self.decls, root);

            let mut current = root;
            let path: Vec<VarId> = member.parents.iter().copied().chain(std::iter::once(leaf)).collect();
            for template in path {
                let Some(struct_id) = struct_info_of_type(&self.decls.var(current).ty).effective else {
                    break;
                };
                let position = self
                    .decls
                    .strct(struct_id)
                    .members
                    .iter()
                    .position(|&m| m == template)
                    .expect("member template belongs to its struct");
                current = self.decls.var(current).sub_vars[position];
            }

            let line = member.line;
            *expr = make::var_read(current, line);
            return Ok(());
        }

        // chain rooted in a subscript on a struct pointer: stride arithmetic
        if let Expr::Subscript(_) = &member.base {
            let line = member.line;
            let Expr::Member(mut member) = expr.take() else { unreachable!() };
            let Expr::Subscript(subscript) = member.base.take() else { unreachable!() };

            let info = struct_info_of_expr(self.decls, &subscript.base);
            let Some(struct_id) = pointee_struct(self.decls, info) else {
                *expr = cell_read(subscript.base, subscript.index, 0, line);
                return Ok(());
            };

            let size = self.struct_size(struct_id);
            let (offset, _) = self.template_offset(struct_id, &member.parents, leaf);

            *expr = cell_read(subscript.base, scaled_index(subscript.index, size, line), offset, line);
            return Ok(());
        }

        Ok(())
    }

    /// Scalar offset of a member template path inside a struct.
    fn template_offset(&self, struct_id: StructId, parents: &[VarId], leaf: VarId) -> (u64, StructId) {
        let mut offset = 0u64;
        let mut current = struct_id;
        for template in parents.iter().copied().chain(std::iter::once(leaf)) {
            for &member in &self.decls.strct(current).members {
                if member == template {
                    break;
                }
                offset += scalar_size_of_type(self.decls, &self.decls.var(member).ty);
            }
            if let Some(next) = struct_info_of_type(&self.decls.var(template).ty).effective {
                current = next;
            }
        }
        (offset, current)
    }
}

fn call_target(call: &crate::ast::CallExpr) -> FuncId {
    match &call.base {
        Expr::Member(member) => match member.resolved {
            crate::ast::Resolved::Func(func) => func,
            _ => unreachable!("calls resolve to functions"),
        },
        _ => unreachable!("calls resolve to functions"),
    }
}

fn pointee_struct(decls: &Decls, info: crate::types::StructInfo) -> Option<StructId> {
    // indexing an array type dereferences through its ptr member
    if let Some(id) = info.effective {
        if decls.strct(id).is_array_type {
            let ptr_member = decls.strct(id).members[crate::ast::ARRAY_PTR_MEMBER];
            return struct_info_of_type(&decls.var(ptr_member).ty).pointer;
        }
        return Some(id);
    }
    if info.is_pointer {
        return info.pointer;
    }
    None
}

/// `index * size`, left alone when the stride is one.
fn scaled_index(index: Expr, size: u64, line: u32) -> Expr {
    if size == 1 {
        index
    } else {
        make::binary(crate::ast::BinaryOp::Multiply, index, make::int(size, line), line)
    }
}

/// `base[index + offset]`.
fn cell_read(base: Expr, index: Expr, offset: u64, line: u32) -> Expr {
    let index = if offset == 0 {
        index
    } else {
        make::binary(crate::ast::BinaryOp::Add, index, make::int(offset, line), line)
    };
    Expr::Subscript(Box::new(SubscriptExpr {
        line,
        base,
        index,
        type_before_collapse: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{MemberAccessExpr, Modifiers, Resolved, StructDecl};
    use crate::types::{Primitive, TypeRef};

    fn vec2(decls: &mut Decls) -> (StructId, VarId, VarId) {
        let x = decls.alloc_var(VarDecl::new("x".into(), TypeRef::primitive(Primitive::Float, 1), 1));
        let y = decls.alloc_var(VarDecl::new("y".into(), TypeRef::primitive(Primitive::Float, 1), 1));
        let id = decls.alloc_struct(StructDecl {
            line: 1,
            name: "V".into(),
            members: vec![x, y],
            modifiers: Modifiers::default(),
            is_array_type: false,
        });
        (id, x, y)
    }

    #[test]
    fn struct_decl_expands_into_leaves() {
        let mut program = Program::default();
        let (struct_id, _, _) = vec2(&mut program.decls);
        let v = program.decls.alloc_var(VarDecl::new("v".into(), TypeRef::to_struct(struct_id), 2));

        let mut pass = Pass {
            decls: &mut program.decls,
            file: "test.cres".into(),
        };
        let mut stmts = vec![Stmt::VarDecl(v)];
        pass.visit_stmts(&mut stmts).unwrap();

        assert_eq!(stmts.len(), 2);
        let Stmt::VarDecl(first) = stmts[0] else { panic!() };
        let Stmt::VarDecl(second) = stmts[1] else { panic!() };
        assert_eq!(program.decls.var(first).name, "v_x");
        assert_eq!(program.decls.var(second).name, "v_y");
    }

    #[test]
    fn member_access_collapses_to_leaf() {
        let mut program = Program::default();
        let (struct_id, x_template, _) = vec2(&mut program.decls);
        let v = program.decls.alloc_var(VarDecl::new("v".into(), TypeRef::to_struct(struct_id), 2));
        instantiate(&mut program.decls, v);

        let mut expr = Expr::Member(Box::new(MemberAccessExpr {
            line: 3,
            resolved: Resolved::Var(x_template),
            root_var: Some(v),
            ..MemberAccessExpr::default()
        }));

        let mut pass = Pass {
            decls: &mut program.decls,
            file: "test.cres".into(),
        };
        pass.visit_expr(&mut expr).unwrap();

        let Expr::Member(member) = &expr else { panic!() };
        let Resolved::Var(leaf) = member.resolved else { panic!() };
        assert_eq!(pass.decls.var(leaf).name, "v_x");
    }

    #[test]
    fn whole_struct_assignment_expands_memberwise() {
        let mut program = Program::default();
        let (struct_id, _, _) = vec2(&mut program.decls);
        let a = program.decls.alloc_var(VarDecl::new("a".into(), TypeRef::to_struct(struct_id), 2));
        let b = program.decls.alloc_var(VarDecl::new("b".into(), TypeRef::to_struct(struct_id), 2));

        let mut stmts = vec![
            Stmt::VarDecl(a),
            Stmt::VarDecl(b),
            make::assign_stmt(make::var_read(a, 3), make::var_read(b, 3), 3),
        ];
        let mut pass = Pass {
            decls: &mut program.decls,
            file: "test.cres".into(),
        };
        pass.visit_stmts(&mut stmts).unwrap();

        // 2 leaf decls per struct + a block of two leaf assignments
        let Stmt::Block(block) = &stmts[4] else {
            panic!("expected assignment block, got {:?}", stmts[4])
        };
        assert_eq!(block.stmts.len(), 2);
        for stmt in &block.stmts {
            let Stmt::Expression(expr_stmt) = stmt else { panic!() };
            assert!(expr_stmt.expr.as_var_assignment().is_some());
        }
    }

    #[test]
    fn sizeof_lowers_to_slot_count() {
        let mut program = Program::default();
        let (struct_id, _, _) = vec2(&mut program.decls);

        let mut expr = Expr::SizeOf(Box::new(crate::ast::SizeOfExpr {
            line: 1,
            expr: Expr::Null,
            ty: Some(TypeRef::to_struct(struct_id)),
        }));
        let mut pass = Pass {
            decls: &mut program.decls,
            file: "test.cres".into(),
        };
        pass.visit_expr(&mut expr).unwrap();

        assert!(matches!(
            &expr,
            Expr::Literal(l) if l.kind == crate::ast::LiteralKind::Number("2".into())
        ));
    }
}
