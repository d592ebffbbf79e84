//! Name resolution, type attachment, and the resolver-level desugarings.
//!
//! Binds every identifier chain to its declaration, enforces visibility and
//! placement rules, synthesizes struct types for array declarations, expands
//! `input`/`desc`/section property lists, selects overloads and fills default
//! arguments at call sites, rewrites postfix `++`/`--` and `*p`, and rewrites
//! every function so its parameters are copied into body-locals (the flat
//! JSFX output treats all body variables as globals; real parameters are
//! function-local there).

use ahash::AHashMap;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{
    ast::{
        BlockExpr, Decls, DescStmt, Expr, ExprStmt, FuncId, GfxIdleMode, InputId, MemberAccessExpr, Modifiers, Module,
        PinList, Program, Property, PropertyKey, PropertyList, PropertyValue, Resolved, ReturnOwner, ReturnStmt,
        SectionKind, SectionStmt, SliderShape, Stmt, StructDecl, StructId, UnaryOp, VarDecl, VarId,
        ARRAY_PTR_MEMBER, make,
    },
    error::{CompileError, CompileResult},
    types::{Primitive, TypeExpr, TypeModifier, TypeRef, struct_info_of_expr, struct_info_of_type, type_of_expr},
};

/// Runs the resolver over the whole program.
pub fn run(program: &mut Program) -> CompileResult<()> {
    let mut modules = std::mem::take(&mut program.modules);

    let mut resolver = Resolver {
        decls: &mut program.decls,
        modules: IndexMap::new(),
        scopes: Vec::new(),
        file: String::new(),
        current_modifiers: Modifiers::default(),
        slider_number: 0,
        found_desc: false,
        array_structs: AHashMap::new(),
        pending_stmts: Vec::new(),
        func_stack: Vec::new(),
        in_section: false,
    };

    let result: CompileResult<()> = (|| {
        for module in &mut modules {
            resolver.visit_module(module)?;
        }
        Ok(())
    })();

    program.modules = modules;

    // default values have been copied into every call site; clearing them
    // keeps later passes from walking unreferenced expressions
    if result.is_ok() {
        for var in &mut program.decls.vars {
            if var.param_of.is_some() {
                var.init = crate::ast::Expr::Null;
            }
        }
    }
    result
}

type ScopeMap = IndexMap<String, SmallVec<[DeclRef; 1]>>;

#[derive(Debug, Clone)]
enum DeclRef {
    Var(VarId),
    Func(FuncId),
    Struct(StructId),
    Import { module: String, public: bool },
}

/// Key for interning synthesized array structs by element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ArrayKey {
    Primitive(Primitive),
    Struct(StructId),
}

/// The entity the member-access walk is currently standing on.
enum Entity {
    /// No base and no identifier consumed yet.
    Start,
    Var(VarId),
    Func(FuncId),
    Struct(StructId),
    Import { module: String, public: bool },
    Input(InputId, InputMember),
    /// Base expression of struct type (call, block expression, assignment).
    ExprOfStruct(Option<StructId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMember {
    None,
    Value,
    SliderNumber,
    Default,
    Min,
    Max,
    Inc,
    Name,
}

struct Resolver<'a> {
    decls: &'a mut Decls,
    /// Published module scopes, keyed by module name.
    modules: IndexMap<String, ScopeMap>,
    scopes: Vec<ScopeMap>,
    file: String,
    current_modifiers: Modifiers,
    slider_number: u32,
    found_desc: bool,
    array_structs: AHashMap<ArrayKey, StructId>,
    /// Synthesized struct declarations appended to the current module.
    pending_stmts: Vec<Stmt>,
    func_stack: Vec<FuncId>,
    in_section: bool,
}

impl Resolver<'_> {
    fn error(&self, message: impl Into<String>, line: u32) -> CompileError {
        CompileError::new(message, line, &self.file)
    }

    fn at_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    // ---- scopes ------------------------------------------------------------

    fn push_scope(&mut self) {
        self.scopes.push(ScopeMap::new());
    }

    fn pop_scope(&mut self) -> ScopeMap {
        self.scopes.pop().expect("scope underflow")
    }

    fn lookup(&self, name: &str) -> Option<&SmallVec<[DeclRef; 1]>> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn register(&mut self, name: &str, decl: DeclRef, line: u32) -> CompileResult<()> {
        let file = self.file.clone();
        let scope = self.scopes.last_mut().expect("no scope");

        if let Some(entries) = scope.get_mut(name) {
            let both_imports =
                matches!(decl, DeclRef::Import { .. }) && matches!(entries[0], DeclRef::Import { .. });
            if !matches!(decl, DeclRef::Func(_)) && !both_imports {
                return Err(CompileError::new(format!("\"{name}\" is already defined"), line, &file));
            }
            entries.push(decl);
        } else {
            scope.insert(name.to_owned(), std::iter::once(decl).collect());
        }
        Ok(())
    }

    /// Argument counts `func` accepts: `[required, max]`, max `None` when
    /// variadic.
    fn arity_range(&self, func: FuncId) -> (usize, Option<usize>) {
        let decl = self.decls.func(func);
        let required = decl
            .params
            .iter()
            .take_while(|&&param| self.decls.var(param).init.is_null())
            .count();
        let max = if decl.variadic { None } else { Some(decl.params.len()) };
        (required, max)
    }

    fn overload_matches(&self, func: FuncId, arg_count: usize) -> bool {
        let (required, max) = self.arity_range(func);
        arg_count >= required && max.is_none_or(|max| arg_count <= max)
    }

    fn find_overload_in(&self, entries: &[DeclRef], arg_count: usize) -> Option<FuncId> {
        entries.iter().find_map(|entry| match entry {
            DeclRef::Func(func) if self.overload_matches(*func, arg_count) => Some(*func),
            _ => None,
        })
    }

    // ---- modules -----------------------------------------------------------

    fn visit_module(&mut self, module: &mut Module) -> CompileResult<()> {
        self.current_modifiers = Modifiers::default();
        self.file.clone_from(&module.path);

        self.push_scope();
        let mut result = Ok(());
        for stmt in &mut module.stmts {
            result = self.visit_stmt(stmt);
            if result.is_err() {
                break;
            }
        }
        module.stmts.append(&mut self.pending_stmts);

        let scope = self.pop_scope();
        self.modules.insert(module.name.clone(), scope);
        result
    }

    // ---- statements --------------------------------------------------------

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Null | Stmt::LoopControl(_) => Ok(()),
            Stmt::VarDecl(id) => self.visit_var_decl(*id, false),
            Stmt::FuncDecl(id) => self.visit_func_decl(*id),
            Stmt::StructDecl(id) => self.visit_struct_decl(*id),
            Stmt::Block(block) => {
                self.push_scope();
                let result = self.visit_stmts(&mut block.stmts);
                self.pop_scope();
                result
            }
            Stmt::Expression(expr_stmt) => self.resolve_expr(&mut expr_stmt.expr, true, None),
            Stmt::Return(ret) => {
                ret.owner = match self.func_stack.last() {
                    Some(func) => ReturnOwner::Func(*func),
                    None if self.in_section => ReturnOwner::Section,
                    None => ReturnOwner::Untagged,
                };
                self.resolve_expr(&mut ret.expr, true, None)
            }
            Stmt::Section(section) => self.visit_section(section),
            Stmt::If(if_stmt) => {
                self.resolve_expr(&mut if_stmt.cond, true, None)?;
                self.push_scope();
                let result = self.visit_stmts(&mut if_stmt.then_block.stmts);
                self.pop_scope();
                result?;
                if let Some(else_block) = &mut if_stmt.else_block {
                    self.push_scope();
                    let result = self.visit_stmts(&mut else_block.stmts);
                    self.pop_scope();
                    result?;
                }
                Ok(())
            }
            Stmt::While(while_stmt) => {
                self.resolve_expr(&mut while_stmt.cond, true, None)?;
                self.push_scope();
                let result = self.visit_stmts(&mut while_stmt.body.stmts);
                self.pop_scope();
                result
            }
            Stmt::For(for_stmt) => {
                self.push_scope();
                let result: CompileResult<()> = (|| {
                    self.visit_stmt(&mut for_stmt.init)?;
                    self.resolve_expr(&mut for_stmt.cond, true, None)?;
                    self.resolve_expr(&mut for_stmt.incr, true, None)?;
                    self.visit_stmts(&mut for_stmt.body.stmts)
                })();
                self.pop_scope();
                result
            }
            Stmt::Import(import) => {
                let line = import.line;
                let mut modifiers = import.modifiers;
                self.apply_modifiers(&mut modifiers, line)?;
                import.modifiers = modifiers;

                if import.modifiers.is_external() {
                    return Err(self.error("Import statements can only be internal", line));
                }

                let module = import.module_name.clone();
                let public = import.modifiers.is_public();
                self.register_import(&module, public, line, true)
            }
            Stmt::Modifier(modifier) => {
                if !self.at_global_scope() {
                    return Err(self.error("Modifier statements are only allowed in global scope", modifier.line));
                }
                if modifier.state.public_specified {
                    self.current_modifiers.public_specified = true;
                    self.current_modifiers.public_value = modifier.state.public_value;
                }
                if modifier.state.external_specified {
                    self.current_modifiers.external_specified = true;
                    self.current_modifiers.external_value = modifier.state.external_value;
                }
                *stmt = Stmt::Null;
                Ok(())
            }
            Stmt::Input(id) => self.visit_input(*id),
            Stmt::Desc(desc) => self.visit_desc(desc),
        }
    }

    fn visit_stmts(&mut self, stmts: &mut [Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn apply_modifiers(&self, modifiers: &mut Modifiers, line: u32) -> CompileResult<()> {
        if self.at_global_scope() {
            if self.current_modifiers.public_specified && !modifiers.public_specified {
                modifiers.public_value = self.current_modifiers.public_value;
            }
            if self.current_modifiers.external_specified && !modifiers.external_specified {
                modifiers.external_value = self.current_modifiers.external_value;
            }
        } else if modifiers.public_specified || modifiers.external_specified {
            return Err(self.error("Declarations with modifiers must be in global scope", line));
        }
        Ok(())
    }

    fn register_import(&mut self, module: &str, public: bool, line: u32, top_level: bool) -> CompileResult<()> {
        self.register(
            &module.to_owned(),
            DeclRef::Import {
                module: module.to_owned(),
                public,
            },
            line,
        )?;

        if public || top_level {
            // re-exported imports become visible too
            let nested: Vec<(String, bool)> = self
                .modules
                .get(module)
                .map(|exports| {
                    exports
                        .values()
                        .filter_map(|entries| match &entries[0] {
                            DeclRef::Import {
                                module: nested,
                                public: true,
                            } => Some((nested.clone(), true)),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();

            for (nested, nested_public) in nested {
                self.register_import(&nested, nested_public, line, false)?;
            }
        }
        Ok(())
    }

    // ---- declarations ------------------------------------------------------

    fn visit_var_decl(&mut self, id: VarId, is_public_api: bool) -> CompileResult<()> {
        let line = self.decls.var(id).line;

        let mut modifiers = self.decls.var(id).modifiers;
        self.apply_modifiers(&mut modifiers, line)?;
        self.decls.var_mut(id).modifiers = modifiers;

        if modifiers.is_external() {
            if !self.decls.var(id).init.is_null() {
                return Err(self.error("External variables cannot have initializers", line));
            }
        } else if self.decls.var(id).external_name.is_some() {
            return Err(self.error("Only external variables can have external names", line));
        }

        let mut init = self.decls.var_mut(id).init.take();
        self.resolve_expr(&mut init, true, None)?;
        self.decls.var_mut(id).init = init;

        let mut ty = self.decls.var(id).ty.clone();
        self.resolve_type(&mut ty, false, modifiers.is_public() || is_public_api, None)?;
        self.decls.var_mut(id).ty = ty;

        let name = self.decls.var(id).name.clone();
        self.register(&name, DeclRef::Var(id), line)?;

        if modifiers.is_external() {
            let ty = &self.decls.var(id).ty;
            let is_any = struct_info_of_type(ty).effective.is_none()
                && matches!(ty.expr, TypeExpr::Primitive(Primitive::Any, _))
                && ty.modifier == TypeModifier::None;
            if !is_any {
                return Err(self.error("External variables must be of type \"any\"", line));
            }
        }

        Ok(())
    }

    fn visit_func_decl(&mut self, id: FuncId) -> CompileResult<()> {
        let line = self.decls.func(id).line;

        let mut modifiers = self.decls.func(id).modifiers;
        self.apply_modifiers(&mut modifiers, line)?;
        self.decls.func_mut(id).modifiers = modifiers;

        if modifiers.is_external() {
            if self.decls.func(id).block.is_some() {
                return Err(self.error("External functions cannot have code blocks", line));
            }
        } else {
            if self.decls.func(id).external_name.is_some() {
                return Err(self.error("Only external functions can have external names", line));
            }
            if self.decls.func(id).block.is_none() {
                return Err(self.error("Expected code block after function declaration", line));
            }
            if self.decls.func(id).variadic {
                return Err(self.error("Only external functions can be variadic functions", line));
            }
        }

        let is_public_api = modifiers.is_public();
        let mut ty = self.decls.func(id).ty.clone();
        self.resolve_type(&mut ty, true, is_public_api, None)?;
        self.decls.func_mut(id).ty = ty;

        if modifiers.is_external() {
            let ty = &self.decls.func(id).ty;
            let ok = struct_info_of_type(ty).effective.is_none()
                && ty.modifier == TypeModifier::None
                && matches!(
                    ty.expr,
                    TypeExpr::Primitive(Primitive::Any | Primitive::Void, _)
                );
            if !ok {
                return Err(
                    self.error("The return type of an external function must be of type \"void\" or \"any\"", line)
                );
            }
        }

        self.push_scope();
        let result = self.visit_func_decl_inner(id, modifiers, is_public_api, line);
        self.pop_scope();
        result?;

        let name = self.decls.func(id).name.clone();
        self.register(&name, DeclRef::Func(id), line)?;
        self.check_overload_ambiguity(id, &name, line)
    }

    fn visit_func_decl_inner(
        &mut self,
        id: FuncId,
        modifiers: Modifiers,
        is_public_api: bool,
        line: u32,
    ) -> CompileResult<()> {
        let params = self.decls.func(id).params.clone();
        let mut seen_default = false;
        for &param in &params {
            self.visit_var_decl(param, is_public_api)?;

            if modifiers.is_external() {
                let ty = &self.decls.var(param).ty;
                let is_any = struct_info_of_type(ty).effective.is_none()
                    && matches!(ty.expr, TypeExpr::Primitive(Primitive::Any, _))
                    && ty.modifier == TypeModifier::None;
                if !is_any {
                    return Err(self.error("All parameters in an external function must be of type \"any\"", line));
                }
            }

            if self.decls.var(param).init.is_null() {
                if seen_default {
                    return Err(self.error("Default parameters must be at the end of the parameter list", line));
                }
            } else {
                seen_default = true;
            }
        }

        if self.decls.func(id).block.is_some() {
            let mut block = self.decls.func_mut(id).block.take().expect("function block");
            self.func_stack.push(id);
            let result = self.visit_stmts(&mut block.stmts);
            self.func_stack.pop();
            result?;

            // copy each parameter into a body-local so that the flattened
            // output can treat all body variables as globals
            for (index, &param) in params.iter().enumerate() {
                let incoming = {
                    let old = self.decls.var(param);
                    let mut copy = VarDecl::new(old.name.clone(), old.ty.clone(), old.line);
                    copy.init = old.init.clone();
                    copy.modifiers = old.modifiers;
                    copy.param_of = Some(id);
                    self.decls.alloc_var(copy)
                };

                let local = self.decls.var_mut(param);
                local.init = make::var_read(incoming, local.line);
                local.param_of = None;

                block.stmts.insert(index, Stmt::VarDecl(param));
                self.decls.func_mut(id).params[index] = incoming;
            }

            self.decls.func_mut(id).block = Some(block);
        }

        Ok(())
    }

    fn check_overload_ambiguity(&self, id: FuncId, name: &str, line: u32) -> CompileResult<()> {
        let scope = self.scopes.last().expect("no scope");
        let Some(entries) = scope.get(name) else {
            return Ok(());
        };

        let (required, max) = self.arity_range(id);
        for entry in entries.iter() {
            let DeclRef::Func(other) = entry else { continue };
            if *other == id {
                continue;
            }
            let (other_required, other_max) = self.arity_range(*other);
            let overlap = match (max, other_max) {
                (None, None) => true,
                (None, Some(other_max)) => other_max >= required,
                (Some(max), None) => max >= other_required,
                (Some(max), Some(other_max)) => required <= other_max && other_required <= max,
            };
            if overlap {
                return Err(self.error(
                    format!("Function declaration \"{name}\" is ambiguous with another overload"),
                    line,
                ));
            }
        }
        Ok(())
    }

    fn visit_struct_decl(&mut self, id: StructId) -> CompileResult<()> {
        let line = self.decls.strct(id).line;

        let mut modifiers = self.decls.strct(id).modifiers;
        self.apply_modifiers(&mut modifiers, line)?;
        self.decls.strct_mut(id).modifiers = modifiers;

        if modifiers.is_external() {
            return Err(self.error("Struct declarations can only be internal", line));
        }
        if self.decls.strct(id).is_array_type {
            return Ok(());
        }
        if self.decls.strct(id).members.is_empty() {
            return Err(self.error("Cannot define an empty struct", line));
        }

        let name = self.decls.strct(id).name.clone();
        self.register(&name, DeclRef::Struct(id), line)?;

        self.push_scope();
        let result: CompileResult<()> = (|| {
            let members = self.decls.strct(id).members.clone();
            for member in members {
                self.visit_var_decl(member, modifiers.is_public())?;
                if struct_info_of_type(&self.decls.var(member).ty).effective == Some(id) {
                    return Err(self.error(
                        "Struct member causes a cycle in the struct layout",
                        self.decls.var(member).line,
                    ));
                }
            }
            Ok(())
        })();
        self.pop_scope();
        result
    }

    fn visit_section(&mut self, section: &mut SectionStmt) -> CompileResult<()> {
        self.set_section_properties(section)?;

        self.push_scope();
        self.in_section = true;
        let result = self.visit_stmts(&mut section.block.stmts);
        self.in_section = false;
        self.pop_scope();
        result
    }

    // ---- types -------------------------------------------------------------

    /// Resolves a type in place. With `out_is_type`, a named path that does
    /// not name a struct reports `false` instead of erroring (the `sizeof`
    /// ambiguity).
    fn resolve_type(
        &mut self,
        ty: &mut TypeRef,
        void_allowed: bool,
        is_public_api: bool,
        out_is_type: Option<&mut bool>,
    ) -> CompileResult<()> {
        if let Some(flag) = out_is_type {
            *flag = true;
            match &ty.expr {
                TypeExpr::Named { idents, line, .. } => {
                    let mut access = MemberAccessExpr {
                        line: *line,
                        idents: idents.clone().into(),
                        ..MemberAccessExpr::default()
                    };
                    match self.walk_member_access(&mut access, None, is_public_api) {
                        Ok(Entity::Struct(_)) => {}
                        _ => {
                            *flag = false;
                            return Ok(());
                        }
                    }
                }
                TypeExpr::Primitive(..) => {}
            }
        }

        match &mut ty.expr {
            TypeExpr::Named { line, idents, resolved } => {
                let line = *line;
                let mut access = MemberAccessExpr {
                    line,
                    idents: idents.clone().into(),
                    ..MemberAccessExpr::default()
                };
                match self.walk_member_access(&mut access, None, is_public_api)? {
                    Entity::Struct(id) => {
                        if is_public_api && !self.decls.strct(id).modifiers.is_public() {
                            return Err(
                                self.error("Private types are not allowed in public declarations", line)
                            );
                        }
                        *resolved = Some(id);
                    }
                    _ => return Err(self.error("Expression is not a type", line)),
                }
            }
            TypeExpr::Primitive(primitive, line) => {
                if !void_allowed && *primitive == Primitive::Void {
                    return Err(self.error("\"void\" is not allowed here", *line));
                }
            }
        }

        self.change_array_type_to_struct(ty);
        Ok(())
    }

    fn change_array_type_to_struct(&mut self, ty: &mut TypeRef) {
        if ty.modifier != TypeModifier::Array {
            return;
        }
        if matches!(ty.expr, TypeExpr::Primitive(Primitive::Void, _)) {
            return;
        }

        let key = match &ty.expr {
            TypeExpr::Primitive(primitive, _) => ArrayKey::Primitive(*primitive),
            TypeExpr::Named { resolved, .. } => {
                ArrayKey::Struct((*resolved).expect("array element type must be resolved"))
            }
        };

        let id = match self.array_structs.get(&key) {
            Some(id) => *id,
            None => {
                let mut ptr_ty = ty.clone();
                ptr_ty.modifier = TypeModifier::Pointer;
                let ptr = self.decls.alloc_var(VarDecl::new("ptr".to_owned(), ptr_ty, 0));
                let length = self
                    .decls
                    .alloc_var(VarDecl::new("length".to_owned(), TypeRef::primitive(Primitive::Int, 0), 0));

                let mut members = vec![VarId(0); 2];
                members[crate::ast::ARRAY_PTR_MEMBER] = ptr;
                members[crate::ast::ARRAY_LENGTH_MEMBER] = length;

                let id = self.decls.alloc_struct(StructDecl {
                    line: 0,
                    name: String::new(),
                    members,
                    modifiers: Modifiers {
                        public_specified: true,
                        public_value: true,
                        external_specified: false,
                        external_value: false,
                    },
                    is_array_type: true,
                });
                self.array_structs.insert(key, id);
                self.pending_stmts.push(Stmt::StructDecl(id));
                id
            }
        };

        *ty = TypeRef::to_struct(id);
    }

    // ---- expressions -------------------------------------------------------

    fn resolve_expr(&mut self, expr: &mut Expr, check_value: bool, call_args: Option<usize>) -> CompileResult<()> {
        match expr {
            Expr::Null | Expr::Literal(_) => Ok(()),
            Expr::Member(member) => {
                // synthesized accesses arrive pre-resolved
                if !matches!(member.resolved, Resolved::Unresolved) {
                    return Ok(());
                }
                self.resolve_member_access(expr, call_args, false)?;
                if check_value
                    && let Expr::Member(member) = expr
                    && !matches!(member.resolved, Resolved::Var(_))
                    && call_args.is_none()
                {
                    return Err(self.error("Expression is not a variable or value", member.line));
                }
                Ok(())
            }
            Expr::Binary(binary) => {
                self.resolve_expr(&mut binary.left, true, None)?;
                self.resolve_expr(&mut binary.right, true, None)
            }
            Expr::Unary(unary) => {
                if unary.op == UnaryOp::Dereference {
                    let line = unary.line;
                    let inner = unary.expr.take();
                    *expr = Expr::Subscript(Box::new(crate::ast::SubscriptExpr {
                        line,
                        base: inner,
                        index: make::int(0, line),
                        type_before_collapse: None,
                    }));
                    return self.resolve_expr(expr, check_value, None);
                }

                self.resolve_expr(&mut unary.expr, true, None)?;

                if unary.postfix {
                    debug_assert!(matches!(unary.op, UnaryOp::Increment | UnaryOp::Decrement));
                    let line = unary.line;
                    let ty = type_of_expr(self.decls, &unary.expr);

                    let temp = {
                        let mut decl = VarDecl::new(crate::parse::TEMP_NAME.to_owned(), ty.clone(), line);
                        decl.init = unary.expr.clone();
                        self.decls.alloc_var(decl)
                    };

                    let mut prefix = unary.clone();
                    prefix.postfix = false;
                    let increment = Stmt::Expression(ExprStmt::new(Expr::Unary(prefix), line));

                    let ret = Stmt::Return(Box::new(ReturnStmt {
                        line,
                        expr: make::var_read(temp, line),
                        owner: ReturnOwner::Untagged,
                    }));

                    *expr = Expr::Block(Box::new(BlockExpr {
                        ty,
                        block: make::block_of(vec![Stmt::VarDecl(temp), increment, ret], line),
                    }));
                }
                Ok(())
            }
            Expr::Block(block) => {
                let mut ty = block.ty.clone();
                self.resolve_type(&mut ty, true, false, None)?;
                block.ty = ty;

                self.push_scope();
                let result = self.visit_stmts(&mut block.block.stmts);
                self.pop_scope();
                result
            }
            Expr::SizeOf(sizeof) => {
                let line = sizeof.line;

                // a bare identifier chain is a type when it resolves to one
                if let Some(ty) = &mut sizeof.ty {
                    if sizeof.expr.is_null() {
                        let mut ty = ty.clone();
                        self.resolve_type(&mut ty, false, false, None)?;
                        sizeof.ty = Some(ty);
                    } else {
                        let mut is_type = false;
                        let mut probe = ty.clone();
                        self.resolve_type(&mut probe, false, false, Some(&mut is_type))?;
                        if is_type {
                            self.resolve_type(&mut probe, false, false, None)?;
                            sizeof.ty = Some(probe);
                            sizeof.expr = Expr::Null;
                        } else {
                            sizeof.ty = None;
                            let mut inner = sizeof.expr.take();
                            self.resolve_expr(&mut inner, true, None)?;
                            sizeof.expr = inner;
                        }
                    }
                } else {
                    let mut inner = sizeof.expr.take();
                    if inner.is_null() {
                        return Err(self.error("Expected expression or type after \"sizeof\"", line));
                    }
                    self.resolve_expr(&mut inner, true, None)?;
                    sizeof.expr = inner;
                }
                Ok(())
            }
            Expr::Call(call) => {
                let line = call.line;
                let arg_count = call.args.len();

                let mut base = call.base.take();
                self.resolve_expr(&mut base, false, Some(arg_count))?;
                call.base = base;

                let func = match &call.base {
                    Expr::Member(member) => match member.resolved {
                        Resolved::Func(func) if member.base.is_null() => func,
                        _ => return Err(self.error("Expression is not a function", line)),
                    },
                    _ => return Err(self.error("Expression is not a function", line)),
                };

                for arg in &mut call.args {
                    self.resolve_expr(arg, true, None)?;
                }

                // fill missing trailing arguments from parameter defaults
                let params = self.decls.func(func).params.clone();
                for &param in params.iter().skip(call.args.len()) {
                    let default = self.decls.var(param).init.clone();
                    if default.is_null() {
                        return Err(self.error("Function called with incorrect number of arguments", line));
                    }
                    call.args.push(default);
                }

                Ok(())
            }
            Expr::Subscript(subscript) => {
                self.resolve_expr(&mut subscript.base, true, None)?;
                self.resolve_expr(&mut subscript.index, true, None)?;

                let info = struct_info_of_expr(self.decls, &subscript.base);
                if let Some(struct_id) = info.effective {
                    if !self.decls.strct(struct_id).is_array_type {
                        return Err(self.error("Cannot index into non-array type", subscript.line));
                    }

                    let ptr_member = self.decls.strct(struct_id).members[ARRAY_PTR_MEMBER];
                    let mut element = self.decls.var(ptr_member).ty.clone();
                    element.modifier = TypeModifier::None;
                    subscript.type_before_collapse = Some(element);

                    match &mut subscript.base {
                        Expr::Member(member) => {
                            let leaf = match member.resolved {
                                Resolved::Var(var) => var,
                                _ => unreachable!("array base resolves to a variable"),
                            };
                            if member.root_var.is_none() && member.base.is_null() {
                                member.root_var = Some(leaf);
                            } else {
                                member.parents.push(leaf);
                            }
                            member.resolved = Resolved::Var(ptr_member);
                        }
                        base @ (Expr::Call(_) | Expr::Block(_) | Expr::Binary(_)) => {
                            let inner = base.take();
                            *base = Expr::Member(Box::new(MemberAccessExpr {
                                line: subscript.line,
                                base: inner,
                                resolved: Resolved::Var(ptr_member),
                                ..MemberAccessExpr::default()
                            }));
                        }
                        _ => {}
                    }
                }
                Ok(())
            }
        }
    }

    // ---- member access -----------------------------------------------------

    fn resolve_member_access(
        &mut self,
        slot: &mut Expr,
        call_args: Option<usize>,
        is_public_api: bool,
    ) -> CompileResult<()> {
        let Expr::Member(mut member) = slot.take() else {
            unreachable!("resolve_member_access on a non-member expression");
        };

        let mut base = member.base.take();
        self.resolve_expr(&mut base, true, None)?;
        member.base = base;

        match self.walk_member_access(&mut member, call_args, is_public_api)? {
            Entity::Import { .. } => {
                return Err(self.error("Cannot reference import by itself", member.line));
            }
            Entity::Func(func) => {
                member.resolved = Resolved::Func(func);
            }
            Entity::Struct(id) => {
                member.resolved = Resolved::Struct(id);
            }
            Entity::Var(leaf) => {
                // the walk pushed the leaf last; parents keep only the chain
                // between the root variable and the leaf
                if !member.parents.is_empty() {
                    debug_assert_eq!(*member.parents.last().unwrap(), leaf);
                    member.parents.pop();

                    let first = match member.resolved {
                        Resolved::Var(var) => var,
                        _ => unreachable!("struct chain starts at a variable"),
                    };
                    if member.base.is_null() {
                        member.root_var = Some(first);
                    } else {
                        member.parents.insert(0, first);
                    }
                }
                member.resolved = Resolved::Var(leaf);
            }
            Entity::Input(input, input_member) => {
                let line = member.line;
                let input = self.decls.input(input).clone();
                match input_member {
                    InputMember::None => {
                        return Err(self.error("Cannot use input variable by itself", line));
                    }
                    InputMember::Value => {
                        member.resolved = Resolved::Var(input.var.expect("input backing variable"));
                    }
                    InputMember::SliderNumber => {
                        *slot = make::int(u64::from(input.slider_number), line);
                        return Ok(());
                    }
                    InputMember::Default => {
                        *slot = number_literal(&input.default_value, line);
                        return Ok(());
                    }
                    InputMember::Min => {
                        *slot = number_literal(&input.min, line);
                        return Ok(());
                    }
                    InputMember::Max => {
                        *slot = number_literal(&input.max, line);
                        return Ok(());
                    }
                    InputMember::Inc => {
                        *slot = number_literal(&input.increment, line);
                        return Ok(());
                    }
                    InputMember::Name => {
                        *slot = Expr::Literal(crate::ast::LiteralExpr {
                            line,
                            kind: crate::ast::LiteralKind::Str(input.description.clone()),
                        });
                        return Ok(());
                    }
                }
            }
            Entity::Start | Entity::ExprOfStruct(_) => {
                return Err(self.error("Invalid member access", member.line));
            }
        }

        *slot = Expr::Member(member);
        Ok(())
    }

    /// Walks the identifier chain, accumulating variable references into the
    /// member access, and returns the entity the chain ends on.
    fn walk_member_access(
        &mut self,
        member: &mut MemberAccessExpr,
        call_args: Option<usize>,
        is_public_api: bool,
    ) -> CompileResult<Entity> {
        let line = member.line;

        let mut current = if member.base.is_null() {
            Entity::Start
        } else {
            match &member.base {
                Expr::Subscript(subscript) => {
                    let mut info = struct_info_of_expr(self.decls, &subscript.base);
                    // indexing an array dereferences through its ptr member
                    if let Some(id) = info.effective
                        && self.decls.strct(id).is_array_type
                    {
                        let ptr_member = self.decls.strct(id).members[ARRAY_PTR_MEMBER];
                        info = struct_info_of_type(&self.decls.var(ptr_member).ty);
                    }
                    if info.is_pointer {
                        Entity::ExprOfStruct(info.pointer)
                    } else {
                        Entity::ExprOfStruct(info.effective)
                    }
                }
                base => Entity::ExprOfStruct(struct_info_of_expr(self.decls, base).effective),
            }
        };

        let idents: Vec<String> = member.idents.iter().cloned().collect();
        let last = idents.len().saturating_sub(1);
        for (index, text) in idents.iter().enumerate() {
            // overload selection applies to the identifier the call resolves
            let call_ctx = if index == last { call_args } else { None };
            current = self.walk_one_member(text, current, call_ctx, is_public_api, line)?;

            if let Entity::Var(var) = current {
                if matches!(member.resolved, Resolved::Unresolved) {
                    member.resolved = Resolved::Var(var);
                } else {
                    member.parents.push(var);
                }
            }
        }

        Ok(current)
    }

    fn walk_one_member(
        &mut self,
        text: &str,
        current: Entity,
        call_args: Option<usize>,
        is_public_api: bool,
        line: u32,
    ) -> CompileResult<Entity> {
        match current {
            Entity::Struct(_) | Entity::Func(_) => Err(self.error("Invalid member access", line)),

            Entity::Start => {
                let Some(entries) = self.lookup(text) else {
                    return Err(self.error(format!("Unknown identifier \"{text}\""), line));
                };
                let entries = entries.clone();

                if let Some(arg_count) = call_args
                    && matches!(entries[0], DeclRef::Func(_))
                {
                    return match self.find_overload_in(&entries, arg_count) {
                        Some(func) => Ok(Entity::Func(func)),
                        None => Err(self.error(
                            format!("Could not find overload for function \"{text}\" with {arg_count} parameter(s)"),
                            line,
                        )),
                    };
                }

                Ok(self.entity_for(&entries[0]))
            }

            Entity::Var(var) => {
                debug_assert!(self.decls.var(var).input.is_none());
                let info = struct_info_of_type(&self.decls.var(var).ty);
                self.struct_member(info.effective, info.is_pointer, text, line)
            }

            Entity::ExprOfStruct(struct_id) => self.struct_member(struct_id, false, text, line),

            Entity::Import { module, public } => {
                if is_public_api && !public {
                    return Err(
                        self.error("Types from private imports are not allowed in public declarations", line)
                    );
                }

                let exports = self.modules.get(&module).expect("module exports published");
                let Some(entries) = exports.get(text) else {
                    return Err(self.error(
                        format!("Unknown identifier \"{text}\" in module \"{module}\""),
                        line,
                    ));
                };
                let entries = entries.clone();

                if matches!(entries[0], DeclRef::Import { .. }) {
                    return Err(self.error("Cannot access member imports from another module", line));
                }

                let chosen = if let Some(arg_count) = call_args {
                    match self.find_overload_in(&entries, arg_count) {
                        Some(func) => DeclRef::Func(func),
                        None => {
                            if entries.iter().any(|entry| matches!(entry, DeclRef::Func(_))) {
                                return Err(self.error(
                                    format!(
                                        "Could not find overload for function \"{text}\" with {arg_count} parameter(s)"
                                    ),
                                    line,
                                ));
                            }
                            entries[0].clone()
                        }
                    }
                } else {
                    entries[0].clone()
                };

                let public = match &chosen {
                    DeclRef::Var(var) => self.decls.var(*var).modifiers.is_public(),
                    DeclRef::Func(func) => self.decls.func(*func).modifiers.is_public(),
                    DeclRef::Struct(id) => self.decls.strct(*id).modifiers.is_public(),
                    DeclRef::Import { .. } => unreachable!(),
                };
                if !public {
                    return Err(self.error(
                        format!("Declaration \"{text}\" in module \"{module}\" is private"),
                        line,
                    ));
                }

                Ok(self.entity_for(&chosen))
            }

            Entity::Input(input, input_member) => {
                if input_member != InputMember::None {
                    return Err(self.error("Invalid member access", line));
                }
                let member = match text {
                    "value" => InputMember::Value,
                    "sliderNumber" => InputMember::SliderNumber,
                    "default" => InputMember::Default,
                    "min" => InputMember::Min,
                    "max" => InputMember::Max,
                    "inc" => InputMember::Inc,
                    "name" => InputMember::Name,
                    _ => {
                        return Err(self.error(format!("Unknown member in input variable \"{text}\""), line));
                    }
                };
                Ok(Entity::Input(input, member))
            }
        }
    }

    fn entity_for(&self, decl: &DeclRef) -> Entity {
        match decl {
            DeclRef::Var(var) => match self.decls.var(*var).input {
                Some(input) => Entity::Input(input, InputMember::None),
                None => Entity::Var(*var),
            },
            DeclRef::Func(func) => Entity::Func(*func),
            DeclRef::Struct(id) => Entity::Struct(*id),
            DeclRef::Import { module, public } => Entity::Import {
                module: module.clone(),
                public: *public,
            },
        }
    }

    fn struct_member(
        &self,
        struct_id: Option<StructId>,
        is_pointer: bool,
        text: &str,
        line: u32,
    ) -> CompileResult<Entity> {
        if is_pointer {
            return Err(self.error("Cannot access members in pointer type", line));
        }
        let Some(struct_id) = struct_id else {
            return Err(self.error("Cannot access member in a non-aggregate type", line));
        };

        let decl = self.decls.strct(struct_id);
        for &candidate in &decl.members {
            if self.decls.var(candidate).name == text {
                return Ok(Entity::Var(candidate));
            }
        }

        if decl.is_array_type {
            Err(self.error(format!("Member \"{text}\" does not exist in array type"), line))
        } else {
            Err(self.error(
                format!("Member \"{text}\" does not exist in type \"{}\"", decl.name),
                line,
            ))
        }
    }

    // ---- inputs, desc, sections -------------------------------------------

    fn visit_input(&mut self, id: InputId) -> CompileResult<()> {
        let line = self.decls.input(id).line;

        let mut modifiers = self.decls.input(id).modifiers;
        self.apply_modifiers(&mut modifiers, line)?;
        self.decls.input_mut(id).modifiers = modifiers;

        if modifiers.is_external() {
            return Err(self.error("Input statements can only be internal", line));
        }
        if !self.at_global_scope() {
            return Err(self.error("Input statements are only allowed in global scope", line));
        }

        self.set_input_properties(id)?;

        let name = self.decls.input(id).name.clone();
        let var = {
            let mut decl = VarDecl::new(name.clone(), TypeRef::primitive(Primitive::Float, line), line);
            decl.modifiers = Modifiers {
                public_specified: true,
                public_value: modifiers.is_public(),
                external_specified: true,
                external_value: false,
            };
            decl.input = Some(id);
            self.decls.alloc_var(decl)
        };
        self.decls.input_mut(id).var = Some(var);
        self.register(&name, DeclRef::Var(var), line)?;

        self.slider_number += 1;
        self.decls.input_mut(id).slider_number = self.slider_number;
        Ok(())
    }

    fn set_input_properties(&mut self, id: InputId) -> CompileResult<()> {
        let line = self.decls.input(id).line;
        let properties = self.decls.input_mut(id).properties.take();

        let mut default_value = None;
        let mut min = None;
        let mut max = None;
        let mut increment = None;
        let mut description = None;
        let mut hidden = None;
        let mut shape = SliderShape::NotSet;
        let mut midpoint = None;
        let mut exponent = None;
        let mut linear_automation = None;

        if let Some(list) = &properties {
            for property in &list.props {
                match property.key {
                    PropertyKey::DefaultValue => set_number_property(property, &mut default_value, &self.file)?,
                    PropertyKey::Min => set_number_property(property, &mut min, &self.file)?,
                    PropertyKey::Max => set_number_property(property, &mut max, &self.file)?,
                    PropertyKey::Increment => set_number_property(property, &mut increment, &self.file)?,
                    PropertyKey::Description => set_string_property(property, &mut description, &self.file)?,
                    PropertyKey::Hidden => set_boolean_property(property, &mut hidden, &self.file)?,
                    PropertyKey::Shape => {
                        let PropertyValue::List(nested) = &property.value else {
                            return Err(CompileError::new("Expected property list", property.line, &self.file));
                        };
                        self.set_shape_properties(
                            nested,
                            &mut shape,
                            &mut midpoint,
                            &mut exponent,
                            &mut linear_automation,
                        )?;
                    }
                    _ => return Err(CompileError::new("Invalid property type", property.line, &self.file)),
                }
            }
        }

        match shape {
            SliderShape::NotSet => {
                if linear_automation.is_some() {
                    return Err(
                        self.error("Cannot set \"linear_automation\" property if shape type is not set", line)
                    );
                }
                if midpoint.is_some() {
                    return Err(self.error("Cannot set \"midpoint\" property if shape type is not set", line));
                }
                if exponent.is_some() {
                    return Err(self.error("Cannot set \"exponent\" property if shape type is not set", line));
                }
            }
            SliderShape::Logarithmic => {
                if exponent.is_some() {
                    return Err(self.error("Cannot set \"exponent\" property if shape type is \"log\"", line));
                }
                if midpoint.is_none() {
                    return Err(self.error("Must set \"midpoint\" property if shape type is \"log\"", line));
                }
            }
            SliderShape::Polynomial => {
                if midpoint.is_some() {
                    return Err(self.error("Cannot set \"midpoint\" property if shape type is \"poly\"", line));
                }
            }
        }

        let input = self.decls.input_mut(id);
        input.default_value = default_value.unwrap_or_else(|| "0".to_owned());
        input.min = min.unwrap_or_else(|| "0".to_owned());
        input.max = max.unwrap_or_else(|| "10".to_owned());
        input.increment = increment.unwrap_or_else(|| "0".to_owned());
        input.description = description.unwrap_or_else(|| input.name.clone());
        input.exponent = exponent.unwrap_or_else(|| "2".to_owned());
        input.shape = shape;
        input.midpoint = midpoint;
        input.hidden = hidden.unwrap_or(false);
        input.linear_automation = linear_automation.unwrap_or(false);
        Ok(())
    }

    fn set_shape_properties(
        &self,
        list: &PropertyList,
        shape: &mut SliderShape,
        midpoint: &mut Option<String>,
        exponent: &mut Option<String>,
        linear_automation: &mut Option<bool>,
    ) -> CompileResult<()> {
        for property in &list.props {
            match property.key {
                PropertyKey::Type => {
                    if *shape != SliderShape::NotSet {
                        return Err(CompileError::new("Cannot set property twice", property.line, &self.file));
                    }
                    let Some(word) = property_word(property) else {
                        return Err(CompileError::new("Expected slider shape type", property.line, &self.file));
                    };
                    *shape = match word.as_str() {
                        "log" => SliderShape::Logarithmic,
                        "poly" => SliderShape::Polynomial,
                        _ => {
                            return Err(CompileError::new(
                                format!("Unknown slider shape type \"{word}\""),
                                property.line,
                                &self.file,
                            ));
                        }
                    };
                }
                PropertyKey::Midpoint => set_number_property(property, midpoint, &self.file)?,
                PropertyKey::Exponent => set_number_property(property, exponent, &self.file)?,
                PropertyKey::LinearAutomation => set_boolean_property(property, linear_automation, &self.file)?,
                _ => return Err(CompileError::new("Invalid property type", property.line, &self.file)),
            }
        }
        Ok(())
    }

    fn visit_desc(&mut self, desc: &mut DescStmt) -> CompileResult<()> {
        if !self.at_global_scope() {
            return Err(self.error("Description statements are only allowed in global scope", desc.line));
        }
        if self.found_desc {
            return Err(self.error("Only one description statement is allowed in a plugin", desc.line));
        }

        let properties = desc.properties.take();
        if let Some(list) = &properties {
            for property in &list.props {
                match property.key {
                    PropertyKey::Description => set_string_property(property, &mut desc.description, &self.file)?,
                    PropertyKey::Tags => set_string_property(property, &mut desc.tags, &self.file)?,
                    PropertyKey::InPins | PropertyKey::OutPins => {
                        let PropertyValue::List(nested) = &property.value else {
                            return Err(CompileError::new("Expected property list", property.line, &self.file));
                        };
                        let pins = if property.key == PropertyKey::InPins {
                            &mut desc.in_pins
                        } else {
                            &mut desc.out_pins
                        };
                        if *pins != PinList::Unset {
                            return Err(CompileError::new("Cannot set property twice", property.line, &self.file));
                        }
                        *pins = self.parse_pins(nested)?;
                    }
                    PropertyKey::Options => {
                        let PropertyValue::List(nested) = &property.value else {
                            return Err(CompileError::new("Expected property list", property.line, &self.file));
                        };
                        self.set_options_properties(nested, desc)?;
                    }
                    _ => return Err(CompileError::new("Invalid property type", property.line, &self.file)),
                }
            }
        }

        self.found_desc = true;
        Ok(())
    }

    fn parse_pins(&self, list: &PropertyList) -> CompileResult<PinList> {
        if list.props.is_empty() {
            return Ok(PinList::None);
        }

        let mut pins = Vec::new();
        for property in &list.props {
            if property.key != PropertyKey::Pin {
                return Err(CompileError::new("Invalid property type", property.line, &self.file));
            }
            let mut pin = None;
            set_string_property(property, &mut pin, &self.file)?;
            pins.push(pin.expect("pin string set"));
        }
        Ok(PinList::Pins(pins))
    }

    fn set_options_properties(&self, list: &PropertyList, desc: &mut DescStmt) -> CompileResult<()> {
        let mut all_keyboard = None;
        let mut no_meter = None;
        for property in &list.props {
            match property.key {
                PropertyKey::AllKeyboard => set_boolean_property(property, &mut all_keyboard, &self.file)?,
                PropertyKey::MaxMemory => set_number_property(property, &mut desc.max_memory, &self.file)?,
                PropertyKey::NoMeter => set_boolean_property(property, &mut no_meter, &self.file)?,
                PropertyKey::Gfx => {
                    let PropertyValue::List(nested) = &property.value else {
                        return Err(CompileError::new("Expected property list", property.line, &self.file));
                    };
                    for gfx_property in &nested.props {
                        match gfx_property.key {
                            PropertyKey::Hz => set_number_property(gfx_property, &mut desc.gfx_hz, &self.file)?,
                            PropertyKey::IdleMode => {
                                if desc.idle_mode != GfxIdleMode::NotSet {
                                    return Err(CompileError::new(
                                        "Cannot set property twice",
                                        gfx_property.line,
                                        &self.file,
                                    ));
                                }
                                let Some(word) = property_word(gfx_property) else {
                                    return Err(CompileError::new(
                                        "Expected idle mode type",
                                        gfx_property.line,
                                        &self.file,
                                    ));
                                };
                                desc.idle_mode = match word.as_str() {
                                    "when_closed" => GfxIdleMode::WhenClosed,
                                    "always" => GfxIdleMode::Always,
                                    _ => {
                                        return Err(CompileError::new(
                                            format!("Unknown idle mode type \"{word}\""),
                                            gfx_property.line,
                                            &self.file,
                                        ));
                                    }
                                };
                            }
                            _ => {
                                return Err(CompileError::new(
                                    "Invalid property type",
                                    gfx_property.line,
                                    &self.file,
                                ));
                            }
                        }
                    }
                }
                _ => return Err(CompileError::new("Invalid property type", property.line, &self.file)),
            }
        }
        desc.all_keyboard = all_keyboard.unwrap_or(false);
        desc.no_meter = no_meter.unwrap_or(false);
        Ok(())
    }

    fn set_section_properties(&mut self, section: &mut SectionStmt) -> CompileResult<()> {
        let Some(list) = section.properties.take() else {
            return Ok(());
        };

        if section.kind != SectionKind::Gfx {
            return Err(self.error("Properties are only allowed in an \"@gfx\" section", section.line));
        }

        for property in &list.props {
            match property.key {
                PropertyKey::Width => set_number_property(property, &mut section.width, &self.file)?,
                PropertyKey::Height => set_number_property(property, &mut section.height, &self.file)?,
                _ => return Err(CompileError::new("Invalid property type", property.line, &self.file)),
            }
        }
        Ok(())
    }
}

fn number_literal(text: &str, line: u32) -> Expr {
    Expr::Literal(crate::ast::LiteralExpr {
        line,
        kind: crate::ast::LiteralKind::Number(text.to_owned()),
    })
}

/// A bare single-identifier value, used by enum-like properties.
fn property_word(property: &Property) -> Option<String> {
    if let PropertyValue::Expr(Expr::Member(member)) = &property.value
        && member.base.is_null()
        && member.idents.len() == 1
    {
        return Some(member.idents[0].clone());
    }
    None
}

fn set_number_property(property: &Property, slot: &mut Option<String>, file: &str) -> CompileResult<()> {
    if slot.is_some() {
        return Err(CompileError::new("Cannot set property twice", property.line, file));
    }

    let PropertyValue::Expr(expr) = &property.value else {
        return Err(CompileError::new("Expected number value", property.line, file));
    };

    let (negative, literal) = match expr {
        Expr::Unary(unary) if matches!(unary.op, UnaryOp::Minus | UnaryOp::Plus) && !unary.postfix => {
            (unary.op == UnaryOp::Minus, &unary.expr)
        }
        other => (false, other),
    };

    if let Expr::Literal(literal) = literal
        && let crate::ast::LiteralKind::Number(number) = &literal.kind
    {
        *slot = Some(if negative {
            format!("-{number}")
        } else {
            number.clone()
        });
        return Ok(());
    }

    Err(CompileError::new("Expected number value", property.line, file))
}

fn set_string_property(property: &Property, slot: &mut Option<String>, file: &str) -> CompileResult<()> {
    if slot.is_some() {
        return Err(CompileError::new("Cannot set property twice", property.line, file));
    }

    if let PropertyValue::Expr(Expr::Literal(literal)) = &property.value
        && let crate::ast::LiteralKind::Str(string) = &literal.kind
    {
        *slot = Some(string.clone());
        return Ok(());
    }

    Err(CompileError::new("Expected string value", property.line, file))
}

fn set_boolean_property(property: &Property, slot: &mut Option<bool>, file: &str) -> CompileResult<()> {
    if slot.is_some() {
        return Err(CompileError::new("Cannot set property twice", property.line, file));
    }

    if let PropertyValue::Expr(Expr::Literal(literal)) = &property.value
        && let crate::ast::LiteralKind::Bool(value) = literal.kind
    {
        *slot = Some(value);
        return Ok(());
    }

    Err(CompileError::new("Expected boolean value", property.line, file))
}
