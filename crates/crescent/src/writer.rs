//! Serializes the transformed program as JSFX text.
//!
//! Emission order: the plugin header (desc, slider, pin, and options lines),
//! then each module under a banner comment, sections in source order.
//! Function declarations are hoisted to the top of their section, nested
//! ones first, since the target only accepts textual
//! definition-before-use. Expressions render fully parenthesized; blocks
//! render as parenthesized `;`-sequences with `(0)` standing in for an
//! empty block.

use std::fmt::Write as _;

use crate::ast::{
    Decls, Expr, FuncId, GfxIdleMode, LiteralKind, PinList, Program, Resolved, SectionKind, SliderShape, Stmt,
    VarId,
};

/// Renders the whole program.
pub fn write_program(program: &Program) -> String {
    let mut writer = Writer {
        decls: &program.decls,
        out: String::new(),
    };

    writer.write_header(program);

    for module in &program.modules {
        // render first; fully optimized-away modules leave no banner behind
        let mut body = Writer {
            decls: &program.decls,
            out: String::new(),
        };
        for stmt in &module.stmts {
            if let Stmt::Section(section) = stmt {
                body.write_section(section);
            }
        }
        if body.out.is_empty() {
            continue;
        }

        writer.line(&format!("// Module: {}", module.path));
        writer.out.push_str(&body.out);
    }

    writer.out
}

struct Writer<'a> {
    decls: &'a Decls,
    out: String,
}

impl Writer<'_> {
    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    // ---- header ------------------------------------------------------------

    fn write_header(&mut self, program: &Program) {
        let desc = program.modules.iter().flat_map(|m| &m.stmts).find_map(|stmt| match stmt {
            Stmt::Desc(desc) => Some(desc),
            _ => None,
        });

        if let Some(desc) = desc {
            let description = desc.description.clone().unwrap_or_default();
            self.line(&format!("desc:{description}"));
            if let Some(tags) = &desc.tags {
                self.line(&format!("tags:{tags}"));
            }
        }

        let mut inputs: Vec<_> = self.decls.inputs.iter().collect();
        inputs.sort_by_key(|input| input.slider_number);
        for input in inputs {
            let mut shape = String::new();
            match input.shape {
                SliderShape::NotSet => {}
                SliderShape::Logarithmic => {
                    let midpoint = input.midpoint.as_deref().unwrap_or("0");
                    let _ = write!(shape, ":log={midpoint}");
                }
                SliderShape::Polynomial => {
                    let _ = write!(shape, ":sqr={}", input.exponent);
                }
            }
            if input.linear_automation {
                shape.push('!');
            }
            let hidden = if input.hidden { "-" } else { "" };
            self.line(&format!(
                "slider{}:{}<{},{},{}{}>{}{}",
                input.slider_number,
                input.default_value,
                input.min,
                input.max,
                input.increment,
                shape,
                hidden,
                input.description,
            ));
        }

        if let Some(desc) = desc {
            match &desc.in_pins {
                PinList::Unset => {}
                PinList::None => self.line("in_pin:none"),
                PinList::Pins(pins) => {
                    for pin in pins {
                        self.line(&format!("in_pin:{pin}"));
                    }
                }
            }
            match &desc.out_pins {
                PinList::Unset => {}
                PinList::None => self.line("out_pin:none"),
                PinList::Pins(pins) => {
                    for pin in pins {
                        self.line(&format!("out_pin:{pin}"));
                    }
                }
            }

            let mut options = Vec::new();
            if desc.all_keyboard {
                options.push("want_all_kb".to_owned());
            }
            if let Some(max_memory) = &desc.max_memory {
                options.push(format!("maxmem={max_memory}"));
            }
            if desc.no_meter {
                options.push("no_meter".to_owned());
            }
            if let Some(hz) = &desc.gfx_hz {
                options.push(format!("gfx_hz={hz}"));
            }
            match desc.idle_mode {
                GfxIdleMode::NotSet => {}
                GfxIdleMode::WhenClosed => options.push("gfx_idle".to_owned()),
                GfxIdleMode::Always => options.push("gfx_idle_only".to_owned()),
            }
            if !options.is_empty() {
                self.line(&format!("options:{}", options.join(" ")));
            }
        }
    }

    // ---- sections ----------------------------------------------------------

    fn write_section(&mut self, section: &crate::ast::SectionStmt) {
        // definitions must precede their uses textually; nested outlined
        // functions come before their enclosing function
        let mut funcs = Vec::new();
        for stmt in &section.block.stmts {
            collect_functions(self.decls, stmt, &mut funcs);
        }

        let mut body = Writer {
            decls: self.decls,
            out: String::new(),
        };
        for func in funcs {
            body.write_function(func);
        }
        for stmt in &section.block.stmts {
            body.write_line_stmt(stmt);
        }

        // a fully optimized-away synthesized section has nothing to say
        if body.out.is_empty() && section.kind == SectionKind::Init {
            return;
        }

        let mut header = format!("@{}", section.kind);
        if section.kind == SectionKind::Gfx
            && (section.width.is_some() || section.height.is_some())
        {
            let width = section.width.as_deref().unwrap_or("0");
            let height = section.height.as_deref().unwrap_or("0");
            let _ = write!(header, " {width} {height}");
        }
        self.line(&header);
        self.out.push_str(&body.out);
        self.out.push('\n');
    }

    fn write_function(&mut self, func: FuncId) {
        let decl = self.decls.func(func);
        if decl.modifiers.is_external() {
            return;
        }

        let params = decl
            .params
            .iter()
            .map(|&param| self.var_name(param))
            .collect::<Vec<_>>()
            .join(", ");

        self.line(&format!("function {}({}) (", self.func_name(func), params));

        if let Some(block) = &decl.block {
            let body = self.render_block_stmts(&block.stmts);
            if body.is_empty() {
                self.line("  0");
            } else {
                let yields = block_yields_value(&block.stmts);
                let last = body.len() - 1;
                for (index, part) in body.iter().enumerate() {
                    if index == last && yields {
                        self.line(&format!("  {part}"));
                    } else {
                        self.line(&format!("  {part};"));
                    }
                }
            }
        }
        self.line(");");
    }

    /// A top-level statement inside a section, one line each.
    fn write_line_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Null | Stmt::Import(_) | Stmt::StructDecl(_) | Stmt::Input(_) | Stmt::Desc(_)
            | Stmt::Modifier(_) | Stmt::FuncDecl(_) => {}
            Stmt::VarDecl(id) => {
                let decl = self.decls.var(*id);
                if decl.modifiers.is_external() {
                    return;
                }
                let name = self.var_name(*id);
                let init = self.render_expr(&decl.init, true);
                self.line(&format!("{name} = {init};"));
            }
            Stmt::Expression(expr_stmt) => {
                let text = self.render_expr(&expr_stmt.expr, true);
                self.line(&format!("{text};"));
            }
            Stmt::While(while_stmt) => {
                let cond = self.render_expr(&while_stmt.cond, false);
                self.line(&format!("while ({cond}) ("));
                let body = self.render_block_stmts(&while_stmt.body.stmts);
                if body.is_empty() {
                    self.line("  0");
                } else {
                    for part in body {
                        self.line(&format!("  {part};"));
                    }
                }
                self.line(");");
            }
            Stmt::If(_) | Stmt::Block(_) => {
                let text = self.render_stmt(stmt);
                if !text.is_empty() {
                    self.line(&format!("{text};"));
                }
            }
            Stmt::Section(_) | Stmt::LoopControl(_) | Stmt::Return(_) | Stmt::For(_) => {
                unreachable!("statement kind does not survive to emission")
            }
        }
    }

    // ---- inline statement rendering ---------------------------------------

    /// Renders statements of a block as fragments, without separators.
    fn render_block_stmts(&self, stmts: &[Stmt]) -> Vec<String> {
        let mut parts = Vec::new();
        for stmt in stmts {
            let text = self.render_stmt(stmt);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts
    }

    /// One statement as an inline fragment (no trailing separator).
    fn render_stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Null | Stmt::Import(_) | Stmt::StructDecl(_) | Stmt::Input(_) | Stmt::Desc(_)
            | Stmt::Modifier(_) | Stmt::FuncDecl(_) => String::new(),
            Stmt::Expression(expr_stmt) => self.render_expr(&expr_stmt.expr, true),
            Stmt::VarDecl(id) => {
                let decl = self.decls.var(*id);
                if decl.modifiers.is_external() {
                    return String::new();
                }
                format!("{} = {}", self.var_name(*id), self.render_expr(&decl.init, true))
            }
            Stmt::Block(block) => self.render_paren_block(&block.stmts),
            Stmt::If(if_stmt) => {
                let cond = self.render_expr(&if_stmt.cond, false);
                let then_part = self.render_paren_block(&if_stmt.then_block.stmts);
                let else_part = match &if_stmt.else_block {
                    Some(block) => self.render_paren_block(&block.stmts),
                    None => "(0)".to_owned(),
                };
                format!("{cond} ? {then_part} : {else_part}")
            }
            Stmt::While(while_stmt) => {
                let cond = self.render_expr(&while_stmt.cond, false);
                let body = self.render_paren_block(&while_stmt.body.stmts);
                format!("while ({cond}) {body}")
            }
            Stmt::Section(_) | Stmt::LoopControl(_) | Stmt::Return(_) | Stmt::For(_) => {
                unreachable!("statement kind does not survive to emission")
            }
        }
    }

    /// `(a; b;)`, or `(0)` when nothing renders.
    fn render_paren_block(&self, stmts: &[Stmt]) -> String {
        let parts = self.render_block_stmts(stmts);
        if parts.is_empty() {
            "(0)".to_owned()
        } else {
            format!("({};)", parts.join("; "))
        }
    }

    // ---- expressions -------------------------------------------------------

    fn render_expr(&self, expr: &Expr, statement_position: bool) -> String {
        match expr {
            Expr::Null => "0".to_owned(),
            Expr::Literal(literal) => match &literal.kind {
                LiteralKind::Number(text) => text.clone(),
                LiteralKind::Str(text) => format!("\"{text}\""),
                LiteralKind::Bool(value) => u64::from(*value).to_string(),
                LiteralKind::Primitive(_) => "0".to_owned(),
            },
            Expr::Member(member) => match member.resolved {
                Resolved::Var(var) => self.var_name(var),
                Resolved::Func(func) => self.func_name(func),
                _ => "0".to_owned(),
            },
            Expr::Binary(binary) => {
                let left = self.render_expr(&binary.left, false);
                let right = self.render_expr(&binary.right, false);
                if statement_position {
                    format!("{left} {} {right}", binary.op)
                } else {
                    format!("({left} {} {right})", binary.op)
                }
            }
            Expr::Unary(unary) => {
                format!("{}{}", unary.op, self.render_expr(&unary.expr, false))
            }
            Expr::Subscript(subscript) => {
                format!(
                    "{}[{}]",
                    self.render_expr(&subscript.base, false),
                    self.render_expr(&subscript.index, false)
                )
            }
            Expr::Call(call) => {
                let name = match &call.base {
                    Expr::Member(member) => match member.resolved {
                        Resolved::Func(func) => self.func_name(func),
                        _ => self.render_expr(&call.base, false),
                    },
                    _ => self.render_expr(&call.base, false),
                };
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.render_expr(arg, false))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{name}({args})")
            }
            Expr::Block(block) => self.render_paren_block_expr(block),
            Expr::SizeOf(_) => unreachable!("sizeof was lowered before emission"),
        }
    }

    /// An inlined block expression: its trailing bare expression is the
    /// value, so it renders without a closing semicolon.
    fn render_paren_block_expr(&self, block: &crate::ast::BlockExpr) -> String {
        let parts = self.render_block_stmts(&block.block.stmts);
        if parts.is_empty() {
            return "(0)".to_owned();
        }

        if block_yields_value(&block.block.stmts) {
            format!("({})", parts.join("; "))
        } else {
            format!("({};)", parts.join("; "))
        }
    }

    // ---- names -------------------------------------------------------------

    fn var_name(&self, id: VarId) -> String {
        let decl = self.decls.var(id);
        if let Some(input) = decl.input {
            return format!("slider{}", self.decls.input(input).slider_number);
        }
        if decl.modifiers.is_external() {
            return decl.external_name.clone().unwrap_or_else(|| decl.name.clone());
        }
        if decl.unique == 0 {
            decl.name.clone()
        } else {
            format!("{}_{}", decl.name, decl.unique)
        }
    }

    fn func_name(&self, id: FuncId) -> String {
        let decl = self.decls.func(id);
        if decl.modifiers.is_external() {
            return decl.external_name.clone().unwrap_or_else(|| decl.name.clone());
        }
        if decl.unique == 0 {
            decl.name.clone()
        } else {
            format!("{}_{}", decl.name, decl.unique)
        }
    }
}

/// Depth-first function discovery: nested outlined functions surface before
/// the function that contains them.
fn collect_functions(decls: &Decls, stmt: &Stmt, out: &mut Vec<FuncId>) {
    match stmt {
        Stmt::FuncDecl(id) => {
            if let Some(block) = &decls.func(*id).block {
                for inner in &block.stmts {
                    collect_functions(decls, inner, out);
                }
            }
            if !decls.func(*id).modifiers.is_external() {
                out.push(*id);
            }
        }
        Stmt::Block(block) => {
            for inner in &block.stmts {
                collect_functions(decls, inner, out);
            }
        }
        Stmt::If(if_stmt) => {
            for inner in &if_stmt.then_block.stmts {
                collect_functions(decls, inner, out);
            }
            if let Some(else_block) = &if_stmt.else_block {
                for inner in &else_block.stmts {
                    collect_functions(decls, inner, out);
                }
            }
        }
        Stmt::While(while_stmt) => {
            for inner in &while_stmt.body.stmts {
                collect_functions(decls, inner, out);
            }
        }
        Stmt::Expression(expr_stmt) => collect_functions_in_expr(decls, &expr_stmt.expr, out),
        Stmt::VarDecl(id) => collect_functions_in_expr(decls, &decls.var(*id).init, out),
        _ => {}
    }
}

fn collect_functions_in_expr(decls: &Decls, expr: &Expr, out: &mut Vec<FuncId>) {
    match expr {
        Expr::Block(block) => {
            for inner in &block.block.stmts {
                collect_functions(decls, inner, out);
            }
        }
        Expr::Binary(binary) => {
            collect_functions_in_expr(decls, &binary.left, out);
            collect_functions_in_expr(decls, &binary.right, out);
        }
        Expr::Unary(unary) => collect_functions_in_expr(decls, &unary.expr, out),
        Expr::Subscript(subscript) => {
            collect_functions_in_expr(decls, &subscript.base, out);
            collect_functions_in_expr(decls, &subscript.index, out);
        }
        Expr::Call(call) => {
            for arg in &call.args {
                collect_functions_in_expr(decls, arg, out);
            }
        }
        _ => {}
    }
}

/// Whether a block's last live statement is a bare value expression.
fn block_yields_value(stmts: &[Stmt]) -> bool {
    matches!(
        stmts.iter().rev().find(|stmt| !stmt.is_null()),
        Some(Stmt::Expression(expr_stmt)) if expr_stmt.expr.as_var_assignment().is_none()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, Module, SectionStmt, VarDecl, make};
    use crate::types::{Primitive, TypeRef};

    fn add_section(program: &mut Program, stmts: Vec<Stmt>) {
        program.modules.push(Module {
            path: "main.cres".into(),
            name: "main".into(),
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
    }

    #[test]
    fn emits_banner_and_section_header() {
        let mut program = Program::default();
        let var = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(var).init = make::int(5, 1);
        program.decls.var_mut(var).unique = 1;
        add_section(&mut program, vec![Stmt::VarDecl(var)]);

        let output = write_program(&program);
        assert!(output.contains("// Module: main.cres"));
        assert!(output.contains("@init"));
        assert!(output.contains("a_1 = 5;"));
    }

    #[test]
    fn binary_expressions_parenthesize_in_value_position() {
        let mut program = Program::default();
        let a = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(a).unique = 3;
        let b = program
            .decls
            .alloc_var(VarDecl::new("b".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(b).unique = 4;

        let stmt = make::set_var(
            b,
            make::binary(crate::ast::BinaryOp::Add, make::var_read(a, 1), make::int(1, 1), 1),
            1,
        );
        add_section(&mut program, vec![stmt]);

        let output = write_program(&program);
        assert!(output.contains("b_4 = (a_3 + 1);"), "got: {output}");
    }

    #[test]
    fn external_variables_emit_their_external_name() {
        let mut program = Program::default();
        let var = program
            .decls
            .alloc_var(VarDecl::new("r".into(), TypeRef::primitive(Primitive::Any, 1), 1));
        {
            let decl = program.decls.var_mut(var);
            decl.modifiers.external_specified = true;
            decl.modifiers.external_value = true;
            decl.external_name = Some("gfx_r".into());
        }
        add_section(&mut program, vec![make::set_var(var, make::int(1, 1), 1)]);

        let output = write_program(&program);
        assert!(output.contains("gfx_r = 1;"), "got: {output}");
    }

    #[test]
    fn if_renders_as_conditional_with_zero_else() {
        let mut program = Program::default();
        let a = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.decls.var_mut(a).unique = 1;

        let if_stmt = Stmt::If(Box::new(crate::ast::IfStmt {
            line: 1,
            cond: make::binary(
                crate::ast::BinaryOp::GreaterThan,
                make::var_read(a, 1),
                make::int(0, 1),
                1,
            ),
            then_block: Block {
                line: 1,
                stmts: vec![make::set_var(a, make::int(2, 1), 1)],
            },
            else_block: None,
        }));
        add_section(&mut program, vec![if_stmt]);

        let output = write_program(&program);
        assert!(output.contains("(a_1 > 0) ? (a_1 = 2;) : (0);"), "got: {output}");
    }

    #[test]
    fn input_backed_variables_render_as_sliders() {
        let mut program = Program::default();
        let input = program.decls.alloc_input(crate::ast::InputDecl::new(
            "gain".into(),
            None,
            crate::ast::Modifiers::default(),
            1,
        ));
        program.decls.input_mut(input).slider_number = 2;
        program.decls.input_mut(input).default_value = "0.5".into();
        program.decls.input_mut(input).min = "0".into();
        program.decls.input_mut(input).max = "1".into();
        program.decls.input_mut(input).increment = "0".into();
        program.decls.input_mut(input).description = "Gain".into();

        let var = program
            .decls
            .alloc_var(VarDecl::new("gain".into(), TypeRef::primitive(Primitive::Float, 1), 1));
        program.decls.var_mut(var).input = Some(input);
        program.decls.input_mut(input).var = Some(var);

        add_section(&mut program, vec![make::set_var(var, make::int(1, 1), 1)]);

        let output = write_program(&program);
        assert!(output.contains("slider2:0.5<0,1,0>Gain"), "got: {output}");
        assert!(output.contains("slider2 = 1;"), "got: {output}");
    }

    #[test]
    fn empty_paren_block_renders_zero() {
        let program = Program::default();
        let writer = Writer {
            decls: &program.decls,
            out: String::new(),
        };
        assert_eq!(writer.render_paren_block(&[]), "(0)");
    }
}
