//! Recursive-descent parser.
//!
//! Alternatives return `CompileResult<Option<T>>`: `Ok(None)` means the
//! production did not match and the caller may try the next one. Anything
//! consumed before a hard error stays consumed.
//!
//! Declarations are allocated straight into the program's arenas; the
//! returned statement list references them by id.

use smallvec::SmallVec;

use crate::{
    ast::{
        BinaryOp, Block, BlockExpr, CallExpr, Decls, DescStmt, Expr, ExprStmt, ForStmt, FuncDecl, IfStmt,
        ImportStmt, InputDecl, LiteralExpr, LiteralKind, LoopControlKind, LoopControlStmt, MemberAccessExpr,
        ModifierStmt, Modifiers, Property, PropertyKey, PropertyList, PropertyValue, ReturnStmt, SectionKind,
        SectionStmt, SizeOfExpr, Stmt, StructDecl, SubscriptExpr, UnaryExpr, UnaryOp, VarDecl, VarId, WhileStmt,
        make,
    },
    error::{CompileError, CompileResult},
    token::{Token, TokenKind},
    types::{Primitive, TypeExpr, TypeModifier, TypeRef},
};

type Parsed<T> = CompileResult<Option<T>>;

/// Parses one file's tokens into a statement list, allocating declarations
/// into `decls`.
pub fn parse(file: &str, tokens: &[Token], decls: &mut Decls) -> CompileResult<Vec<Stmt>> {
    let mut parser = Parser {
        file,
        tokens,
        pos: 0,
        decls,
    };
    parser.parse_program()
}

/// Hidden name used by parser-synthesized temporaries (struct initializers).
pub const TEMP_NAME: &str = "__temp";

struct Parser<'a> {
    file: &'a str,
    tokens: &'a [Token],
    pos: usize,
    decls: &'a mut Decls,
}

impl Parser<'_> {
    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn line(&self) -> u32 {
        self.current().line
    }

    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(message, self.line(), self.file).with_token(self.current().kind)
    }

    fn match_one(&mut self, kind: TokenKind) -> Option<Token> {
        if self.current().kind == kind {
            let token = self.current().clone();
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        for &kind in kinds {
            if let Some(token) = self.match_one(kind) {
                return Some(token);
            }
        }
        None
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> CompileResult<Token> {
        self.match_one(kind).ok_or_else(|| self.err(message))
    }

    fn unexpected_token(&self) -> CompileError {
        self.err("Unexpected token \"#t\"")
    }

    // ---- program ----------------------------------------------------------

    fn parse_program(&mut self) -> CompileResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        let mut allow_imports = true;

        loop {
            if self.match_one(TokenKind::EndOfFile).is_some() {
                break;
            }

            let Some(stmt) = self.parse_statement()? else {
                return Err(self.unexpected_token());
            };

            if !matches!(stmt, Stmt::Import(_) | Stmt::Modifier(_)) {
                allow_imports = false;
            }
            if matches!(stmt, Stmt::Import(_)) && !allow_imports {
                return Err(self.err("Import statements must be at the top of the file"));
            }

            if !matches!(
                stmt,
                Stmt::Section(_)
                    | Stmt::FuncDecl(_)
                    | Stmt::StructDecl(_)
                    | Stmt::VarDecl(_)
                    | Stmt::Modifier(_)
                    | Stmt::Import(_)
                    | Stmt::Input(_)
                    | Stmt::Desc(_)
            ) {
                return Err(self.err(
                    "Expected section statement, variable declaration, struct declaration, or function declaration",
                ));
            }

            stmts.push(stmt);
        }

        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Parsed<Stmt> {
        if let Some(stmt) = self.parse_if_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_loop_control_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_while_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_for_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_section_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_desc_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_input_or_declaration(Modifiers::default(), false)? {
            return Ok(Some(stmt));
        }
        if let Some(block) = self.parse_block_statement()? {
            return Ok(Some(Stmt::Block(block)));
        }
        if let Some(stmt) = self.parse_return_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_modifier_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_expression_statement()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_modifier_declaration()? {
            return Ok(Some(stmt));
        }
        Ok(None)
    }

    // ---- declarations ------------------------------------------------------

    /// `input`/`struct`/`import` need no leading modifiers to be recognized;
    /// plain declarations are only tried here when `after_modifiers` (the
    /// expression-statement hacks have had their chance first otherwise).
    fn parse_input_or_declaration(&mut self, modifiers: Modifiers, after_modifiers: bool) -> Parsed<Stmt> {
        if let Some(stmt) = self.parse_input_statement(modifiers)? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_struct_declaration(modifiers)? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_import_statement(modifiers)? {
            return Ok(Some(stmt));
        }
        if after_modifiers && let Some(stmt) = self.parse_declaration(modifiers)? {
            return Ok(Some(stmt));
        }
        Ok(None)
    }

    fn parse_modifier_declaration(&mut self) -> Parsed<Stmt> {
        let (modifiers, has_any) = self.parse_modifiers()?;

        if let Some(stmt) = self.parse_input_or_declaration(modifiers, true)? {
            return Ok(Some(stmt));
        }

        if has_any {
            Err(self.err("Expected declaration after modifiers"))
        } else {
            Ok(None)
        }
    }

    fn parse_modifiers(&mut self) -> CompileResult<(Modifiers, bool)> {
        let mut state = Modifiers::default();
        let mut has_any = false;

        while let Some(token) = self.match_any(&[
            TokenKind::Public,
            TokenKind::Private,
            TokenKind::External,
            TokenKind::Internal,
        ]) {
            has_any = true;
            match token.kind {
                TokenKind::Public | TokenKind::Private => {
                    if state.public_specified {
                        return Err(self.err("Cannot have more than one modifier of the same type"));
                    }
                    state.public_specified = true;
                    state.public_value = token.kind == TokenKind::Public;
                }
                TokenKind::External | TokenKind::Internal => {
                    if state.external_specified {
                        return Err(self.err("Cannot have more than one modifier of the same type"));
                    }
                    state.external_specified = true;
                    state.external_value = token.kind == TokenKind::External;
                }
                _ => unreachable!(),
            }
        }

        Ok((state, has_any))
    }

    fn parse_modifier_statement(&mut self) -> Parsed<Stmt> {
        let line = self.line();
        let start = self.pos;

        let (state, has_any) = self.parse_modifiers()?;
        if !has_any || self.match_one(TokenKind::Colon).is_none() {
            self.pos = start;
            return Ok(None);
        }

        Ok(Some(Stmt::Modifier(ModifierStmt { line, state })))
    }

    fn parse_declaration(&mut self, modifiers: Modifiers) -> Parsed<Stmt> {
        let Some((ty, name, line)) = self.parse_type_and_identifier()? else {
            return Ok(None);
        };

        if let Some(stmt) = self.parse_function_declaration(modifiers, &ty, &name, line)? {
            return Ok(Some(stmt));
        }
        let var = self.parse_variable_declaration(modifiers, ty, name, line, true, true)?;
        Ok(Some(Stmt::VarDecl(var)))
    }

    fn parse_type_and_identifier(&mut self) -> Parsed<(TypeRef, String, u32)> {
        let Some(ty) = self.parse_type()? else {
            return Ok(None);
        };
        let token = self.expect(TokenKind::Identifier, "Expected identifier after type")?;
        Ok(Some((ty, token.text, token.line)))
    }

    fn parse_external_identifier(&mut self) -> Parsed<String> {
        if self.match_one(TokenKind::As).is_none() {
            return Ok(None);
        }
        let token = self.expect(TokenKind::Identifier, "Expected identifier after \"as\"")?;
        Ok(Some(token.text))
    }

    fn parse_variable_declaration(
        &mut self,
        modifiers: Modifiers,
        ty: TypeRef,
        name: String,
        line: u32,
        expect_semicolon: bool,
        allow_initializer: bool,
    ) -> CompileResult<VarId> {
        let external_name = self.parse_external_identifier()?;

        let mut init = Expr::Null;
        if self.match_one(TokenKind::Equals).is_some() {
            if !allow_initializer {
                return Err(self.err("Variable initializers are not allowed here"));
            }
            init = self
                .parse_expression()?
                .ok_or_else(|| self.err("Expected expression"))?;
        }

        if expect_semicolon && self.match_one(TokenKind::Semicolon).is_none() {
            return Err(self.unexpected_token());
        }

        let mut decl = VarDecl::new(name, ty, line);
        decl.external_name = external_name;
        decl.init = init;
        decl.modifiers = modifiers;
        Ok(self.decls.alloc_var(decl))
    }

    // parameters allow default values; defaults must be trailing, which the
    // resolver checks once overloads are known
    fn parse_parameter(&mut self) -> Parsed<VarId> {
        let Some((ty, name, line)) = self.parse_type_and_identifier()? else {
            return Ok(None);
        };
        let var = self.parse_variable_declaration(Modifiers::default(), ty, name, line, false, true)?;
        Ok(Some(var))
    }

    fn parse_function_declaration(
        &mut self,
        modifiers: Modifiers,
        ty: &TypeRef,
        name: &str,
        line: u32,
    ) -> Parsed<Stmt> {
        if self.match_one(TokenKind::LeftBracket).is_none() {
            return Ok(None);
        }

        let mut params = Vec::new();
        let mut variadic = false;
        loop {
            let Some(param) = self.parse_parameter()? else {
                if self.match_one(TokenKind::Ellipsis).is_some() {
                    variadic = true;
                }
                break;
            };
            params.push(param);
            if self.match_one(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RightBracket, "Unexpected token \"#t\"")?;

        let block = self.parse_block_statement()?;
        let external_name = self.parse_external_identifier()?;

        if block.is_none() && self.match_one(TokenKind::Semicolon).is_none() {
            return Err(self.err("Expected \";\""));
        }

        let func = self.decls.alloc_func(FuncDecl {
            line,
            name: name.to_owned(),
            external_name,
            ty: ty.clone(),
            params,
            block,
            variadic,
            modifiers,
            unique: 0,
            is_block_expression: false,
            return_value: None,
            use_count: 0,
            unused: false,
            deps: SmallVec::new(),
        });
        Ok(Some(Stmt::FuncDecl(func)))
    }

    fn parse_struct_declaration(&mut self, modifiers: Modifiers) -> Parsed<Stmt> {
        if self.match_one(TokenKind::Struct).is_none() {
            return Ok(None);
        }

        let name = self.expect(TokenKind::Identifier, "Expected struct name")?;
        self.expect(TokenKind::LeftCurlyBracket, "Expected \"{\" after struct name")?;

        let mut members = Vec::new();
        loop {
            let Some((ty, member_name, line)) = self.parse_type_and_identifier()? else {
                break;
            };
            let member =
                self.parse_variable_declaration(Modifiers::default(), ty, member_name, line, false, false)?;
            self.expect(TokenKind::Semicolon, "Expected \";\"")?;
            members.push(member);
        }

        if self.match_one(TokenKind::RightCurlyBracket).is_none() {
            return Err(self.unexpected_token());
        }

        let id = self.decls.alloc_struct(StructDecl {
            line: name.line,
            name: name.text,
            members,
            modifiers,
            is_array_type: false,
        });
        Ok(Some(Stmt::StructDecl(id)))
    }

    fn parse_import_statement(&mut self, modifiers: Modifiers) -> Parsed<Stmt> {
        let Some(import) = self.match_one(TokenKind::Import) else {
            return Ok(None);
        };

        let path = self.expect(TokenKind::StringLiteral, "Expected path after \"import\"")?;
        self.expect(TokenKind::Semicolon, "Expected \";\"")?;

        Ok(Some(Stmt::Import(ImportStmt {
            line: import.line,
            path: path.text,
            module_name: String::new(),
            modifiers,
            builtin: false,
        })))
    }

    fn parse_input_statement(&mut self, modifiers: Modifiers) -> Parsed<Stmt> {
        if self.match_one(TokenKind::Input).is_none() {
            return Ok(None);
        }

        let name = self.expect(TokenKind::Identifier, "Expected input name")?;
        let properties = self.parse_property_list()?;
        self.expect(TokenKind::Semicolon, "Expected \";\"")?;

        let id = self
            .decls
            .alloc_input(InputDecl::new(name.text, properties, modifiers, name.line));
        Ok(Some(Stmt::Input(id)))
    }

    fn parse_desc_statement(&mut self) -> Parsed<Stmt> {
        let Some(keyword) = self.match_one(TokenKind::Desc) else {
            return Ok(None);
        };

        let properties = self.parse_property_list()?;
        self.expect(TokenKind::Semicolon, "Expected \";\"")?;

        Ok(Some(Stmt::Desc(DescStmt::new(properties, keyword.line))))
    }

    // ---- property lists ----------------------------------------------------

    fn parse_property_list(&mut self) -> Parsed<PropertyList> {
        if self.match_one(TokenKind::LeftSquareBracket).is_none() {
            return Ok(None);
        }

        let mut props = Vec::new();
        loop {
            let Some(prop) = self.parse_property()? else {
                break;
            };
            props.push(prop);
            if self.match_one(TokenKind::Comma).is_none() {
                break;
            }
        }

        if self.match_one(TokenKind::RightSquareBracket).is_none() {
            return Err(self.unexpected_token());
        }

        Ok(Some(PropertyList { props }))
    }

    fn parse_property(&mut self) -> Parsed<Property> {
        let Some(name) = self.match_one(TokenKind::Identifier) else {
            return Ok(None);
        };

        let Some(key) = PropertyKey::from_name(&name.text) else {
            return Err(CompileError::new("Invalid property type", name.line, self.file));
        };

        self.expect(TokenKind::Colon, "Expected \":\"")?;

        let value = if let Some(expr) = self.parse_expression()? {
            PropertyValue::Expr(expr)
        } else if let Some(list) = self.parse_property_list()? {
            PropertyValue::List(list)
        } else {
            return Err(self.err("Expected value"));
        };

        Ok(Some(Property {
            line: name.line,
            key,
            value,
        }))
    }

    // ---- sections and control flow -----------------------------------------

    fn parse_section_statement(&mut self) -> Parsed<Stmt> {
        if self.match_one(TokenKind::At).is_none() {
            return Ok(None);
        }

        let name = self.expect(TokenKind::Identifier, "Expected identifier after \"@\"")?;
        let Some(kind) = SectionKind::from_name(&name.text) else {
            return Err(CompileError::new("Unknown section type", name.line, self.file));
        };

        let properties = self.parse_property_list()?;
        let block = self
            .parse_block_statement()?
            .ok_or_else(|| self.err("Expected block after section statement"))?;

        Ok(Some(Stmt::Section(Box::new(SectionStmt {
            line: name.line,
            kind,
            block,
            properties,
            width: None,
            height: None,
            id: None,
        }))))
    }

    fn parse_block_statement(&mut self) -> Parsed<Block> {
        let Some(opening) = self.match_one(TokenKind::LeftCurlyBracket) else {
            return Ok(None);
        };

        let mut stmts = Vec::new();
        while let Some(stmt) = self.parse_statement()? {
            if matches!(stmt, Stmt::Section(_)) {
                return Err(self.err("Nested sections are not allowed"));
            }
            if matches!(stmt, Stmt::StructDecl(_)) {
                return Err(self.err("Struct declarations not allowed inside code blocks"));
            }
            stmts.push(stmt);
        }

        if self.match_one(TokenKind::RightCurlyBracket).is_none() {
            return Err(self.unexpected_token());
        }

        Ok(Some(Block {
            line: opening.line,
            stmts,
        }))
    }

    fn parse_if_statement(&mut self) -> Parsed<Stmt> {
        let Some(if_token) = self.match_one(TokenKind::If) else {
            return Ok(None);
        };

        self.expect(TokenKind::LeftBracket, "Expected \"(\"")?;
        let cond = self
            .parse_expression()?
            .ok_or_else(|| self.err("Expected expression in if statement"))?;
        self.expect(TokenKind::RightBracket, "Expected \")\"")?;

        let then_block = self.parse_statement_as_block(if_token.line, "Expected statement")?;

        let mut else_block = None;
        if let Some(else_token) = self.match_one(TokenKind::Else) {
            else_block = Some(self.parse_statement_as_block(else_token.line, "Expected statement after \"else\"")?);
        }

        Ok(Some(Stmt::If(Box::new(IfStmt {
            line: if_token.line,
            cond,
            then_block,
            else_block,
        }))))
    }

    fn parse_statement_as_block(&mut self, line: u32, message: &str) -> CompileResult<Block> {
        let stmt = self.parse_statement()?.ok_or_else(|| self.err(message))?;
        Ok(match stmt {
            Stmt::Block(block) => block,
            other => Block {
                line,
                stmts: vec![other],
            },
        })
    }

    fn parse_while_statement(&mut self) -> Parsed<Stmt> {
        let Some(while_token) = self.match_one(TokenKind::While) else {
            return Ok(None);
        };

        self.expect(TokenKind::LeftBracket, "Expected \"(\"")?;
        let cond = self
            .parse_expression()?
            .ok_or_else(|| self.err("Expected expression"))?;
        self.expect(TokenKind::RightBracket, "Expected \")\"")?;

        let body = self.parse_statement_as_block(while_token.line, "Expected statement for loop body")?;

        Ok(Some(Stmt::While(Box::new(WhileStmt {
            line: while_token.line,
            cond,
            body,
        }))))
    }

    fn parse_for_statement(&mut self) -> Parsed<Stmt> {
        let Some(for_token) = self.match_one(TokenKind::For) else {
            return Ok(None);
        };

        self.expect(TokenKind::LeftBracket, "Expected \"(\"")?;

        let init = self.parse_statement()?.unwrap_or(Stmt::Null);
        if !matches!(init, Stmt::Null | Stmt::VarDecl(_) | Stmt::Expression(_)) {
            return Err(self.err(
                "Only expression and variable declaration statements are allowed inside for loop initializers",
            ));
        }
        if init.is_null() {
            self.expect(TokenKind::Semicolon, "Expected \";\"")?;
        }

        let cond = self.parse_expression()?.unwrap_or(Expr::Null);
        self.expect(TokenKind::Semicolon, "Expected \";\"")?;

        let incr = self.parse_expression()?.unwrap_or(Expr::Null);
        self.expect(TokenKind::RightBracket, "Expected \")\"")?;

        let body = self.parse_statement_as_block(for_token.line, "Expected statement for loop body")?;

        Ok(Some(Stmt::For(Box::new(ForStmt {
            line: for_token.line,
            init,
            cond,
            incr,
            body,
        }))))
    }

    fn parse_loop_control_statement(&mut self) -> Parsed<Stmt> {
        let Some(token) = self.match_any(&[TokenKind::Break, TokenKind::Continue]) else {
            return Ok(None);
        };
        self.expect(TokenKind::Semicolon, "Expected \";\"")?;
        Ok(Some(Stmt::LoopControl(LoopControlStmt {
            line: token.line,
            kind: if token.kind == TokenKind::Break {
                LoopControlKind::Break
            } else {
                LoopControlKind::Continue
            },
        })))
    }

    fn parse_return_statement(&mut self) -> Parsed<Stmt> {
        let Some(return_token) = self.match_one(TokenKind::Return) else {
            return Ok(None);
        };

        let expr = self.parse_expression()?.unwrap_or(Expr::Null);
        self.expect(TokenKind::Semicolon, "Expected \";\"")?;

        Ok(Some(Stmt::Return(Box::new(ReturnStmt {
            line: return_token.line,
            expr,
            owner: crate::ast::ReturnOwner::Untagged,
        }))))
    }

    fn parse_expression_statement(&mut self) -> Parsed<Stmt> {
        let start = self.pos;

        let Some(expr) = self.parse_expression()? else {
            return Ok(None);
        };

        // backtrack when the expression is really the front of a variable
        // declaration: `T* name = …` parses as multiplication, `T name` as a
        // member access followed by an identifier
        if let Expr::Binary(binary) = &expr {
            let looks_like_pointer_decl = match binary.op {
                BinaryOp::Multiply => true,
                BinaryOp::Assign => {
                    matches!(&binary.left, Expr::Binary(left) if left.op == BinaryOp::Multiply)
                }
                _ => false,
            };
            if looks_like_pointer_decl {
                self.pos = start;
                return Ok(None);
            }
        }
        if matches!(expr, Expr::Member(_)) {
            let before = self.pos;
            if self.match_one(TokenKind::Identifier).is_some() {
                self.pos = start;
                return Ok(None);
            }
            if self.match_one(TokenKind::LeftSquareBracket).is_some()
                && self.match_one(TokenKind::RightSquareBracket).is_some()
                && self.match_one(TokenKind::Identifier).is_some()
            {
                self.pos = start;
                return Ok(None);
            }
            self.pos = before;
        }

        if self.match_one(TokenKind::Semicolon).is_none() {
            return Err(self.err("Expected \";\""));
        }

        let line = expr.line();
        Ok(Some(Stmt::Expression(ExprStmt::new(expr, line))))
    }

    // ---- types -------------------------------------------------------------

    fn parse_primitive_type(&mut self) -> Option<(Primitive, u32)> {
        let token = self.match_any(&[
            TokenKind::Any,
            TokenKind::Float,
            TokenKind::Int,
            TokenKind::StringType,
            TokenKind::Char,
            TokenKind::Bool,
            TokenKind::Void,
        ])?;
        let primitive = match token.kind {
            TokenKind::Any => Primitive::Any,
            TokenKind::Float => Primitive::Float,
            TokenKind::Int => Primitive::Int,
            TokenKind::StringType => Primitive::Str,
            TokenKind::Char => Primitive::Char,
            TokenKind::Bool => Primitive::Bool,
            TokenKind::Void => Primitive::Void,
            _ => unreachable!(),
        };
        Some((primitive, token.line))
    }

    fn parse_type(&mut self) -> Parsed<TypeRef> {
        let start = self.pos;

        let expr = if let Some((primitive, line)) = self.parse_primitive_type() {
            Some(TypeExpr::Primitive(primitive, line))
        } else {
            let line = self.line();
            self.parse_identifier_chain()?.map(|idents| TypeExpr::Named {
                line,
                idents,
                resolved: None,
            })
        };

        let Some(expr) = expr else {
            self.pos = start;
            return Ok(None);
        };

        let mut modifier = TypeModifier::None;
        if self.match_one(TokenKind::LeftSquareBracket).is_some() {
            // `name[expr]` is a subscript, not an array type
            if self.parse_expression()?.is_some() {
                self.pos = start;
                return Ok(None);
            }
            if self.match_one(TokenKind::RightSquareBracket).is_none() {
                return Err(self.err("Expected \"]\""));
            }
            modifier = TypeModifier::Array;
        } else if self.match_one(TokenKind::Asterisk).is_some() {
            modifier = TypeModifier::Pointer;
        }

        Ok(Some(TypeRef { expr, modifier }))
    }

    fn parse_identifier_chain(&mut self) -> Parsed<Vec<String>> {
        let mut idents: Vec<String> = Vec::new();

        loop {
            if !idents.is_empty() && self.match_one(TokenKind::Dot).is_none() {
                break;
            }

            let Some(token) = self.match_one(TokenKind::Identifier) else {
                if idents.is_empty() {
                    return Ok(None);
                }
                return Err(self.err("Expected identifier after \".\""));
            };
            idents.push(token.text);
        }

        Ok(Some(idents))
    }

    // ---- expressions -------------------------------------------------------

    fn parse_expression(&mut self) -> Parsed<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Parsed<Expr> {
        const OPERATORS: &[TokenKind] = &[
            TokenKind::Equals,
            TokenKind::PlusEquals,
            TokenKind::MinusEquals,
            TokenKind::AsteriskEquals,
            TokenKind::SlashEquals,
            TokenKind::PercentEquals,
            TokenKind::CaretEquals,
            TokenKind::AmpersandEquals,
            TokenKind::PipeEquals,
            TokenKind::TildeEquals,
        ];

        let Some(first) = self.parse_boolean_or()? else {
            return Ok(None);
        };

        // right associative: collect operands, then fold from the right
        let mut exprs = vec![first];
        let mut ops: Vec<Token> = Vec::new();
        while let Some(op) = self.match_any(OPERATORS) {
            let right = self.parse_boolean_or()?.ok_or_else(|| {
                CompileError::new(
                    format!("Expected expression after operator \"{}\"", op.kind.spelling()),
                    self.line(),
                    self.file,
                )
            })?;
            exprs.push(right);
            ops.push(op);
        }

        let mut result = exprs.pop().expect("at least one operand");
        while let Some(op) = ops.pop() {
            let left = exprs.pop().expect("operand per operator");
            result = make::binary(binary_op_for_token(op.kind), left, result, op.line);
        }
        Ok(Some(result))
    }

    fn parse_left_binary(
        &mut self,
        operators: &[TokenKind],
        next: fn(&mut Self) -> Parsed<Expr>,
    ) -> Parsed<Expr> {
        let Some(mut left) = next(self)? else {
            return Ok(None);
        };

        while let Some(op) = self.match_any(operators) {
            let right = next(self)?.ok_or_else(|| {
                CompileError::new(
                    format!("Expected expression after operator \"{}\"", op.kind.spelling()),
                    self.line(),
                    self.file,
                )
            })?;
            left = make::binary(binary_op_for_token(op.kind), left, right, op.line);
        }

        Ok(Some(left))
    }

    fn parse_boolean_or(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(&[TokenKind::PipePipe], Self::parse_boolean_and)
    }

    fn parse_boolean_and(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(&[TokenKind::AmpersandAmpersand], Self::parse_bitwise_or)
    }

    fn parse_bitwise_or(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(&[TokenKind::Pipe], Self::parse_xor)
    }

    fn parse_xor(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(&[TokenKind::Tilde], Self::parse_bitwise_and)
    }

    fn parse_bitwise_and(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(&[TokenKind::Ampersand], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(
            &[TokenKind::EqualsEquals, TokenKind::ExclamationEquals],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(
            &[
                TokenKind::RightAngleBracket,
                TokenKind::RightAngleEquals,
                TokenKind::LeftAngleBracket,
                TokenKind::LeftAngleEquals,
            ],
            Self::parse_bit_shift,
        )
    }

    fn parse_bit_shift(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(
            &[TokenKind::LeftAngleLeftAngle, TokenKind::RightAngleRightAngle],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(&[TokenKind::Plus, TokenKind::Minus], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(
            &[TokenKind::Asterisk, TokenKind::Slash, TokenKind::Percent],
            Self::parse_exponentiation,
        )
    }

    fn parse_exponentiation(&mut self) -> Parsed<Expr> {
        self.parse_left_binary(&[TokenKind::Caret], Self::parse_postfix_unary)
    }

    fn parse_prefix_unary(&mut self) -> Parsed<Expr> {
        const OPERATORS: &[TokenKind] = &[
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Exclamation,
            TokenKind::PlusPlus,
            TokenKind::MinusMinus,
            TokenKind::Asterisk,
        ];

        let Some(op) = self.match_any(OPERATORS) else {
            return self.parse_primary();
        };

        let expr = self.parse_prefix_unary()?.ok_or_else(|| {
            CompileError::new(
                format!("Expected expression after operator \"{}\"", op.kind.spelling()),
                self.line(),
                self.file,
            )
        })?;

        Ok(Some(Expr::Unary(Box::new(UnaryExpr {
            line: op.line,
            op: unary_op_for_token(op.kind),
            postfix: false,
            expr,
        }))))
    }

    fn parse_postfix_unary(&mut self) -> Parsed<Expr> {
        let Some(expr) = self.parse_prefix_unary()? else {
            return Ok(None);
        };

        if let Some(op) = self.match_any(&[TokenKind::PlusPlus, TokenKind::MinusMinus]) {
            return Ok(Some(Expr::Unary(Box::new(UnaryExpr {
                line: op.line,
                op: unary_op_for_token(op.kind),
                postfix: true,
                expr,
            }))));
        }

        Ok(Some(expr))
    }

    // ---- primaries ---------------------------------------------------------

    fn parse_primary(&mut self) -> Parsed<Expr> {
        let start = self.pos;
        let line = self.line();

        let mut expr = if let Some(expr) = self.parse_sizeof()? {
            Some(expr)
        } else if let Some(expr) = self.parse_literal()? {
            Some(expr)
        } else if let Some(expr) = self.parse_expression_in_brackets()? {
            Some(expr)
        } else if let Some(expr) = self.parse_block_expression()? {
            Some(expr)
        } else {
            None
        };

        let mut had_identifiers = false;
        if expr.is_none() {
            if let Some(idents) = self.parse_identifier_chain()? {
                had_identifiers = true;
                expr = Some(Expr::Member(Box::new(MemberAccessExpr {
                    line,
                    idents: idents.into(),
                    ..MemberAccessExpr::default()
                })));
            }
        }

        let Some(mut expr) = expr else {
            return Ok(None);
        };

        let (_, deref) = self.parse_call_or_subscript(&mut expr)?;

        if matches!(
            expr,
            Expr::Call(_) | Expr::Subscript(_) | Expr::Binary(_) | Expr::Unary(_) | Expr::Block(_)
        ) {
            let continued = self.continue_parse_primary(&mut expr, deref)?;
            if !continued && had_identifiers && matches!(&expr, Expr::Subscript(s) if s.index.is_null()) {
                // `name[]` — really an array type; let the caller backtrack
                self.pos = start;
                return Ok(None);
            }
        }

        if let Expr::Subscript(subscript) = &expr
            && subscript.index.is_null()
        {
            return Err(self.err("Expected expression"));
        }

        Ok(Some(expr))
    }

    /// Dots, calls and subscripts after a primary. Returns whether any
    /// progress was made.
    fn continue_parse_primary(&mut self, expr: &mut Expr, already_deref: bool) -> CompileResult<bool> {
        let line = self.line();

        let mut progressed = false;
        let dot = if already_deref {
            false
        } else {
            self.match_one(TokenKind::Dot).is_some()
        };

        if dot || already_deref {
            let idents = self
                .parse_identifier_chain()?
                .ok_or_else(|| self.err("Expected identifier after member access"))?;
            *expr = Expr::Member(Box::new(MemberAccessExpr {
                line,
                base: expr.take(),
                idents: idents.into(),
                ..MemberAccessExpr::default()
            }));
            progressed = true;
        }

        let (consumed, deref) = self.parse_call_or_subscript(expr)?;
        if !consumed && !dot && !already_deref {
            return Ok(progressed);
        }

        if let Expr::Subscript(subscript) = expr
            && subscript.index.is_null()
        {
            return Err(self.err("Expected expression"));
        }

        self.continue_parse_primary(expr, deref)?;
        Ok(true)
    }

    /// Wraps `expr` in one call/subscript layer when one matches. Returns
    /// (consumed anything, last layer was a `->` dereference followed by an
    /// identifier).
    fn parse_call_or_subscript(&mut self, expr: &mut Expr) -> CompileResult<(bool, bool)> {
        let line = self.line();

        if self.match_one(TokenKind::LeftBracket).is_some() {
            let mut args = Vec::new();
            loop {
                let Some(arg) = self.parse_expression()? else {
                    break;
                };
                args.push(arg);
                if self.match_one(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightBracket, "Unexpected token \"#t\"")?;

            *expr = Expr::Call(Box::new(CallExpr {
                line,
                base: expr.take(),
                args,
            }));
            return Ok((true, false));
        }

        if let Some(token) = self.match_one(TokenKind::MinusRightAngle) {
            *expr = Expr::Subscript(Box::new(SubscriptExpr {
                line: token.line,
                base: expr.take(),
                index: make::int(0, token.line),
                type_before_collapse: None,
            }));
            // `p->x` continues as member access on the dereferenced cell
            return Ok((true, self.current().kind == TokenKind::Identifier));
        }

        if let Some(token) = self.match_one(TokenKind::LeftSquareBracket) {
            let index = self.parse_expression()?.unwrap_or(Expr::Null);
            self.expect(TokenKind::RightSquareBracket, "Expected \"]\"")?;

            *expr = Expr::Subscript(Box::new(SubscriptExpr {
                line: token.line,
                base: expr.take(),
                index,
                type_before_collapse: None,
            }));
            return Ok((true, false));
        }

        Ok((false, false))
    }

    fn parse_expression_in_brackets(&mut self) -> Parsed<Expr> {
        if self.match_one(TokenKind::LeftBracket).is_none() {
            return Ok(None);
        }

        let expr = self
            .parse_expression()?
            .ok_or_else(|| self.err("Expected expression"))?;
        self.expect(TokenKind::RightBracket, "Expected \")\"")?;
        Ok(Some(expr))
    }

    fn parse_sizeof(&mut self) -> Parsed<Expr> {
        let Some(keyword) = self.match_one(TokenKind::SizeOf) else {
            return Ok(None);
        };

        self.expect(TokenKind::LeftBracket, "Expected \"(\" after \"sizeof\"")?;

        let mut expr = self.parse_expression()?.unwrap_or(Expr::Null);
        let mut ty = None;
        if expr.is_null() {
            let parsed = self
                .parse_type()?
                .ok_or_else(|| self.err("Expected expression or type after \"sizeof\""))?;
            // a bare identifier chain is ambiguous; keep both readings and
            // let the resolver decide
            if let TypeExpr::Named { line, idents, .. } = &parsed.expr
                && parsed.modifier == TypeModifier::None
            {
                expr = Expr::Member(Box::new(MemberAccessExpr {
                    line: *line,
                    idents: idents.clone().into(),
                    ..MemberAccessExpr::default()
                }));
            }
            ty = Some(parsed);
        }

        self.expect(TokenKind::RightBracket, "Expected \")\" after \"sizeof\"")?;

        Ok(Some(Expr::SizeOf(Box::new(SizeOfExpr {
            line: keyword.line,
            expr,
            ty,
        }))))
    }

    fn parse_literal(&mut self) -> Parsed<Expr> {
        let Some(token) = self.match_any(&[
            TokenKind::NumberLiteral,
            TokenKind::StringLiteral,
            TokenKind::CharLiteral,
            TokenKind::True,
            TokenKind::False,
        ]) else {
            return Ok(None);
        };

        let kind = match token.kind {
            TokenKind::NumberLiteral => LiteralKind::Number(self.evaluate_number_literal(&token)?),
            TokenKind::StringLiteral => LiteralKind::Str(token.text),
            TokenKind::CharLiteral => {
                // multibyte char: fold bytes big-endian into an integer
                let mut value: u64 = 0;
                for byte in token.text.bytes() {
                    if value > (u64::MAX >> 8) {
                        return Err(CompileError::new("Invalid char literal", token.line, self.file));
                    }
                    value = (value << 8) | u64::from(byte);
                }
                LiteralKind::Number(value.to_string())
            }
            TokenKind::True | TokenKind::False => LiteralKind::Bool(token.kind == TokenKind::True),
            _ => unreachable!(),
        };

        Ok(Some(Expr::Literal(LiteralExpr {
            line: token.line,
            kind,
        })))
    }

    fn evaluate_number_literal(&self, token: &Token) -> CompileResult<String> {
        let text = &token.text;

        if text.contains('.') {
            let mut dots = 0;
            for (i, c) in text.char_indices() {
                if c == '.' {
                    dots += 1;
                    if i == 0 || i == text.len() - 1 {
                        return Err(CompileError::new("Invalid float literal", token.line, self.file));
                    }
                } else if !c.is_ascii_digit() {
                    return Err(CompileError::new("Invalid float literal", token.line, self.file));
                }
            }
            if dots != 1 {
                return Err(CompileError::new("Invalid float literal", token.line, self.file));
            }
            return Ok(text.clone());
        }

        let (digits, base) = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            (rest, 16)
        } else if let Some(rest) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
            (rest, 8)
        } else if let Some(rest) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
            (rest, 2)
        } else {
            (text.as_str(), 10)
        };

        let value = u64::from_str_radix(digits, base)
            .map_err(|_| CompileError::new("Invalid integer literal", token.line, self.file))?;
        Ok(value.to_string())
    }

    // ---- block expressions -------------------------------------------------

    fn parse_block_expression(&mut self) -> Parsed<Expr> {
        let start = self.pos;

        let Some(ty) = self.parse_type()? else {
            return Ok(None);
        };

        #[derive(PartialEq)]
        enum BlockForm {
            Expression,
            StructInitializer,
            Cast,
        }

        // decide which sugar this is before committing
        let after_type = self.pos;
        let mut form = BlockForm::Expression;
        if self.match_one(TokenKind::LeftCurlyBracket).is_some() {
            if self.match_one(TokenKind::Dot).is_some() {
                form = BlockForm::StructInitializer;
            } else if ty.is_void() {
                form = BlockForm::Expression;
            } else if self.match_one(TokenKind::RightCurlyBracket).is_some() {
                form = BlockForm::StructInitializer;
            } else if self.parse_expression()?.is_some() && self.match_one(TokenKind::RightCurlyBracket).is_some() {
                form = BlockForm::Cast;
            }
        }
        self.pos = after_type;

        let block = match form {
            BlockForm::Expression => {
                let Some(block) = self.parse_block_statement()? else {
                    self.pos = start;
                    return Ok(None);
                };
                block
            }
            BlockForm::StructInitializer => self.parse_struct_initializer_block(&ty)?,
            BlockForm::Cast => {
                let opening = self.expect(TokenKind::LeftCurlyBracket, "Expected \"{\"")?;
                let expr = self
                    .parse_expression()?
                    .ok_or_else(|| self.err("Expected expression"))?;
                self.expect(TokenKind::RightCurlyBracket, "Expected \"}\"")?;

                Block {
                    line: opening.line,
                    stmts: vec![Stmt::Return(Box::new(ReturnStmt {
                        line: opening.line,
                        expr,
                        owner: crate::ast::ReturnOwner::Untagged,
                    }))],
                }
            }
        };

        Ok(Some(Expr::Block(Box::new(BlockExpr { ty, block }))))
    }

    // `Type{.a = x, .b = y}` becomes `Type { Type __temp; __temp.a = x; …;
    // return __temp; }`
    fn parse_struct_initializer_block(&mut self, ty: &TypeRef) -> CompileResult<Block> {
        let opening = self.expect(TokenKind::LeftCurlyBracket, "Expected \"{\"")?;
        let line = opening.line;

        let temp = self
            .decls
            .alloc_var(VarDecl::new(TEMP_NAME.to_owned(), ty.clone(), line));

        let mut stmts = vec![Stmt::VarDecl(temp)];
        loop {
            if self.match_one(TokenKind::Dot).is_none() {
                break;
            }
            let Some(idents) = self.parse_identifier_chain()? else {
                return Err(self.err("Expected identifier after \".\""));
            };

            let mut all_idents: SmallVec<[String; 2]> = SmallVec::new();
            all_idents.push(TEMP_NAME.to_owned());
            all_idents.extend(idents);

            self.expect(TokenKind::Equals, "Expected \"=\"")?;
            let value = self
                .parse_expression()?
                .ok_or_else(|| self.err("Expected expression"))?;

            let access = Expr::Member(Box::new(MemberAccessExpr {
                line,
                idents: all_idents,
                ..MemberAccessExpr::default()
            }));
            stmts.push(make::assign_stmt(access, value, line));

            if self.match_one(TokenKind::Comma).is_none() {
                break;
            }
        }
        if self.match_one(TokenKind::RightCurlyBracket).is_none() {
            return Err(self.unexpected_token());
        }

        let temp_access = Expr::Member(Box::new(MemberAccessExpr {
            line,
            idents: std::iter::once(TEMP_NAME.to_owned()).collect(),
            ..MemberAccessExpr::default()
        }));
        stmts.push(Stmt::Return(Box::new(ReturnStmt {
            line,
            expr: temp_access,
            owner: crate::ast::ReturnOwner::Untagged,
        })));

        Ok(Block { line, stmts })
    }
}

fn binary_op_for_token(kind: TokenKind) -> BinaryOp {
    match kind {
        TokenKind::AmpersandAmpersand => BinaryOp::BoolAnd,
        TokenKind::PipePipe => BinaryOp::BoolOr,
        TokenKind::EqualsEquals => BinaryOp::IsEqual,
        TokenKind::ExclamationEquals => BinaryOp::NotEqual,
        TokenKind::RightAngleBracket => BinaryOp::GreaterThan,
        TokenKind::RightAngleEquals => BinaryOp::GreaterOrEqual,
        TokenKind::LeftAngleBracket => BinaryOp::LessThan,
        TokenKind::LeftAngleEquals => BinaryOp::LessOrEqual,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Tilde => BinaryOp::Xor,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Subtract,
        TokenKind::Asterisk => BinaryOp::Multiply,
        TokenKind::Slash => BinaryOp::Divide,
        TokenKind::Caret => BinaryOp::Exponent,
        TokenKind::Percent => BinaryOp::Modulo,
        TokenKind::LeftAngleLeftAngle => BinaryOp::LeftShift,
        TokenKind::RightAngleRightAngle => BinaryOp::RightShift,
        TokenKind::Equals => BinaryOp::Assign,
        TokenKind::PlusEquals => BinaryOp::AddAssign,
        TokenKind::MinusEquals => BinaryOp::SubtractAssign,
        TokenKind::AsteriskEquals => BinaryOp::MultiplyAssign,
        TokenKind::SlashEquals => BinaryOp::DivideAssign,
        TokenKind::PercentEquals => BinaryOp::ModuloAssign,
        TokenKind::CaretEquals => BinaryOp::ExponentAssign,
        TokenKind::AmpersandEquals => BinaryOp::BitAndAssign,
        TokenKind::PipeEquals => BinaryOp::BitOrAssign,
        TokenKind::TildeEquals => BinaryOp::XorAssign,
        _ => unreachable!("not a binary operator token: {kind:?}"),
    }
}

fn unary_op_for_token(kind: TokenKind) -> UnaryOp {
    match kind {
        TokenKind::Plus => UnaryOp::Plus,
        TokenKind::Minus => UnaryOp::Minus,
        TokenKind::Exclamation => UnaryOp::Negate,
        TokenKind::PlusPlus => UnaryOp::Increment,
        TokenKind::MinusMinus => UnaryOp::Decrement,
        TokenKind::Asterisk => UnaryOp::Dereference,
        _ => unreachable!("not a unary operator token: {kind:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    fn parse_source(source: &str) -> (Vec<Stmt>, Decls) {
        let tokens = scan("test.cres", source).unwrap();
        let mut decls = Decls::default();
        let stmts = parse("test.cres", &tokens, &mut decls).unwrap();
        (stmts, decls)
    }

    fn parse_err(source: &str) -> CompileError {
        let tokens = scan("test.cres", source).unwrap();
        let mut decls = Decls::default();
        parse("test.cres", &tokens, &mut decls).unwrap_err()
    }

    #[test]
    fn parses_variable_declaration() {
        let (stmts, decls) = parse_source("int a = 5;");
        let Stmt::VarDecl(var) = &stmts[0] else {
            panic!("expected var decl, got {:?}", stmts[0]);
        };
        let decl = decls.var(*var);
        assert_eq!(decl.name, "a");
        assert!(matches!(&decl.init, Expr::Literal(l) if l.kind == LiteralKind::Number("5".into())));
    }

    #[test]
    fn parses_pointer_and_array_declarations() {
        let (stmts, decls) = parse_source("float* p;\nint[] xs;");
        let Stmt::VarDecl(p) = &stmts[0] else { panic!() };
        assert_eq!(decls.var(*p).ty.modifier, TypeModifier::Pointer);
        let Stmt::VarDecl(xs) = &stmts[1] else { panic!() };
        assert_eq!(decls.var(*xs).ty.modifier, TypeModifier::Array);
    }

    #[test]
    fn parses_function_with_defaults_and_variadic() {
        let (stmts, decls) = parse_source("external any printf(string fmt, ...) as sprintf;\nint f(int a, int b = 2) { return a; }");
        let Stmt::FuncDecl(ext) = &stmts[0] else { panic!() };
        let ext = decls.func(*ext);
        assert!(ext.variadic);
        assert_eq!(ext.external_name.as_deref(), Some("sprintf"));
        assert!(ext.block.is_none());

        let Stmt::FuncDecl(f) = &stmts[1] else { panic!() };
        let f = decls.func(*f);
        assert_eq!(f.params.len(), 2);
        assert!(decls.var(f.params[0]).init.is_null());
        assert!(!decls.var(f.params[1]).init.is_null());
    }

    #[test]
    fn parses_section_with_statements() {
        let (stmts, _) = parse_source("@init { a = 1; if (a > 0) { a = 2; } }");
        let Stmt::Section(section) = &stmts[0] else { panic!() };
        assert_eq!(section.kind, SectionKind::Init);
        assert_eq!(section.block.stmts.len(), 2);
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let (stmts, _) = parse_source("@init { x = 1 + 2 * 3; }");
        let Stmt::Section(section) = &stmts[0] else { panic!() };
        let Stmt::Expression(stmt) = &section.block.stmts[0] else { panic!() };
        let Expr::Binary(assign) = &stmt.expr else { panic!() };
        assert_eq!(assign.op, BinaryOp::Assign);
        let Expr::Binary(add) = &assign.right else { panic!() };
        assert_eq!(add.op, BinaryOp::Add);
        let Expr::Binary(mul) = &add.right else { panic!() };
        assert_eq!(mul.op, BinaryOp::Multiply);
    }

    #[test]
    fn assignment_is_right_associative() {
        let (stmts, _) = parse_source("@init { a = b = 1; }");
        let Stmt::Section(section) = &stmts[0] else { panic!() };
        let Stmt::Expression(stmt) = &section.block.stmts[0] else { panic!() };
        let Expr::Binary(outer) = &stmt.expr else { panic!() };
        assert_eq!(outer.op, BinaryOp::Assign);
        assert!(matches!(&outer.left, Expr::Member(_)));
        let Expr::Binary(inner) = &outer.right else { panic!() };
        assert_eq!(inner.op, BinaryOp::Assign);
    }

    #[test]
    fn arrow_desugars_to_subscript_zero() {
        let (stmts, _) = parse_source("@init { x = p->; }");
        let Stmt::Section(section) = &stmts[0] else { panic!() };
        let Stmt::Expression(stmt) = &section.block.stmts[0] else { panic!() };
        let Expr::Binary(assign) = &stmt.expr else { panic!() };
        let Expr::Subscript(subscript) = &assign.right else { panic!() };
        assert!(matches!(&subscript.index, Expr::Literal(l) if l.kind == LiteralKind::Number("0".into())));
    }

    #[test]
    fn parses_block_expression_with_return() {
        let (stmts, _) = parse_source("@init { x = int { return 5; }; }");
        let Stmt::Section(section) = &stmts[0] else { panic!() };
        let Stmt::Expression(stmt) = &section.block.stmts[0] else { panic!() };
        let Expr::Binary(assign) = &stmt.expr else { panic!() };
        let Expr::Block(block) = &assign.right else { panic!() };
        assert!(matches!(&block.block.stmts[0], Stmt::Return(_)));
    }

    #[test]
    fn parses_struct_initializer_sugar() {
        let (stmts, _) = parse_source("struct V { float x; }\n@init { v = V{.x = 1.0}; }");
        let Stmt::Section(section) = &stmts[1] else { panic!() };
        let Stmt::Expression(stmt) = &section.block.stmts[0] else { panic!() };
        let Expr::Binary(assign) = &stmt.expr else { panic!() };
        let Expr::Block(block) = &assign.right else { panic!() };
        // temp decl, one assignment, return
        assert_eq!(block.block.stmts.len(), 3);
        assert!(matches!(&block.block.stmts[0], Stmt::VarDecl(_)));
        assert!(matches!(&block.block.stmts[2], Stmt::Return(_)));
    }

    #[test]
    fn normalizes_integer_bases() {
        let (stmts, decls) = parse_source("int a = 0x10;\nint b = 0b101;\nint c = 0o17;");
        let values: Vec<String> = stmts
            .iter()
            .map(|stmt| {
                let Stmt::VarDecl(var) = stmt else { panic!() };
                let Expr::Literal(l) = &decls.var(*var).init else { panic!() };
                let LiteralKind::Number(n) = &l.kind else { panic!() };
                n.clone()
            })
            .collect();
        assert_eq!(values, ["16", "5", "15"]);
    }

    #[test]
    fn rejects_bad_float() {
        let err = parse_err("float f = 1.2.3;");
        assert_eq!(err.rendered_message(), "Invalid float literal");
    }

    #[test]
    fn rejects_import_after_declaration() {
        let err = parse_err("int a = 1;\nimport \"x\";");
        assert_eq!(err.rendered_message(), "Import statements must be at the top of the file");
    }

    #[test]
    fn rejects_nested_section() {
        let err = parse_err("@init { @block { } }");
        assert_eq!(err.rendered_message(), "Nested sections are not allowed");
    }

    #[test]
    fn parses_input_and_desc() {
        let (stmts, decls) = parse_source(
            "desc [description: \"My Plugin\", in_pins: [pin: \"left\"]];\ninput gain [default_value: 0.5, min: 0, max: 1];",
        );
        assert!(matches!(&stmts[0], Stmt::Desc(_)));
        let Stmt::Input(input) = &stmts[1] else { panic!() };
        assert_eq!(decls.input(*input).name, "gain");
    }

    #[test]
    fn parses_modifier_statement() {
        let (stmts, _) = parse_source("public external:\nint a = 1;");
        assert!(matches!(&stmts[0], Stmt::Modifier(m) if m.state.is_public() && m.state.is_external()));
    }

    #[test]
    fn member_chain_parses_through_calls() {
        let (stmts, _) = parse_source("@init { x = a.b(1).c; }");
        let Stmt::Section(section) = &stmts[0] else { panic!() };
        let Stmt::Expression(stmt) = &section.block.stmts[0] else { panic!() };
        let Expr::Binary(assign) = &stmt.expr else { panic!() };
        let Expr::Member(member) = &assign.right else { panic!() };
        assert_eq!(member.idents.as_slice(), ["c".to_owned()]);
        assert!(matches!(&member.base, Expr::Call(_)));
    }
}
