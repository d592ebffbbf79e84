//! The syntax tree and its declaration arenas.
//!
//! Nodes are sum types per syntactic category. Declarations (variables,
//! functions, structs, inputs) live in per-program arenas and statements
//! reference them by id, so back-references never dangle while passes splice
//! and rewrite the tree. A pass "deletes" a declaration by replacing its
//! statement slot with [`Stmt::Null`]; the arena entry stays alive for any
//! remaining back-references.

use smallvec::SmallVec;
use strum::Display;

use crate::types::{Primitive, TypeRef};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

id_type!(
    /// Index of a [`VarDecl`] in [`Decls::vars`].
    VarId
);
id_type!(
    /// Index of a [`FuncDecl`] in [`Decls::funcs`].
    FuncId
);
id_type!(
    /// Index of a [`StructDecl`] in [`Decls::structs`].
    StructId
);
id_type!(
    /// Index of an [`InputDecl`] in [`Decls::inputs`].
    InputId
);
id_type!(
    /// Index of an [`AssignInfo`] in [`Program::assigns`].
    AssignId
);
id_type!(
    /// Identity of a section, assigned by the global-section pass.
    SectionId
);

/// Binary operators, in the grouping the type-conversion pass cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOp {
    #[strum(serialize = "&&")]
    BoolAnd,
    #[strum(serialize = "||")]
    BoolOr,
    #[strum(serialize = "==")]
    IsEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessOrEqual,

    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "~")]
    Xor,

    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "^")]
    Exponent,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "<<")]
    LeftShift,
    #[strum(serialize = ">>")]
    RightShift,

    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+=")]
    AddAssign,
    #[strum(serialize = "-=")]
    SubtractAssign,
    #[strum(serialize = "*=")]
    MultiplyAssign,
    #[strum(serialize = "/=")]
    DivideAssign,
    #[strum(serialize = "%=")]
    ModuloAssign,
    #[strum(serialize = "^=")]
    ExponentAssign,
    #[strum(serialize = "&=")]
    BitAndAssign,
    #[strum(serialize = "|=")]
    BitOrAssign,
    #[strum(serialize = "~=")]
    XorAssign,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::AddAssign
                | Self::SubtractAssign
                | Self::MultiplyAssign
                | Self::DivideAssign
                | Self::ModuloAssign
                | Self::ExponentAssign
                | Self::BitAndAssign
                | Self::BitOrAssign
                | Self::XorAssign
        )
    }

    /// The underlying operator of a compound assignment.
    pub fn compound_base(self) -> Option<Self> {
        Some(match self {
            Self::AddAssign => Self::Add,
            Self::SubtractAssign => Self::Subtract,
            Self::MultiplyAssign => Self::Multiply,
            Self::DivideAssign => Self::Divide,
            Self::ModuloAssign => Self::Modulo,
            Self::ExponentAssign => Self::Exponent,
            Self::BitAndAssign => Self::BitAnd,
            Self::BitOrAssign => Self::BitOr,
            Self::XorAssign => Self::Xor,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOp {
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "!")]
    Negate,
    #[strum(serialize = "++")]
    Increment,
    #[strum(serialize = "--")]
    Decrement,
    #[strum(serialize = "*")]
    Dereference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralKind {
    /// Numbers keep their source spelling; integers are normalized to
    /// decimal at parse time.
    Number(String),
    Str(String),
    Bool(bool),
    /// A primitive type used in expression position (sizeof, type exprs).
    Primitive(Primitive),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralExpr {
    pub line: u32,
    pub kind: LiteralKind,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub line: u32,
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub line: u32,
    pub op: UnaryOp,
    pub postfix: bool,
    pub expr: Expr,
}

/// What an identifier chain resolved to: exactly one referent per resolved
/// access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolved {
    #[default]
    Unresolved,
    Var(VarId),
    Func(FuncId),
    Struct(StructId),
}

/// An assignment site a variable value can originate from: a declaration's
/// initializer or a tracked `var = rhs` expression statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignRef {
    Var(VarId),
    Stmt(AssignId),
}

#[derive(Debug, Clone, Default)]
pub struct MemberAccessExpr {
    pub line: u32,
    /// Base expression (`f().x` has the call here); [`Expr::Null`] if none.
    pub base: Expr,
    /// The written identifier chain; empty for synthesized accesses.
    pub idents: SmallVec<[String; 2]>,
    pub resolved: Resolved,
    /// The declared variable a struct member chain starts from.
    pub root_var: Option<VarId>,
    /// Intermediate member declarations between root and leaf, in order.
    pub parents: SmallVec<[VarId; 2]>,
    /// Assignments already observed at this use site (variable-deps pass).
    pub deps: SmallVec<[AssignRef; 2]>,
}

#[derive(Debug, Clone)]
pub struct SubscriptExpr {
    pub line: u32,
    pub base: Expr,
    pub index: Expr,
    /// Element type saved when an array-typed base collapses to its `ptr`
    /// member; the type-conversion pass prefers it over the base's pointer
    /// element.
    pub type_before_collapse: Option<TypeRef>,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub line: u32,
    pub base: Expr,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct BlockExpr {
    pub ty: TypeRef,
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct SizeOfExpr {
    pub line: u32,
    /// Exactly one of `expr` / `ty` is set after resolution.
    pub expr: Expr,
    pub ty: Option<TypeRef>,
}

#[derive(Debug, Clone, Default)]
pub enum Expr {
    /// Absent expression (no initializer, no base, removed node).
    #[default]
    Null,
    Literal(LiteralExpr),
    Binary(Box<BinaryExpr>),
    Unary(Box<UnaryExpr>),
    Member(Box<MemberAccessExpr>),
    Subscript(Box<SubscriptExpr>),
    Call(Box<CallExpr>),
    Block(Box<BlockExpr>),
    SizeOf(Box<SizeOfExpr>),
}

impl Expr {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn line(&self) -> u32 {
        match self {
            Self::Null => 0,
            Self::Literal(l) => l.line,
            Self::Binary(b) => b.line,
            Self::Unary(u) => u.line,
            Self::Member(m) => m.line,
            Self::Subscript(s) => s.line,
            Self::Call(c) => c.line,
            Self::Block(b) => b.block.line,
            Self::SizeOf(s) => s.line,
        }
    }

    /// The `var = rhs` shape the use-analysis passes track: an assignment
    /// whose left side is a resolved variable access.
    pub fn as_var_assignment(&self) -> Option<(VarId, &Expr)> {
        if let Self::Binary(binary) = self
            && binary.op == BinaryOp::Assign
            && let Self::Member(member) = &binary.left
            && let Resolved::Var(var) = member.resolved
        {
            return Some((var, &binary.right));
        }
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub line: u32,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub line: u32,
    pub expr: Expr,
    /// Use-analysis bookkeeping slot, allocated by the variable-deps pass
    /// for tracked assignments.
    pub assign: Option<AssignId>,
}

impl ExprStmt {
    pub fn new(expr: Expr, line: u32) -> Self {
        Self {
            line,
            expr,
            assign: None,
        }
    }
}

/// Flags and counters for one tracked assignment statement, stored
/// program-side so use-analysis environments can reach them by id.
#[derive(Debug, Clone, Default)]
pub struct AssignInfo {
    pub use_count: i32,
    pub unused: bool,
    pub keep_right: bool,
    pub do_not_optimize: bool,
    pub section: Option<SectionId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub public_specified: bool,
    pub public_value: bool,
    pub external_specified: bool,
    pub external_value: bool,
}

impl Modifiers {
    pub fn is_public(self) -> bool {
        self.public_value
    }

    pub fn is_external(self) -> bool {
        self.external_value
    }
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub line: u32,
    pub name: String,
    pub external_name: Option<String>,
    pub ty: TypeRef,
    pub init: Expr,
    pub modifiers: Modifiers,
    /// Assigned by the unique-name pass; 0 until then.
    pub unique: u32,
    /// Instantiated leaf variables, aligned with the struct's member order.
    pub sub_vars: Vec<VarId>,
    /// Set on the synthetic variable backing an `input` statement.
    pub input: Option<InputId>,
    /// Set on incoming function parameters (copy-propagation boundary rule).
    pub param_of: Option<FuncId>,
    pub section: Option<SectionId>,
    pub use_count: i32,
    pub unused: bool,
    pub keep_right: bool,
    pub do_not_optimize: bool,
}

impl VarDecl {
    pub fn new(name: String, ty: TypeRef, line: u32) -> Self {
        Self {
            line,
            name,
            external_name: None,
            ty,
            init: Expr::Null,
            modifiers: Modifiers::default(),
            unique: 0,
            sub_vars: Vec::new(),
            input: None,
            param_of: None,
            section: None,
            use_count: 0,
            unused: false,
            keep_right: false,
            do_not_optimize: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub line: u32,
    pub name: String,
    pub external_name: Option<String>,
    pub ty: TypeRef,
    pub params: Vec<VarId>,
    /// `None` for external functions.
    pub block: Option<Block>,
    pub variadic: bool,
    pub modifiers: Modifiers,
    pub unique: u32,
    /// Marks functions synthesized by block-expression outlining.
    pub is_block_expression: bool,
    /// The flattened return slot declared by the control-flow pass; struct
    /// returns are read through this variable's leaves at call sites.
    pub return_value: Option<VarId>,
    pub use_count: i32,
    pub unused: bool,
    /// Functions this one references, for cascading dead-function removal.
    pub deps: SmallVec<[FuncId; 4]>,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub line: u32,
    /// Empty for synthesized array structs.
    pub name: String,
    /// Member templates; instantiation copies these per declared variable.
    pub members: Vec<VarId>,
    pub modifiers: Modifiers,
    pub is_array_type: bool,
}

/// Index of the `ptr` member in a synthesized array struct.
pub const ARRAY_PTR_MEMBER: usize = 0;
/// Index of the `length` member in a synthesized array struct.
pub const ARRAY_LENGTH_MEMBER: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliderShape {
    #[default]
    NotSet,
    Logarithmic,
    Polynomial,
}

#[derive(Debug, Clone)]
pub struct InputDecl {
    pub line: u32,
    pub name: String,
    pub properties: Option<PropertyList>,
    pub modifiers: Modifiers,
    pub slider_number: u32,
    pub default_value: String,
    pub min: String,
    pub max: String,
    pub increment: String,
    pub description: String,
    pub shape: SliderShape,
    pub midpoint: Option<String>,
    pub exponent: String,
    pub linear_automation: bool,
    pub hidden: bool,
    /// The synthetic float variable reads and writes go through.
    pub var: Option<VarId>,
}

impl InputDecl {
    pub fn new(name: String, properties: Option<PropertyList>, modifiers: Modifiers, line: u32) -> Self {
        Self {
            line,
            name,
            properties,
            modifiers,
            slider_number: 0,
            default_value: String::new(),
            min: String::new(),
            max: String::new(),
            increment: String::new(),
            description: String::new(),
            shape: SliderShape::NotSet,
            midpoint: None,
            exponent: String::new(),
            linear_automation: false,
            hidden: false,
            var: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GfxIdleMode {
    #[default]
    NotSet,
    WhenClosed,
    Always,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PinList {
    #[default]
    Unset,
    /// `in_pins: []` — explicitly none.
    None,
    Pins(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct DescStmt {
    pub line: u32,
    pub properties: Option<PropertyList>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub in_pins: PinList,
    pub out_pins: PinList,
    pub all_keyboard: bool,
    pub max_memory: Option<String>,
    pub no_meter: bool,
    pub gfx_hz: Option<String>,
    pub idle_mode: GfxIdleMode,
}

impl DescStmt {
    pub fn new(properties: Option<PropertyList>, line: u32) -> Self {
        Self {
            line,
            properties,
            description: None,
            tags: None,
            in_pins: PinList::Unset,
            out_pins: PinList::Unset,
            all_keyboard: false,
            max_memory: None,
            no_meter: false,
            gfx_hz: None,
            idle_mode: GfxIdleMode::NotSet,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportStmt {
    pub line: u32,
    pub path: String,
    /// Resolved by the module loader.
    pub module_name: String,
    pub modifiers: Modifiers,
    pub builtin: bool,
}

#[derive(Debug, Clone)]
pub struct ModifierStmt {
    pub line: u32,
    pub state: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SectionKind {
    #[strum(serialize = "init")]
    Init,
    #[strum(serialize = "slider")]
    Slider,
    #[strum(serialize = "block")]
    Block,
    #[strum(serialize = "sample")]
    Sample,
    #[strum(serialize = "serialize")]
    Serialize,
    #[strum(serialize = "gfx")]
    Gfx,
}

impl SectionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "init" => Self::Init,
            "slider" => Self::Slider,
            "block" => Self::Block,
            "sample" => Self::Sample,
            "serialize" => Self::Serialize,
            "gfx" => Self::Gfx,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SectionStmt {
    pub line: u32,
    pub kind: SectionKind,
    pub block: Block,
    pub properties: Option<PropertyList>,
    pub width: Option<String>,
    pub height: Option<String>,
    /// Assigned by the global-section pass.
    pub id: Option<SectionId>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub line: u32,
    pub cond: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub line: u32,
    pub cond: Expr,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub line: u32,
    pub init: Stmt,
    pub cond: Expr,
    pub incr: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControlKind {
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct LoopControlStmt {
    pub line: u32,
    pub kind: LoopControlKind,
}

/// What a `return` statement returns from, tagged by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnOwner {
    #[default]
    Untagged,
    Func(FuncId),
    Section,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub line: u32,
    pub expr: Expr,
    pub owner: ReturnOwner,
}

#[derive(Debug, Clone, Default)]
pub enum Stmt {
    /// Removed statement; writers and walkers skip it.
    #[default]
    Null,
    Expression(ExprStmt),
    VarDecl(VarId),
    FuncDecl(FuncId),
    StructDecl(StructId),
    Input(InputId),
    Desc(DescStmt),
    Import(ImportStmt),
    Modifier(ModifierStmt),
    Section(Box<SectionStmt>),
    Block(Block),
    If(Box<IfStmt>),
    While(Box<WhileStmt>),
    For(Box<ForStmt>),
    LoopControl(LoopControlStmt),
    Return(Box<ReturnStmt>),
}

impl Stmt {
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyList {
    pub props: Vec<Property>,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub line: u32,
    pub key: PropertyKey,
    pub value: PropertyValue,
}

#[derive(Debug, Clone)]
pub enum PropertyValue {
    Expr(Expr),
    List(PropertyList),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKey {
    DefaultValue,
    Min,
    Max,
    Increment,
    Description,
    Hidden,
    Shape,
    Midpoint,
    Exponent,
    LinearAutomation,
    Type,
    Width,
    Height,
    Tags,
    Pin,
    InPins,
    OutPins,
    Options,
    AllKeyboard,
    MaxMemory,
    NoMeter,
    Gfx,
    IdleMode,
    Hz,
}

impl PropertyKey {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "default_value" => Self::DefaultValue,
            "min" => Self::Min,
            "max" => Self::Max,
            "increment" => Self::Increment,
            "description" => Self::Description,
            "hidden" => Self::Hidden,
            "shape" => Self::Shape,
            "midpoint" => Self::Midpoint,
            "exponent" => Self::Exponent,
            "linear_automation" => Self::LinearAutomation,
            "type" => Self::Type,
            "width" => Self::Width,
            "height" => Self::Height,
            "tags" => Self::Tags,
            "pin" => Self::Pin,
            "in_pins" => Self::InPins,
            "out_pins" => Self::OutPins,
            "options" => Self::Options,
            "all_keyboard" => Self::AllKeyboard,
            "max_memory" => Self::MaxMemory,
            "no_meter" => Self::NoMeter,
            "gfx" => Self::Gfx,
            "idle_mode" => Self::IdleMode,
            "hz" => Self::Hz,
            _ => return None,
        })
    }
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct Module {
    pub path: String,
    pub name: String,
    pub stmts: Vec<Stmt>,
}

/// Declaration arenas. Entries are never removed or moved; ids stay valid
/// for the whole compilation.
#[derive(Debug, Default)]
pub struct Decls {
    pub vars: Vec<VarDecl>,
    pub funcs: Vec<FuncDecl>,
    pub structs: Vec<StructDecl>,
    pub inputs: Vec<InputDecl>,
}

impl Decls {
    pub fn alloc_var(&mut self, decl: VarDecl) -> VarId {
        self.vars.push(decl);
        VarId(u32::try_from(self.vars.len() - 1).unwrap())
    }

    pub fn alloc_func(&mut self, decl: FuncDecl) -> FuncId {
        self.funcs.push(decl);
        FuncId(u32::try_from(self.funcs.len() - 1).unwrap())
    }

    pub fn alloc_struct(&mut self, decl: StructDecl) -> StructId {
        self.structs.push(decl);
        StructId(u32::try_from(self.structs.len() - 1).unwrap())
    }

    pub fn alloc_input(&mut self, decl: InputDecl) -> InputId {
        self.inputs.push(decl);
        InputId(u32::try_from(self.inputs.len() - 1).unwrap())
    }

    pub fn var(&self, id: VarId) -> &VarDecl {
        &self.vars[id.index()]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut VarDecl {
        &mut self.vars[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &FuncDecl {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut FuncDecl {
        &mut self.funcs[id.index()]
    }

    pub fn strct(&self, id: StructId) -> &StructDecl {
        &self.structs[id.index()]
    }

    pub fn strct_mut(&mut self, id: StructId) -> &mut StructDecl {
        &mut self.structs[id.index()]
    }

    pub fn input(&self, id: InputId) -> &InputDecl {
        &self.inputs[id.index()]
    }

    pub fn input_mut(&mut self, id: InputId) -> &mut InputDecl {
        &mut self.inputs[id.index()]
    }
}

/// The merged, topologically ordered program all passes operate on.
#[derive(Debug, Default)]
pub struct Program {
    pub modules: Vec<Module>,
    pub decls: Decls,
    pub assigns: Vec<AssignInfo>,
    pub next_section: u32,
}

impl Program {
    pub fn alloc_section_id(&mut self) -> SectionId {
        let id = SectionId(self.next_section);
        self.next_section += 1;
        id
    }
}

/// Node-building helpers shared by the passes.
pub mod make {
    use super::{
        BinaryExpr, BinaryOp, Block, Expr, ExprStmt, LiteralExpr, LiteralKind, MemberAccessExpr, Resolved, Stmt,
        UnaryExpr, UnaryOp, VarId,
    };

    /// A resolved read of `var` with no written identifier chain.
    pub fn var_read(var: VarId, line: u32) -> Expr {
        Expr::Member(Box::new(MemberAccessExpr {
            line,
            resolved: Resolved::Var(var),
            ..MemberAccessExpr::default()
        }))
    }

    pub fn int(value: u64, line: u32) -> Expr {
        Expr::Literal(LiteralExpr {
            line,
            kind: LiteralKind::Number(value.to_string()),
        })
    }

    pub fn boolean(value: bool, line: u32) -> Expr {
        Expr::Literal(LiteralExpr {
            line,
            kind: LiteralKind::Bool(value),
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, line: u32) -> Expr {
        Expr::Binary(Box::new(BinaryExpr { line, op, left, right }))
    }

    pub fn unary(op: UnaryOp, expr: Expr, line: u32) -> Expr {
        Expr::Unary(Box::new(UnaryExpr {
            line,
            op,
            postfix: false,
            expr,
        }))
    }

    /// `lhs = rhs` as a statement.
    pub fn assign_stmt(left: Expr, right: Expr, line: u32) -> Stmt {
        Stmt::Expression(ExprStmt::new(binary(BinaryOp::Assign, left, right, line), line))
    }

    /// `var = value` as a statement.
    pub fn set_var(var: VarId, value: Expr, line: u32) -> Stmt {
        assign_stmt(var_read(var, line), value, line)
    }

    /// Truncation toward zero: `expr | 0`.
    pub fn int_conversion(expr: Expr, line: u32) -> Expr {
        binary(BinaryOp::BitOr, expr, int(0, line), line)
    }

    /// Boolean normalization: `!!expr`.
    pub fn bool_conversion(expr: Expr, line: u32) -> Expr {
        unary(UnaryOp::Negate, unary(UnaryOp::Negate, expr, line), line)
    }

    pub fn block_of(stmts: Vec<Stmt>, line: u32) -> Block {
        Block { line, stmts }
    }
}
