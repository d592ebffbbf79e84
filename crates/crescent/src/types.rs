//! Types and the effective/pointer collapse rules.
//!
//! A [`TypeRef`] is the pair (type expression, modifier) the parser builds.
//! After resolution, array modifiers are gone (rewritten to synthesized
//! structs) and named types carry their struct reference. The conversion
//! pass works on [`PrimitiveInfo`]: pointers collapse to `int` values whose
//! pointee kind is remembered separately.

use std::fmt;

use strum::Display;

use crate::ast::{Decls, Expr, LiteralKind, Resolved, StructId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Primitive {
    #[strum(serialize = "any")]
    Any,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "string")]
    Str,
    #[strum(serialize = "char")]
    Char,
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "void")]
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeModifier {
    #[default]
    None,
    Pointer,
    Array,
}

/// The expression part of a type: a primitive or a named struct path.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Primitive(Primitive, u32),
    /// Identifier chain, optionally module-qualified; resolved to a struct.
    Named {
        line: u32,
        idents: Vec<String>,
        resolved: Option<StructId>,
    },
}

#[derive(Debug, Clone)]
pub struct TypeRef {
    pub expr: TypeExpr,
    pub modifier: TypeModifier,
}

impl TypeRef {
    pub fn primitive(primitive: Primitive, line: u32) -> Self {
        Self {
            expr: TypeExpr::Primitive(primitive, line),
            modifier: TypeModifier::None,
        }
    }

    pub fn to_struct(id: StructId) -> Self {
        Self {
            expr: TypeExpr::Named {
                line: 0,
                idents: Vec::new(),
                resolved: Some(id),
            },
            modifier: TypeModifier::None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.modifier == TypeModifier::None
            && matches!(self.expr, TypeExpr::Primitive(Primitive::Void, _))
    }
}

/// Effective/pointer view of a type for the conversion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveInfo {
    /// The runtime kind an expression of this type evaluates to.
    pub effective: Primitive,
    /// The pointee kind when `is_pointer`; equals `effective` otherwise.
    pub pointer: Primitive,
    /// Pointer to a struct rather than a primitive.
    pub pointer_is_struct: bool,
    pub is_pointer: bool,
}

impl PrimitiveInfo {
    pub fn plain(primitive: Primitive) -> Self {
        Self {
            effective: primitive,
            pointer: primitive,
            pointer_is_struct: false,
            is_pointer: false,
        }
    }
}

impl fmt::Display for PrimitiveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pointer {
            if self.pointer_is_struct {
                f.write_str("(struct type)*")
            } else {
                write!(f, "{}*", self.pointer)
            }
        } else {
            write!(f, "{}", self.effective)
        }
    }
}

/// Struct view of a type: which struct a value or pointee belongs to.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructInfo {
    pub effective: Option<StructId>,
    pub pointer: Option<StructId>,
    pub is_pointer: bool,
}

pub fn primitive_info_of_type(ty: &TypeRef) -> PrimitiveInfo {
    let is_pointer = ty.modifier == TypeModifier::Pointer;
    match &ty.expr {
        TypeExpr::Primitive(primitive, _) => PrimitiveInfo {
            effective: if is_pointer { Primitive::Int } else { *primitive },
            pointer: *primitive,
            pointer_is_struct: false,
            is_pointer,
        },
        TypeExpr::Named { .. } => PrimitiveInfo {
            // a struct has no primitive value of its own; only its pointer
            // collapses to something expressible
            effective: if is_pointer { Primitive::Int } else { Primitive::Any },
            pointer: Primitive::Any,
            pointer_is_struct: true,
            is_pointer,
        },
    }
}

pub fn struct_info_of_type(ty: &TypeRef) -> StructInfo {
    match &ty.expr {
        TypeExpr::Primitive(..) => StructInfo::default(),
        TypeExpr::Named { resolved, .. } => {
            let id = *resolved;
            if ty.modifier == TypeModifier::Pointer {
                StructInfo {
                    effective: None,
                    pointer: id,
                    is_pointer: true,
                }
            } else {
                StructInfo {
                    effective: id,
                    pointer: None,
                    is_pointer: false,
                }
            }
        }
    }
}

/// The declared type of an expression, when one can be named. Synthesized
/// nodes use this to give hoisted temporaries and lifted block expressions
/// their types.
pub fn type_of_expr(decls: &Decls, expr: &Expr) -> TypeRef {
    match expr {
        Expr::Member(member) => match member.resolved {
            Resolved::Var(var) => decls.var(var).ty.clone(),
            Resolved::Func(func) => decls.func(func).ty.clone(),
            Resolved::Struct(id) => TypeRef::to_struct(id),
            Resolved::Unresolved => TypeRef::primitive(Primitive::Any, member.line),
        },
        Expr::Call(call) => type_of_expr(decls, &call.base),
        Expr::Subscript(subscript) => {
            if let Some(saved) = &subscript.type_before_collapse {
                saved.clone()
            } else {
                let base = primitive_info_of_type(&type_of_expr(decls, &subscript.base));
                if base.is_pointer && !base.pointer_is_struct {
                    TypeRef::primitive(base.pointer, subscript.line)
                } else {
                    TypeRef::primitive(Primitive::Any, subscript.line)
                }
            }
        }
        Expr::Literal(literal) => {
            let primitive = match &literal.kind {
                LiteralKind::Number(text) => {
                    if text.contains('.') {
                        Primitive::Float
                    } else {
                        Primitive::Int
                    }
                }
                LiteralKind::Str(_) => Primitive::Str,
                LiteralKind::Bool(_) => Primitive::Bool,
                LiteralKind::Primitive(primitive) => *primitive,
            };
            TypeRef::primitive(primitive, literal.line)
        }
        Expr::Unary(unary) => type_of_expr(decls, &unary.expr),
        Expr::Binary(binary) if binary.op.is_assignment() => type_of_expr(decls, &binary.left),
        Expr::Block(block) => block.ty.clone(),
        _ => TypeRef::primitive(Primitive::Any, expr.line()),
    }
}

/// Struct view of an expression's type.
pub fn struct_info_of_expr(decls: &Decls, expr: &Expr) -> StructInfo {
    match expr {
        Expr::Member(member) => match member.resolved {
            Resolved::Var(var) => struct_info_of_type(&decls.var(var).ty),
            Resolved::Func(func) => struct_info_of_type(&decls.func(func).ty),
            Resolved::Struct(id) => StructInfo {
                effective: Some(id),
                pointer: None,
                is_pointer: false,
            },
            Resolved::Unresolved => StructInfo::default(),
        },
        Expr::Call(call) => struct_info_of_expr(decls, &call.base),
        Expr::Block(block) => struct_info_of_type(&block.ty),
        Expr::Binary(binary) if binary.op.is_assignment() => struct_info_of_expr(decls, &binary.left),
        Expr::Subscript(subscript) => {
            // indexing a struct pointer yields a struct value
            let base = struct_info_of_expr(decls, &subscript.base);
            if base.is_pointer {
                StructInfo {
                    effective: base.pointer,
                    pointer: None,
                    is_pointer: false,
                }
            } else {
                StructInfo::default()
            }
        }
        _ => StructInfo::default(),
    }
}

/// Number of scalar slots a value of this type occupies; what `sizeof`
/// evaluates to.
pub fn scalar_size_of_type(decls: &Decls, ty: &TypeRef) -> u64 {
    if ty.modifier == TypeModifier::Pointer {
        return 1;
    }
    match &ty.expr {
        TypeExpr::Primitive(..) => 1,
        TypeExpr::Named { resolved, .. } => match resolved {
            Some(id) => decls
                .strct(*id)
                .members
                .iter()
                .map(|member| scalar_size_of_type(decls, &decls.var(*member).ty))
                .sum(),
            None => 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{StructDecl, VarDecl};

    #[test]
    fn pointer_collapses_to_int() {
        let ty = TypeRef {
            expr: TypeExpr::Primitive(Primitive::Float, 1),
            modifier: TypeModifier::Pointer,
        };
        let info = primitive_info_of_type(&ty);
        assert_eq!(info.effective, Primitive::Int);
        assert_eq!(info.pointer, Primitive::Float);
        assert!(info.is_pointer);
        assert_eq!(info.to_string(), "float*");
    }

    #[test]
    fn scalar_sizes_flatten_structs() {
        let mut decls = Decls::default();
        let x = decls.alloc_var(VarDecl::new("x".into(), TypeRef::primitive(Primitive::Float, 0), 0));
        let y = decls.alloc_var(VarDecl::new("y".into(), TypeRef::primitive(Primitive::Float, 0), 0));
        let inner = decls.alloc_struct(StructDecl {
            line: 0,
            name: "Inner".into(),
            members: vec![x, y],
            modifiers: crate::ast::Modifiers::default(),
            is_array_type: false,
        });
        let inner_var = decls.alloc_var(VarDecl::new("v".into(), TypeRef::to_struct(inner), 0));
        let z = decls.alloc_var(VarDecl::new("z".into(), TypeRef::primitive(Primitive::Int, 0), 0));
        let outer = decls.alloc_struct(StructDecl {
            line: 0,
            name: "Outer".into(),
            members: vec![inner_var, z],
            modifiers: crate::ast::Modifiers::default(),
            is_array_type: false,
        });

        assert_eq!(scalar_size_of_type(&decls, &TypeRef::to_struct(inner)), 2);
        assert_eq!(scalar_size_of_type(&decls, &TypeRef::to_struct(outer)), 3);
        assert_eq!(
            scalar_size_of_type(&decls, &TypeRef::primitive(Primitive::Int, 0)),
            1
        );
    }
}
