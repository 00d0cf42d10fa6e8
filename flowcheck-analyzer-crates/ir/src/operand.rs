use std::fmt;

use ordered_float::NotNan;

use super::id::*;
use super::typ::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Int { bits: u32, value: i64 },
    Float { typ: Type, value: NotNan<f64> },
    Null,
    Undef(Type),
}

impl Constant {
    pub fn int(bits: u32, value: i64) -> Self {
        Constant::Int { bits, value }
    }

    pub fn typ(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Float { typ, .. } => typ.clone(),
            Constant::Null => Type::Ptr,
            Constant::Undef(typ) => typ.clone(),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { bits: 1, value } => write!(f, "{}", *value != 0),
            Constant::Int { value, .. } => write!(f, "{}", value),
            // Debugは常に小数点か指数を含むので読み戻してもfloatのまま
            Constant::Float { value, .. } => write!(f, "{:?}", value.into_inner()),
            Constant::Null => write!(f, "null"),
            Constant::Undef(_) => write!(f, "undef"),
        }
    }
}

/// A value consumed by an instruction.
///
/// Function and global references are pointers; everything produced inside a
/// function (including its parameters) is a `Local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Local(LocalId),
    Global(GlobalId),
    Func(FuncId),
    Const(Constant),
}

impl Operand {
    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Operand::Local(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<FuncId> {
        match self {
            Operand::Func(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        // LLVMと同じく関数とグローバルの参照も定数として扱う
        !matches!(self, Operand::Local(_))
    }
}

impl From<Constant> for Operand {
    fn from(c: Constant) -> Self {
        Operand::Const(c)
    }
}
