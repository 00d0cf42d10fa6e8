use strum_macros::{Display, EnumString, IntoStaticStr};

use super::id::*;
use super::operand::*;
use super::typ::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ICmpPred {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum FCmpPred {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    PtrToInt,
    IntToPtr,
    BitCast,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrCall {
    pub ret_type: Type,
    pub callee: Operand,
    pub args: Vec<Operand>,
}

impl InstrCall {
    // 関数ポインタ経由の呼び出しはNone
    pub fn direct_callee(&self) -> Option<FuncId> {
        self.callee.as_func()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstrKind {
    Alloca(Type),
    Store {
        value: Operand,
        ptr: Operand,
    },
    Load {
        typ: Type,
        ptr: Operand,
    },
    BinOp {
        op: BinOpKind,
        typ: Type,
        lhs: Operand,
        rhs: Operand,
    },
    ICmp {
        pred: ICmpPred,
        typ: Type,
        lhs: Operand,
        rhs: Operand,
    },
    FCmp {
        pred: FCmpPred,
        typ: Type,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        op: CastOp,
        value: Operand,
        to: Type,
    },
    Phi {
        typ: Type,
        incoming: Vec<(Operand, BasicBlockId)>,
    },
    Select {
        cond: Operand,
        then_value: Operand,
        else_value: Operand,
    },
    GetElementPtr {
        typ: Type,
        ptr: Operand,
        indices: Vec<Operand>,
    },
    ExtractValue {
        aggregate: Operand,
        indices: Vec<u32>,
    },
    InsertValue {
        aggregate: Operand,
        value: Operand,
        indices: Vec<u32>,
    },
    ExtractElement {
        vector: Operand,
        index: Operand,
    },
    InsertElement {
        vector: Operand,
        value: Operand,
        index: Operand,
    },
    Call(InstrCall),
}

macro_rules! impl_InstrKind_operands {
    ($name: ident, $($mutability: tt)?) => {
        pub fn $name(&$($mutability)? self) -> Vec<&$($mutability)? Operand> {
            match self {
                InstrKind::Alloca(_) => vec![],
                InstrKind::Store { value, ptr } => vec![value, ptr],
                InstrKind::Load { ptr, .. } => vec![ptr],
                InstrKind::BinOp { lhs, rhs, .. }
                | InstrKind::ICmp { lhs, rhs, .. }
                | InstrKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
                InstrKind::Cast { value, .. } => vec![value],
                InstrKind::Phi { incoming, .. } => {
                    incoming.into_iter().map(|(value, _)| value).collect()
                }
                InstrKind::Select {
                    cond,
                    then_value,
                    else_value,
                } => vec![cond, then_value, else_value],
                InstrKind::GetElementPtr { ptr, indices, .. } => {
                    std::iter::once(ptr).chain(indices).collect()
                }
                InstrKind::ExtractValue { aggregate, .. } => vec![aggregate],
                InstrKind::InsertValue {
                    aggregate, value, ..
                } => vec![aggregate, value],
                InstrKind::ExtractElement { vector, index } => vec![vector, index],
                InstrKind::InsertElement {
                    vector,
                    value,
                    index,
                } => vec![vector, value, index],
                InstrKind::Call(call) => std::iter::once(&$($mutability)? call.callee)
                    .chain(&$($mutability)? call.args)
                    .collect(),
            }
        }
    };
}

macro_rules! impl_InstrKind_bb_ids {
    ($name: ident, $($mutability: tt)?) => {
        pub fn $name(&$($mutability)? self) -> Vec<&$($mutability)? BasicBlockId> {
            match self {
                InstrKind::Phi { incoming, .. } => {
                    incoming.into_iter().map(|(_, bb)| bb).collect()
                }
                _ => vec![],
            }
        }
    };
}

impl InstrKind {
    impl_InstrKind_operands!(operands_mut, mut);
    impl_InstrKind_operands!(operands,);

    impl_InstrKind_bb_ids!(bb_ids_mut, mut);
    impl_InstrKind_bb_ids!(bb_ids,);

    pub fn opcode(&self) -> &'static str {
        match self {
            InstrKind::Alloca(_) => "alloca",
            InstrKind::Store { .. } => "store",
            InstrKind::Load { .. } => "load",
            InstrKind::BinOp { op, .. } => (*op).into(),
            InstrKind::ICmp { .. } => "icmp",
            InstrKind::FCmp { .. } => "fcmp",
            InstrKind::Cast { op, .. } => (*op).into(),
            InstrKind::Phi { .. } => "phi",
            InstrKind::Select { .. } => "select",
            InstrKind::GetElementPtr { .. } => "getelementptr",
            InstrKind::ExtractValue { .. } => "extractvalue",
            InstrKind::InsertValue { .. } => "insertvalue",
            InstrKind::ExtractElement { .. } => "extractelement",
            InstrKind::InsertElement { .. } => "insertelement",
            InstrKind::Call(_) => "call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instr {
    pub local: Option<LocalId>,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TerminatorInstr {
    Br(BasicBlockId),
    CondBr {
        cond: Operand,
        then_bb: BasicBlockId,
        else_bb: BasicBlockId,
    },
    Switch {
        value: Operand,
        default: BasicBlockId,
        cases: Vec<(Constant, BasicBlockId)>,
    },
    IndirectBr {
        addr: Operand,
        dests: Vec<BasicBlockId>,
    },
    Ret(Option<Operand>),
    Unreachable,
}

macro_rules! impl_TerminatorInstr_operands {
    ($name: ident, $($mutability: tt)?) => {
        pub fn $name(&$($mutability)? self) -> Vec<&$($mutability)? Operand> {
            match self {
                TerminatorInstr::Br(_) | TerminatorInstr::Unreachable => vec![],
                TerminatorInstr::CondBr { cond, .. } => vec![cond],
                TerminatorInstr::Switch { value, .. } => vec![value],
                TerminatorInstr::IndirectBr { addr, .. } => vec![addr],
                TerminatorInstr::Ret(value) => value.into_iter().collect(),
            }
        }
    };
}

macro_rules! impl_TerminatorInstr_bb_ids {
    ($name: ident, $($mutability: tt)?) => {
        pub fn $name(&$($mutability)? self) -> Vec<&$($mutability)? BasicBlockId> {
            match self {
                TerminatorInstr::Br(bb) => vec![bb],
                TerminatorInstr::CondBr {
                    then_bb, else_bb, ..
                } => vec![then_bb, else_bb],
                TerminatorInstr::Switch { default, cases, .. } => std::iter::once(default)
                    .chain(cases.into_iter().map(|(_, bb)| bb))
                    .collect(),
                TerminatorInstr::IndirectBr { dests, .. } => dests.into_iter().collect(),
                TerminatorInstr::Ret(_) | TerminatorInstr::Unreachable => vec![],
            }
        }
    };
}

impl TerminatorInstr {
    impl_TerminatorInstr_operands!(operands_mut, mut);
    impl_TerminatorInstr_operands!(operands,);

    impl_TerminatorInstr_bb_ids!(bb_ids_mut, mut);
    impl_TerminatorInstr_bb_ids!(bb_ids,);

    // 重複を含む (switchの複数caseが同じブロックへ飛ぶ場合など)
    pub fn successors(&self) -> impl Iterator<Item = BasicBlockId> {
        self.bb_ids().into_iter().copied()
    }
}
