use crate::block::BlockId;
use crate::types::Type;
use crate::values::{InstId, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    pub name: Option<String>,
    /// Result type; `Void` for instructions that produce nothing.
    pub ty: Type,
    pub kind: InstKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InstKind {
    Alloca {
        allocated: Type,
    },
    Load {
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
        value_ty: Type,
    },
    PtrAdd {
        element: Type,
        base: Value,
        index: Value,
    },
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    Cast {
        op: CastOp,
        value: Value,
    },
    Select {
        cond: Value,
        then_value: Value,
        else_value: Value,
    },
    Phi {
        incoming: Vec<(Value, BlockId)>,
    },
    Call {
        callee: Callee,
        args: Vec<Value>,
    },
}

/// Coarse classification the inspection passes dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstClass {
    Load,
    Store,
    Call,
    Phi,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Callee {
    Direct(String),
    Indirect(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Shl,
    SDiv,
    UDiv,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
}

impl Instruction {
    pub fn class(&self) -> InstClass {
        match &self.kind {
            InstKind::Load { .. } => InstClass::Load,
            InstKind::Store { .. } => InstClass::Store,
            InstKind::Call { .. } => InstClass::Call,
            InstKind::Phi { .. } => InstClass::Phi,
            _ => InstClass::Other,
        }
    }

    pub fn is_phi(&self) -> bool {
        self.class() == InstClass::Phi
    }

    pub fn produces_value(&self) -> bool {
        self.ty != Type::Void
    }

    /// Pointer operand of a load or store.
    pub fn pointer_operand(&self) -> Option<&Value> {
        match &self.kind {
            InstKind::Load { ptr } | InstKind::Store { ptr, .. } => Some(ptr),
            _ => None,
        }
    }

    /// Type read by a load or written by a store.
    pub fn accessed_type(&self) -> Option<Type> {
        match &self.kind {
            InstKind::Load { .. } => Some(self.ty),
            InstKind::Store { value_ty, .. } => Some(*value_ty),
            _ => None,
        }
    }

    /// Name of the callee when it is known statically.
    pub fn called_function(&self) -> Option<&str> {
        match &self.kind {
            InstKind::Call {
                callee: Callee::Direct(name),
                ..
            } => Some(name),
            _ => None,
        }
    }

    pub fn call_args(&self) -> &[Value] {
        match &self.kind {
            InstKind::Call { args, .. } => args,
            _ => &[],
        }
    }

    pub fn phi_incoming(&self) -> &[(Value, BlockId)] {
        match &self.kind {
            InstKind::Phi { incoming } => incoming,
            _ => &[],
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match &self.kind {
            InstKind::Alloca { .. } => Vec::new(),
            InstKind::Load { ptr } => vec![ptr],
            InstKind::Store { value, ptr, .. } => vec![value, ptr],
            InstKind::PtrAdd { base, index, .. } => vec![base, index],
            InstKind::Binary { lhs, rhs, .. } | InstKind::ICmp { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Select {
                cond,
                then_value,
                else_value,
            } => vec![cond, then_value, else_value],
            InstKind::Phi { incoming } => incoming.iter().map(|(v, _)| v).collect(),
            InstKind::Call { callee, args } => {
                let mut ops: Vec<&Value> = args.iter().collect();
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops
            }
        }
    }
}

impl BinaryOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Shl => "shl",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::UDiv => "udiv",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "add" => Some(BinaryOp::Add),
            "sub" => Some(BinaryOp::Sub),
            "mul" => Some(BinaryOp::Mul),
            "shl" => Some(BinaryOp::Shl),
            "sdiv" => Some(BinaryOp::SDiv),
            "udiv" => Some(BinaryOp::UDiv),
            "and" => Some(BinaryOp::And),
            "or" => Some(BinaryOp::Or),
            "xor" => Some(BinaryOp::Xor),
            _ => None,
        }
    }
}

impl IntPredicate {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(IntPredicate::Eq),
            "ne" => Some(IntPredicate::Ne),
            "slt" => Some(IntPredicate::Slt),
            "sle" => Some(IntPredicate::Sle),
            "sgt" => Some(IntPredicate::Sgt),
            "sge" => Some(IntPredicate::Sge),
            "ult" => Some(IntPredicate::Ult),
            "ule" => Some(IntPredicate::Ule),
            "ugt" => Some(IntPredicate::Ugt),
            "uge" => Some(IntPredicate::Uge),
            _ => None,
        }
    }
}

impl CastOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::Trunc => "trunc",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "zext" => Some(CastOp::ZExt),
            "sext" => Some(CastOp::SExt),
            "trunc" => Some(CastOp::Trunc),
            _ => None,
        }
    }
}

impl fmt::Display for InstClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstClass::Load => "load",
            InstClass::Store => "store",
            InstClass::Call => "call",
            InstClass::Phi => "phi",
            InstClass::Other => "other",
        };
        f.write_str(s)
    }
}
