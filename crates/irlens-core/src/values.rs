use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstId(pub u32);

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inst{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Local(InstId),
    Param(u32),
    Global(String),
    Const(Constant),
}

impl Value {
    pub fn int(value: i64, ty: Type) -> Self {
        Value::Const(Constant::Int { value, ty })
    }

    pub fn i32(value: i64) -> Self {
        Self::int(value, Type::I32)
    }

    pub fn i64(value: i64) -> Self {
        Self::int(value, Type::I64)
    }

    pub fn null() -> Self {
        Value::Const(Constant::Null)
    }

    pub fn as_local(&self) -> Option<InstId> {
        match self {
            Value::Local(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_constant().and_then(Constant::as_int)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Const(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Int { value: i64, ty: Type },
    Null,
    Undef(Type),
}

impl Constant {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { ty, .. } => *ty,
            Constant::Null => Type::Ptr,
            Constant::Undef(ty) => *ty,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int {
                value,
                ty: Type::Int(1),
            } => write!(f, "{}", *value != 0),
            Constant::Int { value, .. } => write!(f, "{}", value),
            Constant::Null => write!(f, "null"),
            Constant::Undef(_) => write!(f, "undef"),
        }
    }
}
