use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    Int(u16),
    Float,
    Double,
    Ptr,
    Label,
}

impl Type {
    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    pub fn is_first_class(&self) -> bool {
        !matches!(self, Type::Void | Type::Label)
    }

    /// Number of bytes a load or store of this type touches.
    pub fn store_size(&self) -> Option<u64> {
        match self {
            Type::Int(bits) => Some((u64::from(*bits) + 7) / 8),
            Type::Float => Some(4),
            Type::Double => Some(8),
            Type::Ptr => Some(8),
            Type::Void | Type::Label => None,
        }
    }

    pub fn bit_width(&self) -> Option<u16> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Ptr => write!(f, "ptr"),
            Type::Label => write!(f, "label"),
        }
    }
}
