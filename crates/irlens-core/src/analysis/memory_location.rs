use crate::{instructions::Instruction, values::Value};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationSize {
    Precise(u64),
    Unknown,
}

impl LocationSize {
    pub fn value(&self) -> Option<u64> {
        match self {
            LocationSize::Precise(n) => Some(*n),
            LocationSize::Unknown => None,
        }
    }
}

impl fmt::Display for LocationSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationSize::Precise(n) => write!(f, "{}", n),
            LocationSize::Unknown => write!(f, "unknown"),
        }
    }
}

/// A span of memory: `size` bytes starting `offset` bytes past `ptr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryLocation {
    pub ptr: Value,
    pub size: LocationSize,
    pub offset: Option<i64>,
}

impl MemoryLocation {
    pub fn new(ptr: Value, size: LocationSize) -> Self {
        Self {
            ptr,
            size,
            offset: None,
        }
    }

    /// The location a load or store accesses; `None` for every other instruction.
    pub fn get(inst: &Instruction) -> Option<Self> {
        let ptr = inst.pointer_operand()?;
        let size = inst
            .accessed_type()
            .and_then(|ty| ty.store_size())
            .map(LocationSize::Precise)
            .unwrap_or(LocationSize::Unknown);
        Some(Self::new(ptr.clone(), size))
    }

    pub fn at_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_size(mut self, size: LocationSize) -> Self {
        self.size = size;
        self
    }
}
