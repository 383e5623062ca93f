use crate::analysis::alias::ModRefInfo;
use crate::function::Function;
use crate::types::Type;
use crate::values::Constant;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: IndexMap<String, Function>,
    pub declarations: IndexMap<String, FunctionDecl>,
    pub globals: IndexMap<String, GlobalVariable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub ret_ty: Type,
    pub params: Vec<Type>,
    pub effect: MemoryEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: Type,
    pub init: Option<Constant>,
}

/// What a callee may do to memory, as declared with `memory(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryEffect {
    pub access: ModRefInfo,
    /// Only memory reachable from pointer arguments is touched.
    pub arg_mem_only: bool,
}

impl MemoryEffect {
    pub const NONE: MemoryEffect = MemoryEffect {
        access: ModRefInfo::NoModRef,
        arg_mem_only: false,
    };

    pub const UNKNOWN: MemoryEffect = MemoryEffect {
        access: ModRefInfo::ModRef,
        arg_mem_only: false,
    };

    pub fn new(access: ModRefInfo) -> Self {
        Self {
            access,
            arg_mem_only: false,
        }
    }

    pub fn arg_mem(access: ModRefInfo) -> Self {
        Self {
            access,
            arg_mem_only: true,
        }
    }
}

impl Default for MemoryEffect {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for MemoryEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access {
            ModRefInfo::NoModRef => "none",
            ModRefInfo::Ref => "read",
            ModRefInfo::Mod => "write",
            ModRefInfo::ModRef => "readwrite",
        };
        if self.arg_mem_only {
            write!(f, "memory(argmem: {})", access)
        } else {
            write!(f, "memory({})", access)
        }
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn declare(&mut self, decl: FunctionDecl) {
        self.declarations.insert(decl.name.clone(), decl);
    }

    pub fn add_global(&mut self, global: GlobalVariable) {
        self.globals.insert(global.name.clone(), global);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn declaration(&self, name: &str) -> Option<&FunctionDecl> {
        self.declarations.get(name)
    }

    /// Functions that have a body, in definition order.
    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values().filter(|f| !f.is_declaration())
    }
}
