use crate::block::{BasicBlock, BlockId, Terminator};
use crate::instructions::Instruction;
use crate::types::Type;
use crate::values::{InstId, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub ret_ty: Type,
    pub params: Vec<Parameter>,
    pub blocks: IndexMap<BlockId, BasicBlock>,
    inst_blocks: HashMap<InstId, BlockId>,
    next_block_id: u32,
    next_inst_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub noalias: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            noalias: false,
        }
    }

    pub fn noalias(mut self) -> Self {
        self.noalias = true;
        self
    }
}

impl Function {
    pub fn new(name: impl Into<String>, ret_ty: Type) -> Self {
        Self {
            name: name.into(),
            ret_ty,
            params: Vec::new(),
            blocks: IndexMap::new(),
            inst_blocks: HashMap::new(),
            next_block_id: 0,
            next_inst_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_param(&mut self, param: Parameter) -> Value {
        let index = self.params.len() as u32;
        self.params.push(param);
        Value::Param(index)
    }

    pub fn create_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(id, BasicBlock::new(id, name));
        id
    }

    pub fn new_inst_id(&mut self) -> InstId {
        let id = InstId(self.next_inst_id);
        self.next_inst_id += 1;
        id
    }

    /// Appends to `block`; returns `false` when the block does not exist.
    pub fn append(&mut self, block: BlockId, inst: Instruction) -> bool {
        match self.blocks.get_mut(&block) {
            Some(bb) => {
                self.inst_blocks.insert(inst.id, block);
                bb.add_instruction(inst);
                true
            }
            None => false,
        }
    }

    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) -> bool {
        match self.blocks.get_mut(&block) {
            Some(bb) => {
                bb.set_terminator(term);
                true
            }
            None => false,
        }
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.blocks.keys().next().copied()
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    pub fn block_by_name(&self, name: &str) -> Option<&BasicBlock> {
        self.blocks.values().find(|b| b.name == name)
    }

    pub fn block_name(&self, id: BlockId) -> String {
        self.blocks
            .get(&id)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Every non-terminator instruction in layout order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.values().flat_map(|b| b.instructions.iter())
    }

    /// Instructions including block terminators.
    pub fn instruction_count(&self) -> usize {
        self.blocks.values().map(BasicBlock::len).sum()
    }

    pub fn inst(&self, id: InstId) -> Option<&Instruction> {
        let block = self.inst_blocks.get(&id)?;
        self.blocks[block].instructions.iter().find(|i| i.id == id)
    }

    pub fn inst_mut(&mut self, id: InstId) -> Option<&mut Instruction> {
        let block = self.inst_blocks.get(&id)?;
        self.blocks
            .get_mut(block)?
            .instructions
            .iter_mut()
            .find(|i| i.id == id)
    }

    pub fn inst_block(&self, id: InstId) -> Option<BlockId> {
        self.inst_blocks.get(&id).copied()
    }

    /// The instruction that defines `value`, if it is a local.
    pub fn defining_inst(&self, value: &Value) -> Option<&Instruction> {
        value.as_local().and_then(|id| self.inst(id))
    }

    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|b| b.successors().contains(&block))
            .map(|b| b.id)
            .collect()
    }

    pub fn value_type(&self, value: &Value) -> Option<Type> {
        match value {
            Value::Local(id) => self.inst(*id).map(|i| i.ty),
            Value::Param(idx) => self.params.get(*idx as usize).map(|p| p.ty),
            Value::Global(_) => Some(Type::Ptr),
            Value::Const(c) => Some(c.ty()),
        }
    }

    pub fn value_name(&self, value: &Value) -> String {
        self.display(value).to_string()
    }

    pub fn display<'a>(&'a self, value: &'a Value) -> ValueDisplay<'a> {
        ValueDisplay {
            function: self,
            value,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Renders a value the way reports name it: locals and parameters bare,
/// globals with `@`, constants as literals.
pub struct ValueDisplay<'a> {
    function: &'a Function,
    value: &'a Value,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Local(id) => match self.function.inst(*id).and_then(|i| i.name.as_deref()) {
                Some(name) => f.write_str(name),
                None => write!(f, "{}", id),
            },
            Value::Param(idx) => match self.function.params.get(*idx as usize) {
                Some(param) => f.write_str(&param.name),
                None => write!(f, "arg{}", idx),
            },
            Value::Global(name) => write!(f, "@{}", name),
            Value::Const(c) => write!(f, "{}", c),
        }
    }
}
