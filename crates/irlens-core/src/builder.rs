use crate::{
    block::{BlockId, Terminator},
    function::{Function, Parameter},
    instructions::{BinaryOp, Callee, CastOp, InstKind, Instruction, IntPredicate},
    types::Type,
    values::Value,
    IrError, Result,
};

pub struct FunctionBuilder {
    function: Function,
    current_block: Option<BlockId>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, ret_ty: Type) -> Self {
        Self {
            function: Function::new(name, ret_ty),
            current_block: None,
        }
    }

    pub fn param(&mut self, name: &str, ty: Type) -> Value {
        self.function.add_param(Parameter::new(name, ty))
    }

    pub fn noalias_param(&mut self, name: &str, ty: Type) -> Value {
        self.function.add_param(Parameter::new(name, ty).noalias())
    }

    /// Creates a block; the first one created also becomes the insertion point.
    pub fn create_block(&mut self, name: &str) -> BlockId {
        let id = self.function.create_block(name);
        if self.current_block.is_none() {
            self.current_block = Some(id);
        }
        id
    }

    pub fn switch_to_block(&mut self, block: BlockId) -> Result<()> {
        if self.function.block(block).is_none() {
            return Err(IrError::UnknownBlock(block.to_string()));
        }
        self.current_block = Some(block);
        Ok(())
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.current_block
    }

    fn insertion_block(&self) -> Result<BlockId> {
        self.current_block.ok_or(IrError::NoInsertionPoint)
    }

    fn push(&mut self, name: Option<&str>, ty: Type, kind: InstKind) -> Result<Value> {
        let block = self.insertion_block()?;
        let id = self.function.new_inst_id();
        self.function.append(
            block,
            Instruction {
                id,
                name: name.map(str::to_string),
                ty,
                kind,
            },
        );
        Ok(Value::Local(id))
    }

    pub fn alloca(&mut self, name: &str, allocated: Type) -> Result<Value> {
        self.push(Some(name), Type::Ptr, InstKind::Alloca { allocated })
    }

    pub fn load(&mut self, name: &str, ty: Type, ptr: Value) -> Result<Value> {
        self.push(Some(name), ty, InstKind::Load { ptr })
    }

    pub fn store(&mut self, value_ty: Type, value: Value, ptr: Value) -> Result<()> {
        self.push(
            None,
            Type::Void,
            InstKind::Store {
                value,
                ptr,
                value_ty,
            },
        )?;
        Ok(())
    }

    pub fn ptr_add(
        &mut self,
        name: &str,
        element: Type,
        base: Value,
        index: Value,
    ) -> Result<Value> {
        self.push(
            Some(name),
            Type::Ptr,
            InstKind::PtrAdd {
                element,
                base,
                index,
            },
        )
    }

    pub fn binary(
        &mut self,
        name: &str,
        op: BinaryOp,
        ty: Type,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        self.push(Some(name), ty, InstKind::Binary { op, lhs, rhs })
    }

    pub fn add(&mut self, name: &str, ty: Type, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(name, BinaryOp::Add, ty, lhs, rhs)
    }

    pub fn sub(&mut self, name: &str, ty: Type, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(name, BinaryOp::Sub, ty, lhs, rhs)
    }

    pub fn mul(&mut self, name: &str, ty: Type, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(name, BinaryOp::Mul, ty, lhs, rhs)
    }

    pub fn icmp(
        &mut self,
        name: &str,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        self.push(Some(name), Type::I1, InstKind::ICmp { pred, lhs, rhs })
    }

    pub fn cast(&mut self, name: &str, op: CastOp, to: Type, value: Value) -> Result<Value> {
        self.push(Some(name), to, InstKind::Cast { op, value })
    }

    pub fn select(
        &mut self,
        name: &str,
        ty: Type,
        cond: Value,
        then_value: Value,
        else_value: Value,
    ) -> Result<Value> {
        self.push(
            Some(name),
            ty,
            InstKind::Select {
                cond,
                then_value,
                else_value,
            },
        )
    }

    pub fn phi(&mut self, name: &str, ty: Type, incoming: Vec<(Value, BlockId)>) -> Result<Value> {
        self.push(Some(name), ty, InstKind::Phi { incoming })
    }

    /// Adds an edge to a phi created earlier, typically once the latch value exists.
    pub fn add_incoming(&mut self, phi: &Value, value: Value, block: BlockId) -> Result<()> {
        let id = phi
            .as_local()
            .ok_or_else(|| IrError::NotAPhi(format!("{:?}", phi)))?;
        match self.function.inst_mut(id) {
            Some(Instruction {
                kind: InstKind::Phi { incoming },
                ..
            }) => {
                incoming.push((value, block));
                Ok(())
            }
            _ => Err(IrError::NotAPhi(id.to_string())),
        }
    }

    pub fn call(
        &mut self,
        name: Option<&str>,
        ret_ty: Type,
        callee: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let value = self.push(
            name,
            ret_ty,
            InstKind::Call {
                callee: Callee::Direct(callee.to_string()),
                args,
            },
        )?;
        Ok((ret_ty != Type::Void).then_some(value))
    }

    pub fn call_indirect(
        &mut self,
        name: Option<&str>,
        ret_ty: Type,
        target: Value,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let value = self.push(
            name,
            ret_ty,
            InstKind::Call {
                callee: Callee::Indirect(target),
                args,
            },
        )?;
        Ok((ret_ty != Type::Void).then_some(value))
    }

    fn terminate(&mut self, term: Terminator) -> Result<()> {
        let block = self.insertion_block()?;
        self.function.set_terminator(block, term);
        Ok(())
    }

    pub fn br(&mut self, target: BlockId) -> Result<()> {
        self.terminate(Terminator::Br(target))
    }

    pub fn cond_br(
        &mut self,
        condition: Value,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<()> {
        self.terminate(Terminator::CondBr {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn ret(&mut self, value: Value) -> Result<()> {
        self.terminate(Terminator::Ret(Some(value)))
    }

    pub fn ret_void(&mut self) -> Result<()> {
        self.terminate(Terminator::Ret(None))
    }

    pub fn unreachable(&mut self) -> Result<()> {
        self.terminate(Terminator::Unreachable)
    }

    pub fn build(self) -> Result<Function> {
        if let Some(open) = self.function.blocks.values().find(|b| !b.is_terminated()) {
            return Err(IrError::UnterminatedBlock(open.name.clone()));
        }
        Ok(self.function)
    }
}
