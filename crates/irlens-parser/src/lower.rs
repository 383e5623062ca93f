use crate::{ParseError, ParseResult, Rule};
use irlens_core::analysis::ModRefInfo;
use irlens_core::instructions::{BinaryOp, CastOp, IntPredicate};
use irlens_core::{
    BlockId, Callee, Constant, Function, FunctionDecl, GlobalVariable, InstKind,
    Instruction, MemoryEffect, Module, Parameter, Terminator, Type, Value,
};
use pest::iterators::{Pair, Pairs};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub(crate) fn lower_module(root: Pair<'_, Rule>, name: &str) -> ParseResult<Module> {
    let items: Vec<Pair<'_, Rule>> = root
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .collect();

    let mut symbols = HashSet::new();
    for item in &items {
        let symbol = item
            .clone()
            .into_inner()
            .find(|p| p.as_rule() == Rule::global_name)
            .ok_or(ParseError::Malformed("top-level entity"))?;
        let symbol = strip_sigil(&symbol).to_string();
        if !symbols.insert(symbol.clone()) {
            return Err(ParseError::DuplicateSymbol(symbol));
        }
    }

    let mut module = Module::new(name);
    for item in items {
        match item.as_rule() {
            Rule::global => module.add_global(lower_global(item)?),
            Rule::declare => module.declare(lower_declare(item)?),
            Rule::define => {
                let function = FunctionLowering::new(&symbols).lower(item)?;
                debug!(
                    function = function.name(),
                    blocks = function.blocks.len(),
                    instructions = function.instruction_count(),
                    "parsed function"
                );
                module.add_function(function);
            }
            _ => return Err(ParseError::Malformed("top-level entity")),
        }
    }
    Ok(module)
}

fn lower_global(pair: Pair<'_, Rule>) -> ParseResult<GlobalVariable> {
    let mut inner = pair.into_inner();
    let name = strip_sigil(&next(&mut inner, "global name")?).to_string();
    let ty = lower_type(&next(&mut inner, "global type")?)?;
    let init = match inner.next() {
        Some(value) => Some(lower_constant(value, ty)?),
        None => None,
    };
    Ok(GlobalVariable { name, ty, init })
}

fn lower_declare(pair: Pair<'_, Rule>) -> ParseResult<FunctionDecl> {
    let mut inner = pair.into_inner();
    let ret_ty = lower_type(&next(&mut inner, "return type")?)?;
    let name = strip_sigil(&next(&mut inner, "function name")?).to_string();

    let mut params = Vec::new();
    let mut effect = MemoryEffect::UNKNOWN;
    for part in inner {
        match part.as_rule() {
            Rule::decl_param => {
                let ty = next(&mut part.into_inner(), "parameter type")?;
                params.push(lower_type(&ty)?);
            }
            Rule::memory_attr => effect = lower_memory_attr(part)?,
            _ => return Err(ParseError::Malformed("declaration")),
        }
    }

    Ok(FunctionDecl {
        name,
        ret_ty,
        params,
        effect,
    })
}

fn lower_memory_attr(pair: Pair<'_, Rule>) -> ParseResult<MemoryEffect> {
    let mut arg_mem_only = false;
    let mut access = ModRefInfo::ModRef;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::argmem => arg_mem_only = true,
            Rule::access => {
                access = match part.as_str() {
                    "none" => ModRefInfo::NoModRef,
                    "read" => ModRefInfo::Ref,
                    "write" => ModRefInfo::Mod,
                    _ => ModRefInfo::ModRef,
                }
            }
            _ => return Err(ParseError::Malformed("memory attribute")),
        }
    }
    Ok(MemoryEffect {
        access,
        arg_mem_only,
    })
}

/// Name resolution state for one `define`.
struct FunctionLowering<'s> {
    symbols: &'s HashSet<String>,
    function: Function,
    values: HashMap<String, Value>,
    blocks: HashMap<String, BlockId>,
}

impl<'s> FunctionLowering<'s> {
    fn new(symbols: &'s HashSet<String>) -> Self {
        Self {
            symbols,
            function: Function::new("", Type::Void),
            values: HashMap::new(),
            blocks: HashMap::new(),
        }
    }

    fn lower(mut self, pair: Pair<'_, Rule>) -> ParseResult<Function> {
        let mut inner = pair.into_inner();
        let ret_ty = lower_type(&next(&mut inner, "return type")?)?;
        let name = strip_sigil(&next(&mut inner, "function name")?).to_string();
        self.function = Function::new(name, ret_ty);

        let mut blocks = Vec::new();
        for part in inner {
            match part.as_rule() {
                Rule::param => self.lower_param(part)?,
                Rule::block => blocks.push(part),
                _ => return Err(ParseError::Malformed("function")),
            }
        }

        // Blocks and result names are bound before any operand is read, so a
        // phi may name a value defined further down.
        let mut pending = Vec::new();
        for block in &blocks {
            let mut parts = block.clone().into_inner();
            let label = next(&mut parts, "block label")?.as_str().to_string();
            if self.blocks.contains_key(&label) {
                return Err(self.redefinition(&label));
            }
            let id = self.function.create_block(label.clone());
            self.blocks.insert(label, id);

            for part in parts {
                if part.as_rule() != Rule::instruction {
                    continue;
                }
                let mut inst_parts = part.into_inner();
                let first = next(&mut inst_parts, "instruction")?;
                let inst_id = self.function.new_inst_id();
                let (name, op) = if first.as_rule() == Rule::local_name {
                    let name = strip_sigil(&first).to_string();
                    if self.values.contains_key(&name) {
                        return Err(self.redefinition(&name));
                    }
                    self.values.insert(name.clone(), Value::Local(inst_id));
                    (Some(name), next(&mut inst_parts, "operation")?)
                } else {
                    (None, first)
                };
                pending.push((id, inst_id, name, op));
            }
        }

        for (block, id, name, op) in pending {
            let (ty, kind) = self.lower_operation(op)?;
            self.function.append(block, Instruction { id, name, ty, kind });
        }

        for block in blocks {
            let mut parts = block.into_inner();
            let label = next(&mut parts, "block label")?;
            let id = self.block(label.as_str())?;
            let term = parts
                .last()
                .ok_or(ParseError::Malformed("block terminator"))?;
            let term = self.lower_terminator(term)?;
            self.function.set_terminator(id, term);
        }

        Ok(self.function)
    }

    fn lower_param(&mut self, pair: Pair<'_, Rule>) -> ParseResult<()> {
        let mut inner = pair.into_inner();
        let ty = lower_type(&next(&mut inner, "parameter type")?)?;
        let mut part = next(&mut inner, "parameter name")?;
        let noalias = part.as_rule() == Rule::noalias;
        if noalias {
            part = next(&mut inner, "parameter name")?;
        }

        let name = strip_sigil(&part).to_string();
        if self.values.contains_key(&name) {
            return Err(self.redefinition(&name));
        }
        let mut param = Parameter::new(name.clone(), ty);
        if noalias {
            param = param.noalias();
        }
        let value = self.function.add_param(param);
        self.values.insert(name, value);
        Ok(())
    }

    fn lower_operation(&self, op: Pair<'_, Rule>) -> ParseResult<(Type, InstKind)> {
        let rule = op.as_rule();
        let mut inner = op.into_inner();

        let lowered = match rule {
            Rule::alloca => {
                let allocated = self.ty(&mut inner)?;
                (Type::Ptr, InstKind::Alloca { allocated })
            }
            Rule::load => {
                let ty = self.ty(&mut inner)?;
                let ptr = self.value(&mut inner, Type::Ptr)?;
                (ty, InstKind::Load { ptr })
            }
            Rule::store => {
                let value_ty = self.ty(&mut inner)?;
                let value = self.value(&mut inner, value_ty)?;
                let ptr = self.value(&mut inner, Type::Ptr)?;
                (
                    Type::Void,
                    InstKind::Store {
                        value,
                        ptr,
                        value_ty,
                    },
                )
            }
            Rule::gep => {
                let element = self.ty(&mut inner)?;
                let base = self.value(&mut inner, Type::Ptr)?;
                let index_ty = self.ty(&mut inner)?;
                let index = self.value(&mut inner, index_ty)?;
                (
                    Type::Ptr,
                    InstKind::PtrAdd {
                        element,
                        base,
                        index,
                    },
                )
            }
            Rule::binary => {
                let mnemonic = next(&mut inner, "binary opcode")?;
                let op = BinaryOp::from_mnemonic(mnemonic.as_str())
                    .ok_or(ParseError::Malformed("binary opcode"))?;
                let ty = self.ty(&mut inner)?;
                let lhs = self.value(&mut inner, ty)?;
                let rhs = self.value(&mut inner, ty)?;
                (ty, InstKind::Binary { op, lhs, rhs })
            }
            Rule::icmp => {
                let mnemonic = next(&mut inner, "icmp predicate")?;
                let pred = IntPredicate::from_mnemonic(mnemonic.as_str())
                    .ok_or(ParseError::Malformed("icmp predicate"))?;
                let ty = self.ty(&mut inner)?;
                let lhs = self.value(&mut inner, ty)?;
                let rhs = self.value(&mut inner, ty)?;
                (Type::I1, InstKind::ICmp { pred, lhs, rhs })
            }
            Rule::cast => {
                let mnemonic = next(&mut inner, "cast opcode")?;
                let op = CastOp::from_mnemonic(mnemonic.as_str())
                    .ok_or(ParseError::Malformed("cast opcode"))?;
                let from = self.ty(&mut inner)?;
                let value = self.value(&mut inner, from)?;
                let to = self.ty(&mut inner)?;
                (to, InstKind::Cast { op, value })
            }
            Rule::select => {
                let cond_ty = self.ty(&mut inner)?;
                let cond = self.value(&mut inner, cond_ty)?;
                let ty = self.ty(&mut inner)?;
                let then_value = self.value(&mut inner, ty)?;
                let else_ty = self.ty(&mut inner)?;
                let else_value = self.value(&mut inner, else_ty)?;
                (
                    ty,
                    InstKind::Select {
                        cond,
                        then_value,
                        else_value,
                    },
                )
            }
            Rule::phi => {
                let ty = self.ty(&mut inner)?;
                let mut incoming = Vec::new();
                for edge in inner {
                    let mut parts = edge.into_inner();
                    let value = self.value(&mut parts, ty)?;
                    let label = next(&mut parts, "phi predecessor")?;
                    incoming.push((value, self.block(strip_sigil(&label))?));
                }
                (ty, InstKind::Phi { incoming })
            }
            Rule::call => {
                let ret_ty = self.ty(&mut inner)?;
                let target = next(&mut inner, "callee")?;
                let target = next(&mut target.into_inner(), "callee")?;
                let callee = match target.as_rule() {
                    Rule::global_name => Callee::Direct(strip_sigil(&target).to_string()),
                    _ => Callee::Indirect(self.local(strip_sigil(&target))?),
                };
                let mut args = Vec::new();
                for arg in inner {
                    let mut parts = arg.into_inner();
                    let ty = self.ty(&mut parts)?;
                    args.push(self.value(&mut parts, ty)?);
                }
                (ret_ty, InstKind::Call { callee, args })
            }
            _ => return Err(ParseError::Malformed("instruction")),
        };
        Ok(lowered)
    }

    fn lower_terminator(&self, pair: Pair<'_, Rule>) -> ParseResult<Terminator> {
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();
        match rule {
            Rule::br => {
                let target = next(&mut inner, "branch target")?;
                Ok(Terminator::Br(self.block(strip_sigil(&target))?))
            }
            Rule::br_cond => {
                let ty = self.ty(&mut inner)?;
                let condition = self.value(&mut inner, ty)?;
                let then_block = next(&mut inner, "branch target")?;
                let else_block = next(&mut inner, "branch target")?;
                Ok(Terminator::CondBr {
                    condition,
                    then_block: self.block(strip_sigil(&then_block))?,
                    else_block: self.block(strip_sigil(&else_block))?,
                })
            }
            Rule::ret => match inner.next() {
                Some(typed) => {
                    let mut parts = typed.into_inner();
                    let ty = self.ty(&mut parts)?;
                    Ok(Terminator::Ret(Some(self.value(&mut parts, ty)?)))
                }
                None => Ok(Terminator::Ret(None)),
            },
            Rule::unreachable => Ok(Terminator::Unreachable),
            _ => Err(ParseError::Malformed("terminator")),
        }
    }

    fn ty(&self, pairs: &mut Pairs<'_, Rule>) -> ParseResult<Type> {
        lower_type(&next(pairs, "type")?)
    }

    fn value(&self, pairs: &mut Pairs<'_, Rule>, ty: Type) -> ParseResult<Value> {
        let value = next(pairs, "value")?;
        let operand = next(&mut value.into_inner(), "value")?;
        match operand.as_rule() {
            Rule::local_name => self.local(strip_sigil(&operand)),
            Rule::global_name => {
                let name = strip_sigil(&operand);
                if self.symbols.contains(name) {
                    Ok(Value::Global(name.to_string()))
                } else {
                    Err(ParseError::UndefinedGlobal {
                        function: self.function.name.clone(),
                        name: name.to_string(),
                    })
                }
            }
            _ => Ok(Value::Const(constant(&operand, ty)?)),
        }
    }

    fn local(&self, name: &str) -> ParseResult<Value> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ParseError::UndefinedValue {
                function: self.function.name.clone(),
                name: name.to_string(),
            })
    }

    fn block(&self, name: &str) -> ParseResult<BlockId> {
        self.blocks
            .get(name)
            .copied()
            .ok_or_else(|| ParseError::UndefinedBlock {
                function: self.function.name.clone(),
                name: name.to_string(),
            })
    }

    fn redefinition(&self, name: &str) -> ParseError {
        ParseError::Redefinition {
            function: self.function.name.clone(),
            name: name.to_string(),
        }
    }
}

fn next<'i>(pairs: &mut Pairs<'i, Rule>, what: &'static str) -> ParseResult<Pair<'i, Rule>> {
    pairs.next().ok_or(ParseError::Malformed(what))
}

fn strip_sigil<'i>(pair: &Pair<'i, Rule>) -> &'i str {
    let text = pair.as_str();
    text.strip_prefix(|c| c == '%' || c == '@').unwrap_or(text)
}

fn lower_type(pair: &Pair<'_, Rule>) -> ParseResult<Type> {
    let text = pair.as_str();
    match text {
        "void" => Ok(Type::Void),
        "ptr" => Ok(Type::Ptr),
        "float" => Ok(Type::Float),
        "double" => Ok(Type::Double),
        _ => text
            .strip_prefix('i')
            .and_then(|bits| bits.parse::<u16>().ok())
            .filter(|bits| (1..=64).contains(bits))
            .map(Type::Int)
            .ok_or_else(|| ParseError::UnsupportedType(text.to_string())),
    }
}

/// Global initializers may only be constants.
fn lower_constant(pair: Pair<'_, Rule>, ty: Type) -> ParseResult<Constant> {
    let operand = next(&mut pair.into_inner(), "initializer")?;
    match operand.as_rule() {
        Rule::local_name | Rule::global_name => Err(ParseError::Malformed("global initializer")),
        _ => constant(&operand, ty),
    }
}

fn constant(operand: &Pair<'_, Rule>, ty: Type) -> ParseResult<Constant> {
    match operand.as_rule() {
        Rule::int_lit => {
            let text = operand.as_str();
            let value = text
                .parse::<i64>()
                .map_err(|_| ParseError::InvalidInteger(text.to_string()))?;
            Ok(Constant::Int { value, ty })
        }
        Rule::kw_true => Ok(Constant::Int { value: 1, ty }),
        Rule::kw_false => Ok(Constant::Int { value: 0, ty }),
        Rule::kw_null => Ok(Constant::Null),
        Rule::kw_undef => Ok(Constant::Undef(ty)),
        _ => Err(ParseError::Malformed("constant")),
    }
}
