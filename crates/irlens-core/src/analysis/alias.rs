use super::memory_location::{LocationSize, MemoryLocation};
use crate::{
    function::Function,
    instructions::{InstKind, Instruction},
    module::{MemoryEffect, Module},
    values::{Constant, InstId, Value},
    IrError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Pointer chains longer than this are treated as opaque.
const MAX_LOOKUP_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AliasResult {
    NoAlias,
    MayAlias,
    PartialAlias,
    MustAlias,
}

impl AliasResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasResult::NoAlias => "NoAlias",
            AliasResult::MayAlias => "MayAlias",
            AliasResult::PartialAlias => "PartialAlias",
            AliasResult::MustAlias => "MustAlias",
        }
    }
}

impl fmt::Display for AliasResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AliasResult {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NoAlias" => Ok(AliasResult::NoAlias),
            "MayAlias" => Ok(AliasResult::MayAlias),
            "PartialAlias" => Ok(AliasResult::PartialAlias),
            "MustAlias" => Ok(AliasResult::MustAlias),
            other => Err(IrError::UnknownTag {
                kind: "alias result",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModRefInfo {
    NoModRef,
    Ref,
    Mod,
    ModRef,
}

impl ModRefInfo {
    pub fn from_flags(is_mod: bool, is_ref: bool) -> Self {
        match (is_mod, is_ref) {
            (false, false) => ModRefInfo::NoModRef,
            (false, true) => ModRefInfo::Ref,
            (true, false) => ModRefInfo::Mod,
            (true, true) => ModRefInfo::ModRef,
        }
    }

    pub fn is_mod(&self) -> bool {
        matches!(self, ModRefInfo::Mod | ModRefInfo::ModRef)
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, ModRefInfo::Ref | ModRefInfo::ModRef)
    }

    pub fn union(self, other: ModRefInfo) -> Self {
        Self::from_flags(
            self.is_mod() || other.is_mod(),
            self.is_ref() || other.is_ref(),
        )
    }

    pub fn intersect(self, other: ModRefInfo) -> Self {
        Self::from_flags(
            self.is_mod() && other.is_mod(),
            self.is_ref() && other.is_ref(),
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModRefInfo::NoModRef => "NoModRef",
            ModRefInfo::Ref => "Ref",
            ModRefInfo::Mod => "Mod",
            ModRefInfo::ModRef => "ModRef",
        }
    }
}

impl fmt::Display for ModRefInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModRefInfo {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NoModRef" => Ok(ModRefInfo::NoModRef),
            "Ref" => Ok(ModRefInfo::Ref),
            "Mod" => Ok(ModRefInfo::Mod),
            "ModRef" => Ok(ModRefInfo::ModRef),
            other => Err(IrError::UnknownTag {
                kind: "mod/ref info",
                value: other.to_string(),
            }),
        }
    }
}

/// Read-only alias queries over one function.
pub trait AliasOracle {
    fn alias(&self, a: &MemoryLocation, b: &MemoryLocation) -> AliasResult;

    fn mod_ref_info(&self, call: &Instruction, loc: &MemoryLocation) -> ModRefInfo;
}

/// The object a pointer is ultimately derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnderlyingObject {
    Alloca(InstId),
    Global(String),
    Param { index: u32, noalias: bool },
    Null,
    Unknown(Value),
}

impl UnderlyingObject {
    /// Distinct identified objects never overlap.
    pub fn is_identified(&self) -> bool {
        matches!(
            self,
            UnderlyingObject::Alloca(_)
                | UnderlyingObject::Global(_)
                | UnderlyingObject::Param { noalias: true, .. }
                | UnderlyingObject::Null
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedPointer {
    pub object: UnderlyingObject,
    /// Byte offset from the object, when every step is a constant.
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BasicAliasAnalysis {
    bases: HashMap<InstId, DecomposedPointer>,
    noalias_params: Vec<bool>,
    roots: HashMap<InstId, BTreeSet<InstId>>,
    escaped: HashSet<InstId>,
    effects: HashMap<String, MemoryEffect>,
    /// Pointer-typed arguments of each call.
    pointer_args: HashMap<InstId, Vec<Value>>,
}

impl BasicAliasAnalysis {
    pub fn build(function: &Function, module: &Module) -> Self {
        let mut analyzer = PointerAnalyzer::new(function);
        analyzer.analyze();

        let mut summaries = EffectSummaries::new(module);
        let effects = function
            .instructions()
            .filter_map(Instruction::called_function)
            .map(|name| (name.to_string(), summaries.effect_of(name)))
            .collect();
        let pointer_args = function
            .instructions()
            .filter(|inst| inst.called_function().is_some())
            .map(|call| {
                let args = call
                    .call_args()
                    .iter()
                    .filter(|arg| function.value_type(arg).is_some_and(|ty| ty.is_pointer()))
                    .cloned()
                    .collect();
                (call.id, args)
            })
            .collect();

        Self {
            bases: analyzer.bases,
            noalias_params: function.params.iter().map(|p| p.noalias).collect(),
            roots: analyzer.roots,
            escaped: analyzer.escaped,
            effects,
            pointer_args,
        }
    }

    pub fn decompose(&self, value: &Value) -> DecomposedPointer {
        match value {
            Value::Local(id) => self.bases.get(id).cloned().unwrap_or(DecomposedPointer {
                object: UnderlyingObject::Unknown(value.clone()),
                offset: Some(0),
            }),
            other => DecomposedPointer {
                object: self.non_local_object(other),
                offset: Some(0),
            },
        }
    }

    fn non_local_object(&self, value: &Value) -> UnderlyingObject {
        match value {
            Value::Param(index) => UnderlyingObject::Param {
                index: *index,
                noalias: self
                    .noalias_params
                    .get(*index as usize)
                    .copied()
                    .unwrap_or(false),
            },
            Value::Global(name) => UnderlyingObject::Global(name.clone()),
            Value::Const(Constant::Null) => UnderlyingObject::Null,
            other => UnderlyingObject::Unknown(other.clone()),
        }
    }

    pub fn is_escaped(&self, alloca: InstId) -> bool {
        self.escaped.contains(&alloca)
    }

    pub fn callee_effect(&self, name: &str) -> MemoryEffect {
        self.effects.get(name).copied().unwrap_or_default()
    }

    /// Whether `value` may point into the stack slot created by `alloca`.
    fn may_derive_from(&self, value: &Value, alloca: InstId) -> bool {
        match value {
            Value::Local(id) => self
                .roots
                .get(id)
                .map_or(false, |roots| roots.contains(&alloca)),
            _ => false,
        }
    }

    fn object_value(object: &UnderlyingObject) -> Option<Value> {
        match object {
            UnderlyingObject::Alloca(id) => Some(Value::Local(*id)),
            UnderlyingObject::Unknown(value) => Some(value.clone()),
            UnderlyingObject::Param { index, .. } => Some(Value::Param(*index)),
            UnderlyingObject::Global(name) => Some(Value::Global(name.clone())),
            UnderlyingObject::Null => None,
        }
    }

    fn private_alloca(&self, object: &UnderlyingObject) -> Option<InstId> {
        match object {
            UnderlyingObject::Alloca(id) if !self.escaped.contains(id) => Some(*id),
            _ => None,
        }
    }

    fn pointer_args_of(&self, call: &Instruction) -> Vec<Value> {
        match self.pointer_args.get(&call.id) {
            Some(args) => args.clone(),
            None => call
                .call_args()
                .iter()
                .filter(|arg| arg.as_constant().map_or(true, |c| c.ty().is_pointer()))
                .cloned()
                .collect(),
        }
    }

    fn located(&self, loc: &MemoryLocation) -> DecomposedPointer {
        let mut decomposed = self.decompose(&loc.ptr);
        if let Some(extra) = loc.offset {
            decomposed.offset = decomposed.offset.and_then(|o| o.checked_add(extra));
        }
        decomposed
    }
}

fn compare_ranges(
    off_a: i64,
    size_a: LocationSize,
    off_b: i64,
    size_b: LocationSize,
) -> AliasResult {
    if off_a == off_b {
        return match (size_a.value(), size_b.value()) {
            (Some(a), Some(b)) if a == b => AliasResult::MustAlias,
            (Some(_), Some(_)) => AliasResult::PartialAlias,
            _ => AliasResult::MayAlias,
        };
    }
    let (low_size, gap) = if off_a < off_b {
        (size_a, off_b - off_a)
    } else {
        (size_b, off_a - off_b)
    };
    match low_size.value() {
        Some(size) if (size as i64) <= gap => AliasResult::NoAlias,
        Some(_) => AliasResult::PartialAlias,
        None => AliasResult::MayAlias,
    }
}

impl AliasOracle for BasicAliasAnalysis {
    fn alias(&self, a: &MemoryLocation, b: &MemoryLocation) -> AliasResult {
        let da = self.located(a);
        let db = self.located(b);

        let result = if da.object == db.object {
            match (da.offset, db.offset) {
                (Some(oa), Some(ob)) => compare_ranges(oa, a.size, ob, b.size),
                _ => AliasResult::MayAlias,
            }
        } else if da.object.is_identified() && db.object.is_identified() {
            AliasResult::NoAlias
        } else if let Some(slot) = self.private_alloca(&da.object) {
            match Self::object_value(&db.object) {
                Some(other) if self.may_derive_from(&other, slot) => AliasResult::MayAlias,
                _ => AliasResult::NoAlias,
            }
        } else if let Some(slot) = self.private_alloca(&db.object) {
            match Self::object_value(&da.object) {
                Some(other) if self.may_derive_from(&other, slot) => AliasResult::MayAlias,
                _ => AliasResult::NoAlias,
            }
        } else {
            match (&da.object, &db.object) {
                (
                    UnderlyingObject::Param { noalias: true, .. },
                    UnderlyingObject::Param { .. } | UnderlyingObject::Global(_),
                )
                | (
                    UnderlyingObject::Param { .. } | UnderlyingObject::Global(_),
                    UnderlyingObject::Param { noalias: true, .. },
                ) => AliasResult::NoAlias,
                _ => AliasResult::MayAlias,
            }
        };

        trace!(?a, ?b, %result, "alias query");
        result
    }

    fn mod_ref_info(&self, call: &Instruction, loc: &MemoryLocation) -> ModRefInfo {
        let Some(callee) = call.called_function() else {
            return ModRefInfo::ModRef;
        };
        let effect = self.callee_effect(callee);
        if effect.access == ModRefInfo::NoModRef {
            return ModRefInfo::NoModRef;
        }

        let target = self.located(loc);
        if self.private_alloca(&target.object).is_some() {
            return ModRefInfo::NoModRef;
        }

        let result = if effect.arg_mem_only {
            let touches_arg = self.pointer_args_of(call).iter().any(|arg| {
                let arg_loc = MemoryLocation::new(arg.clone(), LocationSize::Unknown);
                self.alias(&arg_loc, loc) != AliasResult::NoAlias
            });
            if touches_arg {
                effect.access
            } else {
                ModRefInfo::NoModRef
            }
        } else {
            effect.access
        };

        trace!(callee, ?loc, %result, "mod/ref query");
        result
    }
}

struct PointerAnalyzer<'a> {
    function: &'a Function,
    bases: HashMap<InstId, DecomposedPointer>,
    roots: HashMap<InstId, BTreeSet<InstId>>,
    escaped: HashSet<InstId>,
}

impl<'a> PointerAnalyzer<'a> {
    fn new(function: &'a Function) -> Self {
        Self {
            function,
            bases: HashMap::new(),
            roots: HashMap::new(),
            escaped: HashSet::new(),
        }
    }

    fn analyze(&mut self) {
        for inst in self.function.instructions() {
            if inst.ty.is_pointer() {
                let decomposed = self.decompose(&Value::Local(inst.id), 0);
                self.bases.insert(inst.id, decomposed);
            }
        }

        self.propagate_roots();

        self.find_escaped_allocas();
    }

    fn decompose(&self, value: &Value, depth: usize) -> DecomposedPointer {
        let opaque = || DecomposedPointer {
            object: UnderlyingObject::Unknown(value.clone()),
            offset: Some(0),
        };

        let Some(inst) = self.function.defining_inst(value) else {
            return match value {
                Value::Param(index) => DecomposedPointer {
                    object: UnderlyingObject::Param {
                        index: *index,
                        noalias: self
                            .function
                            .params
                            .get(*index as usize)
                            .map_or(false, |p| p.noalias),
                    },
                    offset: Some(0),
                },
                Value::Global(name) => DecomposedPointer {
                    object: UnderlyingObject::Global(name.clone()),
                    offset: Some(0),
                },
                Value::Const(Constant::Null) => DecomposedPointer {
                    object: UnderlyingObject::Null,
                    offset: Some(0),
                },
                _ => opaque(),
            };
        };

        match &inst.kind {
            InstKind::Alloca { .. } => DecomposedPointer {
                object: UnderlyingObject::Alloca(inst.id),
                offset: Some(0),
            },
            InstKind::PtrAdd {
                element,
                base,
                index,
            } if depth < MAX_LOOKUP_DEPTH => {
                let mut decomposed = self.decompose(base, depth + 1);
                let step = match (index.as_int(), element.store_size()) {
                    (Some(idx), Some(size)) => idx.checked_mul(size as i64),
                    _ => None,
                };
                decomposed.offset = match (decomposed.offset, step) {
                    (Some(offset), Some(step)) => offset.checked_add(step),
                    _ => None,
                };
                decomposed
            }
            _ => opaque(),
        }
    }

    /// Which allocas each local pointer may be derived from, to a fixpoint.
    fn propagate_roots(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;

            for inst in self.function.instructions() {
                let sources: Vec<&Value> = match &inst.kind {
                    InstKind::Alloca { .. } => {
                        if self.roots.entry(inst.id).or_default().insert(inst.id) {
                            changed = true;
                        }
                        continue;
                    }
                    InstKind::PtrAdd { base, .. } => vec![base],
                    InstKind::Phi { incoming } => incoming.iter().map(|(v, _)| v).collect(),
                    InstKind::Select {
                        then_value,
                        else_value,
                        ..
                    } => vec![then_value, else_value],
                    _ => continue,
                };

                let mut gathered = BTreeSet::new();
                for source in sources {
                    if let Some(id) = source.as_local() {
                        if let Some(roots) = self.roots.get(&id) {
                            gathered.extend(roots.iter().copied());
                        }
                    }
                }

                let entry = self.roots.entry(inst.id).or_default();
                for root in gathered {
                    if entry.insert(root) {
                        changed = true;
                    }
                }
            }
        }
    }

    fn find_escaped_allocas(&mut self) {
        let mut escaping: Vec<&Value> = Vec::new();

        for block in self.function.blocks.values() {
            for inst in &block.instructions {
                match &inst.kind {
                    InstKind::Store { value, .. } => escaping.push(value),
                    InstKind::Call { args, .. } => escaping.extend(args.iter()),
                    _ => {}
                }
            }
            escaping.extend(block.terminator.operands());
        }

        for value in escaping {
            if let Some(roots) = value.as_local().and_then(|id| self.roots.get(&id)) {
                self.escaped.extend(roots.iter().copied());
            }
        }
    }
}

/// Memory effects of callees, from declarations or by summarizing bodies.
struct EffectSummaries<'m> {
    module: &'m Module,
    cache: HashMap<String, MemoryEffect>,
    in_progress: HashSet<String>,
}

impl<'m> EffectSummaries<'m> {
    fn new(module: &'m Module) -> Self {
        Self {
            module,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    fn effect_of(&mut self, name: &str) -> MemoryEffect {
        if let Some(effect) = self.cache.get(name) {
            return *effect;
        }
        if let Some(decl) = self.module.declaration(name) {
            return decl.effect;
        }
        let Some(function) = self.module.function(name).filter(|f| !f.is_declaration()) else {
            return MemoryEffect::UNKNOWN;
        };
        if !self.in_progress.insert(name.to_string()) {
            return MemoryEffect::UNKNOWN;
        }

        let effect = self.summarize(function);
        self.in_progress.remove(name);
        self.cache.insert(name.to_string(), effect);
        effect
    }

    fn summarize(&mut self, function: &Function) -> MemoryEffect {
        let mut pointers = PointerAnalyzer::new(function);
        pointers.analyze();

        let mut access = ModRefInfo::NoModRef;
        let mut arg_mem_only = true;

        for inst in function.instructions() {
            let touched = match &inst.kind {
                InstKind::Load { ptr } => Some((ModRefInfo::Ref, ptr)),
                InstKind::Store { ptr, .. } => Some((ModRefInfo::Mod, ptr)),
                InstKind::Call { .. } => {
                    let callee_effect = inst
                        .called_function()
                        .map(|callee| self.effect_of(callee))
                        .unwrap_or(MemoryEffect::UNKNOWN);
                    if callee_effect.access != ModRefInfo::NoModRef {
                        access = access.union(callee_effect.access);
                        arg_mem_only = false;
                    }
                    None
                }
                _ => None,
            };

            if let Some((kind, ptr)) = touched {
                let base = pointers.decompose(ptr, 0);
                match base.object {
                    UnderlyingObject::Alloca(id) if !pointers.escaped.contains(&id) => continue,
                    UnderlyingObject::Param { .. } => {}
                    _ => arg_mem_only = false,
                }
                access = access.union(kind);
            }
        }

        if access == ModRefInfo::NoModRef {
            MemoryEffect::NONE
        } else {
            MemoryEffect {
                access,
                arg_mem_only,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::module::FunctionDecl;
    use crate::types::Type;

    fn loc(ptr: &Value, size: u64) -> MemoryLocation {
        MemoryLocation::new(ptr.clone(), LocationSize::Precise(size))
    }

    fn declare(module: &mut Module, name: &str, effect: MemoryEffect) {
        module.declare(FunctionDecl {
            name: name.to_string(),
            ret_ty: Type::Void,
            params: vec![Type::Ptr],
            effect,
        });
    }

    #[test]
    fn test_constant_offsets_from_same_base() {
        let mut fb = FunctionBuilder::new("bar", Type::Void);
        let p = fb.param("p", Type::Ptr);
        fb.create_block("entry");
        let r = fb.ptr_add("r", Type::I32, p.clone(), Value::i64(1)).unwrap();
        let s = fb.ptr_add("s", Type::I32, p.clone(), Value::i64(2)).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        assert_eq!(aa.alias(&loc(&r, 4), &loc(&s, 4)), AliasResult::NoAlias);
        assert_eq!(aa.alias(&loc(&p, 4), &loc(&r, 4)), AliasResult::NoAlias);
        assert_eq!(aa.alias(&loc(&p, 8), &loc(&r, 4)), AliasResult::PartialAlias);
        assert_eq!(aa.alias(&loc(&r, 4), &loc(&r, 4)), AliasResult::MustAlias);
        assert_eq!(aa.alias(&loc(&r, 4), &loc(&r, 8)), AliasResult::PartialAlias);
        assert_eq!(
            aa.alias(
                &loc(&r, 4),
                &MemoryLocation::new(r.clone(), LocationSize::Unknown)
            ),
            AliasResult::MayAlias
        );
        assert_eq!(
            aa.decompose(&s),
            DecomposedPointer {
                object: UnderlyingObject::Param {
                    index: 0,
                    noalias: false
                },
                offset: Some(8),
            }
        );
    }

    #[test]
    fn test_unrelated_params_may_alias() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.param("p", Type::Ptr);
        let q = fb.param("q", Type::Ptr);
        fb.create_block("entry");
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        assert_eq!(aa.alias(&loc(&p, 4), &loc(&q, 4)), AliasResult::MayAlias);
    }

    #[test]
    fn test_noalias_param_and_distinct_objects() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.noalias_param("p", Type::Ptr);
        let q = fb.param("q", Type::Ptr);
        fb.create_block("entry");
        let a = fb.alloca("a", Type::I32).unwrap();
        let b = fb.alloca("b", Type::I32).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));
        let g = Value::Global("g".into());

        assert_eq!(aa.alias(&loc(&p, 4), &loc(&q, 4)), AliasResult::NoAlias);
        assert_eq!(aa.alias(&loc(&a, 4), &loc(&b, 4)), AliasResult::NoAlias);
        assert_eq!(aa.alias(&loc(&a, 4), &loc(&g, 4)), AliasResult::NoAlias);
        assert_eq!(aa.alias(&loc(&q, 4), &loc(&a, 4)), AliasResult::NoAlias);
    }

    #[test]
    fn test_escaped_alloca_may_alias_loaded_pointer() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let q = fb.param("q", Type::Ptr);
        fb.create_block("entry");
        let a = fb.alloca("a", Type::I32).unwrap();
        fb.call(None, Type::Void, "publish", vec![a.clone()])
            .unwrap();
        let loaded = fb.load("loaded", Type::Ptr, q).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        let slot = a.as_local().unwrap();
        assert!(aa.is_escaped(slot));
        assert_eq!(aa.alias(&loc(&a, 4), &loc(&loaded, 4)), AliasResult::MayAlias);
    }

    #[test]
    fn test_phi_derived_from_private_alloca() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let q = fb.param("q", Type::Ptr);
        let entry = fb.create_block("entry");
        let join = fb.create_block("join");
        let a = fb.alloca("a", Type::I32).unwrap();
        fb.br(join).unwrap();
        fb.switch_to_block(join).unwrap();
        let merged = fb
            .phi("m", Type::Ptr, vec![(a.clone(), entry), (q.clone(), entry)])
            .unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        assert_eq!(aa.alias(&loc(&a, 4), &loc(&merged, 4)), AliasResult::MayAlias);
        assert_eq!(aa.alias(&loc(&merged, 4), &loc(&a, 4)), AliasResult::MayAlias);
    }

    #[test]
    fn test_unknown_offset_is_may_alias() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.param("p", Type::Ptr);
        let n = fb.param("n", Type::I64);
        fb.create_block("entry");
        let x = fb.ptr_add("x", Type::I32, p.clone(), n).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        assert_eq!(aa.alias(&loc(&p, 4), &loc(&x, 4)), AliasResult::MayAlias);
    }

    #[test]
    fn test_location_offset_is_honoured() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.param("p", Type::Ptr);
        fb.create_block("entry");
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        let shifted = loc(&p, 4).at_offset(4);
        assert_eq!(aa.alias(&loc(&p, 4), &shifted), AliasResult::NoAlias);
        assert_eq!(aa.alias(&loc(&p, 8), &shifted), AliasResult::PartialAlias);
    }

    #[test]
    fn test_unknown_callee_is_conservative() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.param("p", Type::Ptr);
        fb.create_block("entry");
        fb.call(None, Type::Void, "mystery", vec![]).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        let call = function.instructions().next().unwrap();
        assert_eq!(aa.mod_ref_info(call, &loc(&p, 4)), ModRefInfo::ModRef);
    }

    #[test]
    fn test_declared_effects() {
        let mut module = Module::new("m");
        declare(&mut module, "pure_fn", MemoryEffect::NONE);
        declare(&mut module, "reader", MemoryEffect::new(ModRefInfo::Ref));
        declare(&mut module, "arg_writer", MemoryEffect::arg_mem(ModRefInfo::Mod));

        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.param("p", Type::Ptr);
        let q = fb.noalias_param("q", Type::Ptr);
        fb.create_block("entry");
        fb.call(None, Type::Void, "pure_fn", vec![]).unwrap();
        fb.call(None, Type::Void, "reader", vec![]).unwrap();
        fb.call(None, Type::Void, "arg_writer", vec![q.clone()])
            .unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &module);

        let calls: Vec<_> = function.instructions().collect();
        assert_eq!(aa.mod_ref_info(calls[0], &loc(&p, 4)), ModRefInfo::NoModRef);
        assert_eq!(aa.mod_ref_info(calls[1], &loc(&p, 4)), ModRefInfo::Ref);
        assert_eq!(aa.mod_ref_info(calls[2], &loc(&q, 4)), ModRefInfo::Mod);
        assert_eq!(aa.mod_ref_info(calls[2], &loc(&p, 4)), ModRefInfo::NoModRef);
    }

    #[test]
    fn test_integer_arguments_are_not_memory() {
        let mut module = Module::new("m");
        module.declare(FunctionDecl {
            name: "bump".to_string(),
            ret_ty: Type::Void,
            params: vec![Type::I32, Type::Ptr],
            effect: MemoryEffect::arg_mem(ModRefInfo::ModRef),
        });

        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.param("p", Type::Ptr);
        let n = fb.param("n", Type::I32);
        let q = fb.noalias_param("q", Type::Ptr);
        fb.create_block("entry");
        fb.call(None, Type::Void, "bump", vec![Value::i32(5), q.clone()])
            .unwrap();
        fb.call(None, Type::Void, "bump", vec![n, q.clone()]).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &module);

        let calls: Vec<_> = function.instructions().collect();
        assert_eq!(aa.mod_ref_info(calls[0], &loc(&p, 4)), ModRefInfo::NoModRef);
        assert_eq!(aa.mod_ref_info(calls[1], &loc(&p, 4)), ModRefInfo::NoModRef);
        assert_eq!(aa.mod_ref_info(calls[1], &loc(&q, 4)), ModRefInfo::ModRef);
    }

    #[test]
    fn test_private_alloca_is_invisible_to_calls() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        fb.create_block("entry");
        let a = fb.alloca("a", Type::I32).unwrap();
        fb.call(None, Type::Void, "mystery", vec![]).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &Module::new("m"));

        let call = function.instructions().nth(1).unwrap();
        assert_eq!(aa.mod_ref_info(call, &loc(&a, 4)), ModRefInfo::NoModRef);
    }

    #[test]
    fn test_defined_callee_is_summarized() {
        let mut module = Module::new("m");

        let mut reader = FunctionBuilder::new("get", Type::I32);
        let ptr = reader.param("ptr", Type::Ptr);
        reader.create_block("entry");
        let v = reader.load("v", Type::I32, ptr).unwrap();
        reader.ret(v).unwrap();
        module.add_function(reader.build().unwrap());

        let mut scratch = FunctionBuilder::new("scratch", Type::Void);
        scratch.create_block("entry");
        let tmp = scratch.alloca("tmp", Type::I32).unwrap();
        scratch.store(Type::I32, Value::i32(1), tmp).unwrap();
        scratch.ret_void().unwrap();
        module.add_function(scratch.build().unwrap());

        let mut fb = FunctionBuilder::new("f", Type::Void);
        let p = fb.param("p", Type::Ptr);
        let q = fb.noalias_param("q", Type::Ptr);
        fb.create_block("entry");
        fb.call(Some("x"), Type::I32, "get", vec![p.clone()]).unwrap();
        fb.call(None, Type::Void, "scratch", vec![]).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();
        let aa = BasicAliasAnalysis::build(&function, &module);

        assert_eq!(
            aa.callee_effect("get"),
            MemoryEffect::arg_mem(ModRefInfo::Ref)
        );
        assert_eq!(aa.callee_effect("scratch"), MemoryEffect::NONE);

        let calls: Vec<_> = function.instructions().collect();
        assert_eq!(aa.mod_ref_info(calls[0], &loc(&p, 4)), ModRefInfo::Ref);
        assert_eq!(aa.mod_ref_info(calls[0], &loc(&q, 4)), ModRefInfo::NoModRef);
        assert_eq!(aa.mod_ref_info(calls[1], &loc(&p, 4)), ModRefInfo::NoModRef);
        assert_eq!(aa.mod_ref_info(calls[1], &loc(&q, 4)), ModRefInfo::ModRef);
    }

    #[test]
    fn test_recursive_callee_falls_back_to_unknown() {
        let mut module = Module::new("m");
        let mut rec = FunctionBuilder::new("rec", Type::Void);
        rec.create_block("entry");
        rec.call(None, Type::Void, "rec", vec![]).unwrap();
        rec.ret_void().unwrap();
        let rec = rec.build().unwrap();
        module.add_function(rec.clone());

        let aa = BasicAliasAnalysis::build(&rec, &module);
        assert_eq!(aa.callee_effect("rec"), MemoryEffect::UNKNOWN);
    }

    #[test]
    fn test_enum_names_are_exhaustive() {
        for result in [
            AliasResult::NoAlias,
            AliasResult::MayAlias,
            AliasResult::PartialAlias,
            AliasResult::MustAlias,
        ] {
            assert_eq!(result.as_str().parse::<AliasResult>().unwrap(), result);
        }
        for info in [
            ModRefInfo::NoModRef,
            ModRefInfo::Ref,
            ModRefInfo::Mod,
            ModRefInfo::ModRef,
        ] {
            assert_eq!(info.to_string().parse::<ModRefInfo>().unwrap(), info);
        }
        assert!("Unknown".parse::<AliasResult>().is_err());
        assert!("RefMod".parse::<ModRefInfo>().is_err());
    }

    #[test]
    fn test_mod_ref_lattice() {
        assert_eq!(ModRefInfo::Ref.union(ModRefInfo::Mod), ModRefInfo::ModRef);
        assert_eq!(ModRefInfo::ModRef.intersect(ModRefInfo::Ref), ModRefInfo::Ref);
        assert_eq!(ModRefInfo::from_flags(false, false), ModRefInfo::NoModRef);
    }
}
