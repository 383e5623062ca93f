/*! Symbolic evolution of integer values across loop iterations.
 *
 * Every integer instruction is folded bottom-up into a [`Scev`]. Header phis whose back-edge value
 * is the phi plus something loop invariant become add-recurrences `{start,+,step}<header>`; sums
 * and products of recurrences of the same loop fold into higher-degree recurrences.
 */

use super::loops::{Loop, LoopInfo, LoopOracle};
use crate::{
    block::BlockId,
    function::Function,
    instructions::{BinaryOp, InstKind},
    values::{Constant, InstId, Value},
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scev {
    Constant(i64),
    Unknown(Value),
    Add(Box<Scev>, Box<Scev>),
    Mul(Box<Scev>, Box<Scev>),
    /// `{operands[0],+,operands[1],+,...}` evaluated per iteration of the loop at `header`.
    AddRec {
        operands: Vec<Scev>,
        header: BlockId,
    },
    CouldNotCompute,
}

impl Scev {
    pub fn is_add_rec(&self) -> bool {
        matches!(self, Scev::AddRec { .. })
    }

    /// An add-recurrence with exactly a start and a step.
    pub fn is_affine(&self) -> bool {
        matches!(self, Scev::AddRec { operands, .. } if operands.len() == 2)
    }

    pub fn start(&self) -> Option<&Scev> {
        match self {
            Scev::AddRec { operands, .. } => operands.first(),
            _ => None,
        }
    }

    pub fn step(&self) -> Option<&Scev> {
        match self {
            Scev::AddRec { operands, .. } => operands.get(1),
            _ => None,
        }
    }

    pub fn header(&self) -> Option<BlockId> {
        match self {
            Scev::AddRec { header, .. } => Some(*header),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<i64> {
        match self {
            Scev::Constant(c) => Some(*c),
            _ => None,
        }
    }

    pub fn display<'a>(&'a self, function: &'a Function) -> ScevDisplay<'a> {
        ScevDisplay {
            scev: self,
            function,
        }
    }
}

pub struct ScevDisplay<'a> {
    scev: &'a Scev,
    function: &'a Function,
}

impl fmt::Display for ScevDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scev {
            Scev::Constant(c) => write!(f, "{}", c),
            Scev::Unknown(value) => write!(f, "{}", self.function.display(value)),
            Scev::Add(lhs, rhs) => write!(
                f,
                "({} + {})",
                lhs.display(self.function),
                rhs.display(self.function)
            ),
            Scev::Mul(lhs, rhs) => write!(
                f,
                "({} * {})",
                lhs.display(self.function),
                rhs.display(self.function)
            ),
            Scev::AddRec { operands, header } => {
                f.write_str("{")?;
                for (i, op) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",+,")?;
                    }
                    write!(f, "{}", op.display(self.function))?;
                }
                write!(f, "}}<{}>", self.function.block_name(*header))
            }
            Scev::CouldNotCompute => f.write_str("***COULDNOTCOMPUTE***"),
        }
    }
}

/// Answers "how does this value evolve?" for one function.
pub trait ScevOracle {
    fn get_scev(&self, value: &Value) -> Scev;
}

#[derive(Debug, Clone, Default)]
pub struct ScalarEvolution {
    exprs: HashMap<InstId, Scev>,
}

impl ScalarEvolution {
    pub fn build(function: &Function, loops: &LoopInfo) -> Self {
        let mut evaluator = Evaluator {
            function,
            loops: loops.loops(),
            cache: HashMap::new(),
            visiting: HashSet::new(),
        };
        for inst in function.instructions() {
            evaluator.eval(&Value::Local(inst.id));
        }
        Self {
            exprs: evaluator.cache,
        }
    }
}

impl ScevOracle for ScalarEvolution {
    fn get_scev(&self, value: &Value) -> Scev {
        match value {
            Value::Local(id) => self
                .exprs
                .get(id)
                .cloned()
                .unwrap_or_else(|| Scev::Unknown(value.clone())),
            Value::Const(Constant::Int { value, .. }) => Scev::Constant(*value),
            other => Scev::Unknown(other.clone()),
        }
    }
}

struct Evaluator<'a> {
    function: &'a Function,
    loops: &'a [Loop],
    cache: HashMap<InstId, Scev>,
    visiting: HashSet<InstId>,
}

impl<'a> Evaluator<'a> {
    fn eval(&mut self, value: &Value) -> Scev {
        let id = match value {
            Value::Local(id) => *id,
            Value::Const(Constant::Int { value, .. }) => return Scev::Constant(*value),
            other => return Scev::Unknown(other.clone()),
        };
        if let Some(cached) = self.cache.get(&id) {
            return cached.clone();
        }
        if !self.visiting.insert(id) {
            return Scev::Unknown(value.clone());
        }

        let scev = self.compute(id, value);

        self.visiting.remove(&id);
        self.cache.insert(id, scev.clone());
        scev
    }

    fn compute(&mut self, id: InstId, value: &Value) -> Scev {
        let function = self.function;
        let Some(inst) = function.inst(id) else {
            return Scev::Unknown(value.clone());
        };
        if !inst.ty.is_integer() {
            return Scev::Unknown(value.clone());
        }

        match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs);
                let r = self.eval(rhs);
                match op {
                    BinaryOp::Add => self.add(l, r),
                    BinaryOp::Sub => {
                        let negated = self.mul(Scev::Constant(-1), r);
                        self.add(l, negated)
                    }
                    BinaryOp::Mul => self.mul(l, r),
                    BinaryOp::Shl => match r.as_constant() {
                        Some(shift) if (0..63).contains(&shift) => {
                            self.mul(l, Scev::Constant(1i64 << shift))
                        }
                        _ => Scev::Unknown(value.clone()),
                    },
                    _ => Scev::Unknown(value.clone()),
                }
            }
            InstKind::Phi { incoming } => {
                let loops = self.loops;
                let block = function.inst_block(id);
                match loops.iter().find(|l| Some(l.header) == block) {
                    Some(l) => self.header_phi(id, value, incoming, l),
                    None => Scev::Unknown(value.clone()),
                }
            }
            _ => Scev::Unknown(value.clone()),
        }
    }

    /// `phi = [start, outside], [phi + X, inside]` becomes `{start,+,X}`.
    fn header_phi(
        &mut self,
        id: InstId,
        value: &Value,
        incoming: &[(Value, BlockId)],
        l: &Loop,
    ) -> Scev {
        let unknown = Scev::Unknown(value.clone());

        let mut outside = incoming.iter().filter(|(_, b)| !l.contains(*b)).map(|(v, _)| v);
        let mut inside = incoming.iter().filter(|(_, b)| l.contains(*b)).map(|(v, _)| v);
        let (Some(start_value), Some(back_value)) = (outside.next(), inside.next()) else {
            return unknown;
        };
        if outside.any(|v| v != start_value) || inside.any(|v| v != back_value) {
            return unknown;
        }

        // Evaluate the back-edge value with the phi standing for itself, then
        // forget everything computed under that assumption.
        let known: HashSet<InstId> = self.cache.keys().copied().collect();
        self.cache.insert(id, unknown.clone());
        let back = self.eval(back_value);
        self.cache.retain(|k, _| known.contains(k));

        let mut addends = Self::addends(back);
        let Some(self_pos) = addends.iter().position(|a| *a == unknown) else {
            trace!(phi = %id, "back-edge value does not add to the phi");
            return unknown;
        };
        addends.remove(self_pos);
        let step = addends
            .into_iter()
            .reduce(|acc, next| self.add(acc, next))
            .unwrap_or(Scev::Constant(0));

        let start = self.eval(start_value);
        let mut operands = vec![start];
        match step {
            Scev::AddRec {
                operands: step_ops,
                header,
            } if header == l.header => operands.extend(step_ops),
            step if self.is_invariant(&step, l) => operands.push(step),
            _ => return unknown,
        }

        Scev::AddRec {
            operands,
            header: l.header,
        }
    }

    fn addends(scev: Scev) -> Vec<Scev> {
        match scev {
            Scev::Add(lhs, rhs) => {
                let mut all = Self::addends(*lhs);
                all.extend(Self::addends(*rhs));
                all
            }
            other => vec![other],
        }
    }

    fn loop_of(&self, header: BlockId) -> Option<&'a Loop> {
        self.loops.iter().find(|l| l.header == header)
    }

    fn is_invariant(&self, scev: &Scev, l: &Loop) -> bool {
        match scev {
            Scev::Constant(_) => true,
            Scev::Unknown(value) => match value.as_local() {
                Some(id) => self
                    .function
                    .inst_block(id)
                    .map_or(true, |b| !l.contains(b)),
                None => true,
            },
            Scev::Add(a, b) | Scev::Mul(a, b) => self.is_invariant(a, l) && self.is_invariant(b, l),
            Scev::AddRec { header, .. } => !l.contains(*header),
            Scev::CouldNotCompute => false,
        }
    }

    fn invariant_in_rec(&self, scev: &Scev, header: BlockId) -> bool {
        self.loop_of(header)
            .map_or(false, |l| self.is_invariant(scev, l))
    }

    fn add(&mut self, lhs: Scev, rhs: Scev) -> Scev {
        match (lhs, rhs) {
            (Scev::Constant(a), Scev::Constant(b)) => Scev::Constant(a.wrapping_add(b)),
            (Scev::Constant(0), other) | (other, Scev::Constant(0)) => other,
            (
                Scev::AddRec {
                    operands: a,
                    header: ha,
                },
                Scev::AddRec {
                    operands: b,
                    header: hb,
                },
            ) if ha == hb => {
                let len = a.len().max(b.len());
                let mut operands = Vec::with_capacity(len);
                for i in 0..len {
                    operands.push(match (a.get(i), b.get(i)) {
                        (Some(x), Some(y)) => self.add(x.clone(), y.clone()),
                        (Some(x), None) | (None, Some(x)) => x.clone(),
                        (None, None) => Scev::Constant(0),
                    });
                }
                Self::normalize_rec(operands, ha)
            }
            (Scev::AddRec { operands, header }, other) | (other, Scev::AddRec { operands, header })
                if self.invariant_in_rec(&other, header) =>
            {
                let mut operands = operands;
                let start = operands.remove(0);
                operands.insert(0, self.add(start, other));
                Scev::AddRec { operands, header }
            }
            (other, constant @ Scev::Constant(_)) => Scev::Add(Box::new(constant), Box::new(other)),
            (lhs, rhs) => Scev::Add(Box::new(lhs), Box::new(rhs)),
        }
    }

    fn mul(&mut self, lhs: Scev, rhs: Scev) -> Scev {
        match (lhs, rhs) {
            (Scev::Constant(a), Scev::Constant(b)) => Scev::Constant(a.wrapping_mul(b)),
            (Scev::Constant(0), _) | (_, Scev::Constant(0)) => Scev::Constant(0),
            (Scev::Constant(1), other) | (other, Scev::Constant(1)) => other,
            (
                Scev::AddRec {
                    operands: a,
                    header: ha,
                },
                Scev::AddRec {
                    operands: b,
                    header: hb,
                },
            ) if ha == hb && a.len() == 2 && b.len() == 2 => {
                // {a0,+,a1} * {b0,+,b1} = {a0*b0, +, a0*b1 + a1*b0 + a1*b1, +, 2*a1*b1}
                let start = self.mul(a[0].clone(), b[0].clone());
                let cross0 = self.mul(a[0].clone(), b[1].clone());
                let cross1 = self.mul(a[1].clone(), b[0].clone());
                let steps = self.mul(a[1].clone(), b[1].clone());
                let partial = self.add(cross0, cross1);
                let first = self.add(partial, steps.clone());
                let second = self.mul(Scev::Constant(2), steps);
                Self::normalize_rec(vec![start, first, second], ha)
            }
            (Scev::AddRec { operands, header }, other) | (other, Scev::AddRec { operands, header })
                if self.invariant_in_rec(&other, header) =>
            {
                let operands = operands
                    .into_iter()
                    .map(|op| self.mul(op, other.clone()))
                    .collect();
                Self::normalize_rec(operands, header)
            }
            (other, constant @ Scev::Constant(_)) => Scev::Mul(Box::new(constant), Box::new(other)),
            (lhs, rhs) => Scev::Mul(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Drops trailing zero steps; a recurrence with no step left is its start.
    fn normalize_rec(mut operands: Vec<Scev>, header: BlockId) -> Scev {
        while operands.len() > 1 && operands.last() == Some(&Scev::Constant(0)) {
            operands.pop();
        }
        if operands.len() == 1 {
            return operands.remove(0);
        }
        Scev::AddRec { operands, header }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{control_flow::ControlFlowGraph, dominator::DominatorTree};
    use crate::builder::FunctionBuilder;
    use crate::instructions::IntPredicate;
    use crate::types::Type;

    fn evolve(function: &Function) -> ScalarEvolution {
        let cfg = ControlFlowGraph::build(function);
        let dom_tree = DominatorTree::build(function, &cfg);
        let loops = LoopInfo::build(&cfg, &dom_tree);
        ScalarEvolution::build(function, &loops)
    }

    struct CountedLoop {
        fb: FunctionBuilder,
        header: BlockId,
        exit: BlockId,
        i: Value,
        i_next: Value,
        n: Value,
    }

    /// `for (i = 0; i < n; i++)` with the body left open in the header.
    fn counted_loop() -> CountedLoop {
        let mut fb = FunctionBuilder::new("count", Type::Void);
        let n = fb.param("n", Type::I32);
        let entry = fb.create_block("entry");
        let header = fb.create_block("loop");
        let exit = fb.create_block("exit");
        fb.br(header).unwrap();
        fb.switch_to_block(header).unwrap();
        let i = fb.phi("i", Type::I32, vec![(Value::i32(0), entry)]).unwrap();
        let i_next = fb.add("i.next", Type::I32, i.clone(), Value::i32(1)).unwrap();
        fb.add_incoming(&i, i_next.clone(), header).unwrap();
        CountedLoop {
            fb,
            header,
            exit,
            i,
            i_next,
            n,
        }
    }

    fn close(mut l: CountedLoop) -> Function {
        let cond = l
            .fb
            .icmp("c", IntPredicate::Slt, l.i_next.clone(), l.n.clone())
            .unwrap();
        l.fb.cond_br(cond, l.header, l.exit).unwrap();
        l.fb.switch_to_block(l.exit).unwrap();
        l.fb.ret_void().unwrap();
        l.fb.build().unwrap()
    }

    #[test]
    fn test_basic_induction_variable() {
        let l = counted_loop();
        let (i, i_next, header) = (l.i.clone(), l.i_next.clone(), l.header);
        let function = close(l);
        let se = evolve(&function);

        let scev = se.get_scev(&i);
        assert!(scev.is_affine());
        assert_eq!(scev.start(), Some(&Scev::Constant(0)));
        assert_eq!(scev.step(), Some(&Scev::Constant(1)));
        assert_eq!(scev.header(), Some(header));
        assert_eq!(scev.display(&function).to_string(), "{0,+,1}<loop>");

        assert_eq!(se.get_scev(&i_next).display(&function).to_string(), "{1,+,1}<loop>");
    }

    #[test]
    fn test_derived_linear_values() {
        let mut l = counted_loop();
        let i = l.i.clone();
        let scaled = l.fb.mul("scaled", Type::I32, i.clone(), Value::i32(4)).unwrap();
        let shifted = l
            .fb
            .binary("shifted", BinaryOp::Shl, Type::I32, i.clone(), Value::i32(3))
            .unwrap();
        let offset = l.fb.sub("offset", Type::I32, scaled.clone(), Value::i32(2)).unwrap();
        let function = close(l);
        let se = evolve(&function);

        let show = |v: &Value| se.get_scev(v).display(&function).to_string();
        assert_eq!(show(&scaled), "{0,+,4}<loop>");
        assert_eq!(show(&shifted), "{0,+,8}<loop>");
        assert_eq!(show(&offset), "{-2,+,4}<loop>");
    }

    #[test]
    fn test_invariant_step_from_parameter() {
        let mut fb = FunctionBuilder::new("stride", Type::Void);
        let s = fb.param("s", Type::I64);
        let c = fb.param("c", Type::I1);
        let entry = fb.create_block("entry");
        let header = fb.create_block("loop");
        let exit = fb.create_block("exit");
        fb.br(header).unwrap();
        fb.switch_to_block(header).unwrap();
        let k = fb.phi("k", Type::I64, vec![(Value::i64(5), entry)]).unwrap();
        let next = fb.add("k.next", Type::I64, s, k.clone()).unwrap();
        fb.add_incoming(&k, next, header).unwrap();
        fb.cond_br(c, header, exit).unwrap();
        fb.switch_to_block(exit).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();

        let scev = evolve(&function).get_scev(&k);
        assert_eq!(scev.display(&function).to_string(), "{5,+,s}<loop>");
    }

    #[test]
    fn test_second_order_recurrence_is_not_affine() {
        let mut l = counted_loop();
        let entry = BlockId(0);
        let header = l.header;
        let i = l.i.clone();
        let j = l.fb.phi("j", Type::I32, vec![(Value::i32(0), entry)]).unwrap();
        let j_next = l.fb.add("j.next", Type::I32, j.clone(), i).unwrap();
        l.fb.add_incoming(&j, j_next, header).unwrap();
        let function = close(l);

        let scev = evolve(&function).get_scev(&j);
        assert!(scev.is_add_rec());
        assert!(!scev.is_affine());
        assert_eq!(scev.display(&function).to_string(), "{0,+,0,+,1}<loop>");
    }

    #[test]
    fn test_product_of_recurrences() {
        let mut l = counted_loop();
        let i = l.i.clone();
        let square = l.fb.mul("sq", Type::I32, i.clone(), i).unwrap();
        let function = close(l);

        let scev = evolve(&function).get_scev(&square);
        assert_eq!(scev.display(&function).to_string(), "{0,+,1,+,2}<loop>");
    }

    #[test]
    fn test_phi_selecting_invariants_is_unknown() {
        let mut fb = FunctionBuilder::new("toggle", Type::Void);
        let a = fb.param("a", Type::I32);
        let b = fb.param("b", Type::I32);
        let c = fb.param("c", Type::I1);
        let entry = fb.create_block("entry");
        let header = fb.create_block("loop");
        let exit = fb.create_block("exit");
        fb.br(header).unwrap();
        fb.switch_to_block(header).unwrap();
        let x = fb
            .phi("x", Type::I32, vec![(a, entry), (b, header)])
            .unwrap();
        fb.cond_br(c, header, exit).unwrap();
        fb.switch_to_block(exit).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();

        assert_eq!(evolve(&function).get_scev(&x), Scev::Unknown(x));
    }

    #[test]
    fn test_non_header_phi_and_outside_values() {
        let function = close(counted_loop());
        let se = evolve(&function);
        assert_eq!(se.get_scev(&Value::i32(7)), Scev::Constant(7));
        assert_eq!(se.get_scev(&Value::Param(0)), Scev::Unknown(Value::Param(0)));
        assert_eq!(
            Scev::Add(Box::new(Scev::Constant(1)), Box::new(Scev::Unknown(Value::Param(0))))
                .display(&function)
                .to_string(),
            "(1 + n)"
        );
    }
}
