use super::control_flow::ControlFlowGraph;
use super::dominator::DominatorTree;
use crate::block::BlockId;
use std::collections::{BTreeSet, HashMap};

/// A natural loop: every back edge into `header` merged into one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub header: BlockId,
    pub blocks: BTreeSet<BlockId>,
    pub latches: Vec<BlockId>,
    pub exits: Vec<BlockId>,
    /// 1 for an outermost loop.
    pub depth: usize,
}

impl Loop {
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    pub fn is_latch(&self, block: BlockId) -> bool {
        self.latches.contains(&block)
    }
}

/// Enumerates the loops of one function, outermost first.
pub trait LoopOracle {
    /// Every loop, nested ones included.
    fn loops(&self) -> &[Loop];

    /// Loops not contained in any other loop.
    fn top_level_loops(&self) -> Vec<&Loop> {
        self.loops().iter().filter(|l| l.depth == 1).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopInfo {
    loops: Vec<Loop>,
}

impl LoopInfo {
    pub fn build(cfg: &ControlFlowGraph, dom_tree: &DominatorTree) -> Self {
        let mut latches_by_header: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        let mut headers = Vec::new();
        for (latch, header) in cfg.back_edges(dom_tree) {
            let latches = latches_by_header.entry(header).or_insert_with(|| {
                headers.push(header);
                Vec::new()
            });
            latches.push(latch);
        }

        let mut loops: Vec<Loop> = headers
            .into_iter()
            .map(|header| {
                let latches = latches_by_header.remove(&header).unwrap_or_default();
                let blocks = Self::find_loop_blocks(header, &latches, cfg);
                let exits = Self::find_loop_exits(&blocks, cfg);
                Loop {
                    header,
                    blocks,
                    latches,
                    exits,
                    depth: 0,
                }
            })
            .collect();

        let depths: Vec<usize> = loops
            .iter()
            .map(|inner| {
                1 + loops
                    .iter()
                    .filter(|outer| outer.header != inner.header && outer.contains(inner.header))
                    .count()
            })
            .collect();
        for (l, depth) in loops.iter_mut().zip(depths) {
            l.depth = depth;
        }

        let position: HashMap<BlockId, usize> = cfg
            .reverse_postorder()
            .iter()
            .enumerate()
            .map(|(i, &b)| (b, i))
            .collect();
        loops.sort_by_key(|l| position.get(&l.header).copied().unwrap_or(usize::MAX));

        Self { loops }
    }

    fn find_loop_blocks(
        header: BlockId,
        latches: &[BlockId],
        cfg: &ControlFlowGraph,
    ) -> BTreeSet<BlockId> {
        let mut blocks = BTreeSet::from([header]);
        let mut worklist: Vec<BlockId> = latches
            .iter()
            .copied()
            .filter(|&latch| blocks.insert(latch))
            .collect();

        while let Some(block) = worklist.pop() {
            for &pred in cfg.predecessors(block) {
                if cfg.is_reachable(pred) && blocks.insert(pred) {
                    worklist.push(pred);
                }
            }
        }

        blocks
    }

    fn find_loop_exits(blocks: &BTreeSet<BlockId>, cfg: &ControlFlowGraph) -> Vec<BlockId> {
        let mut exits: Vec<BlockId> = blocks
            .iter()
            .flat_map(|&b| cfg.successors(b).iter().copied())
            .filter(|succ| !blocks.contains(succ))
            .collect();
        exits.sort_unstable();
        exits.dedup();
        exits
    }

    /// The innermost loop containing `block`.
    pub fn loop_for(&self, block: BlockId) -> Option<&Loop> {
        self.loops
            .iter()
            .filter(|l| l.contains(block))
            .max_by_key(|l| l.depth)
    }

    pub fn is_loop_header(&self, block: BlockId) -> bool {
        self.loops.iter().any(|l| l.header == block)
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

impl LoopOracle for LoopInfo {
    fn loops(&self) -> &[Loop] {
        &self.loops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::function::Function;
    use crate::types::Type;
    use crate::values::Value;

    fn loop_info(function: &Function) -> LoopInfo {
        let cfg = ControlFlowGraph::build(function);
        let dom_tree = DominatorTree::build(function, &cfg);
        LoopInfo::build(&cfg, &dom_tree)
    }

    #[test]
    fn test_loop_detection() {
        let mut fb = FunctionBuilder::new("test", Type::Void);
        let c = fb.param("c", Type::I1);
        fb.create_block("entry");
        let header = fb.create_block("header");
        let body = fb.create_block("body");
        let exit = fb.create_block("exit");
        fb.br(header).unwrap();
        fb.switch_to_block(header).unwrap();
        fb.cond_br(c, body, exit).unwrap();
        fb.switch_to_block(body).unwrap();
        fb.br(header).unwrap();
        fb.switch_to_block(exit).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();

        let info = loop_info(&function);
        assert_eq!(info.loops().len(), 1);

        let l = &info.loops()[0];
        assert_eq!(l.header, header);
        assert!(l.contains(header));
        assert!(l.contains(body));
        assert!(l.is_latch(body));
        assert_eq!(l.exits, vec![exit]);
        assert_eq!(l.depth, 1);
    }

    #[test]
    fn test_nested_loops_outermost_first() {
        let mut fb = FunctionBuilder::new("nest", Type::Void);
        let c = fb.param("c", Type::I1);
        fb.create_block("entry");
        let outer = fb.create_block("outer");
        let inner = fb.create_block("inner");
        let latch = fb.create_block("outer.latch");
        let exit = fb.create_block("exit");
        fb.br(outer).unwrap();
        fb.switch_to_block(outer).unwrap();
        fb.br(inner).unwrap();
        fb.switch_to_block(inner).unwrap();
        fb.cond_br(c.clone(), inner, latch).unwrap();
        fb.switch_to_block(latch).unwrap();
        fb.cond_br(c, outer, exit).unwrap();
        fb.switch_to_block(exit).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();

        let info = loop_info(&function);
        let headers: Vec<_> = info.loops().iter().map(|l| (l.header, l.depth)).collect();
        assert_eq!(headers, vec![(outer, 1), (inner, 2)]);
        let top: Vec<_> = info.top_level_loops().iter().map(|l| l.header).collect();
        assert_eq!(top, vec![outer]);
        assert_eq!(info.loop_for(inner).map(|l| l.header), Some(inner));
        assert_eq!(info.loop_for(latch).map(|l| l.header), Some(outer));
        assert!(info.is_loop_header(inner));
    }

    #[test]
    fn test_shared_header_merges_latches() {
        let mut fb = FunctionBuilder::new("two_latches", Type::Void);
        let c = fb.param("c", Type::I1);
        fb.create_block("entry");
        let header = fb.create_block("header");
        let a = fb.create_block("a");
        let b = fb.create_block("b");
        fb.br(header).unwrap();
        fb.switch_to_block(header).unwrap();
        fb.cond_br(c.clone(), a, b).unwrap();
        fb.switch_to_block(a).unwrap();
        fb.br(header).unwrap();
        fb.switch_to_block(b).unwrap();
        fb.cond_br(c, header, a).unwrap();
        let function = fb.build().unwrap();

        let info = loop_info(&function);
        assert_eq!(info.loops().len(), 1);
        assert_eq!(info.loops()[0].latches.len(), 2);
        assert!(info.loops()[0].exits.is_empty());
    }

    #[test]
    fn test_straight_line_has_no_loops() {
        let mut fb = FunctionBuilder::new("flat", Type::I32);
        fb.create_block("entry");
        fb.ret(Value::i32(1)).unwrap();
        let function = fb.build().unwrap();

        assert!(loop_info(&function).is_empty());
    }
}
