use super::dominator::DominatorTree;
use crate::{block::BlockId, function::Function};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    entry: Option<BlockId>,
    blocks: Vec<BlockId>,
    exits: Vec<BlockId>,
    predecessors: HashMap<BlockId, Vec<BlockId>>,
    successors: HashMap<BlockId, Vec<BlockId>>,
    reverse_postorder: Vec<BlockId>,
    retreating_edges: Vec<(BlockId, BlockId)>,
}

impl ControlFlowGraph {
    pub fn build(function: &Function) -> Self {
        let entry = function.entry_block();
        let mut predecessors: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        let mut successors = HashMap::new();
        let mut exits = Vec::new();

        for (&block_id, block) in &function.blocks {
            let succs = block.successors();

            if succs.is_empty() {
                exits.push(block_id);
            }

            for &succ in &succs {
                predecessors.entry(succ).or_default().push(block_id);
            }
            successors.insert(block_id, succs);
        }

        let mut cfg = Self {
            entry,
            blocks: function.blocks.keys().copied().collect(),
            exits,
            predecessors,
            successors,
            reverse_postorder: Vec::new(),
            retreating_edges: Vec::new(),
        };
        if let Some(entry) = entry {
            cfg.depth_first(entry);
        }
        cfg
    }

    /// One iterative DFS from the entry: postorder plus the edges that
    /// reach a block still on the stack.
    fn depth_first(&mut self, entry: BlockId) {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut postorder = Vec::new();
        let mut retreating = Vec::new();
        let mut stack = vec![(entry, 0usize)];
        visited.insert(entry);
        on_stack.insert(entry);

        while let Some((block, next)) = stack.pop() {
            let succs = self.successors(block);
            if let Some(&succ) = succs.get(next) {
                stack.push((block, next + 1));
                if on_stack.contains(&succ) {
                    retreating.push((block, succ));
                } else if visited.insert(succ) {
                    on_stack.insert(succ);
                    stack.push((succ, 0));
                }
            } else {
                on_stack.remove(&block);
                postorder.push(block);
            }
        }

        postorder.reverse();
        self.reverse_postorder = postorder;
        self.retreating_edges = retreating;
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    /// All blocks in layout order, reachable or not.
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn exits(&self) -> &[BlockId] {
        &self.exits
    }

    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.predecessors
            .get(&block)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        self.successors
            .get(&block)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Reachable blocks in reverse postorder.
    pub fn reverse_postorder(&self) -> &[BlockId] {
        &self.reverse_postorder
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.reverse_postorder.contains(&block)
    }

    /// Edges `u -> v` where `v` was still on the DFS stack when `u` reached it.
    pub fn retreating_edges(&self) -> &[(BlockId, BlockId)] {
        &self.retreating_edges
    }

    /// Retreating edges whose target dominates their source.
    pub fn back_edges(&self, dom_tree: &DominatorTree) -> Vec<(BlockId, BlockId)> {
        let mut edges = Vec::new();
        for &block in &self.reverse_postorder {
            for &succ in self.successors(block) {
                if dom_tree.dominates(succ, block) {
                    edges.push((block, succ));
                }
            }
        }
        edges
    }

    /// Every retreating edge is a back edge.
    pub fn is_reducible(&self, dom_tree: &DominatorTree) -> bool {
        self.retreating_edges
            .iter()
            .all(|&(from, to)| dom_tree.dominates(to, from))
    }

    pub fn has_path(&self, from: BlockId, to: BlockId) -> bool {
        if from == to {
            return true;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(from);

        while let Some(block) = queue.pop_front() {
            if !visited.insert(block) {
                continue;
            }

            for &succ in self.successors(block) {
                if succ == to {
                    return true;
                }
                queue.push_back(succ);
            }
        }

        false
    }

    /// Graphviz rendering, nodes labelled by block name.
    pub fn to_dot(&self, function: &Function) -> String {
        let mut dot = String::from("digraph {\n");
        for &block in &self.blocks {
            let _ = writeln!(dot, "     \"{}\";", function.block_name(block));
        }
        for &block in &self.blocks {
            let from = function.block_name(block);
            for &succ in self.successors(block) {
                let _ = writeln!(dot, "     \"{}\" -> \"{}\";", from, function.block_name(succ));
            }
        }
        dot.push_str("}\n");
        dot
    }
}
