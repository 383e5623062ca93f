use super::control_flow::ControlFlowGraph;
use crate::{block::BlockId, function::Function};
use std::collections::{HashMap, HashSet};

/// Dominance over the blocks reachable from the entry.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    dominators: HashMap<BlockId, HashSet<BlockId>>,
    idom: HashMap<BlockId, BlockId>,
    children: HashMap<BlockId, Vec<BlockId>>,
}

impl DominatorTree {
    pub fn build(function: &Function, cfg: &ControlFlowGraph) -> Self {
        let mut tree = Self {
            dominators: HashMap::new(),
            idom: HashMap::new(),
            children: HashMap::new(),
        };

        let Some(entry) = function.entry_block() else {
            return tree;
        };
        let blocks = cfg.reverse_postorder();
        let reachable: HashSet<BlockId> = blocks.iter().copied().collect();

        let mut doms: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
        doms.insert(entry, HashSet::from([entry]));
        for &block in blocks.iter().filter(|&&b| b != entry) {
            doms.insert(block, reachable.clone());
        }

        let mut changed = true;
        while changed {
            changed = false;

            for &block in blocks.iter().filter(|&&b| b != entry) {
                let mut new_dom: Option<HashSet<BlockId>> = None;
                for pred in cfg.predecessors(block) {
                    let Some(pred_dom) = doms.get(pred) else {
                        continue;
                    };
                    new_dom = Some(match new_dom {
                        Some(acc) => acc.intersection(pred_dom).copied().collect(),
                        None => pred_dom.clone(),
                    });
                }

                if let Some(mut new_dom_set) = new_dom {
                    new_dom_set.insert(block);

                    if doms[&block] != new_dom_set {
                        doms.insert(block, new_dom_set);
                        changed = true;
                    }
                }
            }
        }

        // The immediate dominator is the strict dominator with the most dominators of its own.
        for &block in blocks.iter().filter(|&&b| b != entry) {
            let candidate = doms[&block]
                .iter()
                .filter(|&&d| d != block)
                .max_by_key(|d| doms.get(*d).map_or(0, HashSet::len));
            if let Some(&idom) = candidate {
                tree.idom.insert(block, idom);
                tree.children.entry(idom).or_default().push(block);
            }
        }

        tree.dominators = doms;
        tree
    }

    pub fn dominates(&self, dominator: BlockId, dominated: BlockId) -> bool {
        if dominator == dominated {
            return true;
        }
        self.dominators
            .get(&dominated)
            .map_or(false, |doms| doms.contains(&dominator))
    }

    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children
            .get(&block)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn dominators(&self, block: BlockId) -> Option<&HashSet<BlockId>> {
        self.dominators.get(&block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::types::Type;

    #[test]
    fn test_simple_dominance() {
        let mut fb = FunctionBuilder::new("test", Type::Void);
        let c = fb.param("c", Type::I1);
        let entry = fb.create_block("entry");
        let b1 = fb.create_block("b1");
        let b2 = fb.create_block("b2");
        let end = fb.create_block("end");
        fb.cond_br(c, b1, b2).unwrap();
        fb.switch_to_block(b1).unwrap();
        fb.br(end).unwrap();
        fb.switch_to_block(b2).unwrap();
        fb.br(end).unwrap();
        fb.switch_to_block(end).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();

        let cfg = ControlFlowGraph::build(&function);
        let dom_tree = DominatorTree::build(&function, &cfg);

        assert!(dom_tree.dominates(entry, entry));
        assert!(dom_tree.dominates(entry, b1));
        assert!(dom_tree.dominates(entry, b2));
        assert!(dom_tree.dominates(entry, end));

        assert!(!dom_tree.dominates(b1, b2));
        assert!(!dom_tree.dominates(b2, b1));
        assert!(!dom_tree.dominates(b1, end));
        assert!(!dom_tree.dominates(b2, end));

        assert_eq!(dom_tree.idom(b1), Some(entry));
        assert_eq!(dom_tree.idom(b2), Some(entry));
        assert_eq!(dom_tree.idom(end), Some(entry));
        assert_eq!(dom_tree.children(entry).len(), 3);
    }

    #[test]
    fn test_chain_idom() {
        let mut fb = FunctionBuilder::new("chain", Type::Void);
        let entry = fb.create_block("entry");
        let mid = fb.create_block("mid");
        let last = fb.create_block("last");
        fb.br(mid).unwrap();
        fb.switch_to_block(mid).unwrap();
        fb.br(last).unwrap();
        fb.switch_to_block(last).unwrap();
        fb.ret_void().unwrap();
        let function = fb.build().unwrap();

        let cfg = ControlFlowGraph::build(&function);
        let dom_tree = DominatorTree::build(&function, &cfg);
        assert_eq!(dom_tree.idom(last), Some(mid));
        assert_eq!(dom_tree.idom(mid), Some(entry));
        assert_eq!(dom_tree.idom(entry), None);
        assert_eq!(dom_tree.dominators(last).map(HashSet::len), Some(3));
    }

    #[test]
    fn test_empty_function() {
        let function = Function::new("decl", Type::Void);
        let cfg = ControlFlowGraph::build(&function);
        let dom_tree = DominatorTree::build(&function, &cfg);
        assert!(dom_tree.dominators(BlockId(0)).is_none());
    }
}
