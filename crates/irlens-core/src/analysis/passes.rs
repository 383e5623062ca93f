use super::{
    AnalysisID, AnalysisManager, BasicAliasAnalysis, ControlFlowGraph, DominatorTree,
    FunctionAnalysis, LoopInfo, ScalarEvolution,
};
use crate::{function::Function, module::Module};
use anyhow::Result;

pub struct ControlFlowAnalysis;

impl FunctionAnalysis for ControlFlowAnalysis {
    type Result = ControlFlowGraph;

    const ID: AnalysisID = AnalysisID::ControlFlow;

    fn run(function: &Function, _module: &Module, _: &mut AnalysisManager) -> Result<Self::Result> {
        Ok(ControlFlowGraph::build(function))
    }
}

pub struct DominatorAnalysis;

impl FunctionAnalysis for DominatorAnalysis {
    type Result = DominatorTree;

    const ID: AnalysisID = AnalysisID::Dominator;

    fn run(
        function: &Function,
        module: &Module,
        analyses: &mut AnalysisManager,
    ) -> Result<Self::Result> {
        let cfg = analyses.get::<ControlFlowAnalysis>(function, module)?;
        Ok(DominatorTree::build(function, &cfg))
    }
}

pub struct LoopAnalysis;

impl FunctionAnalysis for LoopAnalysis {
    type Result = LoopInfo;

    const ID: AnalysisID = AnalysisID::Loops;

    fn run(
        function: &Function,
        module: &Module,
        analyses: &mut AnalysisManager,
    ) -> Result<Self::Result> {
        let cfg = analyses.get::<ControlFlowAnalysis>(function, module)?;
        let dom_tree = analyses.get::<DominatorAnalysis>(function, module)?;
        Ok(LoopInfo::build(&cfg, &dom_tree))
    }
}

pub struct AliasAnalysis;

impl FunctionAnalysis for AliasAnalysis {
    type Result = BasicAliasAnalysis;

    const ID: AnalysisID = AnalysisID::Alias;

    fn run(function: &Function, module: &Module, _: &mut AnalysisManager) -> Result<Self::Result> {
        Ok(BasicAliasAnalysis::build(function, module))
    }
}

pub struct ScalarEvolutionAnalysis;

impl FunctionAnalysis for ScalarEvolutionAnalysis {
    type Result = ScalarEvolution;

    const ID: AnalysisID = AnalysisID::ScalarEvolution;

    fn run(
        function: &Function,
        module: &Module,
        analyses: &mut AnalysisManager,
    ) -> Result<Self::Result> {
        let loops = analyses.get::<LoopAnalysis>(function, module)?;
        Ok(ScalarEvolution::build(function, &loops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LoopOracle, ScevOracle};
    use crate::builder::FunctionBuilder;
    use crate::types::Type;
    use crate::values::Value;

    #[test]
    fn test_dependent_analyses_share_cache() {
        let mut fb = FunctionBuilder::new("spin", Type::Void);
        let entry = fb.create_block("entry");
        let header = fb.create_block("loop");
        fb.br(header).unwrap();
        fb.switch_to_block(header).unwrap();
        let i = fb.phi("i", Type::I32, vec![(Value::i32(0), entry)]).unwrap();
        let next = fb.add("i.next", Type::I32, i.clone(), Value::i32(2)).unwrap();
        fb.add_incoming(&i, next, header).unwrap();
        fb.br(header).unwrap();
        let function = fb.build().unwrap();
        let mut module = Module::new("m");
        module.add_function(function.clone());

        let mut analyses = AnalysisManager::new();
        let se = analyses
            .get::<ScalarEvolutionAnalysis>(&function, &module)
            .unwrap();
        assert!(se.get_scev(&i).is_affine());

        for id in [
            AnalysisID::ControlFlow,
            AnalysisID::Dominator,
            AnalysisID::Loops,
            AnalysisID::ScalarEvolution,
        ] {
            assert!(analyses.is_cached(id, "spin"), "{:?} not cached", id);
        }
        assert!(!analyses.is_cached(AnalysisID::Alias, "spin"));

        let loops = analyses.get::<LoopAnalysis>(&function, &module).unwrap();
        assert_eq!(loops.loops().len(), 1);

        analyses.get::<AliasAnalysis>(&function, &module).unwrap();
        assert!(analyses.is_cached(AnalysisID::Alias, "spin"));
    }
}
