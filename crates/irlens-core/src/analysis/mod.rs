/*! Read-only analyses over a single function.
 *
 * The inspection passes never look at the IR directly to decide aliasing or recurrence: they ask
 * oracles. [`AliasOracle`], [`LoopOracle`] and [`ScevOracle`] are the seams; the types here are
 * the default implementations, cached per function by the [`AnalysisManager`].
 */

pub mod alias;
pub mod control_flow;
pub mod dominator;
pub mod loops;
pub mod memory_location;
pub mod pairwise;
pub mod pass;
pub mod passes;
pub mod scalar_evolution;

pub use alias::{
    AliasOracle, AliasResult, BasicAliasAnalysis, DecomposedPointer, ModRefInfo, UnderlyingObject,
};
pub use control_flow::ControlFlowGraph;
pub use dominator::DominatorTree;
pub use loops::{Loop, LoopInfo, LoopOracle};
pub use memory_location::{LocationSize, MemoryLocation};
pub use pairwise::ordered_pairs;
pub use pass::{
    AnalysisID, AnalysisManager, FunctionAnalysis, Pass, PassManager, PassStatistics,
    PreservedAnalyses,
};
pub use passes::{
    AliasAnalysis, ControlFlowAnalysis, DominatorAnalysis, LoopAnalysis, ScalarEvolutionAnalysis,
};
pub use scalar_evolution::{ScalarEvolution, Scev, ScevOracle};
