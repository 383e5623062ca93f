/*! Core IR, analysis oracles and inspection passes.
 *
 * The IR here is a small SSA form in the LLVM mould: functions of basic blocks, loads and stores
 * through explicit pointers, phi nodes at block heads. On top of it sit three read-only oracles
 * (alias analysis, loop structure, scalar evolution) and the two diagnostic passes that query them:
 * the alias/ModRef inspector and the derived induction variable detector.
 */

pub mod analysis;
pub mod block;
pub mod builder;
pub mod config;
pub mod function;
pub mod instructions;
pub mod module;
pub mod report;
pub mod types;
pub mod values;

pub use block::{BasicBlock, BlockId, Terminator};
pub use builder::FunctionBuilder;
pub use config::InspectConfig;
pub use function::{Function, Parameter};
pub use instructions::{Callee, InstClass, InstKind, Instruction};
pub use module::{FunctionDecl, GlobalVariable, MemoryEffect, Module};
pub use report::{LineBuffer, ReportLine, ReportSink};
pub use types::Type;
pub use values::{Constant, InstId, Value};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrError {
    #[error("Unknown block: {0}")]
    UnknownBlock(String),
    #[error("No insertion block selected")]
    NoInsertionPoint,
    #[error("Block is not terminated: {0}")]
    UnterminatedBlock(String),
    #[error("Not a phi node: {0}")]
    NotAPhi(String),
    #[error("Unknown pass: {0}")]
    UnknownPass(String),
    #[error("Pipeline is empty")]
    EmptyPipeline,
    #[error("Unrecognized {kind}: {value}")]
    UnknownTag { kind: &'static str, value: String },
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IrError>;
