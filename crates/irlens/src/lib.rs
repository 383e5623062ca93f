/*! Alias and induction-variable inspection over a small SSA IR.
 *
 * One import for the whole toolchain: parse text IR, run the `aa-inspector` and `derived-iv`
 * passes, and write the report through any sink.
 */

pub use irlens_core as core;
pub use irlens_emit as emit;
pub use irlens_parser as parser;

pub use irlens_core::{
    analysis::{AliasOracle, AliasResult, LoopOracle, ModRefInfo, Scev, ScevOracle},
    report::{available_passes, build_pass_manager, parse_pipeline, PassInfo},
    Function, FunctionBuilder, InspectConfig, LineBuffer, Module, ReportLine, ReportSink, Type,
    Value,
};
pub use irlens_emit::{create_sink, EmitterConfig, JsonSink, OutputFormat, TextSink};
pub use irlens_parser::{parse, parse_file, ParseError};

use anyhow::Result;
use irlens_core::analysis::PassStatistics;

/// Runs the configured pipeline over every selected function of `module`.
pub fn inspect_module(
    module: &Module,
    config: &InspectConfig,
    sink: &mut dyn ReportSink,
) -> Result<Vec<PassStatistics>> {
    let mut manager = build_pass_manager(&config.pipeline)?;
    if config.collect_stats {
        manager.enable_statistics();
    }
    manager.run_filtered(module, sink, |f| config.selects(f.name()))?;
    sink.finish()?;
    Ok(manager.statistics().to_vec())
}

/// Parses `source` and returns the plain-text report of `pipeline`.
pub fn inspect_source(source: &str, pipeline: &str) -> Result<String> {
    let module = parse(source)?;
    let config = InspectConfig::default().with_pipeline(pipeline)?;
    let mut buffer = LineBuffer::new();
    inspect_module(&module, &config, &mut buffer)?;
    Ok(buffer.to_text())
}
