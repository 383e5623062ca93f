use super::{AliasReporter, CallEffectReporter, InductionVariableDetector, ReportLine, ReportSink};
use crate::analysis::{
    AliasAnalysis, AnalysisManager, LoopAnalysis, Pass, PassManager, PreservedAnalyses,
    ScalarEvolutionAnalysis,
};
use crate::{function::Function, module::Module, IrError};
use anyhow::Result;
use serde::Serialize;

/// Alias and ModRef report for every load, store and direct call.
#[derive(Debug, Default)]
pub struct AAInspectorPass;

impl AAInspectorPass {
    pub const NAME: &'static str = "aa-inspector";
}

impl Pass for AAInspectorPass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Report alias results between loads/stores and call ModRef effects"
    }

    fn run(
        &mut self,
        function: &Function,
        module: &Module,
        analyses: &mut AnalysisManager,
        sink: &mut dyn ReportSink,
    ) -> Result<PreservedAnalyses> {
        sink.emit(ReportLine::FunctionHeader {
            function: function.name().to_string(),
            instructions: function.instruction_count(),
        })?;

        let aa = analyses.get::<AliasAnalysis>(function, module)?;
        let mut lines = AliasReporter::report(function, &*aa);
        lines.extend(CallEffectReporter::report(function, &*aa));
        // call banners alone are not interactions
        let interesting = lines
            .iter()
            .any(|line| !matches!(line, ReportLine::CallHeader { .. }));
        if !interesting {
            lines.push(ReportLine::NoInteractions);
        }

        for line in lines {
            sink.emit(line)?;
        }
        Ok(PreservedAnalyses::all())
    }
}

/// Affine induction variables of every loop header.
#[derive(Debug, Default)]
pub struct DerivedInductionVarPass;

impl DerivedInductionVarPass {
    pub const NAME: &'static str = "derived-iv";
}

impl Pass for DerivedInductionVarPass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Report loop header phis that are affine add-recurrences"
    }

    fn run(
        &mut self,
        function: &Function,
        module: &Module,
        analyses: &mut AnalysisManager,
        sink: &mut dyn ReportSink,
    ) -> Result<PreservedAnalyses> {
        let loops = analyses.get::<LoopAnalysis>(function, module)?;
        let scev = analyses.get::<ScalarEvolutionAnalysis>(function, module)?;

        for line in InductionVariableDetector::report(function, &*loops, &*scev) {
            sink.emit(line)?;
        }
        Ok(PreservedAnalyses::all())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub fn available_passes() -> Vec<PassInfo> {
    [
        Box::new(AAInspectorPass) as Box<dyn Pass>,
        Box::new(DerivedInductionVarPass),
    ]
    .iter()
    .map(|pass| PassInfo {
        name: pass.name(),
        description: pass.description(),
    })
    .collect()
}

pub fn create_pass(name: &str) -> crate::Result<Box<dyn Pass>> {
    match name {
        AAInspectorPass::NAME => Ok(Box::new(AAInspectorPass)),
        DerivedInductionVarPass::NAME => Ok(Box::new(DerivedInductionVarPass)),
        other => Err(IrError::UnknownPass(other.to_string())),
    }
}

/// Splits `"aa-inspector,derived-iv"` into validated pass names.
pub fn parse_pipeline(text: &str) -> crate::Result<Vec<String>> {
    let names: Vec<String> = text
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        return Err(IrError::EmptyPipeline);
    }
    for name in &names {
        create_pass(name)?;
    }
    Ok(names)
}

pub fn build_pass_manager<S: AsRef<str>>(names: &[S]) -> crate::Result<PassManager> {
    if names.is_empty() {
        return Err(IrError::EmptyPipeline);
    }
    let mut manager = PassManager::new();
    for name in names {
        manager.register_boxed(create_pass(name.as_ref())?);
    }
    Ok(manager)
}
