use crate::{function::Function, module::Module, report::ReportSink};
use anyhow::Result;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisID {
    ControlFlow,
    Dominator,
    Loops,
    Alias,
    ScalarEvolution,
}

/// Which cached analyses are still valid after a pass ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedAnalyses {
    all: bool,
    preserved: Vec<AnalysisID>,
}

impl PreservedAnalyses {
    pub fn all() -> Self {
        Self {
            all: true,
            preserved: Vec::new(),
        }
    }

    pub fn none() -> Self {
        Self {
            all: false,
            preserved: Vec::new(),
        }
    }

    pub fn preserve(mut self, id: AnalysisID) -> Self {
        if !self.preserved.contains(&id) {
            self.preserved.push(id);
        }
        self
    }

    pub fn is_preserved(&self, id: AnalysisID) -> bool {
        self.all || self.preserved.contains(&id)
    }

    pub fn are_all_preserved(&self) -> bool {
        self.all
    }
}

/// A function-level pass addressed in pipelines by [`Pass::name`].
pub trait Pass {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description provided"
    }

    fn run(
        &mut self,
        function: &Function,
        module: &Module,
        analyses: &mut AnalysisManager,
        sink: &mut dyn ReportSink,
    ) -> Result<PreservedAnalyses>;
}

/// A per-function result the [`AnalysisManager`] computes on demand and caches.
pub trait FunctionAnalysis: 'static {
    type Result: Any;

    const ID: AnalysisID;

    fn run(
        function: &Function,
        module: &Module,
        analyses: &mut AnalysisManager,
    ) -> Result<Self::Result>;
}

#[derive(Default)]
pub struct AnalysisManager {
    cache: HashMap<(AnalysisID, String), Rc<dyn Any>>,
}

impl AnalysisManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<A: FunctionAnalysis>(
        &mut self,
        function: &Function,
        module: &Module,
    ) -> Result<Rc<A::Result>> {
        if let Some(cached) = self.cached::<A>(function.name()) {
            return Ok(cached);
        }

        debug!(analysis = ?A::ID, function = function.name(), "computing analysis");
        let result = Rc::new(A::run(function, module, self)?);
        self.cache.insert(
            (A::ID, function.name().to_string()),
            result.clone() as Rc<dyn Any>,
        );
        Ok(result)
    }

    pub fn cached<A: FunctionAnalysis>(&self, function_name: &str) -> Option<Rc<A::Result>> {
        self.cache
            .get(&(A::ID, function_name.to_string()))
            .and_then(|any| any.clone().downcast::<A::Result>().ok())
    }

    pub fn is_cached(&self, id: AnalysisID, function_name: &str) -> bool {
        self.cache.contains_key(&(id, function_name.to_string()))
    }

    pub fn invalidate(&mut self, function_name: &str, preserved: &PreservedAnalyses) {
        self.cache
            .retain(|(id, name), _| name != function_name || preserved.is_preserved(*id));
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[derive(Debug, Clone)]
pub struct PassStatistics {
    pub name: String,
    pub function: String,
    pub duration: Duration,
}

pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    analyses: AnalysisManager,
    statistics: Vec<PassStatistics>,
    collect_stats: bool,
}

impl PassManager {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            analyses: AnalysisManager::new(),
            statistics: Vec::new(),
            collect_stats: false,
        }
    }

    pub fn enable_statistics(&mut self) {
        self.collect_stats = true;
    }

    pub fn register_pass<P: Pass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    pub fn register_boxed(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs the pipeline in order over one function.
    pub fn run_on_function(
        &mut self,
        function: &Function,
        module: &Module,
        sink: &mut dyn ReportSink,
    ) -> Result<()> {
        for pass in &mut self.passes {
            let start = self.collect_stats.then(Instant::now);

            let preserved = pass.run(function, module, &mut self.analyses, sink)?;
            if !preserved.are_all_preserved() {
                self.analyses.invalidate(function.name(), &preserved);
            }

            if let Some(start) = start {
                self.statistics.push(PassStatistics {
                    name: pass.name().to_string(),
                    function: function.name().to_string(),
                    duration: start.elapsed(),
                });
            }
        }
        Ok(())
    }

    /// Runs the pipeline over every function with a body, in definition order.
    pub fn run_on_module(&mut self, module: &Module, sink: &mut dyn ReportSink) -> Result<()> {
        self.run_filtered(module, sink, |_| true)
    }

    pub fn run_filtered<F>(
        &mut self,
        module: &Module,
        sink: &mut dyn ReportSink,
        keep: F,
    ) -> Result<()>
    where
        F: Fn(&Function) -> bool,
    {
        for function in module.defined_functions() {
            if !keep(function) {
                debug!(function = function.name(), "skipped by function filter");
                continue;
            }
            self.run_on_function(function, module, sink)?;
        }
        Ok(())
    }

    pub fn analyses(&self) -> &AnalysisManager {
        &self.analyses
    }

    pub fn statistics(&self) -> &[PassStatistics] {
        &self.statistics
    }

    pub fn clear_cache(&mut self) {
        self.analyses.clear();
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}
