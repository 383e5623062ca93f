/*! Report lines and the sinks they are written to.
 *
 * Every pass talks to the outside world through [`ReportSink`]. A [`ReportLine`] is structured
 * data; its `Display` impl is the canonical text form, including indentation.
 */

pub mod alias_report;
pub mod call_effects;
pub mod induction;
pub mod pipeline;

pub use alias_report::AliasReporter;
pub use call_effects::CallEffectReporter;
pub use induction::InductionVariableDetector;
pub use pipeline::{
    available_passes, build_pass_manager, create_pass, parse_pipeline, AAInspectorPass,
    DerivedInductionVarPass, PassInfo,
};

use crate::analysis::{AliasResult, ModRefInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Load,
    Store,
}

impl AccessKind {
    fn phrase(&self) -> &'static str {
        match self {
            AccessKind::Load => "load from",
            AccessKind::Store => "store to",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportLine {
    FunctionHeader {
        function: String,
        instructions: usize,
    },
    Alias {
        first: String,
        second: String,
        result: AliasResult,
    },
    CallHeader {
        callee: String,
    },
    CallEffect {
        access: AccessKind,
        ptr: String,
        effect: ModRefInfo,
    },
    NoInteractions,
    LoopHeader {
        function: String,
    },
    InductionVariable {
        name: String,
        start: String,
        step: String,
        header: String,
    },
}

impl ReportLine {
    /// Leading spaces of the text form.
    pub fn indent(&self) -> usize {
        match self {
            ReportLine::FunctionHeader { .. } | ReportLine::LoopHeader { .. } => 0,
            ReportLine::CallEffect { .. } => 4,
            _ => 2,
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:width$}", "", width = self.indent())?;
        match self {
            ReportLine::FunctionHeader {
                function,
                instructions,
            } => write!(f, "Function: {} ({} instructions)", function, instructions),
            ReportLine::Alias {
                first,
                second,
                result,
            } => write!(f, "Alias({}, {}) = {}", first, second, result),
            ReportLine::CallHeader { callee } => write!(f, "Call: {}", callee),
            ReportLine::CallEffect {
                access,
                ptr,
                effect,
            } => write!(f, "vs {} {} → {}", access.phrase(), ptr, effect),
            ReportLine::NoInteractions => {
                f.write_str("(no aliasing or call memory interactions detected)")
            }
            ReportLine::LoopHeader { function } => {
                write!(f, "Analyzing loop in function {}:", function)
            }
            ReportLine::InductionVariable {
                name,
                start,
                step,
                header,
            } => write!(
                f,
                "Derived induction variable: {} = {{{},+,{}}}<{}>",
                name, start, step, header
            ),
        }
    }
}

/// Where passes write their findings.
pub trait ReportSink {
    fn emit(&mut self, line: ReportLine) -> anyhow::Result<()>;

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Collects lines in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<ReportLine>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<ReportLine> {
        self.lines
    }

    /// Newline-terminated text of every line.
    pub fn to_text(&self) -> String {
        self.lines.iter().map(|line| format!("{}\n", line)).collect()
    }
}

impl ReportSink for LineBuffer {
    fn emit(&mut self, line: ReportLine) -> anyhow::Result<()> {
        self.lines.push(line);
        Ok(())
    }
}

impl Extend<ReportLine> for LineBuffer {
    fn extend<T: IntoIterator<Item = ReportLine>>(&mut self, iter: T) {
        self.lines.extend(iter);
    }
}
