use super::ReportLine;
use crate::analysis::{LoopOracle, ScevOracle};
use crate::function::Function;
use crate::values::Value;
use tracing::debug;

/// Reports integer header phis that evolve as affine add-recurrences.
pub struct InductionVariableDetector;

impl InductionVariableDetector {
    pub fn report(
        function: &Function,
        loops: &dyn LoopOracle,
        scev: &dyn ScevOracle,
    ) -> Vec<ReportLine> {
        let mut lines = Vec::new();

        for l in loops.top_level_loops() {
            lines.push(ReportLine::LoopHeader {
                function: function.name().to_string(),
            });

            let Some(header) = function.block(l.header) else {
                debug!(
                    function = function.name(),
                    header = %l.header,
                    "loop header does not resolve"
                );
                continue;
            };

            for phi in header.phis() {
                if !phi.ty.is_integer() {
                    continue;
                }
                let value = Value::Local(phi.id);
                let expr = scev.get_scev(&value);
                if !expr.is_affine() {
                    continue;
                }
                let (Some(start), Some(step)) = (expr.start(), expr.step()) else {
                    continue;
                };

                lines.push(ReportLine::InductionVariable {
                    name: function.value_name(&value),
                    start: start.display(function).to_string(),
                    step: step.display(function).to_string(),
                    header: header.name.clone(),
                });
            }
        }

        lines
    }
}
