use super::ReportLine;
use crate::analysis::{ordered_pairs, AliasOracle, AliasResult, MemoryLocation};
use crate::function::Function;
use crate::instructions::Instruction;

/// Pairwise alias classification of every load and store in a function.
pub struct AliasReporter;

impl AliasReporter {
    /// One line per ordered pair whose result is not `NoAlias`; `(a, b)` and
    /// `(b, a)` are queried and reported independently.
    pub fn report(function: &Function, oracle: &dyn AliasOracle) -> Vec<ReportLine> {
        let instructions: Vec<&Instruction> = function.instructions().collect();
        let mut lines = Vec::new();

        let is_access = |inst: &&Instruction| MemoryLocation::get(inst).is_some();
        for (first, second) in ordered_pairs(&instructions, is_access) {
            let (Some(loc1), Some(loc2)) = (MemoryLocation::get(first), MemoryLocation::get(second))
            else {
                continue;
            };

            let result = oracle.alias(&loc1, &loc2);
            if result == AliasResult::NoAlias {
                continue;
            }

            lines.push(ReportLine::Alias {
                first: function.value_name(&loc1.ptr),
                second: function.value_name(&loc2.ptr),
                result,
            });
        }

        lines
    }
}
