use super::{AccessKind, ReportLine};
use crate::analysis::{AliasOracle, MemoryLocation};
use crate::function::Function;
use crate::instructions::{InstClass, Instruction};
use tracing::debug;

/// ModRef of each direct call against every load and store in the function.
pub struct CallEffectReporter;

impl CallEffectReporter {
    pub fn report(function: &Function, oracle: &dyn AliasOracle) -> Vec<ReportLine> {
        let mut lines = Vec::new();

        for call in function.instructions().filter(|i| i.class() == InstClass::Call) {
            let Some(callee) = call.called_function() else {
                debug!(function = function.name(), call = %call.id, "skipping indirect call");
                continue;
            };
            lines.push(ReportLine::CallHeader {
                callee: callee.to_string(),
            });

            for access in function.instructions() {
                let Some((kind, loc)) = Self::access_of(access) else {
                    continue;
                };
                lines.push(ReportLine::CallEffect {
                    access: kind,
                    ptr: function.value_name(&loc.ptr),
                    effect: oracle.mod_ref_info(call, &loc),
                });
            }
        }

        lines
    }

    fn access_of(inst: &Instruction) -> Option<(AccessKind, MemoryLocation)> {
        let kind = match inst.class() {
            InstClass::Load => AccessKind::Load,
            InstClass::Store => AccessKind::Store,
            _ => return None,
        };
        MemoryLocation::get(inst).map(|loc| (kind, loc))
    }
}
