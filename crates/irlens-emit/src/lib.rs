/*! Write inspection reports to a terminal, a file or another program.
 *
 * Passes produce [`ReportLine`](irlens_core::ReportLine)s and hand them to a
 * [`ReportSink`](irlens_core::ReportSink). The sinks here decide what the reader sees: the
 * canonical text (optionally colored for a terminal) or a JSON array for tooling.
 */

pub mod config;
pub mod output;

pub use config::{EmitterConfig, OutputFormat};
pub use output::{create_sink, JsonSink, TextSink};
