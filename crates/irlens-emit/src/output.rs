use crate::config::{EmitterConfig, OutputFormat};
use anyhow::Result;
use colored::Colorize;
use irlens_core::analysis::{AliasResult, ModRefInfo};
use irlens_core::{ReportLine, ReportSink};
use std::io::Write;

/// Writes each line as soon as it arrives, in the canonical text form.
pub struct TextSink<W: Write> {
    writer: W,
    use_colors: bool,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W, use_colors: bool) -> Self {
        Self { writer, use_colors }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn paint(line: &ReportLine) -> String {
        let text = line.to_string();
        match line {
            ReportLine::FunctionHeader { .. } | ReportLine::LoopHeader { .. } => {
                text.bold().to_string()
            }
            ReportLine::Alias { result, .. } => match result {
                AliasResult::MustAlias => text.red().to_string(),
                AliasResult::PartialAlias => text.yellow().to_string(),
                _ => text.cyan().to_string(),
            },
            ReportLine::CallHeader { .. } => text.magenta().to_string(),
            ReportLine::CallEffect { effect, .. } => match effect {
                ModRefInfo::NoModRef => text.dimmed().to_string(),
                ModRefInfo::Ref => text.normal().to_string(),
                _ => text.yellow().to_string(),
            },
            ReportLine::NoInteractions => text.dimmed().to_string(),
            ReportLine::InductionVariable { .. } => text.green().to_string(),
        }
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn emit(&mut self, line: ReportLine) -> Result<()> {
        if self.use_colors {
            writeln!(self.writer, "{}", Self::paint(&line))?;
        } else {
            writeln!(self.writer, "{}", line)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Buffers every line and writes one JSON array on `finish`.
pub struct JsonSink<W: Write> {
    writer: W,
    lines: Vec<ReportLine>,
    pretty: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W, pretty: bool) -> Self {
        Self {
            writer,
            lines: Vec::new(),
            pretty,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn emit(&mut self, line: ReportLine) -> Result<()> {
        self.lines.push(line);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let lines = std::mem::take(&mut self.lines);
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &lines)?;
        } else {
            serde_json::to_writer(&mut self.writer, &lines)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn create_sink<'w>(
    config: &EmitterConfig,
    writer: Box<dyn Write + 'w>,
) -> Box<dyn ReportSink + 'w> {
    match config.format {
        OutputFormat::Text => Box::new(TextSink::new(writer, config.use_colors)),
        OutputFormat::Json => Box::new(JsonSink::new(writer, config.pretty_json)),
    }
}
