use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use irlens_core::analysis::{ControlFlowGraph, DominatorTree};
use irlens_core::report::available_passes;
use irlens_core::{InspectConfig, Module};
use irlens_emit::{create_sink, EmitterConfig, OutputFormat};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "irlens")]
#[command(about = "irlens - alias/ModRef and induction-variable reports for text IR")]
#[command(version = "0.1.0")]
#[command(author = "Gianluca Brigandi <gbrigand@gmail.com>")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pass pipeline over a file or every *.ir file under a directory
    Run {
        path: PathBuf,

        /// Comma-separated pass keys, e.g. "aa-inspector,derived-iv"
        #[arg(short, long)]
        passes: Option<String>,

        /// Only report on these functions
        #[arg(short, long = "function")]
        functions: Vec<String>,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        #[arg(long)]
        no_color: bool,

        /// Print per-pass timings to stderr
        #[arg(long)]
        stats: bool,

        /// JSON file with an InspectConfig
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Parse only
    Validate { path: PathBuf },

    /// Control flow graph as Graphviz DOT
    Cfg {
        path: PathBuf,

        #[arg(short, long = "function")]
        functions: Vec<String>,
    },

    /// List available passes
    Passes {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // warnings by default, --verbose enables debug, RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_module("irlens", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Run {
            path,
            passes,
            functions,
            format,
            no_color,
            stats,
            config,
        } => cmd_run(path, passes, functions, format, no_color, stats, config),
        Commands::Validate { path } => cmd_validate(path),
        Commands::Cfg { path, functions } => cmd_cfg(path, functions),
        Commands::Passes { json } => cmd_passes(json),
    }
}

fn cmd_run(
    path: PathBuf,
    passes: Option<String>,
    functions: Vec<String>,
    format: Format,
    no_color: bool,
    stats: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut inspect = match config {
        Some(ref file) => InspectConfig::load(file)?,
        None => InspectConfig::default(),
    };
    if let Some(ref pipeline) = passes {
        inspect = inspect.with_pipeline(pipeline)?;
    }
    inspect = inspect.with_functions(functions);
    inspect.collect_stats |= stats;

    if no_color {
        colored::control::set_override(false);
    }
    let emitter = EmitterConfig {
        use_colors: !no_color && io::stdout().is_terminal(),
        format: format.into(),
        ..EmitterConfig::default()
    };

    let modules = load_modules(&path)?;
    log::debug!(
        "running [{}] over {} module(s)",
        inspect.pipeline.join(","),
        modules.len()
    );

    let stdout = io::stdout();
    let mut sink = create_sink(&emitter, Box::new(stdout.lock()));
    let mut manager = irlens_core::report::build_pass_manager(&inspect.pipeline)?;
    if inspect.collect_stats {
        manager.enable_statistics();
    }

    for (file, module) in &modules {
        manager
            .run_filtered(module, sink.as_mut(), |f| inspect.selects(f.name()))
            .with_context(|| format!("while inspecting {}", file.display()))?;
        manager.clear_cache();
    }
    sink.finish()?;

    if inspect.collect_stats {
        let mut err = io::stderr().lock();
        writeln!(err, "{}", "Pass statistics".bright_cyan().bold())?;
        for stat in manager.statistics() {
            writeln!(
                err,
                "  {:<14} {:<24} {:?}",
                stat.name, stat.function, stat.duration
            )?;
        }
    }

    Ok(())
}

fn cmd_validate(path: PathBuf) -> Result<()> {
    let files = collect_files(&path)?;
    let mut failed = 0;

    for file in &files {
        match irlens_parser::parse_file(file) {
            Ok(module) => {
                println!(
                    "{} {} ({} functions, {} declarations)",
                    "VALID".bright_green().bold(),
                    file.display(),
                    module.defined_functions().count(),
                    module.declarations.len()
                );
            }
            Err(e) => {
                failed += 1;
                println!("{} {}", "INVALID".bright_red().bold(), file.display());
                eprintln!("{}", e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) failed validation", failed, files.len());
    }
    Ok(())
}

fn cmd_cfg(path: PathBuf, functions: Vec<String>) -> Result<()> {
    let inspect = InspectConfig::default().with_functions(functions);

    for (_, module) in load_modules(&path)? {
        for function in module.defined_functions() {
            if !inspect.selects(function.name()) {
                continue;
            }
            let cfg = ControlFlowGraph::build(function);
            let dom_tree = DominatorTree::build(function, &cfg);

            println!("// @{}", function.name());
            print!("{}", cfg.to_dot(function));
            println!("Is reducible: {}", cfg.is_reducible(&dom_tree));
        }
    }
    Ok(())
}

fn cmd_passes(json: bool) -> Result<()> {
    let passes = available_passes();
    if json {
        println!("{}", serde_json::to_string_pretty(&passes)?);
        return Ok(());
    }
    for pass in passes {
        println!("{:<14} {}", pass.name.bright_green(), pass.description);
    }
    Ok(())
}

fn load_modules(path: &Path) -> Result<Vec<(PathBuf, Module)>> {
    collect_files(path)?
        .into_iter()
        .map(|file| {
            let module = irlens_parser::parse_file(&file)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            Ok((file, module))
        })
        .collect()
}

/// `path` itself, or every `*.ir` file below it in name order.
fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        if !path.exists() {
            bail!("{} does not exist", path.display());
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "ir") {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        log::warn!("no .ir files under {}", path.display());
    }
    Ok(files)
}
