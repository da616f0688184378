//! # frametrace - Main Entry Point
//!
//! Two subcommands:
//! - **demo** (`frametrace demo --depth 5`): trace a live call chain of this
//!   process, naming frames from its own ELF symbols
//! - **replay** (`frametrace replay stack.json`): walk a recorded address space
//!
//! Exit codes: 0 success, 1 error (including a failed write of the trace),
//! 2 usage, 3 the trace ended on a corrupt frame.

use anyhow::{Context, Result};
use clap::Parser;
use frametrace::cli::{Args, Command};
use frametrace::domain::ConfigError;
use frametrace::export::{RecordingSink, TraceExport};
use frametrace::resolver::load_argument_overlay;
use frametrace::snapshot::Snapshot;
use frametrace::symbolization::load_executable_table;
use frametrace::{trace_with_config, FunctionTable, TraceConfig, TraceOutcome, TraceReport, Tracer};
use log::info;
use std::hint::black_box;
use std::io;
use std::path::Path;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_FATAL_TRACE: i32 = 3;

fn main() {
    env_logger::init();
    let args = Args::parse();
    std::process::exit(match run(&args) {
        Ok(report) => {
            if !args.quiet {
                eprintln!("trace {} ({} frames)", report.outcome, report.lines_written);
            }
            match report.outcome {
                TraceOutcome::Fatal(_) => EXIT_FATAL_TRACE,
                TraceOutcome::SinkError(_) => EXIT_ERROR,
                TraceOutcome::Completed | TraceOutcome::Terminated => EXIT_SUCCESS,
            }
        }
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::Invalid(_))) {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run(args: &Args) -> Result<TraceReport> {
    let config = load_config(args.config.as_deref())?;

    match &args.command {
        Command::Demo { depth, arguments } => {
            let mut table = load_executable_table().context("Failed to build function table")?;
            if let Some(path) = arguments {
                let overlay = load_argument_overlay(path)
                    .with_context(|| format!("Failed to load argument overlay {}", path.display()))?;
                let applied = table.apply_argument_overlay(&overlay);
                info!("Argument overlay matched {applied} functions");
            }
            demo_descend(*depth, &table, &config)
        }
        Command::Replay { snapshot, export } => replay(snapshot, export.as_deref(), &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<TraceConfig> {
    let Some(path) = path else {
        return Ok(TraceConfig::default());
    };
    match TraceConfig::from_json_file(path) {
        Ok(config) => Ok(config),
        Err(e @ ConfigError::Invalid(_)) => Err(e.into()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to load config {}", path.display()))),
    }
}

/// Recurse `remaining` levels, then trace from the innermost frame
#[inline(never)]
fn demo_descend(remaining: u32, table: &FunctionTable, config: &TraceConfig) -> Result<TraceReport> {
    let report = if remaining == 0 {
        demo_leaf(table, config)?
    } else {
        demo_descend(black_box(remaining - 1), table, config)?
    };
    // Keeps the calls out of tail position so every level keeps its frame
    Ok(black_box(report))
}

#[inline(never)]
fn demo_leaf(table: &FunctionTable, config: &TraceConfig) -> Result<TraceReport> {
    let stdout = io::stdout();
    let mut sink = stdout.lock();
    let report = trace_with_config(&mut sink, black_box(table), config)?;
    Ok(black_box(report))
}

fn replay(snapshot_path: &Path, export: Option<&Path>, config: &TraceConfig) -> Result<TraceReport> {
    let snapshot = Snapshot::load(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;
    let (mut memory, table, initial_bp) = snapshot.into_parts().context("Invalid snapshot")?;

    let mut sink = RecordingSink::new(io::stdout().lock());
    let report = Tracer::new(&table, config).run(&mut memory, initial_bp, &mut sink);

    if let Some(path) = export {
        let text = String::from_utf8_lossy(sink.recorded());
        TraceExport::new(&report, &text).export_to_file(path)?;
        info!("Trace report written to {}", path.display());
    }
    Ok(report)
}
