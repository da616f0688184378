//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "frametrace",
    about = "Print frame-pointer stack traces with decoded arguments",
    after_help = "\
EXAMPLES:
    frametrace demo --depth 5                    Trace a live call chain of this tool
    frametrace demo --arguments args.json        Same, with argument descriptions
    frametrace replay stack.json --export out.json
                                                 Walk a recorded stack, save a JSON report"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Trace limits and decoding options (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Trace a nested call chain inside this process
    Demo {
        /// Nesting depth of the traced call chain
        #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=64))]
        depth: u32,

        /// Argument overlay: JSON map of function name to argument list
        #[arg(long, value_name = "FILE")]
        arguments: Option<PathBuf>,
    },

    /// Walk a recorded address space
    Replay {
        /// Snapshot file (JSON)
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Also write the trace as a JSON report
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },
}
