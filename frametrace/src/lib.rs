//! # frametrace - Frame-Pointer Stack Traces with Decoded Arguments
//!
//! frametrace prints the call stack of the running thread by following
//! saved frame pointers, naming each frame from a function table and
//! rendering that function's arguments from known offsets in its frame.
//! Every memory access goes through a fault-tolerant probe, so a corrupt
//! stack ends the trace with a marker instead of crashing the process.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Calling thread's stack                      │
//! │            (or a recorded snapshot of an address space)         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ guarded reads / write probes
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      frametrace (This Crate)                    │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Probe     │◀──│    Walker    │──▶│   Resolver   │         │
//! │  │ (EFAULT/sim) │   │ (fp chain)   │   │ (ret → func) │         │
//! │  └──────────────┘   └──────┬───────┘   └──────▲───────┘         │
//! │                            │                  │                 │
//! │                            ▼                  │                 │
//! │                     ┌──────────────┐   ┌──────┴───────┐         │
//! │                     │   Decoder    │   │ Symbolization│         │
//! │                     │ (arguments)  │   │ (ELF tables) │         │
//! │                     └──────┬───────┘   └──────────────┘         │
//! │                            ▼                                    │
//! │                  io::Write sink  ──▶  Export (report.json)      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`probe`]: guarded memory access
//!   - `process`: this process via `process_vm_readv`/`writev` or a pipe
//!   - `synthetic`: simulated address spaces for replay and tests
//!
//! - [`walker`]: the frame-walking state machine and the [`trace`] entry point
//!
//! - [`resolver`]: function tables and return-address resolution
//!
//! - [`decoder`]: per-type argument rendering and line buffering
//!
//! - [`frame`] / [`platform`]: checked frame offsets, frame-pointer register
//!   access and frame layout
//!
//! ### Input and Output Modules
//!
//! - [`symbolization`]: function tables from the executable's ELF symbols
//!   - Handles PIE load bias via `/proc/<pid>/maps`
//!
//! - [`snapshot`]: recorded address spaces for offline replay
//!
//! - [`export`]: JSON trace reports
//!
//! - [`config`]: limits and decoding options
//!
//! - [`cli`]: command-line argument parsing
//!
//! - [`domain`]: descriptors and error types
//!
//! ## Output Format
//!
//! ```text
//! Function parse(char *line="key=value", int n=3), in
//! Function 0x55d0c0ffee10(...), in
//! Function main(int argc=2, char **argv={"./app","-v"}), in
//! FATAL: stack frame invalid/corrupt
//! ```
//!
//! The last line appears only when the walk hit a corrupt frame.
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! let table = frametrace::symbolization::load_executable_table()?;
//! let report = frametrace::trace(&mut std::io::stderr(), &table)?;
//! ```
//!
//! Frame pointers must be kept (`-C force-frame-pointers=yes`); frames of
//! code built without them are skipped or end the walk.

pub mod cli;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod export;
pub mod frame;
pub mod platform;
pub mod probe;
pub mod resolver;
pub mod snapshot;
pub mod symbolization;
pub mod walker;

pub use config::TraceConfig;
pub use resolver::{FunctionResolver, FunctionTable};
pub use walker::{trace, trace_with_config, FatalCause, TraceOutcome, TraceReport, Tracer, FATAL_MARKER};
