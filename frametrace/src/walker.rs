//! Frame walking
//!
//! Follows the saved frame-pointer chain from an initial base pointer toward
//! the entry frame, writing one line per resolved return address:
//!
//! ```text
//! Function parse_line(char *line="key=value", int n=3), in
//! Function 0x55d0c0ffee10(...), in
//! Function main(int argc=1, char **argv={"./app"}), in
//! ```
//!
//! The walk moves through these states:
//!
//! ```text
//!   Init ──▶ Probing ──▶ Advancing ──▶ Probing ...
//!               │            │
//!               │            ├──▶ Terminated   (previous fp not writable: root reached)
//!               │            └──▶ Fatal        (previous fp writable but not above bp)
//!               └──▶ Fatal                     (bp, return slot, return address or argument unreadable)
//!   Completed: bp null, or the frame limit reached
//! ```
//!
//! Lines are written and flushed one at a time, so everything emitted before
//! a fatal abort stays in the sink.

use crate::config::TraceConfig;
use crate::decoder::{ArgumentDecoder, LineBuffer};
use crate::domain::{ArgumentFault, ProbeSetupError};
use crate::frame::FrameCursor;
use crate::platform::{current_frame_pointer, FrameLayout};
use crate::probe::{MemoryProbe, ProbeContext};
use crate::resolver::{FunctionResolver, FunctionTable};
use log::{debug, warn};
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Marker appended when the walk aborts on a corrupt frame
pub const FATAL_MARKER: &str = "FATAL: stack frame invalid/corrupt\n";

/// Why a walk aborted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalCause {
    #[error("base pointer {0:#x} is not readable")]
    UnreadableBasePointer(u64),

    #[error("return address slot of frame {0:#x} is not readable")]
    UnreadableReturnSlot(u64),

    #[error("return address {0:#x} does not point into readable memory")]
    UnreadableReturnAddress(u64),

    #[error("saved frame pointer {previous:#x} of frame {base:#x} is writable but does not lead outward")]
    CorruptFramePointer { base: u64, previous: u64 },

    #[error("in {function}: {fault}")]
    UnreadableArgument { function: String, fault: ArgumentFault },
}

/// How a walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    /// Null base pointer or frame limit reached
    Completed,
    /// Entry frame reached (previous frame pointer not writable)
    Terminated,
    /// Corrupt frame; the fatal marker was written
    Fatal(FatalCause),
    /// The sink rejected a write or flush
    SinkError(io::ErrorKind),
}

impl TraceOutcome {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, TraceOutcome::Fatal(_))
    }
}

impl fmt::Display for TraceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceOutcome::Completed => write!(f, "completed"),
            TraceOutcome::Terminated => write!(f, "terminated"),
            TraceOutcome::Fatal(cause) => write!(f, "fatal: {cause}"),
            TraceOutcome::SinkError(kind) => write!(f, "sink error: {kind}"),
        }
    }
}

/// Result of one walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceReport {
    pub outcome: TraceOutcome,
    /// Frame lines written to the sink (the fatal marker is not counted)
    pub lines_written: usize,
}

/// Where the loop goes after a frame
enum Step {
    Continue,
    Stop(TraceOutcome),
}

/// Walks frame chains in any [`MemoryProbe`] address space
pub struct Tracer<'t> {
    table: &'t FunctionTable,
    config: &'t TraceConfig,
    layout: FrameLayout,
}

impl<'t> Tracer<'t> {
    pub fn new(table: &'t FunctionTable, config: &'t TraceConfig) -> Self {
        Self { table, config, layout: FrameLayout::native() }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Walk the chain starting at `initial_bp`, writing lines to `sink`
    pub fn run<P, W>(&self, probe: &mut P, initial_bp: u64, sink: &mut W) -> TraceReport
    where
        P: MemoryProbe + ?Sized,
        W: Write + ?Sized,
    {
        let resolver = FunctionResolver::new(self.table, self.config);
        let decoder = ArgumentDecoder::new(self.config);
        let mut line = LineBuffer::new(self.config.max_line_bytes);

        let mut bp = initial_bp;
        let mut frames = 0;
        let mut lines_written = 0;
        debug!("Walk starts at bp={bp:#x}");

        let outcome = loop {
            if bp == 0 {
                debug!("Null base pointer after {frames} frames");
                break TraceOutcome::Completed;
            }
            if frames >= self.config.max_frames {
                debug!("Frame limit {} reached", self.config.max_frames);
                break TraceOutcome::Completed;
            }
            frames += 1;

            let frame = FrameCursor::new(bp);
            let Ok(previous) = frame.read_word_at(probe, self.layout.saved_fp_offset) else {
                break TraceOutcome::Fatal(FatalCause::UnreadableBasePointer(bp));
            };
            let Ok(return_address) = frame.read_word_at(probe, self.layout.return_address_offset) else {
                break TraceOutcome::Fatal(FatalCause::UnreadableReturnSlot(bp));
            };
            if !probe.probe_read(return_address) {
                break TraceOutcome::Fatal(FatalCause::UnreadableReturnAddress(return_address));
            }

            if previous > bp {
                debug!("Advancing bp {bp:#x} -> {previous:#x}, ret={return_address:#x}");
                bp = previous;
            } else if probe.probe_write(previous) {
                break TraceOutcome::Fatal(FatalCause::CorruptFramePointer { base: bp, previous });
            } else {
                debug!("Saved fp {previous:#x} of frame {bp:#x} not writable, entry frame reached");
                break TraceOutcome::Terminated;
            }

            line.clear();
            let step = Self::render_frame(probe, &resolver, &decoder, return_address, bp, &mut line);

            if let Err(kind) = emit(sink, line.as_str()) {
                break TraceOutcome::SinkError(kind);
            }
            lines_written += 1;

            if let Step::Stop(outcome) = step {
                break outcome;
            }
        };

        let outcome = match outcome {
            TraceOutcome::Fatal(cause) => {
                warn!("Stack walk aborted: {cause}");
                match emit(sink, FATAL_MARKER) {
                    Ok(()) => TraceOutcome::Fatal(cause),
                    Err(kind) => TraceOutcome::SinkError(kind),
                }
            }
            other => other,
        };

        debug!("Walk finished: {outcome}, {lines_written} lines");
        TraceReport { outcome, lines_written }
    }

    /// Build the line for the function containing `return_address`, whose
    /// frame is anchored at `bp`
    fn render_frame<P: MemoryProbe + ?Sized>(
        probe: &mut P,
        resolver: &FunctionResolver<'_>,
        decoder: &ArgumentDecoder<'_>,
        return_address: u64,
        bp: u64,
        line: &mut LineBuffer,
    ) -> Step {
        let Some(function) = resolver.resolve(return_address) else {
            debug!("No function for return address {return_address:#x}");
            line.push_fmt(format_args!("Function {return_address:#x}(...), in\n"));
            return Step::Continue;
        };

        line.push_fmt(format_args!("Function {}(", function.name));
        let step = match decoder.decode(probe, function, FrameCursor::new(bp), line) {
            Ok(_) => Step::Continue,
            Err(fault) => Step::Stop(TraceOutcome::Fatal(FatalCause::UnreadableArgument {
                function: function.name.clone(),
                fault,
            })),
        };
        line.push_str("), in\n");
        step
    }
}

fn emit<W: Write + ?Sized>(sink: &mut W, text: &str) -> Result<(), io::ErrorKind> {
    sink.write_all(text.as_bytes()).map_err(|e| e.kind())?;
    sink.flush().map_err(|e| e.kind())
}

/// Print the calling thread's stack to `sink` with default limits
///
/// # Errors
/// Returns an error if no probe context can be opened
#[inline(never)]
pub fn trace<W: Write + ?Sized>(sink: &mut W, table: &FunctionTable) -> Result<TraceReport, ProbeSetupError> {
    let bp = current_frame_pointer();
    walk_live(bp, sink, table, &TraceConfig::default())
}

/// Print the calling thread's stack to `sink`
///
/// # Errors
/// Returns an error if no probe context can be opened
#[inline(never)]
pub fn trace_with_config<W: Write + ?Sized>(
    sink: &mut W,
    table: &FunctionTable,
    config: &TraceConfig,
) -> Result<TraceReport, ProbeSetupError> {
    let bp = current_frame_pointer();
    walk_live(bp, sink, table, config)
}

fn walk_live<W: Write + ?Sized>(
    bp: u64,
    sink: &mut W,
    table: &FunctionTable,
    config: &TraceConfig,
) -> Result<TraceReport, ProbeSetupError> {
    let mut probe = ProbeContext::open()?;
    debug!("Live trace with {:?} probing", probe.strategy());
    Ok(Tracer::new(table, config).run(&mut probe, bp, sink))
}
