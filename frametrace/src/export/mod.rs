//! Trace report export
//!
//! Writes a finished trace as JSON for other tools to consume:
//!
//! ```json
//! {
//!   "outcome": "terminated",
//!   "fatal": false,
//!   "lines_written": 2,
//!   "lines": ["Function inner(void), in", "Function outer(void), in"]
//! }
//! ```

use crate::walker::TraceReport;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Passes writes through to `inner` and keeps a copy of what it accepted
///
/// Lets a trace go straight to its destination while the text is still
/// available for [`TraceExport`].
#[derive(Debug)]
pub struct RecordingSink<W> {
    inner: W,
    recorded: Vec<u8>,
}

impl<W: Write> RecordingSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, recorded: Vec::new() }
    }

    /// Bytes the inner writer accepted so far
    #[must_use]
    pub fn recorded(&self) -> &[u8] {
        &self.recorded
    }
}

impl<W: Write> Write for RecordingSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.recorded.extend_from_slice(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceExport {
    pub outcome: String,
    pub fatal: bool,
    pub lines_written: usize,
    /// Emitted lines without their newline, fatal marker included
    pub lines: Vec<String>,
}

impl TraceExport {
    /// Pair a report with the text the walk produced
    #[must_use]
    pub fn new(report: &TraceReport, output: &str) -> Self {
        Self {
            outcome: report.outcome.to_string(),
            fatal: report.outcome.is_fatal(),
            lines_written: report.lines_written,
            lines: output.lines().map(str::to_string).collect(),
        }
    }

    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).context("Failed to serialize trace report")
    }

    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn export_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.export(&mut writer)?;
        writer.flush().context("Failed to flush trace report")
    }
}
