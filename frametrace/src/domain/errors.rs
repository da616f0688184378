//! Structured error types for frametrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

/// A guarded memory access that did not succeed
///
/// Faults are values, never signals: every probe reports one of these
/// instead of letting the access terminate the process.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("address {0:#x} is not readable")]
    Unreadable(u64),

    #[error("address {0:#x} is not writable")]
    NotWritable(u64),

    #[error("offset {offset} from base {base:#x} leaves the address space")]
    OffsetOverflow { base: u64, offset: i64 },
}

impl Fault {
    /// Address the failed access targeted (the base for offset overflows)
    #[must_use]
    pub fn address(&self) -> u64 {
        match *self {
            Fault::Unreadable(addr) | Fault::NotWritable(addr) => addr,
            Fault::OffsetOverflow { base, .. } => base,
        }
    }
}

/// An argument slot of a frame could not be read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("argument `{argument}`: {fault}")]
pub struct ArgumentFault {
    pub argument: String,
    pub fault: Fault,
}

#[derive(Error, Debug)]
pub enum ProbeSetupError {
    #[error("Failed to create probe pipe: {0}")]
    PipeCreationFailed(#[source] std::io::Error),

    #[error("Probe self-test failed: {0}")]
    SelfTestFailed(String),
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Function table entry {index} has an empty name")]
    EmptyName { index: usize },

    #[error("Argument {argument} of function {function} has an empty name")]
    EmptyArgumentName { function: String, argument: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Region at {start:#x} overlaps an existing region")]
    OverlappingRegion { start: u64 },

    #[error("Region at {start:#x} with size {size} wraps the address space")]
    RegionOutOfRange { start: u64, size: u64 },

    #[error("Patch at {at:#x} ({len} bytes) is not inside a mapped region")]
    PatchOutsideRegion { at: u64, len: usize },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
