//! Domain model for frametrace
//!
//! This module contains core domain types and errors that provide:
//! - Function and argument descriptors shared by every table source
//! - Hex-or-integer address parsing for JSON inputs
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use frametrace_common::ArgumentType;
pub use types::{hex_address, ArgumentDescriptor, FunctionDescriptor, WORD_SIZE};

pub use errors::{ArgumentFault, ConfigError, Fault, ProbeSetupError, SnapshotError, TableError};
