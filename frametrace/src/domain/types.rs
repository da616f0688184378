//! Descriptor types for traced functions
//!
//! A [`FunctionDescriptor`] names a function, where it starts, and how to
//! find each of its arguments relative to the frame's base pointer. Tables of
//! descriptors are read-only for the duration of a trace.

use frametrace_common::{ArgumentType, RawArgument, RawFunction};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a machine word (saved frame pointers, return addresses, pointers)
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// One argument of a traced function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgumentType,
    /// Signed byte displacement from the frame's base pointer
    pub frame_offset: i64,
}

impl ArgumentDescriptor {
    pub fn new(name: impl Into<String>, arg_type: ArgumentType, frame_offset: i64) -> Self {
        Self { name: name.into(), arg_type, frame_offset }
    }
}

impl From<&RawArgument> for ArgumentDescriptor {
    fn from(raw: &RawArgument) -> Self {
        Self::new(raw.name, raw.arg_type, i64::from(raw.offset))
    }
}

/// A function the resolver can attribute return addresses to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    #[serde(with = "hex_address")]
    pub start_address: u64,
    #[serde(default)]
    pub arguments: Vec<ArgumentDescriptor>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, start_address: u64) -> Self {
        Self { name: name.into(), start_address, arguments: Vec::new() }
    }

    /// Builder-style helper for attaching an argument
    #[must_use]
    pub fn with_argument(
        mut self,
        name: impl Into<String>,
        arg_type: ArgumentType,
        frame_offset: i64,
    ) -> Self {
        self.arguments.push(ArgumentDescriptor::new(name, arg_type, frame_offset));
        self
    }

    /// Convert a raw table entry, keeping at most `max_arguments` arguments
    #[must_use]
    pub fn from_raw(raw: &RawFunction, max_arguments: usize) -> Self {
        Self {
            name: raw.name.to_string(),
            start_address: raw.addr,
            arguments: raw.arguments().take(max_arguments).map(ArgumentDescriptor::from).collect(),
        }
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.name, self.start_address)
    }
}

/// Serde helpers for addresses written either as integers or `"0x..."` strings
pub mod hex_address {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AddressRepr {
        Int(u64),
        Text(String),
    }

    /// Serialize as a lowercase `0x`-prefixed string
    ///
    /// # Errors
    /// Propagates serializer errors
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(addr: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{addr:#x}"))
    }

    /// Accept `4096`, `"4096"` or `"0x1000"`
    ///
    /// # Errors
    /// Returns an error if the string is not a valid address
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match AddressRepr::deserialize(deserializer)? {
            AddressRepr::Int(value) => Ok(value),
            AddressRepr::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }

    /// Parse an address string
    ///
    /// # Errors
    /// Returns a description of the malformed input
    pub fn parse(text: &str) -> Result<u64, String> {
        let trimmed = text.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed.map_err(|e| format!("invalid address '{text}': {e}"))
    }
}
