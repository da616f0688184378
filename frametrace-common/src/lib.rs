//! # Shared Table Layout (build step ↔ tracer)
//!
//! Defines the raw function-table layout a build step emits and the limits
//! the tracer applies while scanning it. Nothing here allocates, so a
//! generated `static` table can live in any binary, including `no_std` ones.
//!
//! ## Table Shape
//!
//! A raw table is a slice of [`RawFunction`] closed by [`RawFunction::END`]
//! (an entry with an empty name). Each entry carries up to [`ARGS_MAX_NUM`]
//! arguments; unused slots hold [`RawArgument::END`].
//!
//! ```text
//! static FUNCTIONS: [RawFunction; 3] = [
//!     RawFunction::new("main", 0x401000, [RawArgument::new("argc", ArgumentType::Int, 8), ..]),
//!     RawFunction::new("parse", 0x401200, [RawArgument::END; ARGS_MAX_NUM]),
//!     RawFunction::END,
//! ];
//! ```
//!
//! The tracer converts the table once into explicit-length sequences; the
//! sentinel never reaches the walker.

#![cfg_attr(not(test), no_std)]

// ============================================================================
// Scan Limits
// ============================================================================

/// Maximum number of arguments decoded per function
pub const ARGS_MAX_NUM: usize = 6;

/// Maximum number of table entries scanned during resolution
///
/// Tables derived from executable symbol tables hold tens of thousands of
/// entries, so the bound is generous.
pub const FUNCTS_MAX_NUM: usize = 65_536;

/// A return address further than this past the closest function start is
/// treated as unresolved (1 MiB)
pub const MAX_FUNCTION_SIZE_BYTES: u64 = 1 << 20;

// ============================================================================
// Rendering Limits
// ============================================================================

/// Characters of a string argument shown before the ellipsis
pub const STRING_MAX_CHARACTERS: usize = 25;

/// Entries of a string array shown before the truncation marker
pub const STRING_ARRAY_MAX_STRINGS: usize = 3;

/// Bytes scanned looking for a string's terminating NUL
pub const STRING_SCAN_LIMIT: usize = 4096;

/// Capacity of one rendered frame line
pub const MAX_BUF_SIZE: usize = 8192;

/// Frames visited before a walk gives up
pub const MAX_FRAMES: usize = 4096;

/// Word stored by a write probe
///
/// Write probes are destructive: the probed word holds this value afterwards.
pub const PROBE_SENTINEL: u64 = 10;

// ============================================================================
// Raw Table Types
// ============================================================================

/// Declared type of a function argument
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "user", serde(rename_all = "snake_case"))]
pub enum ArgumentType {
    Char = 0,
    Int = 1,
    Float = 2,
    Double = 3,
    /// `char *`
    String = 4,
    /// `char **`, NULL-terminated
    StringArray = 5,
    /// `void *`
    VoidPointer = 6,
    Unknown = 7,
}

impl ArgumentType {
    /// Decode a raw tag; anything out of range is `Unknown`
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Char,
            1 => Self::Int,
            2 => Self::Float,
            3 => Self::Double,
            4 => Self::String,
            5 => Self::StringArray,
            6 => Self::VoidPointer,
            _ => Self::Unknown,
        }
    }
}

/// One argument slot of a raw table entry
#[derive(Debug, Clone, Copy)]
pub struct RawArgument {
    /// Argument name; empty marks the end of the list
    pub name: &'static str,
    pub arg_type: ArgumentType,
    /// Byte offset of the argument from the frame's base pointer
    pub offset: i32,
}

impl RawArgument {
    /// Sentinel closing an argument list
    pub const END: Self = Self { name: "", arg_type: ArgumentType::Unknown, offset: 0 };

    #[must_use]
    pub const fn new(name: &'static str, arg_type: ArgumentType, offset: i32) -> Self {
        Self { name, arg_type, offset }
    }

    /// Returns true if this slot is the list terminator
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.name.is_empty()
    }
}

/// One function of a raw table
#[derive(Debug, Clone, Copy)]
pub struct RawFunction {
    /// Function name; empty marks the end of the table
    pub name: &'static str,
    /// Address of the function's first instruction
    pub addr: u64,
    pub args: [RawArgument; ARGS_MAX_NUM],
}

impl RawFunction {
    /// Sentinel closing a table
    pub const END: Self = Self { name: "", addr: 0, args: [RawArgument::END; ARGS_MAX_NUM] };

    #[must_use]
    pub const fn new(name: &'static str, addr: u64, args: [RawArgument; ARGS_MAX_NUM]) -> Self {
        Self { name, addr, args }
    }

    /// Returns true if this entry is the table terminator
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.name.is_empty()
    }

    /// Arguments up to (not including) the first terminator slot
    pub fn arguments(&self) -> impl Iterator<Item = &RawArgument> {
        self.args.iter().take_while(|arg| !arg.is_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_out_of_range_is_unknown() {
        assert_eq!(ArgumentType::from_tag(1), ArgumentType::Int);
        assert_eq!(ArgumentType::from_tag(5), ArgumentType::StringArray);
        assert_eq!(ArgumentType::from_tag(200), ArgumentType::Unknown);
    }

    #[test]
    fn test_arguments_stop_at_sentinel() {
        let mut args = [RawArgument::END; ARGS_MAX_NUM];
        args[0] = RawArgument::new("a", ArgumentType::Int, 8);
        args[1] = RawArgument::new("b", ArgumentType::Char, 12);
        args[3] = RawArgument::new("hidden", ArgumentType::Int, 20);

        let func = RawFunction::new("f", 0x1000, args);
        assert_eq!(func.arguments().count(), 2);
        assert!(!func.is_end());
        assert!(RawFunction::END.is_end());
    }
}
