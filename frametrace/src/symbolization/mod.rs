//! # Function Tables from Symbols
//!
//! Live traces need a [`FunctionTable`](crate::resolver::FunctionTable)
//! whose start addresses match the running process. This module builds one
//! from the executable's own ELF symbol table.
//!
//! ## PIE (Position Independent Executable)
//!
//! Symbol addresses in a PIE binary are link-time values (0x1000, 0x2000...),
//! while return addresses on the stack are runtime values
//! (0x55f3a2b4c000...). The difference is the **load bias**:
//!
//! ```text
//! Runtime Address = Load Bias + Link Address
//! Load Bias       = first mapping of the binary - lowest segment address (page aligned)
//! ```
//!
//! The first mapping comes from `/proc/<pid>/maps`. Non-PIE executables have
//! a bias of zero.
//!
//! ## Flow
//!
//! ```text
//! 1. Read the executable (object crate), collect defined text symbols
//! 2. Demangle Rust names: _ZN9frametrace6walker5trace17h...E -> frametrace::walker::trace
//! 3. Find the binary's range in /proc/self/maps, compute the bias
//! 4. Relocate, sort and dedupe by start address
//! ```
//!
//! Symbols carry no argument information, so every entry starts with an
//! empty argument list. An argument overlay
//! ([`load_argument_overlay`](crate::resolver::load_argument_overlay)) can
//! attach arguments by function name afterwards.
//!
//! ## Module Structure
//!
//! - **`elf_table`**: symbol extraction, demangling, relocation
//! - **`memory_maps`**: `/proc/<pid>/maps` parsing

pub mod elf_table;
pub mod memory_maps;

pub use elf_table::{demangle_symbol, load_executable_table, load_table_for, load_table_from_file};
pub use memory_maps::{parse_maps_text, parse_memory_maps, MemoryRange};
