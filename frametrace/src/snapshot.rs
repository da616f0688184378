//! Recorded address spaces for offline replay
//!
//! A snapshot captures what the walker needs: the initial base pointer, the
//! mapped regions with their contents, and the function table. Return
//! addresses must land in a mapped region (usually a read-only code range),
//! otherwise the walk ends on a corrupt frame.
//!
//! ```json
//! {
//!   "initial_base_pointer": "0x7ffd0100",
//!   "regions": [
//!     {"start": "0x7ffd0000", "size": 4096, "writable": true, "patches": [
//!       {"word": {"at": "0x7ffd0100", "value": "0x7ffd0200"}},
//!       {"word": {"at": "0x7ffd0108", "value": "0x401042"}},
//!       {"bytes": {"at": "0x7ffd0110", "bytes": [65]}},
//!       {"cstr": {"at": "0x7ffd0800", "text": "hello"}}
//!     ]},
//!     {"start": "0x401000", "size": 4096}
//!   ],
//!   "functions": [{"name": "main", "start_address": "0x401000"}]
//! }
//! ```
//!
//! Replaying through [`SyntheticMemory`] uses the same [`Tracer`](crate::walker::Tracer)
//! as live traces.

use crate::domain::{hex_address, FunctionDescriptor, SnapshotError};
use crate::probe::SyntheticMemory;
use crate::resolver::FunctionTable;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Contents written into a region before replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Patch {
    /// One native-endian machine word
    Word {
        #[serde(with = "hex_address")]
        at: u64,
        #[serde(with = "hex_address")]
        value: u64,
    },
    /// Raw bytes
    Bytes {
        #[serde(with = "hex_address")]
        at: u64,
        bytes: Vec<u8>,
    },
    /// NUL-terminated string
    Cstr {
        #[serde(with = "hex_address")]
        at: u64,
        text: String,
    },
}

/// One mapped range of the recorded address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    #[serde(with = "hex_address")]
    pub start: u64,
    pub size: u64,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub patches: Vec<Patch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "hex_address")]
    pub initial_base_pointer: u64,
    pub regions: Vec<RegionSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
}

impl Snapshot {
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid snapshot
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path.as_ref())?;
        let snapshot: Self = serde_json::from_str(&text)?;
        info!(
            "Loaded snapshot {} ({} regions, {} functions)",
            path.as_ref().display(),
            snapshot.regions.len(),
            snapshot.functions.len()
        );
        Ok(snapshot)
    }

    /// Map every region and apply its patches in order
    ///
    /// Patches are applied after all regions exist, so a patch may span
    /// adjacent regions.
    ///
    /// # Errors
    /// Returns an error for overlapping or out-of-range regions and for
    /// patches that fall outside the mapped regions
    pub fn build_memory(&self) -> Result<SyntheticMemory, SnapshotError> {
        let mut memory = SyntheticMemory::new();
        for region in &self.regions {
            memory.map(region.start, region.size, region.writable)?;
        }
        for patch in self.regions.iter().flat_map(|r| &r.patches) {
            match patch {
                Patch::Word { at, value } => memory.poke_word(*at, *value)?,
                Patch::Bytes { at, bytes } => memory.poke_bytes(*at, bytes)?,
                Patch::Cstr { at, text } => memory.poke_c_str(*at, text)?,
            }
        }
        debug!("Built synthetic memory with {} regions", memory.region_count());
        Ok(memory)
    }

    /// Split into the pieces a replay needs
    ///
    /// # Errors
    /// Returns an error if the memory image or the function table is invalid
    pub fn into_parts(self) -> Result<(SyntheticMemory, FunctionTable, u64), SnapshotError> {
        let memory = self.build_memory()?;
        let table = FunctionTable::new(self.functions)?;
        Ok((memory, table, self.initial_base_pointer))
    }
}
