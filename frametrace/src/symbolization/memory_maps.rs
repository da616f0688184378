//! Memory mapping utilities for process address space analysis
//!
//! Parses `/proc/<pid>/maps` to find where a binary is loaded, which gives
//! the load bias of position-independent executables.

use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

/// Memory range of a loaded binary in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Parse `/proc/<pid>/maps` to find the memory range of a specific binary
///
/// # Errors
/// Returns an error if the maps file cannot be read or the binary is not mapped
pub fn parse_memory_maps(pid: u32, binary_path: &Path) -> Result<MemoryRange> {
    let maps_path = format!("/proc/{pid}/maps");
    let maps = fs::read_to_string(&maps_path).with_context(|| format!("Failed to read {maps_path}"))?;

    let range = parse_maps_text(&maps, binary_path)?;
    info!(
        "Executable memory range: 0x{:x} - 0x{:x} (size: {} KB)",
        range.start,
        range.end,
        (range.end - range.start) / 1024
    );
    Ok(range)
}

/// Find the span from the lowest start to the highest end of every mapping
/// whose pathname is exactly `binary_path`
///
/// # Errors
/// Returns an error if an address field is malformed or no line matches
pub fn parse_maps_text(maps: &str, binary_path: &Path) -> Result<MemoryRange> {
    let wanted = binary_path.to_string_lossy();
    let mut span: Option<MemoryRange> = None;

    // "start-end perms offset dev inode pathname"
    for line in maps.lines() {
        let Some(path_at) = line.find('/') else {
            continue;
        };
        if line[path_at..].trim_end() != wanted {
            continue;
        }
        let Some((start, end)) = line.split_whitespace().next().and_then(|r| r.split_once('-')) else {
            continue;
        };
        let start = u64::from_str_radix(start, 16).context("Failed to parse range start")?;
        let end = u64::from_str_radix(end, 16).context("Failed to parse range end")?;

        span = Some(match span {
            Some(s) => MemoryRange { start: s.start.min(start), end: s.end.max(end) },
            None => MemoryRange { start, end },
        });
    }

    span.with_context(|| format!("Could not find memory range for {wanted}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
55d0c0000000-55d0c0004000 r--p 00000000 fd:01 1234                       /usr/bin/demo app
55d0c0004000-55d0c0020000 r-xp 00004000 fd:01 1234                       /usr/bin/demo app
55d0c0020000-55d0c0028000 rw-p 00020000 fd:01 1234                       /usr/bin/demo app
55d0c1000000-55d0c1021000 rw-p 00000000 00:00 0                          [heap]
7f0000000000-7f0000100000 r-xp 00000000 fd:01 99                         /usr/lib/libc.so.6
7ffd00000000-7ffd00021000 rw-p 00000000 00:00 0                          [stack]
";

    #[test]
    fn test_memory_range_contains() {
        let range = MemoryRange { start: 0x1000, end: 0x2000 };

        assert!(range.contains(0x1000));
        assert!(range.contains(0x1FFF));
        assert!(!range.contains(0x0FFF));
        assert!(!range.contains(0x2000));
    }

    #[test]
    fn test_parse_maps_text_spans_all_segments() {
        let range = parse_maps_text(MAPS, Path::new("/usr/bin/demo app")).unwrap();
        assert_eq!(range, MemoryRange { start: 0x55d0_c000_0000, end: 0x55d0_c002_8000 });
    }

    #[test]
    fn test_parse_maps_text_requires_exact_path() {
        assert!(parse_maps_text(MAPS, Path::new("/usr/bin/demo")).is_err());
        assert!(parse_maps_text(MAPS, Path::new("/usr/lib/libc.so.6")).is_ok());
    }

    #[test]
    fn test_parse_memory_maps_self() {
        let exe = std::env::current_exe().unwrap().canonicalize().unwrap();
        let range = parse_memory_maps(std::process::id(), &exe).unwrap();

        let this_fn = test_parse_memory_maps_self as usize as u64;
        assert!(range.contains(this_fn));
    }
}
