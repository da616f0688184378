//! Simulated address space
//!
//! A set of non-overlapping regions, each readable and optionally writable.
//! Anything outside a region is unmapped. Used to replay recorded stacks and
//! to build corrupted stacks that would be unsafe to fabricate for real.

use super::MemoryProbe;
use crate::domain::{Fault, SnapshotError, WORD_SIZE};

#[derive(Debug, Clone)]
struct Region {
    start: u64,
    data: Vec<u8>,
    writable: bool,
}

impl Region {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }
}

/// In-memory address space with per-region permissions
#[derive(Debug, Clone, Default)]
pub struct SyntheticMemory {
    regions: Vec<Region>,
    /// Addresses that received a successful write probe, in order
    writes: Vec<u64>,
}

impl SyntheticMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `size` zeroed bytes at `start`
    ///
    /// # Errors
    /// Returns an error if the range overlaps an existing region or wraps
    pub fn map(&mut self, start: u64, size: u64, writable: bool) -> Result<(), SnapshotError> {
        let end = start
            .checked_add(size)
            .ok_or(SnapshotError::RegionOutOfRange { start, size })?;
        let len = usize::try_from(size).map_err(|_| SnapshotError::RegionOutOfRange { start, size })?;

        if self.regions.iter().any(|r| start < r.end() && r.start < end) {
            return Err(SnapshotError::OverlappingRegion { start });
        }

        self.regions.push(Region { start, data: vec![0; len], writable });
        self.regions.sort_by_key(|r| r.start);
        Ok(())
    }

    /// Store bytes regardless of region permissions (for building images)
    ///
    /// # Errors
    /// Returns an error if any byte falls outside the mapped regions
    pub fn poke_bytes(&mut self, at: u64, bytes: &[u8]) -> Result<(), SnapshotError> {
        let outside = || SnapshotError::PatchOutsideRegion { at, len: bytes.len() };
        let mut cursor = at;
        let mut rest = bytes;

        while !rest.is_empty() {
            let region = self.regions.iter_mut().find(|r| r.contains(cursor)).ok_or_else(outside)?;
            let offset = usize::try_from(cursor - region.start).map_err(|_| outside())?;
            let take = rest.len().min(region.data.len() - offset);
            region.data[offset..offset + take].copy_from_slice(&rest[..take]);
            rest = &rest[take..];
            cursor = cursor.checked_add(take as u64).ok_or_else(outside)?;
        }
        Ok(())
    }

    /// Store one native-endian machine word
    ///
    /// # Errors
    /// Returns an error if the word falls outside the mapped regions
    pub fn poke_word(&mut self, at: u64, value: u64) -> Result<(), SnapshotError> {
        let bytes = word_bytes(value).ok_or(SnapshotError::PatchOutsideRegion { at, len: WORD_SIZE })?;
        self.poke_bytes(at, &bytes)
    }

    /// Store a NUL-terminated copy of `text`
    ///
    /// # Errors
    /// Returns an error if the string falls outside the mapped regions
    pub fn poke_c_str(&mut self, at: u64, text: &str) -> Result<(), SnapshotError> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.poke_bytes(at, &bytes)
    }

    /// Addresses that were successfully write-probed
    #[must_use]
    pub fn write_log(&self) -> &[u64] {
        &self.writes
    }

    /// Number of mapped regions
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Split `len` bytes from `addr` into `(region, offset, len)` pieces;
    /// `None` if any byte is unmapped, or read-only when `need_write` is set
    fn covering(&self, addr: u64, len: usize, need_write: bool) -> Option<Vec<(usize, usize, usize)>> {
        let mut pieces = Vec::new();
        let mut cursor = addr;
        let mut remaining = len;

        while remaining > 0 {
            let index = self.regions.iter().position(|r| r.contains(cursor))?;
            let region = &self.regions[index];
            if need_write && !region.writable {
                return None;
            }
            let offset = usize::try_from(cursor - region.start).ok()?;
            let take = remaining.min(region.data.len() - offset);
            pieces.push((index, offset, take));
            remaining -= take;
            cursor = cursor.checked_add(take as u64)?;
        }
        Some(pieces)
    }
}

fn word_bytes(value: u64) -> Option<[u8; WORD_SIZE]> {
    usize::try_from(value).ok().map(usize::to_ne_bytes)
}

impl MemoryProbe for SyntheticMemory {
    fn read_bytes(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Fault> {
        let pieces = self.covering(addr, buf.len(), false).ok_or(Fault::Unreadable(addr))?;
        let mut written = 0;
        for (index, offset, take) in pieces {
            buf[written..written + take]
                .copy_from_slice(&self.regions[index].data[offset..offset + take]);
            written += take;
        }
        Ok(())
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<(), Fault> {
        let bytes = word_bytes(value).ok_or(Fault::NotWritable(addr))?;
        let pieces = self.covering(addr, bytes.len(), true).ok_or(Fault::NotWritable(addr))?;
        let mut copied = 0;
        for (index, offset, take) in pieces {
            self.regions[index].data[offset..offset + take]
                .copy_from_slice(&bytes[copied..copied + take]);
            copied += take;
        }
        self.writes.push(addr);
        Ok(())
    }
}
