//! # Fault-Tolerant Memory Probing
//!
//! The tracer reads memory it has no reason to trust: saved frame pointers
//! that may be garbage, argument pointers into unmapped pages, strings with
//! no terminator. Every one of those reads goes through a [`MemoryProbe`],
//! which performs the real access but reports a [`Fault`] instead of letting
//! the access kill the process.
//!
//! ## Implementations
//!
//! - [`ProbeContext`]: the live address space of this process. Reads and
//!   writes go through `process_vm_readv`/`process_vm_writev` (or a private
//!   pipe when those are unavailable); the kernel answers `EFAULT` for bad
//!   addresses, so no signal handler is ever installed.
//! - [`SyntheticMemory`]: a simulated address space built from regions with
//!   read/write permissions. Replays recorded snapshots and drives tests.
//!
//! ## One Probe at a Time
//!
//! Every probing method takes `&mut self`. A probe that is in flight holds
//! the only mutable borrow of its context, so nested probing inside one
//! context cannot be expressed. Concurrent tracers each own a context.
//!
//! ## Write Probes
//!
//! [`MemoryProbe::probe_write`] stores [`PROBE_SENTINEL`] at the address.
//! The walker uses it only on a suspect saved frame pointer to tell stack
//! memory (writable) from code or read-only data (not writable), and never
//! on argument data.

pub mod process;
pub mod synthetic;

pub use process::{ProbeContext, ProbeStrategy};
pub use synthetic::SyntheticMemory;

use crate::domain::{Fault, WORD_SIZE};
use frametrace_common::PROBE_SENTINEL;

/// Reads are split at page boundaries so a string ending just before an
/// unmapped page is still readable
pub const PAGE_SIZE: u64 = 4096;

/// Guarded access to an address space
pub trait MemoryProbe {
    /// Copy `buf.len()` bytes starting at `addr`
    ///
    /// # Errors
    /// Returns `Fault::Unreadable` if any byte of the range is not readable
    fn read_bytes(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Fault>;

    /// Store one machine word at `addr`
    ///
    /// # Errors
    /// Returns `Fault::NotWritable` if the word cannot be written
    fn write_word(&mut self, addr: u64, value: u64) -> Result<(), Fault>;

    /// Returns true if one machine word at `addr` can be read
    fn probe_read(&mut self, addr: u64) -> bool {
        self.read_word(addr).is_ok()
    }

    /// Returns true if one machine word at `addr` can be written
    ///
    /// Destructive: on success the word holds [`PROBE_SENTINEL`].
    fn probe_write(&mut self, addr: u64) -> bool {
        self.write_word(addr, PROBE_SENTINEL).is_ok()
    }

    /// Read one machine word (pointer-sized, native endian)
    ///
    /// # Errors
    /// Returns `Fault::Unreadable` if the word is not readable
    fn read_word(&mut self, addr: u64) -> Result<u64, Fault> {
        let mut bytes = [0u8; WORD_SIZE];
        self.read_bytes(addr, &mut bytes)?;
        Ok(usize::from_ne_bytes(bytes) as u64)
    }

    /// # Errors
    /// Returns `Fault::Unreadable` if the byte is not readable
    fn read_u8(&mut self, addr: u64) -> Result<u8, Fault> {
        let mut bytes = [0u8; 1];
        self.read_bytes(addr, &mut bytes)?;
        Ok(bytes[0])
    }

    /// # Errors
    /// Returns `Fault::Unreadable` if the value is not readable
    fn read_i32(&mut self, addr: u64) -> Result<i32, Fault> {
        let mut bytes = [0u8; 4];
        self.read_bytes(addr, &mut bytes)?;
        Ok(i32::from_ne_bytes(bytes))
    }

    /// # Errors
    /// Returns `Fault::Unreadable` if the value is not readable
    fn read_f32(&mut self, addr: u64) -> Result<f32, Fault> {
        let mut bytes = [0u8; 4];
        self.read_bytes(addr, &mut bytes)?;
        Ok(f32::from_ne_bytes(bytes))
    }

    /// # Errors
    /// Returns `Fault::Unreadable` if the value is not readable
    fn read_f64(&mut self, addr: u64) -> Result<f64, Fault> {
        let mut bytes = [0u8; 8];
        self.read_bytes(addr, &mut bytes)?;
        Ok(f64::from_ne_bytes(bytes))
    }

    /// Read a NUL-terminated byte string of at most `limit` bytes
    ///
    /// Reads page by page, so only the pages the string actually touches
    /// need to be mapped.
    ///
    /// # Errors
    /// Returns `Fault::Unreadable` if any page up to the terminator (or the
    /// limit) is not readable
    fn read_c_string(&mut self, addr: u64, limit: usize) -> Result<CStringScan, Fault> {
        let mut bytes = Vec::new();
        let mut cursor = addr;

        while bytes.len() < limit {
            let to_page_end = PAGE_SIZE - (cursor % PAGE_SIZE);
            let remaining = (limit - bytes.len()) as u64;
            let chunk_len = usize::try_from(to_page_end.min(remaining)).unwrap_or(1);

            let mut chunk = vec![0u8; chunk_len];
            self.read_bytes(cursor, &mut chunk)?;

            if let Some(nul) = chunk.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                return Ok(CStringScan { bytes, terminated: true });
            }
            bytes.extend_from_slice(&chunk);
            cursor = cursor.checked_add(chunk_len as u64).ok_or(Fault::Unreadable(cursor))?;
        }

        Ok(CStringScan { bytes, terminated: false })
    }
}

/// Result of scanning a C string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CStringScan {
    /// Bytes before the terminator (or up to the scan limit)
    pub bytes: Vec<u8>,
    /// False if the scan limit was reached before a NUL
    pub terminated: bool,
}
