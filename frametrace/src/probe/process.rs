//! Probing this process's own address space
//!
//! The kernel validates user pointers passed to system calls and reports
//! `EFAULT` instead of raising `SIGSEGV`. Routing every suspect access through
//! a system call therefore turns "this load would crash" into an ordinary
//! error return, with no signal handler and no non-local jump.
//!
//! Two strategies, picked once per context:
//!
//! - **VM syscalls** (`process_vm_readv` / `process_vm_writev` on our own
//!   pid). One call per access. Page protections are honoured, so a write
//!   into a code page fails.
//! - **Pipe**: `write(pipe, addr, n)` makes the kernel read from `addr`,
//!   `read(pipe, addr, n)` makes it write to `addr`. Used when the VM
//!   syscalls are filtered (seccomp) or missing. The pipe is drained after
//!   each probe so no bytes leak between probes.
//!
//! The pipe descriptors belong to the context and are closed when it drops,
//! whichever way the trace ended.

#![allow(unsafe_code)] // raw syscalls on caller-supplied addresses

use super::MemoryProbe;
use crate::domain::{Fault, ProbeSetupError, WORD_SIZE};
use log::{debug, warn};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// How a [`ProbeContext`] performs guarded accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    VmSyscalls,
    Pipe,
}

/// Private pipe used as a kernel-checked copy channel
#[derive(Debug)]
struct ProbePipe {
    read_end: OwnedFd,
    write_end: OwnedFd,
}

impl ProbePipe {
    fn create() -> std::io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: `fds` is a valid two-element array for pipe2 to fill
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
        if ret != 0 {
            return Err(std::io::Error::last_os_error());
        }
        // SAFETY: pipe2 succeeded, so both descriptors are open and owned by us
        let (read_end, write_end) =
            unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok(Self { read_end, write_end })
    }

    /// Kernel copies `addr..addr+len` into the pipe, then back out to `buf`
    fn read(&self, addr: usize, buf: &mut [u8]) -> bool {
        // SAFETY: the kernel validates the source range and fails with EFAULT
        // instead of touching unmapped memory
        let pushed = unsafe {
            libc::write(self.write_end.as_raw_fd(), addr as *const libc::c_void, buf.len())
        };
        if usize::try_from(pushed).ok() != Some(buf.len()) {
            self.drain();
            return false;
        }
        // SAFETY: `buf` is a valid writable slice of the requested length
        let pulled = unsafe {
            libc::read(self.read_end.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
        };
        if usize::try_from(pulled).ok() != Some(buf.len()) {
            self.drain();
            return false;
        }
        true
    }

    /// Push `bytes` into the pipe, then have the kernel deliver them to `addr`
    fn write(&self, addr: usize, bytes: &[u8]) -> bool {
        // SAFETY: `bytes` is a valid readable slice
        let pushed = unsafe {
            libc::write(self.write_end.as_raw_fd(), bytes.as_ptr().cast(), bytes.len())
        };
        if usize::try_from(pushed).ok() != Some(bytes.len()) {
            self.drain();
            return false;
        }
        // SAFETY: the kernel validates the destination range and fails with
        // EFAULT when it is unmapped or read-only
        let pulled = unsafe {
            libc::read(self.read_end.as_raw_fd(), addr as *mut libc::c_void, bytes.len())
        };
        if usize::try_from(pulled).ok() != Some(bytes.len()) {
            self.drain();
            return false;
        }
        true
    }

    fn drain(&self) {
        let mut scratch = [0u8; 256];
        loop {
            // SAFETY: `scratch` is a valid writable buffer
            let n = unsafe {
                libc::read(self.read_end.as_raw_fd(), scratch.as_mut_ptr().cast(), scratch.len())
            };
            if n <= 0 {
                break;
            }
        }
    }
}

/// Probe state for tracing the current process
///
/// One context serves one trace. Opening a fresh context per trace (as
/// [`crate::trace`] does) lets independent threads trace concurrently.
#[derive(Debug)]
pub struct ProbeContext {
    pid: libc::pid_t,
    pipe: Option<ProbePipe>,
    restore_after_write: bool,
}

impl ProbeContext {
    /// Open a context, preferring the VM syscalls and falling back to a pipe
    ///
    /// # Errors
    /// Returns an error if neither strategy works in this process
    pub fn open() -> Result<Self, ProbeSetupError> {
        let mut context = Self::with_strategy(ProbeStrategy::VmSyscalls)?;
        if context.self_test() {
            debug!("Probe context using process_vm_readv/writev");
            return Ok(context);
        }

        warn!("process_vm_readv unavailable, probing through a pipe");
        context = Self::with_strategy(ProbeStrategy::Pipe)?;
        if context.self_test() {
            Ok(context)
        } else {
            Err(ProbeSetupError::SelfTestFailed(
                "neither process_vm_readv nor the pipe fallback can read this process".to_string(),
            ))
        }
    }

    /// Open a context with a fixed strategy, without a self-test
    ///
    /// # Errors
    /// Returns an error if the pipe for `ProbeStrategy::Pipe` cannot be created
    pub fn with_strategy(strategy: ProbeStrategy) -> Result<Self, ProbeSetupError> {
        // SAFETY: getpid has no preconditions
        let pid = unsafe { libc::getpid() };
        let pipe = match strategy {
            ProbeStrategy::VmSyscalls => None,
            ProbeStrategy::Pipe => {
                Some(ProbePipe::create().map_err(ProbeSetupError::PipeCreationFailed)?)
            }
        };
        Ok(Self { pid, pipe, restore_after_write: true })
    }

    /// Keep the sentinel in place after a successful write probe
    ///
    /// By default the original word is put back after the probe.
    #[must_use]
    pub fn destructive_writes(mut self) -> Self {
        self.restore_after_write = false;
        self
    }

    #[must_use]
    pub fn strategy(&self) -> ProbeStrategy {
        if self.pipe.is_some() {
            ProbeStrategy::Pipe
        } else {
            ProbeStrategy::VmSyscalls
        }
    }

    fn self_test(&mut self) -> bool {
        let marker = std::hint::black_box(0x5eed_f00d_u64);
        let addr = std::ptr::addr_of!(marker) as u64;
        let mut bytes = [0u8; 8];
        self.read_bytes(addr, &mut bytes).is_ok() && u64::from_ne_bytes(bytes) == marker
    }

    fn vm_read(&self, addr: usize, buf: &mut [u8]) -> bool {
        let local = libc::iovec { iov_base: buf.as_mut_ptr().cast(), iov_len: buf.len() };
        let remote = libc::iovec { iov_base: addr as *mut libc::c_void, iov_len: buf.len() };
        // SAFETY: `local` describes a valid writable buffer; the kernel checks `remote`
        let copied = unsafe { libc::process_vm_readv(self.pid, &local, 1, &remote, 1, 0) };
        usize::try_from(copied).ok() == Some(buf.len())
    }

    fn vm_write(&self, addr: usize, bytes: &[u8]) -> bool {
        let local = libc::iovec { iov_base: bytes.as_ptr() as *mut libc::c_void, iov_len: bytes.len() };
        let remote = libc::iovec { iov_base: addr as *mut libc::c_void, iov_len: bytes.len() };
        // SAFETY: `local` describes a valid readable buffer; the kernel checks
        // `remote` against the page protections of the mapping
        let copied = unsafe { libc::process_vm_writev(self.pid, &local, 1, &remote, 1, 0) };
        usize::try_from(copied).ok() == Some(bytes.len())
    }

    fn raw_read(&self, addr: usize, buf: &mut [u8]) -> bool {
        match &self.pipe {
            Some(pipe) => pipe.read(addr, buf),
            None => self.vm_read(addr, buf),
        }
    }

    fn raw_write(&self, addr: usize, bytes: &[u8]) -> bool {
        match &self.pipe {
            Some(pipe) => pipe.write(addr, bytes),
            None => self.vm_write(addr, bytes),
        }
    }
}

impl MemoryProbe for ProbeContext {
    fn read_bytes(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Fault> {
        if buf.is_empty() {
            return Ok(());
        }
        let target = usize::try_from(addr).map_err(|_| Fault::Unreadable(addr))?;
        if self.raw_read(target, buf) {
            Ok(())
        } else {
            Err(Fault::Unreadable(addr))
        }
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<(), Fault> {
        let target = usize::try_from(addr).map_err(|_| Fault::NotWritable(addr))?;
        let word = usize::try_from(value).map_err(|_| Fault::NotWritable(addr))?;
        if self.raw_write(target, &word.to_ne_bytes()) {
            Ok(())
        } else {
            Err(Fault::NotWritable(addr))
        }
    }

    fn probe_write(&mut self, addr: u64) -> bool {
        let original = if self.restore_after_write { self.read_word(addr).ok() } else { None };
        if self.write_word(addr, frametrace_common::PROBE_SENTINEL).is_err() {
            return false;
        }
        if let Some(value) = original {
            if let Err(fault) = self.write_word(addr, value) {
                warn!("Failed to restore word at {addr:#x} after write probe: {fault}");
            }
        }
        true
    }
}
