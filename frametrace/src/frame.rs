//! Typed access to one stack frame
//!
//! All base-pointer arithmetic goes through [`FrameCursor`], so an argument
//! offset that would wrap the address space becomes a [`Fault`] rather than
//! a wild read.

use crate::domain::Fault;
use crate::probe::MemoryProbe;

/// A frame anchored at its base pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    base: u64,
}

impl FrameCursor {
    #[must_use]
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Absolute address of `base + offset`
    ///
    /// # Errors
    /// Returns `Fault::OffsetOverflow` if the sum leaves the address space
    pub fn slot(&self, offset: i64) -> Result<u64, Fault> {
        self.base
            .checked_add_signed(offset)
            .ok_or(Fault::OffsetOverflow { base: self.base, offset })
    }

    /// # Errors
    /// Returns a fault if the slot is out of range or unreadable
    pub fn read_word_at<P: MemoryProbe + ?Sized>(&self, probe: &mut P, offset: i64) -> Result<u64, Fault> {
        probe.read_word(self.slot(offset)?)
    }

    /// # Errors
    /// Returns a fault if the slot is out of range or unreadable
    pub fn read_u8_at<P: MemoryProbe + ?Sized>(&self, probe: &mut P, offset: i64) -> Result<u8, Fault> {
        probe.read_u8(self.slot(offset)?)
    }

    /// # Errors
    /// Returns a fault if the slot is out of range or unreadable
    pub fn read_i32_at<P: MemoryProbe + ?Sized>(&self, probe: &mut P, offset: i64) -> Result<i32, Fault> {
        probe.read_i32(self.slot(offset)?)
    }

    /// # Errors
    /// Returns a fault if the slot is out of range or unreadable
    pub fn read_f32_at<P: MemoryProbe + ?Sized>(&self, probe: &mut P, offset: i64) -> Result<f32, Fault> {
        probe.read_f32(self.slot(offset)?)
    }

    /// # Errors
    /// Returns a fault if the slot is out of range or unreadable
    pub fn read_f64_at<P: MemoryProbe + ?Sized>(&self, probe: &mut P, offset: i64) -> Result<f64, Fault> {
        probe.read_f64(self.slot(offset)?)
    }
}
