//! Architecture primitives for frame-pointer walking
//!
//! With frame pointers enabled, every function prologue pushes the caller's
//! frame pointer and points the frame-pointer register at it. The return
//! address sits one word above:
//!
//! ```text
//!  higher addresses
//!  ┌──────────────────┐
//!  │ arguments ...    │  fp + 2 words (stack-passed arguments, x86)
//!  │ return address   │  fp + 1 word
//!  │ saved fp ────────┼──▶ caller's frame
//!  └──────────────────┘  ◀── fp
//!  lower addresses
//! ```
//!
//! x86, `x86_64` and aarch64 (`x29`/`x30` pair) all share this layout.

#![allow(unsafe_code)] // inline asm to read the frame-pointer register

use crate::domain::WORD_SIZE;

/// Word offsets of the two links stored in every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Offset of the caller's saved frame pointer from the base pointer
    pub saved_fp_offset: i64,
    /// Offset of the return address from the base pointer
    pub return_address_offset: i64,
}

impl FrameLayout {
    /// Layout of the "push old frame pointer" convention on this target
    #[must_use]
    pub const fn native() -> Self {
        Self { saved_fp_offset: 0, return_address_offset: WORD_SIZE as i64 }
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::native()
    }
}

/// Read the frame-pointer register of the calling function
///
/// Always inlined so the value is the caller's own base pointer. Returns 0
/// on targets without a known frame-pointer register, which makes any walk
/// end immediately.
#[inline(always)]
#[must_use]
pub fn current_frame_pointer() -> u64 {
    let fp: usize;

    #[cfg(target_arch = "x86_64")]
    // SAFETY: copies a register, touches no memory
    unsafe {
        core::arch::asm!("mov {}, rbp", out(reg) fp, options(nomem, nostack, preserves_flags));
    }

    #[cfg(target_arch = "x86")]
    // SAFETY: copies a register, touches no memory
    unsafe {
        core::arch::asm!("mov {}, ebp", out(reg) fp, options(nomem, nostack, preserves_flags));
    }

    #[cfg(target_arch = "aarch64")]
    // SAFETY: copies a register, touches no memory
    unsafe {
        core::arch::asm!("mov {}, x29", out(reg) fp, options(nomem, nostack, preserves_flags));
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
    {
        fp = 0;
    }

    fp as u64
}
