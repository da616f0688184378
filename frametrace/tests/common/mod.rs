//! Fake stacks over a simulated address space

#![allow(dead_code)]

use frametrace::domain::{FunctionDescriptor, WORD_SIZE};
use frametrace::probe::SyntheticMemory;
use frametrace::{FunctionTable, TraceConfig, TraceReport, Tracer};

pub const W: u64 = WORD_SIZE as u64;
pub const STACK_BASE: u64 = 0x7ffd_0000;
pub const STACK_SIZE: u64 = 0x4000;
pub const DATA_BASE: u64 = 0x5555_0000;
pub const DATA_SIZE: u64 = 0x4000;
pub const CODE_BASE: u64 = 0x40_0000;
pub const CODE_SIZE: u64 = 0x1_0000;
/// Distance between consecutive frames
pub const FRAME_STRIDE: u64 = 0x100;
/// Return address of an outermost frame, into startup code below every function
pub const ENTRY_RETURN: u64 = CODE_BASE + 0x10;

/// Builds a chain of frames in writable stack memory
///
/// Frame `i` lives at `STACK_BASE + (i + 1) * FRAME_STRIDE`. Its saved frame
/// pointer links to frame `i + 1`; the outermost frame's saved pointer is
/// chosen by the test.
pub struct FakeStack {
    pub memory: SyntheticMemory,
    next_string: u64,
}

impl FakeStack {
    pub fn new() -> Self {
        let mut memory = SyntheticMemory::new();
        memory.map(STACK_BASE, STACK_SIZE, true).unwrap();
        memory.map(DATA_BASE, DATA_SIZE, false).unwrap();
        memory.map(CODE_BASE, CODE_SIZE, false).unwrap();
        Self { memory, next_string: DATA_BASE }
    }

    pub fn bp(index: usize) -> u64 {
        STACK_BASE + (index as u64 + 1) * FRAME_STRIDE
    }

    /// Link frames `0..=outermost` with the given return addresses, the
    /// outermost frame saving `root_saved_fp`
    pub fn chain(&mut self, return_addresses: &[u64], root_saved_fp: u64) -> u64 {
        let count = return_addresses.len();
        for (index, ret) in return_addresses.iter().enumerate() {
            let bp = Self::bp(index);
            let previous = if index + 1 == count { root_saved_fp } else { Self::bp(index + 1) };
            self.memory.poke_word(bp, previous).unwrap();
            self.memory.poke_word(bp + W, *ret).unwrap();
        }
        Self::bp(0)
    }

    /// Place a C string in read-only data and return its address
    pub fn string(&mut self, text: &str) -> u64 {
        let at = self.next_string;
        self.memory.poke_c_str(at, text).unwrap();
        self.next_string += (text.len() as u64 + 1 + 15) & !15;
        at
    }

    /// Place a NULL-terminated `char *` array and return its address
    pub fn string_array(&mut self, entries: &[&str]) -> u64 {
        let pointers: Vec<u64> = entries.iter().map(|e| self.string(e)).collect();
        let at = self.next_string;
        for (i, pointer) in pointers.iter().chain(std::iter::once(&0)).enumerate() {
            self.memory.poke_word(at + i as u64 * W, *pointer).unwrap();
        }
        self.next_string += (pointers.len() as u64 + 1) * W;
        at
    }

    pub fn poke_word(&mut self, at: u64, value: u64) {
        self.memory.poke_word(at, value).unwrap();
    }

    pub fn poke_bytes(&mut self, at: u64, bytes: &[u8]) {
        self.memory.poke_bytes(at, bytes).unwrap();
    }

    pub fn run(&mut self, table: &FunctionTable, initial_bp: u64) -> (TraceReport, String) {
        self.run_with(table, &TraceConfig::default(), initial_bp)
    }

    pub fn run_with(&mut self, table: &FunctionTable, config: &TraceConfig, initial_bp: u64) -> (TraceReport, String) {
        let mut out = Vec::new();
        let report = Tracer::new(table, config).run(&mut self.memory, initial_bp, &mut out);
        (report, String::from_utf8(out).unwrap())
    }
}

/// Functions `f0, f1, ...` starting 0x1000 apart in the code region
pub fn numbered_table(count: usize) -> FunctionTable {
    FunctionTable::new((0..count).map(|i| FunctionDescriptor::new(format!("f{i}"), function_start(i))).collect())
        .unwrap()
}

pub fn function_start(index: usize) -> u64 {
    CODE_BASE + index as u64 * 0x1000
}

/// A plausible return address inside function `index`
pub fn return_into(index: usize) -> u64 {
    function_start(index) + 0x42
}
