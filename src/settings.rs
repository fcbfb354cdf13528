//! Injected configuration record.
//!
//! The reference implementation this crate is modelled on consults a
//! module-level mutable `settings` dict from everywhere. Here that becomes a
//! plain, immutable-once-built `Settings` struct the driver constructs and
//! hands (by reference) to the memory, interpreter and debugger.

use std::collections::HashSet;

use serde_derive::{Deserialize, Serialize};

/// Upper bound of the data/heap/stack region.
pub const DATA_MAX: u32 = 0x8000_0000;
/// Lower bound of the data/heap/stack region.
pub const DATA_MIN: u32 = 0x1001_0000;
/// Where the heap pointer starts, growing upward via `sbrk`.
pub const HEAP_START: u32 = 0x1004_0000;
/// Base of the MMIO window.
pub const MMIO_BASE: u32 = 0xFFFF_0000;
/// Default entry point of the text segment.
pub const INITIAL_PC: u32 = 0x0040_0000;
/// Default initial stack pointer.
pub const INITIAL_SP: u32 = 0x7FFF_EFFC;
/// Default initial global pointer.
pub const INITIAL_GP: u32 = 0x1000_8000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub data_min: u32,
    pub data_max: u32,
    pub mmio_base: u32,

    pub initial_pc: u32,
    pub initial_sp: u32,
    pub initial_gp: u32,
    pub initial_fp: u32,
    pub initial_ra: u32,
    pub initial_hi: u32,
    pub initial_lo: u32,

    /// Hard ceiling on executed instructions before `InstrCountExceed`.
    pub max_instructions: u64,
    /// Randomize uninitialized general-purpose registers instead of zeroing them.
    pub garbage_registers: bool,
    /// Randomize freshly-touched memory bytes instead of zeroing them.
    pub garbage_memory: bool,
    /// Emit warnings on reads of uninitialized registers/memory.
    pub warnings: bool,
    /// Start the interpreter suspended at the first instruction.
    pub debug: bool,
    /// Print the instruction count once execution finishes.
    pub disp_instr_count: bool,

    pub enabled_syscalls: HashSet<i32>,
}

impl Default for Settings {
    fn default() -> Settings {
        let enabled_syscalls = [
            1, 4, 5, 6, 8, 9, 10, 11, 13, 14, 15, 16, 17, 30, 31, 32, 34, 35, 36, 40, 41,
        ]
        .iter()
        .cloned()
        .collect();

        Settings {
            data_min: DATA_MIN,
            data_max: DATA_MAX,
            mmio_base: MMIO_BASE,

            initial_pc: INITIAL_PC,
            initial_sp: INITIAL_SP,
            initial_gp: INITIAL_GP,
            initial_fp: 0,
            initial_ra: 0,
            initial_hi: 0,
            initial_lo: 0,

            max_instructions: 1_000_000,
            garbage_registers: false,
            garbage_memory: false,
            warnings: false,
            debug: false,
            disp_instr_count: false,

            enabled_syscalls,
        }
    }
}

impl Settings {
    pub fn new() -> Settings {
        Settings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_memory_map() {
        let s = Settings::new();
        assert_eq!(s.initial_pc, 0x0040_0000);
        assert_eq!(s.data_min, 0x1001_0000);
        assert_eq!(s.data_max, 0x8000_0000);
        assert_eq!(s.initial_sp, 0x7FFF_EFFC);
        assert!(s.enabled_syscalls.contains(&41));
        assert!(!s.enabled_syscalls.contains(&99));
    }
}
