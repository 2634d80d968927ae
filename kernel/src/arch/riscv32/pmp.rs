//! PMP CSRs
//!
//! CSR numbers are encoded in the instruction, so each register index maps
//! to its own `csrr`/`csrw`.

use core::arch::asm;

use warden_pmp::{PmpRegisters, PMPCFG_REGISTERS, PMP_ENTRIES};

macro_rules! csr_read {
    ($csr:literal) => {{
        let val: u32;
        unsafe {
            asm!(concat!("csrr {}, ", $csr), out(reg) val);
        }
        val
    }};
}

macro_rules! csr_write {
    ($csr:literal, $val:expr) => {{
        unsafe {
            asm!(concat!("csrw ", $csr, ", {}"), in(reg) $val);
        }
    }};
}

/// The core's PMP register file
pub struct HardwarePmp {
    _private: (),
}

impl HardwarePmp {
    /// # Safety
    /// Only one instance may exist per hart, and only in M-mode.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PmpRegisters for HardwarePmp {
    fn read_cfg(&self, reg: usize) -> u32 {
        debug_assert!(reg < PMPCFG_REGISTERS);
        match reg {
            0 => csr_read!("pmpcfg0"),
            1 => csr_read!("pmpcfg1"),
            2 => csr_read!("pmpcfg2"),
            _ => csr_read!("pmpcfg3"),
        }
    }

    fn write_cfg(&mut self, reg: usize, value: u32) {
        match reg {
            0 => csr_write!("pmpcfg0", value),
            1 => csr_write!("pmpcfg1", value),
            2 => csr_write!("pmpcfg2", value),
            _ => csr_write!("pmpcfg3", value),
        }
    }

    fn read_addr(&self, index: usize) -> u32 {
        debug_assert!(index < PMP_ENTRIES);
        match index {
            0 => csr_read!("pmpaddr0"),
            1 => csr_read!("pmpaddr1"),
            2 => csr_read!("pmpaddr2"),
            3 => csr_read!("pmpaddr3"),
            4 => csr_read!("pmpaddr4"),
            5 => csr_read!("pmpaddr5"),
            6 => csr_read!("pmpaddr6"),
            7 => csr_read!("pmpaddr7"),
            8 => csr_read!("pmpaddr8"),
            9 => csr_read!("pmpaddr9"),
            10 => csr_read!("pmpaddr10"),
            11 => csr_read!("pmpaddr11"),
            12 => csr_read!("pmpaddr12"),
            13 => csr_read!("pmpaddr13"),
            14 => csr_read!("pmpaddr14"),
            _ => csr_read!("pmpaddr15"),
        }
    }

    fn write_addr(&mut self, index: usize, value: u32) {
        match index {
            0 => csr_write!("pmpaddr0", value),
            1 => csr_write!("pmpaddr1", value),
            2 => csr_write!("pmpaddr2", value),
            3 => csr_write!("pmpaddr3", value),
            4 => csr_write!("pmpaddr4", value),
            5 => csr_write!("pmpaddr5", value),
            6 => csr_write!("pmpaddr6", value),
            7 => csr_write!("pmpaddr7", value),
            8 => csr_write!("pmpaddr8", value),
            9 => csr_write!("pmpaddr9", value),
            10 => csr_write!("pmpaddr10", value),
            11 => csr_write!("pmpaddr11", value),
            12 => csr_write!("pmpaddr12", value),
            13 => csr_write!("pmpaddr13", value),
            14 => csr_write!("pmpaddr14", value),
            _ => csr_write!("pmpaddr15", value),
        }
    }
}
