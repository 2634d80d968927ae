//! RV32 machine-mode CSR access

use core::arch::asm;

use bitflags::bitflags;

use crate::arch::mstatus;

bitflags! {
    /// `mstatus` bits the kernel reads or writes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        const MIE = mstatus::MIE;
        const MPIE = mstatus::MPIE;
        const MPP = mstatus::MPP_MASK;
        const MPRV = mstatus::MPRV;
    }
}

/// Machine Status
pub struct MSTATUS;
impl MSTATUS {
    #[inline(always)]
    pub fn read() -> u32 {
        let val: u32;
        unsafe {
            asm!("csrr {}, mstatus", out(reg) val);
        }
        val
    }

    #[inline(always)]
    pub fn write(val: u32) {
        unsafe {
            asm!("csrw mstatus, {}", in(reg) val);
        }
    }

    #[inline(always)]
    pub fn set(bits: Status) {
        unsafe {
            asm!("csrs mstatus, {}", in(reg) bits.bits());
        }
    }

    #[inline(always)]
    pub fn clear(bits: Status) {
        unsafe {
            asm!("csrc mstatus, {}", in(reg) bits.bits());
        }
    }
}

/// Machine Exception Program Counter
pub struct MEPC;
impl MEPC {
    #[inline(always)]
    pub fn read() -> u32 {
        let val: u32;
        unsafe {
            asm!("csrr {}, mepc", out(reg) val);
        }
        val
    }

    #[inline(always)]
    pub fn write(val: u32) {
        unsafe {
            asm!("csrw mepc, {}", in(reg) val);
        }
    }
}

/// Machine Trap-Vector Base Address (direct mode)
pub struct MTVEC;
impl MTVEC {
    #[inline(always)]
    pub fn read() -> u32 {
        let val: u32;
        unsafe {
            asm!("csrr {}, mtvec", out(reg) val);
        }
        val
    }

    #[inline(always)]
    pub fn write(val: u32) {
        unsafe {
            asm!("csrw mtvec, {}", in(reg) val & !0b11);
        }
    }
}

/// Machine Scratch: holds the Trusted stack pointer while Untrusted code runs
pub struct MSCRATCH;
impl MSCRATCH {
    #[inline(always)]
    pub fn write(val: u32) {
        unsafe {
            asm!("csrw mscratch, {}", in(reg) val);
        }
    }
}

/// Hart ID
#[inline(always)]
pub fn hart_id() -> u32 {
    let val: u32;
    unsafe {
        asm!("csrr {}, mhartid", out(reg) val);
    }
    val
}
