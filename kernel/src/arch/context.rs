//! RV32 trap frame
//!
//! Register state saved by the trap entry stub. The layout is shared with
//! the assembly in `riscv32/trap.rs`: do not reorder fields without
//! updating the save/restore offsets there.
//!
//! Calling convention for syscalls: `a0` (x10) carries the operation id,
//! `a1` (x11) the argument pointer.

use static_assertions::const_assert_eq;

use super::cause;

/// CPU context captured at trap entry
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    /// x0..x31; `regs[2]` holds the interrupted stack pointer
    pub regs: [u32; 32],
    /// Address of the trapping instruction
    pub mepc: u32,
    pub mcause: u32,
    /// Faulting address for access faults
    pub mtval: u32,
    pub mstatus: u32,
}

const_assert_eq!(core::mem::size_of::<TrapFrame>(), 36 * 4);

impl TrapFrame {
    pub const A0: usize = 10;
    pub const A1: usize = 11;
    pub const SP: usize = 2;

    /// Offsets used by the entry stub
    pub const MEPC_OFFSET: usize = 32 * 4;
    pub const MCAUSE_OFFSET: usize = 33 * 4;
    pub const MTVAL_OFFSET: usize = 34 * 4;
    pub const MSTATUS_OFFSET: usize = 35 * 4;

    /// All registers zeroed
    pub const fn new() -> Self {
        Self {
            regs: [0; 32],
            mepc: 0,
            mcause: 0,
            mtval: 0,
            mstatus: 0,
        }
    }

    /// Frame for a trap with the given cause, as the entry stub would build it
    pub const fn with_cause(mcause: u32, mepc: u32, mtval: u32) -> Self {
        let mut frame = Self::new();
        frame.mcause = mcause;
        frame.mepc = mepc;
        frame.mtval = mtval;
        frame
    }

    /// Syscall operation id (`a0`)
    #[inline]
    pub fn syscall_number(&self) -> u32 {
        self.regs[Self::A0]
    }

    /// Syscall argument (`a1`)
    #[inline]
    pub fn syscall_arg(&self) -> u32 {
        self.regs[Self::A1]
    }

    /// Set syscall return value (`a0`)
    #[inline]
    pub fn set_return_value(&mut self, value: u32) {
        self.regs[Self::A0] = value;
    }

    #[inline]
    pub fn is_interrupt(&self) -> bool {
        self.mcause & cause::INTERRUPT != 0
    }

    /// Cause code with the interrupt bit stripped
    #[inline]
    pub fn exception_code(&self) -> u32 {
        self.mcause & !cause::INTERRUPT
    }

    /// Environment call from User mode
    #[inline]
    pub fn is_syscall(&self) -> bool {
        !self.is_interrupt() && self.exception_code() == cause::ECALL_FROM_USER
    }
}

impl Default for TrapFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syscall_registers() {
        let mut frame = TrapFrame::with_cause(cause::ECALL_FROM_USER, 0x1001_0040, 0);
        frame.regs[TrapFrame::A0] = 1;
        frame.regs[TrapFrame::A1] = 0x2008_2100;
        assert!(frame.is_syscall());
        assert_eq!(frame.syscall_number(), 1);
        assert_eq!(frame.syscall_arg(), 0x2008_2100);

        frame.set_return_value(0);
        assert_eq!(frame.syscall_number(), 0);
    }

    #[test]
    fn test_interrupt_is_never_a_syscall() {
        let frame = TrapFrame::with_cause(cause::INTERRUPT | cause::ECALL_FROM_USER, 0, 0);
        assert!(frame.is_interrupt());
        assert_eq!(frame.exception_code(), 8);
        assert!(!frame.is_syscall());
    }

    #[test]
    fn test_offsets_match_layout() {
        let frame = TrapFrame::new();
        let base = &frame as *const _ as usize;
        assert_eq!(&frame.mepc as *const _ as usize - base, TrapFrame::MEPC_OFFSET);
        assert_eq!(&frame.mstatus as *const _ as usize - base, TrapFrame::MSTATUS_OFFSET);
    }
}
