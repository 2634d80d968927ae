//! Trap entry stub
//!
//! `mscratch` holds the Trusted stack pointer while Untrusted code runs.
//! The stub swaps it in, saves a [`TrapFrame`] on the Trusted stack, calls
//! `warden_trap_handler` and restores whatever the handler left in the
//! frame. The frame offsets below must match [`TrapFrame`].

use core::arch::global_asm;

use crate::arch::context::TrapFrame;

global_asm!(
    ".section .text.trap",
    ".balign 4",
    ".global warden_trap_entry",
    "warden_trap_entry:",
    "    csrrw sp, mscratch, sp",
    "    addi sp, sp, -{frame_size}",
    "    sw x1, 4(sp)",
    "    sw x3, 12(sp)",
    "    sw x4, 16(sp)",
    "    sw x5, 20(sp)",
    "    sw x6, 24(sp)",
    "    sw x7, 28(sp)",
    "    sw x8, 32(sp)",
    "    sw x9, 36(sp)",
    "    sw x10, 40(sp)",
    "    sw x11, 44(sp)",
    "    sw x12, 48(sp)",
    "    sw x13, 52(sp)",
    "    sw x14, 56(sp)",
    "    sw x15, 60(sp)",
    "    sw x16, 64(sp)",
    "    sw x17, 68(sp)",
    "    sw x18, 72(sp)",
    "    sw x19, 76(sp)",
    "    sw x20, 80(sp)",
    "    sw x21, 84(sp)",
    "    sw x22, 88(sp)",
    "    sw x23, 92(sp)",
    "    sw x24, 96(sp)",
    "    sw x25, 100(sp)",
    "    sw x26, 104(sp)",
    "    sw x27, 108(sp)",
    "    sw x28, 112(sp)",
    "    sw x29, 116(sp)",
    "    sw x30, 120(sp)",
    "    sw x31, 124(sp)",
    "    csrr t0, mscratch",
    "    sw t0, 8(sp)",
    "    csrr t0, mepc",
    "    sw t0, {mepc}(sp)",
    "    csrr t0, mcause",
    "    sw t0, {mcause}(sp)",
    "    csrr t0, mtval",
    "    sw t0, {mtval}(sp)",
    "    csrr t0, mstatus",
    "    sw t0, {mstatus}(sp)",
    "    mv a0, sp",
    "    call warden_trap_handler",
    "    lw t0, {mepc}(sp)",
    "    csrw mepc, t0",
    "    lw t0, {mstatus}(sp)",
    "    csrw mstatus, t0",
    "    lw t0, 8(sp)",
    "    csrw mscratch, t0",
    "    lw x1, 4(sp)",
    "    lw x3, 12(sp)",
    "    lw x4, 16(sp)",
    "    lw x5, 20(sp)",
    "    lw x6, 24(sp)",
    "    lw x7, 28(sp)",
    "    lw x8, 32(sp)",
    "    lw x9, 36(sp)",
    "    lw x10, 40(sp)",
    "    lw x11, 44(sp)",
    "    lw x12, 48(sp)",
    "    lw x13, 52(sp)",
    "    lw x14, 56(sp)",
    "    lw x15, 60(sp)",
    "    lw x16, 64(sp)",
    "    lw x17, 68(sp)",
    "    lw x18, 72(sp)",
    "    lw x19, 76(sp)",
    "    lw x20, 80(sp)",
    "    lw x21, 84(sp)",
    "    lw x22, 88(sp)",
    "    lw x23, 92(sp)",
    "    lw x24, 96(sp)",
    "    lw x25, 100(sp)",
    "    lw x26, 104(sp)",
    "    lw x27, 108(sp)",
    "    lw x28, 112(sp)",
    "    lw x29, 116(sp)",
    "    lw x30, 120(sp)",
    "    lw x31, 124(sp)",
    "    addi sp, sp, {frame_size}",
    "    csrrw sp, mscratch, sp",
    "    mret",
    frame_size = const core::mem::size_of::<TrapFrame>(),
    mepc = const TrapFrame::MEPC_OFFSET,
    mcause = const TrapFrame::MCAUSE_OFFSET,
    mtval = const TrapFrame::MTVAL_OFFSET,
    mstatus = const TrapFrame::MSTATUS_OFFSET,
);

extern "C" {
    fn warden_trap_entry();
}

/// Address to program into `mtvec`
pub fn entry_address() -> u32 {
    warden_trap_entry as usize as u32
}
