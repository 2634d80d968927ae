//! Software hart
//!
//! [`SimMachine`] is a [`ProtectionUnit`] backed by [`SimulatedPmp`] and a
//! sparse byte memory. It does not decode instructions; Untrusted code is
//! driven through the coarse operations below (fetch, load, store, ecall),
//! each of which is checked against the PMP before it has any effect and
//! raises the same trap the core would.
//!
//! Block loads and stores are modelled as one access: all bytes must fall
//! inside the governing entry. A denied store writes nothing.

mod hart;

pub use hart::Hart;

use alloc::collections::BTreeMap;

use warden_pmp::{configure, layout, AccessType, ConfigurationError, PrivilegeLevel, RegionDescriptor, SimulatedPmp};

use crate::arch::context::TrapFrame;
use crate::arch::{cause, mstatus, previous_privilege, ProtectionUnit};
use crate::syscall::{MemoryFault, UserMemory};
use crate::trap::FaultKind;

/// Where the simulated kernel's trap entry lives
pub const SIM_TRAP_VECTOR: u32 = layout::KERNEL_FLASH_BASE + 0x100;

/// Width of every simulated instruction
const INSN_LEN: u32 = 4;

/// Machine-mode CSRs the kernel touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Csrs {
    pub mstatus: u32,
    pub mepc: u32,
    pub mcause: u32,
    pub mtval: u32,
    pub mtvec: Option<u32>,
    pub mscratch: u32,
}

/// Simulated RV32 hart with PMP
#[derive(Debug, Clone)]
pub struct SimMachine {
    pmp: SimulatedPmp,
    memory: BTreeMap<u32, u8>,
    level: PrivilegeLevel,
    pc: u32,
    regs: [u32; 32],
    csrs: Csrs,
}

impl SimMachine {
    /// Hart out of reset: Trusted, PMP off, memory zero
    pub fn new() -> Self {
        let mut regs = [0; 32];
        regs[TrapFrame::SP] = layout::KERNEL_RAM_BASE + layout::KERNEL_RAM_SIZE;
        Self {
            pmp: SimulatedPmp::new(),
            memory: BTreeMap::new(),
            level: PrivilegeLevel::Trusted,
            pc: layout::KERNEL_FLASH_BASE,
            regs,
            csrs: Csrs {
                mstatus: mstatus::MPP_MACHINE,
                ..Csrs::default()
            },
        }
    }

    pub fn pmp(&self) -> &SimulatedPmp {
        &self.pmp
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn csrs(&self) -> &Csrs {
        &self.csrs
    }

    pub fn reg(&self, index: usize) -> u32 {
        self.regs[index]
    }

    pub fn set_reg(&mut self, index: usize, value: u32) {
        if index != 0 {
            self.regs[index] = value;
        }
    }

    /// Take a trap: save state into the CSRs and enter Trusted mode at the
    /// trap vector
    ///
    /// Returns the frame the entry stub would hand to the kernel.
    pub fn raise(&mut self, mcause: u32, mtval: u32) -> TrapFrame {
        let mpp = match self.level {
            PrivilegeLevel::Trusted => mstatus::MPP_MACHINE,
            PrivilegeLevel::Untrusted => mstatus::MPP_USER,
        };
        let mpie = if self.csrs.mstatus & mstatus::MIE != 0 { mstatus::MPIE } else { 0 };
        self.csrs.mstatus = (self.csrs.mstatus & !(mstatus::MPP_MASK | mstatus::MPIE | mstatus::MIE)) | mpp | mpie;
        self.csrs.mepc = self.pc;
        self.csrs.mcause = mcause;
        self.csrs.mtval = mtval;

        self.level = PrivilegeLevel::Trusted;
        self.pc = self.csrs.mtvec.unwrap_or(0);

        TrapFrame {
            regs: self.regs,
            mepc: self.csrs.mepc,
            mcause,
            mtval,
            mstatus: self.csrs.mstatus,
        }
    }

    /// Trap return with `frame` as the restored context
    pub fn mret(&mut self, frame: &TrapFrame) {
        self.regs = frame.regs;
        self.regs[0] = 0;
        self.csrs.mepc = frame.mepc;
        self.csrs.mstatus = frame.mstatus;
        self.return_from_trap();
    }

    fn return_from_trap(&mut self) {
        let status = self.csrs.mstatus;
        self.level = previous_privilege(status);
        self.pc = self.csrs.mepc;

        let mie = if status & mstatus::MPIE != 0 { mstatus::MIE } else { 0 };
        self.csrs.mstatus = (status & !(mstatus::MPP_MASK | mstatus::MIE)) | mie | mstatus::MPIE | mstatus::MPP_USER;
    }

    /// Asynchronous interrupt with `code`
    pub fn inject_interrupt(&mut self, code: u32) -> TrapFrame {
        self.raise(cause::INTERRUPT | code, 0)
    }

    fn fetch(&mut self) -> Result<(), TrapFrame> {
        if self.pmp.check(self.pc, INSN_LEN, AccessType::Execute, self.level) {
            Ok(())
        } else {
            let pc = self.pc;
            Err(self.raise(cause::INSTRUCTION_ACCESS_FAULT, pc))
        }
    }

    fn retire(&mut self) {
        self.pc = self.pc.wrapping_add(INSN_LEN);
    }

    /// Execute a load of `out.len()` bytes from `addr`
    ///
    /// # Errors
    /// The trap frame of a denied fetch or load. `out` is untouched.
    pub fn load(&mut self, addr: u32, out: &mut [u8]) -> Result<(), TrapFrame> {
        self.fetch()?;
        if !self.pmp.check(addr, out.len() as u32, AccessType::Read, self.level) {
            return Err(self.raise(cause::LOAD_ACCESS_FAULT, addr));
        }
        self.read_raw(addr, out);
        self.retire();
        Ok(())
    }

    /// Execute a store of `data` to `addr`
    ///
    /// # Errors
    /// The trap frame of a denied fetch or store. Memory is untouched.
    pub fn store(&mut self, addr: u32, data: &[u8]) -> Result<(), TrapFrame> {
        self.fetch()?;
        if !self.pmp.check(addr, data.len() as u32, AccessType::Write, self.level) {
            return Err(self.raise(cause::STORE_ACCESS_FAULT, addr));
        }
        self.write_raw(addr, data);
        self.retire();
        Ok(())
    }

    /// Execute `ecall` with `a0 = id`, `a1 = arg`
    ///
    /// Always traps; the frame is either the environment call or a fetch
    /// fault if the `ecall` itself could not be fetched.
    pub fn ecall(&mut self, id: u32, arg: u32) -> TrapFrame {
        if let Err(frame) = self.fetch() {
            return frame;
        }
        self.set_reg(TrapFrame::A0, id);
        self.set_reg(TrapFrame::A1, arg);
        let code = match self.level {
            PrivilegeLevel::Untrusted => cause::ECALL_FROM_USER,
            PrivilegeLevel::Trusted => cause::ECALL_FROM_MACHINE,
        };
        self.raise(code, 0)
    }

    /// Execute a taken jump to `target`
    ///
    /// # Errors
    /// Fetch fault on the jump instruction itself. A bad target faults on
    /// the next operation.
    pub fn jump(&mut self, target: u32) -> Result<(), TrapFrame> {
        self.fetch()?;
        self.pc = target;
        Ok(())
    }

    /// Load image or data without any protection check (board setup)
    pub fn poke(&mut self, addr: u32, data: &[u8]) {
        self.write_raw(addr, data);
    }

    /// Read memory without any protection check
    pub fn peek(&self, addr: u32, out: &mut [u8]) {
        self.read_raw(addr, out);
    }

    /// Zero `[base, base + len)`
    pub fn clear(&mut self, base: u32, len: u32) {
        let end = base as u64 + len as u64;
        let doomed: alloc::vec::Vec<u32> = self
            .memory
            .range(base..)
            .take_while(|(addr, _)| (**addr as u64) < end)
            .map(|(addr, _)| *addr)
            .collect();
        for addr in doomed {
            self.memory.remove(&addr);
        }
    }

    /// Addresses holding non-zero bytes
    pub fn populated(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.memory.iter().map(|(addr, byte)| (*addr, *byte))
    }

    fn read_raw(&self, addr: u32, out: &mut [u8]) {
        for (offset, byte) in out.iter_mut().enumerate() {
            *byte = self.memory.get(&addr.wrapping_add(offset as u32)).copied().unwrap_or(0);
        }
    }

    fn write_raw(&mut self, addr: u32, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            let at = addr.wrapping_add(offset as u32);
            if *byte == 0 {
                self.memory.remove(&at);
            } else {
                self.memory.insert(at, *byte);
            }
        }
    }
}

impl Default for SimMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtectionUnit for SimMachine {
    fn configure(&mut self, table: &[RegionDescriptor]) -> Result<(), ConfigurationError> {
        configure(&mut self.pmp, table)
    }

    fn current_level(&self) -> PrivilegeLevel {
        self.level
    }

    fn install_trap_vector(&mut self) {
        self.csrs.mtvec = Some(SIM_TRAP_VECTOR);
    }

    fn trap_vector(&self) -> Option<u32> {
        self.csrs.mtvec
    }

    fn enter_untrusted(&mut self, entry: u32) {
        self.csrs.mepc = entry;
        self.csrs.mstatus = (self.csrs.mstatus & !mstatus::MPP_MASK) | mstatus::MPP_USER | mstatus::MPIE;
        self.csrs.mscratch = self.regs[TrapFrame::SP];
        self.regs = [0; 32];
        self.return_from_trap();
    }
}

/// Gateway copies run with the sandbox's permissions (MPRV with MPP = U)
impl UserMemory for SimMachine {
    fn copy_from_user(&mut self, addr: u32, out: &mut [u8]) -> Result<(), MemoryFault> {
        if !self.pmp.check(addr, out.len() as u32, AccessType::Read, PrivilegeLevel::Untrusted) {
            return Err(MemoryFault {
                kind: FaultKind::Load,
                address: addr,
            });
        }
        self.read_raw(addr, out);
        Ok(())
    }

    fn copy_to_user(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryFault> {
        if !self.pmp.check(addr, data.len() as u32, AccessType::Write, PrivilegeLevel::Untrusted) {
            return Err(MemoryFault {
                kind: FaultKind::Store,
                address: addr,
            });
        }
        self.write_raw(addr, data);
        Ok(())
    }
}
