//! PMP register file abstraction
//!
//! [`PmpRegisters`] is the seam between the configurator and whatever holds
//! the `pmpcfg`/`pmpaddr` CSRs. On silicon the kernel implements it with
//! `csrr`/`csrw`; on the host [`SimulatedPmp`] models the register file,
//! including the write-ignore behaviour of locked entries, and evaluates
//! accesses exactly as the matching logic would.

use core::fmt;

use crate::encode::{decode_range, CfgOctet};
use crate::region::{AddressMode, Permissions, PhysAddr};

/// PMP entries on the target core
pub const PMP_ENTRIES: usize = 16;

/// `pmpcfg` CSRs on RV32 (four octets each)
pub const PMPCFG_REGISTERS: usize = PMP_ENTRIES / 4;

/// Privilege of the hart issuing an access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegeLevel {
    /// Machine mode
    Trusted,
    /// User mode
    Untrusted,
}

/// Kind of memory access being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Read,
    Write,
    Execute,
}

impl AccessType {
    /// Permission bit required for this access
    pub const fn permission(self) -> Permissions {
        match self {
            Self::Read => Permissions::READ,
            Self::Write => Permissions::WRITE,
            Self::Execute => Permissions::EXECUTE,
        }
    }
}

/// Raw access to the PMP CSRs
pub trait PmpRegisters {
    /// Number of implemented entries
    fn entry_count(&self) -> usize {
        PMP_ENTRIES
    }

    /// Read `pmpcfg{reg}`
    fn read_cfg(&self, reg: usize) -> u32;

    /// Write `pmpcfg{reg}`
    ///
    /// Octets belonging to locked entries keep their value.
    fn write_cfg(&mut self, reg: usize, value: u32);

    /// Read `pmpaddr{index}`
    fn read_addr(&self, index: usize) -> u32;

    /// Write `pmpaddr{index}`
    ///
    /// Ignored when the entry is locked, or when the entry above it is a
    /// locked TOR entry.
    fn write_addr(&mut self, index: usize, value: u32);

    /// Read the configuration octet of entry `index`
    fn read_octet(&self, index: usize) -> u8 {
        (self.read_cfg(index / 4) >> ((index % 4) * 8)) as u8
    }

    /// Read-modify-write the configuration octet of entry `index`
    fn write_octet(&mut self, index: usize, octet: u8) {
        let shift = (index % 4) * 8;
        let current = self.read_cfg(index / 4);
        let value = (current & !(0xFF << shift)) | ((octet as u32) << shift);
        self.write_cfg(index / 4, value);
    }
}

/// Host model of the PMP register file and matching logic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedPmp {
    cfg: [u32; PMPCFG_REGISTERS],
    addr: [u32; PMP_ENTRIES],
}

impl SimulatedPmp {
    /// Register file in its reset state (all entries off, nothing locked)
    pub const fn new() -> Self {
        Self {
            cfg: [0; PMPCFG_REGISTERS],
            addr: [0; PMP_ENTRIES],
        }
    }

    /// Copy of another register file, used to evaluate accesses against
    /// live CSRs without re-implementing the matching logic
    pub fn snapshot<R: PmpRegisters>(regs: &R) -> Self {
        let mut pmp = Self::new();
        let entries = regs.entry_count().min(PMP_ENTRIES);
        for reg in 0..PMPCFG_REGISTERS.min(entries.div_ceil(4)) {
            pmp.cfg[reg] = regs.read_cfg(reg);
        }
        for index in 0..entries {
            pmp.addr[index] = regs.read_addr(index);
        }
        pmp
    }

    /// Device reset: the only way to clear locked entries
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Decoded configuration of entry `index`
    pub fn octet(&self, index: usize) -> CfgOctet {
        CfgOctet::from_bits(self.read_octet(index))
    }

    /// Byte range matched by entry `index`
    pub fn entry_range(&self, index: usize) -> Option<(u64, u64)> {
        let previous = if index == 0 { 0 } else { self.addr[index - 1] };
        decode_range(self.octet(index).mode, self.addr[index], previous)
    }

    /// Lowest-index entry matching any byte of `[address, address + len)`
    pub fn matching_entry(&self, address: PhysAddr, len: u32) -> Option<usize> {
        let start = address as u64;
        let end = start + len.max(1) as u64;
        (0..PMP_ENTRIES).find(|&index| match self.entry_range(index) {
            Some((lo, hi)) => start < hi && end > lo,
            None => false,
        })
    }

    /// Whether an access of `len` bytes at `address` is permitted
    ///
    /// The lowest-index entry overlapping the access decides it and must
    /// cover every byte. Untrusted accesses that match nothing are denied;
    /// Trusted accesses are only bound by locked entries.
    pub fn check(&self, address: PhysAddr, len: u32, access: AccessType, level: PrivilegeLevel) -> bool {
        let Some(index) = self.matching_entry(address, len) else {
            return level == PrivilegeLevel::Trusted;
        };

        let octet = self.octet(index);
        if level == PrivilegeLevel::Trusted && !octet.locked {
            return true;
        }

        let (lo, hi) = match self.entry_range(index) {
            Some(range) => range,
            None => return false,
        };
        let start = address as u64;
        let covered = start >= lo && start + len.max(1) as u64 <= hi;
        covered && octet.permissions.contains(access.permission())
    }

    /// Single-byte [`check`](Self::check)
    pub fn decide(&self, address: PhysAddr, access: AccessType, level: PrivilegeLevel) -> bool {
        self.check(address, 1, access, level)
    }

    fn entry_locked(&self, index: usize) -> bool {
        self.octet(index).locked
    }
}

impl PmpRegisters for SimulatedPmp {
    fn read_cfg(&self, reg: usize) -> u32 {
        self.cfg[reg]
    }

    fn write_cfg(&mut self, reg: usize, value: u32) {
        let mut merged = 0u32;
        for lane in 0..4 {
            let shift = lane * 8;
            let source = if self.entry_locked(reg * 4 + lane) { self.cfg[reg] } else { value };
            merged |= source & (0xFF << shift);
        }
        self.cfg[reg] = merged;
    }

    fn read_addr(&self, index: usize) -> u32 {
        self.addr[index]
    }

    fn write_addr(&mut self, index: usize, value: u32) {
        if self.entry_locked(index) {
            return;
        }
        if index + 1 < PMP_ENTRIES {
            let above = self.octet(index + 1);
            if above.locked && above.mode == AddressMode::TopOfRange {
                return;
            }
        }
        self.addr[index] = value;
    }
}

/// Register dump in the style of a boot log
pub struct PmpDump<'a, R: PmpRegisters>(pub &'a R);

impl<R: PmpRegisters> fmt::Display for PmpDump<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs = self.0;
        for index in 0..regs.entry_count() {
            let octet = CfgOctet::from_bits(regs.read_octet(index));
            if octet.mode == AddressMode::Disabled {
                continue;
            }
            let pmpaddr = regs.read_addr(index);
            let previous = if index == 0 { 0 } else { regs.read_addr(index - 1) };
            let flag = |set: bool, c: char| if set { c } else { '-' };
            write!(
                f,
                "[{:02}] pmpaddr={:#010x} cfg={:#04x} {:<5} {}{}{}{}",
                index,
                pmpaddr,
                octet.bits(),
                octet.mode.mnemonic(),
                flag(octet.permissions.contains(Permissions::READ), 'r'),
                flag(octet.permissions.contains(Permissions::WRITE), 'w'),
                flag(octet.permissions.contains(Permissions::EXECUTE), 'x'),
                flag(octet.locked, 'l'),
            )?;
            if let Some((start, end)) = decode_range(octet.mode, pmpaddr, previous) {
                write!(f, " {:#010x}-{:#010x}", start, end)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
