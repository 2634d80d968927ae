//! Architecture abstraction
//!
//! The kernel talks to the core through [`ProtectionUnit`]: program the
//! region table, report the current privilege, own the trap vector and
//! perform the one-way transfer into Untrusted code. Two backends exist:
//!
//! - `riscv32`: Hazard3 (RP2350) CSRs, built only for `target_arch = "riscv32"`
//! - [`crate::sim::SimMachine`]: a software hart used by tests and the host
//!   simulator

pub mod context;

#[cfg(target_arch = "riscv32")]
pub mod riscv32;

pub use warden_pmp::{AccessType, PrivilegeLevel};

use warden_pmp::{ConfigurationError, RegionDescriptor};

/// `mcause` values
pub mod cause {
    /// Set in `mcause` for interrupts
    pub const INTERRUPT: u32 = 1 << 31;

    pub const INSTRUCTION_ACCESS_FAULT: u32 = 1;
    pub const ILLEGAL_INSTRUCTION: u32 = 2;
    pub const BREAKPOINT: u32 = 3;
    pub const LOAD_ACCESS_FAULT: u32 = 5;
    pub const STORE_ACCESS_FAULT: u32 = 7;
    pub const ECALL_FROM_USER: u32 = 8;
    pub const ECALL_FROM_MACHINE: u32 = 11;

    pub const MACHINE_SOFTWARE_INTERRUPT: u32 = INTERRUPT | 3;
    pub const MACHINE_TIMER_INTERRUPT: u32 = INTERRUPT | 7;
    pub const MACHINE_EXTERNAL_INTERRUPT: u32 = INTERRUPT | 11;
}

/// `mstatus` fields
pub mod mstatus {
    pub const MIE: u32 = 1 << 3;
    pub const MPIE: u32 = 1 << 7;
    pub const MPP_SHIFT: u32 = 11;
    pub const MPP_MASK: u32 = 0b11 << MPP_SHIFT;
    pub const MPP_MACHINE: u32 = 0b11 << MPP_SHIFT;
    pub const MPP_USER: u32 = 0;
    pub const MPRV: u32 = 1 << 17;
}

/// Privilege encoded in the `MPP` field of `status`
pub const fn previous_privilege(status: u32) -> PrivilegeLevel {
    if status & mstatus::MPP_MASK == mstatus::MPP_USER {
        PrivilegeLevel::Untrusted
    } else {
        PrivilegeLevel::Trusted
    }
}

/// Capability interface to the core's protection hardware
pub trait ProtectionUnit {
    /// Program `table` into the PMP
    ///
    /// # Errors
    /// Any [`ConfigurationError`]; boot must not continue.
    fn configure(&mut self, table: &[RegionDescriptor]) -> Result<(), ConfigurationError>;

    /// Privilege the core is executing at
    fn current_level(&self) -> PrivilegeLevel;

    /// Point the trap vector at the kernel's trap entry
    fn install_trap_vector(&mut self);

    /// Installed trap vector, if any
    fn trap_vector(&self) -> Option<u32>;

    /// Raw privilege drop: resume at `entry` in Untrusted mode with the
    /// Trusted stack parked in the recovery slot
    ///
    /// On hardware this never returns. Callers go through
    /// [`crate::privilege::TransitionManager`], which enforces the
    /// preconditions.
    fn enter_untrusted(&mut self, entry: u32);
}
