//! Hazard3 (RP2350) backend
//!
//! M-mode is Trusted, U-mode is Untrusted. The privilege drop is an `mret`
//! with `MPP = U`; the Trusted stack pointer is parked in `mscratch` so the
//! trap stub can find it again.

pub mod pmp;
pub mod registers;
pub mod trap;

use core::arch::asm;

use warden_pmp::{configure, ConfigurationError, PrivilegeLevel, RegionDescriptor};

use self::pmp::HardwarePmp;
use self::registers::{Status, MEPC, MSTATUS, MTVEC};
use super::ProtectionUnit;

/// The executing hart
pub struct Hazard3 {
    pmp: HardwarePmp,
    level: PrivilegeLevel,
    vector: Option<u32>,
}

impl Hazard3 {
    /// # Safety
    /// Call once per hart, from M-mode, before any other PMP access.
    pub unsafe fn take() -> Self {
        Self {
            pmp: HardwarePmp::new(),
            level: PrivilegeLevel::Trusted,
            vector: None,
        }
    }

    pub fn pmp(&self) -> &HardwarePmp {
        &self.pmp
    }
}

impl ProtectionUnit for Hazard3 {
    fn configure(&mut self, table: &[RegionDescriptor]) -> Result<(), ConfigurationError> {
        configure(&mut self.pmp, table)?;
        // Later accesses must observe the new configuration
        unsafe {
            asm!("fence", "fence.i");
        }
        Ok(())
    }

    fn current_level(&self) -> PrivilegeLevel {
        self.level
    }

    fn install_trap_vector(&mut self) {
        let address = trap::entry_address();
        MTVEC::write(address);
        self.vector = Some(MTVEC::read());
    }

    fn trap_vector(&self) -> Option<u32> {
        self.vector
    }

    fn enter_untrusted(&mut self, entry: u32) {
        self.level = PrivilegeLevel::Untrusted;
        MEPC::write(entry);
        MSTATUS::clear(Status::MPP | Status::MPRV);
        MSTATUS::set(Status::MPIE);

        // Park the Trusted stack and start on the sandbox stack
        unsafe {
            asm!(
                "csrw mscratch, sp",
                "la sp, __sandbox_stack_top",
                "mret",
                options(noreturn)
            );
        }
    }
}
