//! Boot sequence and the trusted/untrusted boundary
//!
//! Boot runs once on each core, in Trusted mode:
//! 1. Program the region table into the protection unit
//! 2. Install the trap vector
//! 3. Move the device key into the syscall gateway
//! 4. Drop privilege into the sandbox (sandbox core only)
//!
//! Any failure before step 4 is fatal: the sandbox never starts on a core
//! whose protection state is unknown.

#[cfg(target_arch = "riscv32")]
pub mod hardware;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use warden_admission::DiagnosticLine;
use warden_ipc::SharedMailbox;
use warden_pmp::RegionDescriptor;

use crate::arch::context::TrapFrame;
use crate::arch::ProtectionUnit;
use crate::config::KernelConfig;
use crate::error::Result;
use crate::privilege::TransitionManager;
use crate::syscall::{BlockCipher, DeviceKey, Gateway, UserMemory};
use crate::trap::{Dispatcher, Disposition};

/// Monitor-to-sandbox mailbox capacity: one assembled input line
pub const INBOX_CAPACITY: usize = 128;

/// Sandbox-to-monitor mailbox capacity: one encoded report
pub const OUTBOX_CAPACITY: usize = 32;

static_assertions::const_assert!(DiagnosticLine::WIRE_LEN <= OUTBOX_CAPACITY);

/// Mailboxes shared between the monitor and the sandbox
///
/// On the device this lives in the shared IPC region, the only memory both
/// privilege levels can reach. Nothing else belongs here: the sandbox can
/// rewrite any byte of it.
#[repr(C)]
pub struct Boundary {
    pub inbox: SharedMailbox<INBOX_CAPACITY>,
    pub outbox: SharedMailbox<OUTBOX_CAPACITY>,
}

impl Boundary {
    pub const fn new() -> Self {
        Self {
            inbox: SharedMailbox::new(),
            outbox: SharedMailbox::new(),
        }
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime alarm raised by the trap path and polled by the monitor
///
/// Lives in kernel RAM on the device, out of the sandbox's reach.
pub struct Alarm {
    violations: AtomicU32,
    halted: AtomicBool,
}

impl Alarm {
    pub const fn new() -> Self {
        Self {
            violations: AtomicU32::new(0),
            halted: AtomicBool::new(false),
        }
    }

    /// Raise the runtime-violation alarm
    pub fn record_violation(&self) {
        self.violations.fetch_add(1, Ordering::AcqRel);
    }

    /// Violations raised since boot
    pub fn violations(&self) -> u32 {
        self.violations.load(Ordering::Acquire)
    }

    /// Mark the sandbox core as stopped
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

impl Default for Alarm {
    fn default() -> Self {
        Self::new()
    }
}

/// Booted kernel state for one sandbox core
pub struct Kernel<C: BlockCipher> {
    dispatcher: Dispatcher<C>,
    transition: TransitionManager,
    config: KernelConfig,
}

impl<C: BlockCipher> Kernel<C> {
    /// Configure protection, install the trap vector and take ownership of
    /// the device key
    ///
    /// # Errors
    /// [`crate::error::WardenError::Configuration`] if the table cannot be
    /// programmed. The unit's registers are in an unspecified state and the
    /// sandbox must not be entered.
    pub fn boot<U: ProtectionUnit>(
        unit: &mut U,
        table: &[RegionDescriptor],
        config: KernelConfig,
        key: DeviceKey,
    ) -> Result<Self> {
        log::info!("warden: programming {} protection regions", table.len());
        unit.configure(table)?;
        unit.install_trap_vector();
        log::debug!("trap vector at {:#010x?}", unit.trap_vector());

        let gateway = Gateway::new(key);
        Ok(Self {
            dispatcher: Dispatcher::new(gateway, config.fault_policy, config.sandbox_entry),
            transition: TransitionManager::new(),
            config,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Drop into the sandbox at its configured entry point
    ///
    /// # Errors
    /// [`crate::error::WardenError::Transition`] if a precondition fails.
    pub fn enter_untrusted<U: ProtectionUnit>(&self, unit: &mut U) -> Result<()> {
        self.transition.drop_privilege(unit, self.config.sandbox_entry)?;
        Ok(())
    }

    /// Whether this core is running its sandbox
    pub fn is_lowered(&self) -> bool {
        self.transition.is_lowered()
    }

    /// Trap entry from the sandbox
    pub fn handle_trap<M: UserMemory>(&self, frame: &mut TrapFrame, memory: &mut M) -> Disposition {
        self.dispatcher.dispatch(frame, memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEMO_DEVICE_KEY;
    use crate::error::WardenError;
    use crate::sim::SimMachine;
    use aes::Aes128;
    use warden_pmp::{layout, ConfigurationError, Permissions, PrivilegeLevel, DEFAULT_REGIONS};

    #[test]
    fn test_boot_then_drop() {
        let mut machine = SimMachine::new();
        let kernel: Kernel<Aes128> = Kernel::boot(
            &mut machine,
            &DEFAULT_REGIONS,
            KernelConfig::DEFAULT,
            DeviceKey::from_bytes(DEMO_DEVICE_KEY),
        )
        .unwrap();
        assert!(machine.trap_vector().is_some());
        assert!(!kernel.is_lowered());

        kernel.enter_untrusted(&mut machine).unwrap();
        assert!(kernel.is_lowered());
        assert_eq!(machine.current_level(), PrivilegeLevel::Untrusted);
        assert_eq!(machine.pc(), layout::SANDBOX_FLASH_BASE);
    }

    #[test]
    fn test_bad_table_is_fatal() {
        let table = [RegionDescriptor::napot("odd", 0x2000_0000, 0x300, Permissions::READ, false)];
        let mut machine = SimMachine::new();
        let result: Result<Kernel<Aes128>> = Kernel::boot(
            &mut machine,
            &table,
            KernelConfig::DEFAULT,
            DeviceKey::from_bytes(DEMO_DEVICE_KEY),
        );
        assert_eq!(
            result.err(),
            Some(WardenError::Configuration(ConfigurationError::NotPowerOfTwo { size: 0x300 }))
        );
        assert_eq!(machine.trap_vector(), None);
    }

    #[test]
    fn test_alarm_counts_and_halts() {
        let alarm = Alarm::new();
        assert_eq!(alarm.violations(), 0);
        alarm.record_violation();
        alarm.record_violation();
        assert_eq!(alarm.violations(), 2);
        assert!(!alarm.is_halted());
        alarm.halt();
        assert!(alarm.is_halted());
    }

    /// Output section body of `name` in the linker script, with its region
    fn output_section<'a>(script: &'a str, name: &str) -> Option<(&'a str, &'a str)> {
        let start = script.find(&alloc::format!("{} :", name))?;
        let body = &script[start..];
        let close = body.find('}')?;
        let region = body[close + 1..].trim_start().strip_prefix('>')?.split_whitespace().next()?;
        Some((&body[..close], region))
    }

    #[test]
    fn test_sandbox_image_lives_in_sandbox_flash() {
        let script = include_str!("../../warden.ld");

        let (text, region) = output_section(script, ".sandbox_text").unwrap();
        assert_eq!(region, "SANDBOX_FLASH");
        for placement in [
            "KEEP(*(.sandbox_text.entry))",
            "*(.sandbox_text .sandbox_text.*)",
            "*(.text._ZN13warden_kernel7sandbox*)",
            "*libwarden_admission*:(.text .text.*)",
            "*libwarden_ipc*:(.text .text.*)",
            "*(.text._ZN10warden_ipc*)",
            "*(.text._ZN4core*)",
        ] {
            assert!(text.contains(placement), "{} missing from .sandbox_text", placement);
        }
        // The entry must be the first thing in the image
        assert!(text.find(".sandbox_text.entry") < text.find("*(.text."));

        let (rodata, region) = output_section(script, ".sandbox_rodata").unwrap();
        assert_eq!(region, "SANDBOX_FLASH");
        assert!(rodata.contains("*(.sandbox_rodata .sandbox_rodata.*)"));
        assert!(rodata.contains("*libwarden_admission*:(.rodata .rodata.*)"));

        // Kernel secrets and the alarm stay out of the shared region
        let (_, region) = output_section(script, ".kernel_vault (NOLOAD)").unwrap();
        assert_eq!(region, "KERNEL_RAM");
    }

    #[test]
    fn test_boundary_holds_only_mailboxes() {
        use core::mem::size_of;

        assert_eq!(
            size_of::<Boundary>(),
            size_of::<SharedMailbox<INBOX_CAPACITY>>() + size_of::<SharedMailbox<OUTBOX_CAPACITY>>()
        );
    }
}
