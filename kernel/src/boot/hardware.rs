//! Device bring-up on the RP2350
//!
//! Core 0 runs the monitor in M-mode. Core 1 programs its own PMP, hands
//! the key to its gateway and drops into the sandbox; from then on it only
//! returns to M-mode through `warden_trap_handler`.
//!
//! Sandbox code and data are placed in the sandbox regions by
//! `warden.ld`; everything here without a `.sandbox_*` section is kernel
//! only.

use core::arch::asm;
use core::ptr::{addr_of, addr_of_mut};

use aes::Aes128;
use spin::Once;
use warden_pmp::{AccessType, PmpDump, PrivilegeLevel, SimulatedPmp, DEFAULT_REGIONS};

use super::{Alarm, Boundary, Kernel};
use crate::arch::context::TrapFrame;
use crate::arch::riscv32::registers::hart_id;
use crate::arch::riscv32::Hazard3;
use crate::config::{self, KernelConfig, DEMO_DEVICE_KEY};
use crate::monitor::{Monitor, MonitorStatus};
use crate::sandbox::{SandboxTask, Terminated, UntrustedEnv};
use crate::syscall::{DeviceKey, MemoryFault, UserMemory};
use crate::trap::{Disposition, FaultKind};

/// Monitor/sandbox mailboxes, in the shared IPC region
#[link_section = ".shared_ipc"]
static BOUNDARY: Boundary = Boundary::new();

/// Violation counter and halt flag, out of the sandbox's reach
#[link_section = ".kernel_vault"]
static ALARM: Alarm = Alarm::new();

/// The sandbox's own copy of its settings, readable from U-mode
#[link_section = ".sandbox_rodata.config"]
static SANDBOX_CONFIG: KernelConfig = KernelConfig::DEFAULT;

/// Sandbox core kernel state, including the expanded key
#[link_section = ".kernel_vault"]
static KERNEL: Once<Kernel<Aes128>> = Once::new();

/// Copy of the sandbox core's PMP, for checking gateway buffers
#[link_section = ".kernel_vault"]
static POLICY: Once<SimulatedPmp> = Once::new();

extern "C" {
    static mut __kernel_vault_start: u8;
    static mut __kernel_vault_end: u8;
    static mut __shared_ipc_start: u8;
    static mut __shared_ipc_end: u8;
}

const SIO_BASE: usize = 0xD000_0000;
const SIO_FIFO_ST: usize = SIO_BASE + 0x50;
const SIO_FIFO_WR: usize = SIO_BASE + 0x54;
const SIO_FIFO_RD: usize = SIO_BASE + 0x58;
const FIFO_VLD: u32 = 1 << 0;
const FIFO_RDY: u32 = 1 << 1;

/// Sandbox core stack, in ordinary kernel RAM
static mut CORE1_STACK: [u32; 512] = [0; 512];

unsafe fn zero(start: *mut u8, end: *mut u8) {
    let mut p = start;
    while p < end {
        core::ptr::write_volatile(p, 0);
        p = p.add(1);
    }
}

fn halt() -> ! {
    loop {
        unsafe { asm!("wfi") };
    }
}

/// Core 0 entry
pub fn monitor_main() -> ! {
    // NOLOAD sections hold garbage until cleared
    unsafe {
        zero(addr_of_mut!(__kernel_vault_start), addr_of_mut!(__kernel_vault_end));
        zero(addr_of_mut!(__shared_ipc_start), addr_of_mut!(__shared_ipc_end));
    }

    unsafe { crate::memory::heap::init() };

    config::init_console();
    config::init_log_console();
    let console = config::console();
    let _ = crate::debug::init(config::log_console());
    log::info!("warden: monitor on hart {} ({} bytes heap)", hart_id(), crate::memory::heap::free());

    let kernel_config = KernelConfig::DEFAULT;
    let mut monitor = match Monitor::new(console, &BOUNDARY, &ALARM, &kernel_config) {
        Ok(monitor) => monitor,
        Err(error) => {
            log::error!("monitor: {}", error);
            halt();
        }
    };

    launch_core1();
    monitor.announce();

    while monitor.poll() == MonitorStatus::Running {
        core::hint::spin_loop();
    }
    log::error!("sandbox core stopped");
    halt();
}

/// RP2350 bootrom core 1 launch handshake over the SIO FIFO
fn launch_core1() {
    let stack_top = unsafe { addr_of!(CORE1_STACK) as usize + core::mem::size_of_val(&*addr_of!(CORE1_STACK)) };
    let sequence = [0, 0, 1, 0, stack_top as u32, sandbox_core_main as usize as u32];

    let mut i = 0;
    while i < sequence.len() {
        let word = sequence[i];
        unsafe {
            if word == 0 {
                // Drain before a reset word so the echo is unambiguous
                while core::ptr::read_volatile(SIO_FIFO_ST as *const u32) & FIFO_VLD != 0 {
                    core::ptr::read_volatile(SIO_FIFO_RD as *const u32);
                }
                asm!("fence");
            }
            while core::ptr::read_volatile(SIO_FIFO_ST as *const u32) & FIFO_RDY == 0 {}
            core::ptr::write_volatile(SIO_FIFO_WR as *mut u32, word);
            while core::ptr::read_volatile(SIO_FIFO_ST as *const u32) & FIFO_VLD == 0 {}
            let echo = core::ptr::read_volatile(SIO_FIFO_RD as *const u32);
            i = if echo == word { i + 1 } else { 0 };
        }
    }
}

/// Core 1 entry
extern "C" fn sandbox_core_main() -> ! {
    let mut unit = unsafe { Hazard3::take() };
    let kernel = KERNEL.call_once(|| {
        match Kernel::boot(&mut unit, &DEFAULT_REGIONS, KernelConfig::DEFAULT, DeviceKey::from_bytes(DEMO_DEVICE_KEY)) {
            Ok(kernel) => kernel,
            Err(error) => {
                log::error!("sandbox core boot failed: {}", error);
                ALARM.halt();
                halt();
            }
        }
    });
    log::info!("pmp state:\n{}", PmpDump(unit.pmp()));
    POLICY.call_once(|| SimulatedPmp::snapshot(unit.pmp()));

    if let Err(error) = kernel.enter_untrusted(&mut unit) {
        log::error!("{}", error);
        ALARM.halt();
    }
    halt();
}

/// Gateway view of sandbox memory on the device
///
/// Buffers are checked against a snapshot of the programmed PMP with
/// Untrusted privilege before the kernel dereferences them.
struct DeviceMemory;

impl DeviceMemory {
    fn permitted(addr: u32, len: usize, access: AccessType) -> bool {
        match POLICY.get() {
            Some(policy) => policy.check(addr, len as u32, access, PrivilegeLevel::Untrusted),
            None => false,
        }
    }
}

impl UserMemory for DeviceMemory {
    fn copy_from_user(&mut self, addr: u32, out: &mut [u8]) -> Result<(), MemoryFault> {
        if !Self::permitted(addr, out.len(), AccessType::Read) {
            return Err(MemoryFault { kind: FaultKind::Load, address: addr });
        }
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile((addr as usize + i) as *const u8) };
        }
        Ok(())
    }

    fn copy_to_user(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryFault> {
        if !Self::permitted(addr, data.len(), AccessType::Write) {
            return Err(MemoryFault { kind: FaultKind::Store, address: addr });
        }
        for (i, byte) in data.iter().enumerate() {
            unsafe { core::ptr::write_volatile((addr as usize + i) as *mut u8, *byte) };
        }
        Ok(())
    }
}

/// Called by the trap stub with the saved frame
#[no_mangle]
extern "C" fn warden_trap_handler(frame: &mut TrapFrame) {
    let Some(kernel) = KERNEL.get() else {
        halt();
    };

    match kernel.handle_trap(frame, &mut DeviceMemory) {
        Disposition::Resume => {}
        Disposition::Exit => {
            log::info!("sandbox exited");
            ALARM.halt();
            halt();
        }
        Disposition::Contain(_) => {
            ALARM.record_violation();
            let (base, size) = kernel.config().sandbox_data;
            unsafe { zero(base as *mut u8, (base + size) as *mut u8) };
            // SAFETY: the faulting context never runs again
            unsafe {
                BOUNDARY.inbox.release_consumer();
                BOUNDARY.outbox.release_producer();
            }
            frame.regs = [0; 32];
            frame.regs[TrapFrame::SP] = base + size;
        }
        Disposition::Halt(error) => {
            if let crate::error::WardenError::SecurityViolation(_) = error {
                ALARM.record_violation();
            }
            ALARM.halt();
            log::error!("{}", error);
            halt();
        }
    }
}

/// Untrusted execution on the device: plain memory accesses and `ecall`
///
/// A denied access traps and never returns here, so every operation
/// either succeeds or the context is restarted.
struct DeviceEnv;

impl UntrustedEnv for DeviceEnv {
    #[link_section = ".sandbox_text.env"]
    fn syscall(&mut self, id: u32, arg: u32) -> Result<u32, Terminated> {
        let mut a0 = id;
        unsafe {
            asm!("ecall", inout("a0") a0, in("a1") arg, options(nostack));
        }
        Ok(a0)
    }

    #[link_section = ".sandbox_text.env"]
    fn load(&mut self, addr: u32, out: &mut [u8]) -> Result<(), Terminated> {
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile((addr as usize + i) as *const u8) };
        }
        Ok(())
    }

    #[link_section = ".sandbox_text.env"]
    fn store(&mut self, addr: u32, data: &[u8]) -> Result<(), Terminated> {
        for (i, byte) in data.iter().enumerate() {
            unsafe { core::ptr::write_volatile((addr as usize + i) as *mut u8, *byte) };
        }
        Ok(())
    }

    #[link_section = ".sandbox_text.env"]
    fn branch(&mut self, _target: u32) -> Result<(), Terminated> {
        Ok(())
    }
}

/// First instruction of the sandbox image
#[no_mangle]
#[link_section = ".sandbox_text.entry"]
extern "C" fn sandbox_entry() -> ! {
    let mut env = DeviceEnv;
    if let Ok(mut task) = SandboxTask::new(&BOUNDARY, &SANDBOX_CONFIG) {
        // Traps never return here, so only a mailbox fault ends the loop
        while task.poll(&mut env).is_ok() {}
    }
    // The exit trap halts the core and the monitor reports it
    let _ = env.syscall(crate::syscall::numbers::SYS_EXIT, 0);
    loop {}
}
