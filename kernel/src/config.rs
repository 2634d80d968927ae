//! Kernel configuration and component composition
//!
//! Runtime knobs live in [`KernelConfig`]; target builds pick their console
//! component at compile time with cargo features, the same way the fault
//! policy default is picked by `fault-halt`.

use warden_admission::AdmissionConfig;
use warden_pmp::{layout, PhysAddr};

/// What the dispatcher does with a sandbox access violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Restart the sandbox at its entry point with its data region cleared;
    /// the monitor keeps running
    Contain,
    /// Stop the device
    Halt,
}

impl FaultPolicy {
    /// Policy selected by cargo features
    pub const fn compiled() -> Self {
        if cfg!(feature = "fault-halt") {
            Self::Halt
        } else {
            Self::Contain
        }
    }
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self::compiled()
    }
}

/// Kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub fault_policy: FaultPolicy,
    /// Score every line on the Trusted side before it is posted
    pub trusted_rescreen: bool,
    pub admission: AdmissionConfig,
    /// Untrusted entry point (first instruction of the sandbox image)
    pub sandbox_entry: PhysAddr,
    /// Sandbox data region, cleared when the context is restarted
    pub sandbox_data: (PhysAddr, u32),
    /// Scratch copy of the current input inside the sandbox data region
    pub input_addr: PhysAddr,
    /// Cipher block handed to the gateway
    pub block_addr: PhysAddr,
}

impl KernelConfig {
    pub const DEFAULT: Self = Self {
        fault_policy: FaultPolicy::compiled(),
        trusted_rescreen: true,
        admission: AdmissionConfig::DEFAULT,
        sandbox_entry: layout::SANDBOX_FLASH_BASE,
        sandbox_data: (layout::SANDBOX_RAM_BASE, layout::SANDBOX_RAM_SIZE),
        input_addr: layout::SANDBOX_RAM_BASE,
        block_addr: layout::SANDBOX_RAM_BASE + 0x100,
    };
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Demonstration device key (FIPS-197 Appendix B)
///
/// Production parts provision the key from OTP at boot.
pub const DEMO_DEVICE_KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
];

/// Console component selection (compile-time, target builds)
///
/// - `console-pl011`: RP2350 UART1 (default)
/// - `console-null`: no diagnostic output
#[cfg(target_arch = "riscv32")]
mod console_select {
    #[cfg(not(feature = "console-null"))]
    use crate::components::console::pl011::{Pl011Config, Pl011Console, RP2350_UART1_BASE};

    #[cfg(not(feature = "console-null"))]
    pub static CONSOLE: Pl011Console = Pl011Console::new(Pl011Config {
        mmio_base: RP2350_UART1_BASE,
    });

    #[cfg(feature = "console-null")]
    pub static CONSOLE: crate::components::console::null::NullConsole =
        crate::components::console::null::NullConsole::new();
}

/// Initialize the selected console component
#[cfg(target_arch = "riscv32")]
pub fn init_console() {
    console_select::CONSOLE.init();
}

/// The selected console component
#[cfg(target_arch = "riscv32")]
pub fn console() -> &'static dyn crate::components::console::Console {
    &console_select::CONSOLE
}

/// Log sink selection (compile-time, target builds)
///
/// Log records never share the diagnostic channel.
///
/// - `log-uart0`: RP2350 UART0, the debug header
/// - otherwise: discarded
#[cfg(target_arch = "riscv32")]
mod log_select {
    #[cfg(feature = "log-uart0")]
    use crate::components::console::pl011::{Pl011Config, Pl011Console, RP2350_UART0_BASE};

    #[cfg(feature = "log-uart0")]
    pub static LOG_CONSOLE: Pl011Console = Pl011Console::new(Pl011Config {
        mmio_base: RP2350_UART0_BASE,
    });

    #[cfg(not(feature = "log-uart0"))]
    pub static LOG_CONSOLE: crate::components::console::null::NullConsole =
        crate::components::console::null::NullConsole::new();
}

/// Initialize the log sink
#[cfg(target_arch = "riscv32")]
pub fn init_log_console() {
    log_select::LOG_CONSOLE.init();
}

/// Where `log` records go on the device
#[cfg(target_arch = "riscv32")]
pub fn log_console() -> &'static dyn crate::components::console::Console {
    &log_select::LOG_CONSOLE
}
