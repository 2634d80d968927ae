//! PL011 UART console component (minimal)
//!
//! The RP2350 UARTs are ARM PL011 cells. This drives the data and flag
//! registers only: baud rate, framing and pin muxing are board bring-up and
//! are expected to be done before the console is used.

use super::Console;
use core::ptr;

/// RP2350 UART0 (debug header)
pub const RP2350_UART0_BASE: usize = 0x4007_0000;

/// RP2350 UART1 (the link to the dashboard bridge)
pub const RP2350_UART1_BASE: usize = 0x4007_8000;

/// Flag register: receive FIFO empty
const FR_RXFE: u32 = 1 << 4;
/// Flag register: transmit FIFO full
const FR_TXFF: u32 = 1 << 5;

/// PL011 UART registers (minimal subset)
#[repr(C)]
struct Pl011Regs {
    dr: u32,           // 0x00: Data register
    _rsrecr: [u32; 5], // 0x04-0x14: Status/error registers (unused)
    fr: u32,           // 0x18: Flag register
}

/// PL011 console component configuration
#[derive(Clone, Copy)]
pub struct Pl011Config {
    /// Physical MMIO base address
    pub mmio_base: usize,
}

/// PL011 minimal console
///
/// # Safety
/// Accesses MMIO directly. The base address must be a PL011 and the UART
/// block must be out of reset and clocked before the first access. Only
/// Trusted code may use it: the UART is outside every sandbox region.
pub struct Pl011Console {
    mmio_base: usize,
}

impl Pl011Console {
    pub const fn new(config: Pl011Config) -> Self {
        Self {
            mmio_base: config.mmio_base,
        }
    }

    /// Touch the flag register to make sure the block responds
    pub fn init(&self) {
        let _ = self.flags();
    }

    #[inline]
    fn flags(&self) -> u32 {
        unsafe {
            let regs = self.mmio_base as *const Pl011Regs;
            ptr::read_volatile(ptr::addr_of!((*regs).fr))
        }
    }
}

impl Console for Pl011Console {
    fn putc(&self, c: u8) {
        while self.flags() & FR_TXFF != 0 {
            core::hint::spin_loop();
        }
        unsafe {
            let regs = self.mmio_base as *mut Pl011Regs;
            ptr::write_volatile(ptr::addr_of_mut!((*regs).dr), c as u32);
        }
    }

    fn try_getc(&self) -> Option<u8> {
        if self.flags() & FR_RXFE != 0 {
            return None;
        }
        let data = unsafe {
            let regs = self.mmio_base as *const Pl011Regs;
            ptr::read_volatile(ptr::addr_of!((*regs).dr))
        };
        // bits 8..11 carry framing/parity/break/overrun errors
        if data & 0xF00 != 0 {
            return None;
        }
        Some(data as u8)
    }
}
