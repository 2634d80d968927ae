//! Warden firmware image (RP2350, Hazard3 cores)
//!
//! Host builds produce a stub; use `warden-sim` to run the system on a
//! workstation.

#![cfg_attr(target_arch = "riscv32", no_std)]
#![cfg_attr(target_arch = "riscv32", no_main)]

#[cfg(target_arch = "riscv32")]
mod firmware {
    use core::arch::global_asm;

    // Core 0 reset entry: stack from the board script, then the monitor
    global_asm!(
        ".section .text._start",
        ".global _start",
        ".type _start, @function",
        "_start:",
        "    la sp, __stack_top",
        "    j {monitor_main}",
        monitor_main = sym warden_kernel::boot::hardware::monitor_main,
    );

    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        log::error!("panic: {}", info);
        loop {
            core::hint::spin_loop();
        }
    }
}

#[cfg(not(target_arch = "riscv32"))]
fn main() {
    eprintln!("warden-firmware targets riscv32imac; run `warden-sim` on the host");
}
