//! Warden kernel
//!
//! Trusted half of a PMP-isolated sandbox for RV32 microcontrollers. The
//! kernel owns the device key and the protection configuration; untrusted
//! code runs in U-mode and reaches privileged services only through the
//! syscall gateway.
//!
//! # Architecture
//!
//! - [`boot`]: boot sequence, the monitor/sandbox [`boot::Boundary`] and the
//!   trusted [`boot::Alarm`]
//! - [`arch`]: protection-unit abstraction, trap frame, Hazard3 backend
//! - [`privilege`]: the one-way drop into Untrusted mode
//! - [`trap`]: trap decoding and dispatch
//! - [`syscall`]: operation registry and the key-holding gateway
//! - [`monitor`]: Trusted input handling and diagnostic reporting
//! - [`sandbox`]: the Untrusted processing task
//! - [`sim`]: software hart used by tests and the host simulator
//! - [`components`], [`debug`], [`config`]: console, logging, configuration

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

pub mod arch;
pub mod boot;
pub mod components;
pub mod config;
pub mod debug;
pub mod error;
#[cfg(target_arch = "riscv32")]
pub mod memory;
pub mod monitor;
pub mod privilege;
pub mod sandbox;
pub mod sim;
pub mod syscall;
pub mod trap;

pub use boot::{Alarm, Boundary, Kernel};
pub use config::{FaultPolicy, KernelConfig};
pub use error::{Result, WardenError};
