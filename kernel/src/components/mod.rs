//! Kernel components
//!
//! Minimal components built into the kernel. Selection for target builds is
//! compile-time via cargo features (see [`crate::config`]); host builds
//! construct components directly.
//!
//! - **console**: the diagnostic channel. Byte in, byte out, no buffering
//!   beyond what the hardware FIFO provides.

pub mod console;
