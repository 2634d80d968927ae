//! Kernel memory (riscv32 images only)
//!
//! Host builds use the standard allocator; the firmware gets a small heap
//! in ordinary kernel RAM, outside every region the sandbox can reach.

pub mod heap;
