//! System call numbers
//!
//! Passed in `a0` by the `ecall` instruction. Ids are part of the sandbox
//! ABI and never reused.

/// Encrypt one 16-byte block in place (`a1` = block address)
pub const SYS_ENCRYPT: u32 = 1;

/// Leave the sandbox for good; the context is not resumed
pub const SYS_EXIT: u32 = 99;
