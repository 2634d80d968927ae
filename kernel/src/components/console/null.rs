//! Null console component (no output)
//!
//! Discards output and never has input. Used for production builds with
//! the `console-null` feature and wherever a test does not care about the
//! diagnostic channel.

use super::Console;

/// Console that discards everything
pub struct NullConsole;

impl NullConsole {
    pub const fn new() -> Self {
        Self
    }

    /// Initialize null console (no-op)
    pub fn init(&self) {}
}

impl Default for NullConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for NullConsole {
    #[inline(always)]
    fn putc(&self, _c: u8) {}

    #[inline(always)]
    fn puts(&self, _s: &str) {}
}
