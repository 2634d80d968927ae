//! Console component trait
//!
//! The console is the diagnostic channel: the monitor reads operator input
//! from it and writes one report line per decision to it. The same trait
//! backs the `log` sink in [`crate::debug`].

use core::fmt;

/// Diagnostic channel
///
/// Implementations are minimal: blocking `putc`, non-blocking `try_getc`.
pub trait Console: Send + Sync {
    /// Write a single byte
    ///
    /// Blocks until the transmitter accepts it.
    fn putc(&self, c: u8);

    /// Write a string, translating `\n` into CRLF
    fn puts(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.putc(b'\r'); // CRLF for terminals
            }
            self.putc(byte);
        }
    }

    /// Read one byte if the receiver has one
    fn try_getc(&self) -> Option<u8> {
        None
    }
}

/// Wrapper for using a Console with `core::fmt::Write`
pub struct ConsoleWriter<'a> {
    console: &'a dyn Console,
}

impl<'a> ConsoleWriter<'a> {
    pub const fn new(console: &'a dyn Console) -> Self {
        Self { console }
    }
}

impl fmt::Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.puts(s);
        Ok(())
    }
}

/// Write `line` followed by CRLF
pub fn write_line(console: &dyn Console, line: &dyn fmt::Display) {
    use core::fmt::Write;
    let _ = writeln!(ConsoleWriter::new(console), "{}", line);
}

// Component implementations
pub mod buffer;
pub mod null;
pub mod pl011;
