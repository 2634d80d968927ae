//! In-memory console component
//!
//! Host stand-in for the UART: input is fed by the test or the simulator,
//! output is captured for inspection.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use spin::Mutex;

use super::Console;

/// Console backed by two byte queues
pub struct BufferConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl BufferConsole {
    pub const fn new() -> Self {
        Self {
            input: Mutex::new(VecDeque::new()),
            output: Mutex::new(Vec::new()),
        }
    }

    /// Queue bytes for the reader
    pub fn feed(&self, bytes: &[u8]) {
        self.input.lock().extend(bytes.iter().copied());
    }

    /// Bytes not yet read
    pub fn pending_input(&self) -> usize {
        self.input.lock().len()
    }

    /// Drain everything written so far
    pub fn take_output(&self) -> String {
        let bytes = core::mem::take(&mut *self.output.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Drain output and split it into CRLF-terminated lines
    pub fn take_lines(&self) -> Vec<String> {
        self.take_output()
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    }
}

impl Default for BufferConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for BufferConsole {
    fn putc(&self, c: u8) {
        self.output.lock().push(c);
    }

    fn puts(&self, s: &str) {
        let mut output = self.output.lock();
        for byte in s.bytes() {
            if byte == b'\n' {
                output.push(b'\r');
            }
            output.push(byte);
        }
    }

    fn try_getc(&self) -> Option<u8> {
        self.input.lock().pop_front()
    }
}
