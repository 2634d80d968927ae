//! Trusted monitor
//!
//! Runs in Trusted mode on the monitor core. Each poll:
//! 1. Reports new runtime violations and stops if the sandbox core halted
//! 2. Assembles console input into lines and posts them to the sandbox,
//!    re-screening each line first when `trusted_rescreen` is set
//! 3. Forwards sandbox reports from the outbox to the console
//!
//! The sandbox's own screening is advisory. With the trusted re-screen the
//! decision that matters is made here, on the side that cannot be
//! compromised by the input.

use warden_admission::{AdmissionEngine, DiagnosticLine};
use warden_ipc::{Consumer, IpcError, Producer};

use crate::boot::{Alarm, Boundary, INBOX_CAPACITY, OUTBOX_CAPACITY};
use crate::components::console::{write_line, Console};
use crate::config::KernelConfig;
use crate::error::{Result, WardenError};

/// Longest input line; further bytes are dropped until the terminator
pub const MAX_LINE_LEN: usize = 127;

/// One assembled input line
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Line {
    bytes: [u8; MAX_LINE_LEN],
    len: usize,
}

impl Line {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl core::fmt::Debug for Line {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Line({:?})", core::str::from_utf8(self.as_bytes()))
    }
}

/// Byte-at-a-time line assembly
///
/// `\n` and `\r` both terminate a line; empty lines are ignored, so CRLF
/// yields one line.
#[derive(Debug, Clone)]
pub struct LineAssembler {
    current: Line,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            current: Line {
                bytes: [0; MAX_LINE_LEN],
                len: 0,
            },
        }
    }

    /// Feed one byte; returns a line when `byte` completes a non-empty one
    pub fn push(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\n' | b'\r' => {
                if self.current.len == 0 {
                    return None;
                }
                let line = self.current;
                self.current.len = 0;
                Some(line)
            }
            _ => {
                if self.current.len < MAX_LINE_LEN {
                    self.current.bytes[self.current.len] = byte;
                    self.current.len += 1;
                }
                None
            }
        }
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Monitor state after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Running,
    /// Sandbox core stopped; nothing more will be processed
    Halted,
}

/// Monitor side of the boundary
pub struct Monitor<'a> {
    console: &'a dyn Console,
    alarm: &'a Alarm,
    inbox: Producer<'a, INBOX_CAPACITY>,
    outbox: Consumer<'a, OUTBOX_CAPACITY>,
    engine: AdmissionEngine,
    trusted_rescreen: bool,
    assembler: LineAssembler,
    pending: Option<Line>,
    alarms_reported: u32,
}

impl<'a> Monitor<'a> {
    /// Claim the producing end of the inbox and the consuming end of the
    /// outbox, and watch `alarm` for runtime violations
    ///
    /// # Errors
    /// [`WardenError::Mailbox`] if either end is already claimed.
    pub fn new(
        console: &'a dyn Console,
        boundary: &'a Boundary,
        alarm: &'a Alarm,
        config: &KernelConfig,
    ) -> Result<Self> {
        Ok(Self {
            console,
            alarm,
            inbox: boundary.inbox.producer()?,
            outbox: boundary.outbox.consumer()?,
            engine: AdmissionEngine::new(config.admission),
            trusted_rescreen: config.trusted_rescreen,
            assembler: LineAssembler::new(),
            pending: None,
            alarms_reported: 0,
        })
    }

    /// Boot banner on the diagnostic channel
    pub fn announce(&self) {
        write_line(self.console, &DiagnosticLine::Ready);
    }

    /// Hand one line to the sandbox
    ///
    /// # Errors
    /// - [`WardenError::AdmissionRejected`]: the trusted re-screen refused it
    ///   and a rejection line was written
    /// - [`WardenError::Mailbox`] with `Busy`: the sandbox has not taken the
    ///   previous line; retry later
    pub fn submit(&mut self, line: &[u8]) -> Result<u32> {
        if self.trusted_rescreen {
            let screening = self.engine.screen(line);
            if !screening.is_accepted() {
                log::info!("monitor: rejected input (score {})", screening.score);
                write_line(
                    self.console,
                    &DiagnosticLine::Rejected {
                        score: screening.score,
                        tags: screening.tags(),
                    },
                );
                return Err(WardenError::AdmissionRejected { score: screening.score });
            }
        }
        Ok(self.inbox.post(line)?)
    }

    /// One pass of the monitor loop
    pub fn poll(&mut self) -> MonitorStatus {
        if self.check_alarms() == MonitorStatus::Halted {
            return MonitorStatus::Halted;
        }

        if let Some(line) = self.pending.take() {
            self.offer(line);
        }
        while self.pending.is_none() {
            let Some(byte) = self.console.try_getc() else {
                break;
            };
            if let Some(line) = self.assembler.push(byte) {
                self.offer(line);
            }
        }

        self.drain_reports();
        self.check_alarms()
    }

    /// Whether a line is waiting for the sandbox to free the inbox
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn offer(&mut self, line: Line) {
        match self.submit(line.as_bytes()) {
            Ok(sequence) => log::debug!("monitor: posted line {}", sequence),
            Err(WardenError::Mailbox(IpcError::Busy { .. })) => self.pending = Some(line),
            Err(WardenError::AdmissionRejected { .. }) => {}
            Err(error) => log::error!("monitor: dropped line: {}", error),
        }
    }

    fn drain_reports(&mut self) {
        let mut wire = [0u8; OUTBOX_CAPACITY];
        match self.outbox.take(&mut wire) {
            Ok(Some(message)) => match DiagnosticLine::from_wire(&wire[..message.len]) {
                Some(line) => write_line(self.console, &line),
                None => log::warn!("monitor: malformed report {}", message.sequence),
            },
            Ok(None) => {}
            Err(error) => log::error!("monitor: outbox: {}", error),
        }
    }

    fn check_alarms(&mut self) -> MonitorStatus {
        let raised = self.alarm.violations();
        while self.alarms_reported < raised {
            log::warn!("monitor: runtime violation in sandbox");
            write_line(self.console, &DiagnosticLine::RuntimeViolation);
            self.alarms_reported += 1;
        }
        if self.alarm.is_halted() {
            MonitorStatus::Halted
        } else {
            MonitorStatus::Running
        }
    }
}
