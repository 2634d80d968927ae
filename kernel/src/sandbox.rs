//! Sandboxed task
//!
//! The untrusted half of the device. It waits for an input line from the
//! monitor, screens it, and for accepted input asks the syscall gateway to
//! encrypt one padded block. It never holds the key and never touches the
//! console: every result goes back to the monitor as a [`DiagnosticLine`]
//! through the outbox.
//!
//! All memory traffic goes through an [`UntrustedEnv`], which is either the
//! real core (riscv32) or a [`crate::sim::Hart`]. Nothing here logs: the
//! logger lives in Trusted memory.

use warden_admission::{pad_block, AdmissionEngine, DiagnosticLine};
use warden_ipc::{Consumer, IpcError, Producer};

use crate::boot::{Boundary, INBOX_CAPACITY, OUTBOX_CAPACITY};
use crate::config::KernelConfig;
use crate::error::{SecurityViolation, WardenError};
use crate::syscall::numbers::{SYS_ENCRYPT, SYS_EXIT};

/// Offset of the task's main loop from the sandbox entry point
pub const LOOP_HEAD_OFFSET: u32 = 0x40;

/// Why the sandbox context stopped running the current step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminated {
    /// A violation was contained; the context restarts at its entry point
    Contained(SecurityViolation),
    /// `SYS_EXIT`
    Exited,
    /// The sandbox core is stopped
    Halted(WardenError),
    /// A boundary mailbox refused an operation; the step was abandoned
    Mailbox(IpcError),
}

impl From<IpcError> for Terminated {
    fn from(error: IpcError) -> Self {
        Self::Mailbox(error)
    }
}

/// Execution environment of Untrusted code
///
/// Every operation is subject to the protection policy. A denied access
/// traps into the kernel and surfaces here as [`Terminated`].
pub trait UntrustedEnv {
    /// `ecall` with `a0 = id`, `a1 = arg`; returns `a0` after the trap
    fn syscall(&mut self, id: u32, arg: u32) -> Result<u32, Terminated>;

    fn load(&mut self, addr: u32, out: &mut [u8]) -> Result<(), Terminated>;

    fn store(&mut self, addr: u32, data: &[u8]) -> Result<(), Terminated>;

    /// Transfer control to `target`
    fn branch(&mut self, target: u32) -> Result<(), Terminated>;
}

/// Outcome of one [`SandboxTask::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing in the inbox
    Idle,
    /// A line was screened and a report queued
    Reported(DiagnosticLine),
    /// Previous report still waiting for the monitor
    Backlogged,
}

/// Sandbox side of the boundary
pub struct SandboxTask<'b> {
    inbox: Consumer<'b, INBOX_CAPACITY>,
    outbox: Producer<'b, OUTBOX_CAPACITY>,
    engine: AdmissionEngine,
    entry: u32,
    input_addr: u32,
    block_addr: u32,
    backlog: Option<DiagnosticLine>,
}

impl<'b> SandboxTask<'b> {
    /// Claim the consuming end of the inbox and the producing end of the
    /// outbox
    ///
    /// # Errors
    /// [`WardenError::Mailbox`] if either end is already claimed.
    pub fn new(boundary: &'b Boundary, config: &KernelConfig) -> Result<Self, WardenError> {
        Ok(Self {
            inbox: boundary.inbox.consumer()?,
            outbox: boundary.outbox.producer()?,
            engine: AdmissionEngine::new(config.admission),
            entry: config.sandbox_entry,
            input_addr: config.input_addr,
            block_addr: config.block_addr,
            backlog: None,
        })
    }

    /// One pass of the task's main loop
    ///
    /// # Errors
    /// [`Terminated`] when the step trapped out of the sandbox or a mailbox
    /// refused it. Input taken from the inbox before the trap is dropped.
    pub fn poll<E: UntrustedEnv>(&mut self, env: &mut E) -> Result<Step, Terminated> {
        env.branch(self.entry + LOOP_HEAD_OFFSET)?;

        if let Some(line) = self.backlog.take() {
            return self.report(line);
        }

        let mut input = [0u8; INBOX_CAPACITY];
        let Some(len) = self.receive(&mut input)? else {
            return Ok(Step::Idle);
        };
        let input = &input[..len];
        env.store(self.input_addr, input)?;

        let screening = self.engine.screen(input);
        let line = if screening.is_accepted() {
            let mut block = pad_block(input);
            env.store(self.block_addr, &block)?;
            env.syscall(SYS_ENCRYPT, self.block_addr)?;
            env.load(self.block_addr, &mut block)?;
            DiagnosticLine::Processed {
                ciphertext: block,
                score: screening.score,
                tags: screening.tags(),
            }
        } else {
            DiagnosticLine::Rejected {
                score: screening.score,
                tags: screening.tags(),
            }
        };

        self.report(line)
    }

    /// Take the next input line into `buf`, returning its length
    ///
    /// # Errors
    /// [`Terminated::Mailbox`] if the pending line does not fit `buf`; the
    /// line stays in the inbox.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Terminated> {
        Ok(self.inbox.take(buf)?.map(|message| message.len))
    }

    fn report(&mut self, line: DiagnosticLine) -> Result<Step, Terminated> {
        match self.outbox.post(&line.to_wire()) {
            Ok(_) => Ok(Step::Reported(line)),
            Err(IpcError::Busy { .. }) => {
                self.backlog = Some(line);
                Ok(Step::Backlogged)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Leave the sandbox
    pub fn shutdown<E: UntrustedEnv>(&mut self, env: &mut E) -> Terminated {
        match env.syscall(SYS_EXIT, 0) {
            Err(reason) => reason,
            Ok(_) => Terminated::Exited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Environment that permits everything and records traffic
    #[derive(Default)]
    struct Recorder {
        stores: Vec<(u32, Vec<u8>)>,
        syscalls: Vec<(u32, u32)>,
    }

    impl UntrustedEnv for Recorder {
        fn syscall(&mut self, id: u32, arg: u32) -> Result<u32, Terminated> {
            self.syscalls.push((id, arg));
            if id == SYS_EXIT {
                return Err(Terminated::Exited);
            }
            Ok(0)
        }

        fn load(&mut self, addr: u32, out: &mut [u8]) -> Result<(), Terminated> {
            let (_, data) = self.stores.iter().rev().find(|(at, _)| *at == addr).expect("load before store");
            out.copy_from_slice(&data[..out.len()]);
            Ok(())
        }

        fn store(&mut self, addr: u32, data: &[u8]) -> Result<(), Terminated> {
            self.stores.push((addr, data.to_vec()));
            Ok(())
        }

        fn branch(&mut self, _target: u32) -> Result<(), Terminated> {
            Ok(())
        }
    }

    #[test]
    fn test_idle_without_input() {
        let boundary = Boundary::new();
        let mut task = SandboxTask::new(&boundary, &KernelConfig::DEFAULT).unwrap();
        assert_eq!(task.poll(&mut Recorder::default()), Ok(Step::Idle));
    }

    #[test]
    fn test_accepted_line_goes_through_gateway() {
        let boundary = Boundary::new();
        let config = KernelConfig::DEFAULT;
        let mut task = SandboxTask::new(&boundary, &config).unwrap();
        boundary.inbox.producer().unwrap().post(b"hello").unwrap();

        let mut env = Recorder::default();
        let step = task.poll(&mut env).unwrap();
        assert_eq!(env.syscalls, vec![(SYS_ENCRYPT, config.block_addr)]);
        assert_eq!(env.stores[1], (config.block_addr, b"hello           ".to_vec()));
        assert!(matches!(step, Step::Reported(DiagnosticLine::Processed { score: 0, .. })));

        let mut wire = [0u8; OUTBOX_CAPACITY];
        let message = boundary.outbox.consumer().unwrap().take(&mut wire).unwrap().unwrap();
        assert!(matches!(
            DiagnosticLine::from_wire(&wire[..message.len]),
            Some(DiagnosticLine::Processed { .. })
        ));
    }

    #[test]
    fn test_rejected_line_never_reaches_gateway() {
        let boundary = Boundary::new();
        let mut task = SandboxTask::new(&boundary, &KernelConfig::DEFAULT).unwrap();
        boundary.inbox.producer().unwrap().post(&[b'A'; 100]).unwrap();

        let mut env = Recorder::default();
        let step = task.poll(&mut env).unwrap();
        assert!(env.syscalls.is_empty());
        assert!(matches!(step, Step::Reported(DiagnosticLine::Rejected { score: 75, .. })));
    }

    #[test]
    fn test_busy_outbox_keeps_report() {
        let boundary = Boundary::new();
        let mut task = SandboxTask::new(&boundary, &KernelConfig::DEFAULT).unwrap();
        let mut inbox = boundary.inbox.producer().unwrap();
        let mut outbox = boundary.outbox.consumer().unwrap();
        let mut env = Recorder::default();

        inbox.post(b"one").unwrap();
        assert!(matches!(task.poll(&mut env), Ok(Step::Reported(_))));
        inbox.post(b"two").unwrap();
        assert_eq!(task.poll(&mut env), Ok(Step::Backlogged));

        let mut wire = [0u8; OUTBOX_CAPACITY];
        outbox.take(&mut wire).unwrap();
        assert!(matches!(task.poll(&mut env), Ok(Step::Reported(_))));
        assert_eq!(env.syscalls.len(), 2);
    }

    #[test]
    fn test_inbox_error_is_not_swallowed() {
        let boundary = Boundary::new();
        let mut task = SandboxTask::new(&boundary, &KernelConfig::DEFAULT).unwrap();
        boundary.inbox.producer().unwrap().post(b"hello").unwrap();

        assert_eq!(
            task.receive(&mut [0u8; 4]),
            Err(Terminated::Mailbox(IpcError::BufferTooSmall { needed: 5, available: 4 }))
        );
        // Still pending for a full-size read
        assert!(matches!(task.poll(&mut Recorder::default()), Ok(Step::Reported(_))));
        assert_eq!(task.receive(&mut [0u8; INBOX_CAPACITY]), Ok(None));
    }

    #[test]
    fn test_claims_are_exclusive() {
        let boundary = Boundary::new();
        let _task = SandboxTask::new(&boundary, &KernelConfig::DEFAULT).unwrap();
        assert!(matches!(
            SandboxTask::new(&boundary, &KernelConfig::DEFAULT),
            Err(WardenError::Mailbox(IpcError::AlreadyClaimed { .. }))
        ));
    }

    #[test]
    fn test_shutdown() {
        let boundary = Boundary::new();
        let mut task = SandboxTask::new(&boundary, &KernelConfig::DEFAULT).unwrap();
        assert_eq!(task.shutdown(&mut Recorder::default()), Terminated::Exited);
    }
}
