//! Trap dispatcher
//!
//! Every trap from the sandbox lands here with its [`TrapFrame`]. The cause
//! is decoded into a [`TrapEvent`] and routed:
//!
//! ```text
//!            +----------+
//!  trap ---> | Dispatch |
//!            +----------+
//!             |   |    \
//!     ecall U |   |     \ interrupt / other exception
//!             v   |      v
//!      +---------+| +-----------+
//!      | Syscall || | Unhandled | -> halt
//!      +---------+| +-----------+
//!        |   |    | access fault
//!        |   |    v
//!        |   | +-------+
//!        |   +>| Fault | -> contain (restart sandbox) or halt
//!        |     +-------+
//!        v
//!    resume at mepc + 4
//! ```
//!
//! The dispatcher never returns to the instruction that faulted.

use core::fmt;

use crate::arch::context::TrapFrame;
use crate::arch::{cause, mstatus};
use crate::config::FaultPolicy;
use crate::error::{SecurityViolation, UnhandledTrap, WardenError};
use crate::syscall::{self, BlockCipher, Gateway, GatewayOutcome, UserMemory};

/// Width of the `ecall` instruction
const ECALL_LEN: u32 = 4;

/// Access kind of a protection fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Instruction fetch
    Fetch,
    Load,
    Store,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Load => "load",
            Self::Store => "store",
        })
    }
}

/// Decoded trap cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapEvent {
    /// `ecall` from the sandbox
    Syscall { id: u32, arg: u32, pc: u32 },
    /// PMP denied an access
    Fault { kind: FaultKind, address: u32, pc: u32 },
    /// Anything the kernel has no handler for
    Unknown { interrupt: bool, code: u32, pc: u32 },
}

impl TrapEvent {
    pub fn decode(frame: &TrapFrame) -> Self {
        let pc = frame.mepc;
        if frame.is_interrupt() {
            return Self::Unknown {
                interrupt: true,
                code: frame.exception_code(),
                pc,
            };
        }

        let fault = |kind| Self::Fault {
            kind,
            address: frame.mtval,
            pc,
        };
        match frame.exception_code() {
            cause::ECALL_FROM_USER => Self::Syscall {
                id: frame.syscall_number(),
                arg: frame.syscall_arg(),
                pc,
            },
            cause::INSTRUCTION_ACCESS_FAULT => fault(FaultKind::Fetch),
            cause::LOAD_ACCESS_FAULT => fault(FaultKind::Load),
            cause::STORE_ACCESS_FAULT => fault(FaultKind::Store),
            code => Self::Unknown {
                interrupt: false,
                code,
                pc,
            },
        }
    }
}

/// Dispatcher states, for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Dispatch,
    Syscall,
    Fault,
    Unhandled,
}

/// What the trap return path does next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// `mret` into the sandbox with the (possibly updated) frame
    Resume,
    /// Sandbox exited; park the context
    Exit,
    /// Violation contained: the frame now points at the sandbox entry and
    /// the caller must clear the sandbox data region before resuming
    Contain(SecurityViolation),
    /// Stop the device
    Halt(WardenError),
}

impl Disposition {
    /// Terminal dispatcher state that produced this disposition
    pub fn state(&self) -> DispatchState {
        match self {
            Self::Resume | Self::Exit => DispatchState::Syscall,
            Self::Contain(_) | Self::Halt(WardenError::SecurityViolation(_)) => DispatchState::Fault,
            Self::Halt(_) => DispatchState::Unhandled,
        }
    }
}

/// Routes traps to the gateway or the fault policy
pub struct Dispatcher<C: BlockCipher> {
    gateway: Gateway<C>,
    policy: FaultPolicy,
    restart_at: u32,
}

impl<C: BlockCipher> Dispatcher<C> {
    /// `restart_at` is where a contained sandbox starts over
    pub fn new(gateway: Gateway<C>, policy: FaultPolicy, restart_at: u32) -> Self {
        Self {
            gateway,
            policy,
            restart_at,
        }
    }

    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }

    /// Handle one trap
    ///
    /// On `Resume` the frame's `mepc` has been advanced past the `ecall`.
    /// On `Contain` it points at the sandbox entry with `MPP` set to User.
    pub fn dispatch<M: UserMemory>(&self, frame: &mut TrapFrame, memory: &mut M) -> Disposition {
        let event = TrapEvent::decode(frame);
        log::trace!("trap: {:?} -> {:?}", DispatchState::Dispatch, event);

        match event {
            TrapEvent::Syscall { id, arg, pc } => {
                let Some(entry) = syscall::lookup(id) else {
                    log::error!("unknown syscall {} at {:#010x}", id, pc);
                    return Disposition::Halt(WardenError::UnhandledTrapCause(
                        UnhandledTrap::UnknownSyscall { id, pc },
                    ));
                };

                match self.gateway.invoke(entry, arg, memory) {
                    Ok(GatewayOutcome::Completed) => {
                        frame.set_return_value(0);
                        frame.mepc = pc.wrapping_add(ECALL_LEN);
                        Disposition::Resume
                    }
                    Ok(GatewayOutcome::Exit) => {
                        log::info!("sandbox exited at {:#010x}", pc);
                        Disposition::Exit
                    }
                    Err(fault) => self.violation(
                        frame,
                        SecurityViolation {
                            kind: fault.kind,
                            address: fault.address,
                            pc,
                        },
                    ),
                }
            }
            TrapEvent::Fault { kind, address, pc } => {
                self.violation(frame, SecurityViolation { kind, address, pc })
            }
            TrapEvent::Unknown { interrupt, code, pc } => {
                log::error!("unhandled trap: interrupt={} code={} pc={:#010x}", interrupt, code, pc);
                let cause = if interrupt {
                    UnhandledTrap::Interrupt { code, pc }
                } else {
                    UnhandledTrap::Exception { code, pc }
                };
                Disposition::Halt(WardenError::UnhandledTrapCause(cause))
            }
        }
    }

    fn violation(&self, frame: &mut TrapFrame, violation: SecurityViolation) -> Disposition {
        log::warn!("security violation: {}", violation);
        match self.policy {
            FaultPolicy::Contain => {
                frame.mepc = self.restart_at;
                frame.mstatus = (frame.mstatus & !mstatus::MPP_MASK) | mstatus::MPP_USER | mstatus::MPIE;
                Disposition::Contain(violation)
            }
            FaultPolicy::Halt => Disposition::Halt(WardenError::SecurityViolation(violation)),
        }
    }
}
