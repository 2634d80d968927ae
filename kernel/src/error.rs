//! Kernel error taxonomy
//!
//! - configuration and transition errors are boot-time and fatal
//! - security violations are contained or halt, per [`crate::config::FaultPolicy`]
//! - unhandled trap causes always halt
//! - admission rejections are reported and the payload dropped

use thiserror::Error;
use warden_ipc::IpcError;
use warden_pmp::ConfigurationError;

use crate::trap::FaultKind;

/// Privilege transition precondition failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// No trap vector: the first trap from Untrusted code would be lost
    #[error("trap vector not installed")]
    TrapVectorMissing,

    /// This core already dropped privilege once since boot
    #[error("core already running an untrusted context")]
    AlreadyLowered,

    /// Only Trusted code can drop privilege
    #[error("privilege drop requested from untrusted mode")]
    NotTrusted,
}

/// An out-of-policy access by Untrusted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} access fault at {address:#010x} (pc {pc:#010x})")]
pub struct SecurityViolation {
    pub kind: FaultKind,
    pub address: u32,
    pub pc: u32,
}

/// Trap the dispatcher has no route for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnhandledTrap {
    #[error("interrupt {code} at pc {pc:#010x}")]
    Interrupt { code: u32, pc: u32 },

    #[error("exception {code} at pc {pc:#010x}")]
    Exception { code: u32, pc: u32 },

    #[error("unknown syscall {id} at pc {pc:#010x}")]
    UnknownSyscall { id: u32, pc: u32 },
}

/// Top-level kernel error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WardenError {
    #[error("protection configuration failed: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("privilege transition failed: {0}")]
    Transition(#[from] TransitionError),

    #[error("security violation: {0}")]
    SecurityViolation(SecurityViolation),

    #[error("unhandled trap: {0}")]
    UnhandledTrapCause(UnhandledTrap),

    #[error("payload rejected by admission control (score {score})")]
    AdmissionRejected { score: u8 },

    #[error("mailbox: {0}")]
    Mailbox(#[from] IpcError),
}

pub type Result<T> = core::result::Result<T, WardenError>;
