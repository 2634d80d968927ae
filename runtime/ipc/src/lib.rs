//! Shared Mailbox - sequenced handoff across the privilege boundary
//!
//! # Purpose
//! Carries one message at a time from the trusted monitor (producer) to the
//! sandboxed task (consumer) through a buffer that lives in the shared IPC
//! region, the only memory both privilege levels can touch.
//!
//! # Integration Points
//! - Depends on: nothing beyond `core`
//! - Provides to: `warden-kernel` monitor and sandbox loops
//! - Memory: the mailbox is `#[repr(C)]` so it can be placed in the shared
//!   region by the linker script
//!
//! # Architecture
//! Single-producer/single-consumer, lock-free. Two monotonically increasing
//! sequence counters replace a bare "ready" flag:
//! - `published`: sequence of the last message the producer wrote
//! - `consumed`: sequence of the last message the consumer copied out
//!
//! `published == consumed` means the slot is free. The producer refuses to
//! write while the slot is occupied, so an unread message is never
//! overwritten, and the consumer can tell a fresh message from a stale one
//! by its sequence number.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

use thiserror::Error;

pub mod mailbox;

pub use mailbox::{Consumer, Message, Producer, SharedMailbox};

/// IPC error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IpcError {
    /// Previous message has not been consumed yet
    #[error("mailbox busy: message {pending} not yet consumed")]
    Busy { pending: u32 },

    /// Payload does not fit the mailbox
    #[error("payload of {len} bytes exceeds mailbox capacity {capacity}")]
    TooLarge { len: usize, capacity: usize },

    /// Destination buffer too small for the pending message
    #[error("destination holds {available} bytes, message needs {needed}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Producer or consumer handle already handed out
    #[error("mailbox {side} handle already claimed")]
    AlreadyClaimed { side: &'static str },
}

pub type Result<T> = core::result::Result<T, IpcError>;
