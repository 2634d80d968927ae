//! Syscall gateway
//!
//! The only privileged service surface reachable from the sandbox. Each
//! operation is registered in [`SYSCALL_TABLE`] with the shape of its
//! argument; the dispatcher looks the id up and hands the entry to
//! [`Gateway::invoke`].
//!
//! Pointers from the sandbox are untrusted input. The gateway never
//! dereferences them directly: every copy goes through [`UserMemory`], which
//! applies the sandbox's own protection policy to the access. A buffer the
//! sandbox could not touch itself is a security violation here too.

pub mod cipher;
pub mod numbers;

use crate::trap::FaultKind;

pub use cipher::{BlockCipher, DeviceKey, BLOCK_LEN};

/// Access from the gateway to sandbox memory, checked against the
/// Untrusted policy
pub trait UserMemory {
    /// Copy `out.len()` bytes from sandbox address `addr`
    ///
    /// # Errors
    /// A `Load` fault at the first denied address; `out` is left untouched.
    fn copy_from_user(&mut self, addr: u32, out: &mut [u8]) -> Result<(), MemoryFault>;

    /// Copy `data` to sandbox address `addr`
    ///
    /// # Errors
    /// A `Store` fault if any byte is denied; nothing is written.
    fn copy_to_user(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryFault>;
}

/// Denied gateway access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryFault {
    pub kind: FaultKind,
    pub address: u32,
}

/// Argument contract of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// `a1` is ignored
    None,
    /// `a1` points at `len` bytes of sandbox memory
    Buffer { len: usize, writable: bool },
}

/// Privileged service behind an operation id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    EncryptBlock,
    Exit,
}

/// Registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallEntry {
    pub id: u32,
    pub name: &'static str,
    pub shape: ArgShape,
    pub service: Service,
}

/// Operations the sandbox may request
pub static SYSCALL_TABLE: [SyscallEntry; 2] = [
    SyscallEntry {
        id: numbers::SYS_ENCRYPT,
        name: "encrypt",
        shape: ArgShape::Buffer {
            len: BLOCK_LEN,
            writable: true,
        },
        service: Service::EncryptBlock,
    },
    SyscallEntry {
        id: numbers::SYS_EXIT,
        name: "exit",
        shape: ArgShape::None,
        service: Service::Exit,
    },
];

/// Registry lookup
pub fn lookup(id: u32) -> Option<&'static SyscallEntry> {
    SYSCALL_TABLE.iter().find(|entry| entry.id == id)
}

/// Result of a completed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Resume the sandbox after the `ecall`
    Completed,
    /// Sandbox asked to leave
    Exit,
}

/// Holder of the device secret and the services that use it
///
/// Only the expanded cipher state is kept; the raw key is consumed (and
/// wiped) by [`Gateway::new`].
pub struct Gateway<C: BlockCipher> {
    cipher: C,
}

impl<C: BlockCipher> Gateway<C> {
    pub fn new(key: DeviceKey) -> Self {
        Self {
            cipher: C::from_key(key.expose()),
        }
    }

    /// Run `entry` with argument `arg`
    ///
    /// # Errors
    /// The [`MemoryFault`] of a denied sandbox buffer access. Sandbox
    /// memory is unchanged when this happens.
    pub fn invoke<M: UserMemory>(
        &self,
        entry: &SyscallEntry,
        arg: u32,
        memory: &mut M,
    ) -> Result<GatewayOutcome, MemoryFault> {
        log::debug!("gateway: {} (arg {:#010x})", entry.name, arg);

        match entry.service {
            Service::Exit => Ok(GatewayOutcome::Exit),
            Service::EncryptBlock => {
                let mut block = [0u8; BLOCK_LEN];
                memory.copy_from_user(arg, &mut block)?;
                self.cipher.encrypt_block(&mut block);
                memory.copy_to_user(arg, &block)?;
                Ok(GatewayOutcome::Completed)
            }
        }
    }
}
