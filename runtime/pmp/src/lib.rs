//! Warden PMP - region table, encoder and protection configurator
//!
//! # Purpose
//! Describes the memory protection policy of a dual-privilege RISC-V part as
//! an ordered table of regions, encodes each region into the form the
//! Physical Memory Protection unit expects, and programs the unit at boot.
//!
//! # Integration Points
//! - Depends on: nothing beyond `core`/`alloc`
//! - Provides to: `warden-kernel` (hardware and simulated protection units),
//!   `warden-sim` (register dumps, TOML region tables)
//!
//! # Architecture
//! - [`region`]: descriptors, the default table and the board memory map
//! - [`encode`]: pure descriptor → `pmpaddr`/`pmpcfg` translation
//! - [`registers`]: the CSR seam ([`PmpRegisters`]) and a faithful host
//!   model ([`SimulatedPmp`])
//! - [`configurator`]: clear, program and verify
//!
//! # Testing Strategy
//! Unit tests cover encoding edge cases and lock semantics; the integration
//! tests sweep NAPOT geometry exhaustively and compare the programmed unit
//! against a descriptor-level reference for overlapping tables.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

use thiserror::Error;

pub mod configurator;
pub mod encode;
pub mod region;
pub mod registers;

pub use configurator::{configure, plan};
pub use encode::{encode, encode_region, pack_cfg, CfgOctet, EncodedEntry, PmpCfg, NAPOT_MIN_SIZE};
pub use region::{governing_region, layout, AddressMode, Permissions, PhysAddr, RegionDescriptor, DEFAULT_REGIONS};
pub use registers::{AccessType, PmpDump, PmpRegisters, PrivilegeLevel, SimulatedPmp, PMPCFG_REGISTERS, PMP_ENTRIES};

/// Region table errors
///
/// All of these are fatal at boot: the device must not run untrusted code
/// under a partially applied policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// NAPOT size is not a power of two
    #[error("NAPOT size {size:#x} is not a power of two")]
    NotPowerOfTwo { size: u32 },

    /// NAPOT size below the 8-byte encoding minimum
    #[error("NAPOT size {size} is below the {} byte minimum", NAPOT_MIN_SIZE)]
    TooSmall { size: u32 },

    /// Base address not a multiple of the region size
    #[error("base {base:#010x} is not aligned to {align:#x}")]
    Misaligned { base: PhysAddr, align: u32 },

    /// TOR region whose end is not word aligned
    #[error("TOR end {end:#x} is not word aligned")]
    UnalignedEnd { end: u64 },

    /// Region runs past the top of the 32-bit address space
    #[error("region {base:#010x}+{size:#x} runs past the 4 GiB address space")]
    AddressOverflow { base: PhysAddr, size: u32 },

    /// TOR region whose base disagrees with the previous entry
    #[error("TOR entry {index} starts at {expected:#010x} but descriptor base is {found:#010x}")]
    TorBaseMismatch { index: usize, expected: u64, found: PhysAddr },

    /// Table larger than the protection unit
    #[error("region table has {count} entries but the unit has {capacity}")]
    TooManyRegions { count: usize, capacity: usize },

    /// Entry locked by an earlier configuration refused the new value
    #[error("PMP entry {index} is locked and did not accept the new configuration")]
    LockedEntryConflict { index: usize },
}

pub type Result<T> = core::result::Result<T, ConfigurationError>;
