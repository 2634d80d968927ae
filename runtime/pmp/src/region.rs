//! Region descriptors and the default protection table
//!
//! A region table is an ordered list of [`RegionDescriptor`]s. Order is
//! significant: the lowest-index region containing an address governs it,
//! which is how the hardware resolves overlapping PMP entries.

use alloc::borrow::Cow;
use bitflags::bitflags;

/// Physical address on an RV32 part
pub type PhysAddr = u32;

bitflags! {
    /// Access permissions granted by a region
    ///
    /// Bit positions match the R/W/X bits of a `pmpcfg` octet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct Permissions: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;

        const RX = Self::READ.bits() | Self::EXECUTE.bits();
        const RW = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// How a region's address range is expressed to the protection unit
///
/// Discriminants are the values of the `A` field of a `pmpcfg` octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum AddressMode {
    /// Entry matches nothing
    Disabled = 0,
    /// Range is `[previous entry's address, this entry's address)`
    TopOfRange = 1,
    /// Single naturally aligned 4-byte word
    Aligned4 = 2,
    /// Naturally aligned power-of-two range of at least 8 bytes
    #[cfg_attr(feature = "serde", serde(alias = "napot"))]
    NaturallyAlignedPow2 = 3,
}

impl AddressMode {
    /// Decode the `A` field (already shifted down to bits 0..1)
    pub const fn from_field(field: u8) -> Self {
        match field & 0b11 {
            0 => Self::Disabled,
            1 => Self::TopOfRange,
            2 => Self::Aligned4,
            _ => Self::NaturallyAlignedPow2,
        }
    }

    /// Short mnemonic used in register dumps
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Disabled => "OFF",
            Self::TopOfRange => "TOR",
            Self::Aligned4 => "NA4",
            Self::NaturallyAlignedPow2 => "NAPOT",
        }
    }
}

/// One protection region
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionDescriptor {
    /// Human-readable name, used only in logs and dumps
    pub label: Cow<'static, str>,
    pub base: PhysAddr,
    pub size: u32,
    pub mode: AddressMode,
    #[cfg_attr(feature = "serde", serde(default = "Permissions::empty"))]
    pub permissions: Permissions,
    /// Locked entries also bind Trusted accesses and cannot be rewritten
    /// until device reset
    #[cfg_attr(feature = "serde", serde(default))]
    pub locked: bool,
}

impl RegionDescriptor {
    /// Build a NAPOT descriptor (the common case for the memory map)
    pub const fn napot(
        label: &'static str,
        base: PhysAddr,
        size: u32,
        permissions: Permissions,
        locked: bool,
    ) -> Self {
        Self {
            label: Cow::Borrowed(label),
            base,
            size,
            mode: AddressMode::NaturallyAlignedPow2,
            permissions,
            locked,
        }
    }

    /// Exclusive end of the range as a 64-bit value (never overflows)
    pub const fn end(&self) -> u64 {
        self.base as u64 + self.size as u64
    }

    /// Exclusive end of the range the hardware actually matches
    ///
    /// An NA4 entry covers exactly the word at `base` whatever `size` says.
    pub const fn matched_end(&self) -> u64 {
        match self.mode {
            AddressMode::Aligned4 => self.base as u64 + 4,
            _ => self.end(),
        }
    }

    /// Whether `address` lies in the range the entry matches
    ///
    /// `[base, base + size)`, or `[base, base + 4)` for NA4. Disabled regions
    /// contain nothing.
    pub const fn contains(&self, address: PhysAddr) -> bool {
        if matches!(self.mode, AddressMode::Disabled) {
            return false;
        }
        let address = address as u64;
        address >= self.base as u64 && address < self.matched_end()
    }
}

/// Lowest-index region of `table` containing `address`
///
/// Descriptor-level reference for what the programmed unit must decide.
pub fn governing_region(table: &[RegionDescriptor], address: PhysAddr) -> Option<(usize, &RegionDescriptor)> {
    table.iter().enumerate().find(|(_, region)| region.contains(address))
}

/// Memory map of the reference board
pub mod layout {
    use super::PhysAddr;

    pub const KERNEL_FLASH_BASE: PhysAddr = 0x1000_0000;
    pub const KERNEL_FLASH_SIZE: u32 = 64 * 1024;

    pub const KERNEL_RAM_BASE: PhysAddr = 0x2008_0000;
    pub const KERNEL_RAM_SIZE: u32 = 4 * 1024;

    pub const SANDBOX_FLASH_BASE: PhysAddr = 0x1001_0000;
    pub const SANDBOX_FLASH_SIZE: u32 = 16 * 1024;

    pub const SANDBOX_RAM_BASE: PhysAddr = 0x2008_2000;
    pub const SANDBOX_RAM_SIZE: u32 = 4 * 1024;

    pub const SHARED_IPC_BASE: PhysAddr = 0x2008_4000;
    pub const SHARED_IPC_SIZE: u32 = 256;

    /// GPIO block; deliberately absent from the table so Untrusted access
    /// is denied
    pub const PERIPH_GPIO_BASE: PhysAddr = 0x4001_4000;
}

/// Default protection table for the reference board
///
/// The two kernel deny regions come first so they shadow anything later
/// entries might accidentally overlap.
pub static DEFAULT_REGIONS: [RegionDescriptor; 5] = [
    RegionDescriptor::napot(
        "Kernel_Flash_Deny",
        layout::KERNEL_FLASH_BASE,
        layout::KERNEL_FLASH_SIZE,
        Permissions::empty(),
        false,
    ),
    RegionDescriptor::napot(
        "Kernel_RAM_Deny",
        layout::KERNEL_RAM_BASE,
        layout::KERNEL_RAM_SIZE,
        Permissions::empty(),
        false,
    ),
    RegionDescriptor::napot(
        "Sandbox_Code",
        layout::SANDBOX_FLASH_BASE,
        layout::SANDBOX_FLASH_SIZE,
        Permissions::RX,
        false,
    ),
    RegionDescriptor::napot(
        "Sandbox_Data",
        layout::SANDBOX_RAM_BASE,
        layout::SANDBOX_RAM_SIZE,
        Permissions::RW,
        false,
    ),
    RegionDescriptor::napot(
        "Shared_IPC",
        layout::SHARED_IPC_BASE,
        layout::SHARED_IPC_SIZE,
        Permissions::RW,
        false,
    ),
];
