//! Region encoder
//!
//! Pure translation between [`RegionDescriptor`]s and the two pieces of
//! state the protection unit holds per entry: the `pmpaddr` register value
//! and the `pmpcfg` octet.

use bitflags::bitflags;

use crate::region::{AddressMode, Permissions, PhysAddr, RegionDescriptor};
use crate::{ConfigurationError, Result};

/// Smallest range a NAPOT entry can express
pub const NAPOT_MIN_SIZE: u32 = 8;

bitflags! {
    /// Layout of one `pmpcfg` octet
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PmpCfg: u8 {
        const R = 1 << 0;
        const W = 1 << 1;
        const X = 1 << 2;
        const A_TOR = 1 << 3;
        const A_NA4 = 1 << 4;
        const A_NAPOT = Self::A_TOR.bits() | Self::A_NA4.bits();
        const L = 1 << 7;
    }
}

/// Decoded view of a `pmpcfg` octet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgOctet {
    pub mode: AddressMode,
    pub permissions: Permissions,
    pub locked: bool,
}

impl CfgOctet {
    pub const OFF: Self = Self {
        mode: AddressMode::Disabled,
        permissions: Permissions::empty(),
        locked: false,
    };

    pub const fn from_bits(octet: u8) -> Self {
        Self {
            mode: AddressMode::from_field((octet >> 3) & 0b11),
            permissions: Permissions::from_bits_truncate(octet),
            locked: octet & PmpCfg::L.bits() != 0,
        }
    }

    pub const fn bits(self) -> u8 {
        pack_cfg(self.mode, self.permissions, self.locked)
    }
}

/// Pack mode, permissions and lock bit into a `pmpcfg` octet
pub const fn pack_cfg(mode: AddressMode, permissions: Permissions, locked: bool) -> u8 {
    let mut octet = permissions.bits() | ((mode as u8) << 3);
    if locked {
        octet |= PmpCfg::L.bits();
    }
    octet
}

/// Encode a range into its `pmpaddr` representation
///
/// # Arguments
/// * `base` - First byte of the region
/// * `size` - Region length in bytes
/// * `mode` - Address-matching mode
///
/// # Errors
/// * NAPOT: `NotPowerOfTwo`, `TooSmall` or `Misaligned` when `size` is not a
///   power of two of at least 8 bytes with `base` a multiple of it
/// * TOR: `UnalignedEnd` when `base + size` is not word aligned,
///   `AddressOverflow` when it lies beyond 4 GiB
/// * NA4: `Misaligned` when `base` is not word aligned
///
/// NA4 entries always cover 4 bytes, so `size` is ignored. Disabled entries
/// encode `base >> 2` without checks.
pub fn encode_region(base: PhysAddr, size: u32, mode: AddressMode) -> Result<u32> {
    match mode {
        AddressMode::NaturallyAlignedPow2 => {
            if !size.is_power_of_two() {
                return Err(ConfigurationError::NotPowerOfTwo { size });
            }
            if size < NAPOT_MIN_SIZE {
                return Err(ConfigurationError::TooSmall { size });
            }
            if base % size != 0 {
                return Err(ConfigurationError::Misaligned { base, align: size });
            }
            Ok((base >> 2) | ((size >> 3) - 1))
        }
        AddressMode::TopOfRange => {
            let end = base as u64 + size as u64;
            if end > 1 << 32 {
                return Err(ConfigurationError::AddressOverflow { base, size });
            }
            if end % 4 != 0 {
                return Err(ConfigurationError::UnalignedEnd { end });
            }
            Ok((end >> 2) as u32)
        }
        AddressMode::Aligned4 => {
            if base % 4 != 0 {
                return Err(ConfigurationError::Misaligned { base, align: 4 });
            }
            Ok(base >> 2)
        }
        AddressMode::Disabled => Ok(base >> 2),
    }
}

/// Register state for one programmed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedEntry {
    pub pmpaddr: u32,
    pub cfg: u8,
}

/// Encode a full descriptor
pub fn encode(region: &RegionDescriptor) -> Result<EncodedEntry> {
    Ok(EncodedEntry {
        pmpaddr: encode_region(region.base, region.size, region.mode)?,
        cfg: pack_cfg(region.mode, region.permissions, region.locked),
    })
}

/// Byte range `[start, end)` an entry matches, as the hardware sees it
///
/// `previous` is the raw `pmpaddr` of the entry below (0 for entry 0), used
/// as the bottom of TOR ranges. Returns `None` for entries that match
/// nothing.
pub fn decode_range(mode: AddressMode, pmpaddr: u32, previous: u32) -> Option<(u64, u64)> {
    match mode {
        AddressMode::Disabled => None,
        AddressMode::TopOfRange => {
            let start = (previous as u64) << 2;
            let end = (pmpaddr as u64) << 2;
            (start < end).then_some((start, end))
        }
        AddressMode::Aligned4 => {
            let start = (pmpaddr as u64) << 2;
            Some((start, start + 4))
        }
        AddressMode::NaturallyAlignedPow2 => {
            let ones = pmpaddr.trailing_ones() as u64;
            let size = 1u64 << (ones + 3);
            let mask = (1u64 << ones) - 1;
            let start = ((pmpaddr as u64) & !mask) << 2;
            Some((start, start + size))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_napot_matches_reference_formula() {
        // (start + (size - 1) / 2) >> 2 is the other common spelling
        for (base, size) in [(0x1000_0000u32, 0x1_0000u32), (0x2008_4000, 256), (0x8000, 8)] {
            let expected = (base + (size - 1) / 2) >> 2;
            assert_eq!(encode_region(base, size, AddressMode::NaturallyAlignedPow2), Ok(expected));
        }
    }

    #[test]
    fn test_napot_rejects_bad_geometry() {
        assert_eq!(
            encode_region(0x2000, 0x300, AddressMode::NaturallyAlignedPow2),
            Err(ConfigurationError::NotPowerOfTwo { size: 0x300 })
        );
        assert_eq!(
            encode_region(0x2100, 0x200, AddressMode::NaturallyAlignedPow2),
            Err(ConfigurationError::Misaligned { base: 0x2100, align: 0x200 })
        );
        assert_eq!(
            encode_region(0x2000, 4, AddressMode::NaturallyAlignedPow2),
            Err(ConfigurationError::TooSmall { size: 4 })
        );
        assert!(encode_region(0, 0, AddressMode::NaturallyAlignedPow2).is_err());
    }

    #[test]
    fn test_na4_has_no_size_check() {
        assert_eq!(encode_region(0x4001_4000, 0, AddressMode::Aligned4), Ok(0x1000_5000));
        assert_eq!(encode_region(0x4001_4000, 4096, AddressMode::Aligned4), Ok(0x1000_5000));
    }

    #[test]
    fn test_na4_rejects_unaligned_base() {
        assert_eq!(
            encode_region(0x4001_4002, 4, AddressMode::Aligned4),
            Err(ConfigurationError::Misaligned { base: 0x4001_4002, align: 4 })
        );
        assert_eq!(encode_region(0x4001_4004, 4, AddressMode::Aligned4), Ok(0x1000_5001));
    }

    #[test]
    fn test_tor_encodes_top() {
        assert_eq!(encode_region(0x1000, 0x1000, AddressMode::TopOfRange), Ok(0x800));
        assert_eq!(
            encode_region(0x1000, 0x3, AddressMode::TopOfRange),
            Err(ConfigurationError::UnalignedEnd { end: 0x1003 })
        );
        // top of the address space is representable
        assert_eq!(encode_region(0xFFFF_F000, 0x1000, AddressMode::TopOfRange), Ok(0x4000_0000));
    }

    #[test]
    fn test_tor_rejects_end_past_address_space() {
        assert_eq!(
            encode_region(0xFFFF_F000, 0x2000, AddressMode::TopOfRange),
            Err(ConfigurationError::AddressOverflow { base: 0xFFFF_F000, size: 0x2000 })
        );
        assert_eq!(
            encode_region(0xFFFF_FFFC, 8, AddressMode::TopOfRange),
            Err(ConfigurationError::AddressOverflow { base: 0xFFFF_FFFC, size: 8 })
        );
    }

    #[test]
    fn test_pack_cfg_layout() {
        assert_eq!(pack_cfg(AddressMode::NaturallyAlignedPow2, Permissions::RX, false), 0x1D);
        assert_eq!(pack_cfg(AddressMode::NaturallyAlignedPow2, Permissions::empty(), true), 0x98);
        assert_eq!(pack_cfg(AddressMode::TopOfRange, Permissions::RW, false), 0x0B);
        assert_eq!(pack_cfg(AddressMode::Aligned4, Permissions::READ, false), 0x11);

        let octet = CfgOctet::from_bits(0x9B);
        assert_eq!(octet.mode, AddressMode::NaturallyAlignedPow2);
        assert_eq!(octet.permissions, Permissions::RW);
        assert!(octet.locked);
        assert_eq!(octet.bits(), 0x9B);
    }

    #[test]
    fn test_decode_range_inverts_napot() {
        let pmpaddr = encode_region(0x2008_2000, 4096, AddressMode::NaturallyAlignedPow2).unwrap();
        assert_eq!(
            decode_range(AddressMode::NaturallyAlignedPow2, pmpaddr, 0),
            Some((0x2008_2000, 0x2008_3000))
        );
    }

    #[test]
    fn test_decode_range_tor_uses_previous() {
        assert_eq!(decode_range(AddressMode::TopOfRange, 0x800, 0x400), Some((0x1000, 0x2000)));
        assert_eq!(decode_range(AddressMode::TopOfRange, 0x400, 0x800), None);
        assert_eq!(decode_range(AddressMode::Disabled, 0x400, 0), None);
    }
}
