//! Integration tests for warden-pmp
//!
//! These exercise the public API the kernel uses at boot: encode a table,
//! program a unit, ask it for decisions.

use std::borrow::Cow;

use warden_pmp::*;

/// Small deterministic generator so table sweeps are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }
}

/// NAPOT encoding succeeds exactly for power-of-two sizes (at least 8 bytes)
/// on size-aligned bases
#[test]
fn test_napot_encodes_iff_pow2_and_aligned() {
    let bases = [0u32, 0x8, 0x10, 0x100, 0x1000, 0x1008, 0x2008_0000, 0x2008_2000, 0x2008_4100, 0xFFFF_FF00];
    for size in 8u32..=0x2000 {
        for &base in &bases {
            let valid = size.is_power_of_two() && base % size == 0;
            let result = encode_region(base, size, AddressMode::NaturallyAlignedPow2);
            assert_eq!(result.is_ok(), valid, "base={:#x} size={:#x}", base, size);
        }
    }

    for shift in 3..32 {
        let size = 1u32 << shift;
        assert!(encode_region(0, size, AddressMode::NaturallyAlignedPow2).is_ok());
        assert!(encode_region(size / 2, size, AddressMode::NaturallyAlignedPow2).is_err());
    }
}

/// The lowest-index descriptor containing an address decides it; an address
/// outside every descriptor is denied to Untrusted code
#[test]
fn test_programmed_unit_matches_descriptor_precedence() {
    let mut rng = Lcg(0x5eed);
    let perms = [
        Permissions::empty(),
        Permissions::READ,
        Permissions::RW,
        Permissions::RX,
        Permissions::all(),
    ];

    for _ in 0..64 {
        let count = 1 + (rng.next() % 8) as usize;
        let table: Vec<RegionDescriptor> = (0..count)
            .map(|_| {
                let size = 1u32 << (3 + rng.next() % 10);
                let base = (rng.next() % 0x40) * size;
                RegionDescriptor::napot("r", base, size, perms[(rng.next() % 5) as usize], false)
            })
            .collect();

        let mut pmp = SimulatedPmp::new();
        configure(&mut pmp, &table).expect("generated tables are valid");

        for _ in 0..256 {
            let address = rng.next() % 0x4_0000;
            for access in [AccessType::Read, AccessType::Write, AccessType::Execute] {
                let expected = governing_region(&table, address)
                    .map(|(_, region)| region.permissions.contains(access.permission()))
                    .unwrap_or(false);
                assert_eq!(
                    pmp.decide(address, access, PrivilegeLevel::Untrusted),
                    expected,
                    "address={:#x} access={:?}",
                    address,
                    access
                );
            }
        }
    }
}

/// A TOR entry after a NAPOT entry uses the NAPOT entry's raw address
/// register as its bottom, which the configurator validates
#[test]
fn test_mixed_modes_program_and_decide() {
    let table = vec![
        RegionDescriptor {
            label: Cow::Borrowed("low"),
            base: 0,
            size: 0x1000,
            mode: AddressMode::TopOfRange,
            permissions: Permissions::READ,
            locked: false,
        },
        RegionDescriptor {
            label: Cow::Borrowed("word"),
            base: 0x1000,
            size: 4,
            mode: AddressMode::Aligned4,
            permissions: Permissions::RW,
            locked: false,
        },
        RegionDescriptor {
            label: Cow::Borrowed("next"),
            base: 0x1000,
            size: 0x1000,
            mode: AddressMode::TopOfRange,
            permissions: Permissions::RX,
            locked: false,
        },
    ];

    let mut pmp = SimulatedPmp::new();
    configure(&mut pmp, &table).unwrap();
    let user = PrivilegeLevel::Untrusted;

    assert!(pmp.decide(0x0FFC, AccessType::Read, user));
    assert!(!pmp.decide(0x0FFC, AccessType::Write, user));
    assert!(pmp.decide(0x1002, AccessType::Write, user));
    assert!(pmp.decide(0x1004, AccessType::Execute, user));
    assert!(!pmp.decide(0x1004, AccessType::Write, user));
    assert!(!pmp.decide(0x2000, AccessType::Read, user));
}

/// An NA4 descriptor governs one word even when its size field says more,
/// so the descriptor reference and the programmed unit agree
#[test]
fn test_na4_descriptor_agrees_with_unit() {
    let table = vec![RegionDescriptor {
        label: Cow::Borrowed("word"),
        base: 0x1000,
        size: 0x100,
        mode: AddressMode::Aligned4,
        permissions: Permissions::RW,
        locked: false,
    }];

    let mut pmp = SimulatedPmp::new();
    configure(&mut pmp, &table).unwrap();

    for address in [0x0FFC, 0x1000, 0x1003, 0x1004, 0x1010, 0x10FC] {
        let expected = governing_region(&table, address).is_some();
        assert_eq!(
            pmp.decide(address, AccessType::Read, PrivilegeLevel::Untrusted),
            expected,
            "address={:#x}",
            address
        );
    }
    assert!(governing_region(&table, 0x1000).is_some());
    assert!(governing_region(&table, 0x1010).is_none());
}

/// Locked regions bind the monitor too and survive reconfiguration
#[test]
fn test_locked_region_binds_trusted_until_reset() {
    let mut table = DEFAULT_REGIONS.to_vec();
    table[1].locked = true;

    let mut pmp = SimulatedPmp::new();
    configure(&mut pmp, &table).unwrap();
    assert!(!pmp.decide(layout::KERNEL_RAM_BASE, AccessType::Read, PrivilegeLevel::Trusted));
    assert!(pmp.decide(layout::KERNEL_FLASH_BASE, AccessType::Read, PrivilegeLevel::Trusted));

    let mut relaxed = table.clone();
    relaxed[1].permissions = Permissions::RW;
    assert_eq!(
        configure(&mut pmp, &relaxed),
        Err(ConfigurationError::LockedEntryConflict { index: 1 })
    );
    assert!(!pmp.decide(layout::KERNEL_RAM_BASE, AccessType::Read, PrivilegeLevel::Untrusted));

    pmp.reset();
    configure(&mut pmp, &relaxed).unwrap();
    assert!(pmp.decide(layout::KERNEL_RAM_BASE, AccessType::Read, PrivilegeLevel::Untrusted));
}
