//! Protection configurator
//!
//! Programs a region table into a [`PmpRegisters`] implementation at boot.
//! Programming is deterministic: the same table always produces the same
//! register state, and running it twice is the same as running it once.

use alloc::vec::Vec;

use crate::encode::{encode, CfgOctet, EncodedEntry};
use crate::region::RegionDescriptor;
use crate::registers::{PmpRegisters, PMPCFG_REGISTERS};
use crate::{ConfigurationError, Result};

/// Validate and encode a whole table without touching any register
///
/// # Errors
/// `TooManyRegions` if the table is larger than the unit, any encoding
/// error, or `TorBaseMismatch` when a TOR descriptor's base is not the
/// address its predecessor leaves behind.
pub fn plan(table: &[RegionDescriptor], capacity: usize) -> Result<Vec<EncodedEntry>> {
    if table.len() > capacity {
        return Err(ConfigurationError::TooManyRegions {
            count: table.len(),
            capacity,
        });
    }

    let mut entries: Vec<EncodedEntry> = Vec::with_capacity(table.len());
    for (index, region) in table.iter().enumerate() {
        let entry = encode(region).inspect_err(|err| {
            log::error!("PMP[{}] {}: {}", index, region.label, err);
        })?;

        if region.mode == crate::AddressMode::TopOfRange {
            let expected = entries.last().map_or(0, |prev| (prev.pmpaddr as u64) << 2);
            if region.base as u64 != expected {
                return Err(ConfigurationError::TorBaseMismatch {
                    index,
                    expected,
                    found: region.base,
                });
            }
        }

        entries.push(entry);
    }

    Ok(entries)
}

/// Program `table` into `regs`
///
/// 1. encode every descriptor (a defective table never reaches the unit)
/// 2. clear every entry to off
/// 3. program entries in table order, address before configuration
/// 4. read every programmed entry back
///
/// # Errors
/// Any [`plan`] error, or `LockedEntryConflict` when an entry locked by an
/// earlier configuration kept a different value.
pub fn configure<R: PmpRegisters>(regs: &mut R, table: &[RegionDescriptor]) -> Result<()> {
    let entries = plan(table, regs.entry_count())?;

    for reg in 0..PMPCFG_REGISTERS.min(regs.entry_count().div_ceil(4)) {
        regs.write_cfg(reg, 0);
    }
    for index in 0..regs.entry_count() {
        regs.write_addr(index, 0);
    }

    for (index, (region, entry)) in table.iter().zip(&entries).enumerate() {
        regs.write_addr(index, entry.pmpaddr);
        regs.write_octet(index, entry.cfg);

        log::info!(
            "PMP[{}] {}: {:#010x} - {:#010x} ({} bytes) {} {:?}{}",
            index,
            region.label,
            region.base,
            region.matched_end(),
            region.size,
            region.mode.mnemonic(),
            region.permissions,
            if region.locked { " locked" } else { "" },
        );
    }

    for (index, entry) in entries.iter().enumerate() {
        if regs.read_addr(index) != entry.pmpaddr || regs.read_octet(index) != entry.cfg {
            log::error!("PMP[{}] readback mismatch (entry locked by an earlier boot stage?)", index);
            return Err(ConfigurationError::LockedEntryConflict { index });
        }
    }

    // Stale entries beyond the table must read back as off as well
    for index in entries.len()..regs.entry_count() {
        if CfgOctet::from_bits(regs.read_octet(index)) != CfgOctet::OFF {
            return Err(ConfigurationError::LockedEntryConflict { index });
        }
    }

    Ok(())
}
