//! Threat profile and reason tags

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Categories that contributed to a profile
    ///
    /// Declaration order is the order tags are printed in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ThreatTags: u8 {
        const SQL_INJ = 1 << 0;
        const CODE_INJ = 1 << 1;
        const OVERFLOW = 1 << 2;
        const FMT_STR = 1 << 3;
        const SHELLCODE = 1 << 4;
        const HIGH_ENTROPY = 1 << 5;
        const LONG_INPUT = 1 << 6;
    }
}

impl fmt::Display for ThreatTags {
    /// Space-separated tag names, or `CLEAN` when empty
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("CLEAN");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Per-buffer scores, one field per detector
///
/// Every score is in `0..=100`. Control characters are kept as a raw count
/// and weighted only when aggregating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreatProfile {
    pub sql_injection: u8,
    pub code_injection: u8,
    pub overflow: u8,
    pub format_string: u8,
    pub shellcode: u8,
    pub entropy: u8,
    pub suspicious_length: u8,
    pub control_chars: usize,
}

impl ThreatProfile {
    /// Weight of a single control character in the aggregate
    pub const CONTROL_CHAR_WEIGHT: u32 = 5;

    /// Combined score, saturating at 100
    pub fn aggregate(&self) -> u8 {
        let categories = [
            self.sql_injection,
            self.code_injection,
            self.overflow,
            self.format_string,
            self.shellcode,
            self.entropy,
            self.suspicious_length,
        ];
        let sum: u32 = categories.iter().map(|&score| score as u32).sum();
        let control = (self.control_chars.min(u32::MAX as usize) as u32).saturating_mul(Self::CONTROL_CHAR_WEIGHT);
        sum.saturating_add(control).min(100) as u8
    }

    /// Tags for every category with a non-zero score
    pub fn tags(&self) -> ThreatTags {
        let mut tags = ThreatTags::empty();
        tags.set(ThreatTags::SQL_INJ, self.sql_injection > 0);
        tags.set(ThreatTags::CODE_INJ, self.code_injection > 0);
        tags.set(ThreatTags::OVERFLOW, self.overflow > 0);
        tags.set(ThreatTags::FMT_STR, self.format_string > 0);
        tags.set(ThreatTags::SHELLCODE, self.shellcode > 0);
        tags.set(ThreatTags::HIGH_ENTROPY, self.entropy > 0);
        tags.set(ThreatTags::LONG_INPUT, self.suspicious_length > 0);
        tags
    }
}
