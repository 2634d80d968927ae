//! Diagnostic-channel line formats
//!
//! One line per decision. Lines are rendered without a terminator; the
//! transport appends CRLF.

use core::fmt;

use crate::profile::ThreatTags;

/// Size of the block handed to the encryption service
pub const BLOCK_SIZE: usize = 16;

/// A line on the diagnostic channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLine {
    /// Boot complete
    Ready,
    /// Payload refused by admission control
    Rejected { score: u8, tags: ThreatTags },
    /// Payload accepted and encrypted
    Processed {
        ciphertext: [u8; BLOCK_SIZE],
        score: u8,
        tags: ThreatTags,
    },
    /// The sandbox touched memory outside its policy
    RuntimeViolation,
}

impl fmt::Display for DiagnosticLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("SYSTEM_READY"),
            Self::Rejected { score, tags } => {
                write!(f, "THREAT_DETECTED|SCORE:{}|REASON:{}", score, tags)
            }
            Self::Processed { ciphertext, score, tags } => {
                f.write_str("DATA:")?;
                for byte in ciphertext {
                    write!(f, " {:02X}", byte)?;
                }
                write!(f, "|THREAT:{}|{}", score, tags)
            }
            Self::RuntimeViolation => f.write_str("SECURITY ALERT: RUNTIME MEMORY VIOLATION"),
        }
    }
}

impl DiagnosticLine {
    /// Encoded size on the sandbox-to-monitor mailbox: kind, score, tags,
    /// one cipher block
    pub const WIRE_LEN: usize = 3 + BLOCK_SIZE;

    const KIND_READY: u8 = 0;
    const KIND_REJECTED: u8 = 1;
    const KIND_PROCESSED: u8 = 2;
    const KIND_VIOLATION: u8 = 3;

    /// Fixed-size mailbox encoding
    pub fn to_wire(&self) -> [u8; Self::WIRE_LEN] {
        let mut wire = [0u8; Self::WIRE_LEN];
        match self {
            Self::Ready => wire[0] = Self::KIND_READY,
            Self::Rejected { score, tags } => {
                wire[0] = Self::KIND_REJECTED;
                wire[1] = *score;
                wire[2] = tags.bits();
            }
            Self::Processed { ciphertext, score, tags } => {
                wire[0] = Self::KIND_PROCESSED;
                wire[1] = *score;
                wire[2] = tags.bits();
                wire[3..].copy_from_slice(ciphertext);
            }
            Self::RuntimeViolation => wire[0] = Self::KIND_VIOLATION,
        }
        wire
    }

    /// Inverse of [`Self::to_wire`]; `None` for short or unknown records
    pub fn from_wire(wire: &[u8]) -> Option<Self> {
        if wire.len() < Self::WIRE_LEN {
            return None;
        }
        let score = wire[1];
        let tags = ThreatTags::from_bits(wire[2])?;
        match wire[0] {
            Self::KIND_READY => Some(Self::Ready),
            Self::KIND_REJECTED => Some(Self::Rejected { score, tags }),
            Self::KIND_PROCESSED => {
                let mut ciphertext = [0u8; BLOCK_SIZE];
                ciphertext.copy_from_slice(&wire[3..Self::WIRE_LEN]);
                Some(Self::Processed { ciphertext, score, tags })
            }
            Self::KIND_VIOLATION => Some(Self::RuntimeViolation),
            _ => None,
        }
    }
}

/// Space-pad and truncate `input` to one cipher block
pub fn pad_block(input: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut block = [b' '; BLOCK_SIZE];
    let len = input.len().min(BLOCK_SIZE);
    block[..len].copy_from_slice(&input[..len]);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_rejected_line() {
        let line = DiagnosticLine::Rejected {
            score: 75,
            tags: ThreatTags::OVERFLOW | ThreatTags::LONG_INPUT,
        };
        assert_eq!(line.to_string(), "THREAT_DETECTED|SCORE:75|REASON:OVERFLOW LONG_INPUT");
    }

    #[test]
    fn test_processed_line() {
        let mut ciphertext = [0u8; BLOCK_SIZE];
        ciphertext[0] = 0x39;
        ciphertext[15] = 0xAB;
        let line = DiagnosticLine::Processed {
            ciphertext,
            score: 0,
            tags: ThreatTags::empty(),
        };
        assert_eq!(
            line.to_string(),
            "DATA: 39 00 00 00 00 00 00 00 00 00 00 00 00 00 00 AB|THREAT:0|CLEAN"
        );
    }

    #[test]
    fn test_wire_rejects_garbage() {
        assert_eq!(DiagnosticLine::from_wire(&[2, 0, 0]), None);
        let mut wire = DiagnosticLine::RuntimeViolation.to_wire();
        wire[0] = 9;
        assert_eq!(DiagnosticLine::from_wire(&wire), None);
        wire[0] = 1;
        wire[2] = 0x80;
        assert_eq!(DiagnosticLine::from_wire(&wire), None);
    }

    #[test]
    fn test_wire_keeps_ciphertext() {
        let line = DiagnosticLine::Processed {
            ciphertext: *b"0123456789abcdef",
            score: 30,
            tags: ThreatTags::SQL_INJ,
        };
        assert_eq!(DiagnosticLine::from_wire(&line.to_wire()), Some(line));
    }

    #[test]
    fn test_pad_block() {
        assert_eq!(&pad_block(b"hi"), b"hi              ");
        assert_eq!(&pad_block(b"0123456789abcdefXYZ"), b"0123456789abcdef");
        assert_eq!(&pad_block(b""), b"                ");
    }
}
