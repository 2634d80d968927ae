//! Warden Admission Control - heuristic screening of untrusted payloads
//!
//! # Purpose
//! Scores a byte buffer from the untrusted side across several attack
//! pattern families and decides whether it may reach the privileged
//! encryption service.
//!
//! # Integration Points
//! - Depends on: `libm` (entropy), `log` (optional, `log` feature)
//! - Provides to: the sandbox task (advisory screening) and the trusted
//!   monitor (authoritative re-screen before a payload is posted)
//!
//! # Architecture
//! - [`detectors`]: independent, stateless category detectors
//! - [`profile`]: [`ThreatProfile`] aggregation and [`ThreatTags`]
//! - [`engine`]: [`AdmissionEngine`] and the accept/reject [`Verdict`]
//! - [`report`]: diagnostic line formats
//!
//! Everything here is a pure function of its input: the same buffer always
//! produces the same profile.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod detectors;
pub mod engine;
pub mod profile;
pub mod report;

pub use engine::{analyze, AdmissionEngine, Screening, Verdict};
pub use profile::{ThreatProfile, ThreatTags};
pub use report::{pad_block, DiagnosticLine, BLOCK_SIZE};

/// Default maximum accepted payload length
pub const MAX_INPUT_LENGTH: usize = 64;

/// Default rejection threshold (aggregate score out of 100)
pub const THREAT_SCORE_THRESHOLD: u8 = 50;

/// Engine limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AdmissionConfig {
    /// Payloads longer than this score as overflow / suspicious length
    pub max_input_length: usize,
    /// Aggregate score at or above which a payload is rejected
    pub threshold: u8,
}

impl AdmissionConfig {
    pub const DEFAULT: Self = Self {
        max_input_length: MAX_INPUT_LENGTH,
        threshold: THREAT_SCORE_THRESHOLD,
    };
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
