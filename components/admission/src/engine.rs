//! Admission decision

use crate::detectors;
use crate::profile::{ThreatProfile, ThreatTags};
use crate::AdmissionConfig;

/// Outcome of screening one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Payload may be forwarded to the gateway
    Accept,
    /// Payload must not reach the gateway
    Reject,
}

/// Profile, score and verdict for one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screening {
    pub profile: ThreatProfile,
    pub score: u8,
    pub verdict: Verdict,
}

impl Screening {
    pub fn tags(&self) -> ThreatTags {
        self.profile.tags()
    }

    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accept
    }
}

/// Stateless scoring engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionEngine {
    config: AdmissionConfig,
}

impl AdmissionEngine {
    pub const fn new(config: AdmissionConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Run every detector over `buffer`
    pub fn analyze(&self, buffer: &[u8]) -> ThreatProfile {
        let max_len = self.config.max_input_length;
        ThreatProfile {
            sql_injection: detectors::injection_keywords(buffer),
            code_injection: detectors::code_patterns(buffer),
            overflow: detectors::overflow_patterns(buffer, max_len),
            format_string: detectors::format_tokens(buffer),
            shellcode: detectors::shellcode_patterns(buffer),
            entropy: detectors::entropy(buffer),
            suspicious_length: detectors::suspicious_length(buffer, max_len),
            control_chars: detectors::control_characters(buffer),
        }
    }

    /// Analyze and decide: reject when the aggregate reaches the threshold
    pub fn screen(&self, buffer: &[u8]) -> Screening {
        let profile = self.analyze(buffer);
        let score = profile.aggregate();
        let verdict = if score >= self.config.threshold {
            Verdict::Reject
        } else {
            Verdict::Accept
        };
        #[cfg(feature = "log")]
        log::debug!("admission: {} bytes scored {} ({}) -> {:?}", buffer.len(), score, profile.tags(), verdict);
        Screening { profile, score, verdict }
    }
}

/// [`AdmissionEngine::analyze`] with the default configuration
pub fn analyze(buffer: &[u8]) -> ThreatProfile {
    AdmissionEngine::default().analyze(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        // two code patterns = 40, two control chars = 10
        let engine = AdmissionEngine::default();
        let screening = engine.screen(b"a && b || c\x01\x02");
        assert_eq!(screening.score, 50);
        assert_eq!(screening.verdict, Verdict::Reject);

        let screening = engine.screen(b"a && b || c\x01");
        assert_eq!(screening.score, 45);
        assert!(screening.is_accepted());
    }

    #[test]
    fn test_custom_limits() {
        let engine = AdmissionEngine::new(AdmissionConfig {
            max_input_length: 8,
            threshold: 90,
        });
        let screening = engine.screen(b"123456789");
        assert_eq!(screening.profile.suspicious_length, 20);
        assert_eq!(screening.profile.overflow, 30);
        assert!(screening.is_accepted());
    }
}
