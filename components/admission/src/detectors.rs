//! Category detectors
//!
//! Each detector is a pure function of the buffer (plus the configured
//! maximum length where relevant) and returns a score clamped to 100.
//! Pattern matching is case-sensitive and byte-wise over the whole buffer,
//! so embedded NULs do not end the scan.

/// Per-category ceiling
pub const CATEGORY_MAX: u8 = 100;

/// SQL-style keywords, +15 each when present
pub const INJECTION_KEYWORDS: [&[u8]; 9] = [
    b"SELECT",
    b"DROP",
    b"INSERT",
    b"DELETE",
    b"UPDATE",
    b"UNION",
    b"OR 1=1",
    b"'; --",
    b"admin'--",
];

/// Shell / process invocation fragments, +20 each when present
pub const CODE_PATTERNS: [&[u8]; 14] = [
    b"system(",
    b"exec(",
    b"eval(",
    b"import os",
    b"__import__",
    b"subprocess",
    b"cmd.exe",
    b"/bin/sh",
    b"$(",
    b"${",
    b"`",
    b"&&",
    b"||",
    b";bash",
];

/// Format-string tokens, +10 per occurrence
pub const FORMAT_TOKENS: [&[u8]; 5] = [b"%n", b"%s", b"%x", b"%p", b"%d"];

const INJECTION_WEIGHT: u32 = 15;
const CODE_WEIGHT: u32 = 20;
const FORMAT_WEIGHT: u32 = 10;
const REPEAT_RUN_LIMIT: usize = 10;

fn clamp(score: u32) -> u8 {
    score.min(CATEGORY_MAX as u32) as u8
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Occurrences of `needle`, overlapping ones included
fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|window| *window == needle).count()
}

fn presence_score(buffer: &[u8], patterns: &[&[u8]], weight: u32) -> u8 {
    let hits = patterns.iter().filter(|pattern| contains(buffer, pattern)).count() as u32;
    clamp(hits * weight)
}

/// Injection-keyword score
pub fn injection_keywords(buffer: &[u8]) -> u8 {
    presence_score(buffer, &INJECTION_KEYWORDS, INJECTION_WEIGHT)
}

/// Code-execution-pattern score
pub fn code_patterns(buffer: &[u8]) -> u8 {
    presence_score(buffer, &CODE_PATTERNS, CODE_WEIGHT)
}

/// Longest run of one repeated byte value
pub fn longest_run(buffer: &[u8]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for &byte in buffer {
        current = if previous == Some(byte) { current + 1 } else { 1 };
        longest = longest.max(current);
        previous = Some(byte);
    }
    longest
}

/// Overflow-pattern score
///
/// +30 over `max_len`, +25 for a run longer than 10, +15 per NUL byte.
pub fn overflow_patterns(buffer: &[u8], max_len: usize) -> u8 {
    let mut score = 0u32;
    if buffer.len() > max_len {
        score += 30;
    }
    if longest_run(buffer) > REPEAT_RUN_LIMIT {
        score += 25;
    }
    let nuls = buffer.iter().filter(|&&b| b == 0).count() as u32;
    clamp(score.saturating_add(nuls.saturating_mul(15)))
}

/// Format-string-pattern score
pub fn format_tokens(buffer: &[u8]) -> u8 {
    let hits: usize = FORMAT_TOKENS.iter().map(|token| occurrences(buffer, token)).sum();
    clamp((hits as u32).saturating_mul(FORMAT_WEIGHT))
}

/// Printable ASCII, or one of the whitespace controls a text line may carry
fn is_benign(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E | b'\n' | b'\r' | b'\t')
}

/// Shellcode-pattern score
///
/// +40 when more than 30% of the bytes are non-printable (anything outside
/// printable ASCII other than `\n`, `\r`, `\t`), +30 for more than three
/// literal `\x` escapes.
pub fn shellcode_patterns(buffer: &[u8]) -> u8 {
    let non_printable = buffer.iter().filter(|&&b| !is_benign(b)).count();
    let escapes = occurrences(buffer, b"\\x");

    let mut score = 0u32;
    // non_printable / len > 0.3 without floating point
    if non_printable * 10 > buffer.len() * 3 {
        score += 40;
    }
    if escapes > 3 {
        score += 30;
    }
    clamp(score)
}

/// Shannon entropy of the byte histogram, in bits per byte
pub fn shannon_entropy(buffer: &[u8]) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }

    let mut histogram = [0u32; 256];
    for &byte in buffer {
        histogram[byte as usize] += 1;
    }

    let len = buffer.len() as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * libm::log2(p)
        })
        .sum()
}

/// Entropy score: 30 above 7.5 bits, 15 above 7.0 bits
pub fn entropy(buffer: &[u8]) -> u8 {
    let bits = shannon_entropy(buffer);
    if bits > 7.5 {
        30
    } else if bits > 7.0 {
        15
    } else {
        0
    }
}

/// Suspicious-length flag
pub fn suspicious_length(buffer: &[u8], max_len: usize) -> u8 {
    if buffer.len() > max_len {
        20
    } else {
        0
    }
}

/// ASCII control characters other than `\n`, `\r`, `\t`
pub fn control_characters(buffer: &[u8]) -> usize {
    buffer
        .iter()
        .filter(|&&b| (b < 0x20 || b == 0x7F) && !matches!(b, b'\n' | b'\r' | b'\t'))
        .count()
}
