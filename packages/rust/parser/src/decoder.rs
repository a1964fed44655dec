//! Source payload decoding.
//!
//! Turns one fetched payload into an ordered list of descriptor strings.
//! Whether the payload is base64-wrapped is decided by [`decode_payload`], a
//! pure function so both encodings can be tested without a network.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::b64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Descriptors extracted from one source payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Recognized descriptor lines, trimmed, in source order.
    pub descriptors: Vec<String>,
    /// Non-empty lines dropped because no known scheme prefix matched.
    pub skipped_lines: usize,
    /// Whether the payload was unwrapped from base64.
    pub was_base64: bool,
}

/// Why a payload contributed no descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("no recognizable node descriptors among {lines} non-empty line(s)")]
    NoDescriptors { lines: usize },
}

// ---------------------------------------------------------------------------
// Patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches a line starting with a supported share-link scheme.
static DESCRIPTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:vmess|vless|trojan|ss|shadowsocks|hysteria2|hy2|tuic)://\S")
        .expect("descriptor regex")
});

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Whether `payload` is made only of base64 characters (either alphabet).
///
/// Whitespace is ignored since providers wrap long payloads.
pub fn looks_like_base64(payload: &str) -> bool {
    let mut saw_any = false;
    for c in payload.chars().filter(|c| !c.is_whitespace()) {
        saw_any = true;
        if !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '-' | '_' | '=')) {
            return false;
        }
    }
    saw_any
}

/// Return the text to split into descriptors.
///
/// The decoded form is chosen only when it looks like base64 *and* decoding
/// yields more descriptor lines than the raw text does.
pub fn decode_payload(payload: &str) -> Cow<'_, str> {
    if !looks_like_base64(payload) {
        return Cow::Borrowed(payload);
    }

    match b64::decode_lenient_lossy(payload) {
        Some(text) if count_descriptors(&text) > count_descriptors(payload) => Cow::Owned(text),
        _ => Cow::Borrowed(payload),
    }
}

/// Decode one source payload into descriptor strings.
pub fn decode_source(payload: &str) -> Result<Decoded, DecodeError> {
    if payload.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let text = decode_payload(payload);
    let was_base64 = matches!(text, Cow::Owned(_));

    let mut descriptors = Vec::new();
    let mut skipped_lines = 0;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if DESCRIPTOR_RE.is_match(line) {
            descriptors.push(line.to_string());
        } else {
            skipped_lines += 1;
        }
    }

    if descriptors.is_empty() {
        return Err(DecodeError::NoDescriptors {
            lines: skipped_lines,
        });
    }

    debug!(
        descriptors = descriptors.len(),
        skipped_lines, was_base64, "payload decoded"
    );

    Ok(Decoded {
        descriptors,
        skipped_lines,
        was_base64,
    })
}

fn count_descriptors(text: &str) -> usize {
    text.lines()
        .map(str::trim)
        .filter(|l| DESCRIPTOR_RE.is_match(l))
        .count()
}
