//! Lenient base64 decoding shared by the payload decoder and link parsers.
//!
//! Subscription providers are inconsistent: some pad, some don't, some use
//! the URL-safe alphabet, and most wrap long payloads across lines.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decode with either alphabet, ignoring whitespace and padding.
pub(crate) fn decode_lenient(input: &str) -> Option<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    STANDARD_LENIENT
        .decode(&compact)
        .or_else(|_| URL_SAFE_LENIENT.decode(&compact))
        .ok()
}

/// Decode to UTF-8 text.
pub(crate) fn decode_lenient_str(input: &str) -> Option<String> {
    decode_lenient(input).and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Decode to text, replacing invalid UTF-8 sequences with U+FFFD.
///
/// A whole subscription body must survive one badly encoded label.
pub(crate) fn decode_lenient_lossy(input: &str) -> Option<String> {
    decode_lenient(input).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
