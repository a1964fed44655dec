//! Descriptor → [`NodeRecord`] dispatch.
//!
//! Each protocol's share-link encoding is structurally unrelated (base64 JSON
//! for vmess, URI-with-userinfo for the rest, and two shapes of ss), so this
//! module only picks the variant and delegates to one parser per encoding.

use submerge_shared::{NodeRecord, Protocol};

use crate::{uri, vmess};

/// Why a single descriptor could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The scheme is not one of the supported protocols.
    #[error("unknown scheme {scheme:?}")]
    UnknownScheme { scheme: String },

    /// Supported scheme, but required fields are missing or invalid.
    #[error("malformed {protocol} descriptor: {reason}")]
    Malformed { protocol: Protocol, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(protocol: Protocol, reason: impl Into<String>) -> Self {
        Self::Malformed {
            protocol,
            reason: reason.into(),
        }
    }
}

/// Parse one descriptor string.
///
/// The stored `raw_uri` is the descriptor with surrounding whitespace removed.
pub fn parse_node(descriptor: &str) -> Result<NodeRecord, ParseError> {
    let raw = descriptor.trim();

    let Some((scheme, rest)) = raw.split_once("://") else {
        return Err(ParseError::UnknownScheme {
            scheme: String::new(),
        });
    };

    match Protocol::from_scheme(scheme) {
        Protocol::Vmess => vmess::parse(raw, rest),
        Protocol::Shadowsocks => uri::parse_shadowsocks(raw, rest),
        protocol @ (Protocol::Vless | Protocol::Trojan | Protocol::Hysteria2 | Protocol::Tuic) => {
            uri::parse_authority(protocol, raw)
        }
        Protocol::Unknown => Err(ParseError::UnknownScheme {
            scheme: scheme.to_ascii_lowercase(),
        }),
    }
}
