//! Core domain types for submerge node records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Proxy protocol of a node, derived from the descriptor's URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    Hysteria2,
    Tuic,
    /// Scheme not handled by any parser.
    Unknown,
}

impl Protocol {
    /// All protocols that have a parser, in display order.
    pub const KNOWN: [Protocol; 6] = [
        Protocol::Vmess,
        Protocol::Vless,
        Protocol::Trojan,
        Protocol::Shadowsocks,
        Protocol::Hysteria2,
        Protocol::Tuic,
    ];

    /// Map a URI scheme (without `://`) to a protocol. Case-insensitive.
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "vmess" => Self::Vmess,
            "vless" => Self::Vless,
            "trojan" => Self::Trojan,
            "ss" | "shadowsocks" => Self::Shadowsocks,
            "hysteria2" | "hy2" => Self::Hysteria2,
            "tuic" => Self::Tuic,
            _ => Self::Unknown,
        }
    }

    /// Lowercase tag used in logs, config keys and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Trojan => "trojan",
            Self::Shadowsocks => "shadowsocks",
            Self::Hysteria2 => "hysteria2",
            Self::Tuic => "tuic",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Deduplication key: SHA-256 over `(protocol, host, port, identifier)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint for a node identity tuple.
    pub fn compute(protocol: Protocol, host: &str, port: u16, identifier: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(protocol.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(host.as_bytes());
        hasher.update([0u8]);
        hasher.update(port.to_be_bytes());
        hasher.update([0u8]);
        hasher.update(identifier.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// NodeRecord
// ---------------------------------------------------------------------------

/// Normalized view of one proxy node.
///
/// Identity fields are fixed at construction so the fingerprint can never
/// drift from them. Only `score` and `latency_ms` are filled in later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    protocol: Protocol,
    host: String,
    port: u16,
    identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    raw_uri: String,
    fingerprint: Fingerprint,
    /// Heuristic rank score; lower is better.
    pub score: f64,
    /// TCP connect latency, present only when a probe succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl NodeRecord {
    /// Build a record and derive its fingerprint.
    pub fn new(
        protocol: Protocol,
        host: impl Into<String>,
        port: u16,
        identifier: impl Into<String>,
        label: Option<String>,
        raw_uri: impl Into<String>,
    ) -> Self {
        let host = host.into();
        let identifier = identifier.into();
        let fingerprint = Fingerprint::compute(protocol, &host, port, &identifier);
        Self {
            protocol,
            host,
            port,
            identifier,
            label,
            raw_uri: raw_uri.into(),
            fingerprint,
            score: 0.0,
            latency_ms: None,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The descriptor exactly as it appeared in the source.
    pub fn raw_uri(&self) -> &str {
        &self.raw_uri
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}
