//! `vmess://base64(json)` share links (the v2rayN format).

use serde::Deserialize;
use submerge_shared::{NodeRecord, Protocol};

use crate::b64;
use crate::node::ParseError;
use crate::uri::{decode_label, normalize_host, parse_port};

/// Fields of the v2rayN JSON object that identify a node. Everything else
/// (`net`, `tls`, `path`, ...) is transport detail and ignored.
#[derive(Debug, Deserialize)]
struct VmessShare {
    add: Option<String>,
    port: Option<Scalar>,
    id: Option<String>,
    ps: Option<Scalar>,
}

/// Providers emit `port` (and sometimes `ps`) as either a string or a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

pub(crate) fn parse(raw: &str, payload: &str) -> Result<NodeRecord, ParseError> {
    let protocol = Protocol::Vmess;

    // A few providers append `#label` after the base64 body.
    let (payload, fragment_label) = match payload.split_once('#') {
        Some((body, fragment)) => (body, decode_label(fragment)),
        None => (payload, None),
    };

    let json = b64::decode_lenient_str(payload)
        .ok_or_else(|| ParseError::malformed(protocol, "payload is not base64 text"))?;

    let share: VmessShare = serde_json::from_str(&json)
        .map_err(|e| ParseError::malformed(protocol, format!("invalid JSON: {e}")))?;

    let host = share
        .add
        .map(|a| normalize_host(&a))
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ParseError::malformed(protocol, "missing add"))?;

    let port = share
        .port
        .ok_or_else(|| ParseError::malformed(protocol, "missing port"))
        .and_then(|p| parse_port(protocol, &p.into_string()))?;

    let identifier = share
        .id
        .ok_or_else(|| ParseError::malformed(protocol, "missing id"))?;

    let label = share
        .ps
        .map(Scalar::into_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or(fragment_label);

    Ok(NodeRecord::new(protocol, host, port, identifier, label, raw))
}
