//! Parsers for `scheme://credential@host:port?query#label` share links.

use std::net::IpAddr;

use submerge_shared::{NodeRecord, Protocol};
use url::{Host, Url};

use crate::b64;
use crate::node::ParseError;

/// trojan / vless / hysteria2 / tuic: a regular authority-based URI.
pub(crate) fn parse_authority(protocol: Protocol, raw: &str) -> Result<NodeRecord, ParseError> {
    let url = Url::parse(raw)
        .map_err(|e| ParseError::malformed(protocol, format!("invalid URI: {e}")))?;

    let host = match url.host() {
        Some(Host::Domain(d)) if !d.is_empty() => d.to_ascii_lowercase(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        _ => return Err(ParseError::malformed(protocol, "missing host")),
    };

    let port = match url.port() {
        Some(0) | None => return Err(ParseError::malformed(protocol, "missing or zero port")),
        Some(p) => p,
    };

    let user = percent_decode(url.username());
    let identifier = match url.password() {
        Some(password) => format!("{user}:{}", percent_decode(password)),
        None => user,
    };

    let label = url.fragment().and_then(decode_label);

    Ok(NodeRecord::new(protocol, host, port, identifier, label, raw))
}

/// Shadowsocks, in either the SIP002 form
/// `ss://base64(method:password)@host:port/?plugin=..#label` (userinfo may
/// also be plain `method:password`) or the legacy form
/// `ss://base64(method:password@host:port)#label`.
///
/// Not routed through `Url` because base64 userinfo may contain `/`.
pub(crate) fn parse_shadowsocks(raw: &str, rest: &str) -> Result<NodeRecord, ParseError> {
    let protocol = Protocol::Shadowsocks;

    let (body, label) = match rest.split_once('#') {
        Some((body, fragment)) => (body, decode_label(fragment)),
        None => (rest, None),
    };
    let body = match body.split_once('?') {
        Some((b, _)) => b.strip_suffix('/').unwrap_or(b),
        None => body,
    };

    let (credential, server) = match body.rsplit_once('@') {
        Some((userinfo, server)) => (decode_userinfo(userinfo)?, server.to_string()),
        None => {
            let decoded = b64::decode_lenient_str(body)
                .ok_or_else(|| ParseError::malformed(protocol, "body is not base64"))?;
            let (credential, server) = decoded
                .rsplit_once('@')
                .ok_or_else(|| ParseError::malformed(protocol, "missing server address"))?;
            (credential.to_string(), server.to_string())
        }
    };

    if !credential.contains(':') {
        return Err(ParseError::malformed(protocol, "credential is not method:password"));
    }

    let (host, port) = split_host_port(protocol, &server)?;

    Ok(NodeRecord::new(protocol, host, port, credential, label, raw))
}

/// `host:port` or `[v6]:port`, with the same host normalization as `Url`.
fn split_host_port(protocol: Protocol, server: &str) -> Result<(String, u16), ParseError> {
    let (host, port) = server
        .trim()
        .trim_end_matches('/')
        .rsplit_once(':')
        .ok_or_else(|| ParseError::malformed(protocol, "missing port"))?;

    let host = normalize_host(host);
    if host.is_empty() {
        return Err(ParseError::malformed(protocol, "missing host"));
    }

    let port = parse_port(protocol, port)?;
    Ok((host, port))
}

/// Lowercase, strip IPv6 brackets, and print IP literals in canonical form
/// so `2001:DB8:0::1` and `[2001:db8::1]` agree with what `Url` produces.
pub(crate) fn normalize_host(host: &str) -> String {
    let bare = host.trim().trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => bare.to_ascii_lowercase(),
    }
}

pub(crate) fn parse_port(protocol: Protocol, port: &str) -> Result<u16, ParseError> {
    match port.trim().parse::<u16>() {
        Ok(0) => Err(ParseError::malformed(protocol, "port 0")),
        Ok(p) => Ok(p),
        Err(_) => Err(ParseError::malformed(protocol, format!("non-numeric port {port:?}"))),
    }
}

/// Percent-decoded, non-empty display label.
pub(crate) fn decode_label(fragment: &str) -> Option<String> {
    let label = percent_decode(fragment);
    let label = label.trim();
    (!label.is_empty()).then(|| label.to_string())
}

fn decode_userinfo(userinfo: &str) -> Result<String, ParseError> {
    let plain = percent_decode(userinfo);
    if plain.contains(':') {
        return Ok(plain);
    }
    b64::decode_lenient_str(&plain)
        .ok_or_else(|| ParseError::malformed(Protocol::Shadowsocks, "userinfo is not base64"))
}

/// Falls back to the raw text when the escapes are not valid UTF-8.
fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
