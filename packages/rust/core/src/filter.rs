//! Blacklist and protocol-preference filtering, applied before dedup.

use submerge_shared::{FilterConfig, NodeRecord, Protocol};
use tracing::{debug, warn};

/// Records that survived filtering plus how many were dropped.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<NodeRecord>,
    pub removed: usize,
}

/// Compiled form of [`FilterConfig`]: lowercased needles and resolved tags.
struct Rules {
    blocked_hosts: Vec<String>,
    preferred: Vec<Protocol>,
}

impl Rules {
    fn new(config: &FilterConfig) -> Self {
        let blocked_hosts = config
            .blacklist_domains
            .iter()
            .chain(&config.blacklist_ips)
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let preferred = config
            .preferred_protocols
            .iter()
            .filter_map(|tag| match Protocol::from_scheme(tag.trim()) {
                Protocol::Unknown => {
                    warn!(tag = %tag, "ignoring unknown protocol in preferred_protocols");
                    None
                }
                p => Some(p),
            })
            .collect();

        Self {
            blocked_hosts,
            preferred,
        }
    }

    fn allows(&self, record: &NodeRecord) -> bool {
        if !self.preferred.is_empty() && !self.preferred.contains(&record.protocol()) {
            return false;
        }
        // Hosts are already lowercase from the parser.
        !self
            .blocked_hosts
            .iter()
            .any(|needle| record.host().contains(needle.as_str()))
    }
}

/// Drop blacklisted hosts and non-preferred protocols. Order is preserved.
///
/// An empty [`FilterConfig`] keeps every record.
pub fn apply_filter(records: Vec<NodeRecord>, config: &FilterConfig) -> FilterOutcome {
    let rules = Rules::new(config);
    let total = records.len();

    let kept: Vec<NodeRecord> = records.into_iter().filter(|r| rules.allows(r)).collect();
    let removed = total - kept.len();

    if removed > 0 {
        debug!(removed, kept = kept.len(), "filter applied");
    }

    FilterOutcome { kept, removed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(protocol: Protocol, host: &str) -> NodeRecord {
        NodeRecord::new(protocol, host, 443, "id", None, format!("{protocol}://id@{host}:443"))
    }

    fn sample() -> Vec<NodeRecord> {
        vec![
            node(Protocol::Vmess, "a.example.com"),
            node(Protocol::Trojan, "ads.bad.net"),
            node(Protocol::Shadowsocks, "1.2.3.4"),
            node(Protocol::Vless, "b.example.com"),
        ]
    }

    #[test]
    fn empty_config_keeps_everything() {
        let out = apply_filter(sample(), &FilterConfig::default());
        assert_eq!(out.kept.len(), 4);
        assert_eq!(out.removed, 0);
    }

    #[test]
    fn blacklists_match_host_substrings_case_insensitively() {
        let config = FilterConfig {
            blacklist_domains: vec!["BAD.net".into()],
            blacklist_ips: vec!["1.2.3.4".into()],
            ..Default::default()
        };
        let out = apply_filter(sample(), &config);
        let hosts: Vec<_> = out.kept.iter().map(|r| r.host()).collect();
        assert_eq!(hosts, vec!["a.example.com", "b.example.com"]);
        assert_eq!(out.removed, 2);
    }

    #[test]
    fn preferred_protocols_restrict_and_accept_aliases() {
        let config = FilterConfig {
            preferred_protocols: vec!["vless".into(), "ss".into(), "bogus".into()],
            ..Default::default()
        };
        let out = apply_filter(sample(), &config);
        let protocols: Vec<_> = out.kept.iter().map(|r| r.protocol()).collect();
        assert_eq!(protocols, vec![Protocol::Shadowsocks, Protocol::Vless]);
    }

    #[test]
    fn blank_blacklist_entries_are_ignored() {
        let config = FilterConfig {
            blacklist_domains: vec!["  ".into()],
            ..Default::default()
        };
        assert_eq!(apply_filter(sample(), &config).kept.len(), 4);
    }
}
