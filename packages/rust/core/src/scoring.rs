//! Heuristic scoring and total ordering of records.
//!
//! Lower scores rank first. Measured latency, when present, dominates the
//! heuristic entirely.

use std::cmp::Ordering;

use submerge_shared::{NodeRecord, ScoringConfig};

/// Heuristic score for one record: protocol base score, plus the weight of
/// every keyword found in the host or label, plus a small per-byte length
/// penalty on the raw descriptor.
pub fn score(record: &NodeRecord, config: &ScoringConfig) -> f64 {
    let base = config
        .protocol_scores
        .get(record.protocol().as_str())
        .copied()
        .unwrap_or(config.unknown_protocol_score);

    let host = record.host().to_lowercase();
    let label = record.label().map(str::to_lowercase).unwrap_or_default();

    let keywords: f64 = config
        .keywords
        .iter()
        .filter(|(keyword, _)| !keyword.is_empty())
        .filter(|(keyword, _)| {
            let keyword = keyword.to_lowercase();
            host.contains(&keyword) || label.contains(&keyword)
        })
        .map(|(_, weight)| weight)
        .sum();

    base + keywords + config.length_weight * record.raw_uri().len() as f64
}

/// Assign scores and sort into final rank order.
///
/// Records with latency come first, by ascending latency and then score.
/// Unmeasured records follow by ascending score. The sort is stable, so equal
/// keys keep their encounter order.
pub fn rank(mut records: Vec<NodeRecord>, config: &ScoringConfig) -> Vec<NodeRecord> {
    for record in &mut records {
        record.score = score(record, config);
    }
    records.sort_by(compare);
    records
}

fn compare(a: &NodeRecord, b: &NodeRecord) -> Ordering {
    match (a.latency_ms, b.latency_ms) {
        (Some(x), Some(y)) => x.total_cmp(&y).then(a.score.total_cmp(&b.score)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.score.total_cmp(&b.score),
    }
}

/// The first `min(max_nodes, len)` records of an already ranked sequence.
pub fn split_top(ranked: &[NodeRecord], max_nodes: usize) -> Vec<NodeRecord> {
    ranked[..max_nodes.min(ranked.len())].to_vec()
}

#[cfg(test)]
mod tests {
    use submerge_shared::Protocol;

    use super::*;

    fn node(protocol: Protocol, host: &str, label: Option<&str>) -> NodeRecord {
        NodeRecord::new(
            protocol,
            host,
            443,
            "id",
            label.map(String::from),
            format!("{protocol}://id@{host}:443"),
        )
    }

    fn no_length() -> ScoringConfig {
        ScoringConfig {
            length_weight: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn protocol_base_scores() {
        let config = no_length();
        assert_eq!(score(&node(Protocol::Vless, "h", None), &config), 0.0);
        assert_eq!(score(&node(Protocol::Vmess, "h", None), &config), 1.0);
        assert_eq!(score(&node(Protocol::Shadowsocks, "h", None), &config), 3.0);
        assert_eq!(score(&node(Protocol::Unknown, "h", None), &config), 8.0);
    }

    #[test]
    fn keywords_match_host_or_label_once() {
        let config = no_length();
        // "test" in both host and label still counts once.
        let rec = node(Protocol::Vless, "test.example.com", Some("TEST node"));
        assert_eq!(score(&rec, &config), 2.0);

        let rec = node(Protocol::Vless, "h", Some("Expired 2024"));
        assert_eq!(score(&rec, &config), 10.0);
    }

    #[test]
    fn negative_keyword_weight_is_a_bonus() {
        let mut config = no_length();
        config.keywords.insert("premium".into(), -0.5);
        let rec = node(Protocol::Vmess, "h", Some("Premium HK"));
        assert_eq!(score(&rec, &config), 0.5);
    }

    #[test]
    fn shorter_descriptor_scores_better() {
        let config = ScoringConfig::default();
        let short = node(Protocol::Trojan, "a.io", None);
        let long = node(Protocol::Trojan, "a-much-longer-hostname.example.com", None);
        assert!(score(&short, &config) < score(&long, &config));
    }

    #[test]
    fn measured_latency_dominates() {
        let mut fast_ss = node(Protocol::Shadowsocks, "ss", None);
        fast_ss.latency_ms = Some(20.0);
        let mut slow_vless = node(Protocol::Vless, "vl", None);
        slow_vless.latency_ms = Some(80.0);
        let unmeasured_vless = node(Protocol::Vless, "best", None);

        let ranked = rank(
            vec![unmeasured_vless, slow_vless, fast_ss],
            &ScoringConfig::default(),
        );
        let hosts: Vec<_> = ranked.iter().map(|r| r.host()).collect();
        assert_eq!(hosts, vec!["ss", "vl", "best"]);
    }

    #[test]
    fn ties_keep_encounter_order() {
        let config = no_length();
        let ranked = rank(
            vec![
                node(Protocol::Trojan, "first", None),
                node(Protocol::Vless, "vless", None),
                node(Protocol::Trojan, "second", None),
            ],
            &config,
        );
        let hosts: Vec<_> = ranked.iter().map(|r| r.host()).collect();
        assert_eq!(hosts, vec!["vless", "first", "second"]);
    }

    #[test]
    fn split_top_truncates() {
        let ranked: Vec<_> = (0..5)
            .map(|i| node(Protocol::Vless, &format!("h{i}"), None))
            .collect();
        for max in [0, 1, 3, 5, 50] {
            assert_eq!(split_top(&ranked, max).len(), max.min(ranked.len()));
        }
        assert_eq!(split_top(&ranked, 2)[1].host(), "h1");
    }
}
