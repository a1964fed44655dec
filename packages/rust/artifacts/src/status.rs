//! `STATUS.md` rendering.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use submerge_shared::NodeRecord;

/// Run metadata plus the top set, already in rank order.
#[derive(Debug, Clone)]
pub struct StatusReport<'a> {
    pub generated_at: DateTime<Utc>,
    /// Unique nodes that went through ranking.
    pub total_tested: usize,
    pub top: &'a [NodeRecord],
}

/// Render the status page. Ranks are 1-based by position.
pub fn render_status(report: &StatusReport<'_>) -> String {
    let mut out = String::new();

    out.push_str("# Node Status\n\n");
    let _ = writeln!(
        out,
        "- Last updated: {}",
        report.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "- Nodes tested: {}", report.total_tested);
    let _ = writeln!(out, "- Top nodes: {}", report.top.len());
    out.push('\n');

    out.push_str("| Rank | Protocol | Host | Latency |\n");
    out.push_str("|------|----------|------|---------|\n");

    for (i, record) in report.top.iter().enumerate() {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            i + 1,
            record.protocol(),
            record.host().replace('|', "\\|"),
            latency_cell(record)
        );
    }

    out
}

fn latency_cell(record: &NodeRecord) -> String {
    match record.latency_ms {
        Some(ms) => format!("{ms:.0} ms"),
        None => format!("score {:.3}", record.score),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use submerge_shared::Protocol;

    use super::*;

    #[test]
    fn renders_header_and_rows() {
        let mut fast = NodeRecord::new(Protocol::Vless, "1.2.3.4", 443, "u", None, "vless://u@1.2.3.4:443");
        fast.latency_ms = Some(23.4);
        let mut slow = NodeRecord::new(Protocol::Trojan, "b.example.com", 443, "p", None, "trojan://p@b.example.com:443");
        slow.score = 2.0371;

        let top = [fast, slow];
        let report = StatusReport {
            generated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            total_tested: 244,
            top: &top,
        };
        let md = render_status(&report);

        assert!(md.contains("- Last updated: 2026-01-02T03:04:05Z"));
        assert!(md.contains("- Nodes tested: 244"));
        assert!(md.contains("- Top nodes: 2"));
        assert!(md.contains("| 1 | vless | 1.2.3.4 | 23 ms |"));
        assert!(md.contains("| 2 | trojan | b.example.com | score 2.037 |"));
    }

    #[test]
    fn empty_top_set_still_has_table_header() {
        let report = StatusReport {
            generated_at: Utc::now(),
            total_tested: 0,
            top: &[],
        };
        let md = render_status(&report);
        assert!(md.contains("| Rank | Protocol | Host | Latency |"));
        assert!(md.contains("- Top nodes: 0"));
    }
}
