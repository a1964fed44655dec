//! Subscription payloads: newline-joined share links, base64-encoded.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use submerge_shared::{NodeRecord, Protocol};

/// Encode records as one subscription body.
///
/// Each record contributes its `raw_uri` verbatim, in the given order.
pub fn encode_subscription(records: &[NodeRecord]) -> String {
    let joined = records
        .iter()
        .map(NodeRecord::raw_uri)
        .collect::<Vec<_>>()
        .join("\n");
    STANDARD.encode(joined)
}

/// One `(file name, body)` per protocol present in `records`.
///
/// Files are named `subscription_<protocol>.txt` and keep the rank order of
/// `records`. Protocols with no records produce no file.
pub fn per_protocol_subscriptions(records: &[NodeRecord]) -> Vec<(String, String)> {
    Protocol::KNOWN
        .iter()
        .filter_map(|&protocol| {
            let subset: Vec<NodeRecord> = records
                .iter()
                .filter(|r| r.protocol() == protocol)
                .cloned()
                .collect();
            (!subset.is_empty()).then(|| {
                (
                    format!("subscription_{}.txt", protocol.as_str()),
                    encode_subscription(&subset),
                )
            })
        })
        .collect()
}
