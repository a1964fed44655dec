//! Fingerprint-based deduplication. First occurrence wins.

use std::collections::HashSet;

use submerge_shared::NodeRecord;

/// Unique records in encounter order, plus the number discarded.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub unique: Vec<NodeRecord>,
    pub duplicates: usize,
}

/// Keep the first record for every fingerprint.
///
/// Input order must be source order, then within-source order, so that
/// earlier sources win.
pub fn dedup(records: Vec<NodeRecord>) -> DedupOutcome {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut duplicates = 0;

    for record in records {
        if seen.insert(record.fingerprint().clone()) {
            unique.push(record);
        } else {
            duplicates += 1;
        }
    }

    DedupOutcome { unique, duplicates }
}
