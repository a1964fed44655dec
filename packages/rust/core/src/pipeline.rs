//! End-to-end run: sources → decode → parse → filter → dedup → probe → rank.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use submerge_fetcher::SourceFetcher;
use submerge_parser::{ParseError, decode_source, parse_node};
use submerge_prober::{ProbeConfig, ProbeProgress, Prober};
use submerge_shared::{NodeRecord, PipelineConfig, Result, SubmergeError};

use crate::dedup::dedup;
use crate::filter::apply_filter;
use crate::scoring::{rank, split_top};

/// One source's fetched body, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct SourcePayload {
    pub source: String,
    pub body: String,
}

/// Counters accumulated over one run. Nothing here is fatal on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub sources_total: usize,
    /// Fetch failed (unreachable, timeout, non-2xx).
    pub sources_failed: usize,
    /// Fetched but yielded no recognizable descriptors.
    pub sources_empty: usize,
    pub descriptors: usize,
    /// Non-empty lines without a known scheme prefix.
    pub skipped_lines: usize,
    pub unknown_scheme: usize,
    pub malformed: usize,
    pub parsed: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub unique: usize,
    pub probes_attempted: usize,
    pub probes_reachable: usize,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Every unique record, in rank order.
    pub full: Vec<NodeRecord>,
    /// The first `max_nodes` of `full`.
    pub top: Vec<NodeRecord>,
    pub stats: RunStats,
    pub generated_at: DateTime<Utc>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each source fetch attempt, successful or not.
    fn source_fetched(&self, source: &str, current: usize, total: usize);
    /// Called as reachability probes complete.
    fn node_probed(&self, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, output: &PipelineOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_fetched(&self, _source: &str, _current: usize, _total: usize) {}
    fn node_probed(&self, _current: usize, _total: usize) {}
    fn done(&self, _output: &PipelineOutput) {}
}

/// Run the whole pipeline over every configured source.
///
/// Sources are fetched one after another in configured order; a failed source
/// contributes nothing. Fails with [`SubmergeError::NoUsableNodes`] only when
/// no source yields a single usable record.
#[instrument(skip_all, fields(sources = config.sources.len(), max_nodes = config.max_nodes))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    fetcher: &impl SourceFetcher,
    progress: &dyn ProgressReporter,
) -> Result<PipelineOutput> {
    let start = Instant::now();
    config.validate()?;

    // --- Phase 1: Fetch ---
    progress.phase("Fetching sources");
    let total = config.sources.len();
    let mut payloads = Vec::with_capacity(total);
    let mut sources_failed = 0;

    for (i, source) in config.sources.iter().enumerate() {
        match fetcher.fetch(source).await {
            Ok(body) => payloads.push(SourcePayload {
                source: source.clone(),
                body,
            }),
            Err(e) => {
                warn!(source = %source, error = %e, "source fetch failed, skipping");
                sources_failed += 1;
            }
        }
        progress.source_fetched(source, i + 1, total);
    }

    // --- Phase 2: Decode / parse / filter / dedup ---
    progress.phase("Parsing nodes");
    let (mut records, mut stats) = process_payloads(&payloads, config);
    stats.sources_total = total;
    stats.sources_failed = sources_failed;

    if records.is_empty() {
        return Err(SubmergeError::NoUsableNodes { sources: total });
    }

    // --- Phase 3: Probe (optional) ---
    if config.test_connectivity {
        progress.phase("Testing connectivity");
        let prober = Prober::new(ProbeConfig {
            timeout: config.timeout,
            concurrency: config.probe_concurrency,
            allow_private: config.probe_private_hosts,
        });
        let summary = prober
            .probe_all(&mut records, &PipelineProbeProgress { inner: progress })
            .await;
        stats.probes_attempted = summary.attempted;
        stats.probes_reachable = summary.reachable;
    }

    // --- Phase 4: Rank ---
    progress.phase("Ranking nodes");
    let full = rank(records, &config.scoring);
    let top = split_top(&full, config.max_nodes);

    let output = PipelineOutput {
        full,
        top,
        stats,
        generated_at: Utc::now(),
    };

    progress.done(&output);

    info!(
        unique = output.full.len(),
        top = output.top.len(),
        sources_failed = output.stats.sources_failed,
        duplicates = output.stats.duplicates,
        elapsed_ms = start.elapsed().as_millis(),
        "pipeline complete"
    );

    Ok(output)
}

/// Decode, parse, filter and dedup already-fetched payloads.
///
/// Pure apart from logging. Payloads must be in configured source order. The
/// `sources_total`/`sources_failed` counters are left for the caller.
pub fn process_payloads(
    payloads: &[SourcePayload],
    config: &PipelineConfig,
) -> (Vec<NodeRecord>, RunStats) {
    let mut stats = RunStats::default();
    let mut parsed = Vec::new();

    for payload in payloads {
        let decoded = match decode_source(&payload.body) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(source = %payload.source, error = %e, "source contributed no descriptors");
                stats.sources_empty += 1;
                continue;
            }
        };

        debug!(
            source = %payload.source,
            descriptors = decoded.descriptors.len(),
            skipped = decoded.skipped_lines,
            base64 = decoded.was_base64,
            "source decoded"
        );
        stats.descriptors += decoded.descriptors.len();
        stats.skipped_lines += decoded.skipped_lines;

        for descriptor in &decoded.descriptors {
            match parse_node(descriptor) {
                Ok(record) => parsed.push(record),
                Err(e) => {
                    debug!(source = %payload.source, error = %e, "dropping descriptor");
                    match e {
                        ParseError::UnknownScheme { .. } => stats.unknown_scheme += 1,
                        ParseError::Malformed { .. } => stats.malformed += 1,
                    }
                }
            }
        }
    }
    stats.parsed = parsed.len();

    let filtered = apply_filter(parsed, &config.filter);
    stats.filtered = filtered.removed;

    let deduped = dedup(filtered.kept);
    stats.duplicates = deduped.duplicates;
    stats.unique = deduped.unique.len();

    (deduped.unique, stats)
}

// ---------------------------------------------------------------------------
// Probe progress adapter
// ---------------------------------------------------------------------------

/// Adapts a `ProgressReporter` to the `ProbeProgress` interface.
struct PipelineProbeProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl ProbeProgress for PipelineProbeProgress<'_> {
    fn probed(&self, done: usize, total: usize) {
        self.inner.node_probed(done, total);
    }
}
