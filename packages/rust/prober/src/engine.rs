//! Semaphore-bounded TCP connect probing.
//!
//! Every record gets its own task; a shared semaphore caps how many sockets
//! are in flight. Each task reports only its own outcome and the caller
//! writes `latency_ms` back after the join barrier, so no state is shared
//! between tasks.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use submerge_shared::NodeRecord;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Probe settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Per-attempt connect timeout.
    pub timeout: Duration,
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Probe loopback/private/link-local literal addresses too.
    pub allow_private: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            concurrency: 10,
            allow_private: false,
        }
    }
}

/// Result of a single probe. Only `Reachable` ever reaches a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Connection established after the given time.
    Reachable(Duration),
    /// No connection within the timeout.
    TimedOut,
    /// The host actively refused the connection.
    Refused,
    /// Resolution or connect failed for another reason.
    Failed(String),
    /// Target is a private/loopback address and was not probed.
    Skipped,
}

/// Aggregate counters for one probing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    /// Probes actually issued (excludes skipped targets).
    pub attempted: usize,
    pub reachable: usize,
    pub timed_out: usize,
    pub refused: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ProbeSummary {
    fn record(&mut self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Reachable(_) => self.reachable += 1,
            ProbeOutcome::TimedOut => self.timed_out += 1,
            ProbeOutcome::Refused => self.refused += 1,
            ProbeOutcome::Failed(_) => self.failed += 1,
            ProbeOutcome::Skipped => {
                self.skipped += 1;
                return;
            }
        }
        self.attempted += 1;
    }
}

/// Progress callback while probes complete.
pub trait ProbeProgress: Send + Sync {
    /// Called once per finished probe.
    fn probed(&self, done: usize, total: usize);
}

/// No-op progress for headless/test usage.
pub struct SilentProbeProgress;

impl ProbeProgress for SilentProbeProgress {
    fn probed(&self, _done: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Prober
// ---------------------------------------------------------------------------

/// Bounded-concurrency reachability prober.
pub struct Prober {
    config: ProbeConfig,
}

impl Prober {
    /// Create a prober. A concurrency of 0 is treated as 1.
    pub fn new(mut config: ProbeConfig) -> Self {
        config.concurrency = config.concurrency.max(1);
        Self { config }
    }

    /// Probe every record and attach `latency_ms` to the reachable ones.
    ///
    /// Records that fail, time out or are skipped keep `latency_ms == None`.
    /// Returns only after every probe has finished.
    #[instrument(skip_all, fields(nodes = records.len(), concurrency = self.config.concurrency))]
    pub async fn probe_all(
        &self,
        records: &mut [NodeRecord],
        progress: &dyn ProbeProgress,
    ) -> ProbeSummary {
        let start_time = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let total = records.len();

        let mut summary = ProbeSummary::default();
        let mut done = 0usize;
        let mut handles = Vec::with_capacity(total);

        info!(
            timeout_ms = self.config.timeout.as_millis(),
            "starting reachability probes"
        );

        for (index, record) in records.iter().enumerate() {
            if !self.config.allow_private && is_private_host(record.host()) {
                debug!(host = record.host(), "private address, not probing");
                summary.record(&ProbeOutcome::Skipped);
                done += 1;
                progress.probed(done, total);
                continue;
            }

            let host = record.host().to_string();
            let port = record.port();
            let timeout = self.config.timeout;
            let sem = semaphore.clone();

            handles.push((
                index,
                tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire().await else {
                        return ProbeOutcome::Failed("probe semaphore closed".into());
                    };
                    probe_endpoint(&host, port, timeout).await
                }),
            ));
        }

        for (index, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "probe task failed");
                    ProbeOutcome::Failed(e.to_string())
                }
            };

            if let ProbeOutcome::Reachable(elapsed) = outcome {
                records[index].latency_ms = Some(elapsed.as_secs_f64() * 1000.0);
            }

            summary.record(&outcome);
            done += 1;
            progress.probed(done, total);
        }

        info!(
            attempted = summary.attempted,
            reachable = summary.reachable,
            timed_out = summary.timed_out,
            refused = summary.refused,
            failed = summary.failed,
            skipped = summary.skipped,
            duration_ms = start_time.elapsed().as_millis(),
            "probing completed"
        );

        summary
    }
}

/// Time a single TCP connect to `(host, port)`. The stream is dropped as soon
/// as it is established.
pub async fn probe_endpoint(host: &str, port: u16, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed();
            drop(stream);
            ProbeOutcome::Reachable(elapsed)
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => ProbeOutcome::Refused,
        Ok(Err(e)) => ProbeOutcome::Failed(e.to_string()),
        Err(_) => ProbeOutcome::TimedOut,
    }
}

// ---------------------------------------------------------------------------
// Private address detection
// ---------------------------------------------------------------------------

/// Whether a node host points at this machine or a private network.
fn is_private_host(host: &str) -> bool {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return is_private_ip(&ip);
    }
    host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use submerge_shared::Protocol;
    use tokio::net::TcpListener;

    use super::*;

    fn record(host: &str, port: u16) -> NodeRecord {
        let raw = format!("trojan://pw@{host}:{port}");
        NodeRecord::new(Protocol::Trojan, host, port, "pw", None, raw)
    }

    fn loopback_config() -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_secs(2),
            concurrency: 4,
            allow_private: true,
        }
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    struct CountingProgress(AtomicUsize);

    impl ProbeProgress for CountingProgress {
        fn probed(&self, _done: usize, _total: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn private_hosts_are_detected() {
        assert!(is_private_host("127.0.0.1"));
        assert!(is_private_host("10.1.2.3"));
        assert!(is_private_host("192.168.0.1"));
        assert!(is_private_host("100.64.0.1"));
        assert!(is_private_host("::1"));
        assert!(is_private_host("localhost"));
        assert!(!is_private_host("1.2.3.4"));
        assert!(!is_private_host("node.example.com"));
    }

    #[tokio::test]
    async fn reachable_node_gets_latency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut records = vec![record("127.0.0.1", port)];
        let summary = Prober::new(loopback_config())
            .probe_all(&mut records, &SilentProbeProgress)
            .await;

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.reachable, 1);
        let latency = records[0].latency_ms.expect("latency recorded");
        assert!(latency >= 0.0);
    }

    #[tokio::test]
    async fn refused_node_keeps_no_latency() {
        let port = closed_port().await;

        let mut records = vec![record("127.0.0.1", port)];
        let summary = Prober::new(loopback_config())
            .probe_all(&mut records, &SilentProbeProgress)
            .await;

        assert_eq!(summary.reachable, 0);
        assert_eq!(summary.refused + summary.failed, 1);
        assert_eq!(records[0].latency_ms, None);
    }

    #[tokio::test]
    async fn unroutable_node_times_out_or_fails() {
        // TEST-NET-1; routing behaviour varies by host, but it never connects.
        let mut records = vec![record("192.0.2.1", 9)];
        let config = ProbeConfig {
            timeout: Duration::from_millis(200),
            ..loopback_config()
        };
        let summary = Prober::new(config)
            .probe_all(&mut records, &SilentProbeProgress)
            .await;

        assert_eq!(summary.reachable, 0);
        assert_eq!(summary.timed_out + summary.failed + summary.refused, 1);
        assert_eq!(records[0].latency_ms, None);
    }

    #[tokio::test]
    async fn private_targets_are_skipped_by_default() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut records = vec![record("127.0.0.1", port)];
        let summary = Prober::new(ProbeConfig::default())
            .probe_all(&mut records, &SilentProbeProgress)
            .await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.attempted, 0);
        assert_eq!(records[0].latency_ms, None);
    }

    #[tokio::test]
    async fn mixed_batch_under_single_permit() {
        let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = closed_port().await;

        let mut records = vec![
            record("127.0.0.1", a.local_addr().unwrap().port()),
            record("127.0.0.1", dead),
            record("127.0.0.1", b.local_addr().unwrap().port()),
        ];

        let progress = CountingProgress(AtomicUsize::new(0));
        let config = ProbeConfig {
            concurrency: 1,
            ..loopback_config()
        };
        let summary = Prober::new(config).probe_all(&mut records, &progress).await;

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.reachable, 2);
        assert!(records[0].latency_ms.is_some());
        assert!(records[1].latency_ms.is_none());
        assert!(records[2].latency_ms.is_some());
        assert_eq!(progress.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let mut records: Vec<NodeRecord> = Vec::new();
        let summary = Prober::new(loopback_config())
            .probe_all(&mut records, &SilentProbeProgress)
            .await;
        assert_eq!(summary, ProbeSummary::default());
    }
}
