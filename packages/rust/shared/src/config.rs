//! Application configuration for submerge.
//!
//! User config lives at `~/.submerge/submerge.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubmergeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "submerge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".submerge";

// ---------------------------------------------------------------------------
// Config structs (matching submerge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sources and run-wide limits.
    #[serde(default)]
    pub run: RunSection,

    /// Blacklists and protocol preferences.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Heuristic ranking weights.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Artifact file names and location.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// Subscription URLs. Order matters: earlier sources win duplicates.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Size of the top set.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Per-fetch and per-probe timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether to measure TCP connect latency.
    #[serde(default)]
    pub test_connectivity: bool,

    /// Maximum probes in flight.
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    /// Also probe nodes whose host is a loopback or private address.
    #[serde(default)]
    pub probe_private_hosts: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            max_nodes: default_max_nodes(),
            timeout_secs: default_timeout_secs(),
            test_connectivity: false,
            probe_concurrency: default_probe_concurrency(),
            probe_private_hosts: false,
        }
    }
}

fn default_max_nodes() -> usize {
    50
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_probe_concurrency() -> usize {
    10
}

/// `[filter]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Hosts containing any of these substrings are dropped.
    #[serde(default)]
    pub blacklist_domains: Vec<String>,

    /// Hosts containing any of these addresses are dropped.
    #[serde(default)]
    pub blacklist_ips: Vec<String>,

    /// If non-empty, only these protocol tags are kept.
    #[serde(default)]
    pub preferred_protocols: Vec<String>,
}

/// `[scoring]` section. Lower scores rank first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Base score for protocols missing from `protocol_scores`.
    #[serde(default = "default_unknown_protocol_score")]
    pub unknown_protocol_score: f64,

    /// Added per byte of the raw descriptor.
    #[serde(default = "default_length_weight")]
    pub length_weight: f64,

    /// Base score per protocol tag.
    #[serde(default = "default_protocol_scores")]
    pub protocol_scores: BTreeMap<String, f64>,

    /// Keyword (matched case-insensitively in host or label) to weight.
    /// Negative weights are bonuses.
    #[serde(default = "default_keywords")]
    pub keywords: BTreeMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            unknown_protocol_score: default_unknown_protocol_score(),
            length_weight: default_length_weight(),
            protocol_scores: default_protocol_scores(),
            keywords: default_keywords(),
        }
    }
}

fn default_unknown_protocol_score() -> f64 {
    8.0
}
fn default_length_weight() -> f64 {
    0.001
}
fn default_protocol_scores() -> BTreeMap<String, f64> {
    [
        ("vless", 0.0),
        ("vmess", 1.0),
        ("trojan", 2.0),
        ("hysteria2", 2.5),
        ("tuic", 3.0),
        ("shadowsocks", 3.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
fn default_keywords() -> BTreeMap<String, f64> {
    [("expired", 10.0), ("test", 2.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory all artifacts are written to.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Subscription holding every unique node.
    #[serde(default = "default_all_file")]
    pub all_file: String,

    /// Subscription holding the top set.
    #[serde(default = "default_best_file")]
    pub best_file: String,

    /// Markdown status table.
    #[serde(default = "default_status_file")]
    pub status_file: String,

    /// Also write one `subscription_<protocol>.txt` per protocol.
    #[serde(default)]
    pub per_protocol: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            all_file: default_all_file(),
            best_file: default_best_file(),
            status_file: default_status_file(),
            per_protocol: false,
        }
    }
}

fn default_output_dir() -> String {
    "subscriptions".into()
}
fn default_all_file() -> String {
    "subscription_all.txt".into()
}
fn default_best_file() -> String {
    "subscription_best.txt".into()
}
fn default_status_file() -> String {
    "STATUS.md".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Ordered source URLs.
    pub sources: Vec<String>,
    /// Size of the top set.
    pub max_nodes: usize,
    /// Per-fetch and per-probe timeout.
    pub timeout: Duration,
    /// Run the reachability prober.
    pub test_connectivity: bool,
    /// Maximum probes in flight.
    pub probe_concurrency: usize,
    /// Probe loopback/private hosts instead of skipping them.
    pub probe_private_hosts: bool,
    /// Pre-dedup filtering rules.
    pub filter: FilterConfig,
    /// Ranking weights.
    pub scoring: ScoringConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            sources: config.run.sources.clone(),
            max_nodes: config.run.max_nodes,
            timeout: Duration::from_secs(config.run.timeout_secs),
            test_connectivity: config.run.test_connectivity,
            probe_concurrency: config.run.probe_concurrency,
            probe_private_hosts: config.run.probe_private_hosts,
            filter: config.filter.clone(),
            scoring: config.scoring.clone(),
        }
    }
}

impl PipelineConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(SubmergeError::config(
                "no sources configured; add URLs to [run].sources or pass --source",
            ));
        }
        if self.max_nodes == 0 {
            return Err(SubmergeError::config("max_nodes must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(SubmergeError::config("timeout must be at least 1 second"));
        }
        if self.probe_concurrency == 0 {
            return Err(SubmergeError::config("probe_concurrency must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.submerge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SubmergeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.submerge/submerge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SubmergeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SubmergeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SubmergeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(SubmergeError::config(format!(
            "{} already exists; remove it first to regenerate defaults",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SubmergeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SubmergeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
