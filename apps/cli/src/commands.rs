//! CLI command definitions, routing, and tracing setup.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use submerge_artifacts::{
    Artifact, RunManifest, StatusReport, encode_subscription, per_protocol_subscriptions,
    render_status, write_artifacts, write_manifest,
};
use submerge_core::{PipelineOutput, ProgressReporter, run_pipeline};
use submerge_fetcher::{FetchOptions, HttpFetcher, SourceFetcher};
use submerge_shared::{
    AppConfig, OutputConfig, PipelineConfig, RunId, init_config, load_config, load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// submerge: merge proxy subscriptions into ranked feeds.
#[derive(Parser)]
#[command(
    name = "submerge",
    version,
    about = "Aggregate, deduplicate and rank proxy-node subscription feeds.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.submerge/submerge.toml).
    #[arg(long, env = "SUBMERGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch all sources, rank the nodes and write the subscriptions.
    Run(RunArgs),

    /// Parse share links and print the normalized records as JSON.
    ///
    /// Reads one descriptor per line from stdin when none are given.
    Parse {
        /// Descriptors such as `trojan://pass@host:443#name`.
        descriptors: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for `submerge run`. Anything left unset comes from the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Subscription URL; repeat for several. Replaces the configured list.
    #[arg(long = "source", env = "SUBMERGE_SOURCES", value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Size of the top set.
    #[arg(long, env = "SUBMERGE_MAX_NODES")]
    pub max_nodes: Option<usize>,

    /// Per-fetch and per-probe timeout in seconds.
    #[arg(long, env = "SUBMERGE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Measure TCP connect latency for every unique node.
    ///
    /// A bare flag means `true`; `--test-connectivity false` turns off a
    /// config file that enables it.
    #[arg(
        long,
        env = "SUBMERGE_TEST_CONNECTIVITY",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub test_connectivity: Option<bool>,

    /// Output directory for the artifacts.
    #[arg(long, env = "SUBMERGE_OUT_DIR")]
    pub out: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "submerge=info",
        1 => "submerge=debug",
        _ => "submerge=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `submerge parse` output stays pipeable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(config_path, args).await,
        Command::Parse { descriptors } => cmd_parse(descriptors),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Fold CLI overrides into the file config.
fn apply_overrides(config: &mut AppConfig, args: RunArgs) {
    if !args.sources.is_empty() {
        config.run.sources = args.sources;
    }
    if let Some(n) = args.max_nodes {
        config.run.max_nodes = n;
    }
    if let Some(t) = args.timeout {
        config.run.timeout_secs = t;
    }
    if let Some(on) = args.test_connectivity {
        config.run.test_connectivity = on;
    }
    if let Some(out) = args.out {
        config.output.dir = out.to_string_lossy().into_owned();
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    apply_overrides(&mut config, args);

    let fetcher = HttpFetcher::new(&FetchOptions {
        timeout: std::time::Duration::from_secs(config.run.timeout_secs),
    })?;

    let reporter = CliProgress::new();
    let report = match execute_run(&config, &fetcher, &reporter).await {
        Ok(report) => report,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let stats = &report.output.stats;
    println!();
    println!("  Subscriptions updated!");
    println!("  Run:        {}", report.run_id);
    println!(
        "  Sources:    {} ({} failed, {} empty)",
        stats.sources_total, stats.sources_failed, stats.sources_empty
    );
    println!(
        "  Nodes:      {} unique ({} duplicates, {} filtered, {} malformed)",
        stats.unique, stats.duplicates, stats.filtered, stats.malformed
    );
    if config.run.test_connectivity {
        println!(
            "  Reachable:  {}/{}",
            stats.probes_reachable, stats.probes_attempted
        );
    }
    println!("  Top set:    {}", report.output.top.len());
    println!("  Output:     {}", report.out_dir.display());
    println!();

    Ok(())
}

/// What a completed run produced and where it was written.
struct RunReport {
    run_id: RunId,
    out_dir: PathBuf,
    output: PipelineOutput,
}

/// Run the pipeline, then write the artifacts and the manifest.
///
/// Writing starts only after the pipeline succeeded; on `NoUsableNodes` the
/// output directory is left exactly as it was.
async fn execute_run(
    config: &AppConfig,
    fetcher: &impl SourceFetcher,
    progress: &dyn ProgressReporter,
) -> submerge_shared::Result<RunReport> {
    let pipeline_config = PipelineConfig::from(config);
    pipeline_config.validate()?;

    info!(
        sources = pipeline_config.sources.len(),
        max_nodes = pipeline_config.max_nodes,
        test_connectivity = pipeline_config.test_connectivity,
        "starting run"
    );

    let output = run_pipeline(&pipeline_config, fetcher, progress).await?;

    let out_dir = PathBuf::from(&config.output.dir);
    let artifacts = build_artifacts(&output, &config.output);
    let metas = write_artifacts(&out_dir, &artifacts)?;

    let run_id = RunId::new();
    let manifest = RunManifest {
        run_id: run_id.clone(),
        tool_version: env!("CARGO_PKG_VERSION"),
        generated_at: output.generated_at,
        stats: &output.stats,
        artifacts: &metas,
    };
    write_manifest(&out_dir, &manifest)?;

    Ok(RunReport {
        run_id,
        out_dir,
        output,
    })
}

/// Every file a successful run produces, in write order.
fn build_artifacts(output: &PipelineOutput, config: &OutputConfig) -> Vec<Artifact> {
    let status = render_status(&StatusReport {
        generated_at: output.generated_at,
        total_tested: output.full.len(),
        top: &output.top,
    });

    let mut artifacts = vec![
        Artifact::new(&config.all_file, encode_subscription(&output.full)),
        Artifact::new(&config.best_file, encode_subscription(&output.top)),
        Artifact::new(&config.status_file, status),
    ];

    if config.per_protocol {
        artifacts.extend(
            per_protocol_subscriptions(&output.full)
                .into_iter()
                .map(|(name, body)| Artifact::new(name, body)),
        );
    }

    artifacts
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_fetched(&self, source: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {source}"));
    }

    fn node_probed(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Probing [{current}/{total}]"));
    }

    fn done(&self, _output: &PipelineOutput) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

fn cmd_parse(descriptors: Vec<String>) -> Result<()> {
    let descriptors = if descriptors.is_empty() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        input
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    } else {
        descriptors
    };

    if descriptors.is_empty() {
        return Err(eyre!("no descriptors given"));
    }

    let results: Vec<serde_json::Value> = descriptors
        .iter()
        .map(|d| match submerge_parser::parse_node(d) {
            Ok(record) => serde_json::json!({ "descriptor": d, "record": record }),
            Err(e) => serde_json::json!({ "descriptor": d, "error": e.to_string() }),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use submerge_core::{RunStats, SilentProgress};
    use submerge_shared::{NodeRecord, Protocol, SubmergeError};

    use super::*;

    /// Serves one fixed body for every source, or fails every fetch.
    struct FixedFetcher(Option<&'static str>);

    impl SourceFetcher for FixedFetcher {
        async fn fetch(&self, source: &str) -> submerge_shared::Result<String> {
            self.0
                .map(String::from)
                .ok_or_else(|| SubmergeError::Network(format!("{source}: connection refused")))
        }
    }

    fn run_config(out_dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.run.sources = vec![
            "https://a.example/sub".into(),
            "https://b.example/sub".into(),
        ];
        config.output.dir = out_dir.to_string_lossy().into_owned();
        config
    }

    fn temp_out_dir() -> PathBuf {
        std::env::temp_dir().join(format!("submerge-cli-test-{}", RunId::new()))
    }

    #[tokio::test]
    async fn failed_run_writes_nothing() {
        let out_dir = temp_out_dir();
        let config = run_config(&out_dir);

        let err = execute_run(&config, &FixedFetcher(None), &SilentProgress)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SubmergeError::NoUsableNodes { sources: 2 }));
        assert!(!out_dir.exists());
        assert!(!out_dir.join("manifest.json").exists());
    }

    #[tokio::test]
    async fn successful_run_writes_artifacts_and_manifest() {
        let out_dir = temp_out_dir();
        let config = run_config(&out_dir);
        let fetcher = FixedFetcher(Some("trojan://pass@1.2.3.4:443#a\nvless://u@5.6.7.8:443#b\n"));

        let report = execute_run(&config, &fetcher, &SilentProgress).await.unwrap();

        assert_eq!(report.output.full.len(), 2);
        for name in ["subscription_all.txt", "subscription_best.txt", "STATUS.md", "manifest.json"] {
            assert!(out_dir.join(name).exists(), "{name} missing");
        }
        let manifest: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(out_dir.join("manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["run_id"], report.run_id.to_string());
        assert_eq!(manifest["artifacts"].as_array().unwrap().len(), 3);

        let _ = std::fs::remove_dir_all(&out_dir);
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "submerge",
            "run",
            "--source",
            "https://a.example/sub",
            "--source",
            "https://b.example/sub",
            "--max-nodes",
            "5",
            "--test-connectivity",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.sources.len(), 2);
        assert_eq!(args.max_nodes, Some(5));
        assert_eq!(args.test_connectivity, Some(true));
        assert!(args.timeout.is_none());
    }

    #[test]
    fn explicit_false_turns_off_connectivity_from_file() {
        let cli = Cli::try_parse_from(["submerge", "run", "--test-connectivity", "false"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.test_connectivity, Some(false));

        let mut config = AppConfig::default();
        config.run.test_connectivity = true;
        apply_overrides(&mut config, args);
        assert!(!config.run.test_connectivity);
    }

    #[test]
    fn absent_connectivity_flag_keeps_file_value() {
        let cli = Cli::try_parse_from(["submerge", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.test_connectivity, None);

        let mut config = AppConfig::default();
        config.run.test_connectivity = true;
        apply_overrides(&mut config, args);
        assert!(config.run.test_connectivity);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = AppConfig::default();
        config.run.sources = vec!["https://file.example/sub".into()];

        apply_overrides(
            &mut config,
            RunArgs {
                sources: vec!["https://cli.example/sub".into()],
                timeout: Some(9),
                out: Some(PathBuf::from("/tmp/out")),
                ..Default::default()
            },
        );

        assert_eq!(config.run.sources, vec!["https://cli.example/sub"]);
        assert_eq!(config.run.timeout_secs, 9);
        assert_eq!(config.run.max_nodes, 50);
        assert!(!config.run.test_connectivity);
        assert_eq!(config.output.dir, "/tmp/out");
    }

    #[test]
    fn empty_overrides_keep_file_values() {
        let mut config = AppConfig::default();
        config.run.sources = vec!["https://file.example/sub".into()];
        apply_overrides(&mut config, RunArgs::default());
        assert_eq!(config.run.sources, vec!["https://file.example/sub"]);
    }

    #[test]
    fn artifacts_cover_configured_outputs() {
        let records = vec![
            NodeRecord::new(Protocol::Vless, "a", 443, "u", None, "vless://u@a:443"),
            NodeRecord::new(Protocol::Trojan, "b", 443, "p", None, "trojan://p@b:443"),
        ];
        let output = PipelineOutput {
            top: records[..1].to_vec(),
            full: records,
            stats: RunStats::default(),
            generated_at: chrono::Utc::now(),
        };

        let mut config = OutputConfig::default();
        let names = |a: &[Artifact]| a.iter().map(|a| a.filename.clone()).collect::<Vec<_>>();

        assert_eq!(
            names(&build_artifacts(&output, &config)),
            vec!["subscription_all.txt", "subscription_best.txt", "STATUS.md"]
        );

        config.per_protocol = true;
        let all = build_artifacts(&output, &config);
        assert_eq!(all.len(), 5);
        assert!(names(&all).contains(&"subscription_trojan.txt".to_string()));
    }
}
