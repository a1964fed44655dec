//! submerge CLI: aggregate proxy subscriptions into ranked feeds.
//!
//! Fetches every configured source, normalizes and deduplicates the nodes,
//! optionally probes them, and writes full/top subscriptions plus a status
//! table.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
