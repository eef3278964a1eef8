use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use super::commands::Commands;
use super::config::cmd_config;
use super::env::CliArgs;
use super::metrics::cmd_metrics;
use super::replay::cmd_replay;
use super::runtime::{init_logging, load_config};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();
    init_logging(&cli.log_level, cli.log_format)?;
    debug!("screenperf v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command.clone() {
        Commands::Config(args) => cmd_config(args, cli.config.as_deref()).await,
        Commands::Replay(args) => {
            let loaded = load_config(cli.config.as_deref()).await?;
            cmd_replay(args, loaded.config).await
        }
        Commands::Metrics(args) => {
            let loaded = load_config(cli.config.as_deref()).await?;
            cmd_metrics(args, loaded.config).await
        }
    };
    if let Err(err) = &result {
        error!("command failed: {err:#}");
    }
    result
}
