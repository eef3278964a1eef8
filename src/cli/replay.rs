use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use screenperf::{parse_trace, replay, Beacon, EngineConfig, TraceEvent};
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// JSON-lines trace of host events
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Pretty-print each beacon
    #[arg(long)]
    pub pretty: bool,
}

pub async fn cmd_replay(args: ReplayArgs, config: EngineConfig) -> Result<()> {
    let beacons = replay_file(&args.trace, config).await?;
    for beacon in &beacons {
        let rendered = if args.pretty {
            beacon.to_json_pretty()
        } else {
            beacon.to_json()
        }
        .context("serializing beacon")?;
        println!("{rendered}");
    }
    Ok(())
}

pub async fn read_trace(path: &Path) -> Result<Vec<TraceEvent>> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let events = parse_trace(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(events)
}

pub async fn replay_file(path: &Path, config: EngineConfig) -> Result<Vec<Beacon>> {
    let events = read_trace(path).await?;
    let beacons = replay(&events, config);
    info!(
        events = events.len(),
        beacons = beacons.len(),
        "replayed {}",
        path.display()
    );
    Ok(beacons)
}
