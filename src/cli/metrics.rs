use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use screenperf::EngineConfig;
use screenperf_observe::metrics::{ensure_metrics, render_prometheus, snapshot};

use super::replay::replay_file;

#[derive(Args, Clone, Debug)]
pub struct MetricsArgs {
    /// Replay this trace first so the output reflects it
    #[arg(long, value_name = "TRACE")]
    pub trace: Option<PathBuf>,

    /// Print a JSON snapshot instead of prometheus text
    #[arg(long)]
    pub json: bool,
}

pub async fn cmd_metrics(args: MetricsArgs, config: EngineConfig) -> Result<()> {
    ensure_metrics();
    if let Some(trace) = args.trace.as_deref() {
        replay_file(trace, config).await?;
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot())?);
    } else {
        print!("{}", render_prometheus());
    }
    Ok(())
}
