use clap::Subcommand;

use super::config::ConfigArgs;
use super::metrics::MetricsArgs;
use super::replay::ReplayArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Replay a JSON-lines trace of host events and print the beacons
    Replay(ReplayArgs),

    /// Show or validate the engine configuration
    Config(ConfigArgs),

    /// Print engine metrics in prometheus text format
    Metrics(MetricsArgs),
}
