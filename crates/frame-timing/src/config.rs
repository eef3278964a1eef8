//! Thresholds used by the frame timing collector.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTimingConfig {
    /// A sample is janky when its duration exceeds one 60 Hz frame budget.
    pub jank_threshold_ms: f64,
    /// A sample is frozen when its duration exceeds this stall threshold.
    pub frozen_threshold_ms: f64,
    /// Upper bound on clusters kept in the summary after ranking.
    pub max_reported_clusters: usize,
    /// Clusters starting at or before this sequence number get the early-load bonus.
    pub early_cluster_frames: u64,
}

impl Default for FrameTimingConfig {
    fn default() -> Self {
        Self {
            jank_threshold_ms: 16.67,
            frozen_threshold_ms: 700.0,
            max_reported_clusters: 10,
            early_cluster_frames: 10,
        }
    }
}
