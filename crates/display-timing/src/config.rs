use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayTimingConfig {
    /// Inter-frame duration at or below which a frame counts as stable.
    pub stable_frame_ms: f64,
    /// Inter-frame duration above which the stable run restarts.
    pub reset_frame_ms: f64,
    /// Consecutive stable frames needed before TTFD is declared.
    pub required_stable_frames: u32,
    pub ttfd_timeout_ms: u64,
    /// Poll period of the manual "fully drawn" alarm.
    pub manual_poll_interval_ms: u64,
}

impl Default for DisplayTimingConfig {
    fn default() -> Self {
        Self {
            stable_frame_ms: 16.0,
            reset_frame_ms: 32.0,
            required_stable_frames: 3,
            ttfd_timeout_ms: 10_000,
            manual_poll_interval_ms: 50,
        }
    }
}
