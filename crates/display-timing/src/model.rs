use std::fmt;

use serde::{Deserialize, Serialize};

/// Strategy that produced the TTFD value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtfdSource {
    StableFrames,
    Interaction,
    Manual,
    Timeout,
    Finalize,
}

impl TtfdSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TtfdSource::StableFrames => "stable_frames",
            TtfdSource::Interaction => "interaction",
            TtfdSource::Manual => "manual",
            TtfdSource::Timeout => "timeout",
            TtfdSource::Finalize => "finalize",
        }
    }
}

impl fmt::Display for TtfdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How TTFD is detected for a screen, fixed at `begin`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtfdMode {
    /// Frame stability, preempted by the first user interaction.
    #[default]
    Automatic,
    /// Waits for an external "fully drawn" signal.
    Manual,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisplayPhase {
    Idle,
    Tracking,
    Captured(TtfdSource),
    Finalized,
}

/// Captured display timings. `None` means the value was never captured.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTiming {
    pub ttid_ms: Option<f64>,
    pub ttfd_ms: Option<f64>,
    pub ttfd_source: Option<TtfdSource>,
    pub interacted: bool,
    pub interaction_time_ms: Option<f64>,
}
