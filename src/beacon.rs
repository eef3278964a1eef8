//! The outbound report assembled once per finalized screen.

use chrono::{DateTime, Utc};
use display_timing::{DisplayTiming, TtfdSource};
use frame_timing::FrameSummary;
use network_correlator::NetworkDescriptor;
use screenperf_core_types::ScreenId;
use serde::Serialize;
use uuid::Uuid;

/// Value reported for a timing that was never captured.
pub const NOT_CAPTURED_MS: f64 = -1.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Beacon {
    pub screen: ScreenId,
    /// Distinguishes repeated visits of the same screen.
    pub visit_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub ttid: f64,
    pub ttfd: f64,
    pub ttfd_source: TtfdSource,
    pub interacted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_time_ms: Option<f64>,
    pub frame_summary: FrameSummary,
    pub network_requests: Vec<NetworkDescriptor>,
}

impl Beacon {
    /// Builds a beacon from finalized parts. `timing` is expected to come from
    /// a finalized state machine, so a missing source only happens when the
    /// caller skipped finalize and is reported as `finalize`.
    pub fn assemble(
        screen: ScreenId,
        visit_id: Uuid,
        created_at: DateTime<Utc>,
        timing: DisplayTiming,
        frame_summary: FrameSummary,
        network_requests: Vec<NetworkDescriptor>,
    ) -> Self {
        Self {
            screen,
            visit_id,
            created_at,
            ttid: timing.ttid_ms.unwrap_or(NOT_CAPTURED_MS),
            ttfd: timing.ttfd_ms.unwrap_or(NOT_CAPTURED_MS),
            ttfd_source: timing.ttfd_source.unwrap_or(TtfdSource::Finalize),
            interacted: timing.interacted,
            interaction_time_ms: timing.interaction_time_ms,
            frame_summary,
            network_requests,
        }
    }

    pub fn ttid_captured(&self) -> bool {
        self.ttid >= 0.0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
