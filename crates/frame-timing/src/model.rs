use serde::{Deserialize, Serialize};

/// Classification of a single inter-frame duration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameClass {
    Normal,
    Janky,
    Frozen,
}

impl FrameClass {
    /// Frozen samples count as janky for counting and clustering.
    pub fn is_janky(self) -> bool {
        !matches!(self, FrameClass::Normal)
    }
}

/// Which part of the rendering pipeline dominated a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    Build,
    Raster,
    Unknown,
}

impl RenderPhase {
    pub fn from_split(build_ms: f64, raster_ms: f64) -> Self {
        if build_ms >= raster_ms {
            RenderPhase::Build
        } else {
            RenderPhase::Raster
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderPhase::Build => "build",
            RenderPhase::Raster => "raster",
            RenderPhase::Unknown => "unknown",
        }
    }
}

/// Frame signal delivered by the host scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameTiming {
    pub timestamp_ms: f64,
    #[serde(default)]
    pub build_ms: Option<f64>,
    #[serde(default)]
    pub raster_ms: Option<f64>,
}

impl FrameTiming {
    pub fn at(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            build_ms: None,
            raster_ms: None,
        }
    }

    pub fn with_phases(timestamp_ms: f64, build_ms: f64, raster_ms: f64) -> Self {
        Self {
            timestamp_ms,
            build_ms: Some(build_ms),
            raster_ms: Some(raster_ms),
        }
    }

    pub fn phase(&self) -> RenderPhase {
        match (self.build_ms, self.raster_ms) {
            (Some(build), Some(raster)) => RenderPhase::from_split(build, raster),
            (Some(_), None) => RenderPhase::Build,
            (None, Some(_)) => RenderPhase::Raster,
            (None, None) => RenderPhase::Unknown,
        }
    }
}

/// One classified inter-frame duration. Never leaves the crate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FrameSample {
    pub seq: u64,
    pub timestamp_ms: f64,
    pub duration_ms: f64,
    pub class: FrameClass,
    pub phase: RenderPhase,
}

/// Maximal run of consecutive janky samples.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JankCluster {
    pub id: u32,
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub avg_duration_ms: f64,
    pub worst_duration_ms: f64,
    pub phase: RenderPhase,
    #[serde(skip_serializing)]
    pub frame_count: usize,
    #[serde(skip_serializing)]
    pub severity: f64,
}

/// A single sample above the frozen threshold, reported individually.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenFrame {
    pub frame_number: u64,
    pub timestamp_ms: f64,
    pub duration_ms: f64,
    pub phase: RenderPhase,
}

/// Frozen result of a collection run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSummary {
    pub total_frames: u64,
    pub janky_frames: u64,
    pub frozen_frames: u64,
    pub avg_duration_ms: f64,
    pub worst_duration_ms: f64,
    pub jank_percentage: f64,
    pub jank_clusters: Vec<JankCluster>,
    #[serde(rename = "frozenFrameDetails", skip_serializing_if = "Vec::is_empty")]
    pub frozen_frame_list: Vec<FrozenFrame>,
}

impl FrameSummary {
    pub fn is_empty(&self) -> bool {
        self.total_frames == 0
    }
}
