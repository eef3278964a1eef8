use tracing::{debug, trace};

use crate::cluster::{detect_clusters, rank_clusters};
use crate::config::FrameTimingConfig;
use crate::model::{FrameClass, FrameSample, FrameSummary, FrameTiming, FrozenFrame, RenderPhase};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CollectorState {
    Idle,
    Collecting,
    Stopped,
}

/// Per-screen accumulator of frame-duration samples.
///
/// `start` anchors the session-local clock, every `on_frame` after that turns
/// the gap to the previous frame into a classified sample, and `stop` freezes
/// intake and produces the summary. A second `stop` returns the same summary.
#[derive(Debug)]
pub struct FrameTimingCollector {
    config: FrameTimingConfig,
    state: CollectorState,
    started_at_ms: f64,
    previous_ms: Option<f64>,
    samples: Vec<FrameSample>,
    frozen: Vec<FrozenFrame>,
    summary: Option<FrameSummary>,
}

impl FrameTimingCollector {
    pub fn new(config: FrameTimingConfig) -> Self {
        Self {
            config,
            state: CollectorState::Idle,
            started_at_ms: 0.0,
            previous_ms: None,
            samples: Vec::new(),
            frozen: Vec::new(),
            summary: None,
        }
    }

    pub fn config(&self) -> &FrameTimingConfig {
        &self.config
    }

    pub fn start(&mut self, at_ms: f64) {
        if self.state != CollectorState::Idle {
            debug!(state = ?self.state, "frame collector already started");
            return;
        }
        self.state = CollectorState::Collecting;
        self.started_at_ms = at_ms;
    }

    pub fn is_collecting(&self) -> bool {
        self.state == CollectorState::Collecting
    }

    /// Number of classified samples so far (the first frame yields none).
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn on_frame(&mut self, timestamp_ms: f64) {
        self.on_frame_timing(FrameTiming::at(timestamp_ms));
    }

    pub fn on_frame_timing(&mut self, timing: FrameTiming) {
        if self.state != CollectorState::Collecting {
            return;
        }
        let now = timing.timestamp_ms;
        let Some(previous) = self.previous_ms else {
            // First frame only anchors the duration pointer.
            self.previous_ms = Some(now);
            return;
        };
        if now < previous {
            debug!(now, previous, "frame timestamp went backwards; dropped");
            return;
        }
        self.previous_ms = Some(now);
        self.record(now, now - previous, timing.phase());
    }

    fn record(&mut self, timestamp_ms: f64, duration_ms: f64, phase: RenderPhase) {
        let class = self.classify(duration_ms);
        let sample = FrameSample {
            seq: self.samples.len() as u64 + 1,
            timestamp_ms: timestamp_ms - self.started_at_ms,
            duration_ms,
            class,
            phase,
        };
        if class == FrameClass::Frozen {
            trace!(seq = sample.seq, duration_ms, "frozen frame");
            self.frozen.push(FrozenFrame {
                frame_number: sample.seq,
                timestamp_ms: sample.timestamp_ms,
                duration_ms,
                phase,
            });
        }
        self.samples.push(sample);
    }

    pub fn classify(&self, duration_ms: f64) -> FrameClass {
        if duration_ms > self.config.frozen_threshold_ms {
            FrameClass::Frozen
        } else if duration_ms > self.config.jank_threshold_ms {
            FrameClass::Janky
        } else {
            FrameClass::Normal
        }
    }

    /// Freezes intake and returns the summary; later calls return it again.
    pub fn stop(&mut self) -> FrameSummary {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }
        self.state = CollectorState::Stopped;
        let summary = self.summarize();
        debug!(
            total = summary.total_frames,
            janky = summary.janky_frames,
            frozen = summary.frozen_frames,
            clusters = summary.jank_clusters.len(),
            "frame collection stopped"
        );
        self.samples = Vec::new();
        self.summary = Some(summary.clone());
        summary
    }

    fn summarize(&mut self) -> FrameSummary {
        if self.samples.is_empty() {
            return FrameSummary::default();
        }

        let total = self.samples.len();
        let mut sum = 0.0;
        let mut worst = 0.0_f64;
        let mut janky = 0u64;
        for sample in &self.samples {
            sum += sample.duration_ms;
            worst = worst.max(sample.duration_ms);
            if sample.class.is_janky() {
                janky += 1;
            }
        }

        let clusters = detect_clusters(&self.samples, self.config.early_cluster_frames);
        let jank_clusters = rank_clusters(clusters, self.config.max_reported_clusters);

        FrameSummary {
            total_frames: total as u64,
            janky_frames: janky,
            frozen_frames: self.frozen.len() as u64,
            avg_duration_ms: sum / total as f64,
            worst_duration_ms: worst,
            jank_percentage: janky as f64 * 100.0 / total as f64,
            jank_clusters,
            frozen_frame_list: std::mem::take(&mut self.frozen),
        }
    }
}

impl Default for FrameTimingCollector {
    fn default() -> Self {
        Self::new(FrameTimingConfig::default())
    }
}
