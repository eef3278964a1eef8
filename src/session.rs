//! One tracked visit of a screen: frame collector, display state machine and
//! the bookkeeping needed to tear it down exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use display_timing::{DisplayTiming, DisplayTimingStateMachine, TtfdMode, TtfdSource};
use frame_timing::{FrameSummary, FrameTiming, FrameTimingCollector};
use network_correlator::NetworkDescriptor;
use screenperf_core_types::ScreenId;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::alarm::ManualTtfdAlarm;
use crate::beacon::Beacon;
use crate::config::EngineConfig;

pub struct ScreenSession {
    id: ScreenId,
    visit_id: Uuid,
    created_at: DateTime<Utc>,
    started_at_ms: f64,
    frames: FrameTimingCollector,
    display: DisplayTimingStateMachine,
    disposed: Arc<AtomicBool>,
    cancel: CancellationToken,
    alarm: Option<ManualTtfdAlarm>,
    emit_frozen_frames: bool,
}

impl ScreenSession {
    /// Creates a session and starts both the collector and the state machine at `now_ms`.
    pub fn begin(id: ScreenId, config: &EngineConfig, mode: TtfdMode, now_ms: f64) -> Self {
        let mut frames = FrameTimingCollector::new(config.frames.clone());
        frames.start(now_ms);
        let mut display = DisplayTimingStateMachine::new(config.display.clone());
        display.begin(now_ms, mode);
        let visit_id = Uuid::new_v4();
        debug!(screen = %id, %visit_id, ?mode, at_ms = now_ms, "screen session started");
        Self {
            id,
            visit_id,
            created_at: Utc::now(),
            started_at_ms: now_ms,
            frames,
            display,
            disposed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            alarm: None,
            emit_frozen_frames: config.session.emit_frozen_frames,
        }
    }

    pub fn id(&self) -> &ScreenId {
        &self.id
    }

    pub fn visit_id(&self) -> Uuid {
        self.visit_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at_ms(&self) -> f64 {
        self.started_at_ms
    }

    pub fn mode(&self) -> TtfdMode {
        self.display.mode()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Flag shared with callbacks that may outlive the registry entry.
    pub fn disposed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.disposed)
    }

    /// Token cancelled when the session is finalized.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn attach_alarm(&mut self, alarm: ManualTtfdAlarm) {
        self.alarm = Some(alarm);
    }

    pub fn has_alarm(&self) -> bool {
        self.alarm.is_some()
    }

    pub fn display_timing(&self) -> DisplayTiming {
        self.display.timing()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.sample_count()
    }

    pub fn on_frame(&mut self, timing: FrameTiming) -> Option<TtfdSource> {
        if self.is_disposed() {
            return None;
        }
        self.frames.on_frame_timing(timing);
        self.display.on_frame_rendered(timing.timestamp_ms)
    }

    pub fn on_user_interaction(&mut self, timestamp_ms: f64) -> Option<TtfdSource> {
        if self.is_disposed() {
            return None;
        }
        self.display.on_user_interaction(timestamp_ms)
    }

    pub fn mark_fully_drawn(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.display.mark_fully_drawn();
    }

    /// Manual-mode check; `None` while still waiting or when nothing applies.
    pub fn poll_manual(&mut self, now_ms: f64) -> Option<TtfdSource> {
        if self.is_disposed() {
            return None;
        }
        self.display.poll(now_ms)
    }

    /// Disposes the session and builds its beacon. Returns `None` when the
    /// session was already finalized.
    pub fn finalize(&mut self, now_ms: f64, network: Vec<NetworkDescriptor>) -> Option<Beacon> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.cancel.cancel();
        self.alarm = None;

        let timing = self.display.finalize(now_ms);
        let mut summary: FrameSummary = self.frames.stop();
        if !self.emit_frozen_frames {
            summary.frozen_frame_list.clear();
        }
        Some(Beacon::assemble(
            self.id.clone(),
            self.visit_id,
            self.created_at,
            timing,
            summary,
            network,
        ))
    }
}

impl Drop for ScreenSession {
    fn drop(&mut self) {
        self.disposed.store(true, Ordering::Release);
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(mode: TtfdMode) -> ScreenSession {
        ScreenSession::begin(ScreenId::from("home"), &EngineConfig::default(), mode, 100.0)
    }

    #[test]
    fn finalize_assembles_beacon_once() {
        let mut session = session(TtfdMode::Automatic);
        for ts in [110.0, 120.0, 130.0, 140.0] {
            session.on_frame(FrameTiming::at(ts));
        }
        let beacon = session.finalize(200.0, Vec::new()).unwrap();
        assert_eq!(beacon.ttid, 10.0);
        assert_eq!(beacon.ttfd_source, TtfdSource::StableFrames);
        assert_eq!(beacon.frame_summary.total_frames, 3);
        assert!(session.is_disposed());
        assert!(session.cancellation().is_cancelled());
        assert!(session.finalize(300.0, Vec::new()).is_none());
    }

    #[test]
    fn disposed_session_ignores_events() {
        let mut session = session(TtfdMode::Automatic);
        session.finalize(150.0, Vec::new());
        assert!(session.on_frame(FrameTiming::at(160.0)).is_none());
        assert!(session.on_user_interaction(170.0).is_none());
        assert_eq!(session.frame_count(), 0);
    }

    #[test]
    fn frozen_list_can_be_suppressed() {
        let mut config = EngineConfig::default();
        config.session.emit_frozen_frames = false;
        let mut session =
            ScreenSession::begin(ScreenId::from("feed"), &config, TtfdMode::Automatic, 0.0);
        session.on_frame(FrameTiming::at(10.0));
        session.on_frame(FrameTiming::at(900.0));
        let beacon = session.finalize(1_000.0, Vec::new()).unwrap();
        assert_eq!(beacon.frame_summary.frozen_frames, 1);
        assert!(beacon.frame_summary.frozen_frame_list.is_empty());
    }

    #[test]
    fn manual_session_reports_manual_source() {
        let mut session = session(TtfdMode::Manual);
        session.mark_fully_drawn();
        assert_eq!(session.poll_manual(180.0), Some(TtfdSource::Manual));
        let beacon = session.finalize(200.0, Vec::new()).unwrap();
        assert_eq!(beacon.ttfd, 80.0);
        assert_eq!(beacon.ttfd_source, TtfdSource::Manual);
    }
}
