use tracing::{debug, trace};

use crate::config::DisplayTimingConfig;
use crate::model::{DisplayPhase, DisplayTiming, TtfdMode, TtfdSource};

/// TTID/TTFD capture for one screen visit.
///
/// Every TTFD path funnels through [`Self::capture_ttfd`], the only place the
/// value is written, so the first strategy to fire wins and later ones are
/// no-ops.
#[derive(Debug)]
pub struct DisplayTimingStateMachine {
    config: DisplayTimingConfig,
    phase: DisplayPhase,
    mode: TtfdMode,
    begun_at_ms: f64,
    ttid_ms: Option<f64>,
    ttfd: Option<(f64, TtfdSource)>,
    interaction_ms: Option<f64>,
    last_frame_ms: Option<f64>,
    stable_run: u32,
    fully_drawn: bool,
}

impl DisplayTimingStateMachine {
    pub fn new(config: DisplayTimingConfig) -> Self {
        Self {
            config,
            phase: DisplayPhase::Idle,
            mode: TtfdMode::Automatic,
            begun_at_ms: 0.0,
            ttid_ms: None,
            ttfd: None,
            interaction_ms: None,
            last_frame_ms: None,
            stable_run: 0,
            fully_drawn: false,
        }
    }

    pub fn phase(&self) -> DisplayPhase {
        self.phase
    }

    pub fn mode(&self) -> TtfdMode {
        self.mode
    }

    pub fn config(&self) -> &DisplayTimingConfig {
        &self.config
    }

    pub fn is_ttfd_captured(&self) -> bool {
        self.ttfd.is_some()
    }

    fn is_live(&self) -> bool {
        matches!(self.phase, DisplayPhase::Tracking | DisplayPhase::Captured(_))
    }

    fn elapsed(&self, now_ms: f64) -> f64 {
        (now_ms - self.begun_at_ms).max(0.0)
    }

    fn timed_out(&self, elapsed_ms: f64) -> bool {
        elapsed_ms > self.config.ttfd_timeout_ms as f64
    }

    /// Starts TTID and TTFD capture. Only the first call has an effect.
    pub fn begin(&mut self, at_ms: f64, mode: TtfdMode) {
        if self.phase != DisplayPhase::Idle {
            debug!(phase = ?self.phase, "display timing already begun");
            return;
        }
        self.phase = DisplayPhase::Tracking;
        self.mode = mode;
        self.begun_at_ms = at_ms;
    }

    /// Single guarded write of TTFD. Returns false when a value already exists.
    fn capture_ttfd(&mut self, elapsed_ms: f64, source: TtfdSource) -> bool {
        if self.ttfd.is_some() {
            return false;
        }
        debug!(ttfd_ms = elapsed_ms, %source, "ttfd captured");
        self.ttfd = Some((elapsed_ms, source));
        if self.phase == DisplayPhase::Tracking {
            self.phase = DisplayPhase::Captured(source);
        }
        true
    }

    /// Host "post-frame" signal. Returns the TTFD source if this frame
    /// completed TTFD.
    pub fn on_frame_rendered(&mut self, timestamp_ms: f64) -> Option<TtfdSource> {
        if !self.is_live() {
            return None;
        }
        let elapsed = self.elapsed(timestamp_ms);
        if self.ttid_ms.is_none() {
            trace!(ttid_ms = elapsed, "ttid captured");
            self.ttid_ms = Some(elapsed);
        }

        let previous = self.last_frame_ms.replace(timestamp_ms);
        if self.ttfd.is_some() || self.mode != TtfdMode::Automatic {
            return None;
        }

        if self.timed_out(elapsed) {
            return self
                .capture_ttfd(elapsed, TtfdSource::Timeout)
                .then_some(TtfdSource::Timeout);
        }

        let duration = timestamp_ms - previous?;
        if duration <= self.config.stable_frame_ms {
            self.stable_run += 1;
        } else if duration > self.config.reset_frame_ms {
            self.stable_run = 0;
        }

        if self.stable_run >= self.config.required_stable_frames {
            return self
                .capture_ttfd(elapsed, TtfdSource::StableFrames)
                .then_some(TtfdSource::StableFrames);
        }
        None
    }

    /// First user interaction preempts stability detection in automatic mode.
    pub fn on_user_interaction(&mut self, timestamp_ms: f64) -> Option<TtfdSource> {
        if !self.is_live() {
            return None;
        }
        let elapsed = self.elapsed(timestamp_ms);
        if self.interaction_ms.is_none() {
            self.interaction_ms = Some(elapsed);
        }
        if self.mode != TtfdMode::Automatic {
            return None;
        }
        self.capture_ttfd(elapsed, TtfdSource::Interaction)
            .then_some(TtfdSource::Interaction)
    }

    /// Raises the manual "fully drawn" flag; picked up by the next [`Self::poll`].
    pub fn mark_fully_drawn(&mut self) {
        if self.phase == DisplayPhase::Finalized {
            return;
        }
        if self.mode != TtfdMode::Manual && self.phase != DisplayPhase::Idle {
            debug!("fully drawn signal ignored in automatic mode");
            return;
        }
        self.fully_drawn = true;
    }

    /// Manual-mode check, driven by the alarm at a fixed interval.
    pub fn poll(&mut self, now_ms: f64) -> Option<TtfdSource> {
        if self.phase != DisplayPhase::Tracking || self.mode != TtfdMode::Manual {
            return None;
        }
        let elapsed = self.elapsed(now_ms);
        let source = if self.fully_drawn {
            TtfdSource::Manual
        } else if self.timed_out(elapsed) {
            TtfdSource::Timeout
        } else {
            return None;
        };
        self.capture_ttfd(elapsed, source).then_some(source)
    }

    /// Closes the machine, filling TTFD from the finalize fallback if no
    /// strategy fired. TTID is left unset when no frame ever arrived.
    pub fn finalize(&mut self, now_ms: f64) -> DisplayTiming {
        if self.is_live() {
            let elapsed = self.elapsed(now_ms);
            self.capture_ttfd(elapsed, TtfdSource::Finalize);
        }
        self.phase = DisplayPhase::Finalized;
        self.timing()
    }

    pub fn timing(&self) -> DisplayTiming {
        DisplayTiming {
            ttid_ms: self.ttid_ms,
            ttfd_ms: self.ttfd.map(|(ms, _)| ms),
            ttfd_source: self.ttfd.map(|(_, source)| source),
            interacted: self.interaction_ms.is_some(),
            interaction_time_ms: self.interaction_ms,
        }
    }
}

impl Default for DisplayTimingStateMachine {
    fn default() -> Self {
        Self::new(DisplayTimingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn automatic() -> DisplayTimingStateMachine {
        let mut machine = DisplayTimingStateMachine::default();
        machine.begin(1_000.0, TtfdMode::Automatic);
        machine
    }

    #[test]
    fn events_before_begin_are_ignored() {
        let mut machine = DisplayTimingStateMachine::default();
        assert_eq!(machine.on_frame_rendered(10.0), None);
        assert_eq!(machine.on_user_interaction(10.0), None);
        assert_eq!(machine.phase(), DisplayPhase::Idle);
        assert_eq!(machine.timing(), DisplayTiming::default());
    }

    #[test]
    fn ttid_is_first_frame_after_begin() {
        let mut machine = automatic();
        machine.on_frame_rendered(1_120.0);
        machine.on_frame_rendered(1_200.0);
        assert_eq!(machine.timing().ttid_ms, Some(120.0));
    }

    #[test]
    fn mild_jank_keeps_the_stable_run() {
        let mut machine = automatic();
        machine.on_frame_rendered(1_000.0);
        machine.on_frame_rendered(1_016.0);
        machine.on_frame_rendered(1_032.0);
        // 25ms sits between the stable and reset thresholds.
        machine.on_frame_rendered(1_057.0);
        assert!(!machine.is_ttfd_captured());
        assert_eq!(
            machine.on_frame_rendered(1_073.0),
            Some(TtfdSource::StableFrames)
        );
        assert_eq!(machine.timing().ttfd_ms, Some(73.0));
    }

    #[test]
    fn long_frame_resets_the_stable_run() {
        let mut machine = automatic();
        machine.on_frame_rendered(1_000.0);
        machine.on_frame_rendered(1_016.0);
        machine.on_frame_rendered(1_032.0);
        machine.on_frame_rendered(1_082.0);
        machine.on_frame_rendered(1_098.0);
        machine.on_frame_rendered(1_114.0);
        assert!(!machine.is_ttfd_captured());
        assert_eq!(
            machine.on_frame_rendered(1_130.0),
            Some(TtfdSource::StableFrames)
        );
    }

    #[test]
    fn mark_fully_drawn_is_ignored_in_automatic_mode() {
        let mut machine = automatic();
        machine.mark_fully_drawn();
        assert_eq!(machine.poll(2_000.0), None);
        assert!(!machine.is_ttfd_captured());
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut machine = automatic();
        let first = machine.finalize(1_500.0);
        let second = machine.finalize(9_000.0);
        assert_eq!(first, second);
        assert_eq!(first.ttfd_source, Some(TtfdSource::Finalize));
        assert_eq!(first.ttfd_ms, Some(500.0));
    }
}
