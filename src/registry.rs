//! Process-wide table of tracked screens plus the back-navigation history.
//!
//! The registry is an explicit object owned by the host's composition root.
//! Frame events are delivered to every live session; interactions and
//! network events without a screen go to the current screen.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use display_timing::{TtfdMode, TtfdSource};
use frame_timing::FrameTiming;
use network_correlator::{AddOutcome, NetworkCorrelator, NetworkDescriptor};
use parking_lot::Mutex;
use screenperf_core_types::{Clock, MonotonicClock, ScreenId};
use screenperf_observe::tracing::screen_span;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alarm::ManualTtfdAlarm;
use crate::beacon::Beacon;
use crate::config::EngineConfig;
use crate::metrics;
use crate::session::ScreenSession;
use crate::transport::BeaconTransport;

type SharedSession = Arc<Mutex<ScreenSession>>;

pub struct SessionRegistry {
    sessions: DashMap<ScreenId, SharedSession>,
    history: Mutex<Vec<ScreenId>>,
    manual_screens: DashSet<ScreenId>,
    correlator: Arc<NetworkCorrelator>,
    transport: Arc<dyn BeaconTransport>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    shutdown: CancellationToken,
    spawn_alarms: bool,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig, transport: Arc<dyn BeaconTransport>) -> Self {
        Self::with_clock(config, transport, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        config: EngineConfig,
        transport: Arc<dyn BeaconTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let correlator = Arc::new(NetworkCorrelator::with_config(config.network.clone()));
        Self {
            sessions: DashMap::new(),
            history: Mutex::new(Vec::new()),
            manual_screens: DashSet::new(),
            correlator,
            transport,
            clock,
            config,
            shutdown: CancellationToken::new(),
            spawn_alarms: true,
        }
    }

    /// Disables the background manual-TTFD alarm; the host must then call
    /// [`Self::poll_manual_ttfd`] itself.
    pub fn without_alarms(mut self) -> Self {
        self.spawn_alarms = false;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn correlator(&self) -> Arc<NetworkCorrelator> {
        Arc::clone(&self.correlator)
    }

    pub fn session(&self, screen: &ScreenId) -> Option<SharedSession> {
        self.sessions
            .get(screen)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_tracking(&self, screen: &ScreenId) -> bool {
        self.sessions.contains_key(screen)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn current_screen(&self) -> Option<ScreenId> {
        self.correlator.current_screen()
    }

    /// Snapshot of the history stack, bottom first.
    pub fn history(&self) -> Vec<ScreenId> {
        self.history.lock().clone()
    }

    /// Opts a screen into manual TTFD. Applies to every later visit,
    /// including restarts and resumes, until [`Self::disable_manual_ttfd`].
    pub fn enable_manual_ttfd(&self, screen: impl Into<ScreenId>) {
        let screen = screen.into();
        debug!(screen = %screen, "manual ttfd requested");
        self.manual_screens.insert(screen);
    }

    /// Returns the screen to automatic TTFD from its next visit on. A live
    /// session keeps the mode it started with.
    pub fn disable_manual_ttfd(&self, screen: &ScreenId) -> bool {
        let removed = self.manual_screens.remove(screen).is_some();
        if removed {
            debug!(screen = %screen, "manual ttfd withdrawn");
        }
        removed
    }

    pub fn is_manual_ttfd(&self, screen: &ScreenId) -> bool {
        self.manual_screens.contains(screen)
    }

    /// Starts a fresh session for `screen`. A live session for the same
    /// screen is finalized first and its beacon returned.
    pub fn start_tracking(&self, screen: impl Into<ScreenId>) -> Option<Beacon> {
        let screen = screen.into();
        let span = screen_span(screen.as_str());
        let _entered = span.enter();

        let replaced = if self.sessions.contains_key(&screen) {
            debug!("screen already tracked, finalizing previous session");
            self.finalize_screen(&screen)
        } else {
            None
        };

        let mode = if self.manual_screens.contains(&screen) {
            TtfdMode::Manual
        } else {
            TtfdMode::Automatic
        };
        let session = Arc::new(Mutex::new(ScreenSession::begin(
            screen.clone(),
            &self.config,
            mode,
            self.clock.now_ms(),
        )));

        {
            let mut history = self.history.lock();
            if history.last() != Some(&screen) {
                history.push(screen.clone());
            }
        }
        self.correlator.enable(&screen);
        self.correlator.set_current_screen(Some(screen.clone()));

        if mode == TtfdMode::Manual && self.spawn_alarms {
            self.attach_alarm(&session);
        }
        self.sessions.insert(screen, session);
        metrics::set_active_screens(self.sessions.len());
        info!(?mode, "tracking started");
        replaced
    }

    fn attach_alarm(&self, session: &SharedSession) {
        let token = session.lock().cancellation();
        let period = Duration::from_millis(self.config.display.manual_poll_interval_ms);
        let alarm = ManualTtfdAlarm::spawn(
            Arc::downgrade(session),
            Arc::clone(&self.clock),
            period,
            token,
        );
        match alarm {
            Some(alarm) => session.lock().attach_alarm(alarm),
            None => debug!("no tokio runtime, manual ttfd relies on host polling"),
        }
    }

    /// Removes and finalizes the session for `screen`, drains its network
    /// buffer and hands the beacon to the transport. Unknown screens are a
    /// logged no-op.
    pub fn finalize_screen(&self, screen: &ScreenId) -> Option<Beacon> {
        let Some((_, session)) = self.sessions.remove(screen) else {
            debug!(screen = %screen, "finalize requested for untracked screen");
            return None;
        };
        {
            let mut history = self.history.lock();
            if history.last() == Some(screen) {
                history.pop();
            }
        }
        let network = self.correlator.consume_for_screen(screen);
        if self.correlator.current_screen().as_ref() == Some(screen) {
            self.correlator.set_current_screen(None);
        }

        let beacon = session.lock().finalize(self.clock.now_ms(), network)?;
        metrics::set_active_screens(self.sessions.len());
        metrics::record_beacon(&beacon);
        self.dispatch(&beacon);
        info!(
            screen = %screen,
            ttid_ms = beacon.ttid,
            ttfd_ms = beacon.ttfd,
            source = %beacon.ttfd_source,
            frames = beacon.frame_summary.total_frames,
            requests = beacon.network_requests.len(),
            "screen finalized"
        );
        Some(beacon)
    }

    fn dispatch(&self, beacon: &Beacon) {
        if let Err(err) = self.transport.dispatch(beacon) {
            metrics::record_transport_failure();
            warn!(screen = %beacon.screen, %err, "beacon transport failed");
        }
    }

    /// Finalizes after the configured settle delay. The wait is cut short
    /// when the registry shuts down.
    pub async fn finalize_screen_settled(&self, screen: &ScreenId) -> Option<Beacon> {
        let delay = self.config.session.settle_delay_ms;
        if delay > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                _ = self.shutdown.cancelled() => {
                    debug!(screen = %screen, "settle wait cancelled by shutdown");
                }
            }
        }
        self.finalize_screen(screen)
    }

    /// Restarts tracking on the top of the history stack. Prior metrics for
    /// that screen are not revived.
    pub fn resume_previous_screen(&self) -> Option<ScreenId> {
        let top = self.history.lock().last().cloned();
        let Some(screen) = top else {
            debug!("resume requested with empty history");
            return None;
        };
        self.start_tracking(screen.clone());
        Some(screen)
    }

    /// Second-from-top history entry.
    pub fn last_tracked_screen(&self) -> Option<ScreenId> {
        let history = self.history.lock();
        history.len().checked_sub(2).map(|idx| history[idx].clone())
    }

    pub fn on_frame_rendered(&self, timestamp_ms: f64) {
        self.on_frame_timing(FrameTiming::at(timestamp_ms));
    }

    /// Delivers one frame to every live session.
    pub fn on_frame_timing(&self, timing: FrameTiming) {
        for session in self.live_sessions() {
            let mut guard = session.lock();
            if let Some(source) = guard.on_frame(timing) {
                note_capture(guard.id(), source);
            }
        }
    }

    /// Delivers one frame to a single screen.
    pub fn on_frame_for(&self, screen: &ScreenId, timing: FrameTiming) {
        let Some(session) = self.session(screen) else {
            debug!(screen = %screen, "frame for untracked screen ignored");
            return;
        };
        let mut guard = session.lock();
        if let Some(source) = guard.on_frame(timing) {
            note_capture(guard.id(), source);
        }
    }

    pub fn on_user_interaction(&self, timestamp_ms: f64) {
        let Some(screen) = self.current_screen() else {
            debug!("interaction without a current screen ignored");
            return;
        };
        let Some(session) = self.session(&screen) else {
            return;
        };
        let mut guard = session.lock();
        if let Some(source) = guard.on_user_interaction(timestamp_ms) {
            note_capture(guard.id(), source);
        }
    }

    /// Routes a request descriptor to `screen`, or to the current screen when
    /// none is given. Drops are counted, never returned as errors.
    pub fn on_network_event(
        &self,
        screen: Option<&ScreenId>,
        descriptor: NetworkDescriptor,
    ) -> AddOutcome {
        let outcome = match screen {
            Some(screen) => self.correlator.add_request(screen, descriptor),
            None => self.correlator.add_to_current_screen(descriptor),
        };
        metrics::record_network_outcome(outcome);
        outcome
    }

    pub fn mark_fully_drawn(&self, screen: &ScreenId) {
        match self.session(screen) {
            Some(session) => session.lock().mark_fully_drawn(),
            None => debug!(screen = %screen, "fully drawn for untracked screen ignored"),
        }
    }

    /// Polls every manual-mode session once. Returns how many captured TTFD.
    pub fn poll_manual_ttfd(&self) -> usize {
        let now = self.clock.now_ms();
        let mut captured = 0;
        for session in self.live_sessions() {
            let mut guard = session.lock();
            if guard.mode() != TtfdMode::Manual {
                continue;
            }
            if let Some(source) = guard.poll_manual(now) {
                note_capture(guard.id(), source);
                captured += 1;
            }
        }
        captured
    }

    /// Cancels pending settle waits and finalizes every live session, oldest
    /// first.
    pub fn shutdown(&self) -> Vec<Beacon> {
        self.shutdown.cancel();
        let mut screens: Vec<(f64, ScreenId)> = self
            .sessions
            .iter()
            .map(|entry| (entry.value().lock().started_at_ms(), entry.key().clone()))
            .collect();
        screens.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        let beacons: Vec<Beacon> = screens
            .iter()
            .filter_map(|(_, screen)| self.finalize_screen(screen))
            .collect();
        info!(finalized = beacons.len(), "registry shut down");
        beacons
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn live_sessions(&self) -> Vec<SharedSession> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn note_capture(screen: &ScreenId, source: TtfdSource) {
    metrics::record_ttfd_capture(source);
    debug!(screen = %screen, %source, "ttfd captured");
}
