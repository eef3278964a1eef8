//! Deterministic replay of recorded host events.
//!
//! A trace is JSON lines, one host event per line, each stamped with the
//! host clock (`at_ms`). Blank lines and `#` comments are skipped. Replay
//! drives a registry on a [`ManualClock`] and never spawns alarms; manual
//! TTFD is checked by explicit `poll` events and by every other event
//! touching the clock.

use std::sync::Arc;

use frame_timing::FrameTiming;
use network_correlator::NetworkDescriptor;
use screenperf_core_types::{ManualClock, ScreenId};
use serde::Deserialize;
use tracing::debug;

use crate::beacon::Beacon;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::registry::SessionRegistry;
use crate::transport::CollectingTransport;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Start {
        at_ms: f64,
        screen: String,
        #[serde(default)]
        manual: bool,
    },
    Frame {
        at_ms: f64,
        #[serde(default)]
        screen: Option<String>,
        #[serde(default)]
        build_ms: Option<f64>,
        #[serde(default)]
        raster_ms: Option<f64>,
    },
    Interaction {
        at_ms: f64,
    },
    Network {
        at_ms: f64,
        #[serde(default)]
        screen: Option<String>,
        request: NetworkDescriptor,
    },
    FullyDrawn {
        at_ms: f64,
        screen: String,
    },
    Poll {
        at_ms: f64,
    },
    Finalize {
        at_ms: f64,
        screen: String,
    },
    Resume {
        at_ms: f64,
    },
}

impl TraceEvent {
    pub fn at_ms(&self) -> f64 {
        match self {
            TraceEvent::Start { at_ms, .. }
            | TraceEvent::Frame { at_ms, .. }
            | TraceEvent::Interaction { at_ms }
            | TraceEvent::Network { at_ms, .. }
            | TraceEvent::FullyDrawn { at_ms, .. }
            | TraceEvent::Poll { at_ms }
            | TraceEvent::Finalize { at_ms, .. }
            | TraceEvent::Resume { at_ms } => *at_ms,
        }
    }
}

pub fn parse_trace(input: &str) -> EngineResult<Vec<TraceEvent>> {
    let mut events = Vec::new();
    let mut last_at = f64::NEG_INFINITY;
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: TraceEvent = serde_json::from_str(line)
            .map_err(|err| EngineError::trace(idx + 1, err.to_string()))?;
        let at = event.at_ms();
        if !at.is_finite() {
            return Err(EngineError::trace(idx + 1, "at_ms must be finite"));
        }
        if at < last_at {
            return Err(EngineError::trace(
                idx + 1,
                format!("at_ms {at} goes backwards (previous {last_at})"),
            ));
        }
        last_at = at;
        events.push(event);
    }
    Ok(events)
}

/// Registry wired to a settable clock and an in-memory transport.
pub struct TraceReplay {
    clock: ManualClock,
    transport: Arc<CollectingTransport>,
    registry: SessionRegistry,
}

impl TraceReplay {
    pub fn new(config: EngineConfig) -> Self {
        let clock = ManualClock::new(0.0);
        let transport = Arc::new(CollectingTransport::new());
        let registry =
            SessionRegistry::with_clock(config, transport.clone(), Arc::new(clock.clone()))
                .without_alarms();
        Self {
            clock,
            transport,
            registry,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn apply(&self, event: &TraceEvent) {
        self.clock.set(event.at_ms());
        match event {
            TraceEvent::Start { screen, manual, .. } => {
                if *manual {
                    self.registry.enable_manual_ttfd(screen.as_str());
                }
                self.registry.start_tracking(screen.as_str());
            }
            TraceEvent::Frame {
                at_ms,
                screen,
                build_ms,
                raster_ms,
            } => {
                let timing = match (build_ms, raster_ms) {
                    (Some(build), Some(raster)) => {
                        FrameTiming::with_phases(*at_ms, *build, *raster)
                    }
                    _ => FrameTiming::at(*at_ms),
                };
                match screen {
                    Some(screen) => self
                        .registry
                        .on_frame_for(&ScreenId::from(screen.as_str()), timing),
                    None => self.registry.on_frame_timing(timing),
                }
            }
            TraceEvent::Interaction { at_ms } => self.registry.on_user_interaction(*at_ms),
            TraceEvent::Network {
                screen, request, ..
            } => {
                let screen = screen.as_deref().map(ScreenId::from);
                let outcome = self
                    .registry
                    .on_network_event(screen.as_ref(), request.clone());
                debug!(outcome = outcome.as_str(), "replayed network event");
            }
            TraceEvent::FullyDrawn { screen, .. } => {
                self.registry.mark_fully_drawn(&ScreenId::from(screen.as_str()));
            }
            TraceEvent::Poll { .. } => {}
            TraceEvent::Finalize { screen, .. } => {
                self.registry
                    .finalize_screen(&ScreenId::from(screen.as_str()));
            }
            TraceEvent::Resume { .. } => {
                self.registry.resume_previous_screen();
            }
        }
        if !matches!(event, TraceEvent::Finalize { .. }) {
            self.registry.poll_manual_ttfd();
        }
    }

    /// Applies every event, then finalizes whatever is still tracked at the
    /// last event's timestamp. Returns beacons in emission order.
    pub fn run(self, events: &[TraceEvent]) -> Vec<Beacon> {
        for event in events {
            self.apply(event);
        }
        self.registry.shutdown();
        self.transport.take()
    }
}

pub fn replay(events: &[TraceEvent], config: EngineConfig) -> Vec<Beacon> {
    TraceReplay::new(config).run(events)
}
