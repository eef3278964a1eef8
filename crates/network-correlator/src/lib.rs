//! Per-screen correlation of outbound network requests.
//!
//! The HTTP-client collaborator pushes request descriptors either for an
//! explicit screen or for whichever screen is current. Each tracked screen
//! owns a bounded buffer that is drained exactly once when the screen is
//! finalized. Buffers are independent, so there is no cross-screen locking.

pub mod config;
pub mod url_cap;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use crate::config::CorrelatorConfig;
pub use crate::url_cap::cap_url;
pub use screenperf_core_types::ScreenId;

/// One outbound request as reported by the HTTP-client collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NetworkDescriptor {
    pub fn new(method: impl Into<String>, url: impl Into<String>, start_time_ms: f64) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status_code: None,
            start_time_ms,
            end_time_ms: start_time_ms,
            duration_ms: 0.0,
            payload_size: None,
            content_type: None,
            error: None,
        }
    }

    pub fn completed(mut self, status_code: u16, end_time_ms: f64) -> Self {
        self.status_code = Some(status_code);
        self.finish_at(end_time_ms);
        self
    }

    pub fn failed(mut self, error: impl Into<String>, end_time_ms: f64) -> Self {
        self.error = Some(error.into());
        self.finish_at(end_time_ms);
        self
    }

    pub fn with_payload(mut self, size: u64, content_type: Option<String>) -> Self {
        self.payload_size = Some(size);
        self.content_type = content_type;
        self
    }

    fn finish_at(&mut self, end_time_ms: f64) {
        self.end_time_ms = end_time_ms.max(self.start_time_ms);
        self.duration_ms = self.end_time_ms - self.start_time_ms;
    }
}

/// What happened to a descriptor handed to the correlator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddOutcome {
    Stored,
    /// The screen already holds the configured maximum.
    DroppedCapacity,
    /// No buffer exists for the screen (never tracked or already drained).
    DroppedUntracked,
    /// Routed through the current screen while none was set.
    DroppedNoCurrentScreen,
}

impl AddOutcome {
    pub fn is_stored(self) -> bool {
        matches!(self, AddOutcome::Stored)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AddOutcome::Stored => "stored",
            AddOutcome::DroppedCapacity => "capacity",
            AddOutcome::DroppedUntracked => "untracked",
            AddOutcome::DroppedNoCurrentScreen => "no_current_screen",
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum CorrelatorError {
    #[error("screen {0} is not tracked")]
    ScreenNotTracked(ScreenId),
}

#[derive(Debug, Default)]
struct ScreenBuffer {
    state: Mutex<BufferState>,
    dropped: AtomicU64,
}

/// Entries plus the drained marker, guarded together so a writer holding a
/// stale handle cannot append after the drain.
#[derive(Debug, Default)]
struct BufferState {
    entries: Vec<NetworkDescriptor>,
    closed: bool,
}

/// Bounded per-screen request buffers plus the "current screen" pointer.
pub struct NetworkCorrelator {
    buffers: DashMap<ScreenId, Arc<ScreenBuffer>>,
    current: RwLock<Option<ScreenId>>,
    config: CorrelatorConfig,
}

impl NetworkCorrelator {
    pub fn new() -> Self {
        Self::with_config(CorrelatorConfig::default())
    }

    pub fn with_config(config: CorrelatorConfig) -> Self {
        Self {
            buffers: DashMap::new(),
            current: RwLock::new(None),
            config,
        }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Opens an empty buffer for `screen`. Existing buffers are kept.
    pub fn enable(&self, screen: &ScreenId) {
        self.buffers
            .entry(screen.clone())
            .or_insert_with(|| Arc::new(ScreenBuffer::default()));
    }

    pub fn is_tracked(&self, screen: &ScreenId) -> bool {
        self.buffers.contains_key(screen)
    }

    pub fn add_request(&self, screen: &ScreenId, mut descriptor: NetworkDescriptor) -> AddOutcome {
        let Some(buffer) = self
            .buffers
            .get(screen)
            .map(|entry| Arc::clone(entry.value()))
        else {
            debug!(%screen, url = %descriptor.url, "request for untracked screen dropped");
            return AddOutcome::DroppedUntracked;
        };

        let mut state = buffer.state.lock();
        if state.closed {
            debug!(%screen, url = %descriptor.url, "request raced the drain, dropped");
            return AddOutcome::DroppedUntracked;
        }
        if state.entries.len() >= self.config.max_requests_per_screen {
            let previously_dropped = buffer.dropped.fetch_add(1, Ordering::Relaxed);
            if previously_dropped == 0 {
                debug!(
                    %screen,
                    cap = self.config.max_requests_per_screen,
                    "network buffer full; further requests dropped"
                );
            }
            return AddOutcome::DroppedCapacity;
        }
        descriptor.url = cap_url(&descriptor.url, self.config.query_cap_len);
        state.entries.push(descriptor);
        AddOutcome::Stored
    }

    /// Removes the screen's buffer and returns its contents in insertion
    /// order. A second call for the same screen returns nothing.
    pub fn consume_for_screen(&self, screen: &ScreenId) -> Vec<NetworkDescriptor> {
        match self.buffers.remove(screen) {
            Some((_, buffer)) => {
                let dropped = buffer.dropped.load(Ordering::Relaxed);
                if dropped > 0 {
                    debug!(%screen, dropped, "network requests dropped over capacity");
                }
                let mut state = buffer.state.lock();
                state.closed = true;
                std::mem::take(&mut state.entries)
            }
            None => Vec::new(),
        }
    }

    pub fn buffered(&self, screen: &ScreenId) -> Result<usize, CorrelatorError> {
        self.buffers
            .get(screen)
            .map(|entry| entry.value().state.lock().entries.len())
            .ok_or_else(|| CorrelatorError::ScreenNotTracked(screen.clone()))
    }

    pub fn dropped(&self, screen: &ScreenId) -> Result<u64, CorrelatorError> {
        self.buffers
            .get(screen)
            .map(|entry| entry.value().dropped.load(Ordering::Relaxed))
            .ok_or_else(|| CorrelatorError::ScreenNotTracked(screen.clone()))
    }

    pub fn set_current_screen(&self, screen: Option<ScreenId>) {
        *self.current.write() = screen;
    }

    pub fn current_screen(&self) -> Option<ScreenId> {
        self.current.read().clone()
    }

    /// Routes a descriptor from a collaborator without screen context.
    pub fn add_to_current_screen(&self, descriptor: NetworkDescriptor) -> AddOutcome {
        match self.current_screen() {
            Some(screen) => self.add_request(&screen, descriptor),
            None => {
                debug!(url = %descriptor.url, "no current screen; request dropped");
                AddOutcome::DroppedNoCurrentScreen
            }
        }
    }
}

impl Default for NetworkCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(idx: usize) -> NetworkDescriptor {
        NetworkDescriptor::new("GET", format!("https://api.test/items/{idx}"), idx as f64)
            .completed(200, idx as f64 + 12.5)
    }

    #[test]
    fn cap_drops_new_requests_and_keeps_order() {
        let correlator = NetworkCorrelator::new();
        let screen = ScreenId::from("feed");
        correlator.enable(&screen);

        for idx in 0..151 {
            let outcome = correlator.add_request(&screen, request(idx));
            if idx < 150 {
                assert_eq!(outcome, AddOutcome::Stored);
            } else {
                assert_eq!(outcome, AddOutcome::DroppedCapacity);
            }
        }
        assert_eq!(correlator.dropped(&screen).unwrap(), 1);

        let drained = correlator.consume_for_screen(&screen);
        assert_eq!(drained.len(), 150);
        for (idx, descriptor) in drained.iter().enumerate() {
            assert_eq!(descriptor.url, format!("https://api.test/items/{idx}"));
        }
    }

    #[test]
    fn drain_happens_once() {
        let correlator = NetworkCorrelator::new();
        let screen = ScreenId::from("detail");
        correlator.enable(&screen);
        correlator.add_request(&screen, request(1));

        assert_eq!(correlator.consume_for_screen(&screen).len(), 1);
        assert!(correlator.consume_for_screen(&screen).is_empty());
        assert_eq!(
            correlator.add_request(&screen, request(2)),
            AddOutcome::DroppedUntracked
        );
        assert!(correlator.buffered(&screen).is_err());
    }

    #[test]
    fn descriptor_duration_is_derived() {
        let descriptor = NetworkDescriptor::new("POST", "https://x.test", 100.0)
            .failed("connection reset", 90.0);
        assert_eq!(descriptor.end_time_ms, 100.0);
        assert_eq!(descriptor.duration_ms, 0.0);
        assert_eq!(descriptor.error.as_deref(), Some("connection reset"));
    }
}
