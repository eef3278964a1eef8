//! Observe policy: what gets recorded and how logs are formatted.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsPolicyView {
    pub enable_metrics: bool,
    /// When false, `init_tracing` installs nothing.
    pub enable_tracing: bool,
    pub log_json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Label pairs kept per series; extra labels are dropped.
    pub series_label_limit: usize,
    /// Upper bound of timing histograms; larger values are clamped.
    pub histogram_max_ms: u64,
}

impl Default for ObsPolicyView {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            enable_tracing: true,
            log_json: false,
            default_filter: "info".into(),
            series_label_limit: 8,
            histogram_max_ms: 3_600_000,
        }
    }
}

static ACTIVE_POLICY: Lazy<Arc<RwLock<ObsPolicyView>>> =
    Lazy::new(|| Arc::new(RwLock::new(ObsPolicyView::default())));

/// Shared handle on the process-wide policy.
#[derive(Clone)]
pub struct PolicyHandle {
    view: Arc<RwLock<ObsPolicyView>>,
}

impl PolicyHandle {
    pub fn get() -> Self {
        Self {
            view: Arc::clone(&ACTIVE_POLICY),
        }
    }

    pub fn snapshot(&self) -> ObsPolicyView {
        self.view.read().clone()
    }

    pub fn update(&self, view: ObsPolicyView) {
        *self.view.write() = view;
    }
}

pub fn set_policy(view: ObsPolicyView) {
    PolicyHandle::get().update(view);
}

pub fn current_policy() -> ObsPolicyView {
    PolicyHandle::get().snapshot()
}
