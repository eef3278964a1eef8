//! Engine configuration.
//!
//! Every section has serde defaults, so a partial YAML document (or none at
//! all) yields a usable configuration. Environment overrides are applied on
//! top of the file by the CLI.

use std::env;
use std::path::Path;
use std::str::FromStr;

use display_timing::DisplayTimingConfig;
use frame_timing::FrameTimingConfig;
use network_correlator::CorrelatorConfig;
use screenperf_observe::ObsPolicyView;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::errors::{EngineError, EngineResult};

pub const ENV_JANK_THRESHOLD_MS: &str = "SCREENPERF_JANK_THRESHOLD_MS";
pub const ENV_FROZEN_THRESHOLD_MS: &str = "SCREENPERF_FROZEN_THRESHOLD_MS";
pub const ENV_TTFD_TIMEOUT_MS: &str = "SCREENPERF_TTFD_TIMEOUT_MS";
pub const ENV_MAX_REQUESTS: &str = "SCREENPERF_MAX_REQUESTS";
pub const ENV_QUERY_CAP: &str = "SCREENPERF_QUERY_CAP";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wait applied by `finalize_screen_settled` before reading the session; 0 disables it.
    pub settle_delay_ms: u64,
    /// When false the per-frame frozen list is left out of beacons (the count stays).
    pub emit_frozen_frames: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 0,
            emit_frozen_frames: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub frames: FrameTimingConfig,
    pub display: DisplayTimingConfig,
    pub network: CorrelatorConfig,
    pub session: SessionConfig,
    pub observe: ObsPolicyView,
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> EngineResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(raw)?;
        Ok(config)
    }

    /// Reads a YAML file; a missing file yields the defaults.
    pub async fn load(path: &Path) -> EngineResult<Self> {
        let exists = fs::try_exists(path)
            .await
            .map_err(|source| EngineError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if !exists {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| EngineError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_yaml_str(&raw)?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> EngineResult<()> {
        self.apply_overrides(env::vars())
    }

    /// Applies `SCREENPERF_*` overrides from an arbitrary key/value source.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                ENV_JANK_THRESHOLD_MS => {
                    self.frames.jank_threshold_ms = parse_override(ENV_JANK_THRESHOLD_MS, value)?
                }
                ENV_FROZEN_THRESHOLD_MS => {
                    self.frames.frozen_threshold_ms =
                        parse_override(ENV_FROZEN_THRESHOLD_MS, value)?
                }
                ENV_TTFD_TIMEOUT_MS => {
                    self.display.ttfd_timeout_ms = parse_override(ENV_TTFD_TIMEOUT_MS, value)?
                }
                ENV_MAX_REQUESTS => {
                    self.network.max_requests_per_screen = parse_override(ENV_MAX_REQUESTS, value)?
                }
                ENV_QUERY_CAP => {
                    self.network.query_cap_len = parse_override(ENV_QUERY_CAP, value)?
                }
                _ => continue,
            }
            debug!(key = key.as_ref(), value, "applied config override");
        }
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        let frames = &self.frames;
        if !(frames.jank_threshold_ms > 0.0) {
            return Err(EngineError::invalid_config(
                "frames.jank_threshold_ms must be positive",
            ));
        }
        if frames.frozen_threshold_ms < frames.jank_threshold_ms {
            return Err(EngineError::invalid_config(
                "frames.frozen_threshold_ms must not be below frames.jank_threshold_ms",
            ));
        }
        if frames.max_reported_clusters == 0 {
            return Err(EngineError::invalid_config(
                "frames.max_reported_clusters must be at least 1",
            ));
        }

        let display = &self.display;
        if !(display.stable_frame_ms > 0.0) {
            return Err(EngineError::invalid_config(
                "display.stable_frame_ms must be positive",
            ));
        }
        if display.reset_frame_ms < display.stable_frame_ms {
            return Err(EngineError::invalid_config(
                "display.reset_frame_ms must not be below display.stable_frame_ms",
            ));
        }
        if display.required_stable_frames == 0 {
            return Err(EngineError::invalid_config(
                "display.required_stable_frames must be at least 1",
            ));
        }
        if display.ttfd_timeout_ms == 0 {
            return Err(EngineError::invalid_config(
                "display.ttfd_timeout_ms must be positive",
            ));
        }
        if display.manual_poll_interval_ms == 0 {
            return Err(EngineError::invalid_config(
                "display.manual_poll_interval_ms must be positive",
            ));
        }

        if self.network.max_requests_per_screen == 0 {
            return Err(EngineError::invalid_config(
                "network.max_requests_per_screen must be at least 1",
            ));
        }
        if self.observe.histogram_max_ms == 0 {
            return Err(EngineError::invalid_config(
                "observe.histogram_max_ms must be positive",
            ));
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(key: &'static str, value: &str) -> EngineResult<T> {
    value.parse().map_err(|_| EngineError::InvalidOverride {
        key,
        value: value.to_string(),
    })
}
