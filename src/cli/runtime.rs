use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use screenperf::EngineConfig;
use screenperf_observe::policy::{current_policy, set_policy};
use screenperf_observe::tracing::init_tracing;
use tracing::{info, warn};

use super::env::LogFormat;

pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let level: tracing::Level = level.parse().context("Invalid log level")?;
    let mut policy = current_policy();
    policy.default_filter = level.to_string().to_lowercase();
    policy.log_json = format == LogFormat::Json;
    set_policy(policy);
    init_tracing();
    Ok(())
}

pub struct LoadedConfig {
    pub config: EngineConfig,
    pub path: PathBuf,
}

/// Resolves the config path: explicit flag, then `./screenperf.yaml`, then
/// `<config dir>/screenperf/config.yaml`.
pub fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        return Ok(path.to_path_buf());
    }
    let local = PathBuf::from("screenperf.yaml");
    if local.exists() {
        return Ok(local);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("screenperf");
    path.push("config.yaml");
    Ok(path)
}

/// Loads the YAML file (defaults when missing), applies `SCREENPERF_*`
/// overrides, validates, and installs the observe policy from it.
pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let path = resolve_config_path(config_path)?;
    if !path.exists() {
        warn!("Config file not found, using defaults: {}", path.display());
    }
    let mut config = EngineConfig::load(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    config
        .apply_env_overrides()
        .context("applying environment overrides")?;
    config
        .validate()
        .with_context(|| format!("validating {}", path.display()))?;

    let mut policy = config.observe.clone();
    let active = current_policy();
    policy.default_filter = active.default_filter;
    policy.log_json = active.log_json;
    set_policy(policy);

    info!("Loaded configuration from: {}", path.display());
    Ok(LoadedConfig { config, path })
}
