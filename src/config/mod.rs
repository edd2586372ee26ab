//! Configuration management for runx

pub mod schema;

pub use schema::{CacheConfig, CacheLocation, Config, LogConfig, LogFormat};

use crate::error::{RunxError, RunxResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "RUNX_CONFIG";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager honoring `RUNX_CONFIG`, else the default path
    pub fn new() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::with_path(PathBuf::from(path)),
            _ => Self {
                config_path: Self::default_config_path(),
            },
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("runx")
            .join("config.toml")
    }

    /// Load configuration from file, then apply `RUNX_*` overrides from the
    /// process environment
    pub async fn load(&self) -> RunxResult<Config> {
        let mut config = self.load_file().await?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load the config file alone, falling back to defaults when missing
    pub async fn load_file(&self) -> RunxResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path).await.map_err(|e| {
            RunxError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )
        })?;

        toml::from_str(&content).map_err(|e| RunxError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `RUNX_*` environment overrides on top of a loaded config
///
/// Empty values are ignored so that `RUNX_CACHE_DIR=` does not produce a
/// relative cache root.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> RunxResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(dir) = get("RUNX_CACHE_DIR") {
        config.cache.dir = Some(PathBuf::from(dir));
    }
    if let Some(location) = get("RUNX_CACHE_LOCATION") {
        config.cache.location = parse_env("RUNX_CACHE_LOCATION", &location)?;
    }
    if let Some(delay) = get("RUNX_NOTICE_DELAY_MS") {
        config.cache.notice_delay_ms = delay.trim().parse().map_err(|e| RunxError::EnvInvalid {
            name: "RUNX_NOTICE_DELAY_MS",
            reason: format!("{}", e),
        })?;
    }
    if let Some(filter) = get("RUNX_LOG") {
        config.log.filter = filter;
    }
    if let Some(format) = get("RUNX_LOG_FORMAT") {
        config.log.format = parse_env("RUNX_LOG_FORMAT", &format)?;
    }
    Ok(())
}

fn parse_env<T: FromStr<Err = String>>(name: &'static str, value: &str) -> RunxResult<T> {
    value
        .parse()
        .map_err(|reason| RunxError::EnvInvalid { name, reason })
}
