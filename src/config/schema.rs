//! Configuration schema for runx
//!
//! Configuration is stored at `~/.config/runx/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runtime cache settings
    pub cache: CacheConfig,

    /// Logging settings
    pub log: LogConfig,
}

/// Where the cache root lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLocation {
    /// `~/.runx`, one subdirectory per digest
    #[default]
    Home,
    /// The OS temp directory, one `runx-<digest>` subdirectory
    Temp,
}

impl FromStr for CacheLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Self::Home),
            "temp" | "tmp" => Ok(Self::Temp),
            other => Err(format!("expected \"home\" or \"temp\", got {:?}", other)),
        }
    }
}

/// Runtime cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root location
    pub location: CacheLocation,

    /// Explicit cache root, overrides `location`
    pub dir: Option<PathBuf>,

    /// Delay before the first-use notice is shown, in milliseconds
    pub notice_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: CacheLocation::Home,
            dir: None,
            notice_delay_ms: 500,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected \"text\" or \"json\", got {:?}", other)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,

    /// Output format: "text" or "json"
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "runx=warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.cache.location, CacheLocation::Home);
        assert_eq!(config.cache.notice_delay_ms, 500);
        assert!(config.cache.dir.is_none());
        assert_eq!(config.log.filter, "runx=warn");
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[cache]\nlocation = \"temp\"\n").unwrap();
        assert_eq!(config.cache.location, CacheLocation::Temp);
        assert_eq!(config.cache.notice_delay_ms, 500);
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn location_parse() {
        assert_eq!("HOME".parse::<CacheLocation>(), Ok(CacheLocation::Home));
        assert_eq!("tmp".parse::<CacheLocation>(), Ok(CacheLocation::Temp));
        assert!("elsewhere".parse::<CacheLocation>().is_err());
    }

    #[test]
    fn log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
