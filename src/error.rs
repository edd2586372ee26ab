//! Error types for runx
//!
//! All modules use `RunxResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for runx operations
pub type RunxResult<T> = Result<T, RunxError>;

/// All errors that can occur in runx
#[derive(Error, Debug)]
pub enum RunxError {
    // Identity errors
    #[error("Failed to compute executable digest of {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot resolve the launcher executable: {0}")]
    ExecutableNotFound(#[source] std::io::Error),

    #[error("Invalid payload digest {0:?}: must be a non-empty name of [A-Za-z0-9._-]")]
    InvalidDigest(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid value for {name}: {reason}")]
    EnvInvalid { name: &'static str, reason: String },

    // Cache errors
    #[error("Home directory could not be determined")]
    HomeNotFound,

    #[error("Failed to create cache root {path}: {source}")]
    CacheRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to deploy runtime into {path}: {source}")]
    Deploy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Payload errors
    #[error("No payload bundled in {0}")]
    PayloadMissing(PathBuf),

    #[error("Asset set not found in payload: {0}")]
    AssetSetMissing(String),

    #[error("Failed to restore {asset_set} into {path}: {source}")]
    Restore {
        asset_set: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to pack payload: {context}")]
    Pack {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Unsupported platform: {0}. runx bundles runtimes for Linux, macOS and Windows.")]
    UnsupportedPlatform(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RunxError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a payload packing error with context
    pub fn pack(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Pack {
            context: context.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::HomeNotFound => Some("Set HOME, or use RUNX_CACHE_LOCATION=temp"),
            Self::PayloadMissing(_) => Some("Build the launcher with runx-pack"),
            Self::CacheRoot { .. } => Some("Set RUNX_CACHE_DIR to a writable directory"),
            Self::Restore { .. } => Some("Check free disk space, then run again"),
            _ => None,
        }
    }
}
