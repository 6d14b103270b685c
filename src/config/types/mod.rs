//! Configuration types module
//!
//! One section per runtime concern.

pub mod filesystem;
pub mod sessions;

use serde::{Deserialize, Serialize};

/// Main runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Session store configuration
    #[serde(default)]
    pub sessions: sessions::SessionsConfig,

    /// Filesystem provider configuration
    #[serde(default)]
    pub filesystem: filesystem::FilesystemConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

impl RuntimeConfig {
    /// Load configuration from file and environment
    ///
    /// Layering:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. Environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Cap on single-flight wait/retry iterations per body load
    #[serde(default = "default_max_body_load_attempts")]
    pub max_body_load_attempts: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            max_body_load_attempts: default_max_body_load_attempts(),
        }
    }
}

fn default_max_body_load_attempts() -> usize {
    crate::catalog::DEFAULT_MAX_BODY_LOAD_ATTEMPTS
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid log format: {}. Valid: pretty, json",
                s
            ))),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}
