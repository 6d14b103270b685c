//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::{Path, PathBuf};

use humantime_serde::re::humantime;

use super::types::RuntimeConfig;
use crate::error::{Error, Result};

/// A snapshot of the configuration file
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Path to the config file
    pub path: PathBuf,
    /// Whether the file exists
    pub exists: bool,
    /// Raw file content
    pub raw: Option<String>,
    /// Parsed configuration
    pub config: Option<RuntimeConfig>,
    /// Read or parse issues
    pub issues: Vec<String>,
}

/// Load configuration with layered precedence:
/// 1. Config file if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<RuntimeConfig> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        RuntimeConfig::default()
    };

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: RuntimeConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") | Some("json5") => json5::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?,
        Some("toml") => toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?,
        _ => json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?,
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` if present. Unparseable values are ignored.
pub fn apply_env_overrides(config: &mut RuntimeConfig) {
    dotenvy::dotenv().ok();
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from<F>(config: &mut RuntimeConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Session overrides
    if let Some(v) = var("OPENSKILLS_MAX_SESSIONS").and_then(|v| v.parse().ok()) {
        config.sessions.max_sessions = v;
    }
    if let Some(ttl) = var("OPENSKILLS_SESSION_TTL") {
        match ttl.trim() {
            "off" | "none" | "0" => config.sessions.idle_ttl = None,
            other => {
                if let Ok(v) = humantime::parse_duration(other) {
                    config.sessions.idle_ttl = Some(v);
                }
            }
        }
    }
    if let Some(v) = var("OPENSKILLS_MAX_ACTIVE").and_then(|v| v.parse().ok()) {
        config.sessions.max_active_skills = v;
    }

    // Filesystem overrides
    if let Some(roots) = var("OPENSKILLS_SKILL_ROOTS") {
        config.filesystem.roots = std::env::split_paths(&roots)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
    }
    if let Some(v) = var("OPENSKILLS_SCRIPT_TIMEOUT").and_then(|v| humantime::parse_duration(v.trim()).ok()) {
        config.filesystem.script_timeout = v;
    }

    // Logging overrides
    if let Some(level) = var("RUST_LOG") {
        if !level.trim().is_empty() {
            config.log.level = level;
        }
    }
    if let Some(format) = var("LOG_FORMAT").and_then(|v| v.parse().ok()) {
        config.log.format = format;
    }
}

/// Save configuration to a file
pub fn save_config(config: &RuntimeConfig, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "toml") {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

/// Read a configuration file into a snapshot
pub fn read_config_snapshot(path: &Path) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot {
        path: path.to_path_buf(),
        exists: path.exists(),
        raw: None,
        config: None,
        issues: Vec::new(),
    };

    if !snapshot.exists {
        snapshot
            .issues
            .push("Configuration file does not exist".to_string());
        return snapshot;
    }

    match std::fs::read_to_string(path) {
        Ok(content) => snapshot.raw = Some(content),
        Err(e) => {
            snapshot.issues.push(format!("Failed to read file: {}", e));
            return snapshot;
        }
    }

    match load_config_from_path(path) {
        Ok(config) => snapshot.config = Some(config),
        Err(e) => snapshot.issues.push(format!("Failed to parse config: {}", e)),
    }
    snapshot
}
