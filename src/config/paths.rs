//! Configuration paths
//!
//! Utilities for resolving configuration file paths.

use std::path::PathBuf;

/// Get the configuration directory
pub fn config_dir() -> PathBuf {
    // Check for explicit override
    if let Ok(dir) = std::env::var("OPENSKILLS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    // Use XDG config directory or fallback
    dirs::config_dir()
        .map(|d| d.join("openskills"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join("openskills"))
                .unwrap_or_else(|| PathBuf::from(".openskills"))
        })
}

/// Get the main configuration file path
pub fn config_path() -> PathBuf {
    // Check for explicit override
    if let Ok(path) = std::env::var("OPENSKILLS_CONFIG") {
        return PathBuf::from(path);
    }

    config_dir().join("config.json")
}

/// Default skill directory, used when no roots are configured
pub fn default_skills_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("openskills").join("skills"))
        .unwrap_or_else(|| config_dir().join("skills"))
}
