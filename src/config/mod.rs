//! Configuration module - Layered runtime configuration
//!
//! - types/mod.rs: Core configuration types (RuntimeConfig, CatalogConfig, LogConfig)
//! - types/sessions.rs: Session store limits
//! - types/filesystem.rs: Filesystem provider limits
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{CatalogConfig, LogConfig, LogFormat, RuntimeConfig};

// Re-export section types
pub use types::filesystem::{FilesystemConfig, ScriptRuntime};
pub use types::sessions::SessionsConfig;

// Re-export IO and utilities
pub use io::{
    apply_env_overrides, load_config, load_config_from_path, read_config_snapshot, save_config,
    ConfigSnapshot,
};
pub use paths::{config_dir, config_path, default_skills_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
