//! Filesystem provider configuration types
//!
//! Limits applied when reading resources and running scripts shipped with
//! on-disk skills.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Directories scanned for skills
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    /// Default script timeout
    #[serde(default = "default_script_timeout", with = "humantime_serde")]
    pub script_timeout: Duration,
    /// Maximum resource bytes returned
    #[serde(default = "default_max_resource_bytes")]
    pub max_resource_bytes: usize,
    /// Maximum bytes kept per script output stream
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        FilesystemConfig {
            roots: default_roots(),
            script_timeout: default_script_timeout(),
            max_resource_bytes: default_max_resource_bytes(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_roots() -> Vec<PathBuf> {
    Vec::new()
}

fn default_script_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_resource_bytes() -> usize {
    256 * 1024 // 256KB
}

fn default_max_output_bytes() -> usize {
    32 * 1024 // 32KB
}

/// Script interpreter chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRuntime {
    /// `bash`
    Shell,
    /// `python3`
    Python,
    /// `node`
    Node,
    /// Run the file itself
    Direct,
}

impl ScriptRuntime {
    /// Pick a runtime from a script path
    pub fn for_path(path: &std::path::Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("sh") | Some("bash") => ScriptRuntime::Shell,
            Some("py") => ScriptRuntime::Python,
            Some("js") | Some("mjs") | Some("cjs") => ScriptRuntime::Node,
            _ => ScriptRuntime::Direct,
        }
    }

    /// Interpreter program, if one is needed
    pub fn interpreter(&self) -> Option<&'static str> {
        match self {
            ScriptRuntime::Shell => Some("bash"),
            ScriptRuntime::Python => Some("python3"),
            ScriptRuntime::Node => Some("node"),
            ScriptRuntime::Direct => None,
        }
    }
}

impl std::fmt::Display for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptRuntime::Shell => write!(f, "shell"),
            ScriptRuntime::Python => write!(f, "python"),
            ScriptRuntime::Node => write!(f, "node"),
            ScriptRuntime::Direct => write!(f, "direct"),
        }
    }
}
