//! Session store configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum live sessions; the least recently used is evicted beyond it
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
    /// Idle time after which a session expires (`null` disables expiry)
    #[serde(default = "default_idle_ttl", with = "humantime_serde")]
    pub idle_ttl: Option<Duration>,
    /// Default cap on active skills per session
    #[serde(default = "default_max_active_skills")]
    pub max_active_skills: usize,
    /// Optimistic-concurrency attempts per activation
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        SessionsConfig {
            max_sessions: default_max_sessions(),
            idle_ttl: default_idle_ttl(),
            max_active_skills: default_max_active_skills(),
            max_commit_attempts: default_max_commit_attempts(),
        }
    }
}

fn default_max_sessions() -> u64 {
    1024
}

fn default_idle_ttl() -> Option<Duration> {
    Some(Duration::from_secs(30 * 60)) // 30 min
}

fn default_max_active_skills() -> usize {
    16
}

fn default_max_commit_attempts() -> usize {
    5
}
