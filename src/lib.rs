//! # OpenSkills
//!
//! A runtime that exposes reusable skills (instruction bundles with optional
//! resources and scripts) to LLM agents.
//!
//! ## Features
//!
//! - **Catalog:** skills from pluggable providers, bodies loaded once per
//!   skill no matter how many callers race for them
//! - **Collision-free handles:** skills sharing a name and location get a
//!   stable `name#xxxxxxxx` display name
//! - **Sessions:** per-conversation active sets with all-or-nothing,
//!   optimistically committed activation
//! - **Bounded store:** LRU and idle-TTL eviction of sessions
//! - **Providers:** filesystem (`SKILL.md` directories) and in-memory
//! - **LLM surface:** XML prompt sections and function-calling tools

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod prompt;
pub mod providers;
pub mod runtime;
pub mod session;
pub mod tools;

#[cfg(test)]
mod test_utils;

pub use catalog::{Catalog, SkillFilter};
pub use config::RuntimeConfig;
pub use core::{Context, ProviderRegistry, SkillProvider};
pub use core::types::{
    ActiveSkill, IndexedSkill, ProviderSkillKey, ResourceEncoding, ScriptOutput, ScriptRequest,
    SkillDef, SkillHandle, SkillRecord, SkillResource, SkillSummary,
};
pub use error::{Error, ErrorKind, Result};
pub use prompt::{PromptRenderer, PromptSection};
pub use runtime::{SessionOptions, SkillRuntime};
pub use session::{ActivationMode, Session, SessionStore};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
