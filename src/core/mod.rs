//! Core module - Fundamental traits and types for OpenSkills
//!
//! This module defines the abstractions the runtime is built on:
//! - Call context carrying cancellation and deadlines
//! - Skill identities and the records derived from them
//! - The provider trait every skill source implements

pub mod context;
pub mod provider;
pub mod types;

// Re-export core items for convenient access
pub use context::Context;
pub use provider::{ProviderRegistry, SkillProvider};
pub use types::*;
