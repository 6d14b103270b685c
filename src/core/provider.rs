//! Skill provider trait - Abstract interface for skill sources
//!
//! A provider knows how to turn a [`SkillDef`] into a canonical key and
//! metadata, how to fetch the skill body, and how to read resources or run
//! scripts inside the skill's own sandbox. Providers are looked up by their
//! type string through a [`ProviderRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::core::context::Context;
use crate::core::types::{
    IndexedSkill, ProviderSkillKey, ResourceEncoding, ScriptOutput, ScriptRequest, SkillDef,
    SkillResource,
};
use crate::error::{Error, Result};

/// Abstract interface for a source of skills
#[async_trait]
pub trait SkillProvider: Send + Sync {
    /// Provider type this implementation serves (matches `SkillDef::provider_type`)
    fn provider_type(&self) -> &str;

    /// Validate and canonicalize a definition.
    ///
    /// The returned key must keep `def`'s provider type and name; only the
    /// location may be normalized.
    async fn index(&self, ctx: &Context, def: &SkillDef) -> Result<IndexedSkill>;

    /// Load the prompt-injectable body of an indexed skill
    async fn load_body(&self, ctx: &Context, key: &ProviderSkillKey) -> Result<String>;

    /// Read a resource that ships with the skill
    async fn read_resource(
        &self,
        ctx: &Context,
        key: &ProviderSkillKey,
        location: &str,
        encoding: ResourceEncoding,
    ) -> Result<SkillResource>;

    /// Run a script that ships with the skill
    async fn run_script(
        &self,
        _ctx: &Context,
        _key: &ProviderSkillKey,
        _request: &ScriptRequest,
    ) -> Result<ScriptOutput> {
        Err(Error::RunScriptUnsupported(self.provider_type().to_string()))
    }
}

/// Registry of providers keyed by provider type
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn SkillProvider>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        ProviderRegistry {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider under its own type
    pub fn register(&self, provider: Arc<dyn SkillProvider>) -> Result<()> {
        let provider_type = provider.provider_type().trim().to_string();
        if provider_type.is_empty() {
            return Err(Error::InvalidArgument(
                "provider type is required".to_string(),
            ));
        }

        let mut providers = self.providers.write();
        if providers.contains_key(&provider_type) {
            return Err(Error::InvalidArgument(format!(
                "provider '{provider_type}' is already registered"
            )));
        }
        debug!(provider_type = %provider_type, "Registered skill provider");
        providers.insert(provider_type, provider);
        Ok(())
    }

    /// Get a provider by type
    pub fn get(&self, provider_type: &str) -> Result<Arc<dyn SkillProvider>> {
        self.providers
            .read()
            .get(provider_type)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(provider_type.to_string()))
    }

    /// Whether a provider is registered for the type
    pub fn contains(&self, provider_type: &str) -> bool {
        self.providers.read().contains_key(provider_type)
    }

    /// List registered provider types, sorted
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.providers.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Get provider count
    pub fn count(&self) -> usize {
        self.providers.read().len()
    }
}
