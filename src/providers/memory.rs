//! In-memory skill provider
//!
//! Skills are registered programmatically and looked up by name. The
//! canonical location is `memory://<name>`, so any host location for the same
//! name resolves to one canonical key. Bodies are handed back at index time.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use super::{encode_resource, DEFAULT_MAX_RESOURCE_BYTES};
use crate::core::context::Context;
use crate::core::provider::SkillProvider;
use crate::core::types::{
    IndexedSkill, ProviderSkillKey, ResourceEncoding, SkillDef, SkillProperties, SkillResource,
};
use crate::error::{Error, Result};

/// Provider type served by [`InMemoryProvider`]
pub const MEMORY_PROVIDER_TYPE: &str = "memory";

/// A skill held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySkill {
    pub name: String,
    pub description: String,
    pub body: String,
    pub properties: SkillProperties,
    pub resources: BTreeMap<String, Vec<u8>>,
}

impl MemorySkill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        MemorySkill {
            name: name.into(),
            description: description.into(),
            body: body.into(),
            properties: SkillProperties::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_resource(mut self, location: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(location.into(), content.into());
        self
    }

    fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.body.as_bytes()))
    }
}

/// Provider for skills embedded in the host process
#[derive(Default)]
pub struct InMemoryProvider {
    skills: RwLock<HashMap<String, MemorySkill>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_skill(self, skill: MemorySkill) -> Self {
        self.insert(skill);
        self
    }

    /// Add or replace a skill; returns the previous one
    pub fn insert(&self, skill: MemorySkill) -> Option<MemorySkill> {
        self.skills.write().insert(skill.name.clone(), skill)
    }

    pub fn remove(&self, name: &str) -> Option<MemorySkill> {
        self.skills.write().remove(name)
    }

    /// Registered skill names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skills.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn get(&self, name: &str) -> Result<MemorySkill> {
        self.skills
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SkillNotFound(format!("{MEMORY_PROVIDER_TYPE}:{name}")))
    }

    fn canonical_location(name: &str) -> String {
        format!("{MEMORY_PROVIDER_TYPE}://{name}")
    }
}

#[async_trait]
impl SkillProvider for InMemoryProvider {
    fn provider_type(&self) -> &str {
        MEMORY_PROVIDER_TYPE
    }

    async fn index(&self, ctx: &Context, def: &SkillDef) -> Result<IndexedSkill> {
        ctx.check()?;
        let skill = self.get(&def.name)?;
        let key = ProviderSkillKey::new(
            MEMORY_PROVIDER_TYPE,
            def.name.clone(),
            Self::canonical_location(&def.name),
        );
        let mut indexed = IndexedSkill::new(key, skill.description.clone())
            .with_digest(skill.digest())
            .with_body(skill.body);
        indexed.properties = skill.properties;
        Ok(indexed)
    }

    async fn load_body(&self, ctx: &Context, key: &ProviderSkillKey) -> Result<String> {
        ctx.check()?;
        Ok(self.get(&key.name)?.body)
    }

    async fn read_resource(
        &self,
        ctx: &Context,
        key: &ProviderSkillKey,
        location: &str,
        encoding: ResourceEncoding,
    ) -> Result<SkillResource> {
        ctx.check()?;
        let skill = self.get(&key.name)?;
        let bytes = skill.resources.get(location).ok_or_else(|| {
            Error::InvalidArgument(format!("skill '{}' has no resource '{location}'", key.name))
        })?;
        encode_resource(location, bytes, encoding, DEFAULT_MAX_RESOURCE_BYTES)
    }
}
