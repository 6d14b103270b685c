//! Skill runtime - the host-facing entry point
//!
//! Ties the provider registry, catalog, session store and prompt renderer
//! together. Host code addresses skills by [`SkillDef`]; LLM-facing calls use
//! [`SkillHandle`]s, the only identity the model ever sees.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, SkillFilter};
use crate::config::RuntimeConfig;
use crate::core::context::Context;
use crate::core::provider::{ProviderRegistry, SkillProvider};
use crate::core::types::{
    ActiveSkill, ProviderSkillKey, ResourceEncoding, ScriptOutput, ScriptRequest, SkillDef, SkillHandle,
    SkillRecord, SkillResource, SkillSummary,
};
use crate::error::{Error, ErrorKind, Result};
use crate::prompt::{PromptRenderer, PromptSection};
use crate::providers::FsProvider;
use crate::session::store::{NewSessionParams, SessionStore};
use crate::session::{ActivationMode, Session};

/// Options for [`SkillRuntime::new_session`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Override of the configured active-skill cap
    pub max_active: Option<usize>,
    /// Skills to activate on creation
    pub active: Vec<SkillDef>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = Some(max_active);
        self
    }

    pub fn with_active(mut self, defs: Vec<SkillDef>) -> Self {
        self.active = defs;
        self
    }
}

/// Skill runtime
pub struct SkillRuntime {
    config: RuntimeConfig,
    catalog: Arc<Catalog>,
    sessions: SessionStore,
    prompt: PromptRenderer,
}

impl SkillRuntime {
    /// Create a runtime with no providers registered
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let providers = Arc::new(ProviderRegistry::new());
        let catalog = Arc::new(
            Catalog::new(providers).with_max_load_attempts(config.catalog.max_body_load_attempts),
        );
        let sessions = SessionStore::new(Arc::clone(&catalog), config.sessions.clone());

        Ok(SkillRuntime {
            prompt: PromptRenderer::new()?,
            config,
            catalog,
            sessions,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Register a provider under its type
    pub fn register_provider(&self, provider: Arc<dyn SkillProvider>) -> Result<()> {
        self.catalog.providers().register(provider)
    }

    /// Add a skill to the catalog
    pub async fn add_skill(&self, ctx: &Context, def: SkillDef) -> Result<SkillRecord> {
        self.catalog.add(ctx, def).await
    }

    /// Remove a skill and deactivate it in every live session
    pub async fn remove_skill(&self, ctx: &Context, def: &SkillDef) -> Result<SkillRecord> {
        let (record, key) = self.catalog.remove(ctx, def)?;
        let pruned = self.sessions.prune_skill(&key).await;
        debug!(skill = %key, sessions = pruned, "Removal cascaded to sessions");
        Ok(record)
    }

    /// Host-facing listing
    pub fn list_skills(&self, filter: &SkillFilter) -> Vec<SkillRecord> {
        self.catalog.list_records(filter)
    }

    /// Discover and add every skill under the configured filesystem roots.
    ///
    /// Skills already in the catalog are left alone. Requires an
    /// [`FsProvider`] to be registered.
    pub async fn load_filesystem_roots(&self, ctx: &Context) -> Result<Vec<SkillRecord>> {
        let defs = FsProvider::discover_roots(&self.config.filesystem.roots).await?;
        let mut added = Vec::with_capacity(defs.len());
        for def in defs {
            match self.catalog.add(ctx, def.clone()).await {
                Ok(record) => added.push(record),
                Err(e) if e.kind() == ErrorKind::SkillAlreadyExists => {
                    debug!(skill = %def, "Skill already in catalog");
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => warn!(skill = %def, error = %e, "Failed to add discovered skill"),
            }
        }
        info!(added = added.len(), "Loaded skills from filesystem roots");
        Ok(added)
    }

    /// Create a session, optionally with skills already active
    pub async fn new_session(&self, ctx: &Context, options: SessionOptions) -> Result<Arc<Session>> {
        let active = options
            .active
            .iter()
            .map(|def| self.catalog.resolve_def(def))
            .collect::<Result<Vec<_>>>()?;

        let mut params = NewSessionParams::new().with_active(active);
        params.max_active = options.max_active;
        self.sessions.new_session(ctx, params).await
    }

    /// Look up a live session
    pub async fn session(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions.get(id).await
    }

    /// Close and forget a session
    pub async fn close_session(&self, id: &str) -> Result<()> {
        if self.sessions.delete(id).await {
            Ok(())
        } else {
            Err(Error::SessionNotFound(id.to_string()))
        }
    }

    /// Activate skills by definition. Returns the active definitions in order.
    pub async fn activate(
        &self,
        ctx: &Context,
        session_id: &str,
        defs: &[SkillDef],
        mode: ActivationMode,
    ) -> Result<Vec<SkillDef>> {
        let session = self.sessions.get(session_id).await?;
        let keys = defs
            .iter()
            .map(|def| self.catalog.resolve_def(def))
            .collect::<Result<Vec<_>>>()?;
        let active = session.activate_keys(ctx, &keys, mode).await?;
        Ok(self.defs_of(&active))
    }

    /// Deactivate skills by definition. Returns what stays active.
    pub async fn deactivate(
        &self,
        ctx: &Context,
        session_id: &str,
        defs: &[SkillDef],
    ) -> Result<Vec<SkillDef>> {
        let session = self.sessions.get(session_id).await?;
        let keys = defs
            .iter()
            .map(|def| {
                self.catalog
                    .resolve_def(def)
                    .map_err(|_| Error::SkillNotActive(def.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let active = session.deactivate_keys(ctx, &keys)?;
        Ok(self.defs_of(&active))
    }

    /// Deactivate everything in a session
    pub async fn unload_all(&self, ctx: &Context, session_id: &str) -> Result<()> {
        self.sessions.get(session_id).await?.unload_all(ctx)
    }

    /// Handles and bodies of a session's active skills, in activation order.
    ///
    /// Skills removed while the bodies are gathered are left out.
    pub async fn active_skills(&self, ctx: &Context, session_id: &str) -> Result<Vec<ActiveSkill>> {
        let session = self.sessions.get(session_id).await?;
        let keys = session.active_keys(ctx)?;

        let mut skills = Vec::with_capacity(keys.len());
        for key in keys {
            let body = match self.catalog.ensure_body(ctx, &key).await {
                Ok(body) => body,
                Err(e) if e.kind() == ErrorKind::SkillNotFound => continue,
                Err(e) => return Err(e),
            };
            let Ok(handle) = self.catalog.handle_for_key(&key) else {
                continue;
            };
            skills.push(ActiveSkill {
                handle,
                body: body.to_string(),
            });
        }
        Ok(skills)
    }

    /// Activate skills by handle. Returns the active handles in order.
    pub async fn activate_handles(
        &self,
        ctx: &Context,
        session_id: &str,
        handles: &[SkillHandle],
        mode: ActivationMode,
    ) -> Result<Vec<SkillHandle>> {
        let session = self.sessions.get(session_id).await?;
        let keys = handles
            .iter()
            .map(|handle| self.catalog.resolve_handle(handle))
            .collect::<Result<Vec<_>>>()?;
        let active = session.activate_keys(ctx, &keys, mode).await?;
        Ok(self.handles_of(&active))
    }

    /// LLM-facing listing. With a session, its active skills are left out.
    pub async fn available_handles(
        &self,
        ctx: &Context,
        session_id: Option<&str>,
        filter: &SkillFilter,
    ) -> Result<Vec<SkillSummary>> {
        ctx.check()?;
        let exclude = match session_id {
            Some(id) => self.sessions.get(id).await?.active_keys(ctx)?,
            None => Vec::new(),
        };
        Ok(self.catalog.list_summaries(filter, &exclude))
    }

    /// Handles of a session's active skills, in activation order
    pub async fn active_handles(&self, ctx: &Context, session_id: &str) -> Result<Vec<SkillHandle>> {
        let active = self.sessions.get(session_id).await?.active_keys(ctx)?;
        Ok(self.handles_of(&active))
    }

    /// Read a resource of the skill behind `handle`
    pub async fn read_resource(
        &self,
        ctx: &Context,
        handle: &SkillHandle,
        location: &str,
        encoding: ResourceEncoding,
    ) -> Result<SkillResource> {
        let key = self.catalog.resolve_handle(handle)?;
        self.catalog.read_resource(ctx, &key, location, encoding).await
    }

    /// Run a script of the skill behind `handle`
    pub async fn run_script(
        &self,
        ctx: &Context,
        handle: &SkillHandle,
        request: &ScriptRequest,
    ) -> Result<ScriptOutput> {
        let key = self.catalog.resolve_handle(handle)?;
        self.catalog.run_script(ctx, &key, request).await
    }

    /// Render the skills prompt.
    ///
    /// Without a session the active section is empty and every matching
    /// skill is listed as available.
    pub async fn render_prompt(
        &self,
        ctx: &Context,
        session_id: Option<&str>,
        filter: &SkillFilter,
        section: PromptSection,
    ) -> Result<String> {
        let available = match section {
            PromptSection::Active => Vec::new(),
            _ => self.available_handles(ctx, session_id, filter).await?,
        };
        let active = match (section, session_id) {
            (PromptSection::Available, _) | (_, None) => Vec::new(),
            (_, Some(id)) => self.active_skills(ctx, id).await?,
        };

        match section {
            PromptSection::Available => self.prompt.render_available(&available),
            PromptSection::Active => self.prompt.render_active(&active),
            PromptSection::Combined => self.prompt.render_combined(&available, &active),
        }
    }

    fn defs_of(&self, keys: &[ProviderSkillKey]) -> Vec<SkillDef> {
        keys.iter()
            .filter_map(|key| self.catalog.record(key).ok())
            .map(|record| record.def)
            .collect()
    }

    fn handles_of(&self, keys: &[ProviderSkillKey]) -> Vec<SkillHandle> {
        keys.iter()
            .filter_map(|key| self.catalog.handle_for_key(key).ok())
            .collect()
    }
}
