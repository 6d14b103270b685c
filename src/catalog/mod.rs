//! Skill catalog - the authoritative registry of indexed skills
//!
//! The catalog maps host definitions to canonical keys, assigns LLM-visible
//! display names, and single-flights body loads. Metadata sits behind one
//! short-held lock; body loads run with no lock held and are coordinated
//! through a per-entry [`entry::LoadGate`].

mod entry;
pub mod filter;
pub mod naming;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::context::Context;
use crate::core::provider::{ProviderRegistry, SkillProvider};
use crate::core::types::{
    ProviderSkillKey, ResourceEncoding, ScriptOutput, ScriptRequest, SkillDef, SkillHandle,
    SkillRecord, SkillResource, SkillSummary,
};
use crate::error::{Error, Result};

use entry::{BodyState, CatalogEntry, LoadGate};
pub use filter::SkillFilter;

/// Default cap on single-flight wait/retry iterations
pub const DEFAULT_MAX_BODY_LOAD_ATTEMPTS: usize = 5;

#[derive(Default)]
struct CatalogState {
    entries: HashMap<ProviderSkillKey, CatalogEntry>,
    by_def: HashMap<SkillDef, ProviderSkillKey>,
    by_handle: HashMap<SkillHandle, ProviderSkillKey>,
}

impl CatalogState {
    fn entry(&self, key: &ProviderSkillKey) -> Result<&CatalogEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::SkillNotFound(key.to_string()))
    }

    fn refresh_display_names(&mut self) {
        let names = naming::display_names(self.entries.values().map(|e| (&e.key, &e.def)));
        self.by_handle.clear();
        for entry in self.entries.values_mut() {
            if let Some(name) = names.get(&entry.key) {
                if *name != entry.display_name && !entry.display_name.is_empty() {
                    debug!(skill = %entry.key, from = %entry.display_name, to = %name, "Display name changed");
                }
                entry.display_name = name.clone();
            }
            self.by_handle.insert(entry.handle(), entry.key.clone());
        }
    }
}

enum LoadStep {
    Wait(tokio::sync::watch::Receiver<bool>),
    Load(LoadGate),
}

/// Resets a `Loading` entry and wakes its waiters if the loader future is
/// dropped before it can publish.
struct LoadGuard<'a> {
    catalog: &'a Catalog,
    key: &'a ProviderSkillKey,
    gate: &'a LoadGate,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.catalog.state.lock();
            if let Some(entry) = state.entries.get_mut(self.key) {
                if matches!(&entry.body, BodyState::Loading(current) if current.same(self.gate)) {
                    entry.body = BodyState::NotLoaded;
                }
            }
        }
        self.gate.release();
    }
}

/// Authoritative registry of indexed skills
pub struct Catalog {
    providers: Arc<ProviderRegistry>,
    state: Mutex<CatalogState>,
    max_load_attempts: usize,
}

impl Catalog {
    /// Create an empty catalog backed by the given providers
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Catalog {
            providers,
            state: Mutex::new(CatalogState::default()),
            max_load_attempts: DEFAULT_MAX_BODY_LOAD_ATTEMPTS,
        }
    }

    /// Override the single-flight iteration cap
    pub fn with_max_load_attempts(mut self, attempts: usize) -> Self {
        self.max_load_attempts = attempts.max(1);
        self
    }

    /// Provider registry
    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Number of indexed skills
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index a definition and add it to the catalog.
    ///
    /// Display names of other entries may change as a result.
    pub async fn add(&self, ctx: &Context, def: SkillDef) -> Result<SkillRecord> {
        ctx.check()?;
        def.validate()?;
        if self.state.lock().by_def.contains_key(&def) {
            return Err(Error::SkillAlreadyExists(def.to_string()));
        }

        let provider = self.providers.get(&def.provider_type)?;
        let indexed = ctx
            .run(provider.index(ctx, &def))
            .await
            .map_err(|e| wrap_provider_error(e, format!("indexing skill {def}")))?;

        let key = indexed.key;
        if key.provider_type != def.provider_type || key.name != def.name {
            return Err(Error::Provider(format!(
                "provider '{}' rewrote skill identity {}:{} to {key}",
                def.provider_type, def.provider_type, def.name
            )));
        }
        if key.location.trim().is_empty() {
            return Err(Error::Provider(format!(
                "provider returned a blank canonical location for {key}"
            )));
        }

        let mut state = self.state.lock();
        if state.entries.contains_key(&key) || state.by_def.contains_key(&def) {
            return Err(Error::SkillAlreadyExists(def.to_string()));
        }

        let body = match indexed.body {
            Some(body) => BodyState::Loaded(Arc::from(body)),
            None => BodyState::NotLoaded,
        };
        state.entries.insert(
            key.clone(),
            CatalogEntry {
                key: key.clone(),
                def: def.clone(),
                description: indexed.description,
                properties: indexed.properties,
                digest: indexed.digest,
                display_name: String::new(),
                body,
            },
        );
        state.by_def.insert(def, key.clone());
        state.refresh_display_names();

        let record = state.entry(&key)?.record();
        info!(skill = %key, handle = %record.handle, "Skill added");
        Ok(record)
    }

    /// Remove a skill by exact definition.
    ///
    /// Returns the removed record and its canonical key. An in-flight body
    /// load for the entry has its gate released so waiters wake up.
    pub fn remove(&self, ctx: &Context, def: &SkillDef) -> Result<(SkillRecord, ProviderSkillKey)> {
        ctx.check()?;
        let mut state = self.state.lock();
        let key = state
            .by_def
            .get(def)
            .cloned()
            .ok_or_else(|| Error::SkillNotFound(def.to_string()))?;
        let entry = state
            .entries
            .remove(&key)
            .ok_or_else(|| Error::Internal(format!("index entry without skill for {key}")))?;
        state.by_def.remove(def);

        if let BodyState::Loading(gate) = &entry.body {
            gate.release();
        }
        let record = entry.record();
        state.refresh_display_names();

        info!(skill = %key, "Skill removed");
        Ok((record, key))
    }

    /// Return the body of a skill, loading it at most once across callers
    pub async fn ensure_body(&self, ctx: &Context, key: &ProviderSkillKey) -> Result<Arc<str>> {
        for attempt in 0..self.max_load_attempts {
            ctx.check()?;
            let step = {
                let mut state = self.state.lock();
                let entry = state
                    .entries
                    .get_mut(key)
                    .ok_or_else(|| Error::SkillNotFound(key.to_string()))?;
                match &entry.body {
                    BodyState::Loaded(body) => return Ok(Arc::clone(body)),
                    BodyState::Failed(err) => return Err(err.clone()),
                    BodyState::Loading(gate) => LoadStep::Wait(gate.subscribe()),
                    BodyState::NotLoaded => {
                        let gate = LoadGate::new();
                        entry.body = BodyState::Loading(gate.clone());
                        LoadStep::Load(gate)
                    }
                }
            };

            match step {
                LoadStep::Load(gate) => return self.load_body(ctx, key, gate).await,
                LoadStep::Wait(rx) => {
                    debug!(skill = %key, attempt, "Waiting for in-flight body load");
                    tokio::select! {
                        _ = entry::wait_released(rx) => {}
                        err = ctx.done() => return Err(err),
                    }
                }
            }
        }

        // The last wait may have ended with a published result.
        let state = self.state.lock();
        match &state.entry(key)?.body {
            BodyState::Loaded(body) => Ok(Arc::clone(body)),
            BodyState::Failed(err) => Err(err.clone()),
            BodyState::NotLoaded | BodyState::Loading(_) => Err(Error::Internal(format!(
                "body load for {key} did not settle after {} attempts",
                self.max_load_attempts
            ))),
        }
    }

    async fn load_body(
        &self,
        ctx: &Context,
        key: &ProviderSkillKey,
        gate: LoadGate,
    ) -> Result<Arc<str>> {
        let mut guard = LoadGuard {
            catalog: self,
            key,
            gate: &gate,
            armed: true,
        };

        debug!(skill = %key, "Loading skill body");
        let result = match self.providers.get(&key.provider_type) {
            Ok(provider) => ctx.run(provider.load_body(ctx, key)).await,
            Err(e) => Err(e),
        };
        guard.armed = false;

        let result = result
            .map(Arc::<str>::from)
            .map_err(|e| wrap_provider_error(e, format!("loading body of {key}")));

        {
            let mut state = self.state.lock();
            match state.entries.get_mut(key) {
                Some(entry)
                    if matches!(&entry.body, BodyState::Loading(current) if current.same(&gate)) =>
                {
                    entry.body = match &result {
                        Ok(body) => BodyState::Loaded(Arc::clone(body)),
                        Err(err) if err.is_cancellation() => BodyState::NotLoaded,
                        Err(err) => {
                            warn!(skill = %key, error = %err, "Caching body load failure");
                            BodyState::Failed(err.clone())
                        }
                    };
                }
                _ => debug!(skill = %key, "Discarding body load for a removed or replaced entry"),
            }
        }
        gate.release();
        result
    }

    /// Re-check a key against the catalog, re-indexing its definition once
    /// if it is not present verbatim.
    pub async fn canonicalize(&self, ctx: &Context, key: &ProviderSkillKey) -> Result<ProviderSkillKey> {
        ctx.check()?;
        key.validate()?;
        {
            let state = self.state.lock();
            if state.entries.contains_key(key) {
                return Ok(key.clone());
            }
            if let Some(found) = state.by_def.get(&key.as_def()) {
                return Ok(found.clone());
            }
        }

        let not_found = || Error::SkillNotFound(key.to_string());
        let provider = self.providers.get(&key.provider_type).map_err(|_| not_found())?;
        match ctx.run(provider.index(ctx, &key.as_def())).await {
            Ok(indexed) if self.contains(&indexed.key) => {
                debug!(skill = %key, "Canonicalized key by re-indexing");
                Ok(indexed.key)
            }
            Ok(_) => Err(not_found()),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                debug!(skill = %key, error = %e, "Re-index failed");
                Err(not_found())
            }
        }
    }

    /// Canonical key for a definition
    pub fn resolve_def(&self, def: &SkillDef) -> Result<ProviderSkillKey> {
        self.state
            .lock()
            .by_def
            .get(def)
            .cloned()
            .ok_or_else(|| Error::SkillNotFound(def.to_string()))
    }

    /// Current handle of a key
    pub fn handle_for_key(&self, key: &ProviderSkillKey) -> Result<SkillHandle> {
        Ok(self.state.lock().entry(key)?.handle())
    }

    /// Canonical key for a handle; surrounding whitespace is ignored
    pub fn resolve_handle(&self, handle: &SkillHandle) -> Result<ProviderSkillKey> {
        let handle = handle.trimmed();
        if handle.name.is_empty() || handle.location.is_empty() {
            return Err(Error::InvalidArgument(
                "skill handle requires a name and a location".to_string(),
            ));
        }
        self.state
            .lock()
            .by_handle
            .get(&handle)
            .cloned()
            .ok_or_else(|| Error::SkillNotFound(handle.to_string()))
    }

    /// Whether the key is indexed
    pub fn contains(&self, key: &ProviderSkillKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Keys from `keys` that are still indexed, in order
    pub fn retain_known(&self, keys: &[ProviderSkillKey]) -> Vec<ProviderSkillKey> {
        let state = self.state.lock();
        keys.iter()
            .filter(|key| state.entries.contains_key(*key))
            .cloned()
            .collect()
    }

    /// Host-facing record of a key
    pub fn record(&self, key: &ProviderSkillKey) -> Result<SkillRecord> {
        Ok(self.state.lock().entry(key)?.record())
    }

    /// Host-facing listing; name prefix matches `def.name`.
    ///
    /// Sorted by `(name, location)`.
    pub fn list_records(&self, filter: &SkillFilter) -> Vec<SkillRecord> {
        let state = self.state.lock();
        let mut records: Vec<SkillRecord> = state
            .entries
            .values()
            .filter(|e| filter.matches_def(&e.def))
            .map(CatalogEntry::record)
            .collect();
        records.sort_by(|a, b| {
            (&a.def.name, &a.def.location, &a.def.provider_type)
                .cmp(&(&b.def.name, &b.def.location, &b.def.provider_type))
        });
        records
    }

    /// LLM-facing listing; name prefix matches the display name.
    ///
    /// Keys in `exclude` are skipped. Sorted by `(display name, location)`.
    pub fn list_summaries(
        &self,
        filter: &SkillFilter,
        exclude: &[ProviderSkillKey],
    ) -> Vec<SkillSummary> {
        let state = self.state.lock();
        let mut summaries: Vec<SkillSummary> = state
            .entries
            .values()
            .filter(|e| !exclude.contains(&e.key))
            .filter(|e| filter.matches_display(&e.def, &e.display_name))
            .map(CatalogEntry::summary)
            .collect();
        summaries.sort_by(|a, b| a.handle.cmp(&b.handle));
        summaries
    }

    /// Read a resource shipped with a skill
    pub async fn read_resource(
        &self,
        ctx: &Context,
        key: &ProviderSkillKey,
        location: &str,
        encoding: ResourceEncoding,
    ) -> Result<SkillResource> {
        ctx.check()?;
        if location.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "resource location is required".to_string(),
            ));
        }
        let provider = self.provider_for(key)?;
        ctx.run(provider.read_resource(ctx, key, location.trim(), encoding))
            .await
            .map_err(|e| wrap_provider_error(e, format!("reading resource of {key}")))
    }

    /// Run a script shipped with a skill
    pub async fn run_script(
        &self,
        ctx: &Context,
        key: &ProviderSkillKey,
        request: &ScriptRequest,
    ) -> Result<ScriptOutput> {
        ctx.check()?;
        if request.location.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "script location is required".to_string(),
            ));
        }
        let provider = self.provider_for(key)?;
        ctx.run(provider.run_script(ctx, key, request))
            .await
            .map_err(|e| wrap_provider_error(e, format!("running script of {key}")))
    }

    fn provider_for(&self, key: &ProviderSkillKey) -> Result<Arc<dyn SkillProvider>> {
        if !self.contains(key) {
            return Err(Error::SkillNotFound(key.to_string()));
        }
        self.providers.get(&key.provider_type)
    }
}

fn wrap_provider_error(err: Error, context: String) -> Error {
    if err.is_cancellation() {
        err
    } else {
        err.context(context)
    }
}
