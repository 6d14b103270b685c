//! Controllable provider for catalog, session and store tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::core::context::Context;
use crate::core::provider::SkillProvider;
use crate::core::types::{
    IndexedSkill, ProviderSkillKey, ResourceEncoding, SkillDef, SkillResource,
};
use crate::error::{Error, Result};

/// Provider with call counters, a load gate and failure injection.
///
/// Bodies default to `"body of <name>"`.
pub(crate) struct TestProvider {
    provider_type: String,
    canonical_prefix: Option<String>,
    fixed_location: Option<String>,
    rename_keys: bool,
    preload: bool,
    bodies: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, String>>,
    open: watch::Sender<bool>,
    load_calls: AtomicUsize,
    index_calls: AtomicUsize,
}

impl TestProvider {
    pub fn new(provider_type: &str) -> Self {
        let (open, _rx) = watch::channel(true);
        TestProvider {
            provider_type: provider_type.to_string(),
            canonical_prefix: None,
            fixed_location: None,
            rename_keys: false,
            preload: false,
            bodies: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            open,
            load_calls: AtomicUsize::new(0),
            index_calls: AtomicUsize::new(0),
        }
    }

    /// Canonical location becomes `<prefix>/<location>`
    pub fn with_canonical_prefix(mut self, prefix: &str) -> Self {
        self.canonical_prefix = Some(prefix.trim_end_matches('/').to_string());
        self
    }

    /// Every definition canonicalizes to the same location
    pub fn with_fixed_location(mut self, location: &str) -> Self {
        self.fixed_location = Some(location.to_string());
        self
    }

    /// Index returns a key whose name differs from the definition
    pub fn with_renamed_keys(mut self) -> Self {
        self.rename_keys = true;
        self
    }

    /// Index hands back the body
    pub fn with_preloaded_bodies(mut self) -> Self {
        self.preload = true;
        self
    }

    pub fn set_body(&self, name: &str, body: &str) {
        self.bodies.lock().insert(name.to_string(), body.to_string());
    }

    pub fn fail_body(&self, name: &str, message: &str) {
        self.failures
            .lock()
            .insert(name.to_string(), message.to_string());
    }

    pub fn clear_failure(&self, name: &str) {
        self.failures.lock().remove(name);
    }

    /// Block body loads until [`release_loads`](Self::release_loads)
    pub fn hold_loads(&self) {
        self.open.send_replace(false);
    }

    pub fn release_loads(&self) {
        self.open.send_replace(true);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` body loads have started
    pub async fn wait_for_load_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.load_calls() < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("body load did not start in time");
    }

    fn body_for(&self, name: &str) -> String {
        self.bodies
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("body of {name}"))
    }

    fn canonical_location(&self, location: &str) -> String {
        if let Some(fixed) = &self.fixed_location {
            return fixed.clone();
        }
        match &self.canonical_prefix {
            Some(prefix) if !location.starts_with(prefix.as_str()) => {
                format!("{prefix}/{}", location.trim_start_matches('/'))
            }
            _ => location.to_string(),
        }
    }

    async fn wait_open(&self) {
        let mut rx = self.open.subscribe();
        loop {
            let open = *rx.borrow_and_update();
            if open || rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[async_trait]
impl SkillProvider for TestProvider {
    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    async fn index(&self, _ctx: &Context, def: &SkillDef) -> Result<IndexedSkill> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let name = if self.rename_keys {
            format!("{}-renamed", def.name)
        } else {
            def.name.clone()
        };
        let key = ProviderSkillKey::new(
            def.provider_type.clone(),
            name,
            self.canonical_location(&def.location),
        );
        let mut indexed = IndexedSkill::new(key, format!("{} skill", def.name))
            .with_digest(format!("digest-{}", def.name));
        if self.preload {
            indexed = indexed.with_body(self.body_for(&def.name));
        }
        Ok(indexed)
    }

    async fn load_body(&self, _ctx: &Context, key: &ProviderSkillKey) -> Result<String> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_open().await;
        if let Some(message) = self.failures.lock().get(&key.name).cloned() {
            return Err(Error::Provider(message));
        }
        Ok(self.body_for(&key.name))
    }

    async fn read_resource(
        &self,
        _ctx: &Context,
        key: &ProviderSkillKey,
        location: &str,
        encoding: ResourceEncoding,
    ) -> Result<SkillResource> {
        let content = format!("{location} of {}", key.name);
        Ok(SkillResource {
            location: location.to_string(),
            encoding,
            bytes: content.len() as u64,
            content,
            truncated: false,
        })
    }
}
