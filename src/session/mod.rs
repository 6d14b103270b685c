//! Sessions - one conversation's ordered set of active skills
//!
//! Mutations follow an optimistic protocol: snapshot the state and its
//! version, do slow work (body loads) with no lock held, then commit only if
//! the version is unchanged. A lost race retries from a fresh snapshot.

pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::core::context::Context;
use crate::core::types::ProviderSkillKey;
use crate::error::{Error, Result};

pub use store::{NewSessionParams, SessionStore};

/// How requested skills combine with the ones already active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// The request becomes the whole active set
    #[default]
    Replace,
    /// Requested skills move to the end of the current set
    Add,
}

impl std::str::FromStr for ActivationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "replace" => Ok(ActivationMode::Replace),
            "add" | "append" => Ok(ActivationMode::Add),
            other => Err(Error::InvalidArgument(format!(
                "unknown activation mode: {other}. Valid options: replace, add"
            ))),
        }
    }
}

/// Per-session limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Maximum active skills
    pub max_active: usize,
    /// Commit attempts before giving up with `ConcurrentModification`
    pub max_commit_attempts: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        SessionLimits {
            max_active: 16,
            max_commit_attempts: 5,
        }
    }
}

#[derive(Debug, Default)]
struct ActiveState {
    order: Vec<ProviderSkillKey>,
    set: HashSet<ProviderSkillKey>,
    version: u64,
    closed: bool,
}

impl ActiveState {
    fn commit(&mut self, order: Vec<ProviderSkillKey>) {
        self.set = order.iter().cloned().collect();
        self.order = order;
        self.version += 1;
    }
}

/// A conversation's active-skill state
pub struct Session {
    id: String,
    catalog: Arc<Catalog>,
    limits: SessionLimits,
    created_at: DateTime<Utc>,
    state: Mutex<ActiveState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("limits", &self.limits)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(id: impl Into<String>, catalog: Arc<Catalog>, limits: SessionLimits) -> Self {
        Session {
            id: id.into(),
            catalog,
            limits: SessionLimits {
                max_active: limits.max_active,
                max_commit_attempts: limits.max_commit_attempts.max(1),
            },
            created_at: Utc::now(),
            state: Mutex::new(ActiveState::default()),
        }
    }

    /// Session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Maximum number of active skills
    pub fn max_active(&self) -> usize {
        self.limits.max_active
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the session was deleted or evicted
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Commit counter; bumped by every mutation
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Mark the session closed and drop its active set
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            state.commit(Vec::new());
            debug!(session = %self.id, "Session closed");
        }
    }

    fn ensure_open(&self, state: &ActiveState) -> Result<()> {
        if state.closed {
            return Err(Error::SessionNotFound(self.id.clone()));
        }
        Ok(())
    }

    /// Activate skills, all or nothing.
    ///
    /// Returns the committed active order.
    pub async fn activate_keys(
        &self,
        ctx: &Context,
        keys: &[ProviderSkillKey],
        mode: ActivationMode,
    ) -> Result<Vec<ProviderSkillKey>> {
        ctx.check()?;
        self.ensure_open(&self.state.lock())?;

        let mut requested: Vec<ProviderSkillKey> = Vec::with_capacity(keys.len());
        for key in keys {
            key.validate()?;
            let key = self.catalog.canonicalize(ctx, key).await?;
            if !requested.contains(&key) {
                requested.push(key);
            }
        }
        if requested.len() > self.limits.max_active {
            return Err(self.too_many(requested.len()));
        }

        for attempt in 1..=self.limits.max_commit_attempts {
            ctx.check()?;
            let (prior, version) = {
                let state = self.state.lock();
                self.ensure_open(&state)?;
                (state.order.clone(), state.version)
            };

            let prior = self.catalog.retain_known(&prior);
            let next = next_order(&prior, &requested, mode);
            if next.len() > self.limits.max_active {
                return Err(self.too_many(next.len()));
            }

            try_join_all(next.iter().map(|key| self.catalog.ensure_body(ctx, key)))
                .await
                .map_err(|e| {
                    if e.is_cancellation() {
                        e
                    } else {
                        e.context(format!("activating skills in session {}", self.id))
                    }
                })?;

            let mut state = self.state.lock();
            self.ensure_open(&state)?;
            if state.version != version {
                debug!(session = %self.id, attempt, "Active set changed during activation, retrying");
                continue;
            }
            if self.catalog.retain_known(&next).len() != next.len() {
                debug!(session = %self.id, attempt, "Skill removed during activation, retrying");
                continue;
            }
            state.commit(next);
            debug!(session = %self.id, active = state.order.len(), version = state.version, "Activation committed");
            return Ok(state.order.clone());
        }

        warn!(session = %self.id, attempts = self.limits.max_commit_attempts, "Activation kept losing races");
        Err(Error::ConcurrentModification(format!(
            "session {} changed during {} activation attempts",
            self.id, self.limits.max_commit_attempts
        )))
    }

    /// Deactivate skills, all or nothing. Every key must be active.
    pub fn deactivate_keys(
        &self,
        ctx: &Context,
        keys: &[ProviderSkillKey],
    ) -> Result<Vec<ProviderSkillKey>> {
        ctx.check()?;
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        if let Some(missing) = keys.iter().find(|key| !state.set.contains(*key)) {
            return Err(Error::SkillNotActive(missing.to_string()));
        }
        if keys.is_empty() {
            return Ok(state.order.clone());
        }

        let next: Vec<ProviderSkillKey> = state
            .order
            .iter()
            .filter(|key| !keys.contains(key))
            .cloned()
            .collect();
        state.commit(next);
        Ok(state.order.clone())
    }

    /// Deactivate everything
    pub fn unload_all(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        state.commit(Vec::new());
        debug!(session = %self.id, version = state.version, "Unloaded all skills");
        Ok(())
    }

    /// Active keys in activation order.
    ///
    /// Keys the catalog no longer has are dropped and the drop is persisted.
    pub fn active_keys(&self, ctx: &Context) -> Result<Vec<ProviderSkillKey>> {
        ctx.check()?;
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        let known = self.catalog.retain_known(&state.order);
        if known.len() != state.order.len() {
            debug!(
                session = %self.id,
                dropped = state.order.len() - known.len(),
                "Dropping skills no longer in the catalog"
            );
            state.commit(known);
        }
        Ok(state.order.clone())
    }

    /// Whether a key is active
    pub fn is_active(&self, key: &ProviderSkillKey) -> bool {
        self.state.lock().set.contains(key)
    }

    /// Remove one key if active. Returns whether anything changed.
    pub fn prune_key(&self, key: &ProviderSkillKey) -> bool {
        let mut state = self.state.lock();
        if state.closed || !state.set.contains(key) {
            return false;
        }
        let next = state.order.iter().filter(|k| *k != key).cloned().collect();
        state.commit(next);
        true
    }

    fn too_many(&self, requested: usize) -> Error {
        Error::InvalidArgument(format!(
            "{requested} active skills exceed the session limit of {}",
            self.limits.max_active
        ))
    }
}

fn next_order(
    prior: &[ProviderSkillKey],
    requested: &[ProviderSkillKey],
    mode: ActivationMode,
) -> Vec<ProviderSkillKey> {
    match mode {
        ActivationMode::Replace => requested.to_vec(),
        ActivationMode::Add => prior
            .iter()
            .filter(|key| !requested.contains(key))
            .chain(requested.iter())
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::ProviderRegistry;
    use crate::core::types::SkillDef;
    use crate::error::ErrorKind;
    use crate::test_utils::TestProvider;
    use std::time::Duration;

    struct Fixture {
        provider: Arc<TestProvider>,
        catalog: Arc<Catalog>,
    }

    impl Fixture {
        async fn new(names: &[&str]) -> Self {
            let provider = Arc::new(TestProvider::new("test"));
            let registry = Arc::new(ProviderRegistry::new());
            registry.register(provider.clone()).unwrap();
            let catalog = Arc::new(Catalog::new(registry));
            for name in names {
                catalog
                    .add(&Context::background(), Self::def(name))
                    .await
                    .unwrap();
            }
            Fixture { provider, catalog }
        }

        fn def(name: &str) -> SkillDef {
            SkillDef::new("test", name, format!("/skills/{name}"))
        }

        fn key(&self, name: &str) -> ProviderSkillKey {
            self.catalog.resolve_def(&Self::def(name)).unwrap()
        }

        fn session(&self, limits: SessionLimits) -> Arc<Session> {
            Arc::new(Session::new("s1", self.catalog.clone(), limits))
        }
    }

    #[test]
    fn test_next_order_modes() {
        let k = |n: &str| ProviderSkillKey::new("t", n, n);
        let prior = vec![k("a"), k("b"), k("c")];
        assert_eq!(
            next_order(&prior, &[k("b"), k("d")], ActivationMode::Add),
            vec![k("a"), k("c"), k("b"), k("d")]
        );
        assert_eq!(
            next_order(&prior, &[k("d")], ActivationMode::Replace),
            vec![k("d")]
        );
    }

    #[tokio::test]
    async fn test_activate_replace_and_add() {
        let fx = Fixture::new(&["a", "b", "c"]).await;
        let session = fx.session(SessionLimits::default());
        let ctx = Context::background();

        let active = session
            .activate_keys(&ctx, &[fx.key("a"), fx.key("b"), fx.key("a")], ActivationMode::Replace)
            .await
            .unwrap();
        assert_eq!(active, vec![fx.key("a"), fx.key("b")]);

        let active = session
            .activate_keys(&ctx, &[fx.key("c"), fx.key("a")], ActivationMode::Add)
            .await
            .unwrap();
        assert_eq!(active, vec![fx.key("b"), fx.key("c"), fx.key("a")]);

        let active = session
            .activate_keys(&ctx, &[fx.key("c")], ActivationMode::Replace)
            .await
            .unwrap();
        assert_eq!(active, vec![fx.key("c")]);
        assert_eq!(session.active_keys(&ctx).unwrap(), vec![fx.key("c")]);
    }

    #[tokio::test]
    async fn test_activate_respects_max_active() {
        let fx = Fixture::new(&["a", "b", "c"]).await;
        let session = fx.session(SessionLimits {
            max_active: 2,
            ..Default::default()
        });
        let ctx = Context::background();

        session
            .activate_keys(&ctx, &[fx.key("a"), fx.key("b")], ActivationMode::Replace)
            .await
            .unwrap();
        let err = session
            .activate_keys(&ctx, &[fx.key("c")], ActivationMode::Add)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(session.active_keys(&ctx).unwrap(), vec![fx.key("a"), fx.key("b")]);
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let fx = Fixture::new(&["a"]).await;
        let session = fx.session(SessionLimits::default());
        let err = session
            .activate_keys(
                &Context::background(),
                &[ProviderSkillKey::new("test", "ghost", "/skills/ghost")],
                ActivationMode::Replace,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SkillNotFound);
    }

    #[tokio::test]
    async fn test_failed_body_load_leaves_state_unchanged() {
        let fx = Fixture::new(&["k1", "k2"]).await;
        let session = fx.session(SessionLimits::default());
        let ctx = Context::background();
        session
            .activate_keys(&ctx, &[fx.key("k1")], ActivationMode::Replace)
            .await
            .unwrap();
        let version = session.version();

        fx.provider.fail_body("k2", "corrupt skill");
        let err = session
            .activate_keys(&ctx, &[fx.key("k1"), fx.key("k2")], ActivationMode::Replace)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(session.active_keys(&ctx).unwrap(), vec![fx.key("k1")]);
        assert_eq!(session.version(), version);
    }

    #[tokio::test]
    async fn test_activation_retries_against_concurrent_unload() {
        let fx = Fixture::new(&["k1", "k2"]).await;
        let session = fx.session(SessionLimits::default());
        let ctx = Context::background();
        session
            .activate_keys(&ctx, &[fx.key("k1")], ActivationMode::Replace)
            .await
            .unwrap();

        fx.provider.hold_loads();
        let pending = {
            let session = session.clone();
            let k2 = fx.key("k2");
            tokio::spawn(async move {
                session
                    .activate_keys(&Context::background(), &[k2], ActivationMode::Add)
                    .await
            })
        };
        fx.provider.wait_for_load_calls(2).await;

        session.unload_all(&ctx).unwrap();
        fx.provider.release_loads();

        let active = pending.await.unwrap().unwrap();
        assert_eq!(active, vec![fx.key("k2")]);
        assert_eq!(session.active_keys(&ctx).unwrap(), vec![fx.key("k2")]);
    }

    #[tokio::test]
    async fn test_exhausted_commit_attempts() {
        let fx = Fixture::new(&["k1", "k2"]).await;
        let session = fx.session(SessionLimits {
            max_commit_attempts: 1,
            ..Default::default()
        });
        let ctx = Context::background();

        fx.provider.hold_loads();
        let pending = {
            let session = session.clone();
            let k2 = fx.key("k2");
            tokio::spawn(async move {
                session
                    .activate_keys(&Context::background(), &[k2], ActivationMode::Add)
                    .await
            })
        };
        fx.provider.wait_for_load_calls(1).await;
        session.unload_all(&ctx).unwrap();
        fx.provider.release_loads();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
        assert!(err.is_retryable());
        assert!(session.active_keys(&ctx).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_is_all_or_nothing() {
        let fx = Fixture::new(&["a", "b", "c"]).await;
        let session = fx.session(SessionLimits::default());
        let ctx = Context::background();
        session
            .activate_keys(&ctx, &[fx.key("a"), fx.key("b")], ActivationMode::Replace)
            .await
            .unwrap();

        let err = session
            .deactivate_keys(&ctx, &[fx.key("a"), fx.key("c")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SkillNotActive);
        assert_eq!(session.active_keys(&ctx).unwrap(), vec![fx.key("a"), fx.key("b")]);

        let left = session.deactivate_keys(&ctx, &[fx.key("a")]).unwrap();
        assert_eq!(left, vec![fx.key("b")]);
    }

    #[tokio::test]
    async fn test_active_keys_self_heals() {
        let fx = Fixture::new(&["a", "b"]).await;
        let session = fx.session(SessionLimits::default());
        let ctx = Context::background();
        session
            .activate_keys(&ctx, &[fx.key("a"), fx.key("b")], ActivationMode::Replace)
            .await
            .unwrap();
        let key_a = fx.key("a");

        fx.catalog.remove(&ctx, &Fixture::def("a")).unwrap();
        let version = session.version();
        assert_eq!(session.active_keys(&ctx).unwrap(), vec![fx.key("b")]);
        assert!(!session.is_active(&key_a));
        assert_eq!(session.version(), version + 1);
    }

    #[tokio::test]
    async fn test_prune_key_is_idempotent() {
        let fx = Fixture::new(&["a"]).await;
        let session = fx.session(SessionLimits::default());
        let ctx = Context::background();
        session
            .activate_keys(&ctx, &[fx.key("a")], ActivationMode::Replace)
            .await
            .unwrap();

        assert!(session.prune_key(&fx.key("a")));
        assert!(!session.prune_key(&fx.key("a")));
        assert!(session.active_keys(&ctx).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_operations() {
        let fx = Fixture::new(&["a"]).await;
        let session = fx.session(SessionLimits::default());
        let ctx = Context::background();
        session.close();

        assert!(session.is_closed());
        let err = session.active_keys(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
        let err = session
            .activate_keys(&ctx, &[fx.key("a")], ActivationMode::Add)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn test_cancelled_activation_changes_nothing() {
        let fx = Fixture::new(&["a"]).await;
        let session = fx.session(SessionLimits::default());

        fx.provider.hold_loads();
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let err = session
            .activate_keys(&ctx, &[fx.key("a")], ActivationMode::Replace)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        fx.provider.release_loads();

        assert!(session.active_keys(&Context::background()).unwrap().is_empty());
    }

    #[test]
    fn test_activation_mode_parsing() {
        assert_eq!("".parse::<ActivationMode>().unwrap(), ActivationMode::Replace);
        assert_eq!("ADD".parse::<ActivationMode>().unwrap(), ActivationMode::Add);
        assert!("merge".parse::<ActivationMode>().is_err());
    }
}
