//! Session store - bounded, idle-expiring collection of live sessions
//!
//! Uses a moka cache with LRU eviction and time-to-idle expiry. Pending
//! maintenance runs on every access so bounds hold as soon as a call returns.
//! Sessions leaving the cache for any reason other than replacement are
//! queued by the eviction listener and closed outside the cache's own
//! bookkeeping, so no session lock is ever taken under it.

use std::sync::Arc;

use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ActivationMode, Session, SessionLimits};
use crate::catalog::Catalog;
use crate::config::SessionsConfig;
use crate::core::context::Context;
use crate::core::types::ProviderSkillKey;
use crate::error::{Error, Result};

/// Parameters for [`SessionStore::new_session`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSessionParams {
    /// Override of the store's default active-skill cap
    pub max_active: Option<usize>,
    /// Skills to activate immediately (`Replace` semantics)
    pub active: Vec<ProviderSkillKey>,
}

impl NewSessionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = Some(max_active);
        self
    }

    pub fn with_active(mut self, keys: Vec<ProviderSkillKey>) -> Self {
        self.active = keys;
        self
    }
}

/// Bounded store of live sessions
pub struct SessionStore {
    catalog: Arc<Catalog>,
    sessions: Cache<String, Arc<Session>>,
    removed: Arc<Mutex<Vec<Arc<Session>>>>,
    config: SessionsConfig,
}

impl SessionStore {
    /// Create a store
    pub fn new(catalog: Arc<Catalog>, config: SessionsConfig) -> Self {
        let removed: Arc<Mutex<Vec<Arc<Session>>>> = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::clone(&removed);

        let mut builder = Cache::builder()
            .max_capacity(config.max_sessions)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |id: Arc<String>, session: Arc<Session>, cause| {
                if cause == RemovalCause::Replaced {
                    return;
                }
                debug!(session = %id, ?cause, "Session left the store");
                queue.lock().push(session);
            });
        if let Some(ttl) = config.idle_ttl {
            builder = builder.time_to_idle(ttl);
        }

        SessionStore {
            catalog,
            sessions: builder.build(),
            removed,
            config,
        }
    }

    /// Store configuration
    pub fn config(&self) -> &SessionsConfig {
        &self.config
    }

    /// Create a session, optionally activating skills right away.
    ///
    /// If the initial activation fails the session is deleted before the
    /// error is returned.
    pub async fn new_session(&self, ctx: &Context, params: NewSessionParams) -> Result<Arc<Session>> {
        ctx.check()?;
        let max_active = params.max_active.unwrap_or(self.config.max_active_skills);
        if max_active == 0 {
            return Err(Error::InvalidArgument(
                "max_active must be at least 1".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(
            id.clone(),
            Arc::clone(&self.catalog),
            SessionLimits {
                max_active,
                max_commit_attempts: self.config.max_commit_attempts,
            },
        ));
        self.sessions.insert(id.clone(), Arc::clone(&session)).await;
        self.maintain().await;

        if !params.active.is_empty() {
            if let Err(e) = session
                .activate_keys(ctx, &params.active, ActivationMode::Replace)
                .await
            {
                debug!(session = %id, error = %e, "Initial activation failed, discarding session");
                self.delete(&id).await;
                return Err(e);
            }
        }

        info!(session = %id, max_active, "Session created");
        Ok(session)
    }

    /// Look up a live session and refresh its recency
    pub async fn get(&self, id: &str) -> Result<Arc<Session>> {
        let found = self.sessions.get(id).await;
        self.maintain().await;

        match found {
            Some(session) if !session.is_closed() => Ok(session),
            Some(_) => {
                self.sessions.invalidate(id).await;
                self.maintain().await;
                Err(Error::SessionNotFound(id.to_string()))
            }
            None => Err(Error::SessionNotFound(id.to_string())),
        }
    }

    /// Delete and close a session. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).await;
        self.maintain().await;
        match removed {
            Some(session) => {
                session.close();
                info!(session = %id, "Session deleted");
                true
            }
            None => false,
        }
    }

    /// Drop a removed skill from every live session.
    ///
    /// Sessions are snapshotted first and pruned one by one afterwards, so
    /// no store bookkeeping is held while a session lock is taken. Returns
    /// the number of sessions that had the skill active.
    pub async fn prune_skill(&self, key: &ProviderSkillKey) -> usize {
        self.maintain().await;
        let live: Vec<Arc<Session>> = self.sessions.iter().map(|(_, s)| s).collect();

        let mut pruned = 0;
        for session in live {
            if session.prune_key(key) {
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(skill = %key, sessions = pruned, "Pruned skill from sessions");
        }
        pruned
    }

    /// Number of live sessions
    pub async fn len(&self) -> u64 {
        self.maintain().await;
        self.sessions.entry_count()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ids of live sessions, sorted
    pub async fn ids(&self) -> Vec<String> {
        self.maintain().await;
        let mut ids: Vec<String> = self.sessions.iter().map(|(id, _)| id.to_string()).collect();
        ids.sort();
        ids
    }

    /// Apply pending evictions and close whatever left the cache
    async fn maintain(&self) {
        self.sessions.run_pending_tasks().await;
        let removed = std::mem::take(&mut *self.removed.lock());
        for session in removed {
            if !session.is_closed() {
                info!(session = %session.id(), "Session evicted");
                session.close();
            }
        }
    }
}
