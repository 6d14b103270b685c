//! Catalog entries and their lazily loaded bodies

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::types::{
    ProviderSkillKey, SkillDef, SkillHandle, SkillProperties, SkillRecord, SkillSummary,
};
use crate::error::Error;

/// One indexed skill
#[derive(Debug)]
pub(crate) struct CatalogEntry {
    pub key: ProviderSkillKey,
    pub def: SkillDef,
    pub description: String,
    pub properties: SkillProperties,
    pub digest: String,
    pub display_name: String,
    pub body: BodyState,
}

impl CatalogEntry {
    pub fn handle(&self) -> SkillHandle {
        SkillHandle::new(self.display_name.clone(), self.def.location.clone())
    }

    pub fn record(&self) -> SkillRecord {
        SkillRecord {
            def: self.def.clone(),
            handle: self.handle(),
            description: self.description.clone(),
            properties: self.properties.clone(),
            digest: self.digest.clone(),
        }
    }

    pub fn summary(&self) -> SkillSummary {
        SkillSummary {
            handle: self.handle(),
            description: self.description.clone(),
        }
    }
}

/// Body load state. Written once: the first success sticks, non-cancellation
/// failures are cached, cancellation resets to `NotLoaded`.
#[derive(Debug)]
pub(crate) enum BodyState {
    NotLoaded,
    Loading(LoadGate),
    Loaded(Arc<str>),
    Failed(Error),
}

/// One-shot broadcast released exactly once by the loader (or by removal)
#[derive(Debug, Clone)]
pub(crate) struct LoadGate(Arc<watch::Sender<bool>>);

impl LoadGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        LoadGate(Arc::new(tx))
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }

    pub fn release(&self) {
        self.0.send_replace(true);
    }

    pub fn same(&self, other: &LoadGate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Wait until the gate is released or its sender is gone
pub(crate) async fn wait_released(mut rx: watch::Receiver<bool>) {
    loop {
        let released = *rx.borrow_and_update();
        if released {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
