//! Last-persisted entity cache
//!
//! Mirrors the most recent envelope this context has seen persisted (its own
//! successful writes, incoming notifications, and full resyncs). Restore
//! falls back to this record when an entity's snapshot is missing, so the
//! lookup must be synchronous.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::TabEntity;

#[derive(Clone, Default)]
pub struct PersistedCache {
    inner: Arc<RwLock<CacheInner>>,
}

#[derive(Default)]
struct CacheInner {
    entities: HashMap<Uuid, TabEntity>,
    version: u64,
}

impl PersistedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache with a newer persisted tab list. Older versions are
    /// ignored so a late notification cannot roll the cache back.
    pub fn refresh(&self, tabs: &[TabEntity], version: u64) {
        let mut inner = self.inner.write();
        if version < inner.version {
            return;
        }
        inner.version = version;
        inner.entities = tabs.iter().map(|t| (t.id, t.clone())).collect();
    }

    /// Last known persisted copy of an entity, if any.
    pub fn persisted_entity(&self, id: Uuid) -> Option<TabEntity> {
        self.inner.read().entities.get(&id).cloned()
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}
