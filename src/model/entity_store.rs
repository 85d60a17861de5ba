//! In-memory entity store keyed by id.
//!
//! One explicit store instance is injected into every component that needs
//! entity state (lifecycle manager, sync coordinator, write coordinator).
//! Locks are never held across await points; every accessor clones out.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use super::entity::TabEntity;

/// Shared, id-keyed map of live tab entities.
#[derive(Clone, Default)]
pub struct EntityStore {
    inner: Arc<RwLock<HashMap<Uuid, TabEntity>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<TabEntity> {
        self.inner.read().get(&id).cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.read().contains_key(&id)
    }

    /// Insert or replace an entity.
    pub fn upsert(&self, entity: TabEntity) {
        self.inner.write().insert(entity.id, entity);
    }

    pub fn remove(&self, id: Uuid) -> Option<TabEntity> {
        self.inner.write().remove(&id)
    }

    /// Apply a mutation to the entity in place. Returns the mutated copy, or
    /// None if the entity does not exist.
    pub fn update_with<F>(&self, id: Uuid, f: F) -> Option<TabEntity>
    where
        F: FnOnce(&mut TabEntity),
    {
        let mut map = self.inner.write();
        let entity = map.get_mut(&id)?;
        f(entity);
        Some(entity.clone())
    }

    /// Apply a mutation to every entity. Used for z-order recompaction.
    pub fn update_all<F>(&self, mut f: F)
    where
        F: FnMut(&mut TabEntity),
    {
        let mut map = self.inner.write();
        for entity in map.values_mut() {
            f(entity);
        }
    }

    /// Clone out all entities, sorted by id for deterministic envelopes.
    pub fn all(&self) -> Vec<TabEntity> {
        let mut tabs: Vec<_> = self.inner.read().values().cloned().collect();
        tabs.sort_by_key(|t| t.id);
        tabs
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.inner.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
