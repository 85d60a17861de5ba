//! Z-order allocation with index recycling
//!
//! Focus bumps an entity above everything else by assigning max+1. When the
//! next index would pass the ceiling, every entity is recompacted onto a
//! dense 1..=n range preserving relative order, and the bump lands on top of
//! that.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::model::EntityStore;

pub struct ZOrder {
    ceiling: u32,
}

impl ZOrder {
    pub fn new(ceiling: u32) -> Self {
        Self { ceiling }
    }

    /// Bring the entity to the front. Returns its new z-index, or None if
    /// the entity does not exist.
    pub fn bring_to_front(
        &self,
        entities: &EntityStore,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<u32> {
        if !entities.contains(id) {
            return None;
        }

        let max = entities.all().iter().map(|t| t.z_index).max().unwrap_or(0);
        let top = if max >= self.ceiling {
            let count = self.recompact(entities, now);
            count + 1
        } else {
            max + 1
        };

        entities.update_with(id, |e| {
            e.z_index = top;
            e.touch(now);
        })?;
        Some(top)
    }

    /// Reassign all z-indexes onto 1..=n preserving relative order.
    fn recompact(&self, entities: &EntityStore, now: DateTime<Utc>) -> u32 {
        let mut all = entities.all();
        all.sort_by_key(|t| t.z_index);
        for (i, tab) in all.iter().enumerate() {
            let dense = i as u32 + 1;
            entities.update_with(tab.id, |e| {
                e.z_index = dense;
                e.touch(now);
            });
        }
        debug!(entities = all.len(), "Recompacted z-order indexes");
        all.len() as u32
    }
}
