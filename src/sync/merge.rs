//! Last-writer-wins entity merge
//!
//! For an entity present both locally and remotely, the copy with the
//! greater `last_modified` wins in full. Field-level merging is deliberately
//! not performed — mixing fields from two writes can produce a state neither
//! writer ever saw. Remote-only entities are adopted; local-only entities are
//! kept, since they may be a fresh local mutation not yet visible remotely.

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use crate::model::{EntityStore, TabEntity};

/// What one merge pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Remote-only entities adopted into the local store
    pub adopted: usize,
    /// Local entities replaced by a newer remote copy
    pub replaced: usize,
    /// Entities where the local copy was newer or equal and was kept
    pub kept_local: usize,
}

impl MergeStats {
    pub fn changed(&self) -> bool {
        self.adopted > 0 || self.replaced > 0
    }
}

/// Pick the winner of two copies of the same entity.
///
/// Ties go to the local copy: an equal timestamp means the copies are either
/// identical or concurrent, and preferring local keeps the choice stable
/// across repeated merges.
pub fn merge_entity(local: &TabEntity, remote: &TabEntity) -> TabEntity {
    if remote.last_modified > local.last_modified {
        remote.clone()
    } else {
        local.clone()
    }
}

/// Merge a remote tab list into the local entity store.
///
/// Returns the ids whose local copy changed, along with counters.
pub fn merge_remote(entities: &EntityStore, remote: &[TabEntity]) -> (Vec<Uuid>, MergeStats) {
    let mut stats = MergeStats::default();
    let mut changed = Vec::new();
    let mut remote_ids = HashSet::new();

    for remote_entity in remote {
        remote_ids.insert(remote_entity.id);
        match entities.get(remote_entity.id) {
            Some(local) => {
                if remote_entity.last_modified > local.last_modified {
                    entities.upsert(remote_entity.clone());
                    changed.push(remote_entity.id);
                    stats.replaced += 1;
                } else {
                    stats.kept_local += 1;
                }
            }
            None => {
                entities.upsert(remote_entity.clone());
                changed.push(remote_entity.id);
                stats.adopted += 1;
            }
        }
    }

    if stats.changed() {
        debug!(
            adopted = stats.adopted,
            replaced = stats.replaced,
            kept_local = stats.kept_local,
            "Merged remote tabs"
        );
    }
    (changed, stats)
}
