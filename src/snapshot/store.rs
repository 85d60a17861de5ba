//! Pre-minimize snapshot store
//!
//! A snapshot captures an entity's geometry and ownership at the moment of
//! minimizing, before any of the entity's own fields are touched. Restore
//! reads it back; the renderer confirms the visual result with an explicit
//! `clear`. Until then the snapshot sits in `PendingClear`, where repeated
//! restore reads keep returning the same data and the periodic consistency
//! check can recover it if the renderer never confirms.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::{ContextId, Position, Size, TabEntity};

/// Immutable capture of an entity's pre-minimize geometry and ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entity_id: Uuid,
    pub position: Position,
    pub size: Size,
    pub owner_context: Option<ContextId>,
    pub captured_at: DateTime<Utc>,
}

/// Lifecycle state of a stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// Captured, not yet consumed by a restore
    Active,
    /// Handed to a restore; awaiting the renderer's clear confirmation
    PendingClear,
}

struct SnapshotEntry {
    snapshot: Snapshot,
    state: SnapshotState,
    /// Set on first take_for_restore; drives stale recovery
    taken_at: Option<Instant>,
}

/// Id-keyed snapshot table. At most one live snapshot per entity.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<Mutex<HashMap<Uuid, SnapshotEntry>>>,
    recovery_timeout: Duration,
}

impl SnapshotStore {
    pub fn new(recovery_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            recovery_timeout,
        }
    }

    /// Record the entity's current geometry and ownership.
    ///
    /// Must be called before the entity's own fields are mutated so the
    /// snapshot reflects pre-minimize truth even if the live entity is later
    /// corrupted by an unrelated write. Replaces any previous snapshot.
    pub fn capture(&self, id: Uuid, entity: &TabEntity, at: DateTime<Utc>) {
        let snapshot = Snapshot {
            entity_id: id,
            position: entity.position,
            size: entity.size,
            owner_context: entity.owner_context.clone(),
            captured_at: at,
        };
        let mut map = self.inner.lock();
        if map.insert(
            id,
            SnapshotEntry {
                snapshot,
                state: SnapshotState::Active,
                taken_at: None,
            },
        )
        .is_some()
        {
            debug!(entity = %id, "Replaced existing snapshot");
        }
    }

    /// Read the snapshot for a restore.
    ///
    /// Idempotent: repeated calls during a restore keep returning the same
    /// data. The snapshot is not deleted — it moves to `PendingClear` and
    /// stays until the renderer confirms with `clear` or stale recovery
    /// collects it.
    pub fn take_for_restore(&self, id: Uuid) -> Option<Snapshot> {
        let mut map = self.inner.lock();
        let entry = map.get_mut(&id)?;
        if entry.state == SnapshotState::Active {
            entry.state = SnapshotState::PendingClear;
            entry.taken_at = Some(Instant::now());
        }
        Some(entry.snapshot.clone())
    }

    /// Permanently remove the snapshot. Returns whether one existed.
    pub fn clear(&self, id: Uuid) -> bool {
        self.inner.lock().remove(&id).is_some()
    }

    pub fn has(&self, id: Uuid) -> bool {
        self.inner.lock().contains_key(&id)
    }

    pub fn is_pending_clear(&self, id: Uuid) -> bool {
        self.inner
            .lock()
            .get(&id)
            .map(|e| e.state == SnapshotState::PendingClear)
            .unwrap_or(false)
    }

    /// Peek without any state transition. Used by the consistency check.
    pub fn peek(&self, id: Uuid) -> Option<Snapshot> {
        self.inner.lock().get(&id).map(|e| e.snapshot.clone())
    }

    /// Collect pending-clear snapshots whose renderer confirmation never
    /// arrived. Returns the recovered entity ids.
    pub fn recover_stale(&self) -> Vec<Uuid> {
        let mut map = self.inner.lock();
        let stale: Vec<Uuid> = map
            .iter()
            .filter(|(_, e)| {
                e.state == SnapshotState::PendingClear
                    && e.taken_at
                        .map(|t| t.elapsed() >= self.recovery_timeout)
                        .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            map.remove(id);
            warn!(entity = %id, "Recovered snapshot never cleared by renderer");
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
