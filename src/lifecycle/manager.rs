//! Lifecycle manager
//!
//! The command surface for tab entities. Every operation walks the same
//! path: ownership gate, advisory lock, execute, schedule a debounced
//! persist. Results are returned synchronously while persistence completes
//! in the background; the persist's completion releases the locks taken
//! during the debounce window.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::renderer::{RendererBridge, StateUpdate};
use crate::model::{ContextId, EntityStore, Position, Size, TabEntity};
use crate::snapshot::SnapshotStore;
use crate::store::WriteHandle;
use crate::sync::PersistedCache;
use crate::util::TimestampSource;

use super::debounce::PersistScheduler;
use super::error::{CommandResult, OperationError};
use super::locks::{LockKey, LockTable, OpKind};
use super::zorder::ZOrder;

/// Source tag for operations that arrive without one.
const DEFAULT_SOURCE: &str = "command";

pub struct LifecycleManager {
    context: ContextId,
    entities: EntityStore,
    snapshots: SnapshotStore,
    locks: LockTable,
    scheduler: PersistScheduler,
    zorder: ZOrder,
    cache: PersistedCache,
    renderer: Arc<dyn RendererBridge>,
    clock: TimestampSource,
    ack_timeout: Duration,
}

impl LifecycleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        context: ContextId,
        entities: EntityStore,
        snapshots: SnapshotStore,
        writer: WriteHandle,
        cache: PersistedCache,
        renderer: Arc<dyn RendererBridge>,
        clock: TimestampSource,
    ) -> Self {
        let locks = LockTable::new(config.lock_timeout);
        let lock_releaser = locks.clone();
        let scheduler = PersistScheduler::new(
            config.debounce_window,
            writer,
            Arc::new(move |entity_id| {
                let released = lock_releaser.release_entity(entity_id);
                if released > 0 {
                    debug!(entity = %entity_id, released, "Released locks after persist");
                }
            }),
        );

        Self {
            context,
            entities,
            snapshots,
            locks,
            scheduler,
            zorder: ZOrder::new(config.z_index_ceiling),
            cache,
            renderer,
            clock,
            ack_timeout: config.renderer_ack_timeout,
        }
    }

    // ------------------------------------------------------------------
    // Command surface
    // ------------------------------------------------------------------

    /// Register a new entity created in this context.
    pub fn create(&self, mut entity: TabEntity) -> CommandResult {
        if let Err(e) = entity.validate() {
            return CommandResult::err(OperationError::InvalidEntity(e.to_string()));
        }
        if entity.owner_context.is_none() {
            entity.owner_context = Some(self.context.clone());
        }
        let id = entity.id;
        entity.touch(self.clock.now());
        self.entities.upsert(entity);
        self.zorder.bring_to_front(&self.entities, id, self.clock.now());

        info!(entity = %id, context = %self.context, "Created tab entity");
        self.notify(id, false);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Minimize: snapshot first, then flip the flag.
    pub fn minimize(&self, id: Uuid, source: &str) -> CommandResult {
        let (entity, _key) = match self.begin(OpKind::Minimize, id, source) {
            Ok(v) => v,
            Err(e) => return CommandResult::err(e),
        };

        // Snapshot the pre-minimize truth before any field changes.
        self.snapshots.capture(id, &entity, self.clock.now());

        let now = self.clock.now();
        self.entities.update_with(id, |e| {
            e.visibility.minimized = true;
            e.touch(now);
        });

        debug!(entity = %id, source, "Minimized");
        self.notify(id, false);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Restore from the live snapshot, or from the last persisted record if
    /// the snapshot is gone.
    pub fn restore(&self, id: Uuid, source: &str) -> CommandResult {
        let (_entity, key) = match self.begin(OpKind::Restore, id, source) {
            Ok(v) => v,
            Err(e) => return CommandResult::err(e),
        };

        let (position, size, owner, from_snapshot) =
            match self.snapshots.take_for_restore(id) {
                Some(snapshot) => (
                    snapshot.position,
                    snapshot.size,
                    snapshot.owner_context,
                    true,
                ),
                None => match self.cache.persisted_entity(id) {
                    Some(persisted) => {
                        warn!(
                            entity = %id,
                            "No snapshot; restoring from last persisted record"
                        );
                        (
                            persisted.position,
                            persisted.size,
                            persisted.owner_context,
                            false,
                        )
                    }
                    None => {
                        // Nothing executed; hand the lock back immediately.
                        self.locks.release(&key);
                        return CommandResult::err(OperationError::SnapshotMissing);
                    }
                },
            };

        let now = self.clock.now();
        self.entities.update_with(id, |e| {
            e.position = position;
            e.size = size;
            e.owner_context = owner;
            e.visibility.minimized = false;
            e.touch(now);
        });
        self.zorder.bring_to_front(&self.entities, id, self.clock.now());

        debug!(entity = %id, source, from_snapshot, "Restored");
        self.notify_restore(id);
        if from_snapshot {
            // The snapshot stays pending-clear until the renderer confirms;
            // chase it with a watchdog.
            self.spawn_ack_watchdog(id);
        }
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Confine visibility to the given contexts. Clears any mute set.
    pub fn solo(&self, id: Uuid, contexts: BTreeSet<ContextId>, source: &str) -> CommandResult {
        let (_entity, _key) = match self.begin(OpKind::Solo, id, source) {
            Ok(v) => v,
            Err(e) => return CommandResult::err(e),
        };

        let now = self.clock.now();
        self.entities.update_with(id, |e| {
            e.visibility.set_solo(contexts);
            e.touch(now);
        });

        self.notify(id, false);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Hide from the given contexts. Clears any solo set.
    pub fn mute(&self, id: Uuid, contexts: BTreeSet<ContextId>, source: &str) -> CommandResult {
        let (_entity, _key) = match self.begin(OpKind::Mute, id, source) {
            Ok(v) => v,
            Err(e) => return CommandResult::err(e),
        };

        let now = self.clock.now();
        self.entities.update_with(id, |e| {
            e.visibility.set_mute(contexts);
            e.touch(now);
        });

        self.notify(id, false);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Bring the entity to the front of the z-order.
    pub fn focus(&self, id: Uuid) -> CommandResult {
        let (_entity, _key) = match self.begin(OpKind::Focus, id, DEFAULT_SOURCE) {
            Ok(v) => v,
            Err(e) => return CommandResult::err(e),
        };

        self.zorder.bring_to_front(&self.entities, id, self.clock.now());
        self.notify(id, false);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Remove the entity, its snapshot, and its locks.
    pub fn close(&self, id: Uuid) -> CommandResult {
        if let Err(e) = self.begin(OpKind::Close, id, DEFAULT_SOURCE) {
            return CommandResult::err(e);
        }

        self.entities.remove(id);
        self.snapshots.clear(id);
        self.locks.release_entity(id);

        info!(entity = %id, "Closed tab entity");
        self.notify_closed(id);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Reposition the entity.
    pub fn move_to(&self, id: Uuid, position: Position, source: &str) -> CommandResult {
        let (_entity, _key) = match self.begin(OpKind::Move, id, source) {
            Ok(v) => v,
            Err(e) => return CommandResult::err(e),
        };

        let now = self.clock.now();
        self.entities.update_with(id, |e| {
            e.position = position;
            e.touch(now);
        });

        self.notify(id, false);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    /// Resize the entity.
    pub fn resize_to(&self, id: Uuid, size: Size, source: &str) -> CommandResult {
        let (_entity, _key) = match self.begin(OpKind::Resize, id, source) {
            Ok(v) => v,
            Err(e) => return CommandResult::err(e),
        };

        let now = self.clock.now();
        self.entities.update_with(id, |e| {
            e.size = size;
            e.touch(now);
        });

        self.notify(id, false);
        self.scheduler.schedule(id);
        CommandResult::ok()
    }

    // ------------------------------------------------------------------
    // Renderer callbacks and queries
    // ------------------------------------------------------------------

    /// Renderer confirmation that a restored entity is visually in place.
    pub fn clear_snapshot(&self, id: Uuid) -> bool {
        let cleared = self.snapshots.clear(id);
        if cleared {
            debug!(entity = %id, "Renderer confirmed restore; snapshot cleared");
        }
        cleared
    }

    /// Entities visible to the given viewing context.
    pub fn visible_entities(&self, viewer: &ContextId) -> Vec<TabEntity> {
        self.entities
            .all()
            .into_iter()
            .filter(|e| e.is_visible_to(viewer))
            .collect()
    }

    pub fn scheduler(&self) -> &PersistScheduler {
        &self.scheduler
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Ownership gate plus advisory lock. Rejections happen before any
    /// observable side effect.
    fn begin(
        &self,
        op: OpKind,
        id: Uuid,
        source: &str,
    ) -> Result<(TabEntity, LockKey), OperationError> {
        let entity = self
            .entities
            .get(id)
            .ok_or(OperationError::UnknownEntity(id))?;
        if !entity.is_owned_by(&self.context) {
            return Err(OperationError::OwnershipRejected);
        }
        let key = LockKey::new(op, self.context.clone(), id, source);
        self.locks.acquire(key.clone())?;
        Ok((entity, key))
    }

    fn notify(&self, id: Uuid, is_restore: bool) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let update = StateUpdate {
            entity_id: id,
            fields: serde_json::to_value(&entity).unwrap_or_default(),
            is_restore,
            dom_verified: true,
        };
        let renderer = self.renderer.clone();
        tokio::spawn(async move {
            renderer.on_state_updated(update).await;
        });
    }

    fn notify_restore(&self, id: Uuid) {
        self.notify(id, true);
    }

    fn notify_closed(&self, id: Uuid) {
        let update = StateUpdate {
            entity_id: id,
            fields: serde_json::json!({ "closed": true }),
            is_restore: false,
            dom_verified: true,
        };
        let renderer = self.renderer.clone();
        tokio::spawn(async move {
            renderer.on_state_updated(update).await;
        });
    }

    /// Warn if the renderer never confirms the restore. The snapshot is left
    /// pending-clear for the consistency check; nothing blocks on this.
    fn spawn_ack_watchdog(&self, id: Uuid) {
        let snapshots = self.snapshots.clone();
        let ack_timeout = self.ack_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(ack_timeout).await;
            if snapshots.is_pending_clear(id) {
                warn!(
                    entity = %id,
                    timeout_ms = ack_timeout.as_millis() as u64,
                    "Renderer callback timeout; snapshot left for consistency check"
                );
            }
        });
    }
}
