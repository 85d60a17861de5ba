//! Core engine wiring.
//!
//! `OvertabCore` owns the foundational components of one engine context:
//! - the entity store, snapshot store, and persisted-record cache
//! - the write coordinator worker and its queue handle
//! - the sync coordinator with its notification listener and the periodic
//!   consistency check
//! - the lifecycle manager exposing the command surface
//!
//! Collaborators (shared store backend, renderer) are injected once as trait
//! objects and never rebound.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::lifecycle::{CommandResult, LifecycleManager};
use crate::model::{ContextId, EntityStore, Position, Size, TabEntity};
use crate::snapshot::SnapshotStore;
use crate::store::{spawn_write_coordinator, SharedStore, StoreVitals, WriteHandle};
use crate::sync::{
    spawn_consistency_task, spawn_notification_listener, PersistedCache, SelfWriteFilter,
    SyncCoordinator,
};
use crate::util::TimestampSource;

use super::renderer::RendererBridge;

/// One engine context: command surface, sync intake, and persistence.
pub struct OvertabCore {
    context: ContextId,
    entities: EntityStore,
    manager: LifecycleManager,
    sync: Arc<SyncCoordinator>,
    writer: WriteHandle,
    vitals: Arc<StoreVitals>,
    shutdown: CancellationToken,
    background_tasks: Vec<JoinHandle<()>>,
}

impl OvertabCore {
    /// Build and start an engine context. Spawns the write worker, the
    /// notification listener, and the consistency ticker; all run until
    /// `shutdown`.
    pub fn new(
        config: Config,
        context: ContextId,
        store: Arc<dyn SharedStore>,
        renderer: Arc<dyn RendererBridge>,
    ) -> Self {
        let entities = EntityStore::new();
        let snapshots = SnapshotStore::new(config.snapshot_recovery_timeout);
        let cache = PersistedCache::new();
        let self_writes = SelfWriteFilter::new(config.dedup_ttl);
        let vitals = Arc::new(StoreVitals::new());
        let clock = TimestampSource::new();
        let shutdown = CancellationToken::new();

        let (writer, write_task) = spawn_write_coordinator(
            &config,
            store.clone(),
            entities.clone(),
            self_writes.clone(),
            cache.clone(),
            clock.clone(),
            vitals.clone(),
            shutdown.clone(),
        );

        let sync = Arc::new(SyncCoordinator::new(
            &config,
            context.clone(),
            entities.clone(),
            snapshots.clone(),
            self_writes,
            cache.clone(),
            vitals.clone(),
            store.clone(),
            renderer.clone(),
            clock.clone(),
        ));
        let listener_task =
            spawn_notification_listener(sync.clone(), store.subscribe(), shutdown.clone());
        let consistency_task =
            spawn_consistency_task(sync.clone(), config.consistency_interval, shutdown.clone());

        let manager = LifecycleManager::new(
            &config,
            context.clone(),
            entities.clone(),
            snapshots,
            writer.clone(),
            cache,
            renderer,
            clock,
        );

        info!(context = %context, "Engine context started");
        Self {
            context,
            entities,
            manager,
            sync,
            writer,
            vitals,
            shutdown,
            background_tasks: vec![write_task, listener_task, consistency_task],
        }
    }

    // ------------------------------------------------------------------
    // Command surface
    // ------------------------------------------------------------------

    pub fn create(&self, entity: TabEntity) -> CommandResult {
        self.manager.create(entity)
    }

    pub fn minimize(&self, id: Uuid, source: &str) -> CommandResult {
        self.manager.minimize(id, source)
    }

    pub fn restore(&self, id: Uuid, source: &str) -> CommandResult {
        self.manager.restore(id, source)
    }

    pub fn solo(&self, id: Uuid, contexts: BTreeSet<ContextId>, source: &str) -> CommandResult {
        self.manager.solo(id, contexts, source)
    }

    pub fn mute(&self, id: Uuid, contexts: BTreeSet<ContextId>, source: &str) -> CommandResult {
        self.manager.mute(id, contexts, source)
    }

    pub fn focus(&self, id: Uuid) -> CommandResult {
        self.manager.focus(id)
    }

    pub fn close(&self, id: Uuid) -> CommandResult {
        self.manager.close(id)
    }

    pub fn move_to(&self, id: Uuid, position: Position, source: &str) -> CommandResult {
        self.manager.move_to(id, position, source)
    }

    pub fn resize_to(&self, id: Uuid, size: Size, source: &str) -> CommandResult {
        self.manager.resize_to(id, size, source)
    }

    // ------------------------------------------------------------------
    // Renderer callback and sync entry points
    // ------------------------------------------------------------------

    /// Renderer confirmation that a restored entity is visually placed.
    pub fn clear_snapshot(&self, id: Uuid) -> bool {
        self.manager.clear_snapshot(id)
    }

    /// Full reload-and-merge; call when the context regains foreground
    /// visibility to catch up on notifications missed while backgrounded.
    pub async fn force_resync(&self) {
        if let Err(e) = self.sync.force_resync().await {
            warn!(context = %self.context, error = %e, "Forced resync failed");
        }
    }

    // ------------------------------------------------------------------
    // Health and state accessors
    // ------------------------------------------------------------------

    pub fn context(&self) -> &ContextId {
        &self.context
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn visible_entities(&self, viewer: &ContextId) -> Vec<TabEntity> {
        self.manager.visible_entities(viewer)
    }

    /// True while local mutations have not reached the store.
    pub fn is_unsynced(&self) -> bool {
        self.vitals.is_unsynced()
    }

    pub fn is_degraded(&self) -> bool {
        self.vitals.is_degraded()
    }

    /// Consecutive store-timeout count.
    pub fn timeout_count(&self) -> u32 {
        self.vitals.timeout_count()
    }

    /// Manual recovery after the store comes back.
    pub fn reset_degraded(&self) {
        self.vitals.reset_degraded();
        info!(context = %self.context, "Degraded state reset");
    }

    pub fn writer(&self) -> &WriteHandle {
        &self.writer
    }

    /// Flush pending persists and stop all background tasks.
    pub async fn shutdown(mut self) {
        self.manager.scheduler().flush().await;
        self.shutdown.cancel();
        for task in self.background_tasks.drain(..) {
            let _ = task.await;
        }
        info!(context = %self.context, "Engine context stopped");
    }
}
