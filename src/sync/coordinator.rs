//! Sync coordinator
//!
//! Consumes change notifications from the shared store, filters out this
//! context's own writes and redundant deliveries, and folds remote entity
//! state into the local store with last-writer-wins semantics. A full
//! reload-and-merge (`force_resync`) covers notification loss while the
//! context was backgrounded, and a periodic consistency check repairs
//! minimized-flag/snapshot desync.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::renderer::{RendererBridge, StateUpdate};
use crate::model::{ContextId, EntityStore, TabEntity, WriteEnvelope};
use crate::snapshot::SnapshotStore;
use crate::store::{BackendError, SharedStore, StoreNotification, StoreVitals};
use crate::util::TimestampSource;

use super::cache::PersistedCache;
use super::dedup::{NotificationDeduper, SelfWriteFilter};
use super::merge::merge_remote;

/// Cross-context state intake for one engine context.
pub struct SyncCoordinator {
    context: ContextId,
    store_key: String,
    entities: EntityStore,
    snapshots: SnapshotStore,
    deduper: NotificationDeduper,
    self_writes: SelfWriteFilter,
    cache: PersistedCache,
    vitals: Arc<StoreVitals>,
    store: Arc<dyn SharedStore>,
    renderer: Arc<dyn RendererBridge>,
    clock: TimestampSource,
}

impl SyncCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        context: ContextId,
        entities: EntityStore,
        snapshots: SnapshotStore,
        self_writes: SelfWriteFilter,
        cache: PersistedCache,
        vitals: Arc<StoreVitals>,
        store: Arc<dyn SharedStore>,
        renderer: Arc<dyn RendererBridge>,
        clock: TimestampSource,
    ) -> Self {
        Self {
            context,
            store_key: config.store_key.clone(),
            entities,
            snapshots,
            deduper: NotificationDeduper::new(config.dedup_ttl),
            self_writes,
            cache,
            vitals,
            store,
            renderer,
            clock,
        }
    }

    /// Handle one incoming change notification.
    pub async fn on_remote_change(&self, notification: StoreNotification) {
        let envelope = notification.envelope;

        if self.self_writes.is_self(&envelope.writer_id) {
            debug!(writer = %envelope.writer_id, "Ignoring own write notification");
            return;
        }
        if !self.deduper.observe(&envelope) {
            debug!(writer = %envelope.writer_id, "Ignoring duplicate notification");
            return;
        }

        self.apply_envelope(&envelope).await;
    }

    /// Full reload-and-merge. Called when the context regains foreground
    /// visibility; the correctness backstop against lost notifications.
    pub async fn force_resync(&self) -> Result<(), BackendError> {
        let record = self.store.get(&self.store_key).await?;
        info!(
            context = %self.context,
            version = record.version,
            tabs = record.tabs.len(),
            "Forced resync from store"
        );
        self.apply_tabs(&record.tabs, record.version).await;
        Ok(())
    }

    async fn apply_envelope(&self, envelope: &WriteEnvelope) {
        self.apply_tabs(&envelope.tabs, envelope.version).await;
    }

    async fn apply_tabs(&self, tabs: &[TabEntity], version: u64) {
        let (changed, stats) = merge_remote(&self.entities, tabs);
        self.vitals.observe_version(version);
        self.cache.refresh(tabs, version);

        if !stats.changed() {
            return;
        }
        debug!(
            context = %self.context,
            version,
            adopted = stats.adopted,
            replaced = stats.replaced,
            "Applied remote state"
        );

        for id in changed {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            let fields = serde_json::to_value(&entity).unwrap_or_default();
            self.renderer
                .on_state_updated(StateUpdate {
                    entity_id: id,
                    fields,
                    is_restore: false,
                    dom_verified: false,
                })
                .await;
        }
    }

    /// Cross-reference entity visibility flags against the snapshot store
    /// and repair any desync. Returns the number of corrections.
    pub fn run_consistency_check(&self) -> usize {
        let mut corrections = 0;

        for entity in self.entities.all() {
            if entity.visibility.minimized && !self.snapshots.has(entity.id) {
                // Restore would otherwise have nothing to work from.
                self.snapshots.capture(entity.id, &entity, self.clock.now());
                warn!(
                    entity = %entity.id,
                    "Minimized entity had no snapshot; recreated from current fields"
                );
                corrections += 1;
            } else if !entity.visibility.minimized && self.snapshots.has(entity.id) {
                self.snapshots.clear(entity.id);
                warn!(
                    entity = %entity.id,
                    "Non-minimized entity had a lingering snapshot; removed"
                );
                corrections += 1;
            }
        }

        corrections += self.snapshots.recover_stale().len();
        corrections
    }
}

/// Spawn the notification listener task.
pub fn spawn_notification_listener(
    coordinator: Arc<SyncCoordinator>,
    mut rx: broadcast::Receiver<StoreNotification>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(notification) => coordinator.on_remote_change(notification).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Notification channel lagged; forcing resync");
                        if let Err(e) = coordinator.force_resync().await {
                            warn!(error = %e, "Resync after lag failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        debug!("Notification listener stopped");
    })
}

/// Spawn the periodic consistency check.
pub fn spawn_consistency_task(
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh engine does
        // not "correct" state it has not loaded yet.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let corrections = coordinator.run_consistency_check();
                    if corrections > 0 {
                        info!(corrections, "Consistency check repaired state");
                    }
                }
            }
        }
        debug!("Consistency task stopped");
    })
}
