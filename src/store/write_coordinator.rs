//! Write coordinator
//!
//! Serializes all of a context's store writes into a FIFO queue with one
//! write in flight at a time. Each write is version-guarded: the worker
//! reads the store, merges any tabs persisted since this context last
//! looked, and retries on conflict with the refreshed version. Three
//! consecutive store timeouts flip the coordinator into a degraded state
//! where further writes are skipped outright until a manual reset, so an
//! unresponsive store never accumulates a retry storm.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::model::{EntityStore, WriteEnvelope};
use crate::sync::{merge_remote, PersistedCache, SelfWriteFilter};
use crate::util::TimestampSource;

use super::shared::{BackendError, SharedStore};

/// Failure modes of one enqueued write.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("version conflict persisted across {0} attempts")]
    VersionConflict(u32),
    #[error("store call timed out")]
    Timeout,
    #[error("store degraded; write skipped")]
    Degraded,
    #[error("store backend failure: {0}")]
    Backend(BackendError),
    #[error("write queue closed")]
    QueueClosed,
}

pub type WriteResult = Result<u64, WriteError>;

/// Health counters shared between the write coordinator and the sync
/// coordinator.
#[derive(Default)]
pub struct StoreVitals {
    consecutive_timeouts: AtomicU32,
    degraded: AtomicBool,
    last_observed_version: AtomicU64,
    unsynced: AtomicBool,
}

impl StoreVitals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a store-call timeout. Returns true when this one crossed the
    /// degraded threshold.
    pub fn note_timeout(&self, threshold: u32) -> bool {
        let count = self.consecutive_timeouts.fetch_add(1, Ordering::SeqCst) + 1;
        self.unsynced.store(true, Ordering::SeqCst);
        if count >= threshold && !self.degraded.swap(true, Ordering::SeqCst) {
            return true;
        }
        false
    }

    /// Record a store call that completed (successfully or with a
    /// non-timeout error); breaks the consecutive-timeout streak.
    pub fn note_store_responsive(&self) {
        self.consecutive_timeouts.store(0, Ordering::SeqCst);
    }

    pub fn note_synced(&self, version: u64) {
        self.unsynced.store(false, Ordering::SeqCst);
        self.observe_version(version);
    }

    /// Raise the high-water mark of observed store versions.
    pub fn observe_version(&self, version: u64) {
        self.last_observed_version.fetch_max(version, Ordering::SeqCst);
    }

    pub fn last_observed_version(&self) -> u64 {
        self.last_observed_version.load(Ordering::SeqCst)
    }

    pub fn timeout_count(&self) -> u32 {
        self.consecutive_timeouts.load(Ordering::SeqCst)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn is_unsynced(&self) -> bool {
        self.unsynced.load(Ordering::SeqCst)
    }

    /// Manual recovery from the degraded state.
    pub fn reset_degraded(&self) {
        self.degraded.store(false, Ordering::SeqCst);
        self.consecutive_timeouts.store(0, Ordering::SeqCst);
    }
}

type Mutator = Box<dyn FnOnce(&EntityStore) + Send>;

struct WriteRequest {
    mutator: Option<Mutator>,
    done: oneshot::Sender<WriteResult>,
}

/// Cloneable handle for enqueueing writes.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteRequest>,
    vitals: Arc<StoreVitals>,
}

impl WriteHandle {
    /// Enqueue a write that first applies `mutator` to the entity store,
    /// then persists the full store state. The returned receiver resolves
    /// once the write commits, fails, or is skipped.
    pub fn enqueue_write<F>(&self, mutator: F) -> oneshot::Receiver<WriteResult>
    where
        F: FnOnce(&EntityStore) + Send + 'static,
    {
        self.enqueue(Some(Box::new(mutator)))
    }

    /// Enqueue a persist of the entity store as it stands.
    pub fn enqueue_persist(&self) -> oneshot::Receiver<WriteResult> {
        self.enqueue(None)
    }

    fn enqueue(&self, mutator: Option<Mutator>) -> oneshot::Receiver<WriteResult> {
        let (done, rx) = oneshot::channel();
        let request = WriteRequest { mutator, done };
        if let Err(e) = self.tx.send(request) {
            // Deliver the failure through the receiver the caller holds
            let _ = e.0.done.send(Err(WriteError::QueueClosed));
        }
        rx
    }

    pub fn vitals(&self) -> &Arc<StoreVitals> {
        &self.vitals
    }
}

/// Spawn the write worker task. Returns the enqueue handle and the task
/// handle for shutdown joins.
pub fn spawn_write_coordinator(
    config: &Config,
    store: Arc<dyn SharedStore>,
    entities: EntityStore,
    self_writes: SelfWriteFilter,
    cache: PersistedCache,
    clock: TimestampSource,
    vitals: Arc<StoreVitals>,
    shutdown: CancellationToken,
) -> (WriteHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = WriteWorker {
        store_key: config.store_key.clone(),
        store_timeout: config.store_timeout,
        max_attempts: config.max_write_attempts,
        degraded_threshold: config.degraded_threshold,
        store,
        entities,
        self_writes,
        cache,
        clock,
        vitals: vitals.clone(),
    };
    let handle = tokio::spawn(worker.run(rx, shutdown));
    (WriteHandle { tx, vitals }, handle)
}

struct WriteWorker {
    store_key: String,
    store_timeout: Duration,
    max_attempts: u32,
    degraded_threshold: u32,
    store: Arc<dyn SharedStore>,
    entities: EntityStore,
    self_writes: SelfWriteFilter,
    cache: PersistedCache,
    clock: TimestampSource,
    vitals: Arc<StoreVitals>,
}

impl WriteWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WriteRequest>, shutdown: CancellationToken) {
        loop {
            let request = tokio::select! {
                _ = shutdown.cancelled() => break,
                request = rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            let outcome = self.execute(request.mutator).await;
            // Caller may have dropped the receiver; that's fine
            let _ = request.done.send(outcome);
        }
        debug!("Write coordinator stopped");
    }

    async fn execute(&self, mutator: Option<Mutator>) -> WriteResult {
        if self.vitals.is_degraded() {
            // Local mutation still happens so the in-memory state stays
            // optimistic; only persistence is skipped.
            if let Some(mutate) = mutator {
                mutate(&self.entities);
            }
            debug!("Store degraded; skipping write");
            return Err(WriteError::Degraded);
        }

        if let Some(mutate) = mutator {
            mutate(&self.entities);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let record = match tokio::time::timeout(self.store_timeout, self.store.get(&self.store_key)).await {
                Err(_) => return Err(self.on_timeout("get")),
                Ok(Err(e)) => return Err(WriteError::Backend(e)),
                Ok(Ok(record)) => {
                    self.vitals.note_store_responsive();
                    record
                }
            };

            // Someone else persisted since we last looked; fold their tabs
            // in before constructing the envelope.
            if record.version > self.vitals.last_observed_version() {
                let (changed, _) = merge_remote(&self.entities, &record.tabs);
                if !changed.is_empty() {
                    debug!(
                        version = record.version,
                        refreshed = changed.len(),
                        "Refreshed working state from store before write"
                    );
                }
                self.vitals.observe_version(record.version);
            }

            let writer_id = Uuid::new_v4().to_string();
            self.self_writes.register(&writer_id);
            let envelope = WriteEnvelope::new(
                self.entities.all(),
                record.version + 1,
                writer_id,
                self.clock.now(),
            );

            match tokio::time::timeout(self.store_timeout, self.store.put(&self.store_key, envelope.clone())).await {
                Err(_) => return Err(self.on_timeout("put")),
                Ok(Err(BackendError::VersionConflict { attempted, current })) => {
                    // Leave the observed-version mark alone: the retry's
                    // read must still register as newer so the conflicting
                    // tabs get merged in.
                    self.vitals.note_store_responsive();
                    if attempt >= self.max_attempts {
                        warn!(
                            attempts = attempt,
                            attempted, current, "Write retries exhausted on version conflict"
                        );
                        return Err(WriteError::VersionConflict(attempt));
                    }
                    debug!(attempt, attempted, current, "Version conflict; retrying");
                    let jitter = rand::rng().random_range(5..30);
                    tokio::time::sleep(Duration::from_millis(jitter)).await;
                }
                Ok(Err(e)) => return Err(WriteError::Backend(e)),
                Ok(Ok(version)) => {
                    self.vitals.note_store_responsive();
                    self.vitals.note_synced(version);
                    self.cache.refresh(&envelope.tabs, version);
                    debug!(version, tabs = envelope.tabs.len(), "Write committed");
                    return Ok(version);
                }
            }
        }
    }

    fn on_timeout(&self, call: &str) -> WriteError {
        let crossed = self.vitals.note_timeout(self.degraded_threshold);
        if crossed {
            warn!(
                call,
                timeouts = self.vitals.timeout_count(),
                "Store unresponsive; entering degraded state"
            );
        } else {
            warn!(call, timeouts = self.vitals.timeout_count(), "Store call timed out");
        }
        WriteError::Timeout
    }
}
