//! Debounced persistence scheduler
//!
//! Repeated operations on one entity inside the debounce window coalesce
//! into a single store write. Every schedule is a first-class cancellable
//! handle; a newer schedule cancels and supersedes its predecessor, and the
//! surviving schedule's completion runs the completion hook (which releases
//! the locks taken during the window).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::WriteHandle;

/// Hook invoked after a scheduled persist finishes (in any outcome).
pub type CompletionHook = Arc<dyn Fn(Uuid) + Send + Sync>;

/// Handle to one scheduled persist.
struct ScheduledPersist {
    token: Arc<CancellationToken>,
    _task: JoinHandle<()>,
}

impl ScheduledPersist {
    fn cancel(&self) {
        self.token.cancel();
    }
}

/// Per-entity debounce of store writes.
#[derive(Clone)]
pub struct PersistScheduler {
    window: Duration,
    writer: WriteHandle,
    pending: Arc<Mutex<HashMap<Uuid, ScheduledPersist>>>,
    on_complete: CompletionHook,
}

impl PersistScheduler {
    pub fn new(window: Duration, writer: WriteHandle, on_complete: CompletionHook) -> Self {
        Self {
            window,
            writer,
            pending: Arc::new(Mutex::new(HashMap::new())),
            on_complete,
        }
    }

    /// Schedule a persist for the entity, cancelling and superseding any
    /// pending schedule for it.
    pub fn schedule(&self, entity_id: Uuid) {
        let token = Arc::new(CancellationToken::new());
        let task_token = token.clone();
        let writer = self.writer.clone();
        let pending = self.pending.clone();
        let on_complete = self.on_complete.clone();
        let window = self.window;

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => return,
                _ = tokio::time::sleep(window) => {}
            }

            match writer.enqueue_persist().await {
                Ok(Ok(version)) => {
                    debug!(entity = %entity_id, version, "Debounced persist committed")
                }
                Ok(Err(e)) => warn!(entity = %entity_id, error = %e, "Debounced persist failed"),
                Err(_) => warn!(entity = %entity_id, "Write coordinator dropped the persist"),
            }

            // Only remove our own entry; a newer schedule may have replaced it
            let mut map = pending.lock();
            if let Some(entry) = map.get(&entity_id) {
                if Arc::ptr_eq(&entry.token, &task_token) {
                    map.remove(&entity_id);
                }
            }
            drop(map);

            (on_complete)(entity_id);
        });

        let mut map = self.pending.lock();
        if let Some(previous) = map.insert(entity_id, ScheduledPersist { token, _task: task }) {
            previous.cancel();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Cancel every pending schedule without persisting.
    pub fn cancel_all(&self) {
        let mut map = self.pending.lock();
        for (_, entry) in map.drain() {
            entry.cancel();
        }
    }

    /// Cancel pending timers and issue one immediate persist covering
    /// everything. Used on shutdown.
    pub async fn flush(&self) {
        self.cancel_all();
        if let Ok(Err(e)) = self.writer.enqueue_persist().await {
            warn!(error = %e, "Flush persist failed");
        }
    }
}
