//! In-memory shared store
//!
//! Backs tests and single-process embeddings where several engine contexts
//! live in one process. Notifications go out over a broadcast channel to
//! every subscriber, including the writer's own context — the sync
//! coordinator's writer-id filter handles that.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::model::WriteEnvelope;

use super::shared::{BackendError, SharedStore, StoreNotification, StoreRecord};

const NOTIFY_CAPACITY: usize = 64;

/// Broadcast-backed in-memory store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, WriteEnvelope>>>,
    notify: broadcast::Sender<StoreNotification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            notify,
        }
    }

    /// Current version of a key without going through the async trait.
    pub fn version_of(&self, key: &str) -> u64 {
        self.inner.lock().get(key).map(|e| e.version).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<StoreRecord, BackendError> {
        let map = self.inner.lock();
        Ok(match map.get(key) {
            Some(envelope) => StoreRecord {
                tabs: envelope.tabs.clone(),
                version: envelope.version,
            },
            None => StoreRecord::default(),
        })
    }

    async fn put(&self, key: &str, envelope: WriteEnvelope) -> Result<u64, BackendError> {
        let mut map = self.inner.lock();
        let current = map.get(key).map(|e| e.version).unwrap_or(0);
        if envelope.version != current + 1 {
            return Err(BackendError::VersionConflict {
                attempted: envelope.version,
                current,
            });
        }
        let version = envelope.version;
        map.insert(key.to_string(), envelope.clone());
        drop(map);

        // No receivers is fine; notification delivery is best-effort.
        let _ = self.notify.send(StoreNotification { envelope });
        Ok(version)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreNotification> {
        self.notify.subscribe()
    }
}
