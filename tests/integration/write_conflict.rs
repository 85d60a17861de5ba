//! Integration tests for versioned writes and store degradation
//!
//! Covers the two-writer conflict/merge/retry flow and the
//! consecutive-timeout degraded state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use overtab::store::BackendError;
use overtab::{
    ContextId, MemoryStore, OvertabCore, SharedStore, StoreNotification, StoreRecord,
    WriteEnvelope,
};
use tokio::sync::broadcast;

use super::common::fixtures::{engine, entity_owned_by, fast_config, settle};

#[tokio::test]
async fn test_two_writers_conflict_merge_and_advance() {
    let store = Arc::new(MemoryStore::new());

    // Seed the store at version 5
    for v in 1..=5 {
        store
            .put(
                "overtab/tabs",
                WriteEnvelope::new(Vec::new(), v, format!("seed-{v}"), Utc::now()),
            )
            .await
            .unwrap();
    }

    let a = engine("ctx-a", store.clone());
    let b = engine("ctx-b", store.clone());

    let from_a = entity_owned_by("ctx-a", "from-a");
    let from_b = entity_owned_by("ctx-b", "from-b");
    let (a_id, b_id) = (from_a.id, from_b.id);

    // Both contexts mutate from the same observed version; the slower
    // writer detects the conflict, merges, and retries.
    assert!(a.create(from_a).success);
    assert!(b.create(from_b).success);
    settle().await;
    settle().await;

    let record = store.get("overtab/tabs").await.unwrap();
    assert_eq!(record.version, 7, "both writes must land, 5 -> 6 -> 7");
    let ids: Vec<_> = record.tabs.iter().map(|t| t.id).collect();
    assert!(ids.contains(&a_id));
    assert!(ids.contains(&b_id));

    a.shutdown().await;
    b.shutdown().await;
}

/// Store that can be switched into a black-hole mode where calls hang.
struct OutageStore {
    inner: MemoryStore,
    down: std::sync::atomic::AtomicBool,
}

impl OutageStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            down: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, std::sync::atomic::Ordering::SeqCst);
    }

    fn is_down(&self) -> bool {
        self.down.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl SharedStore for OutageStore {
    async fn get(&self, key: &str) -> Result<StoreRecord, BackendError> {
        if self.is_down() {
            futures::future::pending().await
        } else {
            self.inner.get(key).await
        }
    }

    async fn put(&self, key: &str, envelope: WriteEnvelope) -> Result<u64, BackendError> {
        if self.is_down() {
            futures::future::pending().await
        } else {
            self.inner.put(key, envelope).await
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreNotification> {
        self.inner.subscribe()
    }
}

#[tokio::test]
async fn test_store_outage_degrades_then_recovers() {
    let store = Arc::new(OutageStore::new());
    store.set_down(true);

    let core = OvertabCore::new(
        fast_config(),
        ContextId::new("ctx-a"),
        store.clone(),
        Arc::new(overtab::NullRenderer),
    );

    // Three mutations, three store timeouts
    let mut ids = Vec::new();
    for i in 0..3 {
        let entity = entity_owned_by("ctx-a", &format!("offline-{i}"));
        ids.push(entity.id);
        assert!(core.create(entity).success, "local mutation must succeed");
        // Each debounced persist needs time to time out (200ms in test config)
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    assert!(core.is_degraded());
    assert_eq!(core.timeout_count(), 3);
    assert!(core.is_unsynced());

    // Further mutations are local-only; the write is skipped, not retried
    let extra = entity_owned_by("ctx-a", "while-degraded");
    let extra_id = extra.id;
    assert!(core.create(extra).success);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(core.entities().contains(extra_id));
    assert_eq!(store.inner.version_of("overtab/tabs"), 0);

    // Store comes back; manual reset re-enables persistence
    store.set_down(false);
    core.reset_degraded();
    assert!(!core.is_degraded());
    assert_eq!(core.timeout_count(), 0);

    let recovered = entity_owned_by("ctx-a", "back-online");
    assert!(core.create(recovered).success);
    settle().await;

    assert!(store.inner.version_of("overtab/tabs") > 0);
    assert!(!core.is_unsynced());
    let record = store.get("overtab/tabs").await.unwrap();
    // Everything accumulated while degraded rides along on the first
    // successful write.
    assert_eq!(record.tabs.len(), 5);

    core.shutdown().await;
}

#[tokio::test]
async fn test_conflicting_closes_and_creates_converge() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());
    let b = engine("ctx-b", store.clone());

    let keeper = entity_owned_by("ctx-a", "keeper");
    let goner = entity_owned_by("ctx-a", "goner");
    let (keeper_id, goner_id) = (keeper.id, goner.id);
    a.create(keeper);
    a.create(goner);
    settle().await;
    assert!(b.entities().contains(keeper_id));

    // ctx-a closes one entity while ctx-b creates a new one
    let newcomer = entity_owned_by("ctx-b", "newcomer");
    let newcomer_id = newcomer.id;
    assert!(a.close(goner_id).success);
    assert!(b.create(newcomer).success);
    settle().await;
    settle().await;

    let record = store.get("overtab/tabs").await.unwrap();
    let ids: Vec<_> = record.tabs.iter().map(|t| t.id).collect();
    assert!(ids.contains(&keeper_id));
    assert!(ids.contains(&newcomer_id));

    a.shutdown().await;
    b.shutdown().await;
}
