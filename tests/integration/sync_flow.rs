//! Integration tests for cross-context synchronization
//!
//! Two engine contexts share one in-memory store and converge through
//! change notifications, last-writer-wins merge, and forced resync.

use std::sync::Arc;

use chrono::Utc;
use overtab::{MemoryStore, Position, SharedStore, TabEntity, WriteEnvelope};

use super::common::fixtures::{engine, entity_owned_by, settle};

#[tokio::test]
async fn test_entity_created_in_one_context_appears_in_other() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());
    let b = engine("ctx-b", store.clone());

    let entity = entity_owned_by("ctx-a", "shared");
    let id = entity.id;
    assert!(a.create(entity).success);
    settle().await;

    assert!(b.entities().contains(id));
    let adopted = b.entities().get(id).unwrap();
    assert_eq!(adopted.title, "shared");

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_newer_remote_mutation_wins_locally() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());
    let b = engine("ctx-b", store.clone());

    let entity = TabEntity::new("https://example.com/shared", "original")
        .with_position(100.0, 100.0);
    let id = entity.id;
    a.create(entity);
    settle().await;
    assert!(b.entities().contains(id));

    assert!(a.move_to(id, Position::new(250.0, 50.0), "drag").success);
    settle().await;

    assert_eq!(
        b.entities().get(id).unwrap().position,
        Position::new(250.0, 50.0)
    );

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_stale_remote_copy_does_not_clobber_local() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());

    let entity = entity_owned_by("ctx-a", "fresh");
    let id = entity.id;
    a.create(entity);
    settle().await;

    // A notification arrives carrying an older copy of the entity
    let mut stale = a.entities().get(id).unwrap();
    stale.title = "stale".to_string();
    stale.last_modified = stale.last_modified - chrono::Duration::seconds(30);
    let version = store.version_of("overtab/tabs") + 1;
    store
        .put(
            "overtab/tabs",
            WriteEnvelope::new(vec![stale], version, "other-writer", Utc::now()),
        )
        .await
        .unwrap();
    settle().await;

    assert_eq!(a.entities().get(id).unwrap().title, "fresh");

    a.shutdown().await;
}

#[tokio::test]
async fn test_local_only_entity_survives_remote_merge() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());

    // Remote write that knows nothing about our local entity
    let remote = TabEntity::new("https://example.com/remote", "remote");
    let remote_id = remote.id;
    store
        .put(
            "overtab/tabs",
            WriteEnvelope::new(vec![remote], 1, "other-writer", Utc::now()),
        )
        .await
        .unwrap();

    let local = entity_owned_by("ctx-a", "local");
    let local_id = local.id;
    a.create(local);
    settle().await;

    // Both survive: the remote one was adopted, the local one was kept
    assert!(a.entities().contains(remote_id));
    assert!(a.entities().contains(local_id));

    a.shutdown().await;
}

#[tokio::test]
async fn test_force_resync_recovers_missed_notifications() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());

    let entity = entity_owned_by("ctx-a", "missed");
    let id = entity.id;
    a.create(entity);
    settle().await;
    a.shutdown().await;

    // This context subscribed after the write; the notification is gone
    let late = engine("ctx-late", store);
    assert!(!late.entities().contains(id));

    late.force_resync().await;
    assert!(late.entities().contains(id));

    late.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_notification_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());

    let remote = TabEntity::new("https://example.com/dup", "dup");
    let id = remote.id;
    let envelope = WriteEnvelope::new(vec![remote], 1, "other-writer", Utc::now());
    store.put("overtab/tabs", envelope.clone()).await.unwrap();
    settle().await;
    assert!(a.entities().contains(id));

    // Rename locally, then replay the same notification content. The replay
    // is deduplicated, so the local rename stands even though the replayed
    // copy has the same timestamp payload.
    a.entities()
        .update_with(id, |e| e.title = "renamed-locally".to_string());
    let mut replay = envelope;
    replay.version = store.version_of("overtab/tabs") + 1;
    store.put("overtab/tabs", replay).await.unwrap();
    settle().await;

    assert_eq!(a.entities().get(id).unwrap().title, "renamed-locally");

    a.shutdown().await;
}

#[tokio::test]
async fn test_consistency_check_recreates_snapshot_for_merged_minimized_entity() {
    let store = Arc::new(MemoryStore::new());
    let a = engine("ctx-a", store.clone());

    // A remote context minimized this entity; we adopt it minimized but
    // have no local snapshot for it.
    let mut remote = TabEntity::new("https://example.com/min", "minimized-remotely");
    remote.visibility.minimized = true;
    let id = remote.id;
    store
        .put(
            "overtab/tabs",
            WriteEnvelope::new(vec![remote], 1, "other-writer", Utc::now()),
        )
        .await
        .unwrap();

    // Wait past the consistency interval (50ms in the test config)
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // Restore works because the consistency check recreated the snapshot
    let result = a.restore(id, "ui");
    assert!(result.success, "restore failed: {:?}", result.error);
    assert!(!a.entities().get(id).unwrap().visibility.minimized);

    a.shutdown().await;
}
