//! Integration tests for the lifecycle command surface
//!
//! Exercises minimize/restore round trips, lock exclusivity, ownership
//! gating, and renderer confirmation through a full engine context.

use std::sync::Arc;

use overtab::{ContextId, MemoryStore, Position, SharedStore, Size};

use super::common::fixtures::{engine, engine_with_renderer, entity_owned_by, settle};
use super::common::recording_renderer::RecordingRenderer;

#[tokio::test]
async fn test_minimize_restore_preserves_geometry() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    let entity = entity_owned_by("ctx-a", "round-trip");
    let id = entity.id;
    assert!(core.create(entity).success);
    settle().await;

    assert!(core.minimize(id, "ui").success);
    assert!(core.entities().get(id).unwrap().visibility.minimized);
    settle().await;

    assert!(core.restore(id, "ui").success);
    let restored = core.entities().get(id).unwrap();
    assert!(!restored.visibility.minimized);
    assert_eq!(restored.position, Position::new(100.0, 100.0));
    assert_eq!(restored.size, Size::new(400.0, 300.0));

    core.shutdown().await;
}

#[tokio::test]
async fn test_restore_ignores_corrupted_live_fields() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    let entity = entity_owned_by("ctx-a", "corrupted");
    let id = entity.id;
    core.create(entity);
    settle().await;

    core.minimize(id, "ui");
    // An unrelated bug scribbles over the live entity between minimize and
    // restore; the snapshot must still win.
    core.entities().update_with(id, |e| {
        e.position = Position::new(999.0, 999.0);
    });
    settle().await;

    assert!(core.restore(id, "ui").success);
    assert_eq!(
        core.entities().get(id).unwrap().position,
        Position::new(100.0, 100.0)
    );

    core.shutdown().await;
}

#[tokio::test]
async fn test_back_to_back_minimize_is_single_effect() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    let entity = entity_owned_by("ctx-a", "double-click");
    let id = entity.id;
    core.create(entity);
    settle().await;

    let first = core.minimize(id, "ui");
    let second = core.minimize(id, "ui");

    assert!(first.success);
    assert!(!second.success);
    assert_eq!(second.error.as_deref(), Some("LockHeld"));

    core.shutdown().await;
}

#[tokio::test]
async fn test_restore_without_snapshot_or_fallback_fails() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    // Entity inserted behind the engine's back: minimized, never persisted,
    // no snapshot captured.
    let mut entity = entity_owned_by("ctx-a", "orphan");
    entity.visibility.minimized = true;
    let id = entity.id;
    core.entities().upsert(entity);

    let result = core.restore(id, "ui");
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("SnapshotMissing"));
    assert!(core.entities().get(id).unwrap().visibility.minimized);

    core.shutdown().await;
}

#[tokio::test]
async fn test_restore_falls_back_to_persisted_record() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    let entity = entity_owned_by("ctx-a", "fallback");
    let id = entity.id;
    core.create(entity);
    // Let the create persist so the record cache holds the good geometry
    settle().await;

    core.entities().update_with(id, |e| {
        e.visibility.minimized = true;
        e.position = Position::new(777.0, 777.0);
    });

    assert!(core.restore(id, "ui").success);
    let restored = core.entities().get(id).unwrap();
    assert!(!restored.visibility.minimized);
    assert_eq!(restored.position, Position::new(100.0, 100.0));

    core.shutdown().await;
}

#[tokio::test]
async fn test_foreign_owner_rejected_everywhere() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    let entity = entity_owned_by("ctx-other", "foreign");
    let id = entity.id;
    core.entities().upsert(entity.clone());

    for result in [
        core.minimize(id, "ui"),
        core.restore(id, "ui"),
        core.focus(id),
        core.close(id),
        core.move_to(id, Position::new(1.0, 1.0), "drag"),
    ] {
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("OwnershipRejected"));
    }
    assert_eq!(core.entities().get(id).unwrap(), entity);

    core.shutdown().await;
}

#[tokio::test]
async fn test_solo_mute_visibility_across_viewers() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    let entity = entity_owned_by("ctx-a", "visibility");
    let id = entity.id;
    core.create(entity);
    settle().await;

    let solo_set = [ContextId::new("ctx-a"), ContextId::new("ctx-b")]
        .into_iter()
        .collect();
    assert!(core.solo(id, solo_set, "ui").success);

    assert_eq!(core.visible_entities(&ContextId::new("ctx-a")).len(), 1);
    assert_eq!(core.visible_entities(&ContextId::new("ctx-b")).len(), 1);
    assert!(core.visible_entities(&ContextId::new("ctx-c")).is_empty());
    settle().await;

    let mute_set = [ContextId::new("ctx-b")].into_iter().collect();
    assert!(core.mute(id, mute_set, "ui").success);

    assert_eq!(core.visible_entities(&ContextId::new("ctx-a")).len(), 1);
    assert!(core.visible_entities(&ContextId::new("ctx-b")).is_empty());
    assert_eq!(core.visible_entities(&ContextId::new("ctx-c")).len(), 1);

    core.shutdown().await;
}

#[tokio::test]
async fn test_close_removes_entity_from_store() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store.clone());

    let entity = entity_owned_by("ctx-a", "closing");
    let id = entity.id;
    core.create(entity);
    settle().await;

    assert!(core.close(id).success);
    assert!(!core.entities().contains(id));
    settle().await;

    let record = store.get("overtab/tabs").await.unwrap();
    assert!(record.tabs.iter().all(|t| t.id != id));

    core.shutdown().await;
}

#[tokio::test]
async fn test_renderer_sees_restore_and_confirms() {
    let store = Arc::new(MemoryStore::new());
    let renderer = Arc::new(RecordingRenderer::new());
    let core = engine_with_renderer("ctx-a", store, renderer.clone());

    let entity = entity_owned_by("ctx-a", "rendered");
    let id = entity.id;
    core.create(entity);
    settle().await;

    core.minimize(id, "ui");
    settle().await;
    core.restore(id, "ui");
    settle().await;

    let restores = renderer.restore_updates();
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].entity_id, id);
    assert!(restores[0].dom_verified);

    // Renderer confirms; the snapshot is permanently cleared
    assert!(core.clear_snapshot(id));
    assert!(!core.clear_snapshot(id));

    core.shutdown().await;
}

#[tokio::test]
async fn test_unconfirmed_snapshot_recovered_by_consistency_check() {
    let store = Arc::new(MemoryStore::new());
    let core = engine("ctx-a", store);

    let entity = entity_owned_by("ctx-a", "never-confirmed");
    let id = entity.id;
    core.create(entity);
    settle().await;

    core.minimize(id, "ui");
    settle().await;
    core.restore(id, "ui");
    // The renderer never calls clear_snapshot. The entity is no longer
    // minimized, so the periodic consistency check removes the leftover.
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    assert!(
        !core.clear_snapshot(id),
        "consistency check should have recovered the unconfirmed snapshot"
    );
    core.shutdown().await;
}

#[tokio::test]
async fn test_focus_recycles_z_indexes_at_ceiling() {
    let store = Arc::new(MemoryStore::new());
    let mut config = super::common::fixtures::fast_config();
    config.z_index_ceiling = 5;
    let core = overtab::OvertabCore::new(
        config,
        ContextId::new("ctx-a"),
        store,
        Arc::new(overtab::NullRenderer),
    );

    let mut ids = Vec::new();
    for i in 0..3 {
        let entity = entity_owned_by("ctx-a", &format!("tab-{i}"));
        ids.push(entity.id);
        core.create(entity);
    }
    settle().await;

    // Push the counter past the ceiling
    for _ in 0..4 {
        for id in &ids {
            assert!(core.focus(*id).success);
            settle().await;
        }
    }

    let max_z = core
        .entities()
        .all()
        .iter()
        .map(|t| t.z_index)
        .max()
        .unwrap();
    assert!(
        max_z <= 5 + 1,
        "recompaction should keep indexes dense, got {max_z}"
    );

    core.shutdown().await;
}
