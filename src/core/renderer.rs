//! Renderer collaborator seam
//!
//! Painting lives outside this crate. The engine pushes state updates
//! through this trait and receives exactly one call back per restore:
//! `OvertabCore::clear_snapshot`, the renderer's confirmation that the
//! entity is visually in place. The trait object is injected once at
//! construction and never rebound.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// One state change pushed to the renderer.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub entity_id: Uuid,
    /// Changed fields as a JSON object
    pub fields: Value,
    /// True when this update concludes a restore and the renderer is
    /// expected to confirm with `clear_snapshot`
    pub is_restore: bool,
    /// True when the fields were produced by a local operation this context
    /// verified itself; false for merged remote state
    pub dom_verified: bool,
}

#[async_trait]
pub trait RendererBridge: Send + Sync {
    async fn on_state_updated(&self, update: StateUpdate);
}

/// Renderer that ignores everything. Headless embeddings and tests.
pub struct NullRenderer;

#[async_trait]
impl RendererBridge for NullRenderer {
    async fn on_state_updated(&self, _update: StateUpdate) {}
}
