//! Renderer that records every state update for assertions.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use overtab::{RendererBridge, StateUpdate};

#[derive(Default)]
pub struct RecordingRenderer {
    updates: Arc<Mutex<Vec<StateUpdate>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StateUpdate> {
        self.updates.lock().clone()
    }

    pub fn restore_updates(&self) -> Vec<StateUpdate> {
        self.updates
            .lock()
            .iter()
            .filter(|u| u.is_restore)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RendererBridge for RecordingRenderer {
    async fn on_state_updated(&self, update: StateUpdate) {
        self.updates.lock().push(update);
    }
}
