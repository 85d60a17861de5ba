//! Advisory operation locks
//!
//! Locks are purely local to one context and never persisted. They exist to
//! stop a single context from re-entering the same operation concurrently
//! with itself (a double-click firing two restores), not to coordinate
//! across contexts — the shared store's versioning does that.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::model::ContextId;

use super::error::OperationError;

/// Lifecycle operation kinds, one lock namespace each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Minimize,
    Restore,
    Solo,
    Mute,
    Focus,
    Close,
    Move,
    Resize,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Minimize => "minimize",
            OpKind::Restore => "restore",
            OpKind::Solo => "solo",
            OpKind::Mute => "mute",
            OpKind::Focus => "focus",
            OpKind::Close => "close",
            OpKind::Move => "move",
            OpKind::Resize => "resize",
        }
    }
}

/// Identity of one advisory lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub op: OpKind,
    pub context: ContextId,
    pub entity: Uuid,
    pub source: String,
}

impl LockKey {
    pub fn new(op: OpKind, context: ContextId, entity: Uuid, source: impl Into<String>) -> Self {
        Self {
            op,
            context,
            entity,
            source: source.into(),
        }
    }
}

/// Table of held locks with timeout-based auto-release.
#[derive(Clone)]
pub struct LockTable {
    inner: Arc<Mutex<HashMap<LockKey, Instant>>>,
    timeout: Duration,
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Acquire the lock, rejecting with `LockHeld` while an unexpired lock
    /// for the same key exists. A stale lock is logged and replaced rather
    /// than blocking forever.
    pub fn acquire(&self, key: LockKey) -> Result<(), OperationError> {
        let mut locks = self.inner.lock();
        if let Some(acquired_at) = locks.get(&key) {
            if acquired_at.elapsed() < self.timeout {
                return Err(OperationError::LockHeld);
            }
            warn!(
                op = key.op.as_str(),
                entity = %key.entity,
                source = %key.source,
                age_ms = acquired_at.elapsed().as_millis() as u64,
                "Auto-releasing stale operation lock"
            );
        }
        locks.insert(key, Instant::now());
        Ok(())
    }

    pub fn release(&self, key: &LockKey) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Release every lock held for an entity. Called when the entity's
    /// debounced persist completes and when the entity closes.
    pub fn release_entity(&self, entity: Uuid) -> usize {
        let mut locks = self.inner.lock();
        let before = locks.len();
        locks.retain(|key, _| key.entity != entity);
        before - locks.len()
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().len()
    }
}
