//! Shared store seam
//!
//! The shared store is the only channel between contexts. It is eventually
//! consistent: reads may lag writes, notifications may be lost, duplicated,
//! or delivered to the writer itself. The engine assumes nothing beyond the
//! version check on `put`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::model::{TabEntity, WriteEnvelope};

/// What a store read returns: the current tab list and its version.
#[derive(Debug, Clone, Default)]
pub struct StoreRecord {
    pub tabs: Vec<TabEntity>,
    pub version: u64,
}

/// Change notification delivered to subscribed contexts.
///
/// Delivery is asynchronous with no ordering or dedup guarantee, and the
/// writer's own context may or may not receive its own notification.
#[derive(Debug, Clone)]
pub struct StoreNotification {
    pub envelope: WriteEnvelope,
}

/// Errors surfaced by a store backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("version conflict: attempted {attempted}, store at {current}")]
    VersionConflict { attempted: u64, current: u64 },
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Asynchronous, versioned key-value store shared by all contexts.
///
/// `put` succeeds only when `envelope.version` is exactly one past the
/// stored version (a fresh key counts as version 0), which is the sole
/// concurrency primitive the engine relies on.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<StoreRecord, BackendError>;

    /// Persist the envelope. Returns the new stored version.
    async fn put(&self, key: &str, envelope: WriteEnvelope) -> Result<u64, BackendError>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreNotification>;
}
