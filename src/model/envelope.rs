//! Write envelope: the unit persisted to and read from the shared store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::TabEntity;

/// Everything a single store write carries.
///
/// `writer_id` is unique per write attempt so downstream consumers can
/// recognize self-originated notifications when the store's notification
/// channel does not reliably exclude the writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteEnvelope {
    pub tabs: Vec<TabEntity>,
    pub version: u64,
    pub writer_id: String,
    pub timestamp: DateTime<Utc>,
}

impl WriteEnvelope {
    pub fn new(
        tabs: Vec<TabEntity>,
        version: u64,
        writer_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tabs,
            version,
            writer_id: writer_id.into(),
            timestamp,
        }
    }

    /// Entity ids in sorted order (stable input for dedup fingerprinting).
    pub fn sorted_ids(&self) -> Vec<uuid::Uuid> {
        let mut ids: Vec<_> = self.tabs.iter().map(|t| t.id).collect();
        ids.sort();
        ids
    }
}
