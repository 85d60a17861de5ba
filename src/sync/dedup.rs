//! Notification deduplication and self-write filtering
//!
//! The store's notification channel may deliver the same change more than
//! once and may echo the writer's own writes back to it. Both are filtered
//! here before any merge work happens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::model::WriteEnvelope;

/// Rejects repeated notifications within a TTL window.
///
/// A notification's fingerprint is a content hash of the sorted entity ids
/// plus the envelope timestamp, so redundant deliveries of the same write
/// collapse while distinct writes that happen to carry the same tab set do
/// not.
#[derive(Clone)]
pub struct NotificationDeduper {
    seen: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl NotificationDeduper {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Record the envelope. Returns true when it is fresh, false for a
    /// repeat within the TTL window.
    pub fn observe(&self, envelope: &WriteEnvelope) -> bool {
        let fingerprint = Self::fingerprint(envelope);
        let now = Instant::now();
        let mut seen = self.seen.lock();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);

        match seen.get(&fingerprint) {
            Some(_) => false,
            None => {
                seen.insert(fingerprint, now);
                true
            }
        }
    }

    fn fingerprint(envelope: &WriteEnvelope) -> String {
        let mut hasher = Sha256::new();
        for id in envelope.sorted_ids() {
            hasher.update(id.as_bytes());
        }
        hasher.update(envelope.timestamp.timestamp_millis().to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Tracks writer ids issued by this context so its own notifications can be
/// recognized. Entries expire after the TTL; a matching notification also
/// consumes its entry.
#[derive(Clone)]
pub struct SelfWriteFilter {
    issued: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl SelfWriteFilter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            issued: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Register a writer id just before the write is attempted.
    pub fn register(&self, writer_id: &str) {
        let now = Instant::now();
        let mut issued = self.issued.lock();
        issued.retain(|_, at| now.duration_since(*at) < self.ttl);
        issued.insert(writer_id.to_string(), now);
    }

    /// Whether the writer id belongs to this context.
    pub fn is_self(&self, writer_id: &str) -> bool {
        let now = Instant::now();
        let mut issued = self.issued.lock();
        issued.retain(|_, at| now.duration_since(*at) < self.ttl);
        issued.remove(writer_id).is_some()
    }
}
