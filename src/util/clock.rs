//! Monotonic wall-clock timestamp source.
//!
//! Last-writer-wins merging compares `last_modified` timestamps, so a single
//! context must never issue a timestamp that goes backward — even if the
//! system clock does. Skew *across* contexts is an accepted risk of the
//! design and is not compensated for here.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Issues strictly non-decreasing UTC timestamps with millisecond precision.
///
/// Cheap to clone; clones share the same high-water mark.
#[derive(Clone)]
pub struct TimestampSource {
    last_millis: Arc<Mutex<i64>>,
}

impl TimestampSource {
    pub fn new() -> Self {
        Self {
            last_millis: Arc::new(Mutex::new(0)),
        }
    }

    /// Current timestamp, clamped forward past the last issued one.
    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_millis();
        let mut last = self.last_millis.lock();
        let issued = if wall > *last { wall } else { *last + 1 };
        *last = issued;
        Utc.timestamp_millis_opt(issued)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

impl Default for TimestampSource {
    fn default() -> Self {
        Self::new()
    }
}
