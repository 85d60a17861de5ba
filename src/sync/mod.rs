//! Remote change intake: dedup, last-writer-wins merge, resync, and the
//! snapshot/visibility consistency check.

mod cache;
mod coordinator;
mod dedup;
mod merge;

pub use cache::PersistedCache;
pub use coordinator::{spawn_consistency_task, spawn_notification_listener, SyncCoordinator};
pub use dedup::{NotificationDeduper, SelfWriteFilter};
pub use merge::{merge_entity, merge_remote, MergeStats};
