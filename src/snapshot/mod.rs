//! Pre-minimize snapshot capture and retention.

mod store;

pub use store::{Snapshot, SnapshotState, SnapshotStore};
