//! Shared store seam, backends, and the write coordinator.

mod memory;
mod shared;
mod sqlite;
mod write_coordinator;

pub use memory::MemoryStore;
pub use shared::{BackendError, SharedStore, StoreNotification, StoreRecord};
pub use sqlite::{SqliteStore, SqliteStoreError};
pub use write_coordinator::{
    spawn_write_coordinator, StoreVitals, WriteError, WriteHandle, WriteResult,
};
