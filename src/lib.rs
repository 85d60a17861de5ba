pub mod config;
pub mod core;
pub mod lifecycle;
pub mod model;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod util;

pub use crate::config::Config;
pub use crate::core::{NullRenderer, OvertabCore, RendererBridge, StateUpdate};
pub use crate::lifecycle::{CommandResult, LifecycleManager, OperationError};
pub use crate::model::{
    ContextId, EntityStore, Position, Size, TabEntity, Visibility, WriteEnvelope,
};
pub use crate::snapshot::{Snapshot, SnapshotStore};
pub use crate::store::{MemoryStore, SharedStore, SqliteStore, StoreNotification, StoreRecord};
pub use crate::sync::SyncCoordinator;
