//! Lifecycle orchestration: locks, debounced persistence, z-order, and the
//! command surface.

mod debounce;
mod error;
mod locks;
mod manager;
mod zorder;

pub use debounce::{CompletionHook, PersistScheduler};
pub use error::{CommandResult, OperationError};
pub use locks::{LockKey, LockTable, OpKind};
pub use manager::LifecycleManager;
pub use zorder::ZOrder;
