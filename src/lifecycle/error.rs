//! Operation error taxonomy and the command-surface result type.

use thiserror::Error;
use uuid::Uuid;

/// Every way a lifecycle operation can fail.
///
/// These are returned as structured results, never thrown past the command
/// boundary; only malformed entity construction is treated as a programming
/// error upstream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("entity is owned by another context")]
    OwnershipRejected,
    #[error("an identical operation is already in progress")]
    LockHeld,
    #[error("no snapshot available and no persisted fallback")]
    SnapshotMissing,
    #[error("write retries exhausted on version conflict")]
    VersionConflict,
    #[error("shared store call timed out")]
    StoreTimeout,
    #[error("shared store degraded; mutations are local-only")]
    StoreDegraded,
    #[error("invalid entity: {0}")]
    InvalidEntity(String),
    #[error("renderer did not acknowledge within the callback window")]
    CallbackTimeout,
    #[error("no entity with id {0}")]
    UnknownEntity(Uuid),
}

impl OperationError {
    /// Stable error code carried across the command boundary.
    pub fn code(&self) -> &'static str {
        match self {
            OperationError::OwnershipRejected => "OwnershipRejected",
            OperationError::LockHeld => "LockHeld",
            OperationError::SnapshotMissing => "SnapshotMissing",
            OperationError::VersionConflict => "VersionConflict",
            OperationError::StoreTimeout => "StoreTimeout",
            OperationError::StoreDegraded => "StoreDegraded",
            OperationError::InvalidEntity(_) => "InvalidEntity",
            OperationError::CallbackTimeout => "CallbackTimeout",
            OperationError::UnknownEntity(_) => "UnknownEntity",
        }
    }
}

/// Synchronous result of one command-surface call. Persistence completes
/// asynchronously after this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn err(error: OperationError) -> Self {
        Self {
            success: false,
            error: Some(error.code().to_string()),
        }
    }
}

impl From<Result<(), OperationError>> for CommandResult {
    fn from(result: Result<(), OperationError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::err(e),
        }
    }
}
