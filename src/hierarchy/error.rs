//! Error types for hierarchy operations.

use thiserror::Error;

use crate::block::ValidationError;
use crate::storage::{BlockId, StorageError};

/// Errors from hierarchy operations.
///
/// Every structural variant carries the offending block id. Failures inside a
/// cascade surface as `Persistence`; they are never reported as success.
#[derive(Debug, Error)]
pub enum HierarchyError {
    /// the payload failed shape validation; nothing was persisted
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// the referenced parent does not exist
    #[error("parent block '{0}' not found")]
    ParentNotFound(BlockId),

    /// the addressed block does not exist
    #[error("block '{0}' not found")]
    NotFound(BlockId),

    /// traversal revisited a block, meaning the stored links form a cycle
    #[error("cycle detected in hierarchy at block '{0}'")]
    CycleDetected(BlockId),

    /// the storage layer failed
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

impl HierarchyError {
    /// true if this is a missing-block error (target or parent)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HierarchyError::NotFound(_) | HierarchyError::ParentNotFound(_)
        )
    }

    /// true if the operation can be retried as-is
    pub fn is_retriable(&self) -> bool {
        matches!(self, HierarchyError::Persistence(e) if e.is_retriable())
    }
}

/// result type alias for hierarchy operations
pub type HierarchyResult<T> = Result<T, HierarchyError>;
