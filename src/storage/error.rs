//! Storage layer error types
//!
//! All errors that can occur during storage operations are defined here
//! We use `thiserror` for ergonomic error definition and better error messages

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::{BlockId, InvalidIdError};

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// the requested block record was not found
    #[error("record not found: {0}")]
    RecordNotFound(BlockId),

    /// the block record already exists (duplicate id)
    #[error("record already exists: {0}")]
    RecordAlreadyExists(BlockId),

    /// invalid block id
    #[error("invalid block id: {0}")]
    InvalidId(#[from] InvalidIdError),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// the specified branch/ref was not found
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// data integrity check failed
    #[error("corrupted record at {path}: {reason}")]
    CorruptedRecord { path: PathBuf, reason: String },

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// store is not initialized
    #[error("store not initialized: {0}")]
    NotInitialized(PathBuf),

    /// store is empty (no commits)
    #[error("store is empty: no commits found")]
    EmptyStore,

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// the tree entry has an unexpected type
    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// branch update failed due to concurrent modification
    #[error("concurrent modification: branch {branch} was updated by another writer")]
    ConcurrentModification { branch: String },

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::RecordNotFound(_)
                | StorageError::RefNotFound(_)
                | StorageError::CommitNotFound(_)
        )
    }

    /// check if this error is a conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::RecordAlreadyExists(_) | StorageError::ConcurrentModification { .. }
        )
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::ConcurrentModification { .. })
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = StorageError::RecordNotFound(BlockId::new("abc").unwrap());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict = StorageError::RecordAlreadyExists(BlockId::new("abc").unwrap());
        assert!(!conflict.is_not_found());
        assert!(conflict.is_conflict());

        let retriable = StorageError::ConcurrentModification {
            branch: "main".to_string(),
        };
        assert!(retriable.is_retriable());
        assert!(retriable.is_conflict());
    }
}
