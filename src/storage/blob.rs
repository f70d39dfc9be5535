//! Blob operations for block record storage.
//!
//! Each block is stored as a separate pretty-printed JSON file named after
//! its id. The embedded id must match the filename; a mismatch means the
//! store is corrupted and is reported rather than papered over.

use crate::block::Block;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, BlockId};

/// serialize a block record to JSON bytes
///
/// pretty-printed with stable field order, which keeps blobs deduplicable
/// across commits
pub fn serialize_record(block: &Block) -> StorageResult<Vec<u8>> {
    let bytes = serde_json::to_vec_pretty(block)?;
    Ok(bytes)
}

/// deserialize a block record from JSON bytes
///
/// validates that the id in the JSON matches the expected filename id
pub fn deserialize_record(bytes: &[u8], expected_id: &BlockId) -> StorageResult<Block> {
    let block: Block = serde_json::from_slice(bytes)?;

    if block.id != *expected_id {
        return Err(StorageError::CorruptedRecord {
            path: format!("{}.json", expected_id).into(),
            reason: format!(
                "id mismatch: file name suggests '{}' but content has '{}'",
                expected_id, block.id
            ),
        });
    }

    Ok(block)
}

/// write a block record as a blob to the repository
///
/// returns the blob ID (hash of the content)
pub fn write_record(repo: &git2::Repository, block: &Block) -> StorageResult<BlobId> {
    let bytes = serialize_record(block)?;
    let oid = repo.blob(&bytes)?;
    Ok(BlobId::new(oid))
}

/// read a blob's content from the repository
pub fn read_blob(repo: &git2::Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw())?;
    Ok(blob.content().to_vec())
}
