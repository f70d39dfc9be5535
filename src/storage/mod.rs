//! Storage layer for blocktree.
//!
//! This module provides a complete abstraction over Git for durable block
//! storage. The upper layer (the hierarchy manager) uses this API and never
//! touches git2 directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        BlockStore                           │
//! │   open / init · get · list · insert · update · delete       │
//! │            transact (multi-record atomic commit)            │
//! └───────┬──────────┬──────────┬──────────┬──────────┬─────────┘
//!         │          │          │          │          │
//!      types.rs   blob.rs    tree.rs    refs.rs   commit.rs
//!      (ids)      (records)  (blocks/)  (main)    (history)
//! ```
//!
//! Every record is a JSON blob under the `blocks/` tree, every mutation is
//! exactly one commit on `main`, and the branch only advances by
//! compare-and-swap. Crashing between operations can never leave a
//! half-applied mutation behind, because nothing is visible until the commit
//! lands.

mod blob;
mod commit;
mod error;
mod refs;
mod store;
mod tree;
mod types;

pub use commit::{ChangeMessage, CommitInfo};
pub use error::{StorageError, StorageResult};
pub use refs::MAIN_BRANCH;
pub use store::{BlockStore, StoreTx};
pub use types::{BlobId, BlockId, CommitId, InvalidIdError, Signature, TreeId};
