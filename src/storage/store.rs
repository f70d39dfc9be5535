//! Core block store.
//!
//! This is the central component of the storage layer. It wraps
//! `git2::Repository` with thread-safe access and provides the keyed record
//! operations the hierarchy manager uses: point lookup, lookup-by-parent,
//! insert, partial field update, delete.
//!
//! Every mutation goes through [`BlockStore::transact`]: the closure reads a
//! consistent snapshot and stages any number of record puts/deletes, which
//! are then written as ONE tree and ONE commit while the write lock is held.
//! A mutation either commits fully or not at all; abandoning the caller
//! mid-sequence can never leave a half-applied state behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository;
use parking_lot::{Mutex, RwLock};

use crate::block::{Block, UpdateBlock};
use crate::storage::blob;
use crate::storage::commit::{self, ChangeMessage, CommitBuilder, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::tree::{TreeHandle, TreeMutator};
use crate::storage::types::{BlockId, CommitId, Signature};

/// The main block store handle.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct BlockStore {
    inner: Arc<BlockStoreInner>,
}

struct BlockStoreInner {
    repo: RwLock<Repository>,
    path: PathBuf,
    signature: Mutex<Signature>,
}

impl BlockStore {
    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)
            .map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;

        Ok(Self {
            inner: Arc::new(BlockStoreInner {
                repo: RwLock::new(repo),
                path: path.to_path_buf(),
                signature: Mutex::new(Signature::blocktree()),
            }),
        })
    }

    /// Initialize a new store.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;

        let store = Self {
            inner: Arc::new(BlockStoreInner {
                repo: RwLock::new(repo),
                path: path.to_path_buf(),
                signature: Mutex::new(Signature::blocktree()),
            }),
        };

        // Create initial commit
        store.with_repo(|repo| {
            let signature = store.inner.signature.lock().clone();
            let commit_id = commit::create_initial_commit(repo, &signature)?;
            RefManager::init_main_branch(repo, commit_id)?;
            Ok(())
        })?;

        Ok(store)
    }

    /// Open or initialize a store.
    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    /// Create a throwaway store in a temporary directory (for testing).
    ///
    /// The store lives as long as the returned TempDir.
    pub fn in_memory() -> StorageResult<(tempfile::TempDir, Self)> {
        let dir = tempfile::TempDir::new()?;
        let store = Self::init(dir.path())?;
        Ok((dir, store))
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Set the signature recorded on subsequent commits.
    pub fn with_signature(self, signature: Signature) -> Self {
        *self.inner.signature.lock() = signature;
        self
    }

    /// Execute a function with read access to the repository.
    fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.read();
        f(&repo)
    }

    /// Get the current head commit (tip of main branch).
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(RefManager::head_commit)
    }

    /// Assign a fresh unique record id.
    ///
    /// Ids are time-ordered ULIDs, never reused after deletion.
    pub fn allocate_id(&self) -> BlockId {
        BlockId::generate()
    }

    // ==================== Read Operations ====================

    /// Point lookup of a block record.
    pub fn get(&self, id: &BlockId) -> StorageResult<Option<Block>> {
        self.with_repo(|repo| {
            let tree = head_tree(repo)?;
            read_record(repo, &tree, id)
        })
    }

    /// Check if a block record exists.
    pub fn contains(&self, id: &BlockId) -> StorageResult<bool> {
        self.with_repo(|repo| {
            let tree = head_tree(repo)?;
            tree.record_exists(repo, id)
        })
    }

    /// All block records, in insertion order, from one snapshot.
    pub fn list_all(&self) -> StorageResult<Vec<Block>> {
        self.with_repo(|repo| {
            let tree = head_tree(repo)?;
            read_all_records(repo, &tree)
        })
    }

    /// All direct children of the given parent (or all roots if `None`),
    /// in insertion order.
    pub fn list_by_parent(&self, parent: Option<&BlockId>) -> StorageResult<Vec<Block>> {
        let all = self.list_all()?;
        Ok(all
            .into_iter()
            .filter(|block| block.parent_id.as_ref() == parent)
            .collect())
    }

    /// Number of stored block records.
    pub fn len(&self) -> StorageResult<usize> {
        self.with_repo(|repo| {
            let tree = head_tree(repo)?;
            tree.count_records(repo)
        })
    }

    /// True if no block records are stored.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Get the mutation history, most recent first.
    pub fn history(&self, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>> {
        self.with_repo(|repo| {
            let head = RefManager::head_commit(repo)?;
            let iter = commit::history(repo, head)?;
            match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            }
        })
    }

    // ==================== Mutations ====================

    /// Run a closure against a consistent snapshot, then commit everything it
    /// staged as one atomic commit.
    ///
    /// The write lock is held for the whole call, so the snapshot the closure
    /// reads is exactly the state its staged changes land on. Main is still
    /// advanced with compare-and-swap to catch writers from another process
    /// on the same directory. If the closure stages nothing, no commit is
    /// made.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&mut StoreTx<'_>) -> Result<T, E>,
    {
        let guard = self.inner.repo.write();
        let repo: &Repository = &guard;

        let head = RefManager::head_commit(repo)?;
        let tree = commit::get_tree_at_commit(repo, head)?;

        let mut tx = StoreTx {
            repo,
            tree,
            puts: Vec::new(),
            deletes: Vec::new(),
            message: None,
        };
        let value = f(&mut tx)?;

        let StoreTx {
            tree,
            puts,
            deletes,
            message,
            ..
        } = tx;

        if puts.is_empty() && deletes.is_empty() {
            return Ok(value);
        }

        let mut mutator = TreeMutator::from_tree(repo, &tree)?;
        for block in &puts {
            let blob_id = blob::write_record(repo, block)?;
            mutator.upsert_record(&block.id, blob_id)?;
        }
        for id in &deletes {
            mutator.delete_record(id)?;
        }
        let new_tree_id = mutator.write()?;

        let commit_id = CommitBuilder::new(repo)
            .tree(new_tree_id)
            .parent(head)
            .message(message.unwrap_or_else(|| "[APPLY] batch".to_string()))
            .signature(self.inner.signature.lock().clone())
            .commit()?;

        RefManager::update_main_if_unchanged(repo, head, commit_id)?;

        Ok(value)
    }

    /// Persist a new block record.
    ///
    /// Fails if the id already exists.
    pub fn insert(&self, block: Block) -> StorageResult<Block> {
        self.transact(|tx| {
            if tx.contains(&block.id)? {
                return Err(StorageError::RecordAlreadyExists(block.id.clone()));
            }
            tx.set_message(ChangeMessage::create(&block.id));
            tx.put(block.clone());
            Ok(block)
        })
    }

    /// Apply only the fields present in the partial payload; absent fields
    /// are left untouched.
    ///
    /// Fails if the record doesn't exist. Returns the updated record.
    pub fn update_fields(&self, id: &BlockId, patch: &UpdateBlock) -> StorageResult<Block> {
        self.transact(|tx| {
            let mut block = tx
                .get(id)?
                .ok_or_else(|| StorageError::RecordNotFound(id.clone()))?;

            if patch.is_empty() {
                return Ok(block);
            }

            patch.apply_to(&mut block.title, &mut block.description);
            block.touch();

            tx.set_message(ChangeMessage::update(id));
            tx.put(block.clone());
            Ok(block)
        })
    }

    /// Remove a single block record.
    ///
    /// Fails if the record doesn't exist. Structural consistency (children,
    /// parent back-reference) is the hierarchy manager's concern.
    pub fn delete(&self, id: &BlockId) -> StorageResult<()> {
        self.transact(|tx| {
            if !tx.contains(id)? {
                return Err(StorageError::RecordNotFound(id.clone()));
            }
            tx.set_message(ChangeMessage::delete(id, 0));
            tx.delete(id.clone());
            Ok(())
        })
    }
}

/// An in-flight store transaction: snapshot reads plus staged writes.
///
/// Reads see the snapshot taken at transaction start, not the staged writes.
pub struct StoreTx<'repo> {
    repo: &'repo Repository,
    tree: TreeHandle<'repo>,
    puts: Vec<Block>,
    deletes: Vec<BlockId>,
    message: Option<String>,
}

impl StoreTx<'_> {
    /// point lookup against the snapshot
    pub fn get(&self, id: &BlockId) -> StorageResult<Option<Block>> {
        read_record(self.repo, &self.tree, id)
    }

    /// existence check against the snapshot
    pub fn contains(&self, id: &BlockId) -> StorageResult<bool> {
        self.tree.record_exists(self.repo, id)
    }

    /// all records in the snapshot, insertion order
    pub fn list_all(&self) -> StorageResult<Vec<Block>> {
        read_all_records(self.repo, &self.tree)
    }

    /// direct children of a parent (or roots) in the snapshot
    pub fn list_by_parent(&self, parent: Option<&BlockId>) -> StorageResult<Vec<Block>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|block| block.parent_id.as_ref() == parent)
            .collect())
    }

    /// stage a record write (insert or replace)
    pub fn put(&mut self, block: Block) {
        self.puts.push(block);
    }

    /// stage a record removal
    pub fn delete(&mut self, id: BlockId) {
        self.deletes.push(id);
    }

    /// set the commit message for the staged changes
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }
}

/// resolve the tree at the current head
fn head_tree(repo: &Repository) -> StorageResult<TreeHandle<'_>> {
    let head = RefManager::head_commit(repo)?;
    commit::get_tree_at_commit(repo, head)
}

/// read and deserialize one record from a tree snapshot
fn read_record(
    repo: &Repository,
    tree: &TreeHandle<'_>,
    id: &BlockId,
) -> StorageResult<Option<Block>> {
    let blob_id = match tree.get_record_blob_id(repo, id)? {
        Some(blob_id) => blob_id,
        None => return Ok(None),
    };

    let bytes = blob::read_blob(repo, blob_id)?;
    let block = blob::deserialize_record(&bytes, id)?;
    Ok(Some(block))
}

/// read every record from a tree snapshot, in id (= insertion) order
fn read_all_records(repo: &Repository, tree: &TreeHandle<'_>) -> StorageResult<Vec<Block>> {
    let ids = tree.list_ids(repo)?;

    let mut blocks = Vec::with_capacity(ids.len());
    for id in ids {
        let block = read_record(repo, tree, &id)?
            .ok_or_else(|| StorageError::RecordNotFound(id.clone()))?;
        blocks.push(block);
    }

    Ok(blocks)
}
