//! tree operations for block record management.
//!
//! in Git, a tree is a directory. In blocktree the root tree holds a single
//! `blocks/` directory whose entries are the block record blobs (JSON files),
//! one per block, named `{id}.json`.
//!
//! this module provides safe abstractions over Git's tree manipulation,
//! which is notoriously fiddly to get right.

use git2::{FileMode, ObjectType, Repository, Tree, TreeBuilder as Git2TreeBuilder};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, BlockId, TreeId};

/// directory holding the block records
pub(crate) const BLOCKS_DIR: &str = "blocks";

/// A read only handle to a git tree at a specific commit
///
/// this provides safe, immutable access to the tree structure.
/// think of it as a snapshot - it won't change even if new commits are made.
#[derive(Debug)]
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    /// create a TreeHandle from a git2::Tree
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    /// get the tree ID
    pub fn id(&self) -> TreeId {
        TreeId::new(self.tree.id())
    }

    /// get the underlying git2::Tree (for internal use)
    pub(crate) fn inner(&self) -> &Tree<'repo> {
        &self.tree
    }

    /// get the subtree holding the block records, if any
    fn blocks_tree(&self, repo: &'repo Repository) -> StorageResult<Option<TreeHandle<'repo>>> {
        match self.tree.get_name(BLOCKS_DIR) {
            Some(entry) => {
                if entry.kind() != Some(ObjectType::Tree) {
                    return Err(StorageError::UnexpectedEntryType {
                        path: BLOCKS_DIR.into(),
                        expected: "tree (directory)".to_string(),
                        found: format!("{:?}", entry.kind()),
                    });
                }
                let tree = repo.find_tree(entry.id())?;
                Ok(Some(TreeHandle::new(tree)))
            }
            None => Ok(None),
        }
    }

    /// List all block ids.
    ///
    /// Git keeps tree entries sorted by name; ids are time-ordered ULIDs, so
    /// this is insertion order.
    pub fn list_ids(&self, repo: &Repository) -> StorageResult<Vec<BlockId>> {
        let blocks = match self.blocks_tree(repo)? {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };

        let ids = blocks
            .tree
            .iter()
            .filter_map(|entry| {
                // only blobs (files)
                if entry.kind() != Some(ObjectType::Blob) {
                    return None;
                }

                let name = entry.name()?;
                let id_str = name.strip_suffix(".json")?;

                BlockId::new(id_str).ok()
            })
            .collect();

        Ok(ids)
    }

    /// get the blob ID for a specific block record
    pub fn get_record_blob_id(
        &self,
        repo: &Repository,
        id: &BlockId,
    ) -> StorageResult<Option<BlobId>> {
        let blocks = match self.blocks_tree(repo)? {
            Some(t) => t,
            None => return Ok(None),
        };

        // resolve to an owned BlobId before `blocks` goes out of scope; the
        // entry borrows from it
        let filename = format!("{}.json", id);
        let blob_id = match blocks.tree.get_name(&filename) {
            Some(entry) => {
                if entry.kind() != Some(ObjectType::Blob) {
                    return Err(StorageError::UnexpectedEntryType {
                        path: format!("{}/{}", BLOCKS_DIR, filename).into(),
                        expected: "blob (file)".to_string(),
                        found: format!("{:?}", entry.kind()),
                    });
                }
                Some(BlobId::new(entry.id()))
            }
            None => None,
        };

        Ok(blob_id)
    }

    /// check if a block record exists
    pub fn record_exists(&self, repo: &Repository, id: &BlockId) -> StorageResult<bool> {
        Ok(self.get_record_blob_id(repo, id)?.is_some())
    }

    /// count block records (for stats)
    pub fn count_records(&self, repo: &Repository) -> StorageResult<usize> {
        Ok(self.list_ids(repo)?.len())
    }
}

/// a mutable tree builder for making changes
///
/// staged changes produce a new tree when written; the original tree is not
/// modified. Several record upserts/deletes staged on one mutator become a
/// single new tree, which is what makes multi-record commits atomic.
///
/// # Usage Pattern
///
/// ```ignore
/// let mut mutator = TreeMutator::from_tree(repo, &tree)?;
/// mutator.upsert_record(&child_id, child_blob)?;
/// mutator.upsert_record(&parent_id, parent_blob)?;
/// let new_tree_id = mutator.write()?;
/// ```
pub struct TreeMutator<'repo> {
    repo: &'repo Repository,
    /// the root tree we're modifying
    root_builder: Git2TreeBuilder<'repo>,
    /// builder for the blocks directory
    blocks_builder: Git2TreeBuilder<'repo>,
}

impl<'repo> TreeMutator<'repo> {
    /// create a new TreeMutator from an existing tree
    pub fn from_tree(repo: &'repo Repository, tree: &TreeHandle<'_>) -> StorageResult<Self> {
        let root_builder = repo.treebuilder(Some(tree.inner()))?;

        let blocks_builder = match tree.inner().get_name(BLOCKS_DIR) {
            Some(entry) if entry.kind() == Some(ObjectType::Tree) => {
                let blocks_tree = repo.find_tree(entry.id())?;
                repo.treebuilder(Some(&blocks_tree))?
            }
            _ => repo.treebuilder(None)?,
        };

        Ok(Self {
            repo,
            root_builder,
            blocks_builder,
        })
    }

    /// create a new TreeMutator for an empty tree
    pub fn empty(repo: &'repo Repository) -> StorageResult<Self> {
        Ok(Self {
            repo,
            root_builder: repo.treebuilder(None)?,
            blocks_builder: repo.treebuilder(None)?,
        })
    }

    /// insert or replace a block record
    pub fn upsert_record(&mut self, id: &BlockId, blob_id: BlobId) -> StorageResult<()> {
        let filename = format!("{}.json", id);
        self.blocks_builder
            .insert(&filename, blob_id.raw(), FileMode::Blob.into())?;
        Ok(())
    }

    /// delete a block record, failing if it doesn't exist
    pub fn delete_record(&mut self, id: &BlockId) -> StorageResult<()> {
        let filename = format!("{}.json", id);

        if self.blocks_builder.get(&filename)?.is_none() {
            return Err(StorageError::RecordNotFound(id.clone()));
        }
        self.blocks_builder.remove(&filename)?;

        Ok(())
    }

    /// write all staged changes and return the new root tree ID
    pub fn write(mut self) -> StorageResult<TreeId> {
        let blocks_tree_id = self.blocks_builder.write()?;
        self.root_builder
            .insert(BLOCKS_DIR, blocks_tree_id, FileMode::Tree.into())?;

        let root_id = self.root_builder.write()?;
        Ok(TreeId::new(root_id))
    }
}

/// create the initial tree with an empty blocks directory
pub fn create_initial_tree(repo: &Repository) -> StorageResult<TreeId> {
    TreeMutator::empty(repo)?.write()
}
