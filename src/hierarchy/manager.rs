//! The hierarchy manager.
//!
//! `HierarchyManager` is the only component allowed to touch the structural
//! links (`parent_id`, `children_ids`): it keeps them bidirectionally
//! consistent on create and delete, cascades deletes through whole subtrees,
//! and materializes nested trees for reading. Every structural mutation is
//! staged through one store transaction, so the two sides of a link can never
//! disagree on disk.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::block::{validate, Block, BlockNode, CreateBlock, UpdateBlock};
use crate::hierarchy::error::{HierarchyError, HierarchyResult};
use crate::storage::{BlockId, BlockStore, ChangeMessage, CommitInfo, Signature};

/// Configuration for opening a block tree.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// path to the store directory
    pub path: PathBuf,
    /// initialize the store if the directory is not one yet
    pub create_if_missing: bool,
    /// signature recorded on every mutation
    pub signature: Signature,
    /// print each operation to stderr
    pub verbose: bool,
}

impl TreeConfig {
    /// default configuration for a path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            create_if_missing: true,
            signature: Signature::blocktree(),
            verbose: false,
        }
    }

    /// builder: set whether to initialize a missing store
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// builder: set the mutation signature
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// builder: enable operation logging
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Manages a forest of content blocks on top of a [`BlockStore`].
#[derive(Clone)]
pub struct HierarchyManager {
    store: BlockStore,
    verbose: bool,
}

impl HierarchyManager {
    /// Open (or initialize) the block tree at a path with default config.
    pub fn open(path: impl AsRef<Path>) -> HierarchyResult<Self> {
        Self::open_with(TreeConfig::new(path))
    }

    /// Open the block tree described by a config.
    pub fn open_with(config: TreeConfig) -> HierarchyResult<Self> {
        let store = if config.create_if_missing {
            BlockStore::open_or_init(&config.path)?
        } else {
            BlockStore::open(&config.path)?
        };

        Ok(Self {
            store: store.with_signature(config.signature),
            verbose: config.verbose,
        })
    }

    /// Create a throwaway manager in a temporary directory (for testing).
    pub fn in_memory() -> HierarchyResult<(tempfile::TempDir, Self)> {
        let (dir, store) = BlockStore::in_memory()?;
        Ok((
            dir,
            Self {
                store,
                verbose: false,
            },
        ))
    }

    /// Access the underlying store.
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    fn log(&self, message: &str) {
        if self.verbose {
            eprintln!("[blocktree] {}", message);
        }
    }

    // ==================== Operations ====================

    /// Create a block, optionally attached under a parent.
    ///
    /// Validates the payload first (nothing persisted on failure), resolves
    /// the parent (`ParentNotFound` if it doesn't exist), then persists the
    /// new block together with the parent's updated child list in one commit.
    pub fn create(&self, payload: CreateBlock) -> HierarchyResult<Block> {
        let parent_id = validate::validate_create(&payload)?;
        let id = self.store.allocate_id();

        let block = self.store.transact(|tx| {
            let parent = match &parent_id {
                Some(pid) => Some(
                    tx.get(pid)?
                        .ok_or_else(|| HierarchyError::ParentNotFound(pid.clone()))?,
                ),
                None => None,
            };

            let block = Block::new(
                id.clone(),
                parent_id.clone(),
                payload.title.clone(),
                payload.description.clone(),
            );

            tx.set_message(ChangeMessage::create(&block.id));
            if let Some(mut parent) = parent {
                parent.attach_child(block.id.clone());
                tx.put(parent);
            }
            tx.put(block.clone());
            Ok::<_, HierarchyError>(block)
        })?;

        self.log(&format!("created block {}", block.id));
        Ok(block)
    }

    /// Fetch a single block. No subtree expansion.
    pub fn get(&self, id: &BlockId) -> HierarchyResult<Block> {
        self.store
            .get(id)?
            .ok_or_else(|| HierarchyError::NotFound(id.clone()))
    }

    /// Apply a partial content update.
    ///
    /// Absent fields stay untouched; `parent_id` and `children_ids` are not
    /// reachable through this operation.
    pub fn update(&self, id: &BlockId, patch: UpdateBlock) -> HierarchyResult<Block> {
        validate::validate_update(&patch)?;

        let block = self.store.transact(|tx| {
            let mut block = tx
                .get(id)?
                .ok_or_else(|| HierarchyError::NotFound(id.clone()))?;

            if patch.is_empty() {
                return Ok::<_, HierarchyError>(block);
            }

            patch.apply_to(&mut block.title, &mut block.description);
            block.touch();

            tx.set_message(ChangeMessage::update(id));
            tx.put(block.clone());
            Ok(block)
        })?;

        self.log(&format!("updated block {}", id));
        Ok(block)
    }

    /// Delete a block and its entire subtree, and detach it from its parent.
    ///
    /// The subtree is collected iteratively with a visited set; revisiting a
    /// block means the stored links are cyclic and the delete is refused with
    /// `CycleDetected` before anything is staged. The whole removal, parent
    /// detach included, is one commit.
    pub fn delete(&self, id: &BlockId) -> HierarchyResult<()> {
        self.store.transact(|tx| {
            let target = tx
                .get(id)?
                .ok_or_else(|| HierarchyError::NotFound(id.clone()))?;

            // child index from one snapshot; children_ids is not trusted here
            // so a dangling child entry cannot orphan real records
            let all = tx.list_all()?;
            let mut by_parent: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
            for block in &all {
                if let Some(parent) = &block.parent_id {
                    by_parent
                        .entry(parent.clone())
                        .or_default()
                        .push(block.id.clone());
                }
            }

            let mut visited: HashSet<BlockId> = HashSet::new();
            let mut stack = vec![id.clone()];
            let mut doomed: Vec<BlockId> = Vec::new();
            while let Some(current) = stack.pop() {
                if !visited.insert(current.clone()) {
                    return Err(HierarchyError::CycleDetected(current));
                }
                if let Some(children) = by_parent.get(&current) {
                    stack.extend(children.iter().cloned());
                }
                doomed.push(current);
            }

            // detach from the parent; tolerate a parent that already lost
            // the back-reference
            if let Some(parent_id) = &target.parent_id {
                if let Some(mut parent) = tx.get(parent_id)? {
                    if parent.detach_child(id) {
                        tx.put(parent);
                    }
                }
            }

            tx.set_message(ChangeMessage::delete(id, doomed.len() - 1));
            for victim in doomed {
                tx.delete(victim);
            }
            Ok::<_, HierarchyError>(())
        })?;

        self.log(&format!("deleted block {} (cascading)", id));
        Ok(())
    }

    /// Materialize a nested tree.
    ///
    /// `parent: None` returns every root block with its full subtree;
    /// `Some(id)` returns the subtrees of that block's direct children, an
    /// empty sequence when the block is absent or childless. Traversal is
    /// iterative with a visited set, so cyclic links surface as
    /// `CycleDetected` instead of hanging.
    pub fn fetch_tree(&self, parent: Option<&BlockId>) -> HierarchyResult<Vec<BlockNode>> {
        let all = self.store.list_all()?;

        let mut by_parent: HashMap<&BlockId, Vec<&Block>> = HashMap::new();
        for block in &all {
            if let Some(parent) = &block.parent_id {
                by_parent.entry(parent).or_default().push(block);
            }
        }

        let top: Vec<&Block> = match parent {
            Some(id) => by_parent.get(id).cloned().unwrap_or_default(),
            None => all.iter().filter(|b| b.is_root()).collect(),
        };

        // breadth-first walk with a cycle guard
        let mut visited: HashSet<&BlockId> = HashSet::new();
        let mut order: Vec<&Block> = Vec::new();
        let mut queue: VecDeque<&Block> = top.iter().copied().collect();
        while let Some(block) = queue.pop_front() {
            if !visited.insert(&block.id) {
                return Err(HierarchyError::CycleDetected(block.id.clone()));
            }
            if let Some(children) = by_parent.get(&block.id) {
                queue.extend(children.iter().copied());
            }
            order.push(block);
        }

        // a full-forest fetch must account for every block; anything left
        // unvisited hangs off a cycle unreachable from any root
        if parent.is_none() && visited.len() != all.len() {
            if let Some(stray) = all.iter().find(|b| !visited.contains(&b.id)) {
                return Err(HierarchyError::CycleDetected(stray.id.clone()));
            }
        }

        // assemble bottom-up: walking the order in reverse guarantees every
        // block's children are built before the block itself
        let top_ids: HashSet<&BlockId> = top.iter().map(|b| &b.id).collect();
        let mut subtrees: HashMap<&BlockId, Vec<BlockNode>> = HashMap::new();
        let mut result: Vec<BlockNode> = Vec::new();
        for block in order.iter().rev() {
            let children = subtrees.remove(&block.id).unwrap_or_default();
            let node = BlockNode::new(block, children);
            if top_ids.contains(&block.id) {
                result.push(node);
            } else if let Some(parent) = &block.parent_id {
                // reverse walk sees later siblings first; prepend to keep
                // insertion order
                subtrees.entry(parent).or_default().insert(0, node);
            }
        }
        result.reverse();

        Ok(result)
    }

    // ==================== Conveniences ====================

    /// All root blocks, in insertion order.
    pub fn roots(&self) -> HierarchyResult<Vec<Block>> {
        Ok(self.store.list_by_parent(None)?)
    }

    /// Direct children of a block, in insertion order.
    pub fn children(&self, id: &BlockId) -> HierarchyResult<Vec<Block>> {
        if self.store.get(id)?.is_none() {
            return Err(HierarchyError::NotFound(id.clone()));
        }
        Ok(self.store.list_by_parent(Some(id))?)
    }

    /// Mutation history, most recent first.
    pub fn history(&self, limit: Option<usize>) -> HierarchyResult<Vec<CommitInfo>> {
        Ok(self.store.history(limit)?)
    }

    /// Total number of blocks.
    pub fn len(&self) -> HierarchyResult<usize> {
        Ok(self.store.len()?)
    }

    /// True if no blocks exist.
    pub fn is_empty(&self) -> HierarchyResult<bool> {
        Ok(self.store.is_empty()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Language, LocalizedText, ValidationError};
    use crate::storage::StorageError;
    use tempfile::TempDir;

    fn setup() -> (TempDir, HierarchyManager) {
        HierarchyManager::in_memory().unwrap()
    }

    fn create(manager: &HierarchyManager, title: &str, parent: Option<&BlockId>) -> Block {
        let mut payload = CreateBlock::new(LocalizedText::ru(title));
        if let Some(parent) = parent {
            payload = payload.with_parent(parent.as_str());
        }
        manager.create(payload).unwrap()
    }

    #[test]
    fn test_create_root() {
        let (_dir, manager) = setup();

        let block = create(&manager, "Главная", None);
        assert!(block.is_root());
        assert!(block.children_ids.is_empty());
        assert_eq!(block.version, 1);

        let fetched = manager.get(&block.id).unwrap();
        assert_eq!(fetched, block);
    }

    #[test]
    fn test_create_child_keeps_links_bidirectional() {
        let (_dir, manager) = setup();

        let root = create(&manager, "root", None);
        let child = create(&manager, "child", Some(&root.id));

        assert_eq!(child.parent_id.as_ref(), Some(&root.id));

        let root = manager.get(&root.id).unwrap();
        assert!(root.has_child(&child.id));
        assert_eq!(root.version, 2); // child attach counts as a mutation
    }

    #[test]
    fn test_create_with_missing_parent_leaves_store_unchanged() {
        let (_dir, manager) = setup();
        create(&manager, "existing", None);

        let head_before = manager.store().head().unwrap();
        let ghost = BlockId::generate();

        let payload = CreateBlock::new(LocalizedText::ru("x")).with_parent(ghost.as_str());
        let result = manager.create(payload);

        assert!(matches!(result, Err(HierarchyError::ParentNotFound(id)) if id == ghost));
        assert_eq!(manager.len().unwrap(), 1);
        assert_eq!(manager.store().head().unwrap(), head_before);
    }

    #[test]
    fn test_create_without_default_title_persists_nothing() {
        let (_dir, manager) = setup();

        let payload = CreateBlock::new(LocalizedText::default().with(Language::En, "About"));
        let result = manager.create(payload);

        assert!(matches!(
            result,
            Err(HierarchyError::Validation(
                ValidationError::MissingDefaultTitle(_)
            ))
        ));
        assert!(manager.is_empty().unwrap());
    }

    #[test]
    fn test_create_with_malformed_parent_id() {
        let (_dir, manager) = setup();

        let payload = CreateBlock::new(LocalizedText::ru("x")).with_parent("no spaces allowed");
        let result = manager.create(payload);

        assert!(matches!(
            result,
            Err(HierarchyError::Validation(
                ValidationError::MalformedParentId { .. }
            ))
        ));
    }

    #[test]
    fn test_update_partial_preserves_untouched_fields() {
        let (_dir, manager) = setup();

        let block = manager
            .create(
                CreateBlock::new(LocalizedText::ru("О нас").with(Language::En, "About"))
                    .with_description(LocalizedText::ru("описание")),
            )
            .unwrap();

        let patch = UpdateBlock::default().title(Language::En, Some("About us"));
        let updated = manager.update(&block.id, patch).unwrap();

        assert_eq!(updated.title.get(Language::En), Some("About us"));
        assert_eq!(updated.title.get(Language::Ru), Some("О нас"));
        assert_eq!(updated.description.get(Language::Ru), Some("описание"));
        assert_eq!(updated.version, 2);
    }

    #[test]
    fn test_update_cannot_clear_default_title() {
        let (_dir, manager) = setup();
        let block = create(&manager, "заголовок", None);

        let patch = UpdateBlock::default().title(Language::Ru, None::<String>);
        let result = manager.update(&block.id, patch);
        assert!(matches!(result, Err(HierarchyError::Validation(_))));

        // other languages may be cleared freely
        let patch = UpdateBlock::default().title(Language::En, None::<String>);
        manager.update(&block.id, patch).unwrap();
    }

    #[test]
    fn test_update_missing_block() {
        let (_dir, manager) = setup();

        let patch = UpdateBlock::default().title(Language::Ru, Some("x"));
        let result = manager.update(&BlockId::generate(), patch);
        assert!(matches!(result, Err(HierarchyError::NotFound(_))));
    }

    #[test]
    fn test_update_never_touches_structure() {
        let (_dir, manager) = setup();

        let root = create(&manager, "root", None);
        let child = create(&manager, "child", Some(&root.id));

        let patch = UpdateBlock::default().title(Language::Ru, Some("новый"));
        let updated = manager.update(&child.id, patch).unwrap();

        assert_eq!(updated.parent_id.as_ref(), Some(&root.id));
        assert!(manager.get(&root.id).unwrap().has_child(&child.id));
    }

    #[test]
    fn test_delete_leaf_detaches_from_parent() {
        let (_dir, manager) = setup();

        let root = create(&manager, "root", None);
        let child = create(&manager, "child", Some(&root.id));

        manager.delete(&child.id).unwrap();

        assert!(matches!(
            manager.get(&child.id),
            Err(HierarchyError::NotFound(_))
        ));
        let root = manager.get(&root.id).unwrap();
        assert!(!root.has_child(&child.id));
    }

    #[test]
    fn test_delete_cascades_through_subtree_in_one_commit() {
        let (_dir, manager) = setup();

        let root = create(&manager, "root", None);
        let mid = create(&manager, "mid", Some(&root.id));
        let leaf_a = create(&manager, "leaf a", Some(&mid.id));
        let leaf_b = create(&manager, "leaf b", Some(&mid.id));
        let sibling = create(&manager, "sibling", Some(&root.id));

        let head_before = manager.store().head().unwrap();
        manager.delete(&mid.id).unwrap();

        // whole subtree gone, sibling untouched
        for gone in [&mid.id, &leaf_a.id, &leaf_b.id] {
            assert!(matches!(manager.get(gone), Err(HierarchyError::NotFound(_))));
        }
        assert!(manager.get(&sibling.id).is_ok());

        let root = manager.get(&root.id).unwrap();
        assert!(!root.has_child(&mid.id));
        assert!(root.has_child(&sibling.id));

        // exactly one commit for the whole cascade
        let history = manager.history(Some(1)).unwrap();
        assert_eq!(history[0].first_parent(), Some(head_before));
        assert!(history[0].summary().contains("+2 descendants"));
    }

    #[test]
    fn test_delete_missing_block() {
        let (_dir, manager) = setup();
        let result = manager.delete(&BlockId::generate());
        assert!(matches!(result, Err(HierarchyError::NotFound(_))));
    }

    #[test]
    fn test_fetch_tree_three_levels() {
        let (_dir, manager) = setup();

        let root = create(&manager, "root", None);
        let mid = create(&manager, "mid", Some(&root.id));
        let leaf = create(&manager, "leaf", Some(&mid.id));
        let other_root = create(&manager, "other", None);

        let forest = manager.fetch_tree(None).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].id, root.id); // insertion order
        assert_eq!(forest[1].id, other_root.id);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].id, mid.id);
        assert_eq!(forest[0].children[0].children[0].id, leaf.id);
        assert_eq!(forest[0].subtree_len(), 3);

        // Some(id) yields the subtrees of that block's direct children
        let children = manager.fetch_tree(Some(&root.id)).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, mid.id);
        assert_eq!(children[0].children[0].id, leaf.id);

        let grandchildren = manager.fetch_tree(Some(&mid.id)).unwrap();
        assert_eq!(grandchildren.len(), 1);
        assert_eq!(grandchildren[0].id, leaf.id);
        assert!(grandchildren[0].children.is_empty());
    }

    #[test]
    fn test_fetch_tree_sibling_order_is_insertion_order() {
        let (_dir, manager) = setup();

        let root = create(&manager, "root", None);
        let first = create(&manager, "первый", Some(&root.id));
        let second = create(&manager, "второй", Some(&root.id));
        let third = create(&manager, "третий", Some(&root.id));

        let children = manager.fetch_tree(Some(&root.id)).unwrap();
        let ids: Vec<&BlockId> = children.iter().map(|n| &n.id).collect();
        assert_eq!(ids, vec![&first.id, &second.id, &third.id]);
    }

    #[test]
    fn test_fetch_tree_missing_or_childless_parent_is_empty() {
        let (_dir, manager) = setup();
        let leaf = create(&manager, "leaf", None);

        // childless block: empty sequence, not an error
        assert!(manager.fetch_tree(Some(&leaf.id)).unwrap().is_empty());

        // nonexistent block: also empty, matching the no-children reading
        assert!(manager
            .fetch_tree(Some(&BlockId::generate()))
            .unwrap()
            .is_empty());
    }

    /// write two blocks whose parent links form a loop, bypassing the manager
    fn corrupt_with_cycle(manager: &HierarchyManager) -> (BlockId, BlockId) {
        let a_id = BlockId::generate();
        let b_id = BlockId::generate();

        let mut a = Block::new(
            a_id.clone(),
            Some(b_id.clone()),
            LocalizedText::ru("a"),
            LocalizedText::default(),
        );
        a.children_ids = vec![b_id.clone()];
        let mut b = Block::new(
            b_id.clone(),
            Some(a_id.clone()),
            LocalizedText::ru("b"),
            LocalizedText::default(),
        );
        b.children_ids = vec![a_id.clone()];

        manager
            .store()
            .transact::<(), StorageError, _>(|tx| {
                tx.put(a);
                tx.put(b);
                tx.set_message("corrupt: cyclic links");
                Ok(())
            })
            .unwrap();

        (a_id, b_id)
    }

    #[test]
    fn test_fetch_tree_detects_cycle() {
        let (_dir, manager) = setup();
        create(&manager, "healthy root", None);
        let (a_id, _) = corrupt_with_cycle(&manager);

        // reachable cycle
        let result = manager.fetch_tree(Some(&a_id));
        assert!(matches!(result, Err(HierarchyError::CycleDetected(_))));

        // full-forest fetch also refuses: the cyclic pair is unreachable
        // from any root but must still be accounted for
        let result = manager.fetch_tree(None);
        assert!(matches!(result, Err(HierarchyError::CycleDetected(_))));
    }

    #[test]
    fn test_delete_detects_cycle_without_deleting_anything() {
        let (_dir, manager) = setup();
        let (a_id, b_id) = corrupt_with_cycle(&manager);

        let result = manager.delete(&a_id);
        assert!(matches!(result, Err(HierarchyError::CycleDetected(_))));

        // refused atomically: both records still present
        assert!(manager.store().contains(&a_id).unwrap());
        assert!(manager.store().contains(&b_id).unwrap());
    }

    #[test]
    fn test_full_scenario() {
        let (dir, manager) = setup();

        // build a small site structure
        let about = manager
            .create(
                CreateBlock::new(LocalizedText::ru("О компании").with(Language::En, "About"))
                    .with_description(LocalizedText::ru("раздел о компании")),
            )
            .unwrap();
        let team = create(&manager, "Команда", Some(&about.id));
        let history = create(&manager, "История", Some(&about.id));
        let _founders = create(&manager, "Основатели", Some(&team.id));

        assert_eq!(manager.len().unwrap(), 4);

        // reopen from disk and verify everything survived
        drop(manager);
        let manager = HierarchyManager::open(dir.path()).unwrap();

        let forest = manager.fetch_tree(None).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].subtree_len(), 4);

        // delete a mid-level block and check the shape
        manager.delete(&team.id).unwrap();
        let forest = manager.fetch_tree(None).unwrap();
        assert_eq!(forest[0].subtree_len(), 2);
        assert_eq!(forest[0].children[0].id, history.id);
    }
}
