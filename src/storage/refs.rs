//! Branch and reference management.
//!
//! The store keeps its entire state on a single `main` branch. Every mutation
//! advances it by exactly one commit, and advancement is compare-and-swap so
//! a concurrent writer (another process on the same directory) surfaces as an
//! error instead of a lost update.

use git2::Repository;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::CommitId;

/// name of the single data branch
pub const MAIN_BRANCH: &str = "main";

/// full ref path of the data branch
const MAIN_REF: &str = "refs/heads/main";

/// Manages Git references (branches).
pub struct RefManager;

impl RefManager {
    /// Resolve the main branch to its current commit ID.
    pub fn resolve_main(repo: &Repository) -> StorageResult<CommitId> {
        let reference = repo
            .find_reference(MAIN_REF)
            .map_err(|_| StorageError::RefNotFound(MAIN_BRANCH.to_string()))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::RefNotFound(MAIN_BRANCH.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    /// Get the current HEAD commit (the tip of main).
    pub fn head_commit(repo: &Repository) -> StorageResult<CommitId> {
        let head = repo.head().map_err(|e| {
            if e.code() == git2::ErrorCode::UnbornBranch {
                StorageError::EmptyStore
            } else {
                StorageError::Git(e)
            }
        })?;

        let commit = head.peel_to_commit()?;
        Ok(CommitId::new(commit.id()))
    }

    /// Check if the main branch exists.
    pub fn main_exists(repo: &Repository) -> bool {
        repo.find_reference(MAIN_REF).is_ok()
    }

    /// Update main to point to a new commit.
    ///
    /// This is a force update - use `update_main_if_unchanged` for safe updates.
    pub fn update_main(repo: &Repository, target: CommitId) -> StorageResult<()> {
        let mut reference = repo
            .find_reference(MAIN_REF)
            .map_err(|_| StorageError::RefNotFound(MAIN_BRANCH.to_string()))?;

        reference.set_target(target.raw(), &format!("advance main to {}", target.short()))?;

        Ok(())
    }

    /// Update main only if it still points to the expected commit.
    ///
    /// Compare-and-swap semantics for safe concurrent updates; returns an
    /// error if another writer advanced the branch in the meantime.
    pub fn update_main_if_unchanged(
        repo: &Repository,
        expected: CommitId,
        new_target: CommitId,
    ) -> StorageResult<()> {
        let current = Self::resolve_main(repo)?;

        if current != expected {
            return Err(StorageError::ConcurrentModification {
                branch: MAIN_BRANCH.to_string(),
            });
        }

        Self::update_main(repo, new_target)
    }

    /// Initialize the main branch if it doesn't exist.
    ///
    /// This should be called after creating the initial commit.
    /// Also ensures HEAD points to main.
    pub fn init_main_branch(repo: &Repository, initial_commit: CommitId) -> StorageResult<()> {
        if !Self::main_exists(repo) {
            let commit = repo.find_commit(initial_commit.raw())?;
            repo.branch(MAIN_BRANCH, &commit, false)?;
        }

        // Ensure HEAD points to main branch
        repo.set_head(MAIN_REF)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tree::create_initial_tree;
    use tempfile::TempDir;

    fn setup_repo_with_commit() -> (TempDir, Repository, CommitId) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let commit_id = {
            let tree_id = create_initial_tree(&repo).unwrap();
            let tree = repo.find_tree(tree_id.raw()).unwrap();
            let sig = git2::Signature::now("Test", "test@test.com").unwrap();

            let commit_oid = repo
                .commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
                .unwrap();

            CommitId::new(commit_oid)
        };

        let _ = RefManager::init_main_branch(&repo, commit_id);

        (dir, repo, commit_id)
    }

    fn make_commit(repo: &Repository, parent: CommitId, message: &str) -> CommitId {
        let tree_id = create_initial_tree(repo).unwrap();
        let tree = repo.find_tree(tree_id.raw()).unwrap();
        let sig = git2::Signature::now("Test", "test@test.com").unwrap();
        let parent_commit = repo.find_commit(parent.raw()).unwrap();
        let oid = repo
            .commit(None, &sig, &sig, message, &tree, &[&parent_commit])
            .unwrap();
        CommitId::new(oid)
    }

    #[test]
    fn test_head_commit() {
        let (_dir, repo, expected) = setup_repo_with_commit();
        let head = RefManager::head_commit(&repo).unwrap();
        assert_eq!(head, expected);
    }

    #[test]
    fn test_resolve_main() {
        let (_dir, repo, expected) = setup_repo_with_commit();
        assert!(RefManager::main_exists(&repo));
        let resolved = RefManager::resolve_main(&repo).unwrap();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_update_main() {
        let (_dir, repo, commit1) = setup_repo_with_commit();
        let commit2 = make_commit(&repo, commit1, "Second commit");

        RefManager::update_main(&repo, commit2).unwrap();
        assert_eq!(RefManager::resolve_main(&repo).unwrap(), commit2);
    }

    #[test]
    fn test_update_main_if_unchanged() {
        let (_dir, repo, commit1) = setup_repo_with_commit();
        let commit2 = make_commit(&repo, commit1, "Second commit");

        // Update should succeed
        RefManager::update_main_if_unchanged(&repo, commit1, commit2).unwrap();

        // Update with stale expected should fail
        let result = RefManager::update_main_if_unchanged(&repo, commit1, commit2);
        assert!(matches!(
            result,
            Err(StorageError::ConcurrentModification { .. })
        ));
    }
}
