//! Commit creation and history traversal
//!
//! commits are the atomic units of change in the store: every mutation is
//! exactly one commit, and a multi-record mutation (create with parent
//! append, cascading delete) is staged into a single tree and committed once,
//! so readers never observe it half-applied.
//!
//! this module handles commit creation and history walking

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Revwalk, Sort};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::TreeHandle;
use crate::storage::types::{BlockId, CommitId, Signature, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    signature: Signature,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: Signature::blocktree(),
            update_ref: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// update a ref (branch) to point to this commit
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> StorageResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;

        let tree = self.repo.find_tree(tree_id.raw())?;
        let sig = self.signature.to_git2_signature()?;

        // collect parent commits
        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            self.update_ref.as_deref(),
            &sig,
            &sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// get the tree snapshot at a specific commit
pub fn get_tree_at_commit(repo: &Repository, commit_id: CommitId) -> StorageResult<TreeHandle<'_>> {
    let commit = repo
        .find_commit(commit_id.raw())
        .map_err(|_| StorageError::CommitNotFound(commit_id.to_string()))?;

    let tree = commit.tree()?;
    Ok(TreeHandle::new(tree))
}

/// create the initial commit for a new store
pub fn create_initial_commit(repo: &Repository, signature: &Signature) -> StorageResult<CommitId> {
    let tree_id = crate::storage::tree::create_initial_tree(repo)?;

    CommitBuilder::new(repo)
        .tree(tree_id)
        .message(ChangeMessage::init())
        .signature(signature.clone())
        .update_ref("HEAD")
        .commit()
}

/// iterate over commit history starting from a commit
pub struct HistoryIterator<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> HistoryIterator<'repo> {
    /// create a new history iterator
    pub fn new(repo: &'repo Repository, start: CommitId) -> StorageResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.push(start.raw())?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

        Ok(Self { repo, revwalk })
    }
}

impl<'repo> Iterator for HistoryIterator<'repo> {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => match self.repo.find_commit(oid) {
                Ok(commit) => Some(Ok(CommitInfo::from_git2(&commit))),
                Err(e) => Some(Err(StorageError::Git(e))),
            },
            Err(e) => Some(Err(StorageError::Git(e))),
        }
    }
}

/// get history for a commit
pub fn history(repo: &Repository, start: CommitId) -> StorageResult<HistoryIterator<'_>> {
    HistoryIterator::new(repo, start)
}

/// message formatting for store operations
pub struct ChangeMessage;

impl ChangeMessage {
    /// format a message for a block creation
    pub fn create(id: &BlockId) -> String {
        format!("[CREATE] blocks/{}", id)
    }

    /// format a message for a content update
    pub fn update(id: &BlockId) -> String {
        format!("[UPDATE] blocks/{}", id)
    }

    /// format a message for a delete, noting cascaded descendants
    pub fn delete(id: &BlockId, descendants: usize) -> String {
        if descendants == 0 {
            format!("[DELETE] blocks/{}", id)
        } else {
            format!("[DELETE] blocks/{} (+{} descendants)", id, descendants)
        }
    }

    /// format the initial commit message
    pub fn init() -> String {
        "[blocktree] Initialize store".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tree::create_initial_tree;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_initial_commit() {
        let (_dir, repo) = setup_repo();
        let sig = Signature::blocktree();

        let commit_id = create_initial_commit(&repo, &sig).unwrap();
        let info = get_commit(&repo, commit_id).unwrap();

        assert!(info.message.contains("Initialize"));
        assert!(info.parent_ids.is_empty()); // initial commit has no parents
    }

    #[test]
    fn test_commit_builder() {
        let (_dir, repo) = setup_repo();
        let sig = Signature::blocktree();

        let initial = create_initial_commit(&repo, &sig).unwrap();

        let tree_id = create_initial_tree(&repo).unwrap();
        let second = CommitBuilder::new(&repo)
            .tree(tree_id)
            .parent(initial)
            .message("Second commit")
            .commit()
            .unwrap();

        let info = get_commit(&repo, second).unwrap();
        assert_eq!(info.parent_ids.len(), 1);
        assert_eq!(info.parent_ids[0], initial);
        assert_eq!(info.summary(), "Second commit");
    }

    #[test]
    fn test_history_iteration() {
        let (_dir, repo) = setup_repo();
        let sig = Signature::blocktree();

        let c1 = create_initial_commit(&repo, &sig).unwrap();

        let tree_id = create_initial_tree(&repo).unwrap();
        let c2 = CommitBuilder::new(&repo)
            .tree(tree_id)
            .parent(c1)
            .message("Second")
            .commit()
            .unwrap();

        let c3 = CommitBuilder::new(&repo)
            .tree(tree_id)
            .parent(c2)
            .message("Third")
            .commit()
            .unwrap();

        let commits: Vec<_> = history(&repo, c3)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].id, c3);
        assert_eq!(commits[1].id, c2);
        assert_eq!(commits[2].id, c1);
    }

    #[test]
    fn test_change_messages() {
        let id = BlockId::new("abc123").unwrap();
        assert_eq!(ChangeMessage::create(&id), "[CREATE] blocks/abc123");
        assert_eq!(ChangeMessage::delete(&id, 0), "[DELETE] blocks/abc123");
        assert_eq!(
            ChangeMessage::delete(&id, 3),
            "[DELETE] blocks/abc123 (+3 descendants)"
        );
    }
}
