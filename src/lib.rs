//! blocktree - a Git-backed hierarchical content block store
//!
//! This crate manages a forest of multilingual content blocks on top of a Git
//! object database. Every block is a JSON record, every mutation is a commit,
//! and the entire edit history is preserved in `.git/`.
//!
//! # Example
//!
//! ```no_run
//! use blocktree::block::{CreateBlock, LocalizedText};
//! use blocktree::hierarchy::HierarchyManager;
//!
//! let manager = HierarchyManager::open("./content").unwrap();
//! let root = manager
//!     .create(CreateBlock::new(LocalizedText::ru("О компании")))
//!     .unwrap();
//! let child = manager
//!     .create(CreateBlock::new(LocalizedText::ru("Команда")).with_parent(root.id.as_str()))
//!     .unwrap();
//! let forest = manager.fetch_tree(None).unwrap();
//! ```

pub mod block;
pub mod hierarchy;
pub mod storage;
