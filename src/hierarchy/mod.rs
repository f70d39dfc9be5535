//! Hierarchy management over the block store.

mod error;
mod manager;

pub use error::{HierarchyError, HierarchyResult};
pub use manager::{HierarchyManager, TreeConfig};
