//! Block data model, input payloads, and shape validation.

mod model;
mod payload;
pub mod validate;

pub use model::{Block, BlockNode, Language, LocalizedText};
pub use payload::{CreateBlock, LocalizedPatch, UpdateBlock};
pub use validate::{ValidationError, ValidationResult};
