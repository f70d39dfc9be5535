//! Payload shape validation.
//!
//! Only shape is checked here: the default-language title rule and parent id
//! well-formedness. Whether a referenced parent actually exists is referential
//! validation and belongs to the hierarchy manager.

use thiserror::Error;

use crate::block::model::Language;
use crate::block::payload::{CreateBlock, UpdateBlock};
use crate::storage::{BlockId, InvalidIdError};

/// validation failures; none of these leave any state behind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// the default-language title was not supplied
    #[error("title in the default language ({0}) is required")]
    MissingDefaultTitle(Language),

    /// the default-language title was supplied but blank
    #[error("title in the default language ({0}) cannot be empty")]
    EmptyDefaultTitle(Language),

    /// an update tried to null out the default-language title
    #[error("title in the default language ({0}) cannot be cleared")]
    DefaultTitleCleared(Language),

    /// the parent reference is not a well-formed block id
    #[error("malformed parent id '{id}': {source}")]
    MalformedParentId {
        id: String,
        source: InvalidIdError,
    },
}

/// result type alias for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a create payload, returning the parsed parent reference.
pub fn validate_create(payload: &CreateBlock) -> ValidationResult<Option<BlockId>> {
    match payload.title.get(Language::DEFAULT) {
        None => return Err(ValidationError::MissingDefaultTitle(Language::DEFAULT)),
        Some(title) if title.trim().is_empty() => {
            return Err(ValidationError::EmptyDefaultTitle(Language::DEFAULT))
        }
        Some(_) => {}
    }

    match &payload.parent_id {
        None => Ok(None),
        Some(raw) => BlockId::new(raw.clone())
            .map(Some)
            .map_err(|source| ValidationError::MalformedParentId {
                id: raw.clone(),
                source,
            }),
    }
}

/// Validate an update payload.
///
/// The default-language title may be replaced but never cleared or blanked;
/// every other slot may be set or nulled freely.
pub fn validate_update(payload: &UpdateBlock) -> ValidationResult<()> {
    match payload.title.get(Language::DEFAULT) {
        Some(None) => Err(ValidationError::DefaultTitleCleared(Language::DEFAULT)),
        Some(Some(title)) if title.trim().is_empty() => {
            Err(ValidationError::EmptyDefaultTitle(Language::DEFAULT))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::model::LocalizedText;

    #[test]
    fn test_create_requires_default_title() {
        let payload = CreateBlock::default();
        assert_eq!(
            validate_create(&payload),
            Err(ValidationError::MissingDefaultTitle(Language::Ru))
        );

        let payload = CreateBlock::new(LocalizedText::ru("   "));
        assert_eq!(
            validate_create(&payload),
            Err(ValidationError::EmptyDefaultTitle(Language::Ru))
        );

        let payload = CreateBlock::new(LocalizedText::ru("О компании"));
        assert_eq!(validate_create(&payload).unwrap(), None);
    }

    #[test]
    fn test_create_with_only_non_default_title_is_rejected() {
        let payload = CreateBlock::new(LocalizedText::default().with(Language::En, "About"));
        assert!(matches!(
            validate_create(&payload),
            Err(ValidationError::MissingDefaultTitle(_))
        ));
    }

    #[test]
    fn test_create_parses_parent_id() {
        let payload = CreateBlock::new(LocalizedText::ru("x")).with_parent("01arz3ndektsv4rrffq69g5fav");
        let parent = validate_create(&payload).unwrap();
        assert_eq!(parent.unwrap().as_str(), "01arz3ndektsv4rrffq69g5fav");

        let payload = CreateBlock::new(LocalizedText::ru("x")).with_parent("not a valid id");
        assert!(matches!(
            validate_create(&payload),
            Err(ValidationError::MalformedParentId { .. })
        ));
    }

    #[test]
    fn test_update_cannot_clear_default_title() {
        let patch = UpdateBlock::default().title(Language::Ru, None::<String>);
        assert_eq!(
            validate_update(&patch),
            Err(ValidationError::DefaultTitleCleared(Language::Ru))
        );

        let patch = UpdateBlock::default().title(Language::Ru, Some(""));
        assert_eq!(
            validate_update(&patch),
            Err(ValidationError::EmptyDefaultTitle(Language::Ru))
        );

        let patch = UpdateBlock::default().title(Language::Ru, Some("Новый"));
        assert!(validate_update(&patch).is_ok());
    }

    #[test]
    fn test_update_may_clear_optional_slots() {
        let patch = UpdateBlock::default()
            .title(Language::En, None::<String>)
            .description(Language::Ru, None::<String>);
        assert!(validate_update(&patch).is_ok());
    }
}
