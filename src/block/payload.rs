//! Input payloads for block creation and update.
//!
//! `UpdateBlock` distinguishes "field absent" from "field explicitly null":
//! absent fields are left untouched, null clears an optional slot, a value
//! replaces it. This is the partial-update contract; a full-replace update
//! does not exist.

use serde::{Deserialize, Deserializer, Serialize};

use crate::block::model::{Language, LocalizedText};

/// Payload for creating a block.
///
/// `parent_id` stays a raw string here; well-formedness is the validator's
/// job and existence is the hierarchy manager's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateBlock {
    pub title: LocalizedText,
    pub description: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl CreateBlock {
    /// create a payload with the given title
    pub fn new(title: LocalizedText) -> Self {
        Self {
            title,
            ..Default::default()
        }
    }

    /// builder: set the description
    pub fn with_description(mut self, description: LocalizedText) -> Self {
        self.description = description;
        self
    }

    /// builder: attach under a parent
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Payload for a partial content update.
///
/// Only `title`/`description` slots appear here: `parent_id` and
/// `children_ids` are never mutable through update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBlock {
    pub title: LocalizedPatch,
    pub description: LocalizedPatch,
}

impl UpdateBlock {
    /// builder: set or clear a title slot
    pub fn title(mut self, lang: Language, value: Option<impl Into<String>>) -> Self {
        self.title.set(lang, value.map(Into::into));
        self
    }

    /// builder: set or clear a description slot
    pub fn description(mut self, lang: Language, value: Option<impl Into<String>>) -> Self {
        self.description.set(lang, value.map(Into::into));
        self
    }

    /// true if no field is being changed
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty()
    }

    /// apply the supplied fields to a block's content, leaving absent ones alone
    pub fn apply_to(&self, title: &mut LocalizedText, description: &mut LocalizedText) {
        self.title.apply_to(title);
        self.description.apply_to(description);
    }
}

/// Per-language patch: outer `None` = untouched, `Some(None)` = clear,
/// `Some(Some(text))` = replace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocalizedPatch {
    #[serde(deserialize_with = "double_option")]
    pub ru: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub en: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub ar: Option<Option<String>>,
}

/// Wraps a present-but-possibly-null field in `Some`, so a missing field
/// (via `#[serde(default)]`) deserializes to `None` and an explicit null to
/// `Some(None)`.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl LocalizedPatch {
    /// patch slot for a language
    pub fn get(&self, lang: Language) -> Option<&Option<String>> {
        match lang {
            Language::Ru => self.ru.as_ref(),
            Language::En => self.en.as_ref(),
            Language::Ar => self.ar.as_ref(),
        }
    }

    /// set the patch slot for a language
    pub fn set(&mut self, lang: Language, value: Option<String>) {
        match lang {
            Language::Ru => self.ru = Some(value),
            Language::En => self.en = Some(value),
            Language::Ar => self.ar = Some(value),
        }
    }

    /// true if no slot is supplied
    pub fn is_empty(&self) -> bool {
        self.ru.is_none() && self.en.is_none() && self.ar.is_none()
    }

    /// apply supplied slots to the target text
    pub fn apply_to(&self, target: &mut LocalizedText) {
        for lang in Language::ALL {
            if let Some(value) = self.get(lang) {
                target.set(lang, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_field_is_untouched() {
        let patch: UpdateBlock = serde_json::from_str(r#"{"title":{"en":"X"}}"#).unwrap();

        let mut title = LocalizedText::ru("А").with(Language::En, "old");
        let mut description = LocalizedText::ru("описание");
        patch.apply_to(&mut title, &mut description);

        assert_eq!(title.get(Language::Ru), Some("А")); // absent → untouched
        assert_eq!(title.get(Language::En), Some("X"));
        assert_eq!(description.get(Language::Ru), Some("описание"));
    }

    #[test]
    fn test_explicit_null_clears_slot() {
        let patch: UpdateBlock = serde_json::from_str(r#"{"title":{"en":null}}"#).unwrap();
        assert_eq!(patch.title.en, Some(None));

        let mut title = LocalizedText::ru("А").with(Language::En, "old");
        let mut description = LocalizedText::default();
        patch.apply_to(&mut title, &mut description);

        assert_eq!(title.get(Language::En), None);
        assert_eq!(title.get(Language::Ru), Some("А"));
    }

    #[test]
    fn test_empty_patch() {
        let patch: UpdateBlock = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());

        let patch = UpdateBlock::default().title(Language::Ru, Some("x"));
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_builder_round_trip() {
        let patch = UpdateBlock::default()
            .title(Language::En, Some("hello"))
            .description(Language::En, None::<String>);

        assert_eq!(patch.title.get(Language::En), Some(&Some("hello".to_string())));
        assert_eq!(patch.description.get(Language::En), Some(&None));
        assert_eq!(patch.title.get(Language::Ru), None);
    }
}
