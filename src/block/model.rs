//! The block entity and its multilingual fields.
//!
//! A block is a node in the content hierarchy: title and description in a
//! fixed set of languages, plus structural links to its parent and children.
//! The structural links are maintained exclusively by the hierarchy manager;
//! content fields are the only thing callers may mutate directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::BlockId;

/// Supported content languages.
///
/// A fixed enumeration rather than free-form language tags: every block
/// carries exactly these slots, with the default language mandatory and the
/// rest optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
    Ar,
}

impl Language {
    /// The default language; its title is mandatory on every block.
    pub const DEFAULT: Language = Language::Ru;

    /// All supported languages, default first.
    pub const ALL: [Language; 3] = [Language::Ru, Language::En, Language::Ar];

    /// two-letter language code
    pub fn code(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    /// parse a two-letter language code
    pub fn from_code(code: &str) -> Option<Language> {
        match code {
            "ru" => Some(Language::Ru),
            "en" => Some(Language::En),
            "ar" => Some(Language::Ar),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Text in the supported languages, each slot optional.
///
/// Whether the default-language slot may actually be empty depends on the
/// field: titles require it, descriptions don't. That rule lives in the
/// validator, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizedText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ru: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ar: Option<String>,
}

impl LocalizedText {
    /// text in the default language only
    pub fn ru(text: impl Into<String>) -> Self {
        Self {
            ru: Some(text.into()),
            ..Default::default()
        }
    }

    /// builder: set one language slot
    pub fn with(mut self, lang: Language, text: impl Into<String>) -> Self {
        self.set(lang, Some(text.into()));
        self
    }

    /// get the text for a language
    pub fn get(&self, lang: Language) -> Option<&str> {
        match lang {
            Language::Ru => self.ru.as_deref(),
            Language::En => self.en.as_deref(),
            Language::Ar => self.ar.as_deref(),
        }
    }

    /// set the text for a language
    pub fn set(&mut self, lang: Language, value: Option<String>) {
        match lang {
            Language::Ru => self.ru = value,
            Language::En => self.en = value,
            Language::Ar => self.ar = value,
        }
    }

    /// true if no language has any text
    pub fn is_empty(&self) -> bool {
        self.ru.is_none() && self.en.is_none() && self.ar.is_none()
    }
}

/// A persisted content block.
///
/// `children_ids` must always equal exactly the set of blocks whose
/// `parent_id` is this block's id; only the hierarchy manager touches it.
/// `version` / timestamps follow the record metadata convention of the
/// storage layer (optimistic versioning, RFC 3339 timestamps in JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BlockId>,
    #[serde(default)]
    pub children_ids: Vec<BlockId>,
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Block {
    /// creates a new block with no children, version 1 and current time
    pub fn new(
        id: BlockId,
        parent_id: Option<BlockId>,
        title: LocalizedText,
        description: LocalizedText,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            parent_id,
            children_ids: Vec::new(),
            title,
            description,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// true if this block has no parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// check if an id is listed among this block's children
    pub fn has_child(&self, id: &BlockId) -> bool {
        self.children_ids.contains(id)
    }

    /// bump version and update timestamp after a mutation
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Append a child id, keeping the list duplicate-free.
    ///
    /// Called by the hierarchy manager when a child is created.
    pub fn attach_child(&mut self, id: BlockId) {
        if !self.children_ids.contains(&id) {
            self.children_ids.push(id);
            self.touch();
        }
    }

    /// Remove a child id if present, returning whether anything changed.
    ///
    /// Tolerates an already-absent id so a retried detach stays idempotent.
    pub fn detach_child(&mut self, id: &BlockId) -> bool {
        let before = self.children_ids.len();
        self.children_ids.retain(|c| c != id);
        let changed = self.children_ids.len() != before;
        if changed {
            self.touch();
        }
        changed
    }
}

/// A block materialized together with its recursively fetched children.
///
/// The structural columns (`parent_id`, `children_ids`, record metadata) are
/// dropped; nesting itself carries the structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockNode {
    pub id: BlockId,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    /// build a node from a block and its already-materialized children
    pub fn new(block: &Block, children: Vec<BlockNode>) -> Self {
        Self {
            id: block.id.clone(),
            title: block.title.clone(),
            description: block.description.clone(),
            children,
        }
    }

    /// total number of blocks in this node's subtree, itself included
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(BlockNode::subtree_len).sum::<usize>()
    }
}
