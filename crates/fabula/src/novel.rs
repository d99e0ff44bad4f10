//! Chapter and character records produced by extraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One detected chapter with its model-produced analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 1-based chapter number in document order.
    pub index: usize,
    /// Title from the analysis, or a generated fallback.
    pub title: String,
    /// Byte offset of the chapter start in the document text.
    pub start: usize,
    /// Byte offset one past the chapter end.
    pub end: usize,
    /// Two-to-three sentence summary.
    #[serde(default)]
    pub summary: String,
    /// Thematic keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Character names mentioned in this chapter.
    #[serde(default)]
    pub characters_mentioned: Vec<String>,
    /// Main plot events.
    #[serde(default)]
    pub key_events: Vec<String>,
    /// Dominant emotional tone.
    #[serde(default)]
    pub emotional_tone: String,
    /// Where the chapter takes place.
    #[serde(default)]
    pub setting: String,
}

impl Chapter {
    /// A placeholder record for a chapter whose analysis failed.
    #[must_use]
    pub fn fallback(index: usize, start: usize, end: usize) -> Self {
        Self {
            index,
            title: format!("Chapter {index}"),
            start,
            end,
            summary: String::new(),
            keywords: Vec::new(),
            characters_mentioned: Vec::new(),
            key_events: Vec::new(),
            emotional_tone: String::new(),
            setting: String::new(),
        }
    }
}

/// One extracted character. Names are unique per novel, compared
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Canonical name as first seen.
    pub name: String,
    /// Personality traits, order-preserving and deduped.
    #[serde(default)]
    pub traits: Vec<String>,
    /// Background (occupation, origin).
    #[serde(default)]
    pub background: String,
    /// Role in the story (protagonist, antagonist, supporting).
    #[serde(default)]
    pub role: String,
    /// Relations to other characters, keyed by the other name.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    /// Appearance and notable features.
    #[serde(default)]
    pub description: String,
    /// Passages where the character is mentioned, capped during extraction.
    #[serde(default)]
    pub contexts: Vec<String>,
    /// 1-based index of the first chapter the character appears in.
    #[serde(default)]
    pub first_appearance: Option<usize>,
    /// 1-based chapter indices the character appears in, ascending.
    #[serde(default)]
    pub appearances: Vec<usize>,
}

impl Character {
    /// Create an empty character record for `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traits: Vec::new(),
            background: String::new(),
            role: String::new(),
            relationships: BTreeMap::new(),
            description: String::new(),
            contexts: Vec::new(),
            first_appearance: None,
            appearances: Vec::new(),
        }
    }

    /// Fold `update` into this record.
    ///
    /// Traits are unioned preserving first-seen order; background, role and
    /// description take the most recent non-empty value; relationships merge
    /// key-wise with the update winning; appearances accumulate and
    /// `first_appearance` stays the minimum. The canonical name is kept.
    pub fn merge(&mut self, update: Character) {
        for t in update.traits {
            if !self
                .traits
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(&t))
            {
                self.traits.push(t);
            }
        }
        if !update.background.is_empty() {
            self.background = update.background;
        }
        if !update.role.is_empty() {
            self.role = update.role;
        }
        if !update.description.is_empty() {
            self.description = update.description;
        }
        self.relationships.extend(update.relationships);
        for ctx in update.contexts {
            if !self.contexts.contains(&ctx) {
                self.contexts.push(ctx);
            }
        }
        for appearance in update.appearances {
            if !self.appearances.contains(&appearance) {
                self.appearances.push(appearance);
            }
        }
        self.appearances.sort_unstable();
        self.first_appearance = match (self.first_appearance, update.first_appearance) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}
