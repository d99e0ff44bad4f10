//! Schemas for model-produced JSON.
//!
//! Required fields have no `#[serde(default)]`: a reply missing them fails
//! deserialization and goes through the corrective retry. Optional fields
//! default so a sparse-but-valid reply is accepted.

use std::collections::BTreeMap;

use fabula::{Chapter, Character, Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// One chapter's analysis as returned by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterAnalysis {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub characters_mentioned: Vec<String>,
    #[serde(default)]
    pub key_events: Vec<String>,
    #[serde(default)]
    pub emotional_tone: String,
    #[serde(default)]
    pub setting: String,
}

impl ChapterAnalysis {
    /// Attach the analysis to its detected span.
    #[must_use]
    pub fn into_chapter(self, index: usize, start: usize, end: usize) -> Chapter {
        Chapter {
            index,
            title: self.title,
            start,
            end,
            summary: self.summary,
            keywords: self.keywords,
            characters_mentioned: self.characters_mentioned,
            key_events: self.key_events,
            emotional_tone: self.emotional_tone,
            setting: self.setting,
        }
    }
}

/// The model's main-character name list.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterList {
    pub characters: Vec<String>,
}

/// One character's analysis as returned by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
}

impl CharacterSheet {
    /// Convert to a [`Character`] record, keeping `canonical_name` when the
    /// model restyled the name it was asked about.
    #[must_use]
    pub fn into_character(self, canonical_name: &str) -> Character {
        let mut character = Character::named(canonical_name);
        character.traits = self.traits;
        character.background = self.background;
        character.role = self.role;
        character.relationships = self.relationships;
        character.description = self.description;
        character
    }
}

/// Parse a model reply into `T`, tolerating a markdown code fence around
/// the JSON object but nothing else.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let body = strip_code_fence(reply.trim());
    serde_json::from_str(body).map_err(|e| Error::OutputParsing(e.to_string()))
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .map_or(reply, str::trim_end)
}
