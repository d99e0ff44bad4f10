//! Structured extraction for Fabula.
//!
//! Turns a loaded novel into [`fabula::Chapter`] and [`fabula::Character`]
//! records: regex heuristics find chapter boundaries, the reasoning model
//! analyzes each chapter and character with JSON-schema replies, and
//! per-chapter character entries are merged case-insensitively. A unit
//! whose analysis fails twice is reported and skipped — extraction never
//! aborts the whole novel.

mod chapters;
mod extractor;
mod prompts;
mod schema;

pub use chapters::detect_chapter_spans;
pub use extractor::{
    mention_contexts, merge_characters, ExtractionFailure, ExtractionReport, ExtractorConfig,
    StructuredExtractor,
};
pub use schema::{parse_reply, ChapterAnalysis, CharacterList, CharacterSheet};
