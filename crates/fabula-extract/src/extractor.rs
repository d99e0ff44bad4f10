//! Model-driven chapter and character extraction.

use std::sync::Arc;

use fabula::{Chapter, Character, ChatModel, Document, Message, Result};
use fabula_text_splitters::split_by_length;

use crate::chapters::detect_chapter_spans;
use crate::prompts::{
    character_analysis_prompt, character_list_prompt, chapter_analysis_prompt,
    ANALYST_SYSTEM, CORRECTIVE_INSTRUCTION,
};
use crate::schema::{parse_reply, ChapterAnalysis, CharacterList, CharacterSheet};

/// Tuning knobs for extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    /// Characters of chapter text sent per analysis call.
    pub analysis_budget_chars: usize,
    /// Characters of the novel opening sent with the character list call.
    pub opening_sample_chars: usize,
    /// Total characters of context around each character mention.
    pub context_window: usize,
    /// Mention contexts collected per character.
    pub max_contexts: usize,
    /// Mention contexts included in the analysis prompt.
    pub prompt_contexts: usize,
    /// Mention contexts kept on the character record.
    pub stored_contexts: usize,
    /// Upper bound on analyzed characters.
    pub max_characters: usize,
    /// Chapterless text longer than this is length-split instead of being
    /// analyzed as one chapter.
    pub max_chapter_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            analysis_budget_chars: 2000,
            opening_sample_chars: 3000,
            context_window: 200,
            max_contexts: 20,
            prompt_contexts: 5,
            stored_contexts: 10,
            max_characters: 10,
            max_chapter_chars: 8000,
        }
    }
}

/// One analysis unit that could not be completed.
#[derive(Debug, Clone)]
pub struct ExtractionFailure {
    /// Chapter number for chapter failures, `None` for character failures.
    pub chapter: Option<usize>,
    /// What was being analyzed (chapter title or character name).
    pub subject: String,
    /// Why it failed.
    pub message: String,
}

/// The result of a full extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Chapters in document order. Failed chapters carry fallback records.
    pub chapters: Vec<Chapter>,
    /// Merged characters.
    pub characters: Vec<Character>,
    /// Units that failed after the corrective retry.
    pub failures: Vec<ExtractionFailure>,
}

impl ExtractionReport {
    /// Whether any unit failed and the novel is only partially analyzed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Extracts chapters and characters from a novel via the reasoning model.
pub struct StructuredExtractor {
    model: Arc<dyn ChatModel>,
    config: ExtractorConfig,
}

impl StructuredExtractor {
    /// Create an extractor with default tuning.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            config: ExtractorConfig::default(),
        }
    }

    /// Override the tuning knobs.
    #[must_use]
    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the full pipeline: chapters first, then characters grounded in
    /// the chapter analyses.
    pub async fn extract(&self, document: &Document) -> Result<ExtractionReport> {
        let (chapters, mut failures) = self.extract_chapters(document).await?;
        let (characters, character_failures) =
            self.extract_characters(document, &chapters).await?;
        failures.extend(character_failures);
        Ok(ExtractionReport {
            chapters,
            characters,
            failures,
        })
    }

    /// Detect chapter spans and analyze each one.
    ///
    /// A chapter whose analysis fails twice keeps a numbered fallback
    /// record and is listed in the failures; the remaining chapters are
    /// still processed.
    pub async fn extract_chapters(
        &self,
        document: &Document,
    ) -> Result<(Vec<Chapter>, Vec<ExtractionFailure>)> {
        let text = document.text();
        let mut spans = detect_chapter_spans(text)?;
        if spans.is_empty() {
            spans = if text.chars().count() > self.config.max_chapter_chars {
                split_by_length(text, self.config.max_chapter_chars)
            } else {
                vec![(0, text.len())]
            };
        }

        let mut chapters = Vec::with_capacity(spans.len());
        let mut failures = Vec::new();
        for (i, &(start, end)) in spans.iter().enumerate() {
            let index = i + 1;
            let excerpt = truncate_chars(&text[start..end], self.config.analysis_budget_chars);
            let prompt = chapter_analysis_prompt(index, excerpt);
            match self.request_json::<ChapterAnalysis>(prompt).await {
                Ok(analysis) => chapters.push(analysis.into_chapter(index, start, end)),
                Err(err) => {
                    tracing::error!(chapter = index, error = %err, "chapter analysis failed");
                    failures.push(ExtractionFailure {
                        chapter: Some(index),
                        subject: format!("Chapter {index}"),
                        message: err.to_string(),
                    });
                    chapters.push(Chapter::fallback(index, start, end));
                }
            }
        }
        Ok((chapters, failures))
    }

    /// Identify and analyze the main characters.
    pub async fn extract_characters(
        &self,
        document: &Document,
        chapters: &[Chapter],
    ) -> Result<(Vec<Character>, Vec<ExtractionFailure>)> {
        let text = document.text();
        let names = self.main_character_names(text, chapters).await;

        let mut sheets = Vec::with_capacity(names.len());
        let mut failures = Vec::new();
        for name in names {
            let contexts = mention_contexts(
                text,
                &name,
                self.config.context_window,
                self.config.max_contexts,
            );
            let sample = contexts
                .iter()
                .take(self.config.prompt_contexts)
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");
            let prompt = character_analysis_prompt(&name, &sample);
            let mut character = match self.request_json::<CharacterSheet>(prompt).await {
                Ok(sheet) => sheet.into_character(&name),
                Err(err) => {
                    tracing::error!(character = %name, error = %err, "character analysis failed");
                    failures.push(ExtractionFailure {
                        chapter: None,
                        subject: name.clone(),
                        message: err.to_string(),
                    });
                    Character::named(&name)
                }
            };
            character.contexts = contexts
                .into_iter()
                .take(self.config.stored_contexts)
                .collect();
            character.appearances = appearance_chapters(text, &name, chapters);
            character.first_appearance = character.appearances.first().copied();
            sheets.push(character);
        }

        Ok((merge_characters(sheets), failures))
    }

    /// Ask the model for the main character names, falling back to mention
    /// frequency when the call fails.
    async fn main_character_names(&self, text: &str, chapters: &[Chapter]) -> Vec<String> {
        let mentioned = mentioned_names(chapters);
        let sample = truncate_chars(text, self.config.opening_sample_chars);
        let prompt = character_list_prompt(sample, &mentioned);
        let names = match self.request_json::<CharacterList>(prompt).await {
            Ok(list) => list.characters,
            Err(err) => {
                tracing::warn!(error = %err, "character list call failed, using mention frequency");
                top_mentioned_by_frequency(chapters, 5)
            }
        };
        dedupe_names(names, self.config.max_characters)
    }

    /// Send a prompt expecting a JSON object, retrying once with the
    /// corrective instruction on a parse failure.
    async fn request_json<T: serde::de::DeserializeOwned>(&self, prompt: String) -> Result<T> {
        let messages = vec![
            Message::system(ANALYST_SYSTEM),
            Message::user(prompt.clone()),
        ];
        let reply = self.model.generate_structured(&messages).await?;
        match parse_reply::<T>(&reply) {
            Ok(value) => Ok(value),
            Err(parse_err) => {
                tracing::warn!(error = %parse_err, "malformed model reply, retrying with corrective instruction");
                let retry = vec![
                    Message::system(ANALYST_SYSTEM),
                    Message::user(format!("{prompt}\n\n{CORRECTIVE_INSTRUCTION}")),
                ];
                let reply = self.model.generate_structured(&retry).await?;
                parse_reply::<T>(&reply)
            }
        }
    }
}

/// Union a list of character sheets by case-insensitive name.
///
/// The first occurrence fixes the canonical casing; later sheets fold in
/// via [`Character::merge`], preserving encounter order.
#[must_use]
pub fn merge_characters(sheets: Vec<Character>) -> Vec<Character> {
    let mut merged: Vec<Character> = Vec::new();
    for sheet in sheets {
        if let Some(existing) = merged
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&sheet.name))
        {
            existing.merge(sheet);
        } else {
            merged.push(sheet);
        }
    }
    merged
}

/// Passages of roughly `window` bytes around each mention of `name`,
/// deduped, at most `cap` of them.
#[must_use]
pub fn mention_contexts(text: &str, name: &str, window: usize, cap: usize) -> Vec<String> {
    let mut contexts: Vec<String> = Vec::new();
    if name.is_empty() {
        return contexts;
    }
    let mut search_from = 0usize;
    while let Some(found) = text[search_from..].find(name) {
        let pos = search_from + found;
        let start = floor_char_boundary(text, pos.saturating_sub(window / 2));
        let end = ceil_char_boundary(text, (pos + name.len()).saturating_add(window / 2));
        let context = text[start..end].trim().to_string();
        if !context.is_empty() && !contexts.contains(&context) {
            contexts.push(context);
        }
        search_from = pos + name.len();
        if contexts.len() >= cap {
            break;
        }
    }
    contexts
}

/// 1-based indices of chapters whose text mentions `name`, ascending.
fn appearance_chapters(text: &str, name: &str, chapters: &[Chapter]) -> Vec<usize> {
    let needle = name.to_lowercase();
    chapters
        .iter()
        .filter(|ch| text[ch.start..ch.end].to_lowercase().contains(&needle))
        .map(|ch| ch.index)
        .collect()
}

/// All names mentioned across chapters, first-seen order, case-insensitive
/// dedupe.
fn mentioned_names(chapters: &[Chapter]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for chapter in chapters {
        for name in &chapter.characters_mentioned {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// The `limit` most frequently mentioned names across chapters.
fn top_mentioned_by_frequency(chapters: &[Chapter], limit: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for chapter in chapters {
        for name in &chapter.characters_mentioned {
            match counts
                .iter_mut()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                Some((_, count)) => *count += 1,
                None => counts.push((name.clone(), 1)),
            }
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(n, _)| n).collect()
}

fn dedupe_names(names: Vec<String>, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim().to_string();
        if !name.is_empty() && !out.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            out.push(name);
        }
        if out.len() >= limit {
            break;
        }
    }
    out
}

/// First `max_chars` characters of `text`, on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fabula::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted replies in order.
    struct ScriptedModel {
        replies: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| (*s).to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn generate(&self, _messages: &[Message]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .expect("lock")
                .pop()
                .ok_or_else(|| Error::service("script exhausted"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn two_chapter_doc() -> Document {
        Document::from_text(
            "Chapter 1\nAlice met the talking cat in the garden.\n\
             Chapter 2\nBob the blacksmith argued with Alice at the forge.",
            "novel.txt",
        )
        .expect("document")
    }

    const CH1: &str = r#"{"title": "The Garden", "summary": "Alice meets a cat.",
        "characters_mentioned": ["Alice"], "key_events": ["meeting the cat"]}"#;
    const CH2: &str = r#"{"title": "The Forge", "summary": "Bob argues with Alice.",
        "characters_mentioned": ["Bob", "alice"], "emotional_tone": "tense"}"#;

    #[tokio::test]
    async fn test_extract_chapters_happy_path() {
        let model = ScriptedModel::new(&[CH1, CH2]);
        let extractor = StructuredExtractor::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        let (chapters, failures) = extractor
            .extract_chapters(&two_chapter_doc())
            .await
            .expect("extract");

        assert!(failures.is_empty());
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "The Garden");
        assert_eq!(chapters[0].index, 1);
        assert_eq!(chapters[1].title, "The Forge");
        assert_eq!(chapters[1].emotional_tone, "tense");
        assert_eq!(model.calls(), 2);
        // Spans cover the detected chapter ranges.
        assert!(chapters[0].start < chapters[0].end);
        assert_eq!(chapters[1].end, two_chapter_doc().len());
    }

    #[tokio::test]
    async fn test_malformed_reply_retried_once() {
        let model = ScriptedModel::new(&["not json at all", CH1, CH2]);
        let extractor = StructuredExtractor::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        let (chapters, failures) = extractor
            .extract_chapters(&two_chapter_doc())
            .await
            .expect("extract");

        assert!(failures.is_empty());
        assert_eq!(chapters[0].title, "The Garden");
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_persistent_failure_keeps_fallback_and_continues() {
        let model = ScriptedModel::new(&["nope", "still nope", CH2]);
        let extractor = StructuredExtractor::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        let (chapters, failures) = extractor
            .extract_chapters(&two_chapter_doc())
            .await
            .expect("extract");

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Chapter 1");
        assert!(chapters[0].summary.is_empty());
        assert_eq!(chapters[1].title, "The Forge");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].chapter, Some(1));
    }

    #[tokio::test]
    async fn test_chapterless_document_is_one_chapter() {
        let model = ScriptedModel::new(&[CH1]);
        let extractor = StructuredExtractor::new(model);
        let doc = Document::from_text("Just prose without any headings at all.", "plain.txt")
            .expect("document");
        let (chapters, failures) = extractor.extract_chapters(&doc).await.expect("extract");
        assert!(failures.is_empty());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].start, 0);
        assert_eq!(chapters[0].end, doc.len());
    }

    #[tokio::test]
    async fn test_characters_merge_case_insensitively() {
        let doc = two_chapter_doc();
        let model = ScriptedModel::new(&[
            CH1,
            CH2,
            r#"{"characters": ["Alice", "Bob"]}"#,
            r#"{"name": "Alice", "traits": ["curious"], "background": "a dreamer"}"#,
            r#"{"name": "Bob", "traits": ["gruff"], "role": "supporting"}"#,
        ]);
        let extractor = StructuredExtractor::new(model);
        let report = extractor.extract(&doc).await.expect("extract");

        assert!(!report.is_partial());
        assert_eq!(report.characters.len(), 2);
        let alice = &report.characters[0];
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.traits, vec!["curious"]);
        // Alice is mentioned in both chapter texts.
        assert_eq!(alice.appearances, vec![1, 2]);
        assert_eq!(alice.first_appearance, Some(1));
        let bob = &report.characters[1];
        assert_eq!(bob.appearances, vec![2]);
    }

    #[tokio::test]
    async fn test_character_list_failure_falls_back_to_frequency() {
        let doc = two_chapter_doc();
        let model = ScriptedModel::new(&[
            CH1,
            CH2,
            "not a json list",
            "again not json", // corrective retry also fails
            r#"{"name": "Alice", "traits": ["curious"]}"#,
            r#"{"name": "Bob"}"#,
        ]);
        let extractor = StructuredExtractor::new(model);
        let report = extractor.extract(&doc).await.expect("extract");

        // Alice mentioned twice across chapters, Bob once.
        assert_eq!(report.characters[0].name, "Alice");
        assert_eq!(report.characters[1].name, "Bob");
    }

    #[test]
    fn test_merge_characters_unions_disjoint_traits() {
        let mut a = Character::named("Alice");
        a.traits = vec!["curious".to_string()];
        a.appearances = vec![1];
        a.first_appearance = Some(1);
        let mut b = Character::named("alice");
        b.traits = vec!["brave".to_string()];
        b.appearances = vec![2];
        b.first_appearance = Some(2);

        let merged = merge_characters(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Alice");
        assert_eq!(merged[0].traits, vec!["curious", "brave"]);
        assert_eq!(merged[0].appearances, vec![1, 2]);
        assert_eq!(merged[0].first_appearance, Some(1));
    }

    #[test]
    fn test_mention_contexts_windows_and_caps() {
        let text = "Alice here. ".repeat(40);
        let contexts = mention_contexts(&text, "Alice", 20, 3);
        assert!(contexts.len() <= 3);
        assert!(contexts.iter().all(|c| c.contains("Alice")));
    }

    #[test]
    fn test_mention_contexts_dedupes_identical_windows() {
        // Every window around "X" reads the same in this periodic text.
        let text = "aaaa X aaaa X aaaa X aaaa";
        let contexts = mention_contexts(text, "X", 8, 20);
        assert!(contexts.len() < 3);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("가나다라", 2), "가나");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
