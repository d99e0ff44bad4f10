//! The application-state orchestrator.
//!
//! [`NovelEngine`] owns everything about the currently loaded novel and
//! routes all mutation through `&mut self` handlers: upload resets state,
//! analysis populates chapters/characters/index, chat and story turns go
//! through the assembler, and the whole state round-trips through the
//! blob store.

use std::collections::HashMap;
use std::sync::Arc;

use fabula::{
    BlobStore, Chapter, Character, ChatModel, ChunkIndex, Document, Embeddings, Error, Result,
    TextStats,
};
use fabula_extract::{ExtractionReport, ExtractorConfig, StructuredExtractor};
use fabula_text_splitters::{RecursiveCharacterTextSplitter, TextSplitter};
use serde::{Deserialize, Serialize};

use crate::assembler::{ChatConfig, ConversationAssembler};
use crate::session::ChatSession;

/// Engine-wide configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Chunk size handed to the splitter.
    pub chunk_size: usize,
    /// Chunk overlap handed to the splitter.
    pub chunk_overlap: usize,
    /// Chat budgets and retrieval settings.
    pub chat: ChatConfig,
    /// Extraction tuning.
    pub extractor: ExtractorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            chat: ChatConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Everything known about the currently loaded novel.
struct NovelState {
    novel_id: String,
    title: String,
    document: Document,
    chapters: Vec<Chapter>,
    characters: Vec<Character>,
    index: ChunkIndex,
    partially_analyzed: bool,
    /// Chat sessions keyed by lowercased character name.
    sessions: HashMap<String, ChatSession>,
    story_session: ChatSession,
}

/// Serialized form of [`NovelState`].
#[derive(Serialize, Deserialize)]
struct NovelSnapshot {
    novel_id: String,
    title: String,
    document: Document,
    chapters: Vec<Chapter>,
    characters: Vec<Character>,
    partially_analyzed: bool,
    sessions: HashMap<String, ChatSession>,
    story_session: ChatSession,
    index: serde_json::Value,
}

/// The retrieval-augmented character knowledge engine.
pub struct NovelEngine {
    embeddings: Arc<dyn Embeddings>,
    store: Arc<dyn BlobStore>,
    extractor: StructuredExtractor,
    assembler: ConversationAssembler,
    config: EngineConfig,
    state: Option<NovelState>,
}

impl NovelEngine {
    /// Create an engine over the three collaborators.
    #[must_use]
    pub fn new(
        embeddings: Arc<dyn Embeddings>,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self::with_config(embeddings, model, store, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    #[must_use]
    pub fn with_config(
        embeddings: Arc<dyn Embeddings>,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn BlobStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            embeddings,
            store,
            extractor: StructuredExtractor::new(Arc::clone(&model)).with_config(config.extractor),
            assembler: ConversationAssembler::new(model).with_config(config.chat),
            config,
            state: None,
        }
    }

    /// Load a new novel, discarding any previous novel, analysis and
    /// sessions.
    pub fn load_novel(
        &mut self,
        novel_id: impl Into<String>,
        title: impl Into<String>,
        raw_text: &str,
    ) -> Result<TextStats> {
        let novel_id = novel_id.into();
        let document = Document::from_text(raw_text, novel_id.clone())?;
        let stats = document.stats();
        tracing::info!(
            novel_id,
            chars = stats.chars,
            words = stats.words,
            "novel loaded"
        );
        self.state = Some(NovelState {
            novel_id,
            title: title.into(),
            document,
            chapters: Vec::new(),
            characters: Vec::new(),
            index: ChunkIndex::new(Arc::clone(&self.embeddings)),
            partially_analyzed: false,
            sessions: HashMap::new(),
            story_session: ChatSession::new(None),
        });
        Ok(stats)
    }

    /// Chunk, index and extract the loaded novel.
    ///
    /// Chunks whose embedding fails after retry are reported and skipped,
    /// as are chapters or characters whose analysis fails; either marks
    /// the novel partially analyzed rather than aborting.
    pub async fn analyze(&mut self) -> Result<ExtractionReport> {
        let state = self.state.as_mut().ok_or_else(no_novel)?;

        let splitter = RecursiveCharacterTextSplitter::new()
            .with_chunk_size(self.config.chunk_size)
            .with_chunk_overlap(self.config.chunk_overlap);
        let chunks = splitter
            .split_document(&state.document)
            .map_err(fabula::Error::from)?;
        tracing::info!(chunks = chunks.len(), "chunked novel");

        let mut index = ChunkIndex::new(Arc::clone(&self.embeddings));
        match index.add(&chunks).await {
            Ok(()) => {}
            Err(Error::Indexing { chunk_ids }) => {
                tracing::warn!(
                    failed = chunk_ids.len(),
                    "some chunks failed to embed, continuing partially indexed"
                );
                state.partially_analyzed = true;
            }
            Err(err) => return Err(err),
        }
        state.index = index;

        let report = self.extractor.extract(&state.document).await?;
        state.chapters = report.chapters.clone();
        state.characters = report.characters.clone();
        state.partially_analyzed |= report.is_partial();
        tracing::info!(
            chapters = report.chapters.len(),
            characters = report.characters.len(),
            failures = report.failures.len(),
            "analysis complete"
        );
        Ok(report)
    }

    /// The loaded novel's chapters, in document order.
    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        self.state.as_ref().map_or(&[], |s| &s.chapters)
    }

    /// The loaded novel's characters.
    #[must_use]
    pub fn characters(&self) -> &[Character] {
        self.state.as_ref().map_or(&[], |s| &s.characters)
    }

    /// Look up a character by case-insensitive name.
    #[must_use]
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters()
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Edit a character record in place (names are fixed at extraction).
    pub fn update_character(
        &mut self,
        name: &str,
        update: impl FnOnce(&mut Character),
    ) -> Result<()> {
        let state = self.state.as_mut().ok_or_else(no_novel)?;
        let character = state
            .characters
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| unknown_character(name))?;
        update(character);
        Ok(())
    }

    /// Whether any analysis unit failed.
    #[must_use]
    pub fn is_partially_analyzed(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.partially_analyzed)
    }

    /// Run one chat turn with `character_name` and return the reply.
    pub async fn chat_turn(&mut self, character_name: &str, user_text: &str) -> Result<String> {
        let state = self.state.as_mut().ok_or_else(no_novel)?;
        let character = state
            .characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(character_name))
            .cloned()
            .ok_or_else(|| unknown_character(character_name))?;
        let session = state
            .sessions
            .entry(character.name.to_lowercase())
            .or_insert_with(|| ChatSession::new(Some(character.name.clone())));
        self.assembler
            .chat_turn(&state.index, session, &character, &state.chapters, user_text)
            .await
    }

    /// Generate a character's greeting and record it in the session.
    pub async fn greet(&mut self, character_name: &str) -> Result<String> {
        let state = self.state.as_mut().ok_or_else(no_novel)?;
        let character = state
            .characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(character_name))
            .cloned()
            .ok_or_else(|| unknown_character(character_name))?;
        let greeting = self.assembler.greet(&character).await?;
        state
            .sessions
            .entry(character.name.to_lowercase())
            .or_insert_with(|| ChatSession::new(Some(character.name.clone())))
            .push_assistant(greeting.clone());
        Ok(greeting)
    }

    /// Run one story-mode turn for the reader's `action`.
    pub async fn story_turn(&mut self, action: &str) -> Result<String> {
        let state = self.state.as_mut().ok_or_else(no_novel)?;
        self.assembler
            .story_turn(
                &state.index,
                &mut state.story_session,
                &state.title,
                &state.chapters,
                &state.characters,
                action,
            )
            .await
    }

    /// Generate the story opening and record it in the story session.
    pub async fn open_story(&mut self) -> Result<String> {
        let state = self.state.as_mut().ok_or_else(no_novel)?;
        let opening = self
            .assembler
            .open_story(&state.title, &state.chapters, &state.characters)
            .await?;
        state.story_session.push_assistant(opening.clone());
        Ok(opening)
    }

    /// Persist the loaded novel and all sessions to the blob store.
    pub async fn save(&self) -> Result<()> {
        let state = self.state.as_ref().ok_or_else(no_novel)?;
        let snapshot = NovelSnapshot {
            novel_id: state.novel_id.clone(),
            title: state.title.clone(),
            document: state.document.clone(),
            chapters: state.chapters.clone(),
            characters: state.characters.clone(),
            partially_analyzed: state.partially_analyzed,
            sessions: state.sessions.clone(),
            story_session: state.story_session.clone(),
            index: serde_json::from_slice(&state.index.to_blob()?)?,
        };
        let blob = serde_json::to_vec(&snapshot)?;
        self.store.save(&state.novel_id, &blob).await
    }

    /// Restore a previously saved novel. Returns `false` when the id is
    /// unknown to the store.
    pub async fn load(&mut self, novel_id: &str) -> Result<bool> {
        let Some(blob) = self.store.load(novel_id).await? else {
            return Ok(false);
        };
        let snapshot: NovelSnapshot = serde_json::from_slice(&blob)?;
        let index_blob = serde_json::to_vec(&snapshot.index)?;
        self.state = Some(NovelState {
            novel_id: snapshot.novel_id,
            title: snapshot.title,
            document: snapshot.document,
            chapters: snapshot.chapters,
            characters: snapshot.characters,
            index: ChunkIndex::from_blob(Arc::clone(&self.embeddings), &index_blob)?,
            partially_analyzed: snapshot.partially_analyzed,
            sessions: snapshot.sessions,
            story_session: snapshot.story_session,
        });
        tracing::info!(novel_id, "novel restored");
        Ok(true)
    }
}

fn no_novel() -> Error {
    Error::Input("no novel loaded".to_string())
}

fn unknown_character(name: &str) -> Error {
    Error::Input(format!("unknown character {name:?}"))
}
