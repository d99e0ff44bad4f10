//! The `TextSplitter` trait and shared configuration.

use fabula::{Chunk, Document};

use crate::error::{Error, Result};
use crate::split_utils::{ceil_char_boundary, find_break, floor_char_boundary};

/// Configuration shared by every splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitterConfig {
    /// Maximum span size in bytes.
    pub chunk_size: usize,
    /// How many bytes of the previous span's tail each span repeats.
    pub chunk_overlap: usize,
}

impl TextSplitterConfig {
    /// Default maximum span size.
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;
    /// Default overlap.
    pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for TextSplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Splits text into bounded, overlapping spans.
///
/// Implementations supply a configuration and an ordered list of boundary
/// separators; the span scan itself is shared. Guarantees:
///
/// - no span exceeds `chunk_size` bytes (hard cut fallback),
/// - text no longer than `chunk_size` yields exactly one span,
/// - each span after the first starts at most `chunk_overlap` bytes before
///   the previous span's end, and never after it, so dropping the
///   overlapping prefixes reconstructs the source text exactly.
pub trait TextSplitter: Send + Sync {
    /// The splitter configuration.
    fn config(&self) -> &TextSplitterConfig;

    /// Boundary separators in preference order.
    fn separators(&self) -> &[String];

    /// Compute `(start, end)` byte spans over `text`.
    fn split_spans(&self, text: &str) -> Result<Vec<(usize, usize)>> {
        let config = self.config();
        config.validate()?;
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut spans = Vec::new();
        let mut start = 0usize;
        while start < text.len() {
            let hard_end = floor_char_boundary(text, start + config.chunk_size);
            let end = if hard_end <= start {
                // chunk_size is smaller than one character at this position;
                // take the character whole to make progress.
                let forced = ceil_char_boundary(text, start + 1);
                tracing::warn!(
                    chunk_size = config.chunk_size,
                    "span forced past chunk_size to stay on a char boundary"
                );
                forced
            } else if hard_end >= text.len() {
                text.len()
            } else {
                find_break(text, start, hard_end, self.separators()).unwrap_or(hard_end)
            };
            spans.push((start, end));
            if end >= text.len() {
                break;
            }
            let mut next = ceil_char_boundary(text, end.saturating_sub(config.chunk_overlap));
            if next <= start {
                next = end;
            }
            start = next;
        }
        Ok(spans)
    }

    /// Split `text` into span strings.
    fn split_text(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .split_spans(text)?
            .into_iter()
            .map(|(s, e)| text[s..e].to_string())
            .collect())
    }

    /// Split a document into offset-tracked chunks, ids assigned in
    /// sequence order.
    fn split_document(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = document.text();
        Ok(self
            .split_spans(text)?
            .into_iter()
            .enumerate()
            .map(|(id, (start, end))| Chunk::new(id, &text[start..end], start, end))
            .collect())
    }
}
