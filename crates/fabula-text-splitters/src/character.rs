//! Character-based splitters.

use crate::traits::{TextSplitter, TextSplitterConfig};

/// Splits on a single separator, with a hard cut fallback.
#[derive(Debug, Clone)]
pub struct CharacterTextSplitter {
    config: TextSplitterConfig,
    separators: Vec<String>,
}

impl CharacterTextSplitter {
    /// Create a splitter cutting at paragraph breaks (`"\n\n"`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TextSplitterConfig::default(),
            separators: vec!["\n\n".to_string()],
        }
    }

    /// Set the separator to cut at.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separators = vec![separator.into()];
        self
    }

    /// Set the maximum chunk size in bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Set the overlap carried between consecutive chunks.
    #[must_use]
    pub fn with_chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.config.chunk_overlap = chunk_overlap;
        self
    }
}

impl Default for CharacterTextSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSplitter for CharacterTextSplitter {
    fn config(&self) -> &TextSplitterConfig {
        &self.config
    }

    fn separators(&self) -> &[String] {
        &self.separators
    }
}

/// Splits at the most natural boundary available in each window, trying
/// paragraph breaks first, then line breaks, then sentence ends, then word
/// gaps, before falling back to a hard character cut.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    config: TextSplitterConfig,
    separators: Vec<String>,
}

impl RecursiveCharacterTextSplitter {
    /// Default boundary ladder.
    pub const DEFAULT_SEPARATORS: [&'static str; 4] = ["\n\n", "\n", ". ", " "];

    /// Create a splitter with the default boundary ladder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TextSplitterConfig::default(),
            separators: Self::DEFAULT_SEPARATORS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Replace the boundary ladder.
    #[must_use]
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Set the maximum chunk size in bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Set the overlap carried between consecutive chunks.
    #[must_use]
    pub fn with_chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.config.chunk_overlap = chunk_overlap;
        self
    }
}

impl Default for RecursiveCharacterTextSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSplitter for RecursiveCharacterTextSplitter {
    fn config(&self) -> &TextSplitterConfig {
        &self.config
    }

    fn separators(&self) -> &[String] {
        &self.separators
    }
}
