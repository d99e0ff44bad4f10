//! Documents and chunks.
//!
//! A [`Document`] is the cleaned plain text of one uploaded novel. A
//! [`Chunk`] is a contiguous span of that text, identified by its position
//! in the split sequence; the embedding vector for a chunk lives in the
//! index, not on the chunk itself.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An uploaded novel, immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Cleaned text content.
    text: String,
    /// Where the text came from (file name, upload label).
    source: String,
}

impl Document {
    /// Load a document from raw text, cleaning it first.
    ///
    /// Cleaning normalizes line endings, strips trailing whitespace from
    /// each line, and collapses runs of three or more newlines into a
    /// paragraph break. Whitespace-only input is rejected.
    pub fn from_text(raw: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let cleaned = clean_text(&raw.into());
        if cleaned.is_empty() {
            return Err(Error::Input("document text is empty".to_string()));
        }
        Ok(Self {
            text: cleaned,
            source: source.into(),
        })
    }

    /// The cleaned document text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The document source label.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Length of the cleaned text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the document is empty. Never true for a loaded document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text statistics for display and budgeting.
    #[must_use]
    pub fn stats(&self) -> TextStats {
        TextStats::of(&self.text)
    }
}

/// A contiguous span of document text produced by a splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the split sequence, starting at 0.
    pub id: usize,
    /// The span text.
    pub text: String,
    /// Byte offset of the span start in the document text.
    pub start: usize,
    /// Byte offset one past the span end.
    pub end: usize,
}

impl Chunk {
    /// Create a chunk from a span of `text`.
    #[must_use]
    pub fn new(id: usize, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            id,
            text: text.into(),
            start,
            end,
        }
    }

    /// Whether this chunk's span overlaps the byte range `[start, end)`.
    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && self.end > start
    }
}

/// Counts over a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    /// Unicode scalar count.
    pub chars: usize,
    /// Whitespace-separated word count.
    pub words: usize,
    /// Line count.
    pub lines: usize,
    /// Blank-line-separated paragraph count.
    pub paragraphs: usize,
}

impl TextStats {
    /// Compute statistics for `text`.
    #[must_use]
    pub fn of(text: &str) -> Self {
        Self {
            chars: text.chars().count(),
            words: text.split_whitespace().count(),
            lines: text.lines().count(),
            paragraphs: text
                .split("\n\n")
                .filter(|p| !p.trim().is_empty())
                .count(),
        }
    }
}

/// Normalize raw upload text.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len());
    let mut blank_run = 0usize;
    for line in normalized.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            // Collapse runs of blank lines to a single paragraph break.
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_cleans_and_keeps_source() {
        let doc = Document::from_text("Line one.  \r\n\r\n\r\n\r\nLine two.", "novel.txt")
            .expect("valid text");
        assert_eq!(doc.text(), "Line one.\n\nLine two.");
        assert_eq!(doc.source(), "novel.txt");
    }

    #[test]
    fn test_from_text_rejects_whitespace_only() {
        let err = Document::from_text("   \n\n \t ", "blank.txt").unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_clean_text_collapses_blank_runs() {
        assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a\nb"), "a\nb");
    }

    #[test]
    fn test_clean_text_strips_trailing_line_whitespace() {
        assert_eq!(clean_text("hello   \nworld\t"), "hello\nworld");
    }

    #[test]
    fn test_stats() {
        let stats = TextStats::of("One two three.\n\nFour five.");
        assert_eq!(stats.words, 5);
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.paragraphs, 2);
    }

    #[test]
    fn test_chunk_overlaps() {
        let chunk = Chunk::new(0, "abc", 10, 13);
        assert!(chunk.overlaps(0, 11));
        assert!(chunk.overlaps(12, 20));
        assert!(!chunk.overlaps(13, 20));
        assert!(!chunk.overlaps(0, 10));
    }
}
