//! Chunk retrieval on top of the index.

use crate::documents::Chunk;
use crate::error::Result;
use crate::index::ChunkIndex;
use crate::novel::{Chapter, Character};

/// Retrieves the chunks most relevant to a query.
///
/// A thin policy layer over [`ChunkIndex::search`]: it fixes the result
/// count and applies the optional character filter. Deterministic for
/// identical index state and query.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRetriever {
    top_k: usize,
}

impl ChunkRetriever {
    /// Default number of chunks retrieved per query.
    pub const DEFAULT_TOP_K: usize = 5;

    /// Create a retriever returning up to [`DEFAULT_TOP_K`](Self::DEFAULT_TOP_K) chunks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    /// Set the number of chunks to retrieve.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Retrieve the most relevant chunks for `query`, best first.
    pub async fn retrieve(&self, index: &ChunkIndex, query: &str) -> Result<Vec<Chunk>> {
        let results = index.search(query, self.top_k).await?;
        tracing::debug!(
            query_len = query.len(),
            results = results.len(),
            "retrieved chunks"
        );
        Ok(results.into_iter().map(|(chunk, _)| chunk).collect())
    }

    /// Retrieve chunks for `query`, preferring passages from chapters where
    /// `character` appears.
    ///
    /// Post-filters the ranked list to chunks overlapping an appearance
    /// chapter's byte range. When the filter would remove everything (the
    /// character has no recorded appearances, or none of the top results
    /// fall in them) the unfiltered list is returned instead, so a chat
    /// turn is never left without grounding context.
    pub async fn retrieve_for_character(
        &self,
        index: &ChunkIndex,
        query: &str,
        character: &Character,
        chapters: &[Chapter],
    ) -> Result<Vec<Chunk>> {
        let ranked = self.retrieve(index, query).await?;

        let ranges: Vec<(usize, usize)> = chapters
            .iter()
            .filter(|ch| character.appearances.contains(&ch.index))
            .map(|ch| (ch.start, ch.end))
            .collect();
        if ranges.is_empty() {
            return Ok(ranked);
        }

        let filtered: Vec<Chunk> = ranked
            .iter()
            .filter(|chunk| ranges.iter().any(|&(s, e)| chunk.overlaps(s, e)))
            .cloned()
            .collect();
        if filtered.is_empty() {
            tracing::debug!(
                character = %character.name,
                "character filter removed all results, falling back to unfiltered"
            );
            return Ok(ranked);
        }
        Ok(filtered)
    }
}

impl Default for ChunkRetriever {
    fn default() -> Self {
        Self::new()
    }
}
