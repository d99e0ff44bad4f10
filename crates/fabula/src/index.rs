//! In-memory embedding index over document chunks.
//!
//! The index owns the mapping from chunk id to embedding vector. Chunks are
//! embedded in batches on insert; search is exact cosine similarity over
//! all stored vectors, which is the right trade-off for a single novel's
//! worth of chunks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::documents::Chunk;
use crate::embeddings::Embeddings;
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryPolicy};

/// Default number of chunk texts sent per embedding request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Serializable snapshot of an index, for [`crate::storage::BlobStore`]
/// persistence.
#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// Cosine similarity between two vectors of equal dimension.
///
/// Zero-magnitude vectors have no direction and score 0 against
/// everything. The result is clamped to `[-1, 1]` against floating point
/// drift.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::Input(format!(
            "vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// An embedding index over the chunks of one novel.
pub struct ChunkIndex {
    embeddings: Arc<dyn Embeddings>,
    entries: Vec<IndexEntry>,
    dimension: Option<usize>,
    batch_size: usize,
    retry_policy: RetryPolicy,
}

impl ChunkIndex {
    /// Create an empty index backed by `embeddings`.
    #[must_use]
    pub fn new(embeddings: Arc<dyn Embeddings>) -> Self {
        Self {
            embeddings,
            entries: Vec::new(),
            dimension: None,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the embedding batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the retry policy applied per embedding batch.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no chunks are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension, once the first batch is stored.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Embed and store `chunks`.
    ///
    /// Chunks are embedded in batches; a failed batch is retried per the
    /// policy, and batches that still fail are skipped while the rest are
    /// stored. When any batch failed the call returns
    /// [`Error::Indexing`] naming every chunk id that is not in the index —
    /// nothing is silently dropped.
    pub async fn add(&mut self, chunks: &[Chunk]) -> Result<()> {
        let mut failed_ids: Vec<usize> = Vec::new();

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = with_retry(&self.retry_policy, || async {
                self.embeddings.embed_documents(&texts).await
            })
            .await;

            let vectors = match embedded {
                Ok(vectors) => vectors,
                Err(err) => {
                    tracing::error!(
                        chunks = batch.len(),
                        error = %err,
                        "embedding batch failed after retry"
                    );
                    failed_ids.extend(batch.iter().map(|c| c.id));
                    continue;
                }
            };

            if vectors.len() != batch.len() {
                failed_ids.extend(batch.iter().map(|c| c.id));
                continue;
            }

            match self.store_batch(batch, vectors) {
                Ok(()) => {}
                Err(ids) => failed_ids.extend(ids),
            }
        }

        if failed_ids.is_empty() {
            Ok(())
        } else {
            Err(Error::Indexing {
                chunk_ids: failed_ids,
            })
        }
    }

    /// Store one embedded batch, enforcing a consistent dimension.
    fn store_batch(
        &mut self,
        batch: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> std::result::Result<(), Vec<usize>> {
        let expected = self
            .dimension
            .or_else(|| vectors.first().map(Vec::len));
        let Some(expected) = expected else {
            return Ok(());
        };
        if vectors.iter().any(|v| v.len() != expected) {
            tracing::error!(expected, "embedding dimension mismatch in batch");
            return Err(batch.iter().map(|c| c.id).collect());
        }
        self.dimension = Some(expected);
        for (chunk, vector) in batch.iter().zip(vectors) {
            self.entries.push(IndexEntry {
                chunk: chunk.clone(),
                vector,
            });
        }
        Ok(())
    }

    /// Return up to `top_k` chunks by descending cosine similarity to
    /// `query`.
    ///
    /// Ties are broken by ascending chunk id, so identical index state and
    /// query always produce the same ordering. `top_k` is clamped to the
    /// stored count. Searching an empty index is [`Error::EmptyIndex`];
    /// an empty query string is embedded like any other.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<(Chunk, f32)>> {
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        let query_vector = self.embeddings.embed_query(query).await?;
        if let Some(dimension) = self.dimension {
            if query_vector.len() != dimension {
                return Err(Error::Input(format!(
                    "query embedding has dimension {}, index has {}",
                    query_vector.len(),
                    dimension
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = Vec::with_capacity(self.entries.len());
        for (position, entry) in self.entries.iter().enumerate() {
            let score = cosine_similarity(&query_vector, &entry.vector)?;
            scored.push((position, score));
        }

        let k = top_k.min(scored.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        // Partition the top k first, then order just that prefix.
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, |a, b| Self::rank(self, a, b));
            scored.truncate(k);
        }
        scored.sort_unstable_by(|a, b| Self::rank(self, a, b));

        Ok(scored
            .into_iter()
            .map(|(position, score)| (self.entries[position].chunk.clone(), score))
            .collect())
    }

    fn rank(&self, a: &(usize, f32), b: &(usize, f32)) -> std::cmp::Ordering {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.entries[a.0].chunk.id.cmp(&self.entries[b.0].chunk.id))
    }

    /// Serialize chunks and vectors for persistence.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let snapshot = IndexSnapshot {
            dimension: self.dimension,
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    /// Rebuild an index from a [`to_blob`](Self::to_blob) snapshot.
    ///
    /// The provided embedder must match the one that produced the stored
    /// vectors, or searches will be meaningless.
    pub fn from_blob(embeddings: Arc<dyn Embeddings>, blob: &[u8]) -> Result<Self> {
        let snapshot: IndexSnapshot = serde_json::from_slice(blob)?;
        Ok(Self {
            embeddings,
            entries: snapshot.entries,
            dimension: snapshot.dimension,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            retry_policy: RetryPolicy::default(),
        })
    }
}
