//! Embedding collaborator trait.

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic per input within one index
/// lifetime: the same text embeds to the same vector.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed a batch of document texts, one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic in-process embeddings for tests and offline runs.
///
/// Vectors are derived from the text bytes and L2-normalized, so identical
/// texts embed identically and a text is always most similar to itself.
#[derive(Debug, Clone)]
pub struct MockEmbeddings {
    dimension: usize,
}

impl MockEmbeddings {
    /// Create mock embeddings producing vectors of `dimension` components.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            state ^= u64::from(byte);
            state = state.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let mut vector = Vec::with_capacity(self.dimension);
        let mut x = state | 1;
        for _ in 0..self.dimension {
            x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            // Map the top bits to [-1, 1).
            let component = ((x >> 40) as f32 / 8_388_608.0) - 1.0;
            vector.push(component);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddings {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait]
impl Embeddings for MockEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_one(text))
    }
}
