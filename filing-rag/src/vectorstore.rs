//! Vector index traits for storing and searching chunk embeddings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// The similarity metric an index ranks by.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Cosine of the angle between vectors; zero-magnitude vectors score 0.
    #[default]
    Cosine,
    /// Raw dot product, for providers that already emit normalised vectors.
    InnerProduct,
}

impl Similarity {
    /// Score two vectors of equal length.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        match self {
            Self::InnerProduct => dot,
            Self::Cosine => {
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot / (norm_a * norm_b)
            }
        }
    }
}

/// A chunk together with its embedding, as handed to an [`IndexBackend`].
///
/// Entries are passed in corpus order (document order, then position);
/// that order is the tie-break for equal scores.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The embedded chunk.
    pub chunk: Chunk,
    /// Its vector.
    pub embedding: Vec<f32>,
}

/// A read-only nearest-neighbour index over chunk embeddings.
///
/// Indexes are immutable once built, so concurrent searches need no locking.
///
/// # Example
///
/// ```rust,ignore
/// use filing_rag::{FlatIndexBackend, IndexBackend};
///
/// let index = FlatIndexBackend::default().build(384, entries)?;
/// let hits = index.search(&query_embedding, 5);
/// ```
pub trait VectorIndex: Send + Sync {
    /// Dimensionality of every stored vector.
    fn dimensions(&self) -> usize;

    /// Number of stored chunks.
    fn len(&self) -> usize;

    /// True when nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the `top_k` most similar chunks to `embedding`.
    ///
    /// Results are ordered by descending score; equal scores keep corpus
    /// order, and NaN scores sort last.
    fn search(&self, embedding: &[f32], top_k: usize) -> Vec<SearchResult>;
}

/// Builds a [`VectorIndex`] from embedded chunks.
///
/// Swapping backends must not change what the pipeline returns beyond the
/// documented approximation of the backend itself.
pub trait IndexBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Build an index; every entry's embedding has length `dimensions`.
    ///
    /// # Errors
    ///
    /// Backends may reject entries they cannot store.
    fn build(&self, dimensions: usize, entries: Vec<IndexEntry>) -> Result<Arc<dyn VectorIndex>>;
}
