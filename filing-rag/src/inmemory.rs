//! Exact in-memory vector index.
//!
//! This module provides [`FlatIndex`], a brute-force index that scores every
//! stored vector against the query. It is exact, needs no external service,
//! and comfortably covers a handful of filings (tens of thousands of chunks).

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::warn;

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexBackend, IndexEntry, Similarity, VectorIndex};

/// An exact nearest-neighbour index over a flat list of vectors.
///
/// Entries keep the order they were built with; that position is the
/// tie-break for equal scores.
#[derive(Debug)]
pub struct FlatIndex {
    dimensions: usize,
    similarity: Similarity,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Create an index from entries already validated to have `dimensions` components.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingServiceError`] if any entry has a
    /// different dimension.
    pub fn new(
        dimensions: usize,
        similarity: Similarity,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimensions) {
            return Err(RagError::embedding(
                "FlatIndex",
                format!(
                    "chunk '{}' has dimension {}, index expects {dimensions}",
                    bad.chunk.id,
                    bad.embedding.len()
                ),
            ));
        }
        Ok(Self { dimensions, similarity, entries })
    }

    /// The similarity metric in use.
    pub fn similarity(&self) -> Similarity {
        self.similarity
    }
}

/// Order by score descending with NaN last, then by corpus position ascending.
fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    key(b.1)
        .total_cmp(&key(a.1))
        .then_with(|| a.1.is_nan().cmp(&b.1.is_nan()))
        .then_with(|| a.0.cmp(&b.0))
}

impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn search(&self, embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| (ordinal, self.similarity.score(&entry.embedding, embedding)))
            .collect();

        let nan_count = scored.iter().filter(|(_, score)| score.is_nan()).count();
        if nan_count > 0 {
            warn!(nan_count, "similarity produced NaN scores; ranking them last");
        }

        scored.sort_by(rank);
        scored.truncate(top_k);
        scored
            .into_iter()
            .map(|(ordinal, score)| SearchResult {
                chunk: self.entries[ordinal].chunk.clone(),
                score,
            })
            .collect()
    }
}

/// [`IndexBackend`] producing [`FlatIndex`]es.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatIndexBackend {
    similarity: Similarity,
}

impl FlatIndexBackend {
    /// Create a backend ranking by the given metric.
    pub fn new(similarity: Similarity) -> Self {
        Self { similarity }
    }
}

impl IndexBackend for FlatIndexBackend {
    fn name(&self) -> &str {
        "flat"
    }

    fn build(&self, dimensions: usize, entries: Vec<IndexEntry>) -> Result<Arc<dyn VectorIndex>> {
        Ok(Arc::new(FlatIndex::new(dimensions, self.similarity, entries)?))
    }
}
