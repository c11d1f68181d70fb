//! Query-time retrieval policy.

use std::sync::Arc;

use tracing::info;

use crate::document::RetrievalResult;
use crate::error::Result;
use crate::index::{EmbeddingIndex, Index};

/// Wraps [`EmbeddingIndex::query`] with a top-k and minimum-score policy.
///
/// Filtering every hit away is not an error: the caller receives an empty
/// [`RetrievalResult`] and decides how to present "no relevant context".
#[derive(Clone)]
pub struct Retriever {
    embedding_index: Arc<EmbeddingIndex>,
}

impl Retriever {
    /// Create a retriever over the given embedding index.
    pub fn new(embedding_index: Arc<EmbeddingIndex>) -> Self {
        Self { embedding_index }
    }

    /// Retrieve at most `k` chunks for `question`, dropping those scoring below `min_score`.
    ///
    /// `None` disables filtering. NaN scores never pass an explicit threshold.
    ///
    /// # Errors
    ///
    /// Propagates [`EmbeddingIndex::query`] errors (invalid `k`, service failure).
    pub async fn retrieve(
        &self,
        index: &Index,
        question: &str,
        k: usize,
        min_score: Option<f32>,
    ) -> Result<RetrievalResult> {
        let hits = self.embedding_index.query(index, question, k).await?;
        let candidates = hits.len();
        let hits = match min_score {
            Some(threshold) => hits.into_iter().filter(|hit| hit.score >= threshold).collect(),
            None => hits,
        };

        info!(candidates, result_count = hits.len(), ?min_score, "retrieval completed");
        Ok(RetrievalResult::new(hits))
    }
}
