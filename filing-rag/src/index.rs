//! Embedding and indexing of chunks.
//!
//! [`EmbeddingIndex`] turns chunks into vectors through an
//! [`EmbeddingProvider`] and hands them to an [`IndexBackend`], producing an
//! immutable [`Index`]. The same provider embeds queries, and an index refuses
//! queries embedded by any other model.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::inmemory::FlatIndexBackend;
use crate::retry::RetryPolicy;
use crate::vectorstore::{IndexBackend, IndexEntry, VectorIndex};

/// An immutable, searchable set of embedded chunks.
///
/// Records the embedding model and dimension it was built with.
#[derive(Clone)]
pub struct Index {
    model_id: String,
    dimensions: usize,
    vectors: Arc<dyn VectorIndex>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("model_id", &self.model_id)
            .field("dimensions", &self.dimensions)
            .field("len", &self.vectors.len())
            .finish()
    }
}

impl Index {
    /// The embedding model the index was built with.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Dimension of every stored vector.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True if the index holds no chunks (never the case for a built index).
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Builds and queries [`Index`]es with one embedding provider.
///
/// # Example
///
/// ```rust,ignore
/// use filing_rag::{EmbeddingIndex, HashingEmbeddingProvider};
///
/// let embedder = EmbeddingIndex::new(Arc::new(HashingEmbeddingProvider::new(256)));
/// let index = embedder.build(chunks).await?;
/// let hits = embedder.query(&index, "supplier risk", 4).await?;
/// ```
pub struct EmbeddingIndex {
    provider: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn IndexBackend>,
    retry: RetryPolicy,
    batch_size: usize,
    max_concurrency: usize,
}

impl EmbeddingIndex {
    /// Create an embedding index over a [`FlatIndexBackend`] with default batching.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let defaults = RagConfig::default();
        Self {
            provider,
            backend: Arc::new(FlatIndexBackend::default()),
            retry: RetryPolicy::from_config(&defaults.retry),
            batch_size: defaults.embedding_batch_size,
            max_concurrency: defaults.max_concurrent_requests,
        }
    }

    /// Take batching, concurrency and retry settings from `config`.
    pub fn with_config(mut self, config: &RagConfig) -> Self {
        self.retry = RetryPolicy::from_config(&config.retry);
        self.batch_size = config.embedding_batch_size.max(1);
        self.max_concurrency = config.max_concurrent_requests.max(1);
        self
    }

    /// Use a different index backend.
    pub fn with_backend(mut self, backend: Arc<dyn IndexBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Use a different retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The embedding provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed every chunk and build an index.
    ///
    /// Chunks are embedded in batches with at most `max_concurrent_requests`
    /// batches in flight; the index keeps the input order, which is the
    /// tie-break for equal scores.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if `chunks` is empty
    /// - [`RagError::EmbeddingServiceError`] if the service keeps failing or
    ///   returns vectors whose dimension disagrees with the declared one or
    ///   with each other
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<Index> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let provider_name = self.provider.model_id().to_string();
        let dimensions = self.provider.dimensions();
        if dimensions == 0 {
            return Err(RagError::embedding(provider_name, "provider declares zero dimensions"));
        }

        let batches: Vec<&[Chunk]> = chunks.chunks(self.batch_size).collect();
        let batch_count = batches.len();
        debug!(
            chunk_count = chunks.len(),
            batch_count,
            max_concurrency = self.max_concurrency,
            model = %provider_name,
            "embedding corpus"
        );

        let batch_futures: Vec<_> = batches.into_iter().map(|batch| self.embed_batch(batch)).collect();
        let embedded: Vec<Vec<Vec<f32>>> = stream::iter(batch_futures)
            .buffered(self.max_concurrency)
            .try_collect()
            .await
            .map_err(|e| {
                error!(error = %e, "embedding failed during index build");
                e
            })?;

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.into_iter().zip(embedded.into_iter().flatten()) {
            if embedding.len() != dimensions {
                return Err(RagError::embedding(
                    provider_name,
                    format!(
                        "dimension mismatch for chunk '{}': got {}, expected {dimensions}",
                        chunk.id,
                        embedding.len()
                    ),
                ));
            }
            entries.push(IndexEntry { chunk, embedding });
        }

        let vectors = self.backend.build(dimensions, entries)?;
        info!(
            chunk_count = vectors.len(),
            dimensions,
            backend = self.backend.name(),
            "index built"
        );

        Ok(Index { model_id: provider_name, dimensions, vectors })
    }

    async fn embed_batch(&self, batch: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.retry.run("embed_batch", || self.provider.embed_batch(&texts)).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::embedding(
                self.provider.model_id(),
                format!("service returned {} vectors for {} inputs", vectors.len(), texts.len()),
            ));
        }
        Ok(vectors)
    }

    /// Return the `k` chunks most similar to `text`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidParameter`] if `k == 0`
    /// - [`RagError::EmbeddingServiceError`] if the index was built by another
    ///   model, the query vector has the wrong dimension, or the service fails
    pub async fn query(&self, index: &Index, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidParameter("k must be greater than zero".into()));
        }
        let model = self.provider.model_id();
        if model != index.model_id {
            return Err(RagError::embedding(
                model,
                format!(
                    "index was built with model '{}'; query vectors would not be comparable",
                    index.model_id
                ),
            ));
        }

        let embedding = self.retry.run("embed_query", || self.provider.embed(text)).await?;
        if embedding.len() != index.dimensions {
            return Err(RagError::embedding(
                model,
                format!(
                    "query embedding has dimension {}, index expects {}",
                    embedding.len(),
                    index.dimensions
                ),
            ));
        }

        let results = index.vectors.search(&embedding, k);
        debug!(k, result_count = results.len(), "index queried");
        Ok(results)
    }
}
