//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (chunk → embed → index) and
//! question answering (retrieve → synthesize). It starts
//! [`PipelineState::Empty`] and becomes [`PipelineState::Ready`] once a corpus
//! has been indexed.
//!
//! Re-ingestion builds a complete new index off to the side and swaps it in
//! only on success, so concurrent queries always see either the old or the
//! new index. Ingest calls on one pipeline are serialized.
//!
//! # Example
//!
//! ```rust,ignore
//! use filing_rag::{RagPipeline, RagConfig, HashingEmbeddingProvider, MockGenerationProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256)))
//!     .generation_provider(Arc::new(MockGenerationProvider::new("...")))
//!     .build()?;
//!
//! pipeline.ingest(&documents).await?;
//! let answer = pipeline.answer_query("What are Apple's key risks?").await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, CorpusChunks, FixedSizeChunker, chunk_corpus};
use crate::config::RagConfig;
use crate::document::{Answer, Document, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::index::{EmbeddingIndex, Index};
use crate::prompt::PromptSpec;
use crate::relay::QueryRelay;
use crate::retriever::Retriever;
use crate::retry::RetryPolicy;
use crate::synthesizer::AnswerSynthesizer;
use crate::vectorstore::IndexBackend;

/// Lifecycle state of a [`RagPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has been ingested; queries fail with [`RagError::NotReady`].
    Empty,
    /// An index is installed and queries are served.
    Ready,
}

/// Summary of a successful [`RagPipeline::ingest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents that produced chunks.
    pub documents: usize,
    /// Documents skipped because they had no extractable text.
    pub skipped_documents: Vec<String>,
    /// Chunks now in the index.
    pub chunks: usize,
}

/// The RAG pipeline orchestrator.
///
/// Owns its index; dropping the pipeline drops the index. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedding_index: Arc<EmbeddingIndex>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    prompt: PromptSpec,
    relay: Option<Arc<dyn QueryRelay>>,
    index: RwLock<Option<Arc<Index>>>,
    ingest_lock: Mutex<()>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the prompt settings used for synthesis.
    pub fn prompt(&self) -> &PromptSpec {
        &self.prompt
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> PipelineState {
        if self.index.read().await.is_some() { PipelineState::Ready } else { PipelineState::Empty }
    }

    /// Number of chunks in the installed index, if any.
    pub async fn indexed_chunks(&self) -> Option<usize> {
        self.index.read().await.as_ref().map(|index| index.len())
    }

    /// Split documents into chunks, skipping those without extractable text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] if document ids repeat or the
    /// chunker is misconfigured.
    pub fn chunk_documents(&self, documents: &[Document]) -> Result<CorpusChunks> {
        chunk_corpus(self.chunker.as_ref(), documents)
    }

    /// Replace the corpus: chunk → embed → index → swap.
    ///
    /// On failure the previously installed index (if any) stays in place.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if no document yields any text
    /// - [`RagError::InvalidParameter`] if two documents share an id
    /// - [`RagError::EmbeddingServiceError`] if embedding fails after retries
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;

        let CorpusChunks { chunks, skipped: skipped_documents } =
            self.chunk_documents(documents)?;
        let documents_indexed = documents.len() - skipped_documents.len();

        let index = self.embedding_index.build(chunks).await.map_err(|e| {
            error!(
                document_count = documents.len(),
                error = %e,
                "ingestion failed; keeping previous index"
            );
            e
        })?;
        let chunk_count = index.len();

        *self.index.write().await = Some(Arc::new(index));
        info!(documents = documents_indexed, chunk_count, "corpus ingested");

        Ok(IngestReport { documents: documents_indexed, skipped_documents, chunks: chunk_count })
    }

    async fn current_index(&self) -> Result<Arc<Index>> {
        self.index.read().await.clone().ok_or(RagError::NotReady)
    }

    /// Retrieve context for `question` with the configured `top_k` and `min_score`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotReady`] before the first successful ingest.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        let index = self.current_index().await?;
        self.retriever.retrieve(&index, question, self.config.top_k, self.config.min_score).await
    }

    /// Answer a question from the ingested corpus.
    ///
    /// When nothing relevant is retrieved the answer has outcome
    /// [`AnswerOutcome::NoRelevantContext`](crate::AnswerOutcome::NoRelevantContext);
    /// that is a normal result, not an error.
    ///
    /// Dropping the returned future abandons the query; the index is
    /// unaffected.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotReady`] before the first successful ingest
    /// - [`RagError::EmbeddingServiceError`] / [`RagError::GenerationServiceError`]
    ///   after retries are exhausted
    pub async fn answer_query(&self, question: &str) -> Result<Answer> {
        let index = self.current_index().await?;

        if let Some(relay) = &self.relay {
            if let Err(e) = relay.publish(question).await {
                warn!(topic = relay.topic(), error = %e, "failed to relay question");
            }
        }

        let retrieval = self
            .retriever
            .retrieve(&index, question, self.config.top_k, self.config.min_score)
            .await?;
        self.synthesizer.synthesize(question, &retrieval, &self.prompt).await
    }

    /// Ingest `corpus` and answer `question` against it in one call.
    ///
    /// # Errors
    ///
    /// Any error from [`ingest`](Self::ingest) or [`answer_query`](Self::answer_query).
    pub async fn answer_over(&self, corpus: &[Document], question: &str) -> Result<Answer> {
        self.ingest(corpus).await?;
        self.answer_query(question).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding and generation providers are required; everything else has
/// a default. Call [`build()`](RagPipelineBuilder::build) to validate and
/// produce the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(config)
///     .embedding_provider(Arc::new(embedder))
///     .generation_provider(Arc::new(generator))
///     .relay(Arc::new(relay))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    index_backend: Option<Arc<dyn IndexBackend>>,
    prompt: Option<PromptSpec>,
    relay: Option<Arc<dyn QueryRelay>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Override the chunker (defaults to a [`FixedSizeChunker`] from the config).
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Override the index backend (defaults to the exact in-memory index).
    pub fn index_backend(mut self, backend: Arc<dyn IndexBackend>) -> Self {
        self.index_backend = Some(backend);
        self
    }

    /// Override the prompt (defaults to [`PromptSpec::from_config`]).
    pub fn prompt(mut self, prompt: PromptSpec) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Attach a relay that receives every question.
    pub fn relay(mut self, relay: Arc<dyn QueryRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a provider is missing or the
    /// configuration is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;

        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap))
        });

        let mut embedding_index = EmbeddingIndex::new(embedding_provider).with_config(&config);
        if let Some(backend) = self.index_backend {
            embedding_index = embedding_index.with_backend(backend);
        }
        let embedding_index = Arc::new(embedding_index);

        let synthesizer = AnswerSynthesizer::new(generation_provider)
            .with_retry(RetryPolicy::from_config(&config.retry));
        let prompt = self.prompt.unwrap_or_else(|| PromptSpec::from_config(&config));

        Ok(RagPipeline {
            retriever: Retriever::new(embedding_index.clone()),
            embedding_index,
            synthesizer,
            chunker,
            prompt,
            relay: self.relay,
            config,
            index: RwLock::new(None),
            ingest_lock: Mutex::new(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HashingEmbeddingProvider, MockGenerationProvider};

    #[test]
    fn builder_requires_providers() {
        let err = RagPipeline::builder()
            .embedding_provider(Arc::new(HashingEmbeddingProvider::new(8)))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let mut config = RagConfig::default();
        config.chunk_overlap = config.chunk_size;
        let result = RagPipeline::builder()
            .config(config)
            .embedding_provider(Arc::new(HashingEmbeddingProvider::new(8)))
            .generation_provider(Arc::new(MockGenerationProvider::new("x")))
            .build();
        assert!(matches!(result, Err(RagError::ConfigError(_))));
    }

    #[tokio::test]
    async fn starts_empty() {
        let pipeline = RagPipeline::builder()
            .embedding_provider(Arc::new(HashingEmbeddingProvider::new(8)))
            .generation_provider(Arc::new(MockGenerationProvider::new("x")))
            .build()
            .unwrap();
        assert_eq!(pipeline.state().await, PipelineState::Empty);
        assert_eq!(pipeline.indexed_chunks().await, None);
        assert!(matches!(pipeline.answer_query("q").await, Err(RagError::NotReady)));
        assert!(matches!(pipeline.retrieve("q").await, Err(RagError::NotReady)));
    }
}
