//! # filing-rag
//!
//! Retrieval-augmented question answering over long financial filings.
//!
//! ## Overview
//!
//! Documents are split into overlapping chunks, embedded and indexed once per
//! corpus. Each question is embedded with the same model, the best-matching
//! chunks are retrieved, and a generation service answers from those chunks
//! only. Every [`Answer`] carries the exact chunks that were placed in the
//! prompt, with document provenance.
//!
//! - [`chunking`]: [`FixedSizeChunker`] and [`split`]
//! - [`index`]: [`EmbeddingIndex`] builds and queries an immutable [`Index`]
//! - [`retriever`]: top-k plus minimum-score policy
//! - [`synthesizer`]: context budgeting, prompt rendering, generation
//! - [`pipeline`]: the [`RagPipeline`] state machine (`Empty` → `Ready`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use filing_rag::{Document, RagConfig, RagPipeline, ServiceConfig};
//! use filing_rag::openai::{OpenAIEmbeddingProvider, OpenAIGenerationProvider};
//!
//! let service = ServiceConfig::from_env()?;
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::new(&service)?))
//!     .generation_provider(Arc::new(OpenAIGenerationProvider::new(&service)?))
//!     .build()?;
//!
//! pipeline.ingest(&[Document::new("aapl-10k", filing_text)]).await?;
//! let answer = pipeline.answer_query("What are Apple's key risks?").await?;
//! ```
//!
//! ## Features
//!
//! - `openai` (default): OpenAI-compatible embedding and chat providers

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod inmemory;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod relay;
pub mod retriever;
pub mod retry;
pub mod synthesizer;
pub mod vectorstore;

pub use chunking::{Chunker, CorpusChunks, FixedSizeChunker, chunk_corpus, split};
pub use config::{RagConfig, RagConfigBuilder, RetryConfig, ServiceConfig};
pub use document::{Answer, AnswerOutcome, Chunk, Document, RetrievalResult, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{CompletionRequest, GenerationProvider};
pub use index::{EmbeddingIndex, Index};
pub use inmemory::{FlatIndex, FlatIndexBackend};
pub use mock::{HashingEmbeddingProvider, MockGenerationProvider};
#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbeddingProvider, OpenAIGenerationProvider};
pub use pipeline::{IngestReport, PipelineState, RagPipeline, RagPipelineBuilder};
pub use prompt::PromptSpec;
pub use relay::{ChannelRelay, QueryRelay, RelayedQuery};
pub use retriever::Retriever;
pub use retry::RetryPolicy;
pub use synthesizer::AnswerSynthesizer;
pub use vectorstore::{IndexBackend, IndexEntry, Similarity, VectorIndex};
