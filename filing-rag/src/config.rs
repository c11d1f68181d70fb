//! Configuration for the RAG pipeline and the external services it calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Retry settings for calls to external model services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single backoff delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff_ms: 500, max_backoff_ms: 8_000 }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to retrieve per question.
    pub top_k: usize,
    /// Minimum similarity score; `None` keeps every result.
    pub min_score: Option<f32>,
    /// Maximum number of characters of rendered context sent to the model.
    pub max_context_chars: usize,
    /// Sampling temperature for answer generation.
    pub temperature: f32,
    /// Maximum number of tokens the model may generate per answer.
    pub max_answer_tokens: u32,
    /// Number of chunks sent per embedding request.
    pub embedding_batch_size: usize,
    /// Maximum embedding requests in flight during a build.
    pub max_concurrent_requests: usize,
    /// Retry policy for embedding and generation calls.
    pub retry: RetryConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            min_score: None,
            max_context_chars: 12_000,
            temperature: 0.0,
            max_answer_tokens: 500,
            embedding_batch_size: 64,
            max_concurrent_requests: 4,
            retry: RetryConfig::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".into()));
        }
        if let Some(min) = self.min_score {
            if min.is_nan() {
                return Err(RagError::ConfigError("min_score must be a number".into()));
            }
        }
        if self.max_context_chars == 0 {
            return Err(RagError::ConfigError("max_context_chars must be greater than zero".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be between 0 and 2",
                self.temperature
            )));
        }
        if self.max_answer_tokens == 0 {
            return Err(RagError::ConfigError("max_answer_tokens must be greater than zero".into()));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embedding_batch_size must be greater than zero".into(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(RagError::ConfigError(
                "max_concurrent_requests must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RagError::ConfigError("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from a file).
    pub fn from_config(config: RagConfig) -> Self {
        Self { config }
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity score for retrieved results.
    pub fn min_score(mut self, min_score: f32) -> Self {
        self.config.min_score = Some(min_score);
        self
    }

    /// Set the context budget in characters.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the maximum answer length in tokens.
    pub fn max_answer_tokens(mut self, tokens: u32) -> Self {
        self.config.max_answer_tokens = tokens;
        self
    }

    /// Set the number of chunks per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the maximum number of embedding requests in flight.
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.config.max_concurrent_requests = limit;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if, among others:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `temperature` is outside `0..=2`
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Default OpenAI-compatible API base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Output dimension of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
/// Default chat model for answer generation.
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

/// Credentials and endpoints for the embedding and generation services.
///
/// Constructed explicitly and passed to the service adapters; nothing reads
/// the environment behind the caller's back.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// API key sent as a bearer token. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Output dimension declared for the embedding model.
    pub embedding_dimensions: usize,
    /// Whether to ask the service for `embedding_dimensions`-sized output.
    /// Only models with adjustable output size accept the parameter.
    #[serde(default)]
    pub request_dimensions: bool,
    /// Chat model name.
    pub generation_model: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("request_dimensions", &self.request_dimensions)
            .field("generation_model", &self.generation_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a configuration with the given API key and default models.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("API key must not be empty".into()));
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            request_dimensions: false,
            generation_model: DEFAULT_GENERATION_MODEL.into(),
            request_timeout_secs: 60,
        })
    }

    /// Read the configuration from the process environment.
    ///
    /// `OPENAI_API_KEY` is required. `OPENAI_BASE_URL`,
    /// `FILING_RAG_EMBEDDING_MODEL`, `FILING_RAG_EMBEDDING_DIMENSIONS` and
    /// `FILING_RAG_GENERATION_MODEL` override the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the key is missing or an override
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENAI_API_KEY").ok_or_else(|| {
            RagError::ConfigError("OPENAI_API_KEY environment variable not set".into())
        })?;
        let mut config = Self::new(api_key)?;

        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = lookup("FILING_RAG_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(dims) = lookup("FILING_RAG_EMBEDDING_DIMENSIONS") {
            let dims = dims.parse().map_err(|_| {
                RagError::ConfigError(format!(
                    "FILING_RAG_EMBEDDING_DIMENSIONS must be a positive integer, got '{dims}'"
                ))
            })?;
            config = config.with_embedding_dimensions(dims);
        }
        if let Some(model) = lookup("FILING_RAG_GENERATION_MODEL") {
            config.generation_model = model;
        }
        config.validate()?;
        Ok(config)
    }

    /// Request embeddings of exactly `dims` dimensions.
    ///
    /// Supported by `text-embedding-3-*`; older models reject the parameter.
    pub fn with_embedding_dimensions(mut self, dims: usize) -> Self {
        self.embedding_dimensions = dims;
        self.request_dimensions = true;
        self
    }

    /// Check that every field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] on the first unusable field.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(RagError::ConfigError("API key must not be empty".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(RagError::ConfigError("base_url must not be empty".into()));
        }
        if self.embedding_model.trim().is_empty() || self.generation_model.trim().is_empty() {
            return Err(RagError::ConfigError("model names must not be empty".into()));
        }
        if self.embedding_dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding_dimensions must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
