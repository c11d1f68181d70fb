//! Error types for the `filing-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A caller supplied an out-of-range parameter (chunk size, overlap, `k`).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A document had no extractable text.
    #[error("Document '{document_id}' has no extractable text")]
    EmptyInput {
        /// The offending document.
        document_id: String,
    },

    /// There was nothing to index.
    #[error("Corpus is empty: no chunks to index")]
    EmptyCorpus,

    /// The embedding service failed or returned vectors that do not fit the index.
    #[error("Embedding service error ({provider}): {message}")]
    EmbeddingServiceError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether retrying the same request may succeed.
        transient: bool,
    },

    /// The generation service failed.
    #[error("Generation service error ({provider}): {message}")]
    GenerationServiceError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether retrying the same request may succeed.
        transient: bool,
    },

    /// A query was issued before any corpus was ingested.
    #[error("Pipeline is not ready: ingest a corpus before querying")]
    NotReady,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The out-of-band query relay rejected a message.
    #[error("Query relay error ({topic}): {message}")]
    RelayError {
        /// The relay topic.
        topic: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// Build a permanent embedding error.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingServiceError {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Build a transient embedding error (eligible for retry).
    pub fn embedding_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingServiceError {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Build a permanent generation error.
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationServiceError {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Build a transient generation error (eligible for retry).
    pub fn generation_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationServiceError {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Whether this error signals a temporary service condition worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingServiceError { transient: true, .. }
                | Self::GenerationServiceError { transient: true, .. }
        )
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_flagged_service_errors_are_transient() {
        assert!(RagError::embedding_transient("OpenAI", "timeout").is_transient());
        assert!(RagError::generation_transient("OpenAI", "429").is_transient());
        assert!(!RagError::embedding("OpenAI", "dimension mismatch").is_transient());
        assert!(!RagError::NotReady.is_transient());
        assert!(!RagError::InvalidParameter("k".into()).is_transient());
    }
}
