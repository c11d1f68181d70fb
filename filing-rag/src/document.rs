//! Data types for documents, chunks, retrieval results, and answers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key carrying the 1-based page a document (or chunk) came from.
pub const PAGE_KEY: &str = "page";

/// A parsed source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable identifier for the document.
    pub id: String,
    /// The extracted plain text of the document.
    pub text: String,
    /// Key-value metadata (filing form, ticker, page markers).
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new(), source_uri: None }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the URI of the original source.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }
}

/// A contiguous segment of a [`Document`].
///
/// `start` and `end` are character offsets into the parent document's text,
/// so `document.text.chars().skip(start).take(end - start)` reproduces `text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk (`{document_id}_{index}`).
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document, starting at zero.
    pub index: usize,
    /// Character offset of the first character of the chunk.
    pub start: usize,
    /// Character offset one past the last character of the chunk.
    pub end: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
    /// Source URI inherited from the parent document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Chunk {
    /// The page marker inherited from the parent document, if any.
    pub fn page(&self) -> Option<&str> {
        self.metadata.get(PAGE_KEY).map(String::as_str)
    }

    /// Human-readable provenance label, e.g. `aapl-10k (page 12)`.
    pub fn provenance(&self) -> String {
        match self.page() {
            Some(page) => format!("{} (page {page})", self.document_id),
            None => self.document_id.clone(),
        }
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Ordered retrieval output, descending by score, at most `k` entries.
///
/// An empty result is a valid "no relevant context" outcome, not a failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The hits, best first.
    pub hits: Vec<SearchResult>,
}

impl RetrievalResult {
    /// Wrap an already ordered list of hits.
    pub fn new(hits: Vec<SearchResult>) -> Self {
        Self { hits }
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True when nothing relevant was found.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Whether the given chunk id is part of this result.
    pub fn contains(&self, chunk_id: &str) -> bool {
        self.hits.iter().any(|hit| hit.chunk.id == chunk_id)
    }
}

/// Whether an [`Answer`] is grounded in retrieved context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The answer was generated from retrieved context.
    Grounded,
    /// Retrieval produced nothing usable; no generation call was made.
    NoRelevantContext,
}

/// A generated answer and the exact chunks that were given to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The question that was asked.
    pub question: String,
    /// The generated (or "no grounded answer") text.
    pub text: String,
    /// The chunks included in the prompt, in prompt order, with scores.
    pub sources: Vec<SearchResult>,
    /// Grounded or no relevant context.
    pub outcome: AnswerOutcome,
    /// Set when the top chunk alone exceeded the context budget and was cut.
    pub context_truncated: bool,
    /// Number of lower-scored hits dropped to fit the context budget.
    pub dropped_sources: usize,
}

impl Answer {
    /// Whether the answer is grounded in retrieved context.
    pub fn is_grounded(&self) -> bool {
        self.outcome == AnswerOutcome::Grounded
    }

    /// Distinct source document ids, in source order.
    pub fn cited_documents(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for source in &self.sources {
            let id = source.chunk.document_id.as_str();
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}
