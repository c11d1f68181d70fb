//! Document chunking.
//!
//! [`split`] cuts a document into fixed-size character windows where each
//! window starts `chunk_size - overlap` characters after the previous one.
//! Consecutive chunks therefore share exactly `overlap` characters, and only
//! the final chunk may be shorter than `chunk_size`.
//!
//! Sizes are counted in Unicode scalar values, not bytes, so multi-byte text
//! never splits inside a character.

use std::collections::HashSet;
use std::iter;

use tracing::warn;

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations must be pure: the same document always yields the same
/// chunk sequence.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyInput`] when the document has no extractable
    /// text, or [`RagError::InvalidParameter`] when the chunker is misconfigured.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use filing_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(1000, 200);
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// The configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The configured overlap.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        split(document, self.chunk_size, self.chunk_overlap)
    }
}

/// Split `document` into overlapping chunks of at most `chunk_size` characters.
///
/// # Errors
///
/// - [`RagError::InvalidParameter`] if `chunk_size == 0` or `overlap >= chunk_size`
/// - [`RagError::EmptyInput`] if the document text is empty or whitespace only
pub fn split(document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(RagError::InvalidParameter("chunk_size must be greater than zero".into()));
    }
    if overlap >= chunk_size {
        return Err(RagError::InvalidParameter(format!(
            "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    let text = document.text.as_str();
    if text.trim().is_empty() {
        return Err(RagError::EmptyInput { document_id: document.id.clone() });
    }

    // Byte offset of every character boundary, including the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(iter::once(text.len())).collect();
    let char_count = boundaries.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::with_capacity(char_count / step + 1);
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        let chunk_text = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(document, chunks.len(), start, end, chunk_text));
        if end == char_count {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Chunks of a whole corpus plus the documents skipped for having no text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusChunks {
    /// Chunks of every usable document, in corpus order.
    pub chunks: Vec<Chunk>,
    /// Ids of documents with no extractable text.
    pub skipped: Vec<String>,
}

/// Chunk every document of a corpus with `chunker`.
///
/// Documents without extractable text are skipped with a warning rather
/// than failing the corpus. Document ids must be unique, since chunk ids
/// are derived from them.
///
/// # Errors
///
/// - [`RagError::InvalidParameter`] if two documents share an id, or the
///   chunker is misconfigured
pub fn chunk_corpus(chunker: &dyn Chunker, documents: &[Document]) -> Result<CorpusChunks> {
    let mut seen = HashSet::with_capacity(documents.len());
    if let Some(duplicate) = documents.iter().find(|doc| !seen.insert(doc.id.as_str())) {
        let message = format!("duplicate document id '{}'", duplicate.id);
        return Err(RagError::InvalidParameter(message));
    }

    let mut corpus = CorpusChunks::default();
    for document in documents {
        match chunker.chunk(document) {
            Ok(chunks) => corpus.chunks.extend(chunks),
            Err(RagError::EmptyInput { document_id }) => {
                warn!(document.id = %document_id, "skipping document with no extractable text");
                corpus.skipped.push(document_id);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(corpus)
}

fn make_chunk(document: &Document, index: usize, start: usize, end: usize, text: &str) -> Chunk {
    let mut metadata = document.metadata.clone();
    metadata.insert("chunk_index".to_string(), index.to_string());
    Chunk {
        id: format!("{}_{index}", document.id),
        document_id: document.id.clone(),
        index,
        start,
        end,
        text: text.to_string(),
        metadata,
        source_uri: document.source_uri.clone(),
    }
}
