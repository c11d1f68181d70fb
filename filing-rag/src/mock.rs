//! Offline service implementations.
//!
//! [`HashingEmbeddingProvider`] is a deterministic bag-of-words embedder that
//! needs no network access; [`MockGenerationProvider`] returns scripted
//! completions and records every request it sees. Both are used throughout
//! the test suite and work for local demos without API keys.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{CompletionRequest, GenerationProvider};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it",
    "of", "on", "or", "that", "the", "this", "to", "was", "what", "which", "who", "why", "with",
];

/// Feature-hashing embedder over lower-cased word tokens.
///
/// Each token is hashed (FNV-1a) into one of `dimensions` buckets with a
/// hash-derived sign, and the resulting vector is L2-normalised, so cosine
/// similarity tracks shared vocabulary. A trailing plural `s` is stripped and
/// common stopwords are ignored.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    model_id: String,
    calls: Arc<AtomicUsize>,
}

impl HashingEmbeddingProvider {
    /// Create an embedder producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_id: format!("hashing-bow-{dimensions}"),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Override the reported model identifier.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Number of `embed` calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        embedding
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1)
        .map(|word| {
            let mut token = word.to_lowercase();
            if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
                token.pop();
            }
            token
        })
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// A scripted [`GenerationProvider`] for tests.
///
/// Queued results are returned first, in order; once the queue is empty every
/// call returns the default reply. All requests are recorded.
#[derive(Debug)]
pub struct MockGenerationProvider {
    reply: String,
    queued: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockGenerationProvider {
    /// Create a provider that always answers with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a one-off result to be returned before the default reply.
    pub fn with_queued(self, result: Result<String>) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(result);
        }
        self
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests
            .lock()
            .map_err(|_| RagError::generation("Mock", "request log poisoned"))?
            .push(request.clone());
        let next = self
            .queued
            .lock()
            .map_err(|_| RagError::generation("Mock", "queue poisoned"))?
            .pop_front();
        next.unwrap_or_else(|| Ok(self.reply.clone()))
    }

    fn model_id(&self) -> &str {
        "mock-generator"
    }
}
