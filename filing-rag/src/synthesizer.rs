//! Grounded answer synthesis.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::document::{Answer, AnswerOutcome, RetrievalResult};
use crate::error::Result;
use crate::generation::{CompletionRequest, GenerationProvider};
use crate::prompt::{PromptSpec, pack_context};
use crate::retry::RetryPolicy;

/// Builds a prompt from retrieved chunks and asks a [`GenerationProvider`] for an answer.
///
/// The returned [`Answer::sources`] are exactly the hits placed in the prompt,
/// never the full retrieval result when the budget forced some out.
pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationProvider>,
    retry: RetryPolicy,
}

impl AnswerSynthesizer {
    /// Create a synthesizer with the default retry policy.
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator, retry: RetryPolicy::default() }
    }

    /// Use a different retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Answer `question` from `retrieval`.
    ///
    /// An empty retrieval result short-circuits to an
    /// [`AnswerOutcome::NoRelevantContext`] answer without calling the service.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationServiceError`](crate::RagError::GenerationServiceError)
    /// once retries are exhausted or on a permanent service failure.
    pub async fn synthesize(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        spec: &PromptSpec,
    ) -> Result<Answer> {
        if retrieval.is_empty() {
            info!("no relevant context retrieved; returning ungrounded notice");
            return Ok(no_relevant_context(question, spec, 0));
        }

        let packed = pack_context(&retrieval.hits, spec.max_context_chars);
        let dropped_sources = retrieval.len() - packed.included;
        if packed.included == 0 {
            warn!(budget = spec.max_context_chars, "context budget admits no passage");
            return Ok(no_relevant_context(question, spec, dropped_sources));
        }
        if packed.truncated {
            warn!(
                budget = spec.max_context_chars,
                chunk = %retrieval.hits[0].chunk.id,
                "best chunk exceeds context budget; truncating its text"
            );
        } else if dropped_sources > 0 {
            debug!(dropped_sources, "dropped lowest-scored chunks to fit context budget");
        }

        let request = CompletionRequest {
            prompt: spec.render(question, &packed.text),
            max_tokens: spec.max_answer_tokens,
            temperature: spec.temperature,
        };

        let text = self
            .retry
            .run("complete", || self.generator.complete(&request))
            .await
            .map_err(|e| {
                error!(model = self.generator.model_id(), error = %e, "answer generation failed");
                e
            })?;

        let sources = retrieval.hits[..packed.included].to_vec();
        info!(
            source_count = sources.len(),
            dropped_sources,
            context_truncated = packed.truncated,
            "answer synthesized"
        );

        Ok(Answer {
            question: question.to_string(),
            text: text.trim().to_string(),
            sources,
            outcome: AnswerOutcome::Grounded,
            context_truncated: packed.truncated,
            dropped_sources,
        })
    }
}

fn no_relevant_context(question: &str, spec: &PromptSpec, dropped_sources: usize) -> Answer {
    Answer {
        question: question.to_string(),
        text: spec.no_answer_text.clone(),
        sources: Vec::new(),
        outcome: AnswerOutcome::NoRelevantContext,
        context_truncated: false,
        dropped_sources,
    }
}
