//! Generation provider trait for completing grounded prompts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// The fully rendered prompt.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature; zero asks the service for its most deterministic output.
    pub temperature: f32,
}

/// A text-generation service.
///
/// At temperature zero the same prompt should yield the same completion,
/// modulo whatever nondeterminism the service itself does not rule out.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Complete the prompt and return the generated text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Identify the model used for generation.
    fn model_id(&self) -> &str;
}
