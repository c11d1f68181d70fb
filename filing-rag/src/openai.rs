//! OpenAI-compatible embedding and generation providers.
//!
//! This module is only available when the `openai` feature is enabled.
//! Both providers talk to the REST API directly with `reqwest` and are
//! configured from an explicit [`ServiceConfig`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ServiceConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{CompletionRequest, GenerationProvider};

const PROVIDER: &str = "OpenAI";

fn build_client(config: &ServiceConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))
}

fn endpoint(config: &ServiceConfig, path: &str) -> String {
    format!("{}/{path}", config.base_url.trim_end_matches('/'))
}

/// 429 and 5xx are worth retrying; other statuses are not.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-success response into a service error, keeping the API's message.
async fn status_error(
    response: reqwest::Response,
    make: fn(&str, String, bool) -> RagError,
) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    error!(provider = PROVIDER, %status, "API error");
    make(PROVIDER, format!("API returned {status}: {detail}"), is_transient_status(status))
}

fn embedding_error(provider: &str, message: String, transient: bool) -> RagError {
    RagError::EmbeddingServiceError { provider: provider.to_string(), message, transient }
}

fn generation_error(provider: &str, message: String, transient: bool) -> RagError {
    RagError::GenerationServiceError { provider: provider.to_string(), message, transient }
}

/// An [`EmbeddingProvider`] backed by the `/embeddings` endpoint.
///
/// The model and declared dimension come from [`ServiceConfig`]; the
/// dimension is also sent to the API so models with adjustable output size
/// return vectors of exactly that length.
///
/// # Example
///
/// ```rust,ignore
/// use filing_rag::{ServiceConfig, openai::OpenAIEmbeddingProvider};
///
/// let provider = OpenAIEmbeddingProvider::new(&ServiceConfig::from_env()?)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider from validated service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is unusable.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: build_client(config)?,
            url: endpoint(config, "embeddings"),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
            request_dimensions: config.request_dimensions.then_some(config.embedding_dimensions),
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                let transient = is_transient_transport(&e);
                embedding_error(PROVIDER, format!("request failed: {e}"), transient)
            })?;

        if !response.status().is_success() {
            return Err(status_error(response, embedding_error).await);
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(RagError::embedding(
                PROVIDER,
                format!("API returned {} embeddings for {} inputs", parsed.data.len(), texts.len()),
            ));
        }
        parsed.data.sort_by_key(|entry| entry.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// A [`GenerationProvider`] backed by the `/chat/completions` endpoint.
pub struct OpenAIGenerationProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAIGenerationProvider {
    /// Create a provider from validated service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is unusable.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: build_client(config)?,
            url: endpoint(config, "chat/completions"),
            api_key: config.api_key.clone(),
            model: config.generation_model.clone(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl GenerationProvider for OpenAIGenerationProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = request.prompt.len(),
            max_tokens = request.max_tokens,
            "requesting completion"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: &request.prompt }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                let transient = is_transient_transport(&e);
                generation_error(PROVIDER, format!("request failed: {e}"), transient)
            })?;

        if !response.status().is_success() {
            return Err(status_error(response, generation_error).await);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::generation(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::generation(PROVIDER, "API returned no completion"))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
