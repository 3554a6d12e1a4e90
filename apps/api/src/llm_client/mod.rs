/// LLM Client — the single point of entry for all model calls in the service.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// The analysis pipeline depends only on the `ModelClient` trait, so tests swap in
/// a scripted client and never touch the network.
///
/// One request, one attempt: retries and timeouts are this collaborator's business,
/// and it performs no retries.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Default model identifier. Configurable via `LLM_MODEL`; it is part of every cache key.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// True for the "resource exhausted / rate limited" family.
    pub fn is_quota(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }
}

/// A model-agnostic request: one system instruction plus ordered content parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub model: String,
    pub system: String,
    pub parts: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// The outbound model collaborator. Returns the raw response text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// False when credentials are missing; callers short-circuit before any request.
    fn is_configured(&self) -> bool;

    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<AnthropicContent<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Concatenates every text block in order.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    message: String,
}

fn build_anthropic_request(request: &ModelRequest) -> AnthropicRequest<'_> {
    AnthropicRequest {
        model: &request.model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system: &request.system,
        messages: vec![AnthropicMessage {
            role: "user",
            content: request
                .parts
                .iter()
                .map(|part| AnthropicContent {
                    content_type: "text",
                    text: part,
                })
                .collect(),
        }],
    }
}

/// Maps a non-success response onto `LlmError`, separating quota exhaustion
/// (HTTP 429, 529 or a `rate_limit_error` body) from other API failures.
fn classify_error(status: u16, body: String) -> LlmError {
    let parsed = serde_json::from_str::<AnthropicError>(&body).ok();
    let is_rate_limit_body = parsed
        .as_ref()
        .and_then(|e| e.error.error_type.as_deref())
        .is_some_and(|t| t == "rate_limit_error" || t == "overloaded_error");
    let message = parsed.map(|e| e.error.message).unwrap_or(body);

    if status == 429 || status == 529 || is_rate_limit_body {
        LlmError::RateLimited { message }
    } else {
        LlmError::Api { status, message }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Makes a single call to the Messages API, returning the full response object.
    pub async fn call(&self, request: &ModelRequest) -> Result<LlmResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let request_body = build_anthropic_request(request);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_error(status.as_u16(), body);
            warn!("LLM API returned {}: {}", status, error);
            return Err(error);
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}, stop_reason={:?}",
            llm_response.usage.input_tokens,
            llm_response.usage.output_tokens,
            llm_response.stop_reason
        );

        Ok(llm_response)
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
        let response = self.call(request).await?;
        response.text().ok_or(LlmError::EmptyContent)
    }
}
