//! Boundary client for the external vision-analysis service.
//!
//! The service is consumed as an opaque function: image bytes in, structured
//! JSON out. [`AnalysisClient`] is the seam the executor depends on;
//! [`VisionClient`] is the production implementation speaking the OpenAI
//! chat-completions vision dialect. Tests substitute their own impls.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

/// Failure classes of one analysis call.
///
/// The two variants share the same retry budget but are logged distinctly:
/// transport failures are expected operational noise, malformed responses
/// point at prompt or model regressions.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Connect/timeout/5xx/rate-limit — the request never produced a usable
    /// response body.
    #[error("transport: {0}")]
    Transport(String),

    /// The service answered, but the content was not the expected JSON.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// One synchronous analysis call against the external service.
#[async_trait]
pub trait AnalysisClient: Send + Sync + 'static {
    async fn analyze(&self, image: &[u8]) -> Result<Value, AnalysisError>;
}

/// Connection settings for [`VisionClient`].
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Bearer token for the service.
    pub api_key: String,
    /// Model name sent with each request.
    pub model: String,
    /// Instruction sent alongside the image.
    pub prompt: String,
    pub max_tokens: u32,
    /// Client-side request timeout; the executor's soft limit sits above this.
    pub request_timeout: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_owned(),
            api_key: String::new(),
            model: "gpt-4o".to_owned(),
            prompt: "Return JSON document with data. Only return JSON not other text".to_owned(),
            max_tokens: 500,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Production client: base64 data-URL upload, single POST, JSON extraction.
pub struct VisionClient {
    http: reqwest::Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnalysisError::Transport(format!("client build failed: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl AnalysisClient for VisionClient {
    async fn analyze(&self, image: &[u8]) -> Result<Value, AnalysisError> {
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(image));
        let body = json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": self.config.prompt },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }],
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Transport(format!(
                "service returned {status}"
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Malformed(format!("response body: {e}")))?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AnalysisError::Malformed("missing message content".to_owned()))?;

        debug!(model = %self.config.model, bytes = image.len(), "analysis call completed");
        parse_content(content)
    }
}

/// Parse the model's reply as JSON, tolerating Markdown code fences.
pub(crate) fn parse_content(content: &str) -> Result<Value, AnalysisError> {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();
    serde_json::from_str(trimmed)
        .map_err(|e| AnalysisError::Malformed(format!("content is not JSON: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
