//! Text extraction step
//!
//! Turns raw OCR text into a reply the label parser can read. The HTTP
//! implementation talks to any OpenAI-compatible chat completions endpoint;
//! without one configured, OCR text goes to the parser unchanged.

use crate::error::CaptureError;
use async_trait::async_trait;
use pantry_core::config::CaptureConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// Extraction endpoint timeout
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw text + prompt in, free-form reply out
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Ask for structured fields in `text`
    async fn extract(&self, text: &str, prompt: &str) -> Result<String, CaptureError>;
}

/// Hands OCR text straight to the parser
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExtractor;

#[async_trait]
impl TextExtractor for PassthroughExtractor {
    async fn extract(&self, text: &str, _prompt: &str) -> Result<String, CaptureError> {
        Ok(text.to_string())
    }
}

/// Chat completions client used as the extraction model
#[derive(Clone)]
pub struct ChatCompletionsExtractor {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsExtractor {
    /// Create a client for a full endpoint URL (`.../v1/chat/completions`)
    pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Result<Self, CaptureError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(EXTRACTION_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Model name sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, text: &'a str, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        }
    }
}

#[async_trait]
impl TextExtractor for ChatCompletionsExtractor {
    #[instrument(skip_all, fields(model = %self.model, chars = text.len()))]
    async fn extract(&self, text: &str, prompt: &str) -> Result<String, CaptureError> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .client
            .post(&self.url)
            .header(X_REQUEST_ID, &request_id)
            .json(&self.request_body(text, prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CaptureError::ExtractionResponse {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let reply = parse_reply(&body)?;
        debug!(request_id = %request_id, chars = reply.len(), "Extraction reply received");
        Ok(reply)
    }
}

impl std::fmt::Debug for ChatCompletionsExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsExtractor")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Build the configured extractor: HTTP when an endpoint is set, passthrough otherwise
pub fn extractor_from_config(config: &CaptureConfig) -> Result<Arc<dyn TextExtractor>, CaptureError> {
    match &config.extraction_url {
        Some(url) => Ok(Arc::new(ChatCompletionsExtractor::new(
            url.clone(),
            config.extraction_model.clone(),
            config.extraction_api_key.clone(),
        )?)),
        None => Ok(Arc::new(PassthroughExtractor)),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

fn parse_reply(body: &[u8]) -> Result<String, CaptureError> {
    let response: ChatResponse =
        serde_json::from_slice(body).map_err(|e| CaptureError::Extraction(format!("invalid response: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CaptureError::Extraction("response contained no message".to_string()))
}
