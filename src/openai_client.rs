use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::conversation::{ChatError, Message};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`OpenAiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Body of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Status and body of a provider response, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The outbound half of a conversation: one POST per call.
///
/// Implementations only report transport-level failures; status codes and
/// bodies are interpreted by [`parse_reply`].
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_chat(&self, api_key: &str, request: &ChatRequest)
        -> Result<RawResponse, ChatError>;
}

/// `reqwest`-backed transport for the OpenAI chat completions endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let endpoint = completions_endpoint(&config.base_url)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for OpenAiClient {
    async fn post_chat(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<RawResponse, ChatError> {
        debug!(
            endpoint = %self.endpoint,
            "Sending request to OpenAI API: {}",
            serde_json::to_string(request).unwrap_or_default()
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(status, "Received response from OpenAI API: {}", body);

        Ok(RawResponse { status, body })
    }
}

/// Joins `chat/completions` onto a base URL, tolerating a trailing slash.
fn completions_endpoint(base_url: &str) -> Result<Url> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    let base = Url::parse(&base).wrap_err_with(|| format!("Invalid base URL: {base_url}"))?;
    if !matches!(base.scheme(), "http" | "https") {
        eyre::bail!("Invalid base URL: {base_url} (expected http or https)");
    }
    base.join("chat/completions")
        .wrap_err_with(|| format!("Invalid base URL: {base_url}"))
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Turns a provider response into the reply text or a typed error.
pub fn parse_reply(response: RawResponse) -> Result<String, ChatError> {
    let success = response.is_success();
    let RawResponse { status, body } = response;

    if !success {
        error!(status, "API request failed with response: {}", body);
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| format!("HTTP {status}: {body}"));
        return Err(ChatError::Provider { status, message });
    }

    let parsed: CompletionResponse = serde_json::from_str(&body)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    let reply = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::MalformedResponse("response contained no choices".to_string()))?
        .message
        .content
        .unwrap_or_default();

    if reply.is_empty() {
        return Err(ChatError::MalformedResponse(
            "response contained no reply text".to_string(),
        ));
    }

    Ok(reply)
}
