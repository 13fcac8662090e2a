//! Completion gateway.
//!
//! [`CompletionGateway`] is the single capability the rest of the system
//! needs from a language model: prompt in, raw reply text out.  [`LlmClient`]
//! implements it against an OpenAI-compatible **Chat Completions** endpoint
//! (DeepSeek by default).
//!
//! The client makes exactly one attempt per call.  There is no retry and no
//! streaming; callers decide how to degrade on failure.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{AgentError, Result};
use crate::llm::types::{ChatCompletion, ChatRequest, Message};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default completion budget.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials containing this marker are treated as unset.
const PLACEHOLDER_MARKER: &str = "placeholder";

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// A text-completion capability.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Send `prompt` as a single user turn and return the model's raw reply.
    ///
    /// # Errors
    ///
    /// - [`AgentError::UpstreamUnavailable`] when no usable credential is set
    ///   (no network call is made).
    /// - [`AgentError::UpstreamError`] on transport failure or non-success status.
    /// - [`AgentError::UpstreamMalformed`] when a success response has no usable choice.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Connection settings for the completion endpoint (the `[llm]` config section).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmClientConfig {
    /// Base URL; the client appends `/chat/completions`.
    pub base_url: String,
    /// Bearer credential.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model_name: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            model_name: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for LlmClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmClientConfig {
    /// Configuration for an OpenAI-compatible endpoint at `base_url`.
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: Some(api_key.into()),
            model_name: model.into(),
            ..Self::default()
        }
    }

    /// The credential, if it is present, non-blank, and not a placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.contains(PLACEHOLDER_MARKER))
    }

    /// Whether [`usable_api_key`](Self::usable_api_key) would return a value.
    pub fn has_usable_api_key(&self) -> bool {
        self.usable_api_key().is_some()
    }

    /// Full URL of the chat-completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client.
    ///
    /// A missing credential is accepted here; it is reported on every
    /// [`complete`](CompletionGateway::complete) call instead.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::UpstreamError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    /// Whether the client holds a usable credential.
    pub fn is_configured(&self) -> bool {
        self.config.has_usable_api_key()
    }

    /// Build the request body for a single-turn prompt.
    pub fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![Message::user(prompt)],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Send the request to the chat-completions endpoint.
    async fn send(&self, api_key: &str, request: &ChatRequest) -> Result<reqwest::Response> {
        let url = self.config.endpoint();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                AgentError::UpstreamError {
                    reason: format!("invalid authorization header: {e}"),
                }
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        debug!(url = %url, model = %request.model, "sending completion request");

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .json(request)
            .send()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl CompletionGateway for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        info!(prompt_len = prompt.chars().count(), "calling completion endpoint");

        let Some(api_key) = self.config.usable_api_key() else {
            error!("completion API key is not configured");
            return Err(AgentError::UpstreamUnavailable {
                reason: "API key is not configured; set DEEPSEEK_API_KEY".into(),
            });
        };

        let request = self.build_request(prompt);
        let resp = self.send(api_key, &request).await?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| AgentError::UpstreamError {
            reason: format!("failed to read response body: {e}"),
        })?;

        info!(status = %status, "completion endpoint responded");

        if !status.is_success() {
            error!(status = %status, body = %text, "completion endpoint returned an error status");
            return Err(AgentError::UpstreamError {
                reason: format!("API returned {status}: {text}"),
            });
        }

        debug!(body = %text, "completion response body");
        parse_completion(&text)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract the first choice's text from a success response body.
pub fn parse_completion(body: &str) -> Result<String> {
    let completion: ChatCompletion =
        serde_json::from_str(body).map_err(|e| AgentError::UpstreamMalformed {
            reason: format!("invalid JSON envelope: {e}"),
        })?;

    if completion.choices.is_empty() {
        error!("completion response carried no choices");
        return Err(AgentError::UpstreamMalformed {
            reason: "response contained no choices".into(),
        });
    }

    let content = completion
        .first_content()
        .ok_or_else(|| AgentError::UpstreamMalformed {
            reason: "first choice carried no message content".into(),
        })?;

    if let Some(usage) = &completion.usage {
        debug!(
            prompt_tokens = ?usage.prompt_tokens,
            completion_tokens = ?usage.completion_tokens,
            total_tokens = ?usage.total_tokens,
            cache_hit = ?usage.prompt_cache_hit_tokens,
            cache_miss = ?usage.prompt_cache_miss_tokens,
            "completion token usage"
        );
    }

    info!(content_len = content.chars().count(), "completion call succeeded");
    Ok(content.to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
