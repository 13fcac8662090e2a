//! Wire types for the chat-completions endpoint.
//!
//! Requests are serialized exactly as the endpoint expects them; responses
//! are decoded tolerantly (unknown fields ignored, every field optional) so
//! that the client can tell a malformed envelope apart from a transport
//! failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Input from the human user.
    User,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat request
// ---------------------------------------------------------------------------

/// Body of `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The model identifier (e.g. `"deepseek-chat"`).
    pub model: String,

    /// The conversation; this service always sends a single user turn.
    pub messages: Vec<Message>,

    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum tokens the model may generate.
    pub max_tokens: u32,
}

// ---------------------------------------------------------------------------
// Chat response
// ---------------------------------------------------------------------------

/// Envelope returned by the chat-completions endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatCompletion {
    pub id: Option<String>,
    pub object: Option<String>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Text content of the first choice, if the envelope carries one.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
    }
}

/// One candidate completion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Choice {
    pub index: Option<u32>,
    pub message: Option<ChoiceMessage>,
    pub finish_reason: Option<String>,
}

/// The message inside a [`Choice`].  `content` may be null on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChoiceMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Usage tracking
// ---------------------------------------------------------------------------

/// Token usage information returned by the endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub prompt_tokens_details: Option<Value>,
    pub prompt_cache_hit_tokens: Option<u32>,
    pub prompt_cache_miss_tokens: Option<u32>,
}
