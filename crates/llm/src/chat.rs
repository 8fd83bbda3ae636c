//! Canonical chat-completion shape shared by every backend.
//!
//! Every outgoing request and incoming response is expressed in these types
//! before the [`crate::adapter::LlmAdapter`] (if one is configured for the
//! active model) reshapes it to and from the backend's own wire format.

use serde::{Deserialize, Serialize};

/// Role of a single message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting, when the backend reports it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(alias = "prompt_tokens", alias = "input_tokens", default)]
    pub input_tokens: u32,
    #[serde(alias = "completion_tokens", alias = "output_tokens", default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
    Other,
}

/// The canonical request shape handed to a model's adapter (if any), or
/// serialized directly to the wire when no adapter is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    /// Free-form per-deployment overrides (`gpt_options` in the config file),
    /// shallow-merged into the outgoing wire body after adapter translation.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// The canonical response shape an adapter (or the default OpenAI-shaped
/// parser) produces from a non-streaming backend reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

/// One piece of a streaming response, after adapter translation.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// A text delta to append to the in-flight assistant message.
    Delta(String),
    /// The backend signalled the stream is complete (`[DONE]` or equivalent).
    Done,
}
