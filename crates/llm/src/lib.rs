//! Canonical chat-completion client for the single LLM backend this
//! middleware is configured against, plus the script-driven adapter layer
//! that reshapes requests/responses to that backend's wire format.

pub mod adapter;
pub mod auth;
pub mod chat;
pub mod client;
pub mod error;
pub mod outbound;

pub use adapter::LlmAdapter;
pub use chat::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, StreamChunk};
pub use client::{LlmClient, LlmConfig, SharedLlmClient};
pub use error::LLMError;
