//! LLM integration layer.
//!
//! - [`types`] -- Wire types for the chat-completions endpoint.
//! - [`client`] -- The [`CompletionGateway`] trait and its HTTP implementation.

pub mod client;
pub mod types;

pub use client::{CompletionGateway, LlmClient, LlmClientConfig};
pub use types::{ChatCompletion, ChatRequest, Choice, ChoiceMessage, Message, Role, Usage};
