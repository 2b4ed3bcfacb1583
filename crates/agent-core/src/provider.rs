//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers (OpenAI-compatible
//! endpoints, local servers, test doubles) allowing the agent to work with
//! any backend without code changes.
//!
//! A provider streams one model call as an ordered sequence of
//! [`StreamEvent::Delta`] fragments followed by exactly one
//! [`StreamEvent::Completed`] carrying the assembled message. Partial
//! tool-call arguments never leave the provider; see
//! [`crate::assembly::CompletionAssembler`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, GenerationOptions};
//!
//! let mut stream = provider.complete_stream(&messages, &tools, &options).await?;
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         StreamEvent::Delta(text) => print!("{}", text),
//!         StreamEvent::Completed(completion) => break,
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use futures::Stream;

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4o-mini", "qwen2.5")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate (provider default when unset)
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 { 0.7 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Finalized result of one streamed model call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// Concatenation of every streamed fragment
    pub content: String,

    /// Fully assembled tool calls, in the order the model requested them
    pub tool_calls: Vec<ToolCall>,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Convert into the assistant message appended to the turn buffer
    pub fn into_message(self) -> Message {
        let tokens = self.usage.as_ref().map(|u| u.completion_tokens);
        Message::assistant_with_tool_calls(self.content, self.tool_calls)
            .with_model(self.model, tokens)
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason` string
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolUse,
            "content_filter" => FinishReason::ContentFilter,
            "error" => FinishReason::Error,
            _ => FinishReason::Stop,
        }
    }
}

/// One event of a streamed model call
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// Incremental text fragment
    Delta(String),

    /// Final assembled message; always the last event
    Completed(Completion),
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Stream a completion for `messages`, offering `tools` for function calling
    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}
