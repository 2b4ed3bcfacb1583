//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction, a streaming
//! tool-calling loop, and conversation persistence.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           ChatService                            │
//! │  ┌──────────────┐   ┌──────────────────────────┐   ┌──────────┐  │
//! │  │ Conversation │   │          Agent           │   │  Frame   │  │
//! │  │    Store     │◄──│  Reasoning Loop          │──►│ Encoder  │  │
//! │  └──────────────┘   │   ├── LlmProvider        │   └──────────┘  │
//! │                     │   └── ToolRegistry       │                 │
//! │                     └──────────────────────────┘                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between OpenAI-compatible
//! endpoints, local servers, or test doubles without changing agent logic.

pub mod assembly;
pub mod chat;
pub mod error;
pub mod frame;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod store;
pub mod tool;

#[cfg(test)]
mod test_support;

pub use chat::{ChatService, FrameStream};
pub use error::{AgentError, Result};
pub use frame::Frame;
pub use message::{Message, Role};
pub use provider::{LlmProvider, StreamEvent};
pub use reasoning::{Agent, AgentBuilder, AgentEvent};
pub use store::{ConversationStore, MemoryConversationStore, Thread, ThreadId, ThreadUpdate};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
