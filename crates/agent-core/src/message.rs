//! Conversation Messages
//!
//! Standard message format used across the agent system. The role is fixed
//! when a message is constructed and never inferred afterwards.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::ThreadId;
use crate::tool::ToolCall;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions (never persisted)
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result, correlated to an assistant tool call
    Tool,
    /// Anything a backing store could not classify
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
            Role::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,

    /// Owning thread (stamped by the store on append)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,

    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Additional message metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Tool call ID (for tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Model that generated this (for assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Completion token count (if reported)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: None,
            role,
            content: content.into(),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool invocations
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        if !tool_calls.is_empty() {
            msg.metadata = Some(MessageMetadata {
                tool_calls,
                ..Default::default()
            });
        }
        msg
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.metadata = Some(MessageMetadata {
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        });
        msg
    }

    /// Attach the owning thread
    pub fn with_thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    /// Record which model produced this message
    pub fn with_model(mut self, model: impl Into<String>, tokens: Option<u32>) -> Self {
        let metadata = self.metadata.get_or_insert_with(MessageMetadata::default);
        metadata.model = Some(model.into());
        metadata.tokens = tokens;
        self
    }

    /// Tool call this message answers, if it is a tool result
    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.tool_call_id.as_deref())
    }

    /// Tool calls requested by this message
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.metadata.as_ref().map(|m| m.tool_calls.as_slice()).unwrap_or_default()
    }

    /// Whether the model asked for at least one tool invocation
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_call_id().is_none());
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_tool_message_carries_call_id() {
        let msg = Message::tool("[]", "call_1");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id(), Some("call_1"));
    }

    #[test]
    fn test_assistant_tool_calls() {
        let call = ToolCall::new("call_1", "search_phones", HashMap::new());
        let msg = Message::assistant_with_tool_calls("", vec![call]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls()[0].name, "search_phones");

        let plain = Message::assistant_with_tool_calls("hi", Vec::new());
        assert!(plain.metadata.is_none());
    }

    #[test]
    fn test_unknown_role_deserializes() {
        let role: Role = serde_json::from_str("\"narrator\"").unwrap();
        assert_eq!(role, Role::Unknown);
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
    }
}
