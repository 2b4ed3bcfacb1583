//! Application State

use std::sync::Arc;

use agent_core::{ChatService, LlmProvider};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Conversation operations and streaming turns
    pub chat: Arc<ChatService>,

    /// LLM provider, for health and model listing
    pub provider: Arc<dyn LlmProvider>,
}
