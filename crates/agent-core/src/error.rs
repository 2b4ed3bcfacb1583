//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Referenced thread does not exist
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    /// Malformed request input (empty content, blank title, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Model transport failure or malformed model response
    #[error("Model error: {0}")]
    Model(String),

    /// Model endpoint unavailable, timed out or not responding
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Rate limited by the model endpoint
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Maximum model calls reached in one turn
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Durable append failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ModelUnavailable(_) | AgentError::RateLimited(_)
        )
    }

    /// Whether the error originates from the model client
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            AgentError::Model(_) | AgentError::ModelUnavailable(_) | AgentError::RateLimited(_)
        )
    }

    /// Whether the error must be reported before any side effect or stream
    pub fn is_request_error(&self) -> bool {
        matches!(self, AgentError::ThreadNotFound(_) | AgentError::Validation(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::ThreadNotFound(_) => "Thread not found".into(),
            AgentError::Validation(msg) => msg.clone(),
            AgentError::Model(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ModelUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::MaxIterations(_) => "The request took too many steps to process. Please try a simpler query.".into(),
            AgentError::Persistence(_) => "The conversation could not be saved.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
