//! Conversation Store
//!
//! Durable, append-only message log per thread. Every `append_*` call is a
//! single atomic update: either all of its messages land or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};

/// Title given to threads created without one
pub const DEFAULT_THREAD_TITLE: &str = "New conversation";

/// Characters of the first user message kept in a derived title
pub const TITLE_PREVIEW_CHARS: usize = 50;

/// Maximum length of a user-supplied title
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum length of one user message
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Unique thread identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation thread
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    /// Unique identifier
    pub id: ThreadId,

    /// Display title (user-set or derived from the first message)
    pub title: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp, never earlier than any message
    pub updated_at: DateTime<Utc>,

    /// Messages in conversational order (empty in summary views)
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Thread {
    /// Create an empty thread
    pub fn new(title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ThreadId::new(),
            title: title.unwrap_or_else(|| DEFAULT_THREAD_TITLE.into()),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    /// Copy without message bodies
    pub fn summary(&self) -> Self {
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            messages: Vec::new(),
        }
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Update the activity timestamp, keeping it at or after the newest message
    pub fn touch(&mut self) {
        let newest = self.messages.iter().map(|m| m.created_at).max();
        let now = Utc::now();
        self.updated_at = match newest {
            Some(newest) if newest > now => newest,
            _ => now,
        };
    }

    /// Tool-call ids requested by assistant messages so far
    fn requested_call_ids(&self) -> HashSet<String> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls().iter().map(|c| c.id.clone()))
            .collect()
    }
}

/// Patch applied by [`ConversationStore::update_thread`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ThreadUpdate {
    pub title: Option<String>,
}

/// Title derived from a thread's first user message
pub fn derive_title(content: &str) -> String {
    let preview: String = content.chars().take(TITLE_PREVIEW_CHARS).collect();
    if content.chars().count() > TITLE_PREVIEW_CHARS {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Validate user message content
pub fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AgentError::Validation("Message content cannot be empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AgentError::Validation(format!(
            "Message content exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AgentError::Validation("Title cannot be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AgentError::Validation(format!(
            "Title exceeds {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

/// Check that a turn only holds assistant/tool messages and that every tool
/// result answers a call requested earlier in the thread or the turn itself.
fn validate_turn(thread: &Thread, messages: &[Message]) -> Result<()> {
    let mut requested = thread.requested_call_ids();

    for message in messages {
        match message.role {
            Role::Assistant => {
                requested.extend(message.tool_calls().iter().map(|c| c.id.clone()));
            }
            Role::Tool => {
                let id = message.tool_call_id().ok_or_else(|| {
                    AgentError::Validation("Tool message without tool_call_id".into())
                })?;
                if !requested.contains(id) {
                    return Err(AgentError::Validation(format!(
                        "Tool message answers unknown tool call {}",
                        id
                    )));
                }
            }
            other => {
                return Err(AgentError::Validation(format!(
                    "Turn messages must be assistant or tool messages, got {}",
                    other
                )));
            }
        }
    }

    Ok(())
}

/// Conversation store trait for persistence
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create an empty thread
    async fn create_thread(&self, title: Option<String>) -> Result<Thread>;

    /// Load a thread with its messages
    async fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>>;

    /// Thread summaries, most recently updated first
    async fn list_threads(&self, limit: usize, skip: usize) -> Result<Vec<Thread>>;

    /// Append the user message that opens a turn
    async fn append_user_message(&self, id: &ThreadId, content: &str) -> Result<Message>;

    /// Append the messages produced by one turn (or its completed prefix)
    async fn append_turn(&self, id: &ThreadId, messages: Vec<Message>) -> Result<()>;

    /// Apply a title patch
    async fn update_thread(&self, id: &ThreadId, update: ThreadUpdate) -> Result<Thread>;

    /// Delete a thread; `false` when it did not exist
    async fn delete_thread(&self, id: &ThreadId) -> Result<bool>;
}

/// In-memory conversation store (for development/testing)
pub struct MemoryConversationStore {
    threads: RwLock<HashMap<ThreadId, Thread>>,
}

impl Default for MemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_thread(&self, title: Option<String>) -> Result<Thread> {
        let title = title.as_deref().map(validate_title).transpose()?;

        let thread = Thread::new(title);
        self.threads.write().await.insert(thread.id.clone(), thread.clone());
        tracing::info!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    async fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>> {
        Ok(self.threads.read().await.get(id).cloned())
    }

    async fn list_threads(&self, limit: usize, skip: usize) -> Result<Vec<Thread>> {
        let threads = self.threads.read().await;
        let mut result: Vec<&Thread> = threads.values().collect();

        // Sort by updated_at descending
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(result
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(Thread::summary)
            .collect())
    }

    async fn append_user_message(&self, id: &ThreadId, content: &str) -> Result<Message> {
        validate_content(content)?;

        let mut threads = self.threads.write().await;
        let thread = threads.get_mut(id).ok_or_else(|| {
            tracing::warn!(thread_id = %id, "Thread not found when adding message");
            AgentError::ThreadNotFound(id.to_string())
        })?;

        let message = Message::user(content).with_thread(id.clone());
        if thread.messages.is_empty() {
            thread.title = derive_title(content);
            tracing::debug!(thread_id = %id, title = %thread.title, "Derived thread title");
        }
        thread.messages.push(message.clone());
        thread.touch();

        tracing::debug!(thread_id = %id, "Added user message");
        Ok(message)
    }

    async fn append_turn(&self, id: &ThreadId, messages: Vec<Message>) -> Result<()> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(id)
            .ok_or_else(|| AgentError::ThreadNotFound(id.to_string()))?;

        if messages.is_empty() {
            return Ok(());
        }
        validate_turn(thread, &messages)?;

        let count = messages.len();
        thread
            .messages
            .extend(messages.into_iter().map(|m| m.with_thread(id.clone())));
        thread.touch();

        tracing::debug!(thread_id = %id, count, "Appended turn messages");
        Ok(())
    }

    async fn update_thread(&self, id: &ThreadId, update: ThreadUpdate) -> Result<Thread> {
        let title = match update.title {
            Some(title) => validate_title(&title)?,
            None => {
                tracing::warn!(thread_id = %id, "No update fields provided");
                return Err(AgentError::Validation("No update fields provided".into()));
            }
        };

        let mut threads = self.threads.write().await;
        let thread = threads.get_mut(id).ok_or_else(|| {
            tracing::warn!(thread_id = %id, "Thread not found when updating");
            AgentError::ThreadNotFound(id.to_string())
        })?;

        thread.title = title;
        thread.touch();
        tracing::info!(thread_id = %id, "Updated thread");
        Ok(thread.clone())
    }

    async fn delete_thread(&self, id: &ThreadId) -> Result<bool> {
        let removed = self.threads.write().await.remove(id).is_some();
        if removed {
            tracing::info!(thread_id = %id, "Deleted thread");
        } else {
            tracing::warn!(thread_id = %id, "Attempted to delete missing thread");
        }
        Ok(removed)
    }
}
