//! Chat Service
//!
//! Drives a turn end to end: validate and store the user message, run the
//! agent over the stored history in its own task, stream frames to the
//! caller, then persist the completed messages before the terminal frame.
//!
//! Cancellation comes from two places. A root token (server shutdown) is
//! shared by every turn through child tokens, and a closed receiver means
//! the client went away. Either way the agent stream is dropped, which
//! cancels the in-flight model call, and only whole messages are stored.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::frame::{self, Frame};
use crate::message::Message;
use crate::reasoning::{Agent, AgentEvent};
use crate::store::{validate_content, ConversationStore, Thread, ThreadId, ThreadUpdate};

/// Frames of one streaming turn, terminal frame last
pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

const FRAME_BUFFER: usize = 64;

/// Conversation operations plus the streaming turn entry point
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    agent: Arc<Agent>,
    shutdown: CancellationToken,
}

impl ChatService {
    pub fn new(store: Arc<dyn ConversationStore>, agent: Arc<Agent>) -> Self {
        Self {
            store,
            agent,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `token` as the root cancellation for every turn
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn create_thread(&self, title: Option<String>) -> Result<Thread> {
        self.store.create_thread(title).await
    }

    pub async fn list_threads(&self, limit: usize, skip: usize) -> Result<Vec<Thread>> {
        self.store.list_threads(limit, skip).await
    }

    pub async fn get_thread(&self, id: &ThreadId) -> Result<Thread> {
        self.store
            .get_thread(id)
            .await?
            .ok_or_else(|| AgentError::ThreadNotFound(id.to_string()))
    }

    pub async fn messages(&self, id: &ThreadId) -> Result<Vec<Message>> {
        Ok(self.get_thread(id).await?.messages)
    }

    pub async fn update_thread(&self, id: &ThreadId, update: ThreadUpdate) -> Result<Thread> {
        self.store.update_thread(id, update).await
    }

    pub async fn delete_thread(&self, id: &ThreadId) -> Result<()> {
        if self.store.delete_thread(id).await? {
            Ok(())
        } else {
            Err(AgentError::ThreadNotFound(id.to_string()))
        }
    }

    /// Start a turn for `content` on thread `id`
    ///
    /// Request errors (unknown thread, invalid content) are returned here,
    /// before anything is stored or streamed. Everything after that is
    /// reported through the frame stream.
    pub async fn send_message(&self, id: &ThreadId, content: &str) -> Result<FrameStream> {
        validate_content(content)?;
        self.store.append_user_message(id, content).await?;
        let history = self.get_thread(id).await?.messages;

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let turn = Turn {
            store: Arc::clone(&self.store),
            agent: Arc::clone(&self.agent),
            thread_id: id.clone(),
            cancel: self.shutdown.child_token(),
        };
        tokio::spawn(turn.run(history, tx));

        Ok(Box::pin(frame::terminated(ReceiverStream::new(rx))))
    }
}

struct Turn {
    store: Arc<dyn ConversationStore>,
    agent: Arc<Agent>,
    thread_id: ThreadId,
    cancel: CancellationToken,
}

impl Turn {
    async fn run(self, history: Vec<Message>, tx: mpsc::Sender<Frame>) {
        let mut events = self.agent.run_turn(history);
        let mut produced: Vec<Message> = Vec::new();

        // None: nobody is listening any more
        let terminal = loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    tracing::info!(thread_id = %self.thread_id, "Turn cancelled by shutdown");
                    break Some(Frame::Error("The server is shutting down.".into()));
                }
                () = tx.closed() => {
                    tracing::info!(thread_id = %self.thread_id, "Client disconnected mid-turn");
                    break None;
                }
                event = events.next() => match event {
                    Some(AgentEvent::Message(message)) => produced.push(message),
                    Some(event) => match Frame::from_event(event) {
                        Some(frame) if frame.is_terminal() => break Some(frame),
                        Some(frame) => {
                            if tx.send(frame).await.is_err() {
                                break None;
                            }
                        }
                        None => {}
                    },
                    None => break Some(Frame::Error("The turn ended unexpectedly.".into())),
                },
            }
        };

        // Drops any in-flight model call or tool invocation
        drop(events);

        let count = produced.len();
        if let Err(e) = self.store.append_turn(&self.thread_id, produced).await {
            tracing::error!(
                thread_id = %self.thread_id,
                messages = count,
                error = %e,
                "Failed to persist turn"
            );
        } else {
            tracing::debug!(thread_id = %self.thread_id, messages = count, "Turn persisted");
        }

        if let Some(frame) = terminal {
            let _ = tx.send(frame).await;
        }
    }
}
