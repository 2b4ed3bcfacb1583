//! Stream Encoder
//!
//! Wire frames for a streaming turn. Each frame is serialized as
//! `data: <json>\n\n` with one of three payloads:
//!
//! ```text
//! {"content": "..."}   one model fragment
//! {"done": true}       turn completed
//! {"error": "..."}     turn aborted
//! ```
//!
//! [`terminated`] enforces the framing contract on any frame stream: exactly
//! one terminal frame, always last.

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

use crate::reasoning::AgentEvent;

/// One event frame of a streamed turn
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Done,
    Error(String),
}

impl Frame {
    /// Map a loop event; completed messages have no wire representation
    pub fn from_event(event: AgentEvent) -> Option<Self> {
        match event {
            AgentEvent::Delta(text) => Some(Frame::Content(text)),
            AgentEvent::Message(_) => None,
            AgentEvent::Done => Some(Frame::Done),
            AgentEvent::Failed(e) => Some(Frame::Error(e.user_message())),
        }
    }

    /// Whether this frame ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Frame::Content(_))
    }

    /// JSON payload carried by the frame
    pub fn payload(&self) -> Value {
        match self {
            Frame::Content(text) => json!({ "content": text }),
            Frame::Done => json!({ "done": true }),
            Frame::Error(message) => json!({ "error": message }),
        }
    }
}

/// Guarantee exactly one trailing terminal frame
///
/// Frames after the first terminal are discarded. If `frames` ends without
/// one, an error frame is appended.
pub fn terminated<S>(frames: S) -> impl Stream<Item = Frame> + Send
where
    S: Stream<Item = Frame> + Send + 'static,
{
    stream! {
        let mut frames = Box::pin(frames);
        let mut finished = false;

        while let Some(frame) = frames.next().await {
            let terminal = frame.is_terminal();
            yield frame;
            if terminal {
                finished = true;
                break;
            }
        }

        if !finished {
            tracing::warn!("Turn stream ended without a terminal frame");
            yield Frame::Error("The response stream ended unexpectedly.".into());
        }
    }
}
