//! Scripted doubles shared by the unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{
    Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
    StreamEvent,
};
use crate::tool::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema};

/// One scripted model call
#[derive(Clone, Debug)]
pub(crate) enum Script {
    Reply { deltas: Vec<String>, tool_calls: Vec<ToolCall> },
    FailOpen(String),
    FailAfter { deltas: Vec<String>, error: String },
}

impl Script {
    pub(crate) fn text(deltas: &[&str]) -> Self {
        Script::Reply {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            tool_calls: Vec::new(),
        }
    }

    pub(crate) fn calls(text: &str, calls: &[(&str, &str, Value)]) -> Self {
        let tool_calls = calls
            .iter()
            .map(|(id, name, args)| {
                ToolCall::new(*id, *name, serde_json::from_value(args.clone()).unwrap())
            })
            .collect();
        let deltas = if text.is_empty() { Vec::new() } else { vec![text.to_string()] };
        Script::Reply { deltas, tool_calls }
    }

    pub(crate) fn fail(error: &str) -> Self {
        Script::FailOpen(error.to_string())
    }

    pub(crate) fn fail_after(deltas: &[&str], error: &str) -> Self {
        Script::FailAfter {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            error: error.to_string(),
        }
    }
}

/// Provider replaying scripts in order; the last script repeats forever
pub(crate) struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub(crate) fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Inputs received by each model call
    pub(crate) fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        self.seen.lock().unwrap().push(messages.to_vec());

        let events: Vec<Result<StreamEvent>> = match self.next_script() {
            Script::FailOpen(error) => return Err(AgentError::ModelUnavailable(error)),
            Script::FailAfter { deltas, error } => deltas
                .into_iter()
                .map(|d| Ok(StreamEvent::Delta(d)))
                .chain(std::iter::once(Err(AgentError::Model(error))))
                .collect(),
            Script::Reply { deltas, tool_calls } => {
                let finish_reason = if tool_calls.is_empty() {
                    FinishReason::Stop
                } else {
                    FinishReason::ToolUse
                };
                let completion = Completion {
                    content: deltas.concat(),
                    tool_calls,
                    model: options.model.clone(),
                    usage: None,
                    finish_reason: Some(finish_reason),
                };
                deltas
                    .into_iter()
                    .map(|d| Ok(StreamEvent::Delta(d)))
                    .chain(std::iter::once(Ok(StreamEvent::Completed(completion))))
                    .collect()
            }
        };

        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo { id: "scripted".into(), owned_by: None }])
    }
}

/// Tool that echoes its `text` argument and records every invocation
#[derive(Default)]
pub(crate) struct EchoTool {
    invocations: Arc<Mutex<Vec<String>>>,
}

impl EchoTool {
    pub(crate) fn invocations(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.invocations)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".into(),
            description: "Echo the text argument".into(),
            parameters: vec![ParameterSchema::new("text", "string", "Text to echo").required()],
            category: None,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let text = call
            .arguments
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        self.invocations.lock().unwrap().push(call.id.clone());
        Ok(ToolResult::success("echo", text))
    }
}

/// Tool that sleeps for `ms` milliseconds and records the calls that finished
#[derive(Default)]
pub(crate) struct NapTool {
    finished: Arc<Mutex<Vec<String>>>,
}

impl NapTool {
    pub(crate) fn finished(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.finished)
    }
}

#[async_trait]
impl Tool for NapTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "nap".into(),
            description: "Wait before answering".into(),
            parameters: vec![ParameterSchema::new("ms", "integer", "Milliseconds to wait")],
            category: None,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let ms = call.arguments.get("ms").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        self.finished.lock().unwrap().push(call.id.clone());
        Ok(ToolResult::success("nap", format!("slept {}ms", ms)))
    }
}
