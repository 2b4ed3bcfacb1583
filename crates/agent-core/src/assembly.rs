//! Completion Assembly
//!
//! Accumulates the pieces of one streamed model call: text fragments are
//! concatenated in arrival order, and tool-call fragments are merged per
//! call index until the stream ends. Argument text is only parsed at
//! [`CompletionAssembler::finish`], so a call is exposed to the loop only
//! once its arguments form a complete JSON object.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::provider::{Completion, FinishReason, TokenUsage};
use crate::tool::ToolCall;

#[derive(Clone, Debug, Default)]
struct ToolCallBuilder {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallBuilder {
    fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.arguments.is_empty()
    }

    fn finish(self) -> Result<Option<ToolCall>> {
        let Some(name) = self.name else {
            if !self.arguments.is_empty() {
                tracing::warn!(arguments = %self.arguments, "Dropping tool call fragment without a name");
            }
            return Ok(None);
        };

        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));

        let raw = self.arguments.trim();
        let arguments = if raw.is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(AgentError::Model(format!(
                        "arguments for tool call '{}' are not an object: {}",
                        name, other
                    )));
                }
                Err(e) => {
                    return Err(AgentError::Model(format!(
                        "malformed arguments for tool call '{}': {}",
                        name, e
                    )));
                }
            }
        };

        Ok(Some(ToolCall::new(id, name, arguments.into_iter().collect())))
    }
}

/// Builder for a [`Completion`] fed by streaming fragments
#[derive(Debug)]
pub struct CompletionAssembler {
    model: String,
    content: String,
    tool_calls: Vec<ToolCallBuilder>,
    usage: Option<TokenUsage>,
    finish_reason: Option<FinishReason>,
}

impl CompletionAssembler {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: String::new(),
            tool_calls: Vec::new(),
            usage: None,
            finish_reason: None,
        }
    }

    /// Append a text fragment
    pub fn push_content(&mut self, fragment: &str) {
        self.content.push_str(fragment);
    }

    /// Merge a tool-call fragment into the call at `index`
    ///
    /// `id` and `name` replace earlier values when present; `arguments`
    /// is appended to whatever text the call already has.
    pub fn push_tool_call_delta(
        &mut self,
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        if self.tool_calls.len() <= index {
            self.tool_calls.resize_with(index + 1, ToolCallBuilder::default);
        }
        let builder = &mut self.tool_calls[index];

        if let Some(id) = id {
            builder.id = Some(id.to_string());
        }
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            builder.name = Some(name.to_string());
        }
        if let Some(arguments) = arguments {
            builder.arguments.push_str(arguments);
        }
    }

    pub fn set_usage(&mut self, usage: TokenUsage) {
        self.usage = Some(usage);
    }

    pub fn set_finish_reason(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Finalize into a completion, parsing every tool call's arguments
    pub fn finish(self) -> Result<Completion> {
        let mut tool_calls = Vec::with_capacity(self.tool_calls.len());
        for builder in self.tool_calls.into_iter().filter(|b| !b.is_empty()) {
            if let Some(call) = builder.finish()? {
                tool_calls.push(call);
            }
        }

        let finish_reason = match self.finish_reason {
            Some(reason) => Some(reason),
            None if !tool_calls.is_empty() => Some(FinishReason::ToolUse),
            None => Some(FinishReason::Stop),
        };

        Ok(Completion {
            content: self.content,
            tool_calls,
            model: self.model,
            usage: self.usage,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merges_argument_fragments() {
        let mut assembler = CompletionAssembler::new("gpt-4o-mini");
        assembler.push_content("Searching");
        assembler.push_content("...");
        assembler.push_tool_call_delta(0, Some("call_a"), Some("search_phones"), Some("{\"bra"));
        assembler.push_tool_call_delta(0, None, None, Some("nd\": \"Xiaomi\", "));
        assembler.push_tool_call_delta(0, None, None, Some("\"max_price\": 5000}"));

        let completion = assembler.finish().unwrap();
        assert_eq!(completion.content, "Searching...");
        assert_eq!(completion.tool_calls.len(), 1);
        let call = &completion.tool_calls[0];
        assert_eq!(call.id, "call_a");
        assert_eq!(call.name, "search_phones");
        assert_eq!(call.arguments["brand"], json!("Xiaomi"));
        assert_eq!(call.arguments["max_price"], json!(5000));
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
    }

    #[test]
    fn test_interleaved_calls_keep_request_order() {
        let mut assembler = CompletionAssembler::new("m");
        assembler.push_tool_call_delta(0, Some("call_0"), Some("first"), Some("{\"a\":"));
        assembler.push_tool_call_delta(1, Some("call_1"), Some("second"), Some("{}"));
        assembler.push_tool_call_delta(0, None, None, Some("1}"));

        let completion = assembler.finish().unwrap();
        let names: Vec<&str> = completion.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(completion.tool_calls[0].arguments["a"], json!(1));
        assert!(completion.tool_calls[1].arguments.is_empty());
    }

    #[test]
    fn test_missing_id_and_empty_arguments() {
        let mut assembler = CompletionAssembler::new("m");
        assembler.push_tool_call_delta(2, None, Some("lookup"), None);

        let completion = assembler.finish().unwrap();
        assert_eq!(completion.tool_calls.len(), 1);
        assert!(completion.tool_calls[0].id.starts_with("call_"));
        assert!(completion.tool_calls[0].arguments.is_empty());
    }

    #[test]
    fn test_malformed_arguments_are_model_errors() {
        let mut assembler = CompletionAssembler::new("m");
        assembler.push_tool_call_delta(0, Some("c"), Some("lookup"), Some("{\"a\": "));
        let err = assembler.finish().unwrap_err();
        assert!(err.is_model_error());

        let mut assembler = CompletionAssembler::new("m");
        assembler.push_tool_call_delta(0, Some("c"), Some("lookup"), Some("[1, 2]"));
        assert!(assembler.finish().is_err());
    }

    #[test]
    fn test_plain_text_completion() {
        let mut assembler = CompletionAssembler::new("m");
        assembler.push_content("Hello");
        let completion = assembler.finish().unwrap();
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }
}
