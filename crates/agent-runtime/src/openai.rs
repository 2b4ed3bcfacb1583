//! OpenAI-compatible LLM Provider
//!
//! Implementation of `LlmProvider` for any endpoint speaking the streaming
//! chat-completions protocol (OpenAI, vLLM, llama.cpp server, ...).
//!
//! The response body is server-sent events. Each `data:` payload carries a
//! `choices[0].delta` with text and/or tool-call fragments; `[DONE]` ends
//! the stream. Text is forwarded as it arrives, tool calls are merged by
//! index and only surfaced in the final completion.

use std::time::Duration;

use agent_core::{
    assembly::CompletionAssembler,
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
        StreamEvent, TokenUsage,
    },
    tool::ToolSchema,
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::env;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL, without the trailing `/chat/completions`
    pub api_base: String,

    /// Bearer token (local servers usually need none)
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: env::var_or("OPENAI_API_BASE", DEFAULT_API_BASE),
            api_key: env::var_opt("OPENAI_API_KEY"),
            timeout_secs: env::parse_or("OPENAI_TIMEOUT_SECS", 120),
        }
    }
}

/// OpenAI-compatible LLM provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self.authorized(request).send().await.map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.send(self.client.get(self.endpoint("models"))).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Model endpoint health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let body = request_body(messages, tools, options);
        tracing::debug!(
            model = %options.model,
            messages = messages.len(),
            tools = tools.len(),
            "Opening chat completion stream"
        );

        let response = self
            .send(self.client.post(self.endpoint("chat/completions")).json(&body))
            .await?;

        let model = options.model.clone();
        let stream = try_stream! {
            let mut body = response.bytes_stream();
            let mut decoder = ChatStreamDecoder::new(model);

            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(transport_error)?;
                for fragment in decoder.feed(&chunk)? {
                    yield StreamEvent::Delta(fragment);
                }
                if decoder.is_done() {
                    break;
                }
            }

            for fragment in decoder.flush()? {
                yield StreamEvent::Delta(fragment);
            }
            yield StreamEvent::Completed(decoder.finish()?);
        };

        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self.send(self.client.get(self.endpoint("models"))).await?;
        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Model(format!("invalid model list: {}", e)))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo { id: m.id, owned_by: m.owned_by })
            .collect())
    }
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    owned_by: Option<String>,
}

fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() || e.is_connect() {
        AgentError::ModelUnavailable(e.to_string())
    } else {
        AgentError::Model(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());
    let message = format!("HTTP {}: {}", status.as_u16(), detail);

    if status == StatusCode::TOO_MANY_REQUESTS {
        AgentError::RateLimited(message)
    } else if status.is_server_error() {
        AgentError::ModelUnavailable(message)
    } else {
        AgentError::Model(message)
    }
}

fn request_body(messages: &[Message], tools: &[ToolSchema], options: &GenerationOptions) -> Value {
    let mut body = json!({
        "model": options.model,
        "messages": messages.iter().filter_map(wire_message).collect::<Vec<_>>(),
        "temperature": options.temperature,
        "stream": true,
    });

    if !tools.is_empty() {
        body["tools"] = tools.iter().map(ToolSchema::to_function_definition).collect();
    }
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

fn wire_message(message: &Message) -> Option<Value> {
    match message.role {
        Role::System | Role::User => Some(json!({
            "role": message.role.to_string(),
            "content": message.content,
        })),
        Role::Assistant if message.has_tool_calls() => {
            let calls: Vec<Value> = message
                .tool_calls()
                .iter()
                .map(|call| json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments_json(),
                    },
                }))
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                json!(message.content)
            };
            Some(json!({ "role": "assistant", "content": content, "tool_calls": calls }))
        }
        Role::Assistant => Some(json!({ "role": "assistant", "content": message.content })),
        Role::Tool => Some(json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id().unwrap_or_default(),
            "content": message.content,
        })),
        Role::Unknown => None,
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    model: Option<String>,
    usage: Option<ChunkUsage>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Incremental decoder for a chat-completions SSE body
struct ChatStreamDecoder {
    buffer: Vec<u8>,
    assembler: CompletionAssembler,
    done: bool,
}

impl ChatStreamDecoder {
    fn new(model: impl Into<String>) -> Self {
        Self {
            buffer: Vec::new(),
            assembler: CompletionAssembler::new(model),
            done: false,
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    /// Consume raw body bytes, returning the text fragments they completed
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);
        let mut fragments = Vec::new();

        while let Some((split, delimiter)) = find_sse_boundary(&self.buffer) {
            if self.done {
                break;
            }
            let event: Vec<u8> = self.buffer.drain(..split + delimiter).take(split).collect();
            self.handle_event(&String::from_utf8_lossy(&event), &mut fragments)?;
        }

        Ok(fragments)
    }

    /// Process whatever is left once the body ends without a blank line
    fn flush(&mut self) -> Result<Vec<String>> {
        let mut fragments = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let event = std::mem::take(&mut self.buffer);
            self.handle_event(&String::from_utf8_lossy(&event), &mut fragments)?;
        }
        Ok(fragments)
    }

    fn finish(self) -> Result<Completion> {
        self.assembler.finish()
    }

    fn handle_event(&mut self, event: &str, fragments: &mut Vec<String>) -> Result<()> {
        let Some(data) = extract_data_payload(event) else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() {
            return Ok(());
        }
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let payload: ChunkPayload = serde_json::from_str(data)
            .map_err(|e| AgentError::Model(format!("invalid stream payload: {}", e)))?;

        if let Some(error) = payload.error {
            let message = error["message"].as_str().map_or_else(|| error.to_string(), str::to_string);
            return Err(AgentError::Model(message));
        }
        if let Some(model) = payload.model {
            self.assembler.set_model(model);
        }
        if let Some(usage) = payload.usage {
            self.assembler.set_usage(TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        let Some(choice) = payload.choices.into_iter().next() else {
            return Ok(());
        };

        if let Some(delta) = choice.delta {
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                self.assembler.push_content(&content);
                fragments.push(content);
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match &call.function {
                    Some(f) => (f.name.as_deref(), f.arguments.as_deref()),
                    None => (None, None),
                };
                self.assembler
                    .push_tool_call_delta(call.index, call.id.as_deref(), name, arguments);
            }
        }

        if let Some(reason) = choice.finish_reason {
            self.assembler.set_finish_reason(FinishReason::from_wire(&reason));
        }

        Ok(())
    }
}

/// Position and length of the first event delimiter in `buffer`
fn find_sse_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let newline = find(buffer, b"\n\n").map(|idx| (idx, 2));
    let carriage = find(buffer, b"\r\n\r\n").map(|idx| (idx, 4));

    match (newline, carriage) {
        (Some(n), Some(c)) => Some(if n.0 <= c.0 { n } else { c }),
        (boundary, None) | (None, boundary) => boundary,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Join the `data:` lines of one event, skipping comments
fn extract_data_payload(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tool::{ParameterSchema, ToolCall};
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(payloads: &[Value]) -> String {
        let mut body: String = payloads
            .iter()
            .map(|p| format!("data: {}\n\n", p))
            .collect();
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn provider(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::from_config(OpenAiConfig {
            api_base: server.uri(),
            api_key: Some("test-key".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn search_schema() -> ToolSchema {
        ToolSchema {
            name: "search_phones".into(),
            description: "Search phones".into(),
            parameters: vec![ParameterSchema::new("brand", "string", "Brand")],
            category: None,
        }
    }

    #[test]
    fn test_boundary_and_payload() {
        assert_eq!(find_sse_boundary(b"data: foo\n\nrest"), Some((9, 2)));
        assert_eq!(find_sse_boundary(b"data: foo\r\n\r\n"), Some((9, 4)));
        assert_eq!(find_sse_boundary(b"data: partial"), None);

        let event = ": keep-alive\ndata: {\"a\":1}\ndata: {\"b\":2}";
        assert_eq!(extract_data_payload(event).as_deref(), Some("{\"a\":1}\n{\"b\":2}"));
        assert_eq!(extract_data_payload(": comment only"), None);
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let body = sse(&[
            json!({"model": "gpt-4o-mini", "choices": [{"delta": {"content": "Hi "}}]}),
            json!({"choices": [{"delta": {"content": "there"}, "finish_reason": "stop"}]}),
        ]);
        let bytes = body.as_bytes();

        let mut decoder = ChatStreamDecoder::new("requested");
        let mut fragments = Vec::new();
        for piece in bytes.chunks(7) {
            fragments.extend(decoder.feed(piece).unwrap());
        }
        fragments.extend(decoder.flush().unwrap());
        assert!(decoder.is_done());

        assert_eq!(fragments, vec!["Hi ", "there"]);
        let completion = decoder.finish().unwrap();
        assert_eq!(completion.content, "Hi there");
        assert_eq!(completion.model, "gpt-4o-mini");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_decoder_merges_tool_call_fragments() {
        let body = sse(&[
            json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "call_1", "type": "function",
                 "function": {"name": "search_phones", "arguments": ""}}
            ]}}]}),
            json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "{\"brand\":"}}
            ]}}]}),
            json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": " \"Apple\"}"}}
            ]}, "finish_reason": "tool_calls"}]}),
        ]);

        let mut decoder = ChatStreamDecoder::new("m");
        let fragments = decoder.feed(body.as_bytes()).unwrap();
        assert!(fragments.is_empty());

        let completion = decoder.finish().unwrap();
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_1");
        assert_eq!(completion.tool_calls[0].arguments["brand"], json!("Apple"));
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
    }

    #[test]
    fn test_decoder_surfaces_stream_errors() {
        let mut decoder = ChatStreamDecoder::new("m");
        let err = decoder
            .feed(b"data: {\"error\": {\"message\": \"overloaded\"}}\n\n")
            .unwrap_err();
        assert!(err.to_string().contains("overloaded"));

        let mut decoder = ChatStreamDecoder::new("m");
        assert!(decoder.feed(b"data: {not json\n\n").unwrap_err().is_model_error());
    }

    #[test]
    fn test_wire_messages() {
        let call = ToolCall::new("call_1", "search_phones", HashMap::from([
            ("brand".to_string(), json!("Apple")),
        ]));
        let messages = vec![
            Message::system("persona"),
            Message::user("find an iPhone"),
            Message::assistant_with_tool_calls("", vec![call]),
            Message::tool("[]", "call_1"),
            Message::new(Role::Unknown, "skip me"),
        ];

        let body = request_body(&messages, &[search_schema()], &GenerationOptions::default());
        let wire = body["messages"].as_array().unwrap();

        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["content"], Value::Null);
        assert_eq!(wire[2]["tool_calls"][0]["function"]["arguments"], "{\"brand\":\"Apple\"}");
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "search_phones");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::RateLimited(_)
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_retryable());

        let err = status_error(StatusCode::BAD_REQUEST, r#"{"error": {"message": "bad model"}}"#);
        assert!(matches!(err, AgentError::Model(ref m) if m.contains("bad model")));
    }

    #[tokio::test]
    async fn test_stream_against_mock_endpoint() {
        let server = MockServer::start().await;
        let body = sse(&[
            json!({"choices": [{"delta": {"content": "Looking"}}]}),
            json!({"choices": [{"delta": {"content": " up."}, "finish_reason": "stop"}]}),
        ]);

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        let stream = provider
            .complete_stream(&[Message::user("hi")], &[search_schema()], &GenerationOptions::default())
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::Delta(t) if t == "Looking"));
        match &events[2] {
            StreamEvent::Completed(c) => assert_eq!(c.content, "Looking up."),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete_stream(&[Message::user("hi")], &[], &GenerationOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_list_models_and_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"id": "gpt-4o-mini", "owned_by": "openai"}]
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let models = provider.list_models().await.unwrap();
        assert_eq!(models[0].id, "gpt-4o-mini");
        assert_eq!(models[0].owned_by.as_deref(), Some("openai"));
        assert!(provider.health_check().await.unwrap());
    }
}
