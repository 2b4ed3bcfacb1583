//! Reasoning Loop
//!
//! Runs one conversational turn with native tool calling:
//!
//! ```text
//! AwaitModel ──► ModelResponded ──► Done
//!     ▲                │
//!     └── ExecutingTools ◄┘   (any state) ──► Error
//! ```
//!
//! Every model fragment is forwarded as soon as it arrives. Each completed
//! message (assistant or tool result) is emitted once it is whole, so a
//! consumer that stops early only ever holds complete messages.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::provider::{GenerationOptions, LlmProvider, StreamEvent};
use crate::tool::{Tool, ToolCall, ToolRegistry};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Persona prepended to every model call (never stored)
    pub system_prompt: String,

    /// Maximum model calls in one turn before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 8,
            generation: GenerationOptions::default(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Use the provided tools when they help answer the user, then synthesize the \
results into a concise, accurate response.";

/// Event emitted while a turn runs
#[derive(Debug)]
pub enum AgentEvent {
    /// Text fragment from the model call in flight
    Delta(String),

    /// A complete message appended to the turn buffer
    Message(Message),

    /// Final assistant message carried no tool calls
    Done,

    /// Turn aborted; messages emitted before this are still complete
    Failed(AgentError),
}

/// Stream of turn events
pub type AgentEventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

enum LoopState {
    AwaitModel,
    ModelResponded(Message),
    ExecutingTools(Vec<ToolCall>),
    Done,
    Error(AgentError),
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run one turn over the stored `history`
    ///
    /// The returned stream ends right after `Done` or `Failed`. Dropping it
    /// cancels whatever model call or tool invocation is in flight.
    pub fn run_turn(&self, history: Vec<Message>) -> AgentEventStream {
        let provider = Arc::clone(&self.provider);
        let tools = Arc::clone(&self.tools);
        let config = self.config.clone();

        Box::pin(stream! {
            let system = Message::system(config.system_prompt.clone());
            let schemas = tools.schemas();
            let mut produced: Vec<Message> = Vec::new();
            let mut iterations = 0usize;
            let mut state = LoopState::AwaitModel;

            loop {
                state = match state {
                    LoopState::AwaitModel => {
                        if iterations >= config.max_iterations {
                            tracing::warn!(max = config.max_iterations, "Turn exceeded iteration limit");
                            LoopState::Error(AgentError::MaxIterations(config.max_iterations))
                        } else {
                            iterations += 1;
                            let input = model_input(&system, &history, &produced);
                            tracing::debug!(iteration = iterations, messages = input.len(), provider = provider.name(), "Calling model");

                            match provider.complete_stream(&input, &schemas, &config.generation).await {
                                Err(e) => LoopState::Error(e),
                                Ok(mut events) => {
                                    let mut outcome = None;
                                    while let Some(event) = events.next().await {
                                        match event {
                                            Ok(StreamEvent::Delta(text)) => {
                                                if !text.is_empty() {
                                                    yield AgentEvent::Delta(text);
                                                }
                                            }
                                            Ok(StreamEvent::Completed(completion)) => {
                                                outcome = Some(Ok(completion));
                                                break;
                                            }
                                            Err(e) => {
                                                outcome = Some(Err(e));
                                                break;
                                            }
                                        }
                                    }

                                    match outcome {
                                        Some(Ok(completion)) => LoopState::ModelResponded(completion.into_message()),
                                        Some(Err(e)) => LoopState::Error(e),
                                        None => LoopState::Error(AgentError::Model(
                                            "model stream ended without a completion".into(),
                                        )),
                                    }
                                }
                            }
                        }
                    }

                    LoopState::ModelResponded(message) => {
                        let calls = message.tool_calls().to_vec();
                        produced.push(message.clone());
                        yield AgentEvent::Message(message);

                        if calls.is_empty() {
                            LoopState::Done
                        } else {
                            tracing::info!(count = calls.len(), "Model requested tool calls");
                            LoopState::ExecutingTools(calls)
                        }
                    }

                    LoopState::ExecutingTools(calls) => {
                        // Sequential, in request order: persisted order must match.
                        for call in &calls {
                            let result = tools.invoke(call).await;
                            let message = Message::tool(result.output, call.id.clone());
                            produced.push(message.clone());
                            yield AgentEvent::Message(message);
                        }
                        LoopState::AwaitModel
                    }

                    LoopState::Done => {
                        tracing::info!(iterations, messages = produced.len(), "Turn completed");
                        yield AgentEvent::Done;
                        break;
                    }

                    LoopState::Error(e) => {
                        tracing::warn!(error = %e, iterations, kept = produced.len(), "Turn aborted");
                        yield AgentEvent::Failed(e);
                        break;
                    }
                };
            }
        })
    }
}

/// Result given to the model for a stored tool call that never got one
const INTERRUPTED_TOOL_RESULT: &str = "Error: the tool call was cancelled before it completed.";

/// Persona, then stored history, then this turn's buffer
///
/// An interrupted turn can leave an assistant message whose tool calls were
/// only partly answered. Each unanswered call gets a placeholder result
/// right after the answers that were stored, since model endpoints reject
/// a request with dangling tool calls.
fn model_input(system: &Message, history: &[Message], produced: &[Message]) -> Vec<Message> {
    let mut input = vec![system.clone()];
    let mut unanswered: Vec<String> = Vec::new();

    for message in history.iter().filter(|m| !matches!(m.role, Role::System | Role::Unknown)) {
        if message.role == Role::Tool {
            if let Some(id) = message.tool_call_id() {
                unanswered.retain(|pending| pending != id);
            }
        } else {
            close_unanswered(&mut input, &mut unanswered);
            if message.role == Role::Assistant {
                unanswered = message.tool_calls().iter().map(|c| c.id.clone()).collect();
            }
        }
        input.push(message.clone());
    }
    close_unanswered(&mut input, &mut unanswered);

    input.extend(produced.iter().cloned());
    input
}

fn close_unanswered(input: &mut Vec<Message>, unanswered: &mut Vec<String>) {
    for id in unanswered.drain(..) {
        tracing::debug!(tool_call_id = %id, "Closing unanswered tool call");
        input.push(Message::tool(INTERRUPTED_TOOL_RESULT, id));
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn generation(mut self, generation: GenerationOptions) -> Self {
        self.config.generation = generation;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
