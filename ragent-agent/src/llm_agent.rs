//! The tool-calling agent loop.

use std::sync::Arc;

use futures::future::join_all;
use ragent_core::{Llm, LlmRequest, Message, RagentError, Result, Tool, ToolCall, Transcript};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::registry::ToolRegistry;

/// Default bound on model invocations per run.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Outcome of a successful [`LlmAgent::run`].
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    /// Content of the final assistant message.
    pub answer: String,
    /// Every message of the run, starting with the instruction (if any) and
    /// the user's question.
    pub transcript: Transcript,
    /// Number of model invocations.
    pub rounds: usize,
}

/// Where a run currently is.
#[derive(Debug)]
enum State {
    Start,
    Agent,
    Tools(Vec<ToolCall>),
    End(String),
}

/// An agent that alternates model calls with tool calls until the model
/// answers without requesting a tool.
///
/// Each run starts a fresh [`Transcript`]. The model sees the whole
/// transcript and the declarations of the registered tools on every round.
/// Tool problems (unknown name, invalid arguments, execution failure) are fed
/// back to the model as tool messages; model errors end the run.
///
/// # Example
///
/// ```rust,ignore
/// use ragent_agent::LlmAgentBuilder;
///
/// let agent = LlmAgentBuilder::new("assistant")
///     .instruction("Answer using the retrieve_documents tool.")
///     .model(Arc::new(model))
///     .tool(Arc::new(retrieval_tool))
///     .build()?;
///
/// let run = agent.run("What was Nike's revenue in 2023?").await?;
/// println!("{}", run.answer);
/// ```
pub struct LlmAgent {
    name: String,
    description: String,
    instruction: Option<String>,
    model: Arc<dyn Llm>,
    tools: ToolRegistry,
    max_rounds: usize,
    parallel_tool_calls: bool,
    temperature: Option<f32>,
}

impl LlmAgent {
    /// Agent name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The registered tools.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Bound on model invocations per run.
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Answer `input`, calling tools as the model requests.
    ///
    /// # Errors
    ///
    /// - [`RagentError::AgentLoopExceeded`] if the model still wants tools
    ///   after `max_rounds` invocations.
    /// - Any error returned by the model.
    pub async fn run(&self, input: impl Into<String>) -> Result<AgentRun> {
        let mut question = input.into();
        let declarations = self.tools.declarations();
        let mut transcript = Transcript::new();
        let mut rounds = 0;
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => {
                    debug!(agent = %self.name, tool_count = self.tools.len(), "agent run started");
                    if let Some(instruction) = &self.instruction {
                        transcript.push(Message::system(instruction.clone()));
                    }
                    transcript.push(Message::user(std::mem::take(&mut question)));
                    State::Agent
                }
                State::Agent => {
                    if rounds >= self.max_rounds {
                        error!(agent = %self.name, max_rounds = self.max_rounds, "agent loop exceeded");
                        return Err(RagentError::AgentLoopExceeded { max_rounds: self.max_rounds });
                    }
                    rounds += 1;

                    let mut request =
                        LlmRequest::new(transcript.messages().to_vec(), declarations.clone());
                    if let Some(temperature) = self.temperature {
                        request = request.with_temperature(temperature);
                    }

                    debug!(agent = %self.name, round = rounds, model = self.model.name(), "calling model");
                    let reply = self.model.generate(request).await.inspect_err(|e| {
                        error!(agent = %self.name, round = rounds, error = %e, "model call failed");
                    })?;

                    let next = if reply.has_tool_calls() {
                        State::Tools(reply.tool_calls.clone())
                    } else {
                        State::End(reply.content.clone())
                    };
                    info!(
                        agent = %self.name,
                        round = rounds,
                        tool_calls = reply.tool_calls.len(),
                        "model round complete"
                    );
                    transcript.push(reply);
                    next
                }
                State::Tools(calls) => {
                    for message in self.call_tools(&calls).await {
                        transcript.push(message);
                    }
                    State::Agent
                }
                State::End(answer) => {
                    info!(agent = %self.name, rounds, "agent finished");
                    return Ok(AgentRun { answer, transcript, rounds });
                }
            };
        }
    }

    /// Execute `calls` and return one tool message per call, in call order.
    async fn call_tools(&self, calls: &[ToolCall]) -> Vec<Message> {
        if self.parallel_tool_calls {
            join_all(calls.iter().map(|call| self.call_tool(call))).await
        } else {
            let mut messages = Vec::with_capacity(calls.len());
            for call in calls {
                messages.push(self.call_tool(call).await);
            }
            messages
        }
    }

    async fn call_tool(&self, call: &ToolCall) -> Message {
        info!(agent = %self.name, tool = %call.name, call_id = %call.id, "tool call");
        let content = match self.execute(call).await {
            Ok(Value::String(text)) => text,
            Ok(value) => value.to_string(),
            Err(e) => {
                warn!(agent = %self.name, tool = %call.name, error = %e, "tool call failed");
                format!("Error: {e}")
            }
        };
        Message::tool(call.id.clone(), content)
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| RagentError::UnknownTool(call.name.clone()))?;
        tool.execute(call.arguments.clone()).await
    }
}

impl std::fmt::Debug for LlmAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAgent")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("tools", &self.tools)
            .field("max_rounds", &self.max_rounds)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .finish()
    }
}

/// Builder for [`LlmAgent`].
pub struct LlmAgentBuilder {
    name: String,
    description: String,
    instruction: Option<String>,
    model: Option<Arc<dyn Llm>>,
    tools: Vec<Arc<dyn Tool>>,
    max_rounds: usize,
    parallel_tool_calls: bool,
    temperature: Option<f32>,
}

impl LlmAgentBuilder {
    /// Start building an agent called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: None,
            model: None,
            tools: Vec::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            parallel_tool_calls: false,
            temperature: None,
        }
    }

    /// Set a human-readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the system instruction placed at the start of every transcript.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Set the language model.
    pub fn model(mut self, model: Arc<dyn Llm>) -> Self {
        self.model = Some(model);
        self
    }

    /// Register a tool.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Bound the number of model invocations per run.
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Run the tool calls of one round concurrently. Results are still
    /// appended in call order.
    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    /// Sampling temperature sent with every model request.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the agent.
    ///
    /// # Errors
    ///
    /// Returns [`RagentError::Config`] if no model is set, `max_rounds` is
    /// zero, or two tools share a name.
    pub fn build(self) -> Result<LlmAgent> {
        let model = self.model.ok_or_else(|| RagentError::Config("model is required".to_string()))?;
        if self.max_rounds == 0 {
            return Err(RagentError::Config("max_rounds must be greater than zero".to_string()));
        }

        let mut tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register(tool)?;
        }

        Ok(LlmAgent {
            name: self.name,
            description: self.description,
            instruction: self.instruction,
            model,
            tools,
            max_rounds: self.max_rounds,
            parallel_tool_calls: self.parallel_tool_calls,
            temperature: self.temperature,
        })
    }
}
