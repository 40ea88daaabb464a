//! The [`Llm`] trait implemented by chat-completion backends.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolDeclaration;

/// A request for one assistant turn.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Tools the model may call in its reply.
    pub tools: Vec<ToolDeclaration>,
    /// Sampling temperature, if the caller wants to override the backend default.
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Create a request from a conversation and the available tools.
    pub fn new(messages: Vec<Message>, tools: Vec<ToolDeclaration>) -> Self {
        Self { messages, tools, temperature: None }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A language model that produces one assistant [`Message`] per request.
///
/// The returned message has role [`Role::Assistant`](crate::Role::Assistant)
/// and may carry tool calls.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Model name, used in logs.
    fn name(&self) -> &str;

    /// Generate the next assistant message.
    async fn generate(&self, request: LlmRequest) -> Result<Message>;
}
