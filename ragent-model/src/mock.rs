//! Scripted model for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ragent_core::{Llm, LlmRequest, Message, RagentError, Result};

/// An [`Llm`] that replays scripted assistant messages in order.
///
/// Every request is recorded so tests can inspect what the agent sent. Once
/// the script runs out the model fails, unless it was built with
/// [`MockLlm::repeating`], which answers every request with the same message.
///
/// # Example
///
/// ```rust,ignore
/// use ragent_model::MockLlm;
///
/// let model = MockLlm::new(vec![
///     Message::assistant_with_tool_calls("", vec![ToolCall::new("1", "retrieve_documents", json!({"query": "q"}))]),
///     Message::assistant("final answer"),
/// ]);
/// ```
#[derive(Debug)]
pub struct MockLlm {
    name: String,
    script: Mutex<VecDeque<Message>>,
    repeat: Option<Message>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    /// Replay `responses`, one per request.
    pub fn new(responses: impl IntoIterator<Item = Message>) -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(responses.into_iter().collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `response`.
    pub fn repeating(response: Message) -> Self {
        Self { repeat: Some(response), ..Self::new(Vec::new()) }
    }

    /// Override the reported model name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: LlmRequest) -> Result<Message> {
        lock(&self.requests).push(request);
        if let Some(next) = lock(&self.script).pop_front() {
            return Ok(next);
        }
        self.repeat
            .clone()
            .ok_or_else(|| RagentError::model("mock script exhausted", false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_fails() {
        let model = MockLlm::new([Message::assistant("one"), Message::assistant("two")]);
        let request = LlmRequest::new(vec![Message::user("q")], Vec::new());

        assert_eq!(model.generate(request.clone()).await.unwrap().content, "one");
        assert_eq!(model.generate(request.clone()).await.unwrap().content, "two");
        assert!(model.generate(request).await.is_err());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn repeating_never_runs_out() {
        let model = MockLlm::repeating(Message::assistant("again"));
        for _ in 0..5 {
            let reply = model.generate(LlmRequest::default()).await.unwrap();
            assert_eq!(reply.content, "again");
        }
        assert_eq!(model.requests().len(), 5);
    }
}
