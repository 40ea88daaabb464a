//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use ragent_core::retry::{RetryConfig, with_retry};
use ragent_core::{Llm, LlmRequest, Message, RagentError, Result};
use reqwest::StatusCode;
use tracing::{debug, error};

use super::config::OpenAIConfig;
use super::convert::{self, ChatRequest, ChatResponse, ErrorResponse};

/// A chat model reached over an OpenAI-compatible HTTP API (OpenAI, DeepSeek,
/// vLLM, Ollama, ...).
///
/// Each [`generate`](Llm::generate) call is one non-streaming
/// `/chat/completions` request. Timeouts, connection failures, HTTP 408, 429
/// and 5xx responses are retried according to the client's [`RetryConfig`].
///
/// # Example
///
/// ```rust,ignore
/// use ragent_model::openai::{OpenAIClient, OpenAIConfig};
///
/// let model = OpenAIClient::new(OpenAIConfig::deepseek(std::env::var("DEEPSEEK_API_KEY")?))?;
/// ```
pub struct OpenAIClient {
    http: reqwest::Client,
    config: OpenAIConfig,
    retry: RetryConfig,
}

impl OpenAIClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`RagentError::Config`] if the API key or model is empty.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RagentError::Config("LLM API key must not be empty".to_string()));
        }
        if config.model.is_empty() {
            return Err(RagentError::Config("LLM model must not be empty".to_string()));
        }
        Ok(Self { http: reqwest::Client::new(), config, retry: RetryConfig::default() })
    }

    /// Create a client for an OpenAI-compatible API.
    pub fn compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Self::new(OpenAIConfig::compatible(api_key, base_url, model))
    }

    /// Set the retry policy for transient failures.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<Message> {
        let response = self
            .http
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let retryable = e.is_timeout() || e.is_connect() || e.is_request();
                RagentError::model(format!("request to {} failed: {e}", self.config.model), retryable)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&text).map(|e| e.error.message).unwrap_or(text);
            return Err(RagentError::model(
                format!("{} returned {status}: {detail}", self.config.model),
                is_transient_status(status),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            RagentError::model(format!("failed to parse chat completion: {e}"), false)
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagentError::model("chat completion contained no choices", false))?;

        Ok(convert::message_from_wire(choice.message))
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[async_trait]
impl Llm for OpenAIClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: LlmRequest) -> Result<Message> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: request.messages.iter().map(convert::message_to_wire).collect(),
            tools: convert::tools_to_wire(&request.tools),
            temperature: request.temperature.or(self.config.temperature),
            max_tokens: self.config.max_tokens,
        };

        debug!(
            model = %self.config.model,
            message_count = body.messages.len(),
            tool_count = body.tools.len(),
            "sending chat completion"
        );

        with_retry(&self.retry, || self.send_once(&body)).await.inspect_err(|e| {
            error!(model = %self.config.model, error = %e, "chat completion failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragent_core::ToolDeclaration;
    use serde_json::json;

    #[test]
    fn rejects_empty_key() {
        assert!(matches!(
            OpenAIClient::new(OpenAIConfig::deepseek("")),
            Err(RagentError::Config(_))
        ));
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn request_body_shape() {
        let messages = [Message::system("answer from documents"), Message::user("hi")];
        let tools = [ToolDeclaration {
            name: "retrieve_documents".into(),
            description: "search".into(),
            parameters: json!({ "type": "object" }),
        }];
        let body = ChatRequest {
            model: "deepseek-chat",
            messages: messages.iter().map(convert::message_to_wire).collect(),
            tools: convert::tools_to_wire(&tools),
            temperature: Some(0.0),
            max_tokens: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["tools"][0]["function"]["name"], "retrieve_documents");
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());
    }
}
