//! Configuration for OpenAI-compatible chat endpoints.

use std::time::Duration;

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// The DeepSeek API base URL.
pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
/// DeepSeek's general-purpose chat model.
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection and model settings for an [`OpenAIClient`](super::OpenAIClient).
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Bearer token sent with every request.
    pub api_key: String,
    /// API root, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Per-request deadline.
    pub timeout: Duration,
    /// Default sampling temperature, used when a request sets none.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
}

impl OpenAIConfig {
    /// Settings for the OpenAI API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::compatible(api_key, OPENAI_API_BASE, model)
    }

    /// Settings for any OpenAI-compatible API.
    pub fn compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            temperature: None,
            max_tokens: None,
        }
    }

    /// `deepseek-chat` with deterministic sampling.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::compatible(api_key, DEEPSEEK_API_BASE, DEEPSEEK_CHAT).with_temperature(0.0)
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Limit the number of generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}
