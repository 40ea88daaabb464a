//! OpenAI-compatible chat models.
//!
//! DeepSeek, vLLM, Ollama and most hosted providers expose the same
//! `/chat/completions` API, so one client covers them all:
//!
//! ```rust,ignore
//! use ragent_model::openai::{OpenAIClient, OpenAIConfig};
//!
//! let deepseek = OpenAIClient::new(OpenAIConfig::deepseek(api_key))?;
//! let local = OpenAIClient::compatible("ollama", "http://localhost:11434/v1", "llama3.1")?;
//! ```

mod client;
mod config;
mod convert;

pub use client::OpenAIClient;
pub use config::{DEEPSEEK_API_BASE, DEEPSEEK_CHAT, OPENAI_API_BASE, OpenAIConfig};
