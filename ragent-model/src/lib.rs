//! # ragent-model
//!
//! Chat model integrations for ragent agents.
//!
//! - [`OpenAIClient`] - any OpenAI-compatible chat-completions API; DeepSeek
//!   (`deepseek-chat`) is the preset used by the `ragent` binary
//! - [`MockLlm`] - scripted model for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragent_model::openai::{OpenAIClient, OpenAIConfig};
//!
//! let model = OpenAIClient::new(OpenAIConfig::deepseek(
//!     std::env::var("DEEPSEEK_API_KEY")?,
//! ))?;
//! ```
//!
//! ## Supported Models
//!
//! | Provider | Base URL | Model |
//! |----------|----------|-------|
//! | DeepSeek | `https://api.deepseek.com/v1` | `deepseek-chat` |
//! | OpenAI   | `https://api.openai.com/v1`   | `gpt-4o-mini`, ... |
//! | Ollama   | `http://localhost:11434/v1`   | any local model |

pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;

pub use mock::MockLlm;
#[cfg(feature = "openai")]
pub use openai::{OpenAIClient, OpenAIConfig};
