//! # ragent-core
//!
//! Shared vocabulary for the ragent crates:
//!
//! - [`Message`], [`ToolCall`] and the append-only [`Transcript`]
//! - the [`Tool`] trait and the [`ToolDeclaration`] a model sees
//! - the [`Llm`] trait implemented by chat-completion backends
//! - [`RagentError`] and bounded retry with exponential backoff

pub mod error;
pub mod llm;
pub mod message;
pub mod retry;
pub mod tool;

pub use error::{RagentError, Result};
pub use llm::{Llm, LlmRequest};
pub use message::{Message, Role, ToolCall, Transcript};
pub use retry::{RetryConfig, Retryable, with_retry};
pub use tool::{Tool, ToolDeclaration};
