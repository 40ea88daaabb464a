//! Error types shared by every ragent crate.

use thiserror::Error;

/// Errors raised by tools, models, and the agent loop.
#[derive(Debug, Error)]
pub enum RagentError {
    /// Invalid configuration. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tool call carried arguments that do not match the tool's schema.
    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidToolArguments {
        /// The tool the arguments were meant for.
        tool: String,
        /// What was wrong with them.
        message: String,
    },

    /// The model asked for a tool that was never declared.
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    /// A tool failed while executing.
    #[error("Tool error: {0}")]
    Tool(String),

    /// The language-model call failed.
    #[error("Model error: {message}")]
    Model {
        /// A description of the failure.
        message: String,
        /// Whether retrying the same request may succeed.
        retryable: bool,
    },

    /// A remote service could not be reached or timed out.
    #[error("Service unavailable ({service}): {message}")]
    ServiceUnavailable {
        /// The service that failed.
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// The agent kept requesting tools past its round budget.
    #[error("Agent exceeded the maximum of {max_rounds} model rounds")]
    AgentLoopExceeded {
        /// The configured bound.
        max_rounds: usize,
    },
}

impl RagentError {
    /// Shorthand for a model failure.
    pub fn model(message: impl Into<String>, retryable: bool) -> Self {
        Self::Model { message: message.into(), retryable }
    }

    /// Whether the failed operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ServiceUnavailable { .. } => true,
            Self::Model { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// A convenience result type for ragent operations.
pub type Result<T> = std::result::Result<T, RagentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let unavailable =
            RagentError::ServiceUnavailable { service: "llm".into(), message: "timeout".into() };
        assert!(unavailable.is_retryable());
        assert!(RagentError::model("503", true).is_retryable());
        assert!(!RagentError::model("400", false).is_retryable());
        assert!(!RagentError::AgentLoopExceeded { max_rounds: 3 }.is_retryable());
        assert!(!RagentError::Config("bad".into()).is_retryable());
    }

    #[test]
    fn display_names_the_tool() {
        let err = RagentError::InvalidToolArguments {
            tool: "retrieve_documents".into(),
            message: "\"query\" is a required property".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for tool 'retrieve_documents': \"query\" is a required property"
        );
    }
}
