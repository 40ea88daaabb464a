//! Error types for the `ragent-rag` crate.

use ragent_core::RagentError;
use ragent_core::retry::Retryable;
use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking, collection or query parameters.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The embedding service failed or returned an unusable response.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether the failure is transient (timeouts, rate limits, 5xx).
        transient: bool,
    },

    /// The vector store could not be reached or timed out.
    #[error("Vector store unavailable ({backend}): {message}")]
    ServiceUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The named collection does not exist.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    /// A collection with this name already exists.
    #[error("Collection '{0}' already exists")]
    CollectionExists(String),

    /// The vector store rejected a request.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error propagated from `ragent-core`.
    #[error(transparent)]
    Core(#[from] RagentError),
}

impl RagError {
    /// A permanent embedding failure.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.into(), message: message.into(), transient: false }
    }

    /// A transient embedding failure, eligible for retry.
    pub fn embedding_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.into(), message: message.into(), transient: true }
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingError { transient, .. } => *transient,
            Self::ServiceUnavailable { .. } => true,
            Self::Core(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl Retryable for RagError {
    fn is_retryable(&self) -> bool {
        RagError::is_retryable(self)
    }
}

impl From<RagError> for RagentError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Core(inner) => inner,
            RagError::ConfigError(message) => RagentError::Config(message),
            RagError::ServiceUnavailable { backend, message } => {
                RagentError::ServiceUnavailable { service: backend, message }
            }
            RagError::EmbeddingError { provider, message, transient: true } => {
                RagentError::ServiceUnavailable { service: provider, message }
            }
            other => RagentError::Tool(other.to_string()),
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_error_class() {
        assert!(RagError::embedding_transient("openai", "503").is_retryable());
        assert!(!RagError::embedding("openai", "401").is_retryable());
        assert!(
            RagError::ServiceUnavailable { backend: "chroma".into(), message: "refused".into() }
                .is_retryable()
        );
        assert!(!RagError::CollectionNotFound("docs".into()).is_retryable());
        assert!(!RagError::CollectionExists("docs".into()).is_retryable());
        assert!(!RagError::ConfigError("overlap".into()).is_retryable());
    }

    #[test]
    fn converts_into_core_errors() {
        let err: RagentError = RagError::CollectionNotFound("docs".into()).into();
        assert!(matches!(err, RagentError::Tool(ref m) if m.contains("docs")));

        let err: RagentError =
            RagError::ServiceUnavailable { backend: "chroma".into(), message: "timeout".into() }
                .into();
        assert!(err.is_retryable());

        let err: RagentError = RagError::ConfigError("k must be > 0".into()).into();
        assert!(matches!(err, RagentError::Config(_)));
    }
}
