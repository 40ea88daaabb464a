//! Environment configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ragent_core::{RagentError, Result};

const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_LLM_BASE_URL: &str = "https://api.deepseek.com/v1";
const DEFAULT_LLM_MODEL: &str = "deepseek-chat";
const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";
const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Which service turns text into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// An OpenAI-compatible `/embeddings` endpoint.
    OpenAI,
    /// The offline hashing provider.
    Hash,
}

impl FromStr for EmbeddingBackend {
    type Err = RagentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            other => Err(RagentError::Config(format!(
                "EMBEDDING_PROVIDER must be 'openai' or 'hash', got '{other}'"
            ))),
        }
    }
}

/// Which vector database holds the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    /// Chroma over its HTTP API.
    Chroma,
    /// Qdrant over gRPC.
    Qdrant,
}

impl FromStr for VectorBackend {
    type Err = RagentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chroma" => Ok(Self::Chroma),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(RagentError::Config(format!(
                "VECTOR_STORE_BACKEND must be 'chroma' or 'qdrant', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chroma => f.write_str("chroma"),
            Self::Qdrant => f.write_str("qdrant"),
        }
    }
}

/// Settings for every service the CLI talks to.
#[derive(Clone, PartialEq)]
pub struct AppConfig {
    pub embedding_provider: EmbeddingBackend,
    pub embedding_api_key: Option<String>,
    pub embedding_base_url: String,
    pub embedding_model: String,
    /// Sent to the embedding API only when set explicitly.
    pub embedding_dimensions: Option<usize>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub vector_store: VectorBackend,
    pub vector_store_url: String,
    pub collection: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
    pub max_rounds: usize,
    pub request_timeout: Duration,
    pub retry_max_attempts: u32,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`RagentError::Config`] for unknown backends, unparseable
    /// numbers, zero for any number but `CHUNK_OVERLAP`, and a chunk overlap
    /// not smaller than the chunk size.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let vector_store = get("VECTOR_STORE_BACKEND")
            .map(|v| v.parse::<VectorBackend>())
            .transpose()?
            .unwrap_or(VectorBackend::Chroma);
        let default_store_url = match vector_store {
            VectorBackend::Chroma => DEFAULT_CHROMA_URL,
            VectorBackend::Qdrant => DEFAULT_QDRANT_URL,
        };

        let config = Self {
            embedding_provider: get("EMBEDDING_PROVIDER")
                .map(|v| v.parse::<EmbeddingBackend>())
                .transpose()?
                .unwrap_or(EmbeddingBackend::OpenAI),
            embedding_api_key: get("EMBEDDING_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            embedding_base_url: text("EMBEDDING_BASE_URL", DEFAULT_EMBEDDING_BASE_URL),
            embedding_model: text("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimensions: number(&get, "EMBEDDING_DIMENSIONS")?,
            llm_api_key: get("LLM_API_KEY").or_else(|| get("DEEPSEEK_API_KEY")),
            llm_base_url: text("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
            llm_model: text("LLM_MODEL", DEFAULT_LLM_MODEL),
            vector_store,
            vector_store_url: text("VECTOR_STORE_URL", default_store_url),
            collection: text("COLLECTION_NAME", "documents"),
            chunk_size: number(&get, "CHUNK_SIZE")?.unwrap_or(1000),
            chunk_overlap: count(&get, "CHUNK_OVERLAP")?.unwrap_or(200),
            retrieval_k: number(&get, "RETRIEVAL_K")?.unwrap_or(4),
            max_rounds: number(&get, "AGENT_MAX_ROUNDS")?.unwrap_or(10),
            request_timeout: Duration::from_secs(number(&get, "REQUEST_TIMEOUT_SECS")?.unwrap_or(30)),
            retry_max_attempts: number(&get, "RETRY_MAX_ATTEMPTS")?.unwrap_or(3),
        };
        config.validate()?;
        Ok(config)
    }

    /// Use `collection` instead of `COLLECTION_NAME`.
    pub fn with_collection(mut self, collection: &str) -> Result<Self> {
        self.collection = collection.trim().to_string();
        self.validate()?;
        Ok(self)
    }

    /// Vector size produced by the configured embedding model.
    pub fn dimensions(&self) -> usize {
        self.embedding_dimensions.unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagentError::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.collection.is_empty() {
            return Err(RagentError::Config("COLLECTION_NAME must not be empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("AppConfig")
            .field("embedding_provider", &self.embedding_provider)
            .field("embedding_api_key", &redact(&self.embedding_api_key))
            .field("embedding_base_url", &self.embedding_base_url)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("llm_api_key", &redact(&self.llm_api_key))
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("vector_store", &self.vector_store)
            .field("vector_store_url", &self.vector_store_url)
            .field("collection", &self.collection)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("retrieval_k", &self.retrieval_k)
            .field("max_rounds", &self.max_rounds)
            .field("request_timeout", &self.request_timeout)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .finish()
    }
}

/// Parse a positive integer setting.
fn number<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr + PartialEq + Default,
    G: Fn(&str) -> Option<String>,
{
    match parse_integer::<T, G>(get, key, "a positive integer")? {
        Some(value) if value == T::default() => {
            Err(RagentError::Config(format!("{key} must be greater than zero")))
        }
        value => Ok(value),
    }
}

/// Parse an integer setting where zero is allowed.
fn count<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    parse_integer(get, key, "a non-negative integer")
}

fn parse_integer<T, G>(get: &G, key: &str, expected: &str) -> Result<Option<T>>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| RagentError::Config(format!("{key} must be {expected}, got '{raw}'")))
}
