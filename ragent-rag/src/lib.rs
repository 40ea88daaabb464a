//! # ragent-rag
//!
//! Retrieval-augmented generation building blocks for ragent agents.
//!
//! Documents are split by a [`Chunker`], embedded through an
//! [`EmbeddingAdapter`] and stored in a [`VectorStore`]. A [`RagPipeline`]
//! ties the three together for ingestion and queries, and can answer a
//! question in one model call with [`RagPipeline::answer`]. A
//! [`RetrievalTool`] exposes search as a `ragent_core::Tool` for agentic use.
//!
//! ## Features
//!
//! Network backends are feature-gated. The default feature set includes the
//! core traits, the recursive chunker, the hashing embedder and the in-memory
//! vector store.
//!
//! | Feature   | What it enables                                   |
//! |-----------|---------------------------------------------------|
//! | `openai`  | `OpenAIEmbeddingProvider` via reqwest             |
//! | `chroma`  | `ChromaVectorStore` via reqwest                   |
//! | `qdrant`  | `QdrantVectorStore` via qdrant-client             |
//! | `full`    | All of the above                                  |

pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod inmemory;
pub mod pipeline;
pub mod tool;
pub mod vectorstore;

#[cfg(feature = "chroma")]
pub mod chroma;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use answer::{ANSWER_TEMPLATE, RagAnswer, build_context};
pub use chunking::{Chunker, RecursiveChunker, split_text};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, Metadata, MetadataValue, SearchResult};
pub use embedding::{EmbeddingAdapter, EmbeddingProvider};
pub use error::{RagError, Result};
pub use hashing::HashEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use tool::{DEFAULT_TOOL_NAME, NO_RESULTS, RetrievalTool, format_results};
pub use vectorstore::VectorStore;

#[cfg(feature = "chroma")]
pub use chroma::ChromaVectorStore;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
