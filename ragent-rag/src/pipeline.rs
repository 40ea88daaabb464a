//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the ingest-and-query workflow by composing
//! an [`EmbeddingAdapter`], a [`VectorStore`] and a [`Chunker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ragent_rag::{EmbeddingAdapter, InMemoryVectorStore, RagConfig, RagPipeline, RecursiveChunker};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedder(EmbeddingAdapter::new(Arc::new(my_provider)))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chunker(Arc::new(RecursiveChunker::new(1000, 200)?))
//!     .build()?;
//!
//! pipeline.recreate_collection("docs").await?;
//! pipeline.ingest("docs", &document).await?;
//! let results = pipeline.query("docs", "search query", 4).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult, chunk_id};
use crate::embedding::EmbeddingAdapter;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// Ingestion is chunk → embed → store; queries are embed → search. Errors
/// from the embedding adapter and the vector store are surfaced unchanged so
/// callers can tell transient failures from permanent ones. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedder: EmbeddingAdapter,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding adapter.
    pub fn embedder(&self) -> &EmbeddingAdapter {
        &self.embedder
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Create a named collection sized for the embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CollectionExists`] if the collection is present.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        let dimensions = self.embedder.dimensions();
        self.vector_store.create_collection(name, dimensions).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
        })?;
        info!(collection = name, dimensions, "collection created");
        Ok(())
    }

    /// Drop the collection if present and create it empty.
    pub async fn recreate_collection(&self, name: &str) -> Result<()> {
        let dimensions = self.embedder.dimensions();
        self.vector_store.recreate_collection(name, dimensions).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to recreate collection");
        })
    }

    /// Create the collection unless it already exists.
    pub async fn ensure_collection(&self, name: &str) -> Result<()> {
        if self.vector_store.collection_exists(name).await? {
            return Ok(());
        }
        self.create_collection(name).await
    }

    /// Delete a named collection. Deleting a missing collection succeeds.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.vector_store.delete_collection(name).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
        })?;
        info!(collection = name, "collection deleted");
        Ok(())
    }

    /// Number of records in a collection.
    pub async fn count(&self, collection: &str) -> Result<usize> {
        self.vector_store.count(collection).await
    }

    /// Ingest a single document: chunk → embed → store.
    ///
    /// All chunks are embedded before anything is written, so an embedding
    /// failure leaves the collection untouched. Ingesting a document id that
    /// is already stored replaces it: once the upsert succeeds, chunks of the
    /// previous version past the new chunk count are deleted. If the upsert
    /// fails, ids it may have added are deleted and the records it may have
    /// overwritten are written back, on a best-effort basis, before the error
    /// is returned.
    ///
    /// Returns the chunks that were stored (with embeddings attached).
    pub async fn ingest(&self, collection: &str, document: &Document) -> Result<Vec<Chunk>> {
        let mut chunks = self.chunker.chunk(document);
        if !chunks.is_empty() {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed(&texts).await.inspect_err(|e| {
                error!(collection, document.id = %document.id, error = %e, "embedding failed during ingestion");
            })?;
            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        // `{doc}_0` is always looked up: it carries the previous chunk count.
        let first_id = chunk_id(&document.id, 0);
        let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        if ids.is_empty() {
            ids.push(first_id.as_str());
        }
        let previous = self.vector_store.get(collection, &ids).await.inspect_err(|e| {
            error!(collection, document.id = %document.id, error = %e, "failed to read previous version");
        })?;
        let previous_total = previous
            .iter()
            .find(|c| c.id == first_id)
            .and_then(Chunk::total_chunks)
            .unwrap_or(0);

        if !chunks.is_empty() {
            if let Err(e) = self.vector_store.upsert(collection, &chunks).await {
                error!(collection, document.id = %document.id, error = %e, "upsert failed during ingestion");
                if !matches!(e, RagError::CollectionNotFound(_)) {
                    self.roll_back(collection, document, &chunks, &previous).await;
                }
                return Err(e);
            }
        }

        let stale: Vec<String> =
            (chunks.len()..previous_total).map(|i| chunk_id(&document.id, i)).collect();
        if !stale.is_empty() {
            let stale_ids: Vec<&str> = stale.iter().map(String::as_str).collect();
            self.vector_store.delete(collection, &stale_ids).await.inspect_err(|e| {
                error!(collection, document.id = %document.id, error = %e, "failed to delete chunks of the previous version");
            })?;
            debug!(collection, document.id = %document.id, removed = stale.len(), "deleted chunks of the previous version");
        }

        info!(collection, document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    async fn roll_back(
        &self,
        collection: &str,
        document: &Document,
        chunks: &[Chunk],
        previous: &[Chunk],
    ) {
        let added: Vec<&str> = chunks
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| !previous.iter().any(|p| p.id == *id))
            .collect();
        if !added.is_empty() {
            if let Err(e) = self.vector_store.delete(collection, &added).await {
                warn!(collection, document.id = %document.id, error = %e, "rollback after failed upsert did not complete");
            }
        }
        if !previous.is_empty() {
            if let Err(e) = self.vector_store.upsert(collection, previous).await {
                warn!(collection, document.id = %document.id, error = %e, "previous version could not be restored");
            }
        }
    }

    /// Ingest several documents in order.
    ///
    /// Stops at the first document that fails; documents ingested before it
    /// stay in the collection.
    pub async fn ingest_batch(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for document in documents {
            let chunks = self.ingest(collection, document).await?;
            all_chunks.extend(chunks);
        }
        Ok(all_chunks)
    }

    /// Embed `query` and return the `top_k` closest chunks, best first.
    pub async fn query(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }

        let query_embedding = self.embedder.embed_query(query).await.inspect_err(|e| {
            error!(collection, error = %e, "embedding failed during query");
        })?;

        let results =
            self.vector_store.search(collection, &query_embedding, top_k).await.inspect_err(
                |e| {
                    error!(collection, error = %e, "vector store search failed");
                },
            )?;

        info!(collection, top_k, result_count = results.len(), "query completed");
        Ok(results)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedder and vector store are required. Without an explicit chunker a
/// [`RecursiveChunker`] is built from the configuration, which defaults to
/// [`RagConfig::default()`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<EmbeddingAdapter>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding adapter.
    pub fn embedder(mut self, embedder: EmbeddingAdapter) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the configuration is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::from_config(&config)?),
        };

        Ok(RagPipeline { config, embedder, vector_store, chunker })
    }
}
