//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;
use tracing::info;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s and support
/// upserting, deleting, and searching by vector similarity. Scores returned by
/// [`search`](VectorStore::search) are cosine similarities on every backend:
/// higher means closer.
///
/// Operations against a collection that does not exist fail with
/// [`RagError::CollectionNotFound`]. Connection failures and timeouts are
/// reported as [`RagError::ServiceUnavailable`].
///
/// # Example
///
/// ```rust,ignore
/// use ragent_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Create a named collection.
    ///
    /// Fails with [`RagError::CollectionExists`] if it is already present.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data. Deleting a missing
    /// collection succeeds.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Drop the collection if present, then create it empty.
    async fn recreate_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.delete_collection(name).await?;
        self.create_collection(name, dimensions).await?;
        info!(backend = self.name(), collection = name, dimensions, "collection recreated");
        Ok(())
    }

    /// Insert chunks, replacing records that share an id. Chunks must have
    /// embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Fetch stored chunks by id, embeddings included.
    ///
    /// Unknown ids are skipped; the chunks that exist come back in the order
    /// of `ids`.
    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<Chunk>>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns at most `top_k` results ordered by descending similarity score.
    /// `top_k == 0` is a [`RagError::ConfigError`].
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Reject a zero `top_k` before any backend work is done.
pub(crate) fn check_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
    }
    Ok(())
}

/// Reject chunks that were never embedded.
pub(crate) fn check_embedded(backend: &str, chunks: &[Chunk]) -> Result<()> {
    match chunks.iter().find(|chunk| chunk.embedding.is_empty()) {
        Some(chunk) => Err(RagError::VectorStoreError {
            backend: backend.to_string(),
            message: format!("chunk '{}' has no embedding", chunk.id),
        }),
        None => Ok(()),
    }
}
