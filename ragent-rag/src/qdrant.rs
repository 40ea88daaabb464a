//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragent_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.create_collection("docs", 384).await?;
//! store.upsert("docs", &chunks).await?;
//! let results = store.search("docs", &query_embedding, 5).await?;
//! ```

use async_trait::async_trait;
use std::collections::HashMap;

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    GetPointsBuilder, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder, VectorsOutput,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use tracing::debug;
use uuid::Uuid;

use crate::document::{Chunk, Metadata, MetadataValue, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, check_embedded, check_top_k};

const BACKEND: &str = "qdrant";

// gRPC status codes that mean the server could not be reached in time.
const GRPC_DEADLINE_EXCEEDED: i32 = 4;
const GRPC_NOT_FOUND: i32 = 5;
const GRPC_UNAVAILABLE: i32 = 14;

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Collections use cosine distance, so Qdrant's scores are already
/// similarities. Qdrant only accepts integer or UUID point ids; chunk ids are
/// mapped to UUIDv5 and the original id is kept in the payload.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(|e| map_err("connect", e))?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store with default URL (`http://localhost:6334`).
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    async fn ensure_exists(&self, collection: &str) -> Result<()> {
        if self.collection_exists(collection).await? {
            Ok(())
        } else {
            Err(RagError::CollectionNotFound(collection.to_string()))
        }
    }
}

/// Deterministic point id for a chunk id.
pub(crate) fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

fn map_err(operation: &str, e: QdrantError) -> RagError {
    if let QdrantError::ResponseError { status } = &e {
        let code = i32::from(status.code());
        if code == GRPC_UNAVAILABLE || code == GRPC_DEADLINE_EXCEEDED {
            return RagError::ServiceUnavailable {
                backend: BACKEND.to_string(),
                message: format!("{operation}: {}", status.message()),
            };
        }
        if code == GRPC_NOT_FOUND {
            return RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("{operation}: not found: {}", status.message()),
            };
        }
    }
    RagError::VectorStoreError { backend: BACKEND.to_string(), message: format!("{operation}: {e}") }
}

fn to_point(chunk: &Chunk) -> Result<PointStruct> {
    let payload_json = serde_json::json!({
        "chunk_id": chunk.id,
        "text": chunk.text,
        "document_id": chunk.document_id,
        "metadata": chunk.metadata,
    });
    let payload = Payload::try_from(payload_json).map_err(|e| map_err("payload", e))?;
    Ok(PointStruct::new(point_id(&chunk.id), chunk.embedding.clone(), payload))
}

fn extract_string(value: &QdrantValue) -> Option<String> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn extract_metadata_value(value: &QdrantValue) -> Option<MetadataValue> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(MetadataValue::Text(s.clone())),
        Some(Kind::IntegerValue(n)) => Some(MetadataValue::Int(*n)),
        Some(Kind::DoubleValue(x)) => Some(MetadataValue::Float(*x)),
        Some(Kind::BoolValue(b)) => Some(MetadataValue::Bool(*b)),
        _ => None,
    }
}

fn from_payload(payload: &HashMap<String, QdrantValue>, embedding: Vec<f32>) -> Chunk {
    let text = |key: &str| payload.get(key).and_then(extract_string).unwrap_or_default();
    Chunk {
        id: text("chunk_id"),
        text: text("text"),
        embedding,
        metadata: extract_metadata(payload.get("metadata")),
        document_id: text("document_id"),
    }
}

#[allow(deprecated)]
fn extract_vector(vectors: Option<VectorsOutput>) -> Vec<f32> {
    match vectors.and_then(|v| v.vectors_options) {
        Some(VectorsOptions::Vector(vector)) => vector.data,
        _ => Vec::new(),
    }
}

fn extract_metadata(value: Option<&QdrantValue>) -> Metadata {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::StructValue(s)) => s
            .fields
            .iter()
            .filter_map(|(k, v)| extract_metadata_value(v).map(|v| (k.clone(), v)))
            .collect(),
        _ => Metadata::new(),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if self.collection_exists(name).await? {
            return Err(RagError::CollectionExists(name.to_string()));
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| map_err("create collection", e))?;

        debug!(backend = BACKEND, collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }
        self.client.delete_collection(name).await.map_err(|e| map_err("delete collection", e))?;
        debug!(backend = BACKEND, collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client.collection_exists(name).await.map_err(|e| map_err("collection exists", e))
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        check_embedded(BACKEND, chunks)?;
        self.ensure_exists(collection).await?;

        let points = chunks.iter().map(to_point).collect::<Result<Vec<_>>>()?;
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| map_err("upsert", e))?;

        debug!(backend = BACKEND, collection, chunk_count = chunks.len(), "upserted chunks");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.ensure_exists(collection).await?;
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| point_id(id).into()).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(|e| map_err("delete points", e))?;

        debug!(backend = BACKEND, collection, count = ids.len(), "deleted points");
        Ok(())
    }

    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<Chunk>> {
        self.ensure_exists(collection).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| point_id(id).into()).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, point_ids).with_payload(true).with_vectors(true),
            )
            .await
            .map_err(|e| map_err("get points", e))?;

        let mut found: HashMap<String, Chunk> = response
            .result
            .into_iter()
            .map(|point| from_payload(&point.payload, extract_vector(point.vectors)))
            .map(|chunk| (chunk.id.clone(), chunk))
            .collect();
        Ok(ids.iter().filter_map(|id| found.remove(*id)).collect())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        check_top_k(top_k)?;
        self.ensure_exists(collection).await?;

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| map_err("search", e))?;

        let results = response
            .result
            .into_iter()
            .map(|scored| SearchResult {
                chunk: from_payload(&scored.payload, Vec::new()),
                score: scored.score,
            })
            .collect();

        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.ensure_exists(collection).await?;
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(|e| map_err("count", e))?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
