//! Chroma vector store backend.
//!
//! Provides [`ChromaVectorStore`] which implements [`VectorStore`] against the
//! Chroma HTTP API (v2) using `reqwest`.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragent_rag::chroma::ChromaVectorStore;
//!
//! let store = ChromaVectorStore::new("http://localhost:8000")?;
//! store.recreate_collection("documents", 1536).await?;
//! store.upsert("documents", &chunks).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::{Chunk, Metadata, SOURCE_ID_KEY, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, check_embedded, check_top_k};

const BACKEND: &str = "chroma";
const DEFAULT_TENANT: &str = "default_tenant";
const DEFAULT_DATABASE: &str = "default_database";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`VectorStore`] backed by a [Chroma](https://www.trychroma.com/) server.
///
/// Collections are created with the cosine distance space; Chroma reports
/// distances, which are converted to similarities as `1 - distance`.
pub struct ChromaVectorStore {
    client: reqwest::Client,
    base_url: String,
    tenant: String,
    database: String,
    timeout: Duration,
}

impl ChromaVectorStore {
    /// Create a store talking to the Chroma server at `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let base_url = url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RagError::ConfigError("Chroma URL must not be empty".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            tenant: DEFAULT_TENANT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Use another tenant than `default_tenant`.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Use another database than `default_database`.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let mut request = self.client.request(method, &url).timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| {
            error!(backend = BACKEND, url = %url, error = %e, "request failed");
            if e.is_timeout() || e.is_connect() {
                RagError::ServiceUnavailable { backend: BACKEND.to_string(), message: e.to_string() }
            } else {
                RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
            }
        })
    }

    async fn expect_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        response.json().await.map_err(|e| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("failed to parse response: {e}"),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(backend = BACKEND, %status, "API error");
        Err(status_error(status, &body))
    }

    /// Look up a collection's id by name.
    async fn collection_id(&self, name: &str) -> Result<String> {
        let url = format!("{}/{name}", self.collections_url());
        let response = self.send::<()>(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RagError::CollectionNotFound(name.to_string()));
        }
        let collection: CollectionModel = Self::expect_json(response).await?;
        Ok(collection.id)
    }
}

fn status_error(status: StatusCode, body: &str) -> RagError {
    let message = format!("API returned {status}: {body}");
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        RagError::ServiceUnavailable { backend: BACKEND.to_string(), message }
    } else {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message }
    }
}

// ── Chroma API request/response types ──────────────────────────────

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: serde_json::Value,
    get_or_create: bool,
}

#[derive(Deserialize)]
struct CollectionModel {
    id: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a Metadata>,
}

impl<'a> UpsertRequest<'a> {
    fn from_chunks(chunks: &'a [Chunk]) -> Self {
        Self {
            ids: chunks.iter().map(|c| c.id.as_str()).collect(),
            embeddings: chunks.iter().map(|c| c.embedding.as_slice()).collect(),
            documents: chunks.iter().map(|c| c.text.as_str()).collect(),
            metadatas: chunks.iter().map(|c| &c.metadata).collect(),
        }
    }
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [&'a str],
}

#[derive(Serialize)]
struct GetRequest<'a> {
    ids: &'a [&'a str],
    include: [&'static str; 3],
}

#[derive(Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    embeddings: Option<Vec<Option<Vec<f32>>>>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Metadata>>>,
}

impl GetResponse {
    fn into_chunks(self) -> Vec<Chunk> {
        let mut embeddings = self.embeddings.unwrap_or_default();
        let mut documents = self.documents.unwrap_or_default();
        let mut metadatas = self.metadatas.unwrap_or_default();
        embeddings.resize(self.ids.len(), None);
        documents.resize(self.ids.len(), None);
        metadatas.resize(self.ids.len(), None);

        self.ids
            .into_iter()
            .zip(embeddings)
            .zip(documents)
            .zip(metadatas)
            .map(|(((id, embedding), text), metadata)| {
                let metadata = metadata.unwrap_or_default();
                Chunk {
                    id,
                    text: text.unwrap_or_default(),
                    embedding: embedding.unwrap_or_default(),
                    document_id: document_id(&metadata),
                    metadata,
                }
            })
            .collect()
    }
}

fn document_id(metadata: &Metadata) -> String {
    metadata.get(SOURCE_ID_KEY).map(ToString::to_string).unwrap_or_default()
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 3],
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    /// Flatten the single-query response into similarity-scored results.
    fn into_results(self) -> Vec<SearchResult> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut documents = self.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let mut metadatas = self.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
        let mut distances = self.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();
        documents.resize(ids.len(), None);
        metadatas.resize(ids.len(), None);
        distances.resize(ids.len(), None);

        ids.into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(distances)
            .map(|(((id, text), metadata), distance)| {
                let metadata = metadata.unwrap_or_default();
                SearchResult {
                    chunk: Chunk {
                        id,
                        text: text.unwrap_or_default(),
                        embedding: Vec::new(),
                        document_id: document_id(&metadata),
                        metadata,
                    },
                    score: 1.0 - distance.unwrap_or(1.0),
                }
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let body = CreateCollectionRequest {
            name,
            metadata: serde_json::json!({ "hnsw:space": "cosine" }),
            get_or_create: false,
        };
        let response = self.send(Method::POST, self.collections_url(), Some(&body)).await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(RagError::CollectionExists(name.to_string()));
        }
        let _: CollectionModel = Self::expect_json(response).await?;
        debug!(backend = BACKEND, collection = name, dimensions, "created chroma collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let url = format!("{}/{name}", self.collections_url());
        let response = self.send::<()>(Method::DELETE, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status(response).await?;
        debug!(backend = BACKEND, collection = name, "deleted chroma collection");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        match self.collection_id(name).await {
            Ok(_) => Ok(true),
            Err(RagError::CollectionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        check_embedded(BACKEND, chunks)?;
        let id = self.collection_id(collection).await?;
        if chunks.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{id}/upsert", self.collections_url());
        let response =
            self.send(Method::POST, url, Some(&UpsertRequest::from_chunks(chunks))).await?;
        Self::check_status(response).await?;
        debug!(backend = BACKEND, collection, chunk_count = chunks.len(), "upserted chunks");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let id = self.collection_id(collection).await?;
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{id}/delete", self.collections_url());
        let response = self.send(Method::POST, url, Some(&DeleteRequest { ids })).await?;
        Self::check_status(response).await?;
        debug!(backend = BACKEND, collection, count = ids.len(), "deleted records");
        Ok(())
    }

    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<Chunk>> {
        let id = self.collection_id(collection).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/{id}/get", self.collections_url());
        let body = GetRequest { ids, include: ["embeddings", "documents", "metadatas"] };
        let response = self.send(Method::POST, url, Some(&body)).await?;
        let parsed: GetResponse = Self::expect_json(response).await?;

        let mut found = parsed.into_chunks();
        // Chroma does not promise to answer in request order.
        found.sort_by_key(|chunk| ids.iter().position(|id| *id == chunk.id));
        Ok(found)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        check_top_k(top_k)?;
        let id = self.collection_id(collection).await?;
        let url = format!("{}/{id}/query", self.collections_url());
        let body = QueryRequest {
            query_embeddings: [embedding],
            n_results: top_k,
            include: ["documents", "metadatas", "distances"],
        };
        let response = self.send(Method::POST, url, Some(&body)).await?;
        let parsed: QueryResponse = Self::expect_json(response).await?;
        Ok(parsed.into_results())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let id = self.collection_id(collection).await?;
        let url = format!("{}/{id}/count", self.collections_url());
        let response = self.send::<()>(Method::GET, url, None).await?;
        Self::expect_json(response).await
    }
}
