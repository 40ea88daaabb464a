//! End-to-end tests for ingestion, querying and the retrieval tool, using the
//! hashing embedder and the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragent_core::{Message, RagentError, Tool};
use ragent_model::MockLlm;
use ragent_rag::document::{Chunk, Document, SearchResult};
use ragent_rag::error::{RagError, Result};
use ragent_rag::{
    EmbeddingAdapter, HashEmbeddingProvider, InMemoryVectorStore, NO_RESULTS, RagConfig,
    RagPipeline, RetrievalTool, VectorStore,
};
use serde_json::json;

fn sized_pipeline(store: Arc<dyn VectorStore>, config: RagConfig, dimensions: usize) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedder(EmbeddingAdapter::new(Arc::new(HashEmbeddingProvider::new(dimensions))))
        .vector_store(store)
        .build()
        .unwrap()
}

fn pipeline_with(store: Arc<dyn VectorStore>, config: RagConfig) -> RagPipeline {
    sized_pipeline(store, config, 128)
}

fn pipeline() -> RagPipeline {
    pipeline_with(Arc::new(InMemoryVectorStore::new()), RagConfig::default())
}

fn handbook() -> Document {
    Document::new(
        "handbook",
        "Vacation policy: employees receive twenty days of paid vacation.\n\n\
         Expense policy: receipts are required for every expense above fifty dollars.\n\n\
         Security policy: laptops must use full disk encryption.",
    )
    .with_source("handbook.md")
}

#[tokio::test]
async fn ingest_then_query_finds_relevant_chunk() {
    let pipeline = pipeline_with(
        Arc::new(InMemoryVectorStore::new()),
        RagConfig::builder().chunk_size(90).chunk_overlap(10).build().unwrap(),
    );
    pipeline.create_collection("docs").await.unwrap();

    let chunks = pipeline.ingest("docs", &handbook()).await.unwrap();
    assert!(chunks.len() >= 3);
    assert_eq!(pipeline.count("docs").await.unwrap(), chunks.len());
    assert!(chunks.iter().all(|c| c.embedding.len() == 128));

    let results = pipeline.query("docs", "disk encryption for laptops", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].chunk.text.contains("encryption"));
    assert_eq!(results[0].chunk.source(), "handbook.md");
}

#[tokio::test]
async fn empty_document_stores_nothing() {
    let pipeline = pipeline();
    pipeline.create_collection("docs").await.unwrap();

    let chunks = pipeline.ingest("docs", &Document::new("empty", "")).await.unwrap();
    assert!(chunks.is_empty());
    assert_eq!(pipeline.count("docs").await.unwrap(), 0);
}

#[tokio::test]
async fn reingesting_replaces_chunks() {
    let pipeline = pipeline();
    pipeline.create_collection("docs").await.unwrap();

    pipeline.ingest("docs", &handbook()).await.unwrap();
    pipeline.ingest("docs", &handbook()).await.unwrap();
    assert_eq!(pipeline.count("docs").await.unwrap(), 1);
}

#[tokio::test]
async fn shorter_reingest_drops_leftover_chunks() {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = pipeline_with(
        store.clone(),
        RagConfig::builder().chunk_size(20).chunk_overlap(5).build().unwrap(),
    );
    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("notes", "kept apart")).await.unwrap();

    let long = pipeline.ingest("docs", &Document::new("guide", "word ".repeat(40))).await.unwrap();
    assert!(long.len() > 5);
    assert_eq!(pipeline.count("docs").await.unwrap(), long.len() + 1);

    pipeline.ingest("docs", &Document::new("guide", "short text")).await.unwrap();
    assert_eq!(pipeline.count("docs").await.unwrap(), 2);

    let stored = store.get("docs", &["guide_0", "guide_1", "notes_0"]).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].text, "short text");
    assert_eq!(stored[0].total_chunks(), Some(1));
    assert_eq!(stored[1].id, "notes_0");
}

#[tokio::test]
async fn reingesting_as_empty_removes_the_document() {
    let pipeline = pipeline();
    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &handbook()).await.unwrap();

    let chunks = pipeline.ingest("docs", &Document::new("handbook", "")).await.unwrap();
    assert!(chunks.is_empty());
    assert_eq!(pipeline.count("docs").await.unwrap(), 0);
}

#[tokio::test]
async fn rejected_reingest_keeps_the_previous_version() {
    let store = Arc::new(InMemoryVectorStore::new());
    let narrow = sized_pipeline(store.clone(), RagConfig::default(), 8);
    let wide = sized_pipeline(store.clone(), RagConfig::default(), 16);
    narrow.create_collection("docs").await.unwrap();
    let original = narrow.ingest("docs", &handbook()).await.unwrap();

    let updated = Document::new("handbook", "Vacation policy: thirty days.").with_source("handbook.md");
    let err = wide.ingest("docs", &updated).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStoreError { .. }));

    assert_eq!(narrow.count("docs").await.unwrap(), original.len());
    let stored = store.get("docs", &["handbook_0"]).await.unwrap();
    assert_eq!(stored, original);
}

#[tokio::test]
async fn ensure_and_recreate_collection() {
    let pipeline = pipeline();
    pipeline.ensure_collection("docs").await.unwrap();
    pipeline.ensure_collection("docs").await.unwrap();
    pipeline.ingest("docs", &handbook()).await.unwrap();

    pipeline.recreate_collection("docs").await.unwrap();
    assert_eq!(pipeline.count("docs").await.unwrap(), 0);

    assert!(matches!(
        pipeline.create_collection("docs").await,
        Err(RagError::CollectionExists(_))
    ));
}

#[tokio::test]
async fn query_with_zero_k_is_a_config_error() {
    let pipeline = pipeline();
    pipeline.create_collection("docs").await.unwrap();
    assert!(matches!(pipeline.query("docs", "x", 0).await, Err(RagError::ConfigError(_))));
}

/// Writes the first chunk of each batch and then fails, recording rollbacks.
struct HalfWritingStore {
    inner: InMemoryVectorStore,
    deletes: AtomicUsize,
}

#[async_trait]
impl VectorStore for HalfWritingStore {
    fn name(&self) -> &str {
        "half-writing"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.inner.create_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.inner.collection_exists(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.inner.upsert(collection, &chunks[..1]).await?;
        Err(RagError::ServiceUnavailable {
            backend: "half-writing".into(),
            message: "connection reset".into(),
        })
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(collection, ids).await
    }

    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<Chunk>> {
        self.inner.get(collection, ids).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.inner.search(collection, embedding, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }
}

#[tokio::test]
async fn failed_upsert_rolls_back_partial_writes() {
    let store = Arc::new(HalfWritingStore { inner: InMemoryVectorStore::new(), deletes: AtomicUsize::new(0) });
    let pipeline = pipeline_with(store.clone(), RagConfig::default());
    pipeline.create_collection("docs").await.unwrap();

    let err = pipeline.ingest("docs", &handbook()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.count("docs").await.unwrap(), 0);
}

#[tokio::test]
async fn ingest_into_missing_collection_fails() {
    let pipeline = pipeline();
    let err = pipeline.ingest("nowhere", &handbook()).await.unwrap_err();
    assert!(matches!(err, RagError::CollectionNotFound(_)));
}

#[tokio::test]
async fn answer_sends_retrieved_context_to_the_model() {
    let pipeline = pipeline();
    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &handbook()).await.unwrap();

    let llm = MockLlm::new(vec![Message::assistant("Twenty days.")]);
    let answer = pipeline.answer("docs", "How many vacation days?", 4, &llm).await.unwrap();
    assert_eq!(answer.answer, "Twenty days.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk.chunk_index(), Some(0));

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].temperature, Some(0.0));
    assert!(requests[0].tools.is_empty());
    let prompt = &requests[0].messages[0].content;
    assert!(prompt.contains("[Document 1] (Relevance: "));
    assert!(prompt.contains("Vacation policy: employees receive twenty days"));
    assert!(prompt.contains("Question: How many vacation days?"));
}

#[tokio::test]
async fn answer_surfaces_model_failures() {
    let pipeline = pipeline();
    pipeline.create_collection("docs").await.unwrap();

    let llm = MockLlm::new(Vec::<Message>::new());
    let err = pipeline.answer("docs", "anything", 2, &llm).await.unwrap_err();
    assert!(matches!(err, RagError::Core(_)));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn retrieval_tool_formats_matches() {
    let pipeline = Arc::new(pipeline());
    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &handbook()).await.unwrap();

    let tool = RetrievalTool::new(pipeline, "docs").unwrap();
    assert_eq!(tool.name(), "retrieve_documents");
    assert_eq!(tool.declaration().parameters["required"], json!(["query"]));

    let output = tool.execute(json!({ "query": "vacation days", "numResults": 2 })).await.unwrap();
    let text = output.as_str().unwrap();
    assert!(text.starts_with("Document 1 (Similarity: "));
    assert!(text.contains("Source: handbook.md (chunk 1/1)"));
    assert!(text.contains("Content: Vacation policy"));
    assert!(text.ends_with("---"));
}

#[tokio::test]
async fn retrieval_tool_defaults_to_configured_top_k() {
    let pipeline = Arc::new(pipeline_with(
        Arc::new(InMemoryVectorStore::new()),
        RagConfig::builder().chunk_size(90).chunk_overlap(10).top_k(1).build().unwrap(),
    ));
    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &handbook()).await.unwrap();

    let tool = RetrievalTool::new(pipeline, "docs").unwrap();
    assert_eq!(tool.declaration().parameters["properties"]["numResults"]["default"], json!(1));

    let output = tool.execute(json!({ "query": "policy" })).await.unwrap();
    let text = output.as_str().unwrap();
    assert!(text.contains("Document 1 "));
    assert!(!text.contains("Document 2 "));

    let output = tool.execute(json!({ "query": "policy", "numResults": 2.0 })).await.unwrap();
    assert!(output.as_str().unwrap().contains("Document 2 "));
}

#[tokio::test]
async fn retrieval_tool_on_empty_collection_returns_sentinel() {
    let pipeline = Arc::new(pipeline());
    pipeline.create_collection("docs").await.unwrap();

    let tool = RetrievalTool::new(pipeline, "docs").unwrap();
    let output = tool.execute(json!({ "query": "anything" })).await.unwrap();
    assert_eq!(output, json!(NO_RESULTS));
}

#[tokio::test]
async fn retrieval_tool_rejects_missing_query() {
    let pipeline = Arc::new(pipeline());
    pipeline.create_collection("docs").await.unwrap();

    let tool = RetrievalTool::new(pipeline, "docs").unwrap().with_name("search_handbook");
    let err = tool.execute(json!({ "numResults": 3 })).await.unwrap_err();
    assert!(matches!(
        err,
        RagentError::InvalidToolArguments { ref tool, .. } if tool == "search_handbook"
    ));
}

#[tokio::test]
async fn retrieval_tool_surfaces_missing_collection() {
    let tool = RetrievalTool::new(Arc::new(pipeline()), "docs").unwrap();
    let err = tool.execute(json!({ "query": "x" })).await.unwrap_err();
    assert!(matches!(err, RagentError::Tool(ref m) if m.contains("docs")));
}
