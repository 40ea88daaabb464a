//! Wiring and command handlers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use ragent_agent::{AgentRun, LlmAgentBuilder};
use ragent_core::{Retryable, RetryConfig};
use ragent_model::openai::{OpenAIClient, OpenAIConfig};
use ragent_rag::chroma::ChromaVectorStore;
use ragent_rag::openai::OpenAIEmbeddingProvider;
use ragent_rag::qdrant::QdrantVectorStore;
use ragent_rag::{
    Document, EmbeddingAdapter, EmbeddingProvider, HashEmbeddingProvider, RagConfig, RagPipeline,
    RetrievalTool, SearchResult, VectorStore, format_results,
};
use tracing::info;

use crate::cli::Command;
use crate::config::{AppConfig, EmbeddingBackend, VectorBackend};

const INSTRUCTION: &str = "You are a research assistant answering questions about the \
     documents in a knowledge base. Call the retrieve_documents tool to find relevant passages \
     before answering, and search again with a different query if the first results are not \
     enough. Base your answer only on the retrieved passages and cite their sources. If the \
     documents do not contain the answer, say so.";

/// The part of a run that failed.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Ingestion,
    Retrieval,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingestion => f.write_str("ingestion"),
            Self::Retrieval => f.write_str("retrieval"),
            Self::Generation => f.write_str("generation"),
        }
    }
}

/// Attach the failed stage and retry classification to an error.
trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Retryable + std::error::Error + Send + Sync + 'static,
{
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| {
            let hint = if e.is_retryable() { "retryable" } else { "not retryable" };
            anyhow::Error::new(e).context(format!("{stage} failed ({hint})"))
        })
    }
}

pub async fn run(command: Command, config: &AppConfig) -> Result<()> {
    let collection = config.collection.as_str();

    match command {
        Command::Ingest { reset, files } => {
            let pipeline = build_pipeline(config)?;
            ingest(&pipeline, collection, reset, &files).await
        }
        Command::Search { query, k } => {
            let pipeline = build_pipeline(config)?;
            let k = k.unwrap_or(config.retrieval_k);
            let results = pipeline.query(collection, &query, k).await.stage(Stage::Retrieval)?;
            println!("{}", format_results(&results));
            Ok(())
        }
        Command::Query { question, k } => {
            let pipeline = build_pipeline(config)?;
            let model = chat_model(config)?;
            let k = k.unwrap_or(config.retrieval_k);
            let answer =
                pipeline.answer(collection, &question, k, &model).await.stage(Stage::Generation)?;
            println!("{}\n", answer.answer);
            println!("{}", format_sources(&answer.sources));
            Ok(())
        }
        Command::Ask { question, transcript } => {
            let pipeline = Arc::new(build_pipeline(config)?);
            let run = ask(pipeline, config, &question).await?;
            if transcript {
                println!("{}", serde_json::to_string_pretty(&run.transcript)?);
            }
            println!("{}", run.answer);
            Ok(())
        }
        // Neither embeds anything, so no embedding key is needed.
        Command::Count => {
            let count = vector_store(config)?.count(collection).await.stage(Stage::Retrieval)?;
            println!("{count}");
            Ok(())
        }
        Command::Reset => {
            vector_store(config)?
                .recreate_collection(collection, config.dimensions())
                .await
                .stage(Stage::Ingestion)?;
            println!("Collection '{collection}' is empty");
            Ok(())
        }
    }
}

async fn ingest(
    pipeline: &RagPipeline,
    collection: &str,
    reset: bool,
    files: &[PathBuf],
) -> Result<()> {
    if reset {
        pipeline.recreate_collection(collection).await.stage(Stage::Ingestion)?;
    } else {
        pipeline.ensure_collection(collection).await.stage(Stage::Ingestion)?;
    }

    let mut total = 0;
    for path in files {
        let document = read_document(path).await?;
        let chunks = pipeline.ingest(collection, &document).await.stage(Stage::Ingestion)?;
        println!("{} -> {} chunk(s)", document.id, chunks.len());
        total += chunks.len();
    }
    info!(collection, documents = files.len(), chunk_count = total, "ingestion finished");
    Ok(())
}

async fn read_document(path: &Path) -> Result<Document> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let absolute = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let cwd = match std::env::current_dir() {
        Ok(dir) => tokio::fs::canonicalize(dir).await.ok(),
        Err(_) => None,
    };
    let id = document_id(&absolute, cwd.as_deref());
    Ok(Document::new(id, text).with_source(path.display().to_string()))
}

/// Id for a file's chunks: the path relative to `cwd` when the file lies
/// below it, otherwise the full path. Two files never share an id.
fn document_id(path: &Path, cwd: Option<&Path>) -> String {
    cwd.and_then(|cwd| path.strip_prefix(cwd).ok())
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// One line per source: rank, origin, chunk number and score.
fn format_sources(sources: &[SearchResult]) -> String {
    if sources.is_empty() {
        return "Sources: none".to_string();
    }
    let mut lines = vec!["Sources:".to_string()];
    for (i, source) in sources.iter().enumerate() {
        let chunk = source.chunk.chunk_index().map_or_else(|| "?".to_string(), |n| n.to_string());
        lines.push(format!(
            "Source {}: {} chunk {chunk} (score: {:.4})",
            i + 1,
            source.chunk.source(),
            source.score
        ));
    }
    lines.join("\n")
}

fn chat_model(config: &AppConfig) -> Result<OpenAIClient> {
    let api_key = config
        .llm_api_key
        .clone()
        .context("LLM_API_KEY (or DEEPSEEK_API_KEY) must be set to ask questions")?;
    let model = OpenAIClient::new(
        OpenAIConfig::compatible(api_key, &config.llm_base_url, &config.llm_model)
            .with_timeout(config.request_timeout)
            .with_temperature(0.0),
    )?
    .with_retry(RetryConfig::new(config.retry_max_attempts));
    Ok(model)
}

async fn ask(pipeline: Arc<RagPipeline>, config: &AppConfig, question: &str) -> Result<AgentRun> {
    let model = chat_model(config)?;

    let tool = RetrievalTool::new(pipeline, config.collection.clone())?;

    let agent = LlmAgentBuilder::new("research_assistant")
        .description("Answers questions from the ingested documents.")
        .instruction(INSTRUCTION)
        .model(Arc::new(model))
        .tool(Arc::new(tool))
        .max_rounds(config.max_rounds)
        .build()?;

    agent.run(question).await.stage(Stage::Generation)
}

fn build_pipeline(config: &AppConfig) -> Result<RagPipeline> {
    let retry = RetryConfig::new(config.retry_max_attempts);
    let embedder = EmbeddingAdapter::new(embedding_provider(config)?).with_retry(retry);

    let rag_config = RagConfig::builder()
        .chunk_size(config.chunk_size)
        .chunk_overlap(config.chunk_overlap)
        .top_k(config.retrieval_k)
        .build()?;

    let pipeline = RagPipeline::builder()
        .config(rag_config)
        .embedder(embedder)
        .vector_store(vector_store(config)?)
        .build()?;
    Ok(pipeline)
}

fn embedding_provider(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding_provider {
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbeddingProvider::new(config.dimensions()))),
        EmbeddingBackend::OpenAI => {
            let api_key = config
                .embedding_api_key
                .clone()
                .context("EMBEDDING_API_KEY (or OPENAI_API_KEY) must be set")?;
            let mut provider = OpenAIEmbeddingProvider::new(api_key)?
                .with_base_url(&config.embedding_base_url)
                .with_model(&config.embedding_model)
                .with_timeout(config.request_timeout);
            if let Some(dimensions) = config.embedding_dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Ok(Arc::new(provider))
        }
    }
}

fn vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    let url = config.vector_store_url.as_str();
    let store: Arc<dyn VectorStore> = match config.vector_store {
        VectorBackend::Chroma => {
            Arc::new(ChromaVectorStore::new(url)?.with_timeout(config.request_timeout))
        }
        VectorBackend::Qdrant => Arc::new(QdrantVectorStore::new(url)?),
    };
    info!(backend = %config.vector_store, url, "vector store configured");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use ragent_rag::Chunk;
    use ragent_rag::document::{CHUNK_INDEX_KEY, SOURCE_KEY};

    use super::*;

    #[test]
    fn document_ids_keep_directories() {
        let cwd = Path::new("/work/docs");
        assert_eq!(document_id(Path::new("/work/docs/a/README.md"), Some(cwd)), "a/README.md");
        assert_eq!(document_id(Path::new("/work/docs/b/README.md"), Some(cwd)), "b/README.md");
        assert_eq!(document_id(Path::new("/srv/notes.txt"), Some(cwd)), "/srv/notes.txt");
        assert_eq!(document_id(Path::new("/srv/notes.txt"), None), "/srv/notes.txt");
    }

    #[test]
    fn sources_list_chunk_and_score() {
        let mut chunk = Chunk {
            id: "guide_2".into(),
            text: "alpha".into(),
            embedding: Vec::new(),
            metadata: Default::default(),
            document_id: "guide".into(),
        };
        chunk.metadata.insert(SOURCE_KEY.into(), "guide.md".into());
        chunk.metadata.insert(CHUNK_INDEX_KEY.into(), 2usize.into());
        let sources = [SearchResult { chunk, score: 0.87654 }];

        assert_eq!(format_sources(&sources), "Sources:\nSource 1: guide.md chunk 2 (score: 0.8765)");
        assert_eq!(format_sources(&[]), "Sources: none");
    }

    #[test]
    fn store_commands_do_not_need_an_embedding_key() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert!(config.embedding_api_key.is_none());

        assert!(vector_store(&config).is_ok());
        let err = build_pipeline(&config).err().unwrap();
        assert!(err.to_string().contains("EMBEDDING_API_KEY"));
    }
}
