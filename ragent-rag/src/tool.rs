//! Agentic retrieval tool.
//!
//! The [`RetrievalTool`] wraps a [`RagPipeline`] as a [`ragent_core::Tool`]
//! so that agents can search a collection as a tool call.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragent_rag::{RagPipeline, RetrievalTool};
//!
//! let pipeline = Arc::new(build_pipeline()?);
//! let tool = RetrievalTool::new(pipeline, "documents")?;
//!
//! // The model calls the tool with:
//! // { "query": "How do I configure X?", "numResults": 5 }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::Validator;
use ragent_core::{RagentError, Tool};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::pipeline::RagPipeline;

/// Default tool name advertised to the model.
pub const DEFAULT_TOOL_NAME: &str = "retrieve_documents";

/// Text returned when a search matches nothing.
pub const NO_RESULTS: &str = "No relevant documents found.";

const DEFAULT_DESCRIPTION: &str = "Retrieve relevant documents from the knowledge base. \
    Use this tool when you need specific information to answer the user's question.";

/// A retrieval tool that searches one collection through a [`RagPipeline`].
///
/// Arguments are checked against the tool's JSON Schema before anything is
/// embedded: `query` (string, required) and `numResults` (integer >= 1,
/// optional). The result is a single text block listing each match with its
/// similarity score, source and content, or [`NO_RESULTS`] when the search
/// comes back empty.
pub struct RetrievalTool {
    pipeline: Arc<RagPipeline>,
    collection: String,
    name: String,
    description: String,
    default_results: usize,
    validator: Validator,
}

impl RetrievalTool {
    /// Create a tool searching `collection`. Calls without `numResults` get
    /// the pipeline's configured `top_k`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the argument schema fails to compile.
    pub fn new(pipeline: Arc<RagPipeline>, collection: impl Into<String>) -> Result<Self> {
        let default_results = pipeline.config().top_k;
        let validator = Validator::new(&arguments_schema(default_results))
            .map_err(|e| RagError::ConfigError(format!("invalid tool schema: {e}")))?;
        Ok(Self {
            pipeline,
            collection: collection.into(),
            name: DEFAULT_TOOL_NAME.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            default_results,
            validator,
        })
    }

    /// Advertise the tool under another name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the description shown to the model.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn check_arguments(&self, args: &Value) -> ragent_core::Result<()> {
        let problems: Vec<String> = self.validator.iter_errors(args).map(|e| e.to_string()).collect();
        if problems.is_empty() {
            return Ok(());
        }
        Err(RagentError::InvalidToolArguments { tool: self.name.clone(), message: problems.join("; ") })
    }
}

fn arguments_schema(default_results: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query to find relevant documents"
            },
            "numResults": {
                "type": "integer",
                "minimum": 1,
                "default": default_results,
                "description": "Number of documents to retrieve"
            }
        },
        "required": ["query"]
    })
}

/// `numResults` from arguments that already passed the schema.
///
/// JSON Schema counts `3.0` as an integer, so whole floats are accepted too.
fn requested_results(args: &Value, default: usize) -> usize {
    let Some(n) = args.get("numResults") else {
        return default;
    };
    n.as_u64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 1.0).map(|f| f as u64))
        .map_or(default, |n| n as usize)
}

/// Render search results as the text block handed back to the model.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let chunk = &result.chunk;
            let source = match (chunk.chunk_index(), chunk.total_chunks()) {
                (Some(index), Some(total)) => {
                    format!("{} (chunk {}/{total})", chunk.source(), index + 1)
                }
                _ => chunk.source().to_string(),
            };
            format!(
                "Document {} (Similarity: {:.4}):\nSource: {source}\nContent: {}\n---",
                i + 1,
                result.score,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        arguments_schema(self.default_results)
    }

    async fn execute(&self, args: Value) -> ragent_core::Result<Value> {
        self.check_arguments(&args)?;

        let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
        let top_k = requested_results(&args, self.default_results);

        info!(tool = %self.name, query, top_k, collection = %self.collection, "retrieval tool called");

        let results = self.pipeline.query(&self.collection, query, top_k).await.map_err(|e| {
            error!(tool = %self.name, error = %e, "retrieval failed");
            RagentError::from(e)
        })?;

        Ok(Value::String(format_results(&results)))
    }
}
