//! Single-shot question answering.
//!
//! [`RagPipeline::answer`] retrieves the closest chunks once, packs them into
//! a prompt and asks the model for one reply. No tools are offered, so the
//! model cannot search again; use the agent with a
//! [`RetrievalTool`](crate::RetrievalTool) for that.

use ragent_core::{Llm, LlmRequest, Message};
use tracing::{error, info};

use crate::document::SearchResult;
use crate::error::Result;
use crate::pipeline::RagPipeline;

/// Prompt used by [`RagPipeline::answer`]. `{context}` and `{question}` are
/// replaced before sending.
pub const ANSWER_TEMPLATE: &str = "You are a helpful assistant for answering questions about \
the documents in a knowledge base.
Use the following context from the documents to answer the question.
If you cannot find the answer in the context, say \"I don't have enough information to answer this question.\"

Context:
{context}

Question: {question}

Please provide a clear and detailed answer:";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    /// The model's reply.
    pub answer: String,
    /// Retrieved chunks, best first.
    pub sources: Vec<SearchResult>,
}

/// Join retrieved chunks into the prompt's context block.
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!("[Document {}] (Relevance: {:.4})\n{}", i + 1, result.score, result.chunk.text)
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn render_prompt(context: &str, question: &str) -> String {
    ANSWER_TEMPLATE.replace("{context}", context).replace("{question}", question)
}

impl RagPipeline {
    /// Retrieve the `top_k` closest chunks for `question` and have `llm`
    /// answer from them in a single request at temperature 0.
    ///
    /// # Errors
    ///
    /// Retrieval errors are returned as from [`query`](Self::query); model
    /// failures come back as [`RagError::Core`](crate::RagError::Core).
    pub async fn answer(
        &self,
        collection: &str,
        question: &str,
        top_k: usize,
        llm: &dyn Llm,
    ) -> Result<RagAnswer> {
        let sources = self.query(collection, question, top_k).await?;
        let prompt = render_prompt(&build_context(&sources), question);

        let request = LlmRequest::new(vec![Message::user(prompt)], Vec::new()).with_temperature(0.0);
        let reply = llm.generate(request).await.inspect_err(|e| {
            error!(collection, model = llm.name(), error = %e, "answer generation failed");
        })?;

        info!(collection, model = llm.name(), source_count = sources.len(), "answer generated");
        Ok(RagAnswer { answer: reply.content, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn result(text: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: "guide_0".into(),
                text: text.into(),
                embedding: Vec::new(),
                metadata: Default::default(),
                document_id: "guide".into(),
            },
            score,
        }
    }

    #[test]
    fn context_blocks_are_numbered_and_separated() {
        let context = build_context(&[result("alpha", 0.91234), result("beta", 0.5)]);
        assert_eq!(
            context,
            "[Document 1] (Relevance: 0.9123)\nalpha\n\n---\n\n[Document 2] (Relevance: 0.5000)\nbeta"
        );
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn prompt_carries_context_and_question() {
        let prompt = render_prompt("[Document 1] (Relevance: 1.0000)\nalpha", "What is alpha?");
        assert!(prompt.contains("Context:\n[Document 1] (Relevance: 1.0000)\nalpha\n\nQuestion: What is alpha?"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }
}
