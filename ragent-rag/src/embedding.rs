//! Embedding providers and the batching, retrying [`EmbeddingAdapter`].

use std::sync::Arc;

use async_trait::async_trait;
use ragent_core::retry::{RetryConfig, with_retry};
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap one embedding backend behind a unified async
/// interface; a single call maps to a single backend request. Batching,
/// retries and response validation live in [`EmbeddingAdapter`].
///
/// # Example
///
/// ```rust,ignore
/// use ragent_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed_query("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Embed a batch of document texts, one vector per input, in input order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query.
    ///
    /// The default implementation embeds the query as a one-element document
    /// batch. Backends with a dedicated query mode should override it.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text]).await?;
        if vectors.len() != 1 {
            return Err(RagError::embedding(
                self.name(),
                format!("expected 1 vector for query, got {}", vectors.len()),
            ));
        }
        Ok(vectors.remove(0))
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Largest batch the backend accepts in one request.
    fn max_batch_size(&self) -> usize {
        64
    }
}

/// Batches texts through an [`EmbeddingProvider`] with bounded retries.
///
/// Output is length- and order-preserving. A batch that still fails after
/// the retry budget, or that returns the wrong number of vectors or vectors
/// of the wrong dimension, fails the whole call; vectors already computed for
/// earlier batches are discarded.
#[derive(Clone)]
pub struct EmbeddingAdapter {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    retry: RetryConfig,
}

impl EmbeddingAdapter {
    /// Wrap a provider using its maximum batch size and the default retry policy.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let batch_size = provider.max_batch_size().max(1);
        Self { provider, batch_size, retry: RetryConfig::default() }
    }

    /// Use smaller batches than the provider allows.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, self.provider.max_batch_size().max(1));
        self
    }

    /// Set the retry policy for transient failures.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Dimensionality of the vectors this adapter returns.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Number of texts sent per backend request.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed document texts; `output[i]` is the vector of `texts[i]`.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(
                provider = self.provider.name(),
                batch_index,
                batch_size = batch.len(),
                "embedding batch"
            );
            let embedded = with_retry(&self.retry, || self.provider.embed_documents(batch))
                .await
                .inspect_err(|e| {
                    error!(provider = self.provider.name(), batch_index, error = %e, "embedding failed");
                })?;

            if embedded.len() != batch.len() {
                return Err(RagError::embedding(
                    self.provider.name(),
                    format!("expected {} vectors, got {}", batch.len(), embedded.len()),
                ));
            }
            for vector in &embedded {
                self.check_dimensions(vector)?;
            }
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Embed a single search query.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vector = with_retry(&self.retry, || self.provider.embed_query(text))
            .await
            .inspect_err(|e| {
                error!(provider = self.provider.name(), error = %e, "query embedding failed");
            })?;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        let expected = self.provider.dimensions();
        if vector.len() != expected {
            return Err(RagError::embedding(
                self.provider.name(),
                format!("expected {expected}-dimensional vector, got {}", vector.len()),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for EmbeddingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingAdapter")
            .field("provider", &self.provider.name())
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns `[len, 1.0]` per text and fails the first `failures` calls.
    struct ScriptedProvider {
        failures: usize,
        transient: bool,
        calls: AtomicUsize,
        batches: Mutex<Vec<usize>>,
        drop_last: bool,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                failures: 0,
                transient: true,
                calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
                drop_last: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.transient {
                    RagError::embedding_transient("scripted", "503 Service Unavailable")
                } else {
                    RagError::embedding("scripted", "401 Unauthorized")
                });
            }
            self.batches.lock().unwrap().push(texts.len());
            let mut vectors: Vec<Vec<f32>> =
                texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect();
            if self.drop_last {
                vectors.pop();
            }
            Ok(vectors)
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn max_batch_size(&self) -> usize {
            3
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts).with_initial_delay(std::time::Duration::from_millis(1))
    }

    #[tokio::test]
    async fn preserves_order_across_batches() {
        let provider = Arc::new(ScriptedProvider::new());
        let adapter = EmbeddingAdapter::new(provider.clone());
        let texts = ["a", "bb", "ccc", "dddd", "eeeee", "ffffff", "g"];

        let vectors = adapter.embed(&texts).await.unwrap();

        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1.0]);
        assert_eq!(*provider.batches.lock().unwrap(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn batch_size_is_capped_by_provider() {
        let adapter = EmbeddingAdapter::new(Arc::new(ScriptedProvider::new())).with_batch_size(100);
        assert_eq!(adapter.batch_size(), 3);
        let adapter = adapter.with_batch_size(0);
        assert_eq!(adapter.batch_size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let provider = Arc::new(ScriptedProvider { failures: 2, ..ScriptedProvider::new() });
        let adapter = EmbeddingAdapter::new(provider.clone()).with_retry(fast_retry(3));

        let vectors = adapter.embed(&["x", "yy"]).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_error_after_budget_and_discards_partial_results() {
        let provider = Arc::new(ScriptedProvider { failures: 10, ..ScriptedProvider::new() });
        let adapter = EmbeddingAdapter::new(provider.clone()).with_retry(fast_retry(2));

        let err = adapter.embed(&["a", "b", "c", "d"]).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { transient: true, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider {
            failures: 1,
            transient: false,
            ..ScriptedProvider::new()
        });
        let adapter = EmbeddingAdapter::new(provider.clone()).with_retry(fast_retry(5));

        assert!(adapter.embed_query("q").await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_response_is_an_error() {
        let provider = Arc::new(ScriptedProvider { drop_last: true, ..ScriptedProvider::new() });
        let adapter = EmbeddingAdapter::new(provider);

        let err = adapter.embed(&["a", "b"]).await.unwrap_err();
        assert!(err.to_string().contains("expected 2 vectors, got 1"));
    }

    #[tokio::test]
    async fn empty_input_makes_no_request() {
        let provider = Arc::new(ScriptedProvider::new());
        let adapter = EmbeddingAdapter::new(provider.clone());

        assert!(adapter.embed(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
