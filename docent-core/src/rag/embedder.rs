//! Embedding generation using LLM providers.
//!
//! This module converts text into vector embeddings through a [`Provider`],
//! bounding every call in time and checking that a batch agrees on one
//! dimensionality before anything reaches the index.

use crate::deadline::call_with_deadline;
use crate::provider::{Provider, ProviderError};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered with an empty vector.
    #[error("No embeddings returned")]
    NoEmbeddings,

    /// Two texts of one batch were embedded with different lengths.
    #[error("Embedding dimension changed within a batch: expected {expected}, got {actual}")]
    InconsistentDimension { expected: usize, actual: usize },

    /// The provider answered with NaN or infinite components.
    #[error("Embedding contains non-finite values")]
    NonFiniteValue,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using provider embedding models.
///
/// # Supported Models
///
/// Common embedding models:
/// - `nomic-embed-text` - 768-dimensional embeddings, good general purpose
/// - `mxbai-embed-large` - 1024-dimensional embeddings, higher quality
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    concurrency: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            provider,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, does not answer within
    /// the deadline, or returns an empty or non-finite vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = call_with_deadline("embed", self.timeout, self.provider.embed(text))
            .await
            .unwrap_or(Err(ProviderError::Timeout))?;

        if vector.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }
        if !vector.iter().all(|x| x.is_finite()) {
            return Err(EmbedderError::NonFiniteValue);
        }
        Ok(vector)
    }

    /// Embeds every text, keeping input order in the output.
    ///
    /// Up to `concurrency` requests are in flight at once. The first failure
    /// aborts the batch.
    pub async fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        debug!(count = texts.len(), concurrency = self.concurrency, "Embedding batch");

        let requests: Vec<_> = texts.iter().map(|text| self.embed(text.as_ref())).collect();
        let vectors: Vec<Vec<f32>> = stream::iter(requests)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        if let Some(expected) = vectors.first().map(Vec::len) {
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(EmbedderError::InconsistentDimension {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    fn embedder(provider: Arc<FakeProvider>) -> Embedder {
        Embedder::new(provider, Duration::from_secs(1), 3)
    }

    #[tokio::test]
    async fn test_embed_single() {
        let provider = Arc::new(FakeProvider::with_dimension(16));
        let vector = embedder(provider).embed("hello world").await.unwrap();
        assert_eq!(vector.len(), 16);
        assert_eq!(vector.iter().sum::<f32>(), 2.0);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let provider = Arc::new(FakeProvider::new());
        let embedder = embedder(provider.clone());
        let texts = ["alpha", "beta", "gamma", "delta", "epsilon"];

        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), texts.len());
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(vector, &embedder.embed(text).await.unwrap());
        }
        assert_eq!(provider.embed_calls(), texts.len() * 2);
    }

    #[tokio::test]
    async fn test_batch_fails_on_backend_error() {
        let provider = Arc::new(FakeProvider::new());
        provider.set_fail_embeddings(true);

        let err = embedder(provider).embed_batch(&["a", "b"]).await.unwrap_err();
        assert!(matches!(err, EmbedderError::Provider(ProviderError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_non_finite_embedding_fails_batch() {
        let provider = Arc::new(FakeProvider::new());
        provider.set_nan_embeddings_for("broken");
        let embedder = embedder(provider);

        let err = embedder.embed("a broken text").await.unwrap_err();
        assert!(matches!(err, EmbedderError::NonFiniteValue));

        let err = embedder
            .embed_batch(&["fine", "also fine", "broken here"])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedderError::NonFiniteValue));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let provider = Arc::new(FakeProvider::new());
        let batch = embedder(provider.clone()).embed_batch::<&str>(&[]).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(provider.embed_calls(), 0);
    }
}
