//! Embedding provider traits for turning text into vectors.

use async_trait::async_trait;

use crate::document::SparseVector;
use crate::error::Result;

/// A provider that generates dense vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, OpenAI, etc.)
/// behind a unified async interface. [`embed`](EmbeddingProvider::embed) is
/// used for queries and [`embed_batch`](EmbeddingProvider::embed_batch) for
/// ingestion; backends with distinct query/document modes should honor that.
///
/// Providers must never pad or truncate a batch response: the caller checks
/// the returned count against the input count.
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag_index::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of document texts.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Produces sparse lexical vectors (BM25-style term weights).
///
/// No encoder ships with this crate. When one is configured, the ingestion
/// pipeline attaches sparse vectors to documents and the retriever issues a
/// sparse sub-query alongside the dense one.
pub trait SparseEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<SparseVector>;
}
