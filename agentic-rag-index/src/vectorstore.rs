//! Vector index trait for storing documents and answering fused similarity queries.

use async_trait::async_trait;

use crate::document::{Document, SearchResult, SparseVector};
use crate::error::Result;

/// A fused similarity query: a dense sub-query and an optional sparse one.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    /// Dense query embedding.
    pub dense: Vec<f32>,
    /// Optional sparse query vector; when absent only the dense list is ranked.
    pub sparse: Option<SparseVector>,
    /// Candidates per sub-query and final result count.
    pub limit: usize,
}

impl HybridQuery {
    pub fn dense(dense: Vec<f32>, limit: usize) -> Self {
        Self { dense, sparse: None, limit }
    }

    pub fn with_sparse(mut self, sparse: Option<SparseVector>) -> Self {
        self.sparse = sparse.filter(|s| !s.is_empty());
        self
    }
}

/// A storage backend holding [`Document`]s in named collections.
///
/// Every sub-query of a [`HybridQuery`] is limited to `limit` candidates; the
/// candidate lists are combined with Reciprocal Rank Fusion, truncated to
/// `limit` and returned in descending fused-score order.
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag_index::{VectorIndex, InMemoryVectorIndex, HybridQuery};
///
/// let index = InMemoryVectorIndex::new();
/// index.ensure_collection("docs", 768).await?;
/// index.upsert("docs", &documents).await?;
/// let results = index.hybrid_query("docs", &HybridQuery::dense(query, 5)).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a collection with the given dense vector size. No-op if it already exists.
    async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()>;

    /// Upsert documents into a collection in one call.
    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()>;

    /// Run a fused dense/sparse similarity query.
    async fn hybrid_query(&self, collection: &str, query: &HybridQuery)
    -> Result<Vec<SearchResult>>;
}
