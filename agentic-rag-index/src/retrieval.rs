//! Hybrid retrieval: embed the query, run a fused dense/sparse query, filter.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::RagConfig;
use crate::document::{RetrievedContext, SearchResult};
use crate::embedding::{EmbeddingProvider, SparseEncoder};
use crate::error::{RagError, Result};
use crate::vectorstore::{HybridQuery, VectorIndex};

/// Turns a query string into a ranked list of passages.
///
/// Any embedding or index error aborts the search; there is no best-effort
/// fallback at this level.
pub struct HybridRetriever {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    sparse_encoder: Option<Arc<dyn SparseEncoder>>,
}

impl HybridRetriever {
    pub fn new(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self { config, embedding_provider, vector_index, sparse_encoder: None }
    }

    /// Issue a sparse sub-query encoded by `encoder` alongside the dense one.
    pub fn with_sparse_encoder(mut self, encoder: Arc<dyn SparseEncoder>) -> Self {
        self.sparse_encoder = Some(encoder);
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Search the configured collection.
    ///
    /// `top_k` of `None` or `Some(0)` falls back to the configured default.
    /// Results are in descending fused-score order, at most `top_k` long, and
    /// never padded when the collection holds fewer documents.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for an empty query; nothing downstream is called.
    /// - [`RagError::PipelineError`] in the `embed` or `search` stage.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".to_string()));
        }
        let top_k = top_k.filter(|k| *k > 0).unwrap_or(self.config.top_k);

        let dense = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            RagError::at_stage("embed", e)
        })?;
        let sparse = match &self.sparse_encoder {
            Some(encoder) => {
                Some(encoder.encode(query).map_err(|e| RagError::at_stage("embed", e))?)
            }
            None => None,
        };

        let hybrid = HybridQuery::dense(dense, top_k).with_sparse(sparse);
        let results =
            self.vector_index.hybrid_query(&self.config.collection, &hybrid).await.map_err(|e| {
                error!(collection = %self.config.collection, error = %e, "hybrid query failed");
                RagError::at_stage("search", e)
            })?;

        let threshold = self.config.similarity_threshold;
        let filtered: Vec<SearchResult> =
            results.into_iter().filter(|r| r.score >= threshold).take(top_k).collect();

        debug!(top_k, result_count = filtered.len(), "search completed");
        Ok(filtered)
    }

    /// Search with the default `top_k` and bundle the results with the query.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext> {
        let results = self.search(query, None).await?;
        Ok(RetrievedContext::new(query, results))
    }
}
