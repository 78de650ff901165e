//! In-memory vector index with local hybrid fusion.
//!
//! This module provides [`InMemoryVectorIndex`], a vector index backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. Dense candidates are ranked
//! by cosine similarity, sparse candidates by dot product, and the two lists
//! are fused with [`reciprocal_rank_fusion`]. It is suitable for development,
//! testing, and small corpora.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::DEFAULT_RRF_K;
use crate::document::{CONTENT_FIELD, Document, SearchResult};
use crate::error::{RagError, Result};
use crate::fusion::reciprocal_rank_fusion;
use crate::vectorstore::{HybridQuery, VectorIndex};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Collection {
    vector_size: usize,
    /// Insertion order, used as the stable tie-break.
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
}

/// An in-memory [`VectorIndex`].
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag_index::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.ensure_collection("docs", 768).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
    rrf_k: f32,
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self { collections: RwLock::new(HashMap::new()), rrf_k: DEFAULT_RRF_K }
    }
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Reciprocal Rank Fusion constant.
    pub fn with_rrf_k(mut self, k: f32) -> Self {
        self.rrf_k = k;
        self
    }

    /// Number of documents stored in a collection (0 if it does not exist).
    pub async fn len(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map_or(0, |c| c.documents.len())
    }

    fn missing(collection: &str) -> RagError {
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank document positions by descending score; the sort is stable.
fn rank(mut scored: Vec<(usize, f32)>, limit: usize) -> Vec<usize> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|(pos, _)| pos).collect()
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            debug!(collection = name, "collection already exists, skipping creation");
            return Ok(());
        }
        collections.insert(name.to_string(), Collection { vector_size, ..Default::default() });
        debug!(collection = name, vector_size, "created in-memory collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;

        // Validate the whole batch before applying any of it.
        if let Some(bad) = documents.iter().find(|d| d.dense.len() != store.vector_size) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "document '{}' has dense length {}, collection expects {}",
                    bad.id,
                    bad.dense.len(),
                    store.vector_size
                ),
            });
        }

        for document in documents {
            match store.positions.get(&document.id) {
                Some(&pos) => store.documents[pos] = document.clone(),
                None => {
                    store.positions.insert(document.id.clone(), store.documents.len());
                    store.documents.push(document.clone());
                }
            }
        }
        debug!(collection, count = documents.len(), "upserted documents");
        Ok(())
    }

    async fn hybrid_query(
        &self,
        collection: &str,
        query: &HybridQuery,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;

        if query.dense.len() != store.vector_size {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query has dense length {}, collection expects {}",
                    query.dense.len(),
                    store.vector_size
                ),
            });
        }

        let dense: Vec<(usize, f32)> = store
            .documents
            .iter()
            .enumerate()
            .map(|(pos, doc)| (pos, cosine_similarity(&doc.dense, &query.dense)))
            .collect();
        let mut lists = vec![rank(dense, query.limit)];

        if let Some(sparse_query) = &query.sparse {
            let sparse: Vec<(usize, f32)> = store
                .documents
                .iter()
                .enumerate()
                .filter_map(|(pos, doc)| {
                    let score = doc.sparse.as_ref()?.dot(sparse_query);
                    (score > 0.0).then_some((pos, score))
                })
                .collect();
            lists.push(rank(sparse, query.limit));
        }

        let results = reciprocal_rank_fusion(lists, self.rrf_k, query.limit)
            .into_iter()
            .map(|(pos, score)| {
                let doc = &store.documents[pos];
                SearchResult {
                    id: doc.id.clone(),
                    score,
                    content: doc.content.clone(),
                    payload: doc
                        .metadata
                        .iter()
                        .filter(|(key, _)| key.as_str() != CONTENT_FIELD)
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                }
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SparseVector;

    fn doc(id: &str, dense: Vec<f32>, sparse: Option<SparseVector>) -> Document {
        Document {
            id: id.to_string(),
            content: format!("content of {id}"),
            metadata: HashMap::from([("source".to_string(), "test".to_string())]),
            dense,
            sparse,
        }
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let index = InMemoryVectorIndex::new();
        index.ensure_collection("docs", 2).await.unwrap();
        index.upsert("docs", &[doc("a", vec![1.0, 0.0], None)]).await.unwrap();
        index.ensure_collection("docs", 2).await.unwrap();
        assert_eq!(index.len("docs").await, 1);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimensions_without_partial_apply() {
        let index = InMemoryVectorIndex::new();
        index.ensure_collection("docs", 2).await.unwrap();
        let batch = [doc("a", vec![1.0, 0.0], None), doc("b", vec![1.0], None)];
        assert!(index.upsert("docs", &batch).await.is_err());
        assert_eq!(index.len("docs").await, 0);
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let index = InMemoryVectorIndex::new();
        let err = index.upsert("nope", &[doc("a", vec![1.0], None)]).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
    }

    #[tokio::test]
    async fn sparse_match_boosts_fused_score() {
        let index = InMemoryVectorIndex::new();
        index.ensure_collection("docs", 2).await.unwrap();
        let term = || SparseVector::new(vec![7], vec![1.0]).unwrap();
        index
            .upsert(
                "docs",
                &[
                    doc("a", vec![1.0, 0.0], None),
                    doc("b", vec![0.9, 0.1], Some(term())),
                    doc("c", vec![0.0, 1.0], None),
                ],
            )
            .await
            .unwrap();

        let query = HybridQuery::dense(vec![1.0, 0.0], 3).with_sparse(Some(term()));
        let results = index.hybrid_query("docs", &query).await.unwrap();

        assert_eq!(results[0].id, "b");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].payload.get("source").map(String::as_str), Some("test"));
    }

    #[tokio::test]
    async fn content_key_in_stored_metadata_is_not_returned() {
        let index = InMemoryVectorIndex::new();
        index.ensure_collection("docs", 2).await.unwrap();
        let mut tagged = doc("a", vec![1.0, 0.0], None);
        tagged.metadata.insert("content".to_string(), "stale".to_string());
        index.upsert("docs", &[tagged]).await.unwrap();

        let results =
            index.hybrid_query("docs", &HybridQuery::dense(vec![1.0, 0.0], 1)).await.unwrap();
        assert_eq!(results[0].content, "content of a");
        assert!(!results[0].payload.contains_key("content"));
        assert_eq!(results[0].payload.get("source").map(String::as_str), Some("test"));
    }

    #[tokio::test]
    async fn limit_larger_than_corpus_returns_everything() {
        let index = InMemoryVectorIndex::new();
        index.ensure_collection("docs", 2).await.unwrap();
        index
            .upsert("docs", &[doc("a", vec![1.0, 0.0], None), doc("b", vec![0.0, 1.0], None)])
            .await
            .unwrap();
        let results =
            index.hybrid_query("docs", &HybridQuery::dense(vec![1.0, 0.0], 5)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
    }
}
