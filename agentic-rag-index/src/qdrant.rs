//! Qdrant vector index backend.
//!
//! Provides [`QdrantVectorIndex`] which implements [`VectorIndex`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! Collections carry a named dense vector (`dense`, cosine distance) and a
//! named sparse vector (`sparse`). Hybrid queries prefetch from both and let
//! Qdrant fuse the candidate lists with Reciprocal Rank Fusion server-side.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentic_rag_index::qdrant::QdrantVectorIndex;
//!
//! let index = QdrantVectorIndex::new("http://localhost:6334", None)?;
//! index.ensure_collection("docs", 768).await?;
//! index.upsert("docs", &documents).await?;
//! let results = index.hybrid_query("docs", &HybridQuery::dense(query, 5)).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, Fusion, NamedVectors, PointStruct, PrefetchQueryBuilder,
    Query, QueryPointsBuilder, ScoredPoint, SparseVectorParamsBuilder,
    SparseVectorsConfigBuilder, UpsertPointsBuilder, Value as QdrantValue, Vector,
    VectorInput, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;

use crate::document::{CONTENT_FIELD, Document, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{HybridQuery, VectorIndex};

/// Name of the dense vector in every collection.
pub const DENSE_VECTOR: &str = "dense";
/// Name of the sparse vector in every collection.
pub const SPARSE_VECTOR: &str = "sparse";

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
///
/// Holds one long-lived client; calls are stateless so the index is shared
/// across concurrent requests without extra locking.
pub struct QdrantVectorIndex {
    client: Qdrant,
}

impl QdrantVectorIndex {
    /// Create a new Qdrant index connecting to the given gRPC URL.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Qdrant::from_url(url).api_key(api_key).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant index from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: "qdrant".to_string(), message: e.to_string() }
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            Some(Kind::IntegerValue(i)) => Some(i.to_string()),
            Some(Kind::DoubleValue(d)) => Some(d.to_string()),
            Some(Kind::BoolValue(b)) => Some(b.to_string()),
            _ => None,
        }
    }

    fn to_point(document: &Document) -> PointStruct {
        let mut payload = Payload::new();
        payload.insert(CONTENT_FIELD, document.content.clone());
        for (key, value) in &document.metadata {
            if key != CONTENT_FIELD {
                payload.insert(key.clone(), value.clone());
            }
        }

        let mut vectors = NamedVectors::default()
            .add_vector(DENSE_VECTOR, Vector::new_dense(document.dense.clone()));
        if let Some(sparse) = document.sparse.as_ref().filter(|s| !s.is_empty()) {
            vectors = vectors.add_vector(
                SPARSE_VECTOR,
                Vector::new_sparse(sparse.indices().to_vec(), sparse.values().to_vec()),
            );
        }

        PointStruct::new(document.id.clone(), vectors, payload)
    }

    fn to_result(point: ScoredPoint) -> SearchResult {
        let id = point
            .id
            .as_ref()
            .and_then(|pid| match &pid.point_id_options {
                Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                None => None,
            })
            .unwrap_or_default();

        let mut content = String::new();
        let mut payload = HashMap::new();
        for (key, value) in &point.payload {
            let Some(text) = Self::extract_string(value) else { continue };
            if key == CONTENT_FIELD {
                content = text;
            } else {
                payload.insert(key.clone(), text);
            }
        }

        SearchResult { id, score: point.score, content, payload }
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()> {
        if self.client.collection_exists(name).await.map_err(Self::map_err)? {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        let mut vectors_config = VectorsConfigBuilder::default();
        vectors_config.add_named_vector_params(
            DENSE_VECTOR,
            VectorParamsBuilder::new(vector_size as u64, Distance::Cosine),
        );
        let mut sparse_config = SparseVectorsConfigBuilder::default();
        sparse_config.add_named_vector_params(SPARSE_VECTOR, SparseVectorParamsBuilder::default());

        let created = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(vectors_config)
                    .sparse_vectors_config(sparse_config),
            )
            .await;

        if let Err(e) = created {
            // Lost a creation race with another request.
            if self.client.collection_exists(name).await.unwrap_or(false) {
                debug!(collection = name, error = %e, "collection created concurrently");
                return Ok(());
            }
            return Err(Self::map_err(e));
        }

        debug!(collection = name, vector_size, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = documents.iter().map(Self::to_point).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = documents.len(), "upserted documents to qdrant");
        Ok(())
    }

    async fn hybrid_query(
        &self,
        collection: &str,
        query: &HybridQuery,
    ) -> Result<Vec<SearchResult>> {
        let limit = query.limit as u64;

        let mut request = QueryPointsBuilder::new(collection).add_prefetch(
            PrefetchQueryBuilder::default()
                .query(Query::new_nearest(query.dense.clone()))
                .using(DENSE_VECTOR)
                .limit(limit),
        );
        if let Some(sparse) = &query.sparse {
            request = request.add_prefetch(
                PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(VectorInput::new_sparse(
                        sparse.indices().to_vec(),
                        sparse.values().to_vec(),
                    )))
                    .using(SPARSE_VECTOR)
                    .limit(limit),
            );
        }

        let response = self
            .client
            .query(request.query(Query::new_fusion(Fusion::Rrf)).limit(limit).with_payload(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, result_count = response.result.len(), "qdrant hybrid query");
        Ok(response.result.into_iter().map(Self::to_result).collect())
    }
}
