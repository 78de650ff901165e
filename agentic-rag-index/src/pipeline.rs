//! Ingestion pipeline: chunk → embed → store.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentic_rag_index::{IngestionPipeline, RagConfig, InMemoryVectorIndex};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()?;
//!
//! let ids = pipeline.ingest("some long text", HashMap::new(), Some("notes.txt")).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, chunker_for};
use crate::config::RagConfig;
use crate::document::{CONTENT_FIELD, Document};
use crate::embedding::{EmbeddingProvider, SparseEncoder};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// Turns raw text into stored, searchable documents.
///
/// Each call makes exactly one batched embedding request and one upsert
/// request. The target collection is created with the configured vector size
/// on first use; later calls skip that round trip.
pub struct IngestionPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    chunker: Arc<dyn Chunker>,
    sparse_encoder: Option<Arc<dyn SparseEncoder>>,
    collection_ready: OnceCell<()>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Create the configured collection if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a [`RagError::PipelineError`] in the `upsert` stage if the index call fails.
    pub async fn ensure_collection(&self) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| async {
                self.vector_index
                    .ensure_collection(&self.config.collection, self.config.vector_size)
                    .await
                    .map_err(|e| {
                        error!(
                            collection = %self.config.collection,
                            error = %e,
                            "failed to ensure collection"
                        );
                        RagError::at_stage("upsert", e)
                    })
            })
            .await?;
        Ok(())
    }

    /// Ingest `text`: chunk it, embed every chunk in one batch, and upsert the
    /// resulting documents in one call.
    ///
    /// Every document's metadata is the caller's `metadata` plus `source`
    /// (when non-empty) and `chunk_index`. A caller `content` key is dropped;
    /// that name is reserved for the chunk text. Returns the generated ids in
    /// chunk order.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for empty text or when no chunks result;
    ///   nothing downstream is called.
    /// - [`RagError::PipelineError`] naming the failed stage (`embed` or
    ///   `upsert`) otherwise. A failed upsert fails the whole batch.
    pub async fn ingest(
        &self,
        text: &str,
        metadata: HashMap<String, String>,
        source: Option<&str>,
    ) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("text must not be empty".to_string()));
        }

        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Err(RagError::InvalidInput("no chunks generated from text".to_string()));
        }

        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(chunk_count = chunks.len(), error = %e, "embedding failed during ingestion");
            RagError::at_stage("embed", e)
        })?;

        if embeddings.len() != chunks.len() {
            error!(expected = chunks.len(), actual = embeddings.len(), "embedding count mismatch");
            return Err(RagError::at_stage(
                "embed",
                RagError::EmbeddingCountMismatch {
                    expected: chunks.len(),
                    actual: embeddings.len(),
                },
            ));
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.config.vector_size) {
            return Err(RagError::at_stage(
                "embed",
                RagError::EmbeddingError {
                    provider: "pipeline".to_string(),
                    message: format!(
                        "embedding has {} dimensions, collection expects {}",
                        bad.len(),
                        self.config.vector_size
                    ),
                },
            ));
        }

        let source = source.filter(|s| !s.is_empty());
        let mut metadata = metadata;
        if metadata.remove(CONTENT_FIELD).is_some() {
            warn!(key = CONTENT_FIELD, "dropped reserved metadata key");
        }
        let mut documents = Vec::with_capacity(chunks.len());
        for (chunk_index, (content, dense)) in chunks.into_iter().zip(embeddings).enumerate() {
            let sparse = match &self.sparse_encoder {
                Some(encoder) => {
                    Some(encoder.encode(&content).map_err(|e| RagError::at_stage("embed", e))?)
                }
                None => None,
            };

            let mut doc_metadata = metadata.clone();
            if let Some(source) = source {
                doc_metadata.insert("source".to_string(), source.to_string());
            }
            doc_metadata.insert("chunk_index".to_string(), chunk_index.to_string());

            documents.push(Document {
                id: Uuid::new_v4().to_string(),
                content,
                metadata: doc_metadata,
                dense,
                sparse,
            });
        }

        self.ensure_collection().await?;
        self.vector_index.upsert(&self.config.collection, &documents).await.map_err(|e| {
            error!(
                collection = %self.config.collection,
                error = %e,
                "upsert failed during ingestion"
            );
            RagError::at_stage("upsert", e)
        })?;

        let ids: Vec<String> = documents.into_iter().map(|d| d.id).collect();
        info!(chunk_count = ids.len(), source = source.unwrap_or(""), "ingested text");

        Ok(ids)
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `config`, `embedding_provider` and `vector_index` are required. The chunker
/// defaults to the strategy named in the config.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
    sparse_encoder: Option<Arc<dyn SparseEncoder>>,
}

impl IngestionPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Override the chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Attach sparse vectors produced by `encoder` to every document.
    pub fn sparse_encoder(mut self, encoder: Arc<dyn SparseEncoder>) -> Self {
        self.sparse_encoder = Some(encoder);
        self
    }

    /// Build the [`IngestionPipeline`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// configuration is inconsistent.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| Arc::from(chunker_for(&config)));

        Ok(IngestionPipeline {
            config,
            embedding_provider,
            vector_index,
            chunker,
            sparse_encoder: self.sparse_encoder,
            collection_ready: OnceCell::new(),
        })
    }
}
