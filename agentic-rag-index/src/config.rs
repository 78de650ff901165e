//! Configuration for ingestion and retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Reciprocal Rank Fusion constant used when fusing locally.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Which chunking strategy the pipeline uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Separator-aware recursive splitting (paragraph, line, word, character).
    #[default]
    Recursive,
    /// Plain sliding character window.
    Fixed,
}

/// Configuration parameters shared by the ingestion pipeline and the retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the vector index collection.
    pub collection: String,
    /// Dense vector length of the collection.
    pub vector_size: usize,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunking strategy.
    pub chunking: ChunkingStrategy,
    /// Number of results returned when the caller does not ask for a specific count.
    pub top_k: usize,
    /// Minimum fused score for results (results below this are filtered out).
    pub similarity_threshold: f32,
    /// Constant added to every rank in Reciprocal Rank Fusion.
    pub rrf_k: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: "agenticrag".to_string(),
            vector_size: 768,
            chunk_size: 512,
            chunk_overlap: 50,
            chunking: ChunkingStrategy::Recursive,
            top_k: 10,
            similarity_threshold: 0.0,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `vector_size == 0`
    /// - `collection` is empty
    /// - `rrf_k` is negative or not finite
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.vector_size == 0 {
            return Err(RagError::ConfigError("vector_size must be greater than zero".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection name must not be empty".to_string()));
        }
        if !self.rrf_k.is_finite() || self.rrf_k < 0.0 {
            return Err(RagError::ConfigError(format!("invalid rrf_k: {}", self.rrf_k)));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the dense vector length.
    pub fn vector_size(mut self, size: usize) -> Self {
        self.config.vector_size = size;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the default number of results.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum score for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    pub fn rrf_k(mut self, k: f32) -> Self {
        self.config.rrf_k = k;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().vector_size(0).build().is_err());
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
        assert!(RagConfig::builder().collection("  ").build().is_err());
    }

    #[test]
    fn strategy_deserializes_lowercase() {
        let s: ChunkingStrategy = serde_json::from_str("\"fixed\"").unwrap();
        assert_eq!(s, ChunkingStrategy::Fixed);
    }
}
