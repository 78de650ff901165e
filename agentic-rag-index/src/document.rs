//! Data types for stored documents and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Payload key reserved for the chunk text. Never part of returned metadata.
pub const CONTENT_FIELD: &str = "content";

/// A sparse term-weight vector as two parallel sequences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Create a sparse vector.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `indices` and `values` differ in length.
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(RagError::InvalidInput(format!(
                "sparse vector has {} indices but {} values",
                indices.len(),
                values.len()
            )));
        }
        Ok(Self { indices, values })
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product with another sparse vector.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let weights: HashMap<u32, f32> =
            other.indices.iter().copied().zip(other.values.iter().copied()).collect();
        self.indices
            .iter()
            .zip(&self.values)
            .filter_map(|(i, v)| weights.get(i).map(|w| v * w))
            .sum()
    }
}

/// One stored, retrievable chunk of text with its vectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier (UUID v4 when generated by the pipeline).
    pub id: String,
    /// The chunk text.
    pub content: String,
    /// Key-value metadata (source, chunk index, caller tags). Never holds
    /// [`CONTENT_FIELD`].
    pub metadata: HashMap<String, String>,
    /// Dense embedding; its length equals the collection vector size.
    pub dense: Vec<f32>,
    /// Optional sparse term-weight vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse: Option<SparseVector>,
}

/// A matched [`Document`] projected for a single query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    /// Fused relevance score (higher is more relevant).
    pub score: f32,
    pub content: String,
    /// Stored metadata without the `content` field.
    pub payload: HashMap<String, String>,
}

/// A query together with the passages retrieved for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub query: String,
    pub results: Vec<SearchResult>,
}

impl RetrievedContext {
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self { query: query.into(), results }
    }

    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_vector_rejects_mismatched_lengths() {
        assert!(SparseVector::new(vec![1, 2], vec![0.5]).is_err());
        assert!(SparseVector::new(vec![1, 2], vec![0.5, 0.25]).is_ok());
    }

    #[test]
    fn sparse_dot_only_counts_shared_indices() {
        let a = SparseVector::new(vec![1, 4, 9], vec![1.0, 2.0, 3.0]).unwrap();
        let b = SparseVector::new(vec![4, 9, 12], vec![0.5, 1.0, 7.0]).unwrap();
        assert!((a.dot(&b) - 4.0).abs() < 1e-6);
    }
}
