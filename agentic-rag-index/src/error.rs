//! Error types for the `agentic-rag-index` crate.

use thiserror::Error;

/// Errors that can occur while chunking, embedding, indexing or retrieving.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied unusable input (empty text, empty query, no chunks).
    #[error("{0}")]
    InvalidInput(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider answered a batch with the wrong number of vectors.
    #[error("unexpected number of embeddings: got {actual}, expected {expected}")]
    EmbeddingCountMismatch {
        /// Number of texts sent to the provider.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A pipeline stage failed. `stage` is one of `chunk`, `embed`, `upsert`, `search`.
    #[error("{stage} failed: {source}")]
    PipelineError {
        /// The stage that failed.
        stage: &'static str,
        /// The underlying error.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Wrap an error with the pipeline stage it came from.
    pub fn at_stage(stage: &'static str, source: RagError) -> Self {
        RagError::PipelineError { stage, source: Box::new(source) }
    }

    /// Whether the error was caused by the caller's input rather than a collaborator.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            RagError::InvalidInput(_) => true,
            RagError::PipelineError { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }

    /// The stage name if this error was wrapped by [`RagError::at_stage`].
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            RagError::PipelineError { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A convenience result type for index operations.
pub type Result<T> = std::result::Result<T, RagError>;
