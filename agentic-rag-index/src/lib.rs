//! # agentic-rag-index
//!
//! Chunking, embedding, hybrid vector indexing and retrieval.
//!
//! ## Overview
//!
//! - [`IngestionPipeline`]: chunk → embed (one batch) → upsert (one call)
//! - [`HybridRetriever`]: embed query → fused dense/sparse query → filter
//! - [`VectorIndex`]: index abstraction with [`InMemoryVectorIndex`] and,
//!   behind the `qdrant` feature, `QdrantVectorIndex`
//! - [`EmbeddingProvider`]: embedding abstraction with Gemini and OpenAI
//!   implementations behind the `gemini` and `openai` features
//! - [`reciprocal_rank_fusion`]: the rank fusion used by in-process indexes
//!
//! ## Features
//!
//! - `gemini` - Gemini REST embeddings
//! - `openai` - OpenAI-compatible REST embeddings
//! - `qdrant` - Qdrant gRPC vector index
//!
//! All three are enabled by default.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod inmemory;
pub mod pipeline;
pub mod retrieval;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, chunker_for};
pub use config::{ChunkingStrategy, DEFAULT_RRF_K, RagConfig, RagConfigBuilder};
pub use document::{CONTENT_FIELD, Document, RetrievedContext, SearchResult, SparseVector};
pub use embedding::{EmbeddingProvider, SparseEncoder};
pub use error::{RagError, Result};
pub use fusion::reciprocal_rank_fusion;
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{IngestionPipeline, IngestionPipelineBuilder};
pub use retrieval::HybridRetriever;
pub use vectorstore::{HybridQuery, VectorIndex};

#[cfg(feature = "gemini")]
pub use gemini::GeminiEmbeddingProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorIndex;
