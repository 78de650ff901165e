//! Embeddings from any server speaking the OpenAI `/embeddings` protocol.
//!
//! Only available with the `openai` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Native size of `text-embedding-3-small` when no truncation is requested.
const DEFAULT_DIMENSIONS: usize = 1536;

const PROVIDER: &str = "OpenAI";

/// An [`EmbeddingProvider`] for OpenAI-compatible servers.
///
/// The protocol has no query/document distinction, so [`embed`] and
/// [`embed_batch`] send the same request shape. Vectors are returned in input
/// order, placed by the `index` field of each response item.
///
/// [`embed`]: EmbeddingProvider::embed
/// [`embed_batch`]: EmbeddingProvider::embed_batch
///
/// ```rust,ignore
/// use agentic_rag_index::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new(key)?
///     .with_base_url("http://localhost:11434/v1")
///     .with_dimensions(768);
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
    truncate_to: Option<usize>,
}

fn provider_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
}

impl OpenAIEmbeddingProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(provider_error("API key must not be empty"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            truncate_to: None,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Ask the server to truncate vectors to `dims`, which also becomes
    /// [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.truncate_to = Some(dims);
        self
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
            dimensions: self.truncate_to,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                provider_error(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(provider_error(format!("API returned {status}: {detail}")));
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            provider_error(format!("failed to parse response: {e}"))
        })?;

        place_by_index(parsed.data, texts.len())
    }
}

/// Order items by their `index`. Items missing an index keep arrival order.
/// Indices outside the input or repeated are an error; a short response
/// stays short.
fn place_by_index(items: Vec<EmbeddingItem>, inputs: usize) -> Result<Vec<Vec<f32>>> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; inputs];
    for (arrival, item) in items.into_iter().enumerate() {
        let at = item.index.unwrap_or(arrival);
        let slot = slots
            .get_mut(at)
            .ok_or_else(|| provider_error(format!("response index {at} out of range")))?;
        if slot.replace(item.embedding).is_some() {
            return Err(provider_error(format!("response index {at} repeated")));
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding query");
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| provider_error("API returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
