//! Shared request state and its construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use agentic_rag_agent::{
    AnswerGenerator, ConversationOrchestrator, GeminiGenerator, InMemorySessionService,
    OrchestratorConfig,
};
use agentic_rag_index::{
    EmbeddingProvider, GeminiEmbeddingProvider, HybridRetriever, InMemoryVectorIndex,
    IngestionPipeline, OpenAIEmbeddingProvider, QdrantVectorIndex, VectorIndex,
};
use anyhow::Context;
use tracing::info;

use crate::config::{AppConfig, EmbeddingBackend, VectorStoreBackend};
use crate::gate::Gate;

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub retriever: Arc<HybridRetriever>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub sessions: InMemorySessionService,
    pub gate: Arc<Gate>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gate", &self.gate)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the components from explicit collaborators.
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> anyhow::Result<Self> {
        let rag = config.rag_config()?;
        let pipeline = IngestionPipeline::builder()
            .config(rag.clone())
            .embedding_provider(embedder.clone())
            .vector_index(index.clone())
            .build()?;
        let retriever = Arc::new(HybridRetriever::new(rag, embedder, index));
        let sessions =
            InMemorySessionService::new().with_idle_ttl(config.agent.session_idle_ttl());
        let orchestrator = ConversationOrchestrator::new(
            OrchestratorConfig {
                app_name: config.agent.app_name.clone(),
                instruction: config.agent.instruction.clone(),
                max_history_turns: config.agent.max_history_turns,
            },
            retriever.clone(),
            Arc::new(sessions.clone()),
            generator,
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            retriever,
            orchestrator: Arc::new(orchestrator),
            sessions,
            gate: Arc::new(Gate::from_config(&config.server)),
            request_timeout: config.server.request_timeout(),
        })
    }

    /// Build the production collaborators named in `config`.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let model = &config.model;
        let store = &config.vectorstore;

        let embedder: Arc<dyn EmbeddingProvider> = match model.embedding_provider {
            EmbeddingBackend::Gemini => {
                let mut provider =
                    GeminiEmbeddingProvider::new(model.api_key.clone(), store.vector_size)
                        .context("model.api_key (or GOOGLE_API_KEY) must be set")?
                        .with_model(model.embedding_model.clone());
                if let Some(url) = &model.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                Arc::new(provider)
            }
            EmbeddingBackend::Openai => {
                let mut provider = OpenAIEmbeddingProvider::new(model.api_key.clone())
                    .context("model.api_key must be set")?
                    .with_model(model.embedding_model.clone())
                    .with_dimensions(store.vector_size);
                if let Some(url) = &model.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                Arc::new(provider)
            }
        };

        let index: Arc<dyn VectorIndex> = match store.provider {
            VectorStoreBackend::Qdrant => {
                let endpoint = store.endpoint();
                let api_key = Some(store.api_key.clone()).filter(|k| !k.is_empty());
                let index = QdrantVectorIndex::new(&endpoint, api_key)
                    .with_context(|| format!("failed to create Qdrant client for {endpoint}"))?;
                Arc::new(index)
            }
            VectorStoreBackend::Memory => {
                Arc::new(InMemoryVectorIndex::new().with_rrf_k(config.retriever.rrf_k))
            }
        };

        let mut generator = GeminiGenerator::new(model.api_key.clone())
            .context("model.api_key (or GOOGLE_API_KEY) must be set")?
            .with_model(model.name.clone())
            .with_temperature(model.temperature)
            .with_max_output_tokens(model.max_tokens);
        if let (EmbeddingBackend::Gemini, Some(url)) = (model.embedding_provider, &model.base_url)
        {
            generator = generator.with_base_url(url.clone());
        }

        info!(
            vectorstore = ?store.provider,
            collection = %store.collection,
            embedding_provider = ?model.embedding_provider,
            embedding_model = %model.embedding_model,
            model = %model.name,
            "initialized service components"
        );
        Self::new(config, embedder, index, Arc::new(generator))
    }
}
