//! HTTP contract tests against a server bound to a local port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agentic_rag_agent::{
    AgentError, AnswerGenerator, GenerationChunk, GenerationRequest, GenerationStream,
};
use agentic_rag_index::{EmbeddingProvider, InMemoryVectorIndex, RagError};
use agentic_rag_server::config::VectorStoreBackend;
use agentic_rag_server::{AppConfig, AppState, app_router};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

const DIM: usize = 8;

/// Deterministic embedder: folds the text bytes into `DIM` buckets.
struct FoldingEmbedder {
    fail: bool,
}

impl FoldingEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![1.0f32; DIM];
        for (i, b) in text.bytes().enumerate() {
            v[(i + b as usize) % DIM] += b as f32;
        }
        v
    }

    fn check(&self) -> agentic_rag_index::Result<()> {
        if self.fail {
            return Err(RagError::EmbeddingError {
                provider: "fake".to_string(),
                message: "quota exhausted".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for FoldingEmbedder {
    async fn embed(&self, text: &str) -> agentic_rag_index::Result<Vec<f32>> {
        self.check()?;
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> agentic_rag_index::Result<Vec<Vec<f32>>> {
        self.check()?;
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Answers `echo: <message>`, optionally after a delay.
struct EchoGenerator {
    delay: Duration,
}

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> agentic_rag_agent::Result<GenerationStream> {
        tokio::time::sleep(self.delay).await;
        let items: Vec<Result<GenerationChunk, AgentError>> = vec![
            Ok(GenerationChunk::text("echo: ")),
            Ok(GenerationChunk::text(request.message)),
        ];
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

struct Setup {
    config: AppConfig,
    failing_embedder: bool,
    generator_delay: Duration,
}

impl Default for Setup {
    fn default() -> Self {
        let mut config = AppConfig::default();
        config.vectorstore.provider = VectorStoreBackend::Memory;
        config.vectorstore.collection = "test".to_string();
        config.vectorstore.vector_size = DIM;
        config.retriever.chunk_size = 64;
        config.retriever.chunk_overlap = 8;
        config.retriever.top_k = 3;
        config.server.rate_limit = 0;
        Self { config, failing_embedder: false, generator_delay: Duration::ZERO }
    }
}

impl Setup {
    fn with_api_key(mut self, key: &str) -> Self {
        self.config.server.api_key = key.to_string();
        self
    }

    fn with_rate_limit(mut self, rate: u32) -> Self {
        self.config.server.rate_limit = rate;
        self
    }

    async fn spawn(self) -> (String, tokio::task::JoinHandle<()>) {
        let state = AppState::new(
            &self.config,
            Arc::new(FoldingEmbedder { fail: self.failing_embedder }),
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(EchoGenerator { delay: self.generator_delay }),
        )
        .expect("state");
        state.pipeline.ensure_collection().await.expect("collection");

        let app = app_router(state).into_make_service_with_connect_info::<SocketAddr>();
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server run");
        });
        (format!("http://{addr}"), handle)
    }
}

async fn post(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let response =
        reqwest::Client::new().post(format!("{base}{path}")).json(&body).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

const CORPUS: &str = "Rust ownership rules prevent data races at compile time.\n\n\
    Tokio schedules async tasks on a work-stealing runtime.\n\n\
    Qdrant stores dense and sparse vectors in named collections.";

#[tokio::test]
async fn health_is_served_on_both_paths() {
    let (base, handle) = Setup::default().with_api_key("secret").with_rate_limit(1).spawn().await;

    for path in ["/health", "/api/v1/health", "/health"] {
        let response = reqwest::get(format!("{base}{path}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "status": "healthy" }));
    }

    handle.abort();
}

#[tokio::test]
async fn upload_then_search_round_trip() {
    let (base, handle) = Setup::default().spawn().await;

    let (status, body) = post(
        &base,
        "/upload_text",
        json!({ "text": CORPUS, "metadata": { "team": "infra" }, "source": "notes.md" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Text uploaded and chunked successfully");
    assert_eq!(body["chunk_count"], 3);
    let ids: Vec<String> = serde_json::from_value(body["chunk_ids"].clone()).unwrap();
    assert_eq!(ids.len(), 3);

    let query = "Tokio schedules async tasks on a work-stealing runtime.";
    let (status, body) =
        post(&base, "/api/v1/documents/search", json!({ "query": query, "top_k": 10 })).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["content"], query);
    assert_eq!(results[0]["metadata"]["source"], "notes.md");
    assert_eq!(results[0]["metadata"]["team"], "infra");
    assert_eq!(results[0]["id"], ids[1]);

    // Without top_k the configured default applies.
    let (_, body) = post(&base, "/search", json!({ "query": query, "top_k": 0 })).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 3);
    let (_, body) = post(&base, "/api/v1/search", json!({ "query": query, "top_k": 1 })).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    handle.abort();
}

#[tokio::test]
async fn upload_aliases_store_into_the_same_collection() {
    let (base, handle) = Setup::default().spawn().await;

    for path in ["/upload_text", "/api/v1/upload_text", "/api/v1/documents/upload"] {
        let (status, body) = post(&base, path, json!({ "text": format!("text for {path}") })).await;
        assert_eq!(status, StatusCode::OK, "{path}: {body}");
        assert_eq!(body["chunk_count"], 1);
    }

    let (_, body) = post(&base, "/search", json!({ "query": "text", "top_k": 10 })).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 3);

    handle.abort();
}

#[tokio::test]
async fn null_optional_fields_mean_absent() {
    let (base, handle) = Setup::default().spawn().await;

    let (status, body) = post(
        &base,
        "/upload_text",
        json!({ "text": CORPUS, "metadata": null, "source": null }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["chunk_count"], 3);

    let (status, body) =
        post(&base, "/search", json!({ "query": "Tokio runtime", "top_k": null })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r["metadata"].get("source").is_none()));

    let (status, body) = post(
        &base,
        "/chat",
        json!({ "message": "hi", "session_id": null, "user_id": null }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    handle.abort();
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let (base, handle) = Setup::default().spawn().await;

    let cases = [
        ("/upload_text", json!({ "source": "x" }), "Text field is required"),
        ("/search", json!({ "query": "" }), "Query field is required"),
        ("/chat", json!({ "session_id": "s" }), "Message field is required"),
        ("/upload_text", json!({ "text": "   " }), "text must not be empty"),
    ];
    for (path, body, message) in cases {
        let (status, body) = post(&base, path, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(body["error"], message);
    }

    let response = reqwest::Client::new()
        .post(format!("{base}/search"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body: "), "{body}");

    handle.abort();
}

#[tokio::test]
async fn downstream_failure_is_internal_error_with_stage() {
    let setup = Setup { failing_embedder: true, ..Setup::default() };
    let (base, handle) = setup.spawn().await;

    let (status, body) = post(&base, "/upload_text", json!({ "text": CORPUS })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("embed failed: "), "{message}");
    assert!(message.contains("quota exhausted"), "{message}");

    let (status, _) = post(&base, "/search", json!({ "query": "anything" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    handle.abort();
}

#[tokio::test]
async fn api_key_is_enforced_on_protected_routes() {
    let (base, handle) = Setup::default().with_api_key("secret").spawn().await;
    let client = reqwest::Client::new();
    let body = json!({ "query": "rust" });

    let missing = client.post(format!("{base}/search")).json(&body).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let error: Value = missing.json().await.unwrap();
    assert_eq!(error, json!({ "error": "Unauthorized" }));

    let wrong = client
        .post(format!("{base}/chat"))
        .header("X-API-Key", "guess")
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let right = client
        .post(format!("{base}/search"))
        .header("X-API-Key", "secret")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::OK);

    handle.abort();
}

#[tokio::test]
async fn rate_limit_applies_across_protected_routes() {
    let (base, handle) = Setup::default().with_rate_limit(3).spawn().await;

    for path in ["/search", "/api/v1/search", "/api/v1/documents/search"] {
        let (status, _) = post(&base, path, json!({ "query": "rust" })).await;
        assert_eq!(status, StatusCode::OK, "{path}");
    }
    let (status, body) = post(&base, "/search", json!({ "query": "rust" })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({ "error": "Rate limit exceeded" }));

    // Health is outside the gate.
    let health = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    handle.abort();
}

#[tokio::test]
async fn chat_creates_and_reuses_sessions() {
    let (base, handle) = Setup::default().spawn().await;

    let (status, first) = post(&base, "/chat", json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["response"], "echo: hello");
    let session_id = first["session_id"].as_str().unwrap().to_string();
    assert!(!session_id.is_empty());

    let (status, second) = post(
        &base,
        "/api/v1/conversations/chat",
        json!({ "message": "again", "session_id": session_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["response"], "echo: again");
    assert_eq!(second["session_id"], session_id);

    let (status, body) =
        post(&base, "/api/v1/chat", json!({ "message": "hi", "session_id": "missing" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("not found"), "{body}");

    handle.abort();
}

#[tokio::test]
async fn slow_requests_time_out() {
    let mut setup = Setup { generator_delay: Duration::from_secs(30), ..Setup::default() };
    setup.config.server.request_timeout_secs = 1;
    let (base, handle) = setup.spawn().await;

    let (status, body) = post(&base, "/chat", json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({ "error": "request timed out" }));

    handle.abort();
}

#[tokio::test]
async fn options_requests_short_circuit_with_cors_headers() {
    let (base, handle) = Setup::default().with_api_key("secret").with_rate_limit(1).spawn().await;
    let client = reqwest::Client::new();

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{base}/search"))
        .header("Origin", "http://example.com")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), StatusCode::OK);
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");

    for _ in 0..3 {
        let plain = client
            .request(reqwest::Method::OPTIONS, format!("{base}/chat"))
            .send()
            .await
            .unwrap();
        assert_eq!(plain.status(), StatusCode::OK);
    }

    handle.abort();
}
