//! HTTP/JSON routes.
//!
//! | Route | Aliases |
//! |---|---|
//! | `GET /health` | `/api/v1/health` |
//! | `POST /upload_text` | `/api/v1/upload_text`, `/api/v1/documents/upload` |
//! | `POST /search` | `/api/v1/search`, `/api/v1/documents/search` |
//! | `POST /chat` | `/api/v1/chat`, `/api/v1/conversations/chat` |
//!
//! Everything except health passes the rate limiter and then the API key
//! check. `OPTIONS` requests are answered with 200 before routing.

use std::collections::HashMap;
use std::time::Duration;

use agentic_rag_agent::ChatInput;
use agentic_rag_index::SearchResult;
use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::gate::{enforce_rate_limit, require_api_key};
use crate::state::AppState;

const UPLOAD_MESSAGE: &str = "Text uploaded and chunked successfully";

const UPLOAD_PATHS: [&str; 3] = ["/upload_text", "/api/v1/upload_text", "/api/v1/documents/upload"];
const SEARCH_PATHS: [&str; 3] = ["/search", "/api/v1/search", "/api/v1/documents/search"];
const CHAT_PATHS: [&str; 3] = ["/chat", "/api/v1/chat", "/api/v1/conversations/chat"];

/// JSON body extractor whose rejections use the service error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UploadTextRequest {
    pub text: String,
    /// Absent and `null` both mean no caller metadata.
    pub metadata: Option<HashMap<String, String>>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadTextResponse {
    pub message: String,
    pub chunk_count: usize,
    pub chunk_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    /// Absent, `null`, zero or negative means the configured default.
    pub top_k: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: String,
    pub content: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl From<SearchResult> for SearchResultItem {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.id,
            content: result.content,
            score: result.score,
            metadata: result.payload,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// Build the service router.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")]);

    let protected = Router::new()
        .merge(aliased(&UPLOAD_PATHS, post(upload_text)))
        .merge(aliased(&SEARCH_PATHS, post(search)))
        .merge(aliased(&CHAT_PATHS, post(chat)))
        .route_layer(middleware::from_fn_with_state(state.gate.clone(), require_api_key))
        .route_layer(middleware::from_fn_with_state(state.gate.clone(), enforce_rate_limit));

    let timeout = state.request_timeout;
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(middleware::from_fn_with_state(timeout, deadline))
        .layer(middleware::from_fn(answer_options))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn aliased(paths: &[&str], handler: MethodRouter<AppState>) -> Router<AppState> {
    paths.iter().fold(Router::new(), |router, path| router.route(path, handler.clone()))
}

/// Every `OPTIONS` request succeeds without reaching a route.
async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

/// Drop the request future, and every downstream call with it, once the
/// deadline passes.
async fn deadline(
    State(timeout): State<Duration>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    tokio::time::timeout(timeout, next.run(request)).await.map_err(|_| ApiError::Timeout)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn upload_text(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UploadTextRequest>,
) -> Result<Json<UploadTextResponse>, ApiError> {
    if request.text.is_empty() {
        return Err(ApiError::BadRequest("Text field is required".to_string()));
    }

    let metadata = request.metadata.unwrap_or_default();
    let chunk_ids =
        state.pipeline.ingest(&request.text, metadata, request.source.as_deref()).await?;
    info!(
        chunks = chunk_ids.len(),
        source = request.source.as_deref().unwrap_or_default(),
        "uploaded text"
    );

    Ok(Json(UploadTextResponse {
        message: UPLOAD_MESSAGE.to_string(),
        chunk_count: chunk_ids.len(),
        chunk_ids,
    }))
}

async fn search(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.is_empty() {
        return Err(ApiError::BadRequest("Query field is required".to_string()));
    }

    let top_k = request.top_k.and_then(|k| usize::try_from(k).ok()).filter(|k| *k > 0);
    let results = state.retriever.search(&request.query, top_k).await?;
    Ok(Json(SearchResponse { results: results.into_iter().map(Into::into).collect() }))
}

async fn chat(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.is_empty() {
        return Err(ApiError::BadRequest("Message field is required".to_string()));
    }

    let output = state
        .orchestrator
        .respond(ChatInput {
            message: request.message,
            session_id: request.session_id,
            user_id: request.user_id,
        })
        .await?;
    Ok(Json(ChatResponse { response: output.answer, session_id: output.session_id }))
}
