//! Request admission: rate limiting, then API key authentication.

pub mod auth;
pub mod rate_limit;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::ApiError;

pub use auth::{API_KEY_HEADER, authorized};
pub use rate_limit::RateLimiter;

/// Shared admission state for the protected routes.
#[derive(Debug)]
pub struct Gate {
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl Gate {
    pub fn new(api_key: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self { api_key: api_key.into(), limiter }
    }

    pub fn from_config(server: &ServerConfig) -> Self {
        let limiter = RateLimiter::new(server.rate_limit, server.rate_window());
        Self::new(server.api_key.clone(), Arc::new(limiter))
    }

    /// A gate that admits everything.
    pub fn open() -> Self {
        Self::new("", Arc::new(RateLimiter::new(0, Default::default())))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

/// Refuse the request with 429 once the client's window budget is spent.
pub async fn enforce_rate_limit(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip(&request);
    if !gate.limiter.check(client).await {
        warn!(%client, path = %request.uri().path(), "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}

/// Refuse the request with 401 unless it carries the configured API key.
pub async fn require_api_key(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request.headers().get(API_KEY_HEADER).map(|v| v.as_bytes());
    if !authorized(&gate.api_key, presented) {
        warn!(path = %request.uri().path(), "rejected request without valid API key");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Peer address without the port. Requests served without connection info
/// share one unspecified address.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
