//! # agentic-rag-server
//!
//! HTTP/JSON front end of the agentic RAG service: configuration loading,
//! the rate/auth gate, routes and logging setup. The `agentic-rag` binary
//! wires these together.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod state;
pub mod telemetry;

pub use api::app_router;
pub use config::{AppConfig, ConfigError, DEFAULT_CONFIG_PATH};
pub use error::ApiError;
pub use gate::{Gate, RateLimiter};
pub use state::AppState;
