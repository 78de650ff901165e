use std::net::SocketAddr;
use std::path::PathBuf;

use agentic_rag_server::config::VectorStoreBackend;
use agentic_rag_server::telemetry::init_tracing;
use agentic_rag_server::{AppConfig, AppState, DEFAULT_CONFIG_PATH, app_router};
use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

/// Agentic RAG query service.
#[derive(Debug, Parser)]
#[command(name = "agentic-rag", version, about)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load_from_env(Some(&cli.config)).context("failed to load config")?;
    init_tracing(&config.logging)?;
    if !cli.config.is_file() {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let state = AppState::from_config(&config)?;
    state.pipeline.ensure_collection().await.context("failed to prepare collection")?;

    let limiter = state.gate.limiter().clone();
    let sweeper = limiter
        .is_enabled()
        .then(|| limiter.spawn_sweeper(config.server.rate_window()));
    let evictor = state.sessions.idle_ttl().map(|ttl| state.sessions.spawn_evictor(ttl));

    let store = match config.vectorstore.provider {
        VectorStoreBackend::Qdrant => config.vectorstore.endpoint(),
        VectorStoreBackend::Memory => "in-memory".to_string(),
    };
    info!(
        vectorstore = %store,
        collection = %config.vectorstore.collection,
        chunk_size = config.retriever.chunk_size,
        chunk_overlap = config.retriever.chunk_overlap,
        chunking = ?config.retriever.chunking,
        auth = !config.server.api_key.is_empty(),
        rate_limit = config.server.rate_limit,
        session_idle_ttl_secs = config.agent.session_idle_ttl_secs,
        "configuration loaded"
    );

    let address = config.server.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("agentic-rag listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app_router(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in sweeper.into_iter().chain(evictor) {
        task.abort();
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
