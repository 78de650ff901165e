//! Service configuration.
//!
//! Values are layered, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `GOOGLE_API_KEY` (model API key) and `QDRANT_URL`
//! 3. the YAML file
//! 4. `APP_<SECTION>_<FIELD>` environment variables, e.g. `APP_SERVER_RATE_LIMIT`
//!
//! A missing or unreadable YAML file is logged and skipped. Bad environment
//! values and failed validation are errors.

use std::path::Path;
use std::time::Duration;

use agentic_rag_index::{ChunkingStrategy, DEFAULT_RRF_K, RagConfig};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;
use tracing::warn;

/// Config file read when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

const ENV_PREFIX: &str = "APP_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Gemini,
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    #[default]
    Qdrant,
    /// Process-local index; contents are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Generation and embedding models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub embedding_model: String,
    pub embedding_provider: EmbeddingBackend,
    pub api_key: String,
    /// Overrides the REST endpoint of the model provider.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.5-flash".to_string(),
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_provider: EmbeddingBackend::Gemini,
            api_key: String::new(),
            base_url: None,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub name: String,
    /// Sessions are created under this app name.
    pub app_name: String,
    pub description: String,
    pub instruction: String,
    pub max_history_turns: usize,
    /// Sessions untouched for this long are evicted. 0 keeps them forever.
    pub session_idle_ttl_secs: u64,
}

impl AgentSettings {
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: "rag_agent".to_string(),
            app_name: "agentic_rag".to_string(),
            description: "An intelligent RAG agent.".to_string(),
            instruction: "You are a helpful RAG assistant.".to_string(),
            max_history_turns: 10,
            session_idle_ttl_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub provider: VectorStoreBackend,
    /// Host name, or a full URL with scheme and port.
    pub url: String,
    pub grpc_port: u16,
    pub collection: String,
    pub vector_size: usize,
    pub api_key: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: VectorStoreBackend::Qdrant,
            url: "localhost".to_string(),
            grpc_port: 6334,
            collection: "agenticrag".to_string(),
            vector_size: 768,
            api_key: String::new(),
        }
    }
}

impl VectorStoreConfig {
    /// gRPC endpoint of the Qdrant server.
    pub fn endpoint(&self) -> String {
        if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("http://{}:{}", self.url, self.grpc_port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub min_score: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunking: ChunkingStrategy,
    pub rrf_k: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.0,
            chunk_size: 512,
            chunk_overlap: 50,
            chunking: ChunkingStrategy::Recursive,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Required `X-API-Key` value; empty disables authentication.
    pub api_key: String,
    /// Requests per window and client address; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Window length in seconds.
    pub rate_window: u64,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            api_key: String::new(),
            rate_limit: 100,
            rate_window: 60,
            request_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub agent: AgentSettings,
    pub vectorstore: VectorStoreConfig,
    pub retriever: RetrieverConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration with `env` as the environment lookup.
    ///
    /// `path` of `None` skips the file layer.
    pub fn load(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();
        if let Some(key) = env("GOOGLE_API_KEY").filter(|k| !k.is_empty()) {
            config.model.api_key = key;
        }
        if let Some(url) = env("QDRANT_URL").filter(|u| !u.is_empty()) {
            config.vectorstore.url = url;
        }

        let mut tree = serde_yaml::to_value(&config).map_err(invalid)?;
        if let Some(path) = path {
            match read_file_layer(path, &tree) {
                Ok(Some(merged)) => tree = merged,
                Ok(None) => {}
                Err(message) => {
                    warn!(path = %path.display(), error = %message, "could not load config file");
                }
            }
        }

        apply_env(&mut tree, &env);
        let config: AppConfig = serde_yaml::from_value(tree).map_err(invalid)?;
        config.validate()?;
        Ok(config)
    }

    /// Load using the process environment.
    pub fn load_from_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(path, |key| std::env::var(key).ok())
    }

    /// Retrieval and ingestion settings for the index crate.
    pub fn rag_config(&self) -> Result<RagConfig, ConfigError> {
        RagConfig::builder()
            .collection(self.vectorstore.collection.clone())
            .vector_size(self.vectorstore.vector_size)
            .chunk_size(self.retriever.chunk_size)
            .chunk_overlap(self.retriever.chunk_overlap)
            .chunking(self.retriever.chunking)
            .top_k(self.retriever.top_k)
            .similarity_threshold(self.retriever.min_score)
            .rrf_k(self.retriever.rrf_k)
            .build()
            .map_err(invalid)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rag_config()?;
        if self.server.rate_limit > 0 && self.server.rate_window == 0 {
            return Err(ConfigError::Invalid(
                "server.rate_window must be positive when rate limiting is enabled".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid(e.to_string())
}

/// Merge the file over `base`. `Ok(None)` means the file is empty.
fn read_file_layer(path: &Path, base: &Value) -> Result<Option<Value>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let file: Value = serde_yaml::from_str(&raw).map_err(|e| e.to_string())?;
    if file.is_null() {
        return Ok(None);
    }
    let mut merged = base.clone();
    merge(&mut merged, file);
    serde_yaml::from_value::<AppConfig>(merged.clone()).map_err(|e| e.to_string())?;
    Ok(Some(merged))
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env(tree: &mut Value, env: &impl Fn(&str) -> Option<String>) {
    let Value::Mapping(sections) = tree else {
        return;
    };
    for (section, fields) in sections.iter_mut() {
        let (Some(section), Value::Mapping(fields)) = (section.as_str(), fields) else {
            continue;
        };
        for (field, value) in fields.iter_mut() {
            let Some(field) = field.as_str() else {
                continue;
            };
            let key = format!("{ENV_PREFIX}{}_{}", section, field).to_uppercase();
            if let Some(raw) = env(&key) {
                *value = env_value(value, raw);
            }
        }
    }
}

/// String-typed fields keep the raw text so values like `"12345"` stay strings.
fn env_value(current: &Value, raw: String) -> Value {
    match current {
        Value::String(_) | Value::Null => Value::String(raw),
        _ => serde_yaml::from_str(&raw).unwrap_or(Value::String(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = AppConfig::load(None, env(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.server.rate_limit, 100);
        assert_eq!(config.vectorstore.collection, "agenticrag");
        assert_eq!(config.vectorstore.endpoint(), "http://localhost:6334");
        assert_eq!(config.retriever.chunk_size, 512);
        assert_eq!(config.retriever.chunk_overlap, 50);
        assert_eq!(config.agent.session_idle_ttl(), Duration::ZERO);
    }

    #[test]
    fn session_idle_ttl_reads_from_file() {
        let file = yaml_file("agent:\n  session_idle_ttl_secs: 1800\n");
        let config = AppConfig::load(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.agent.session_idle_ttl(), Duration::from_secs(1800));
        assert_eq!(config.agent.max_history_turns, 10);
    }

    #[test]
    fn file_overrides_defaults_and_keeps_unset_fields() {
        let file = yaml_file(
            "server:\n  port: 9000\n  api_key: secret\nretriever:\n  top_k: 3\n  chunking: fixed\n",
        );
        let config = AppConfig::load(Some(file.path()), env(&[])).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.api_key, "secret");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.retriever.top_k, 3);
        assert_eq!(config.retriever.chunking, ChunkingStrategy::Fixed);
        assert_eq!(config.retriever.chunk_size, 512);
    }

    #[test]
    fn prefixed_env_beats_file() {
        let file = yaml_file("server:\n  rate_limit: 5\nvectorstore:\n  provider: qdrant\n");
        let config = AppConfig::load(
            Some(file.path()),
            env(&[
                ("APP_SERVER_RATE_LIMIT", "7"),
                ("APP_SERVER_API_KEY", "12345"),
                ("APP_VECTORSTORE_PROVIDER", "memory"),
                ("APP_MODEL_BASE_URL", "http://localhost:9999"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.rate_limit, 7);
        assert_eq!(config.server.api_key, "12345");
        assert_eq!(config.vectorstore.provider, VectorStoreBackend::Memory);
        assert_eq!(config.model.base_url.as_deref(), Some("http://localhost:9999"));
    }

    #[test]
    fn unprefixed_env_sits_below_the_file() {
        let config = AppConfig::load(
            None,
            env(&[("GOOGLE_API_KEY", "from-env"), ("QDRANT_URL", "http://qdrant:6334")]),
        )
        .unwrap();
        assert_eq!(config.model.api_key, "from-env");
        assert_eq!(config.vectorstore.endpoint(), "http://qdrant:6334");

        let file = yaml_file("model:\n  api_key: from-file\n");
        let config =
            AppConfig::load(Some(file.path()), env(&[("GOOGLE_API_KEY", "from-env")])).unwrap();
        assert_eq!(config.model.api_key, "from-file");
    }

    #[test]
    fn unusable_file_keeps_defaults() {
        let missing = AppConfig::load(Some(Path::new("/no/such/config.yaml")), env(&[])).unwrap();
        assert_eq!(missing, AppConfig::default());

        let garbage = yaml_file("server: [not, a, mapping\n");
        assert_eq!(AppConfig::load(Some(garbage.path()), env(&[])).unwrap(), AppConfig::default());

        let wrong_type = yaml_file("server:\n  port: not-a-port\n");
        let config = AppConfig::load(Some(wrong_type.path()), env(&[])).unwrap();
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let err = AppConfig::load(None, env(&[("APP_SERVER_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"), "{err}");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let file = yaml_file("retriever:\n  chunk_size: 100\n  chunk_overlap: 100\n");
        assert!(AppConfig::load(Some(file.path()), env(&[])).is_err());
    }

    #[test]
    fn zero_rate_limit_needs_no_window() {
        let config = AppConfig::load(
            None,
            env(&[("APP_SERVER_RATE_LIMIT", "0"), ("APP_SERVER_RATE_WINDOW", "0")]),
        )
        .unwrap();
        assert_eq!(config.server.rate_limit, 0);
    }

    #[test]
    fn rag_config_carries_retriever_and_store_settings() {
        let mut config = AppConfig::default();
        config.retriever.min_score = 0.25;
        config.vectorstore.vector_size = 3072;
        let rag = config.rag_config().unwrap();
        assert_eq!(rag.collection, "agenticrag");
        assert_eq!(rag.vector_size, 3072);
        assert_eq!(rag.similarity_threshold, 0.25);
        assert_eq!(rag.top_k, 10);
    }
}
