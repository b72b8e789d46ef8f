//! Configuration management for QA Agent services
//!
//! Supports loading configuration from:
//! - Configuration files (config/config.yaml, config/{APP_ENV}, config/local)
//! - Environment variables (prefixed with APP__)
//! - Default values
//!
//! Secrets (API tokens, base URLs) never live in the layered files; they are
//! read from the process environment, optionally seeded from `.env`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Embedding model/provider pair
    pub embedding: EmbeddingConfig,

    /// Chat model used for answer generation
    pub llm: LlmConfig,

    /// Accepted document types and fetch behaviour
    pub file: FileConfig,

    /// Vector store location and deduplication
    pub vector_store: VectorStoreConfig,

    /// Retrieval configuration
    pub retrieval: RetrievalConfig,

    /// Prompt context budget
    pub generation: GenerationConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding client: huggingface, openai, hash
    #[serde(default = "default_embedding_backend")]
    pub backend: String,

    /// Inference provider routed to by the Hugging Face backend
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (only used by the hash backend)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// API base URL, overrides OPENAI_BASE_URL
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileConfig {
    /// File types accepted by the ingestion path
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,

    /// Fixed timeout for fetching a document
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

/// How the ingestion path decides whether content is already stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Ingest only when the whole collection is empty
    #[default]
    StoreEmpty,
    /// Ingest unless records with the same content hash exist
    ContentHash,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// SQLite file path, or `:memory:`
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Collection name records are stored under
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Existence check used before ingesting
    #[serde(default)]
    pub dedup: DedupStrategy,

    /// Maximum pooled connections
    #[serde(default = "default_store_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Number of nearest neighbours returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Maximum number of chunks placed in the prompt
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,

    /// Maximum total characters of context placed in the prompt
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose /metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8001 }
fn default_embedding_backend() -> String { "huggingface".to_string() }
fn default_embedding_provider() -> String { "hf-inference".to_string() }
fn default_embedding_model() -> String { "sentence-transformers/all-MiniLM-L6-v2".to_string() }
fn default_embedding_dimension() -> usize { 384 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 32 }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_allowed_types() -> Vec<String> {
    ["txt", "md", "html", "pdf"].iter().map(|t| t.to_string()).collect()
}
fn default_fetch_timeout() -> u64 { 60 }
fn default_store_path() -> String { "./data/qa_agent.db".to_string() }
fn default_collection() -> String { "qa_documents".to_string() }
fn default_store_connections() -> u32 { 4 }
fn default_top_k() -> usize { 4 }
fn default_max_context_chunks() -> usize { 8 }
fn default_max_context_chars() -> usize { 12_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_base: None,
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: 0.0,
            api_base: None,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            allowed_types: default_allowed_types(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
            dedup: DedupStrategy::default(),
            max_connections: default_store_connections(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_context_chunks: default_max_context_chunks(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

fn env_source() -> Environment {
    // e.g., APP__SERVER__PORT=8081, APP__FILE__ALLOWED_TYPES=txt,pdf
    Environment::with_prefix("APP")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("file.allowed_types")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/config").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file plus environment overrides
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// Get the fetch timeout as Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.file.fetch_timeout_secs)
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Credentials and endpoints read from the environment
#[derive(Clone, Default)]
pub struct SecretConfig {
    pub huggingfacehub_api_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
}

impl SecretConfig {
    /// Read secrets from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self {
            huggingfacehub_api_token: non_empty_env("HUGGINGFACEHUB_API_TOKEN"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_base_url: non_empty_env("OPENAI_BASE_URL"),
        }
    }
}

impl std::fmt::Debug for SecretConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("SecretConfig")
            .field("huggingfacehub_api_token", &mask(&self.huggingfacehub_api_token))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
