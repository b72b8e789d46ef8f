//! QA Agent Common Library
//!
//! Shared code for the QA Agent crates including:
//! - Configuration management
//! - Error types and handling
//! - Document and chunk model
//! - Embedding client abstraction
//! - Vector store over SQLite
//! - Answer generation
//! - Metrics and observability

pub mod config;
pub mod document;
pub mod embeddings;
pub mod errors;
pub mod generation;
pub mod metrics;
pub mod store;

// Re-export commonly used types
pub use config::{AppConfig, SecretConfig};
pub use document::{Chunk, Document, Metadata};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use generation::{AnswerGenerator, ChatModel, ContextBudget};
pub use store::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported by health checks
pub const SERVICE_NAME: &str = "qa-agent";
