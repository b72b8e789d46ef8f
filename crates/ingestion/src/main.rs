//! QA Agent ingest command
//!
//! Ingests one document into the configured vector store and prints the
//! report as JSON:
//! 1. Loads configuration and secrets
//! 2. Opens the vector store with the configured embedder
//! 3. Fetches, parses, chunks and stores the document

use anyhow::Context;
use clap::Parser;
use qa_agent_common::{config::AppConfig, embeddings, SecretConfig, VectorStore, VERSION};
use qa_agent_ingestion::IngestionProcessor;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ingest", version, about = "Ingest one document into the QA Agent vector store")]
struct IngestCli {
    /// File type of the document (txt, md, html, pdf)
    file_type: String,

    /// URL the document is fetched from
    file_url: String,

    /// Configuration file; defaults to the layered config/ directory
    #[arg(long, env = "QA_AGENT_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = IngestCli::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    // Logs go to stderr; stdout carries the report
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting QA Agent ingest v{}", VERSION);

    let secrets = SecretConfig::from_env();
    let embedder = embeddings::create_embedder(&config.embedding, &secrets)
        .context("failed to create embedder")?;
    let store = VectorStore::connect(&config.vector_store, embedder)
        .await
        .context("failed to open vector store")?;

    let processor = IngestionProcessor::from_config(&config)?;
    let report = processor
        .ingest(&cli.file_type, &cli.file_url, &store)
        .await
        .with_context(|| format!("failed to ingest {}", cli.file_url))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
