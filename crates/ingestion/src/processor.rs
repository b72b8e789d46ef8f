//! Ingestion processor
//!
//! Core logic for ingesting a document: type check, fetch, parse, chunk and
//! store insert.

use crate::chunker::Chunker;
use crate::errors::IngestionError;
use crate::fetch::FileFetcher;
use crate::loader::{DocumentLoader, FileType};
use qa_agent_common::config::AppConfig;
use qa_agent_common::document::{content_hash, Chunk};
use qa_agent_common::errors::Result;
use qa_agent_common::metrics;
use qa_agent_common::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument};

/// A fetched, parsed and split document ready for storage
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub content_hash: String,
    pub source: String,
    pub file_type: FileType,
    pub chunks: Vec<Chunk>,
}

/// Outcome of one ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub content_hash: String,
    pub source: String,
    pub chunks_total: usize,
    pub chunks_added: usize,
    pub skipped: bool,
}

/// Ingestion processor
pub struct IngestionProcessor {
    loader: DocumentLoader,
    fetcher: FileFetcher,
    chunker: Chunker,
}

impl IngestionProcessor {
    pub fn new(loader: DocumentLoader, fetcher: FileFetcher) -> std::result::Result<Self, IngestionError> {
        Ok(Self {
            loader,
            fetcher,
            chunker: Chunker::new()?,
        })
    }

    /// Build a processor from the `file` config section
    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, IngestionError> {
        Self::new(
            DocumentLoader::new(&config.file.allowed_types),
            FileFetcher::new(config.fetch_timeout())?,
        )
    }

    /// Check the type, fetch, hash, parse and split. The type is checked
    /// before any network access.
    #[instrument(skip(self))]
    pub async fn prepare(&self, file_type: &str, file_url: &str) -> Result<PreparedDocument> {
        let file_type = self.loader.check_file_type(file_type)?;

        let file = self.fetcher.fetch(file_url).await?;
        let hash = content_hash(&file.bytes);

        let documents = self.loader.load(file_type, &file, &hash)?;
        let chunks = self.chunker.split(&documents, file_type, &hash);

        Ok(PreparedDocument {
            content_hash: hash,
            source: file.filename,
            file_type,
            chunks,
        })
    }

    /// Prepare a document and write its chunks unless the store's dedup
    /// check says the content is already present.
    #[instrument(skip(self, store), fields(collection = %store.collection()))]
    pub async fn ingest(&self, file_type: &str, file_url: &str, store: &VectorStore) -> Result<IngestReport> {
        let start = Instant::now();
        let prepared = self.prepare(file_type, file_url).await?;

        let chunks_added = if store.should_ingest(&prepared.content_hash).await? {
            store.add(&prepared.chunks).await?
        } else {
            0
        };
        let skipped = chunks_added == 0 && !prepared.chunks.is_empty();

        metrics::record_ingestion(
            start.elapsed().as_secs_f64(),
            chunks_added,
            prepared.file_type.as_str(),
        );

        info!(
            content_hash = %prepared.content_hash,
            source = %prepared.source,
            chunks_total = prepared.chunks.len(),
            chunks_added,
            skipped,
            dedup = ?store.dedup_strategy(),
            "Document ingested"
        );

        Ok(IngestReport {
            content_hash: prepared.content_hash,
            source: prepared.source,
            chunks_total: prepared.chunks.len(),
            chunks_added,
            skipped,
        })
    }
}
