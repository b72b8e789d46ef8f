//! Vector store adapter
//!
//! Persists (chunk text, embedding, metadata) records in a named collection
//! of a SQLite database and answers nearest-neighbour queries by brute-force
//! cosine similarity, optionally scoped to one content hash.
//!
//! Deduplication is a check-then-insert: two concurrent ingestions of the
//! same content can both pass the check and double-insert.

pub mod record;

use crate::config::{DedupStrategy, VectorStoreConfig};
use crate::document::{Chunk, Metadata, START_INDEX_KEY};
use crate::embeddings::{cosine_similarity, Embedder};
use crate::errors::{AppError, Result};
use crate::metrics;
use record::format_embedding;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, Select, Set,
};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const MEMORY_PATH: &str = ":memory:";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS vector_records (
    id TEXT PRIMARY KEY NOT NULL,
    collection TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_vector_records_hash ON vector_records(collection, content_hash)";

/// Lifetime of the connections that keep an in-memory database alive
const MEMORY_CONNECTION_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Vector store bound to one collection and one embedder
pub struct VectorStore {
    db: DatabaseConnection,
    // Holds a named in-memory database open while `db` recycles its connection
    _anchor: Option<DatabaseConnection>,
    collection: String,
    dedup: DedupStrategy,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    /// Open (or create) the store described by `config`
    pub async fn connect(config: &VectorStoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open(config, embedder, MEMORY_CONNECTION_LIFETIME).await
    }

    /// `memory_lifetime` bounds the working connection of an in-memory store.
    /// The database itself outlives it through the anchor connection.
    async fn open(
        config: &VectorStoreConfig,
        embedder: Arc<dyn Embedder>,
        memory_lifetime: Duration,
    ) -> Result<Self> {
        let in_memory = config.path == MEMORY_PATH;

        let (opts, anchor) = if in_memory {
            // A named shared-cache database lives as long as one connection to it is open
            let url = format!(
                "sqlite:file:qa_agent_{}?mode=memory&cache=shared",
                Uuid::new_v4().simple()
            );
            let anchor = Database::connect(memory_options(&url, MEMORY_CONNECTION_LIFETIME)).await?;
            (memory_options(&url, memory_lifetime), Some(anchor))
        } else {
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let mut opts = ConnectOptions::new(format!("sqlite://{}?mode=rwc", config.path));
            opts.max_connections(config.max_connections.max(1))
                .min_connections(1)
                .sqlx_logging(false);
            (opts, None)
        };

        let db = Database::connect(opts).await?;

        db.execute_unprepared(CREATE_TABLE).await?;
        db.execute_unprepared(CREATE_INDEX).await?;

        info!(
            path = %config.path,
            collection = %config.collection,
            dedup = ?config.dedup,
            "Vector store ready"
        );

        Ok(Self {
            db,
            _anchor: anchor,
            collection: config.collection.clone(),
            dedup: config.dedup,
            embedder,
        })
    }

    /// Collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Configured deduplication strategy
    pub fn dedup_strategy(&self) -> DedupStrategy {
        self.dedup
    }

    fn scoped(&self) -> Select<record::Entity> {
        record::Entity::find().filter(record::Column::Collection.eq(self.collection.as_str()))
    }

    /// Number of records in the collection
    pub async fn count(&self) -> Result<u64> {
        Ok(self.scoped().count(&self.db).await?)
    }

    /// Whether the collection holds no records at all
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.count().await? == 0)
    }

    /// Number of records stored for one content hash
    pub async fn count_for(&self, content_hash: &str) -> Result<u64> {
        Ok(self
            .scoped()
            .filter(record::Column::ContentHash.eq(content_hash))
            .count(&self.db)
            .await?)
    }

    /// Decide whether content should be written, per the dedup strategy.
    ///
    /// `StoreEmpty` only looks at whether the collection is empty: once any
    /// document is stored, every later document is skipped, whatever its hash.
    pub async fn should_ingest(&self, content_hash: &str) -> Result<bool> {
        match self.dedup {
            DedupStrategy::StoreEmpty => self.is_empty().await,
            DedupStrategy::ContentHash => Ok(self.count_for(content_hash).await? == 0),
        }
    }

    /// Embed and insert chunks, one record at a time.
    ///
    /// Not atomic: a failure part-way leaves earlier records in place.
    #[instrument(skip(self, chunks), fields(collection = %self.collection, count = chunks.len()))]
    pub async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "Expected {} embeddings, received {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let record = record::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                collection: Set(self.collection.clone()),
                content_hash: Set(chunk.content_hash.clone()),
                content: Set(chunk.content.clone()),
                metadata: Set(serde_json::to_string(&chunk.flattened_metadata())?),
                embedding: Set(format_embedding(&embedding)),
                created_at: Set(chrono::Utc::now()),
            };
            record.insert(&self.db).await?;
        }

        debug!("Chunks stored");
        Ok(chunks.len())
    }

    /// Nearest neighbours of `text`, most similar first, at most `k`.
    ///
    /// With `content_hash` set only records of that content are considered.
    #[instrument(skip(self, text), fields(collection = %self.collection))]
    pub async fn query(&self, text: &str, content_hash: Option<&str>, k: usize) -> Result<Vec<Chunk>> {
        let start = Instant::now();
        let query_embedding = self.embedder.embed(text).await?;

        let mut select = self.scoped();
        if let Some(hash) = content_hash {
            select = select.filter(record::Column::ContentHash.eq(hash));
        }
        let records = select.all(&self.db).await?;

        let mut scored: Vec<(f32, record::Model)> = records
            .into_iter()
            .filter_map(|r| {
                let embedding = r.parse_embedding()?;
                Some((cosine_similarity(&query_embedding, &embedding), r))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        debug!(
            results = scored.len(),
            top_score = ?scored.first().map(|(s, _)| *s),
            "Similarity search complete"
        );

        let chunks = scored
            .into_iter()
            .map(|(_, r)| record_to_chunk(r))
            .collect::<Result<Vec<_>>>()?;

        metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            chunks.len(),
            content_hash.is_some(),
        );

        Ok(chunks)
    }

    /// Check the database is reachable
    pub async fn ping(&self) -> Result<()> {
        self.db.execute_unprepared("SELECT 1").await?;
        Ok(())
    }
}

/// Single-connection pool over a shared in-memory database
fn memory_options(url: &str, lifetime: Duration) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url.to_string());
    opts.max_connections(1)
        .min_connections(1)
        .max_lifetime(lifetime)
        .idle_timeout(lifetime)
        .sqlx_logging(false);
    opts
}

fn record_to_chunk(record: record::Model) -> Result<Chunk> {
    let metadata: Metadata = serde_json::from_str(&record.metadata)?;
    let start_index = metadata
        .get(START_INDEX_KEY)
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;

    Ok(Chunk {
        content: record.content,
        start_index,
        content_hash: record.content_hash,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use serde_json::json;

    async fn memory_store(dedup: DedupStrategy) -> VectorStore {
        let config = VectorStoreConfig {
            path: MEMORY_PATH.to_string(),
            dedup,
            ..VectorStoreConfig::default()
        };
        VectorStore::connect(&config, Arc::new(HashEmbedder::new(256)))
            .await
            .unwrap()
    }

    fn chunk(content: &str, hash: &str, start_index: usize) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!(format!("{}.txt", hash)));
        metadata.insert("languages".into(), json!(["eng"]));
        Chunk {
            content: content.to_string(),
            start_index,
            content_hash: hash.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_add_and_count() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        assert!(store.is_empty().await.unwrap());

        let added = store
            .add(&[chunk("first", "abc", 0), chunk("second", "abc", 6)])
            .await
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.count_for("abc").await.unwrap(), 2);
        assert_eq!(store.count_for("xyz").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_nothing() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        assert_eq!(store.add(&[]).await.unwrap(), 0);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_query_filters_by_content_hash() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        store
            .add(&[
                chunk("X is a kind of marine mammal.", "abc", 0),
                chunk("What X means in another file.", "xyz", 0),
                chunk("X appears again here.", "abc", 30),
            ])
            .await
            .unwrap();

        let results = store.query("What is X?", Some("abc"), 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|c| c.content_hash == "abc"));
        assert!(results.iter().all(|c| c.metadata["content_hash"] == "abc"));
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity_and_limits() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        store
            .add(&[
                chunk("Quarterly revenue grew in Europe.", "abc", 0),
                chunk("A dolphin named Jian-Jian-tun exists.", "abc", 40),
                chunk("The office closes at six.", "abc", 80),
            ])
            .await
            .unwrap();

        let results = store
            .query("Is there a dolphin named Jian-Jian-tun?", None, 2)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("Jian-Jian-tun"));
        assert_eq!(results[0].start_index, 40);
    }

    #[tokio::test]
    async fn test_query_unknown_hash_is_empty() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        store.add(&[chunk("something", "abc", 0)]).await.unwrap();

        let results = store.query("anything", Some("missing"), 4).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_stored_metadata_is_flattened() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        store.add(&[chunk("flat", "abc", 12)]).await.unwrap();

        let results = store.query("flat", None, 1).await.unwrap();
        let metadata = &results[0].metadata;
        assert_eq!(metadata["source"], "abc.txt");
        assert_eq!(metadata["start_index"], 12);
        assert!(!metadata.contains_key("languages"));
    }

    #[tokio::test]
    async fn test_store_empty_dedup_is_coarse() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        assert!(store.should_ingest("abc").await.unwrap());

        store.add(&[chunk("first document", "abc", 0)]).await.unwrap();

        // Same content is skipped, and so is unrelated content
        assert!(!store.should_ingest("abc").await.unwrap());
        assert!(!store.should_ingest("def").await.unwrap());
    }

    #[tokio::test]
    async fn test_content_hash_dedup() {
        let store = memory_store(DedupStrategy::ContentHash).await;
        store.add(&[chunk("first document", "abc", 0)]).await.unwrap();

        assert!(!store.should_ingest("abc").await.unwrap());
        assert!(store.should_ingest("def").await.unwrap());
    }

    #[tokio::test]
    async fn test_ping() {
        let store = memory_store(DedupStrategy::StoreEmpty).await;
        tokio_test::assert_ok!(store.ping().await);
    }

    #[tokio::test]
    async fn test_memory_store_survives_connection_recycle() {
        let config = VectorStoreConfig {
            path: MEMORY_PATH.to_string(),
            ..VectorStoreConfig::default()
        };
        let store = VectorStore::open(&config, Arc::new(HashEmbedder::new(256)), Duration::from_millis(200))
            .await
            .unwrap();

        store.add(&[chunk("first document", "abc", 0)]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(store.count().await.unwrap(), 1);
        store.add(&[chunk("second document", "abc", 20)]).await.unwrap();
        assert_eq!(store.query("document", Some("abc"), 4).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_stores_are_isolated() {
        let first = memory_store(DedupStrategy::StoreEmpty).await;
        let second = memory_store(DedupStrategy::StoreEmpty).await;

        first.add(&[chunk("first document", "abc", 0)]).await.unwrap();

        assert_eq!(first.count().await.unwrap(), 1);
        assert!(second.is_empty().await.unwrap());
    }
}
