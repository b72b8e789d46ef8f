//! QA Agent Ingestion
//!
//! Fetches a document by URL, parses it according to its file type, splits
//! it into overlapping chunks and writes them to the vector store.

pub mod chunker;
pub mod errors;
pub mod fetch;
pub mod loader;
pub mod pdf;
pub mod processor;

pub use chunker::{Chunker, CHUNK_OVERLAP, CHUNK_SIZE};
pub use errors::IngestionError;
pub use fetch::{FetchedFile, FileFetcher};
pub use loader::{DocumentLoader, FileType};
pub use processor::{IngestReport, IngestionProcessor, PreparedDocument};
