//! Ingestion error types

use qa_agent_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to fetch {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("PDF parse error for {source_name}: {message}")]
    PdfParseError { source_name: String, message: String },

    #[error("No text content in {0}")]
    EmptyDocument(String),

    #[error("Chunking error: {0}")]
    ChunkingError(String),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::UnsupportedFileType(file_type) => AppError::UnsupportedFileType { file_type },
            IngestionError::FetchFailed { url, message } => AppError::Fetch { url, message },
            IngestionError::PdfParseError { source_name, message } => {
                AppError::DocumentParse { source_name, message }
            }
            IngestionError::EmptyDocument(source_name) => AppError::DocumentParse {
                source_name,
                message: "No text content extracted".to_string(),
            },
            IngestionError::ChunkingError(message) => AppError::Internal { message },
        }
    }
}
