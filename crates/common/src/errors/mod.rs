//! Error types for QA Agent services
//!
//! Provides the error taxonomy shared by every crate:
//! - Three named domain errors for the request shape and file type
//! - Opaque upstream failures (fetch, parse, embedding, model, store)
//! - HTTP status code mapping and structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request errors (1xxx)
    ValidationError,
    MissingParams,
    InvalidParams,
    UnsupportedFileType,

    // Upstream errors (8xxx)
    FetchError,
    DocumentParseError,
    EmbeddingError,
    LlmError,
    UpstreamError,

    // Storage errors (7xxx)
    VectorStoreError,

    // Internal errors (9xxx)
    RequestFailed,
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingParams => 1002,
            ErrorCode::InvalidParams => 1003,
            ErrorCode::UnsupportedFileType => 1004,

            ErrorCode::VectorStoreError => 7001,

            ErrorCode::FetchError => 8001,
            ErrorCode::DocumentParseError => 8002,
            ErrorCode::EmbeddingError => 8003,
            ErrorCode::LlmError => 8004,
            ErrorCode::UpstreamError => 8005,

            ErrorCode::RequestFailed => 9000,
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Request errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Missing required parameters")]
    MissingParams,

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Unsupported file type: {file_type}")]
    UnsupportedFileType { file_type: String },

    // Upstream errors
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to parse {source_name}: {message}")]
    DocumentParse {
        source_name: String,
        message: String,
    },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Language model error: {message}")]
    LlmError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Storage errors
    #[error("Vector store error: {0}")]
    VectorStore(#[from] sea_orm::DbErr),

    // Internal errors
    #[error("Failed to process question: {message}")]
    RequestFailed { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingParams => ErrorCode::MissingParams,
            AppError::InvalidParams { .. } => ErrorCode::InvalidParams,
            AppError::UnsupportedFileType { .. } => ErrorCode::UnsupportedFileType,
            AppError::Fetch { .. } => ErrorCode::FetchError,
            AppError::DocumentParse { .. } => ErrorCode::DocumentParseError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::LlmError { .. } => ErrorCode::LlmError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::VectorStore(_) => ErrorCode::VectorStoreError,
            AppError::RequestFailed { .. } => ErrorCode::RequestFailed,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Only the request-shape errors and the file type check are client errors;
    /// every other failure surfaces as a 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::MissingParams
            | AppError::InvalidParams { .. }
            | AppError::UnsupportedFileType { .. } => StatusCode::BAD_REQUEST,

            AppError::Fetch { .. }
            | AppError::DocumentParse { .. }
            | AppError::EmbeddingError { .. }
            | AppError::LlmError { .. }
            | AppError::HttpClient(_)
            | AppError::VectorStore(_)
            | AppError::RequestFailed { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match self {
            AppError::Validation { field, .. } => field,
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_domain_errors_are_bad_request() {
        let errors = [
            AppError::MissingParams,
            AppError::InvalidParams {
                message: "unexpected key".into(),
            },
            AppError::UnsupportedFileType {
                file_type: "exe".into(),
            },
        ];

        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "question must not be empty".into(),
            field: Some("question".into()),
        };
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_upstream_failures_are_server_errors() {
        let err = AppError::LlmError {
            message: "context length exceeded".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());

        let err = AppError::Fetch {
            url: "http://example.invalid/a.txt".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.code(), ErrorCode::FetchError);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_request_failed_embeds_inner_message() {
        let inner = AppError::EmbeddingError {
            message: "503 from provider".into(),
        };
        let err = AppError::RequestFailed {
            message: inner.to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to process question: Embedding service error: 503 from provider"
        );
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedFileType).unwrap();
        assert_eq!(json, "\"UNSUPPORTED_FILE_TYPE\"");
        assert_eq!(ErrorCode::MissingParams.as_code(), 1002);
    }
}
