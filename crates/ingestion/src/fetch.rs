//! Remote file fetching

use crate::errors::IngestionError;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};

/// Filename used when the URL path has no usable last segment
pub const DEFAULT_FILENAME: &str = "document";

/// Raw bytes of a fetched file
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// HTTP file fetcher with a fixed timeout
#[derive(Clone)]
pub struct FileFetcher {
    client: reqwest::Client,
}

impl FileFetcher {
    pub fn new(timeout: Duration) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestionError::FetchFailed {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    /// Download `url`. Transport errors and non-2xx statuses both fail.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedFile, IngestionError> {
        let failed = |message: String| IngestionError::FetchFailed {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let filename = filename_from_url(response.url());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| failed(e.to_string()))?
            .to_vec();

        debug!(filename = %filename, size = bytes.len(), "File fetched");

        Ok(FetchedFile {
            url: url.to_string(),
            filename,
            content_type,
            bytes,
        })
    }
}

/// Last non-empty path segment of a URL
fn filename_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(url: &str) -> String {
        filename_from_url(&reqwest::Url::parse(url).unwrap())
    }

    #[test]
    fn test_filename_is_last_segment() {
        assert_eq!(name("https://example.com/docs/dolphin.txt"), "dolphin.txt");
        assert_eq!(name("https://example.com/docs/report.pdf?version=2"), "report.pdf");
    }

    #[test]
    fn test_filename_ignores_trailing_slash() {
        assert_eq!(name("https://example.com/docs/"), "docs");
    }

    #[test]
    fn test_filename_defaults_without_path() {
        assert_eq!(name("https://example.com"), DEFAULT_FILENAME);
        assert_eq!(name("https://example.com/"), DEFAULT_FILENAME);
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_fails() {
        let fetcher = FileFetcher::new(Duration::from_secs(2)).unwrap();
        let result = fetcher.fetch("http://127.0.0.1:1/missing.txt").await;
        assert!(matches!(result, Err(IngestionError::FetchFailed { .. })));
    }
}
