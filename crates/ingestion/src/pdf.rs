//! PDF text extraction module
//!
//! Extracts per-page text from in-memory PDF bytes using lopdf.

use crate::errors::IngestionError;
use tracing::{debug, warn};

/// Text of one PDF page
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    pub number: u32,
    pub text: String,
}

/// Extract the text of every page. Pages that fail to decode are skipped;
/// a document with no text at all is an error.
pub fn extract_pages(bytes: &[u8], source_name: &str) -> Result<Vec<PdfPage>, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::PdfParseError {
        source_name: source_name.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    debug!(page_count = page_numbers.len(), "Extracting text from PDF");

    let mut pages = Vec::with_capacity(page_numbers.len());
    for number in page_numbers {
        match doc.extract_text(&[number]) {
            Ok(raw) => {
                let text = clean_text(&raw);
                if !text.is_empty() {
                    pages.push(PdfPage { number, text });
                }
            }
            Err(e) => {
                warn!(page = number, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    if pages.is_empty() {
        return Err(IngestionError::PdfParseError {
            source_name: source_name.to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    Ok(pages)
}

/// Normalise whitespace and strip byte-order marks
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
