//! Text chunking module
//!
//! Splits documents into overlapping character-bounded chunks for embedding.

use crate::errors::IngestionError;
use crate::loader::FileType;
use qa_agent_common::document::{Chunk, Document};
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};
use tracing::debug;

/// Target chunk size in characters
pub const CHUNK_SIZE: usize = 200;

/// Overlap between consecutive chunks in characters
pub const CHUNK_OVERLAP: usize = 20;

/// Splits documents with fixed size and overlap
pub struct Chunker {
    text: TextSplitter<text_splitter::Characters>,
    markdown: MarkdownSplitter<text_splitter::Characters>,
}

impl Chunker {
    pub fn new() -> Result<Self, IngestionError> {
        let config = || {
            ChunkConfig::new(CHUNK_SIZE)
                .with_overlap(CHUNK_OVERLAP)
                .map_err(|e| IngestionError::ChunkingError(e.to_string()))
        };

        Ok(Self {
            text: TextSplitter::new(config()?),
            markdown: MarkdownSplitter::new(config()?),
        })
    }

    /// Split every document, tagging chunks with `content_hash` and the
    /// document's metadata.
    pub fn split(&self, documents: &[Document], file_type: FileType, content_hash: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for document in documents {
            let pieces: Vec<(usize, &str)> = match file_type {
                FileType::Markdown => self.markdown.chunk_indices(&document.content).collect(),
                _ => self.text.chunk_indices(&document.content).collect(),
            };

            let mut offsets = CharOffsets::new(&document.content);
            for (byte_offset, piece) in pieces {
                chunks.push(Chunk {
                    content: piece.to_string(),
                    start_index: offsets.char_index(byte_offset),
                    content_hash: content_hash.to_string(),
                    metadata: document.metadata.clone(),
                });
            }
        }

        debug!(
            documents = documents.len(),
            chunk_count = chunks.len(),
            chunk_size = CHUNK_SIZE,
            "Text chunked"
        );

        chunks
    }
}

/// Converts byte offsets into char offsets, scanning forward from the last
/// lookup.
struct CharOffsets<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharOffsets<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, byte: 0, chars: 0 }
    }

    fn char_index(&mut self, byte_offset: usize) -> usize {
        if byte_offset < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += self.text[self.byte..byte_offset].chars().count();
        self.byte = byte_offset;
        self.chars
    }
}
