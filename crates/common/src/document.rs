//! Document and chunk types passed between ingestion, storage and generation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Flat JSON object carried alongside text
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the content identifier
pub const CONTENT_HASH_KEY: &str = "content_hash";

/// Metadata key holding the character offset of a chunk
pub const START_INDEX_KEY: &str = "start_index";

/// Parsed text unit with source metadata. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// A slice of a document that is embedded and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk content
    pub content: String,
    /// Character offset of the chunk within its source document
    pub start_index: usize,
    /// Identifier of the content the chunk came from
    pub content_hash: String,
    /// Source metadata (filename, file type, page, ...)
    pub metadata: Metadata,
}

impl Chunk {
    /// Metadata as persisted by the vector store: primitives only, with
    /// the offset and content identifier folded in.
    pub fn flattened_metadata(&self) -> Metadata {
        let mut flat = sanitize_metadata(&self.metadata);
        flat.insert(START_INDEX_KEY.to_string(), Value::from(self.start_index));
        flat.insert(
            CONTENT_HASH_KEY.to_string(),
            Value::String(self.content_hash.clone()),
        );
        flat
    }

    /// Source filename, if recorded
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// Drop every metadata value that is not a string, number or boolean.
pub fn sanitize_metadata(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter(|(_, value)| matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Lowercase hex SHA-256 of raw document bytes
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_drops_complex_values() {
        let metadata = json!({
            "source": "report.pdf",
            "page_number": 3,
            "is_scanned": false,
            "languages": ["eng"],
            "coordinates": {"x": 1, "y": 2},
            "parent_id": null
        });
        let clean = sanitize_metadata(metadata.as_object().unwrap());

        assert_eq!(clean.len(), 3);
        assert_eq!(clean["source"], "report.pdf");
        assert_eq!(clean["page_number"], 3);
        assert_eq!(clean["is_scanned"], false);
        assert!(!clean.contains_key("languages"));
        assert!(!clean.contains_key("coordinates"));
        assert!(!clean.contains_key("parent_id"));
    }

    #[test]
    fn test_flattened_metadata_includes_offset_and_hash() {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("dolphins.txt"));
        metadata.insert("tags".into(), json!(["a", "b"]));

        let chunk = Chunk {
            content: "A dolphin named Jian-Jian-tun exists.".into(),
            start_index: 180,
            content_hash: "abc".into(),
            metadata,
        };

        let flat = chunk.flattened_metadata();
        assert_eq!(flat[START_INDEX_KEY], 180);
        assert_eq!(flat[CONTENT_HASH_KEY], "abc");
        assert_eq!(flat["source"], "dolphins.txt");
        assert!(!flat.contains_key("tags"));
        assert_eq!(chunk.source(), Some("dolphins.txt"));
    }

    #[test]
    fn test_content_hash_is_stable_hex() {
        let hash = content_hash(b"hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(hash, content_hash(b"hello!"));
    }
}
