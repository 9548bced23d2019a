//! Row-oriented JSON format
//!
//! The set serializes directly: per-chunk records in order, document
//! metadata, format tag, and count. Struct field order is fixed, so the
//! same set always produces the same bytes.

use crate::error::{Error, Result};
use crate::types::PersistedEmbeddingSet;

pub fn to_bytes(set: &PersistedEmbeddingSet) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(set).map_err(|e| Error::PersistFailed(e.to_string()))
}

pub fn from_bytes(bytes: &[u8]) -> Result<PersistedEmbeddingSet> {
    serde_json::from_slice(bytes).map_err(|e| Error::PersistFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmbeddedChunk, SetMetadata};

    fn sample() -> PersistedEmbeddingSet {
        PersistedEmbeddingSet {
            file_id: "doc-1".to_string(),
            embeddings: vec![EmbeddedChunk {
                filename: "doc_chunk_000.txt".to_string(),
                text: "hello world".to_string(),
                token_count: 2,
                embedding: vec![0.5, -0.5],
                embedding_model: "static-test-model".to_string(),
            }],
            metadata: SetMetadata {
                user_id: "tester@example.com".to_string(),
                original_filename: "hello.txt".to_string(),
                chunk_size: 512,
                embedding_model: "static-test-model".to_string(),
            },
            storage_format: "json".to_string(),
            embedding_count: 1,
        }
    }

    #[test]
    fn test_roundtrip() {
        let set = sample();
        let bytes = to_bytes(&set).unwrap();
        assert_eq!(from_bytes(&bytes).unwrap(), set);
    }

    #[test]
    fn test_expected_fields_present() {
        let bytes = to_bytes(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["file_id"], "doc-1");
        assert_eq!(value["embedding_count"], 1);
        assert_eq!(value["storage_format"], "json");
        assert_eq!(value["metadata"]["user_id"], "tester@example.com");
        assert_eq!(value["embeddings"][0]["filename"], "doc_chunk_000.txt");
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(from_bytes(b"{not json").is_err());
    }
}
