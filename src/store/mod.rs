//! Vector persistence
//!
//! One file per document under the user's `processed_vectors/` directory,
//! in either of two interchangeable formats:
//! - row-oriented JSON (`{doc_id}_embeddings.json`), human-readable
//! - columnar compressed binary (`{doc_id}_embeddings.h5`)
//!
//! Writes go to a temporary sibling path and are renamed into place, so a
//! concurrent reader sees either the complete set or nothing.

pub mod columnar;
pub mod json;

use crate::config::StorageFormat;
use crate::error::{Error, Result};
use crate::paths::UserPaths;
use crate::types::PersistedEmbeddingSet;
use std::path::{Path, PathBuf};

pub struct VectorStore {
    base_dir: PathBuf,
}

impl VectorStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn vectors_dir(&self, user_id: &str) -> PathBuf {
        UserPaths::new(&self.base_dir, user_id).processed_vectors
    }

    fn file_name(document_id: &str, format: StorageFormat) -> String {
        format!("{}_embeddings.{}", document_id, format.extension())
    }

    /// Serialize and write a set in the given format. Returns the final
    /// path. Writing the same set twice yields identical file contents.
    pub fn save(&self, set: &PersistedEmbeddingSet, format: StorageFormat) -> Result<PathBuf> {
        let dir = self.vectors_dir(&set.metadata.user_id);
        std::fs::create_dir_all(&dir)?;

        let bytes = match format {
            StorageFormat::Json => json::to_bytes(set)?,
            StorageFormat::Hdf5 => columnar::to_bytes(set)?,
        };

        let final_path = dir.join(Self::file_name(&set.file_id, format));
        let tmp_path = dir.join(format!(".{}.tmp", Self::file_name(&set.file_id, format)));

        if let Err(e) = std::fs::write(&tmp_path, &bytes) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        std::fs::rename(&tmp_path, &final_path)?;

        Ok(final_path)
    }

    /// Load one document's set, trying both formats.
    pub fn load(&self, user_id: &str, document_id: &str) -> Result<PersistedEmbeddingSet> {
        let dir = self.vectors_dir(user_id);
        for format in [StorageFormat::Json, StorageFormat::Hdf5] {
            let path = dir.join(Self::file_name(document_id, format));
            if path.is_file() {
                return Self::load_file(&path);
            }
        }
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no persisted set for document {}", document_id),
        )))
    }

    fn load_file(path: &Path) -> Result<PersistedEmbeddingSet> {
        let bytes = std::fs::read(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => json::from_bytes(&bytes),
            Some("h5") => columnar::from_bytes(&bytes),
            _ => Err(Error::PersistFailed(format!(
                "unrecognized vector file: {}",
                path.display()
            ))),
        }
    }

    /// Load every persisted set for a user by scanning their vectors
    /// directory. Unreadable files fail the whole load rather than being
    /// silently dropped.
    pub fn load_user_library(&self, user_id: &str) -> Result<Vec<PersistedEmbeddingSet>> {
        let dir = self.vectors_dir(user_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut sets = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).max_depth(1) {
            let entry = entry.map_err(|e| Error::PersistFailed(e.to_string()))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            if path.is_file() && name.contains("_embeddings.") && !name.starts_with('.') {
                sets.push(Self::load_file(path)?);
            }
        }
        sets.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmbeddedChunk, SetMetadata};

    fn sample_set(doc_id: &str, format: StorageFormat) -> PersistedEmbeddingSet {
        PersistedEmbeddingSet {
            file_id: doc_id.to_string(),
            embeddings: vec![
                EmbeddedChunk {
                    filename: "doc_chunk_000.txt".to_string(),
                    text: "first chunk of text".to_string(),
                    token_count: 4,
                    embedding: vec![0.125, -0.5, 0.75, 1.0],
                    embedding_model: "static-test-model".to_string(),
                },
                EmbeddedChunk {
                    filename: "doc_chunk_001.txt".to_string(),
                    text: "second chunk with unicode: héllo".to_string(),
                    token_count: 7,
                    embedding: vec![0.0, 0.25, -0.25, 0.5],
                    embedding_model: "static-test-model".to_string(),
                },
            ],
            metadata: SetMetadata {
                user_id: "tester@example.com".to_string(),
                original_filename: "doc.txt".to_string(),
                chunk_size: 512,
                embedding_model: "static-test-model".to_string(),
            },
            storage_format: format.name().to_string(),
            embedding_count: 2,
        }
    }

    #[test]
    fn test_json_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().to_path_buf());
        let set = sample_set("doc-json", StorageFormat::Json);

        let path = store.save(&set, StorageFormat::Json).unwrap();
        assert!(path.ends_with("doc-json_embeddings.json"));

        let loaded = store.load("tester@example.com", "doc-json").unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_columnar_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().to_path_buf());
        let set = sample_set("doc-h5", StorageFormat::Hdf5);

        let path = store.save(&set, StorageFormat::Hdf5).unwrap();
        assert!(path.ends_with("doc-h5_embeddings.h5"));

        let loaded = store.load("tester@example.com", "doc-h5").unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_json_save_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().to_path_buf());
        let set = sample_set("doc-idem", StorageFormat::Json);

        let path = store.save(&set, StorageFormat::Json).unwrap();
        let first = std::fs::read(&path).unwrap();
        store.save(&set, StorageFormat::Json).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_library_scan_spans_formats() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().to_path_buf());

        store
            .save(&sample_set("doc-a", StorageFormat::Json), StorageFormat::Json)
            .unwrap();
        store
            .save(&sample_set("doc-b", StorageFormat::Hdf5), StorageFormat::Hdf5)
            .unwrap();

        let library = store.load_user_library("tester@example.com").unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library[0].file_id, "doc-a");
        assert_eq!(library[1].file_id, "doc-b");
    }

    #[test]
    fn test_unknown_user_has_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().to_path_buf());
        assert!(store.load_user_library("ghost@example.com").unwrap().is_empty());
    }

    #[test]
    fn test_missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().to_path_buf());
        assert!(store.load("tester@example.com", "missing").is_err());
    }
}
