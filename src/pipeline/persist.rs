//! Persist step
//!
//! Assembles the document's embedded chunks into a `PersistedEmbeddingSet`
//! and hands it to the vector store. The store writes to a temporary path
//! and renames, so readers never observe a half-written set.

use super::{PipelineContext, Step};
use crate::config::StorageFormat;
use crate::error::{Error, Result};
use crate::store::VectorStore;
use crate::types::{PersistedEmbeddingSet, SetMetadata};
use std::sync::Arc;

pub struct PersistStep {
    store: Arc<VectorStore>,
    format: StorageFormat,
    chunk_size: usize,
}

impl PersistStep {
    pub fn new(store: Arc<VectorStore>, format: StorageFormat, chunk_size: usize) -> Self {
        Self {
            store,
            format,
            chunk_size,
        }
    }
}

#[async_trait::async_trait]
impl Step for PersistStep {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<String> {
        let embeddings = ctx
            .embeddings_data
            .clone()
            .ok_or_else(|| Error::PersistFailed("no embeddings in context".to_string()))?;

        if let Some(expected) = ctx.chunk_count {
            if embeddings.len() != expected {
                return Err(Error::PersistFailed(format!(
                    "{} embeddings for {} chunks",
                    embeddings.len(),
                    expected
                )));
            }
        }

        let model = embeddings
            .first()
            .map(|c| c.embedding_model.clone())
            .ok_or_else(|| Error::PersistFailed("empty embedding set".to_string()))?;

        let set = PersistedEmbeddingSet {
            file_id: ctx.document_id.clone(),
            embedding_count: embeddings.len(),
            embeddings,
            metadata: SetMetadata {
                user_id: ctx.user_id.clone(),
                original_filename: ctx.original_filename.clone(),
                chunk_size: self.chunk_size,
                embedding_model: model,
            },
            storage_format: self.format.name().to_string(),
        };

        let store = Arc::clone(&self.store);
        let format = self.format;
        let path = tokio::task::spawn_blocking(move || store.save(&set, format))
            .await
            .map_err(|e| Error::PersistFailed(format!("persist task panicked: {}", e)))??;

        ctx.attributes.insert(
            "vector_file".to_string(),
            path.to_string_lossy().to_string(),
        );

        Ok(format!("persisted to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::UserPaths;
    use crate::types::EmbeddedChunk;

    fn ctx_with_embeddings(dir: &std::path::Path, count: usize) -> PipelineContext {
        let paths = UserPaths::new(dir, "tester@example.com");
        paths.ensure().unwrap();
        let mut ctx = PipelineContext::new(
            "doc-1".to_string(),
            "tester@example.com".to_string(),
            "doc.txt".to_string(),
            "text/plain".to_string(),
            paths.raw_uploads.join("doc-1_doc.txt"),
            paths,
        );
        ctx.chunk_count = Some(count);
        ctx.embeddings_data = Some(
            (0..count)
                .map(|i| EmbeddedChunk {
                    filename: format!("doc_chunk_{:03}.txt", i),
                    text: format!("chunk {}", i),
                    token_count: 2,
                    embedding: vec![i as f32; 4],
                    embedding_model: "static-test-model".to_string(),
                })
                .collect(),
        );
        ctx
    }

    #[tokio::test]
    async fn test_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_with_embeddings(dir.path(), 3);
        let store = Arc::new(VectorStore::new(dir.path().to_path_buf()));

        let step = PersistStep::new(Arc::clone(&store), StorageFormat::Json, 512);
        step.execute(&mut ctx).await.unwrap();

        let set = store.load("tester@example.com", "doc-1").unwrap();
        assert_eq!(set.embedding_count, 3);
        assert_eq!(set.metadata.original_filename, "doc.txt");
        assert_eq!(set.dimension(), 4);
    }

    #[tokio::test]
    async fn test_count_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_with_embeddings(dir.path(), 3);
        ctx.chunk_count = Some(5);
        let store = Arc::new(VectorStore::new(dir.path().to_path_buf()));

        let err = PersistStep::new(store, StorageFormat::Json, 512)
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PersistFailed(_)));
    }
}
