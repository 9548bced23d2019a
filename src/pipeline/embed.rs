//! Embed step
//!
//! Reads the chunk files in lexicographic order (emission order), embeds
//! them in provider-sized batches, and stores the assembled records in the
//! context. Transient provider failures are retried by the engine; this
//! step only classifies which errors are worth retrying.

use super::{PipelineContext, Step};
use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use crate::types::EmbeddedChunk;
use std::path::PathBuf;
use std::sync::Arc;

pub struct EmbedStep {
    embedder: Arc<dyn EmbeddingService>,
    tokenizer: Arc<Tokenizer>,
    batch_size: usize,
}

impl EmbedStep {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        tokenizer: Arc<Tokenizer>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            tokenizer,
            batch_size,
        }
    }

    /// The document's chunk files in lexicographic (emission) order. The
    /// chunks directory is shared per user, so only files carrying this
    /// document's base name are taken.
    async fn chunk_files_in_order(dir: &PathBuf, base: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_chunk_", base);
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_file() && name.starts_with(&prefix) && name.ends_with(".txt") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait::async_trait]
impl Step for EmbedStep {
    fn name(&self) -> &'static str {
        "embed"
    }

    fn max_retries(&self) -> u32 {
        2
    }

    fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        attempt < self.max_retries() && error.is_retriable()
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<String> {
        let chunks_dir = ctx
            .chunks_dir
            .clone()
            .ok_or_else(|| Error::EmbeddingFailed("no chunks directory in context".to_string()))?;

        let files = Self::chunk_files_in_order(&chunks_dir, &ctx.basename()).await?;
        if files.is_empty() {
            return Err(Error::EmbeddingFailed(format!(
                "no chunk files under {}",
                chunks_dir.display()
            )));
        }

        let mut texts = Vec::with_capacity(files.len());
        for file in &files {
            texts.push(tokio::fs::read_to_string(file).await?);
        }

        let model = self.embedder.model_id().to_string();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self.embedder.embed(batch, &model).await?;
            vectors.extend(batch_vectors);
        }

        if vectors.len() != texts.len() {
            return Err(Error::InvalidResponse(format!(
                "got {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }

        let embeddings: Vec<EmbeddedChunk> = files
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((file, text), embedding)| EmbeddedChunk {
                filename: file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                token_count: self.tokenizer.count(&text) as u32,
                text,
                embedding,
                embedding_model: model.clone(),
            })
            .collect();

        let count = embeddings.len();
        ctx.embeddings_data = Some(embeddings);

        Ok(format!("embedded {} chunk(s) with {}", count, model))
    }
}
