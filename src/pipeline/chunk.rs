//! Chunk step
//!
//! Splits the converted text into token-bounded chunks with a fixed overlap
//! and writes each chunk's decoded text to `raw_chunks/`. Boundaries are
//! computed on the token sequence, so chunk sizes are exact in token space
//! regardless of language or formatting.

use super::{PipelineContext, Step};
use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use std::ops::Range;
use std::sync::Arc;

pub struct ChunkStep {
    tokenizer: Arc<Tokenizer>,
    chunk_size: usize,
    overlap_fraction: f32,
}

impl ChunkStep {
    pub fn new(tokenizer: Arc<Tokenizer>, chunk_size: usize, overlap_fraction: f32) -> Self {
        Self {
            tokenizer,
            chunk_size,
            overlap_fraction,
        }
    }

    fn overlap_tokens(&self) -> usize {
        (self.chunk_size as f32 * self.overlap_fraction).floor() as usize
    }
}

/// Token ranges for a sequence of `len` tokens: windows of `size` tokens,
/// each sharing its leading `overlap` tokens with the previous window's
/// tail. The final window may be shorter; ranges never extend past `len`.
pub fn chunk_ranges(len: usize, size: usize, overlap: usize) -> Vec<Range<usize>> {
    assert!(size > 0, "chunk size must be positive");
    assert!(overlap < size, "overlap must be smaller than chunk size");

    let mut ranges = Vec::new();
    if len == 0 {
        return ranges;
    }

    let mut start = 0usize;
    loop {
        let end = (start + size).min(len);
        ranges.push(start..end);
        if end >= len {
            break;
        }
        start = end - overlap;
    }
    ranges
}

/// Zero-padded chunk index, at least three digits wide.
fn chunk_label(index: usize, total: usize) -> String {
    let width = total.saturating_sub(1).to_string().len().max(3);
    format!("{:0width$}", index, width = width)
}

#[async_trait::async_trait]
impl Step for ChunkStep {
    fn name(&self) -> &'static str {
        "chunk"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<String> {
        let text_path = ctx
            .converted_text_path
            .clone()
            .ok_or_else(|| Error::ChunkingFailed("no converted text in context".to_string()))?;

        let text = tokio::fs::read_to_string(&text_path).await?;
        let tokens = self.tokenizer.encode(&text);
        if tokens.is_empty() {
            return Err(Error::ChunkingFailed(
                "document produced no tokens".to_string(),
            ));
        }

        let overlap = self.overlap_tokens();
        let ranges = chunk_ranges(tokens.len(), self.chunk_size, overlap);
        let base = ctx.basename();
        let total = ranges.len();

        let mut chunk_files = Vec::with_capacity(total);
        for (index, range) in ranges.iter().enumerate() {
            let chunk_text = self.tokenizer.decode(&tokens[range.clone()])?;
            let file = ctx.paths.raw_chunks.join(format!(
                "{}_chunk_{}.txt",
                base,
                chunk_label(index, total)
            ));
            tokio::fs::write(&file, &chunk_text).await?;
            chunk_files.push(file);
        }

        ctx.chunks_dir = Some(ctx.paths.raw_chunks.clone());
        ctx.chunk_count = Some(total);
        ctx.chunk_files = chunk_files;
        ctx.attributes
            .insert("chunk_count".to_string(), total.to_string());

        Ok(format!(
            "wrote {} chunk(s) of {} tokens with overlap {}",
            total, self.chunk_size, overlap
        ))
    }
}
