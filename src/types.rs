//! Core data model and API types

use serde::{Deserialize, Serialize};

/// One chunk of a document with its embedding, as produced by the pipeline
/// and stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// Chunk file name, e.g. `report_chunk_002.txt`. Lexicographic order of
    /// these names is emission order.
    pub filename: String,
    pub text: String,
    pub token_count: u32,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
}

/// Document-level metadata carried inside a persisted set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMetadata {
    pub user_id: String,
    pub original_filename: String,
    pub chunk_size: usize,
    pub embedding_model: String,
}

/// The complete embedded-chunk payload for one document, in the shape both
/// on-disk formats round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEmbeddingSet {
    pub file_id: String,
    pub embeddings: Vec<EmbeddedChunk>,
    pub metadata: SetMetadata,
    pub storage_format: String,
    pub embedding_count: usize,
}

impl PersistedEmbeddingSet {
    /// Vector dimension, taken from the first chunk. Zero for empty sets.
    pub fn dimension(&self) -> usize {
        self.embeddings.first().map(|c| c.embedding.len()).unwrap_or(0)
    }
}

/// Returned by the upload gate once the raw bytes are safely on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Background processing has been enqueued; its outcome is not reported
    /// on this request.
    pub queued: bool,
}

/// Search request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_algorithm() -> String {
    "cosine".to_string()
}

fn default_limit() -> usize {
    10
}

/// A single ranked hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub score: f32,
    pub text: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub source_filename: String,
}

/// Search response with execution metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub algorithm: String,
    pub results: Vec<SearchResult>,
    pub documents_searched: usize,
    pub chunks_searched: usize,
    pub took_ms: u64,
    /// Set when the library held vectors from several models and scoring was
    /// restricted to the dominant one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_restricted: Option<String>,
}

/// Per-user library statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub user_id: String,
    pub exists: bool,
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedded_chunk_count: usize,
    pub raw_upload_bytes: u64,
}
