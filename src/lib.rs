//! Quiver - per-user document library with semantic and hybrid search
//!
//! Documents stream in through the upload gate, a background pipeline turns
//! them into embedded chunks (Convert -> Chunk -> Embed -> Persist), and the
//! search engine ranks chunks against natural-language queries with cosine
//! or hybrid (vector + BM25) scoring.
//!
//! Storage is a plain per-user directory tree:
//! - raw_uploads: original bytes
//! - processed_text: extracted UTF-8 text
//! - raw_chunks: one file per chunk
//! - processed_vectors: embedding sets in JSON or columnar form

pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod paths;
pub mod pipeline;
pub mod queue;
pub mod search;
pub mod stats;
pub mod store;
pub mod tokenizer;
pub mod types;
pub mod upload;

pub use config::{Config, StorageFormat};
pub use embedding::{EmbeddingService, RemoteEmbedder};
pub use error::{Error, Result};
pub use extract::ExtractorRegistry;
pub use paths::UserPaths;
pub use pipeline::{
    ingest_pipeline, ExecutionReport, Pipeline, PipelineContext, PipelineStatus, Step, StepStatus,
};
pub use queue::{ingest_queue, IngestQueue, IngestReceiver, IngestTask};
pub use search::{Algorithm, SearchEngine};
pub use stats::library_stats;
pub use store::VectorStore;
pub use tokenizer::Tokenizer;
pub use types::*;
pub use upload::UploadGate;
