//! Embedding provider abstraction
//!
//! The pipeline and the search engine only see this trait; the concrete
//! provider is wired at startup. A correct implementation preserves
//! request-to-response order and returns one vector per input text.

pub mod remote;

pub use remote::RemoteEmbedder;

use crate::error::Result;

#[async_trait::async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Model identifier recorded next to every vector this service produces.
    fn model_id(&self) -> &str;

    /// Declared vector dimension; responses not matching it are invalid.
    fn dimensions(&self) -> usize;

    /// Embed an ordered batch of texts with the given model. The result has
    /// exactly one vector per input, in input order.
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;
}
