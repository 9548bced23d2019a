//! Error kinds shared across the crate
//!
//! Every failure surfaced by the upload gate, the pipeline steps, and the
//! search engine is one of these variants. The pipeline engine consults
//! `is_retriable` when deciding whether a failed step attempt is worth
//! repeating.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid user id: {0}")]
    InvalidUser(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file exceeds maximum size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed for {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("chunking failed: {0}")]
    ChunkingFailed(String),

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("embedding provider rejected credentials: {0}")]
    AuthError(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("failed to persist vectors: {0}")]
    PersistFailed(String),

    #[error("no documents found for user {0}")]
    EmptyLibrary(String),

    #[error("unknown search algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("failed to embed query: {0}")]
    EmbeddingFailed(String),

    #[error("pipeline timed out")]
    TimedOut,

    #[error("pipeline cancelled")]
    Cancelled,
}

impl Error {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only transient provider failures qualify; everything else is either
    /// deterministic (bad input, bad credentials) or already terminal.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_failures_are_retriable() {
        assert!(Error::ProviderUnavailable("503".into()).is_retriable());
        assert!(!Error::AuthError("401".into()).is_retriable());
        assert!(!Error::InvalidResponse("count mismatch".into()).is_retriable());
        assert!(!Error::TooLarge { limit: 1024 }.is_retriable());
        assert!(!Error::Cancelled.is_retriable());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::UnknownAlgorithm("euclid".into());
        assert!(err.to_string().contains("euclid"));

        let err = Error::TooLarge { limit: 52_428_800 };
        assert!(err.to_string().contains("52428800"));
    }
}
