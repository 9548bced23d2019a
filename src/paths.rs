//! Per-user directory layout
//!
//! Every user id maps to four directories under the base data directory:
//!
//! ```text
//! <base>/<user>/raw_uploads/        original bytes as uploaded
//! <base>/<user>/processed_text/     extracted UTF-8 text
//! <base>/<user>/raw_chunks/         one text file per chunk
//! <base>/<user>/processed_vectors/  persisted embedding sets
//! ```

use std::path::{Path, PathBuf};

/// Resolved directory locations for one user. Pure data; nothing is touched
/// on disk until `ensure` is called.
#[derive(Debug, Clone)]
pub struct UserPaths {
    pub root: PathBuf,
    pub raw_uploads: PathBuf,
    pub processed_text: PathBuf,
    pub raw_chunks: PathBuf,
    pub processed_vectors: PathBuf,
}

impl UserPaths {
    pub fn new(base: &Path, user_id: &str) -> Self {
        let root = base.join(user_id);
        Self {
            raw_uploads: root.join("raw_uploads"),
            processed_text: root.join("processed_text"),
            raw_chunks: root.join("raw_chunks"),
            processed_vectors: root.join("processed_vectors"),
            root,
        }
    }

    /// Create all four directories. Idempotent.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.raw_uploads)?;
        std::fs::create_dir_all(&self.processed_text)?;
        std::fs::create_dir_all(&self.raw_chunks)?;
        std::fs::create_dir_all(&self.processed_vectors)?;
        Ok(())
    }

    /// Whether the user has any on-disk presence at all.
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }
}
