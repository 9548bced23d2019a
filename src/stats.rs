//! Library statistics
//!
//! Counts are derived straight from the on-disk layout: documents from
//! `raw_uploads/`, chunks from `raw_chunks/`, embedded chunks from the
//! persisted sets. Nothing is cached; the filesystem is the source of truth.

use crate::error::Result;
use crate::paths::UserPaths;
use crate::store::VectorStore;
use crate::types::LibraryStats;
use std::path::Path;

fn count_files(dir: &Path) -> (usize, u64) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return (0, 0);
    };
    let mut count = 0usize;
    let mut bytes = 0u64;
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_file() {
            count += 1;
            bytes += meta.len();
        }
    }
    (count, bytes)
}

pub fn library_stats(
    base_dir: &Path,
    store: &VectorStore,
    user_id: &str,
) -> Result<LibraryStats> {
    let paths = UserPaths::new(base_dir, user_id);
    if !paths.exists() {
        return Ok(LibraryStats {
            user_id: user_id.to_string(),
            exists: false,
            document_count: 0,
            chunk_count: 0,
            embedded_chunk_count: 0,
            raw_upload_bytes: 0,
        });
    }

    let (document_count, raw_upload_bytes) = count_files(&paths.raw_uploads);
    let (chunk_count, _) = count_files(&paths.raw_chunks);
    let embedded_chunk_count = store
        .load_user_library(user_id)?
        .iter()
        .map(|set| set.embedding_count)
        .sum();

    Ok(LibraryStats {
        user_id: user_id.to_string(),
        exists: true,
        document_count,
        chunk_count,
        embedded_chunk_count,
        raw_upload_bytes,
    })
}
