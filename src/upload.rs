//! Upload gate
//!
//! The only entry point for new documents. Streams the request body to
//! `raw_uploads/` under a byte cap, validates the user id and the detected
//! file type, and enqueues background processing. The document id is not
//! revealed until the bytes are fully written and validated, and no failure
//! path leaves a partial file behind.

use crate::error::{Error, Result};
use crate::extract::{mime_for_extension, ExtractorRegistry};
use crate::paths::UserPaths;
use crate::queue::{IngestQueue, IngestTask};
use crate::types::UploadReceipt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::info;

const READ_BUFFER: usize = 8 * 1024;
/// Leading bytes kept in memory for magic-byte type detection.
const SNIFF_BYTES: usize = 8 * 1024;

pub struct UploadGate {
    base_dir: PathBuf,
    max_file_size: u64,
    registry: Arc<ExtractorRegistry>,
    queue: IngestQueue,
}

/// Syntactic user-id check: an email-like shape, `local@domain` with a
/// dotted domain. This is namespacing, not authentication.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    let valid = match user_id.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && user_id
                    .chars()
                    .all(|c| !c.is_whitespace() && c != '/' && c != '\\')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidUser(user_id.to_string()))
    }
}

/// Strip any path components and filesystem-hostile characters from a
/// client-supplied filename.
fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name
    }
}

impl UploadGate {
    pub fn new(
        base_dir: PathBuf,
        max_file_size: u64,
        registry: Arc<ExtractorRegistry>,
        queue: IngestQueue,
    ) -> Self {
        Self {
            base_dir,
            max_file_size,
            registry,
            queue,
        }
    }

    /// Accept one upload. Returns only after the raw bytes are safely on
    /// disk; pipeline processing happens in the background and its outcome
    /// is not part of this reply.
    pub async fn receive<R: AsyncRead + Unpin>(
        &self,
        user_id: &str,
        claimed_filename: &str,
        description: Option<String>,
        reader: R,
    ) -> Result<UploadReceipt> {
        validate_user_id(user_id)?;

        let paths = UserPaths::new(&self.base_dir, user_id);
        paths.ensure()?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let filename = sanitize_filename(claimed_filename);
        let raw_path = paths
            .raw_uploads
            .join(format!("{}_{}", document_id, filename));

        let (size_bytes, head) = match self.stream_to_disk(&raw_path, reader).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&raw_path).await;
                return Err(e);
            }
        };

        let mime_type = match self.detect_mime(&head, &filename) {
            Ok(mime) => mime,
            Err(e) => {
                let _ = tokio::fs::remove_file(&raw_path).await;
                return Err(e);
            }
        };

        info!(
            document_id = %document_id,
            user_id,
            filename = %filename,
            size_bytes,
            mime_type = %mime_type,
            "upload accepted"
        );

        self.queue.enqueue(IngestTask {
            document_id: document_id.clone(),
            user_id: user_id.to_string(),
            original_filename: filename.clone(),
            mime_type: mime_type.clone(),
            input_path: raw_path,
            description,
        });

        Ok(UploadReceipt {
            document_id,
            filename,
            mime_type,
            size_bytes,
            queued: true,
        })
    }

    /// Stream the body to `path` in fixed-size reads, enforcing the byte
    /// cap as bytes arrive. Returns the total size and the leading bytes
    /// for type sniffing.
    async fn stream_to_disk<R: AsyncRead + Unpin>(
        &self,
        path: &Path,
        mut reader: R,
    ) -> Result<(u64, Vec<u8>)> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut buffer = [0u8; READ_BUFFER];
        let mut total: u64 = 0;
        let mut head: Vec<u8> = Vec::with_capacity(SNIFF_BYTES);

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            total += read as u64;
            if total > self.max_file_size {
                return Err(Error::TooLarge {
                    limit: self.max_file_size,
                });
            }
            if head.len() < SNIFF_BYTES {
                let want = (SNIFF_BYTES - head.len()).min(read);
                head.extend_from_slice(&buffer[..want]);
            }
            file.write_all(&buffer[..read]).await?;
        }

        file.flush().await?;
        Ok((total, head))
    }

    /// Magic bytes first, extension fallback second; the result must be on
    /// the extractor allow-list.
    fn detect_mime(&self, head: &[u8], filename: &str) -> Result<String> {
        let sniffed = infer::get(head).map(|t| t.mime_type());
        let mime = sniffed
            .filter(|m| self.registry.supports(m))
            .or_else(|| mime_for_extension(filename))
            .ok_or_else(|| Error::UnsupportedType(format!("undetectable type: {}", filename)))?;

        if !self.registry.supports(mime) {
            return Err(Error::UnsupportedType(mime.to_string()));
        }
        Ok(mime.to_string())
    }
}
