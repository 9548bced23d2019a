//! Ingest task queue
//!
//! The upload gate pushes one task per accepted document; background
//! workers drain the channel and run the pipeline. The channel is
//! unbounded: the gate must never block a request on worker backpressure.

use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::error;

/// Everything a worker needs to process one uploaded document.
#[derive(Debug, Clone)]
pub struct IngestTask {
    pub document_id: String,
    pub user_id: String,
    pub original_filename: String,
    pub mime_type: String,
    pub input_path: PathBuf,
    pub description: Option<String>,
}

pub type IngestReceiver = mpsc::UnboundedReceiver<IngestTask>;

/// Cloneable sending half handed to the upload gate.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    tx: mpsc::UnboundedSender<IngestTask>,
}

impl IngestQueue {
    pub fn enqueue(&self, task: IngestTask) {
        if let Err(e) = self.tx.send(task) {
            // Workers are gone; the raw file stays on disk for reprocessing.
            error!(document_id = %e.0.document_id, "ingest queue closed, task dropped");
        }
    }
}

pub fn ingest_queue() -> (IngestQueue, IngestReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IngestQueue { tx }, rx)
}
