//! Background ingest workers
//!
//! A fixed pool of tasks drains the ingest queue. Each task runs the full
//! Convert -> Chunk -> Embed -> Persist pipeline for one document; within a
//! run the steps are strictly sequential, but independent documents process
//! concurrently up to the pool size.

use quiver::{
    ingest_pipeline, Config, EmbeddingService, ExtractorRegistry, IngestReceiver, IngestTask,
    PipelineContext, PipelineStatus, Tokenizer, UserPaths, VectorStore,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Spawn `config.pipeline_workers` consumers for the queue. Returns once
/// all workers are launched; they run until the token is cancelled or the
/// queue closes.
#[allow(clippy::too_many_arguments)]
pub fn spawn_workers(
    config: &Config,
    receiver: IngestReceiver,
    registry: Arc<ExtractorRegistry>,
    tokenizer: Arc<Tokenizer>,
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<VectorStore>,
    cancel: CancellationToken,
) {
    let receiver = Arc::new(Mutex::new(receiver));

    for worker_id in 0..config.pipeline_workers {
        let receiver = Arc::clone(&receiver);
        let cancel = cancel.clone();
        let config = config.clone();
        let pipeline = ingest_pipeline(
            &config,
            Arc::clone(&registry),
            Arc::clone(&tokenizer),
            Arc::clone(&embedder),
            Arc::clone(&store),
        );

        tokio::spawn(async move {
            info!(worker_id, "ingest worker started");
            loop {
                let task = tokio::select! {
                    _ = cancel.cancelled() => break,
                    task = async { receiver.lock().await.recv().await } => task,
                };

                let Some(task) = task else {
                    // Queue closed; nothing more will arrive.
                    break;
                };

                process_task(&pipeline, &config, task, &cancel).await;
            }
            info!(worker_id, "ingest worker stopped");
        });
    }
}

async fn process_task(
    pipeline: &quiver::Pipeline,
    config: &Config,
    task: IngestTask,
    cancel: &CancellationToken,
) {
    let document_id = task.document_id.clone();
    let paths = UserPaths::new(&config.base_dir, &task.user_id);

    let mut ctx = PipelineContext::new(
        task.document_id,
        task.user_id,
        task.original_filename,
        task.mime_type,
        task.input_path,
        paths,
    );
    if let Some(description) = task.description {
        ctx.attributes.insert("description".to_string(), description);
    }

    let report = pipeline.execute(&mut ctx, cancel).await;

    match report.status {
        PipelineStatus::Success => {
            info!(
                document_id = %document_id,
                completed_steps = report.completed_steps,
                "document ingested"
            );
        }
        PipelineStatus::Cancelled => {
            warn!(document_id = %document_id, "ingest cancelled; raw file kept for reprocessing");
        }
        _ => {
            // Raw and intermediate files stay on disk for debugging and
            // future reprocessing.
            let detail = serde_json::to_string(&report).unwrap_or_else(|e| e.to_string());
            error!(
                document_id = %document_id,
                status = ?report.status,
                report = %detail,
                "document ingest failed"
            );
        }
    }
}
