//! Multi-step processing pipeline
//!
//! A pipeline is an ordered list of steps sharing one mutable context. Steps
//! run strictly sequentially; each may declare a skip predicate and a retry
//! budget. The first step failure terminates the run, leaving later steps
//! reported as pending. Cancellation is observed between steps and between
//! retry attempts, and a soft wall-clock timeout bounds the whole run.
//!
//! Architecture:
//! - Pipeline: the engine, owns the ordered step list
//! - Step: capability set {name, retries, skip, execute, should_retry}
//! - PipelineContext: per-run record handed from step to step
//! - ExecutionReport: per-step results plus overall outcome

pub mod chunk;
pub mod convert;
pub mod embed;
pub mod persist;

pub use chunk::ChunkStep;
pub use convert::ConvertStep;
pub use embed::EmbedStep;
pub use persist::PersistStep;

use crate::config::Config;
use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use crate::extract::ExtractorRegistry;
use crate::paths::UserPaths;
use crate::store::VectorStore;
use crate::tokenizer::Tokenizer;
use crate::types::EmbeddedChunk;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Overall outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
    TimedOut,
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Skipped,
    Failed,
}

/// Recorded result for one step, all attempts included.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub message: String,
    pub error: Option<String>,
    /// Wall clock across every attempt and inter-attempt sleep.
    pub duration_ms: u64,
}

impl StepResult {
    fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            message: String::new(),
            error: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Full record of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub pipeline: String,
    pub status: PipelineStatus,
    pub started_at: String,
    pub finished_at: String,
    pub steps: Vec<StepReport>,
    pub completed_steps: usize,
    pub failed_steps: usize,
}

/// Mutable per-run record shared across steps.
///
/// Known hand-off keys are typed fields; anything else steps want to record
/// goes through the free-form attribute map. Steps only ever add or
/// overwrite entries; recorded step results belong to the engine.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub document_id: String,
    pub user_id: String,
    pub original_filename: String,
    pub mime_type: String,
    pub input_path: PathBuf,
    pub paths: UserPaths,
    pub converted_text_path: Option<PathBuf>,
    pub chunks_dir: Option<PathBuf>,
    pub chunk_count: Option<usize>,
    pub chunk_files: Vec<PathBuf>,
    pub embeddings_data: Option<Vec<EmbeddedChunk>>,
    pub attributes: HashMap<String, String>,
}

impl PipelineContext {
    pub fn new(
        document_id: String,
        user_id: String,
        original_filename: String,
        mime_type: String,
        input_path: PathBuf,
        paths: UserPaths,
    ) -> Self {
        Self {
            document_id,
            user_id,
            original_filename,
            mime_type,
            input_path,
            paths,
            converted_text_path: None,
            chunks_dir: None,
            chunk_count: None,
            chunk_files: Vec::new(),
            embeddings_data: None,
            attributes: HashMap::new(),
        }
    }

    /// Original filename without its extension; the base name for all
    /// intermediate files.
    pub fn basename(&self) -> String {
        std::path::Path::new(&self.original_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.original_filename.clone())
    }
}

/// One unit of pipeline work.
#[async_trait::async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    /// Additional attempts after the first failure.
    fn max_retries(&self) -> u32 {
        0
    }

    /// Some(reason) skips the step without executing it.
    fn skip_reason(&self, _ctx: &PipelineContext) -> Option<String> {
        None
    }

    /// Whether a failed attempt should be retried.
    fn should_retry(&self, attempt: u32, _error: &Error) -> bool {
        attempt < self.max_retries()
    }

    /// Run the step. The returned string becomes the step's result message.
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<String>;
}

fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Ordered-step executor.
pub struct Pipeline {
    name: String,
    steps: Vec<Box<dyn Step>>,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn Step>>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            steps,
            timeout,
        }
    }

    /// Run every step in order against the context.
    ///
    /// Never returns an error: every outcome, including cancellation and
    /// timeout, is expressed in the report.
    pub async fn execute(
        &self,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        let started_at = now_iso();
        let deadline = tokio::time::Instant::now() + self.timeout;

        let mut results: Vec<StepResult> = self.steps.iter().map(|_| StepResult::pending()).collect();
        let mut status = PipelineStatus::Running;

        for (idx, step) in self.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                status = PipelineStatus::Cancelled;
                break;
            }

            if let Some(reason) = step.skip_reason(ctx) {
                info!(pipeline = %self.name, step = step.name(), reason = %reason, "step skipped");
                results[idx] = StepResult {
                    status: StepStatus::Skipped,
                    message: reason,
                    error: None,
                    duration_ms: 0,
                };
                continue;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                status = PipelineStatus::TimedOut;
                break;
            }

            results[idx].status = StepStatus::Running;
            let (result, outcome) = self
                .run_step_with_retries(step.as_ref(), ctx, cancel, remaining)
                .await;
            results[idx] = result;

            match outcome {
                StepOutcome::Success => {}
                StepOutcome::Failed => {
                    status = PipelineStatus::Failed;
                    break;
                }
                StepOutcome::Cancelled => {
                    status = PipelineStatus::Cancelled;
                    break;
                }
                StepOutcome::TimedOut => {
                    status = PipelineStatus::TimedOut;
                    break;
                }
            }
        }

        if status == PipelineStatus::Running {
            status = PipelineStatus::Success;
        }

        let completed_steps = results
            .iter()
            .filter(|r| matches!(r.status, StepStatus::Success | StepStatus::Skipped))
            .count();
        let failed_steps = results
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
            .count();

        ExecutionReport {
            pipeline: self.name.clone(),
            status,
            started_at,
            finished_at: now_iso(),
            steps: self
                .steps
                .iter()
                .zip(results)
                .map(|(step, result)| StepReport {
                    name: step.name().to_string(),
                    result,
                })
                .collect(),
            completed_steps,
            failed_steps,
        }
    }

    async fn run_step_with_retries(
        &self,
        step: &dyn Step,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
        budget: Duration,
    ) -> (StepResult, StepOutcome) {
        let started = std::time::Instant::now();
        let deadline = tokio::time::Instant::now() + budget;
        let mut attempt: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let attempt_result = tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                outcome = tokio::time::timeout(remaining, step.execute(ctx)) => {
                    outcome.unwrap_or(Err(Error::TimedOut))
                }
            };

            match attempt_result {
                Ok(message) => {
                    info!(pipeline = %self.name, step = step.name(), attempt, "step succeeded");
                    return (
                        StepResult {
                            status: StepStatus::Success,
                            message,
                            error: None,
                            duration_ms: started.elapsed().as_millis() as u64,
                        },
                        StepOutcome::Success,
                    );
                }
                Err(Error::Cancelled) => {
                    return (
                        StepResult {
                            status: StepStatus::Failed,
                            message: "cancelled".to_string(),
                            error: Some(Error::Cancelled.to_string()),
                            duration_ms: started.elapsed().as_millis() as u64,
                        },
                        StepOutcome::Cancelled,
                    );
                }
                Err(Error::TimedOut) => {
                    return (
                        StepResult {
                            status: StepStatus::Failed,
                            message: "timed out".to_string(),
                            error: Some(Error::TimedOut.to_string()),
                            duration_ms: started.elapsed().as_millis() as u64,
                        },
                        StepOutcome::TimedOut,
                    );
                }
                Err(err) => {
                    if step.should_retry(attempt, &err) && !cancel.is_cancelled() {
                        let backoff = Duration::from_secs(1u64 << attempt.min(16));
                        warn!(
                            pipeline = %self.name,
                            step = step.name(),
                            attempt,
                            backoff_secs = backoff.as_secs(),
                            error = %err,
                            "step failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }

                    warn!(pipeline = %self.name, step = step.name(), attempt, error = %err, "step failed");
                    return (
                        StepResult {
                            status: StepStatus::Failed,
                            message: format!("failed after {} attempt(s)", attempt + 1),
                            error: Some(err.to_string()),
                            duration_ms: started.elapsed().as_millis() as u64,
                        },
                        StepOutcome::Failed,
                    );
                }
            }
        }
    }
}

enum StepOutcome {
    Success,
    Failed,
    Cancelled,
    TimedOut,
}

/// Build the standard four-step ingest pipeline: Convert, Chunk, Embed,
/// Persist, all wired from the process configuration.
pub fn ingest_pipeline(
    config: &Config,
    registry: Arc<ExtractorRegistry>,
    tokenizer: Arc<Tokenizer>,
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<VectorStore>,
) -> Pipeline {
    Pipeline::new(
        "ingest",
        vec![
            Box::new(ConvertStep::new(registry)),
            Box::new(ChunkStep::new(
                Arc::clone(&tokenizer),
                config.chunk_size,
                config.overlap_fraction,
            )),
            Box::new(EmbedStep::new(embedder, tokenizer, config.embedding_batch_size)),
            Box::new(PersistStep::new(store, config.storage_format, config.chunk_size)),
        ],
        config.pipeline_timeout,
    )
}
