//! Process configuration
//!
//! All tunables are read from the environment exactly once, in `from_env`,
//! and carried as an immutable struct from then on. Core components never
//! touch the environment themselves.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// On-disk format for persisted embedding sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFormat {
    /// Human-readable row-oriented JSON, one record per chunk.
    #[default]
    Json,
    /// Compressed columnar binary container.
    Hdf5,
}

impl StorageFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Hdf5 => "hdf5",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Hdf5 => "h5",
        }
    }
}

impl std::str::FromStr for StorageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "hdf5" | "h5" => Ok(Self::Hdf5),
            other => Err(format!("unknown storage format: {}", other)),
        }
    }
}

/// Immutable configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the embedding provider. Absent only for commands that
    /// never embed (e.g. `stats`); the provider fails fast without it.
    pub embedding_api_key: Option<String>,
    /// Embedding provider endpoint (OpenAI-style `/embeddings`).
    pub embedding_api_url: String,
    /// Model identifier sent with every embed call and recorded per vector.
    pub embedding_model: String,
    /// Declared vector dimension; responses are validated against it.
    pub embedding_dimensions: usize,
    /// Maximum texts per provider request.
    pub embedding_batch_size: usize,
    /// Root of the per-user directory tree.
    pub base_dir: PathBuf,
    /// Upload byte cap.
    pub max_file_size: u64,
    /// Format new embedding sets are written in.
    pub storage_format: StorageFormat,
    /// Subscriber filter directive, e.g. `info` or `quiver=debug`.
    pub log_level: String,
    /// Tokens per chunk.
    pub chunk_size: usize,
    /// Fraction of a chunk shared with its predecessor.
    pub overlap_fraction: f32,
    /// Named byte-pair encoder used for chunk boundaries and token counts.
    pub tokenizer_name: String,
    /// Background pipeline workers.
    pub pipeline_workers: usize,
    /// Soft wall-clock limit for one pipeline run.
    pub pipeline_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_api_key: None,
            embedding_api_url: "https://api.mistral.ai/v1/embeddings".to_string(),
            embedding_model: "mistral-embed".to_string(),
            embedding_dimensions: 1024,
            embedding_batch_size: 96,
            base_dir: PathBuf::from("./data"),
            max_file_size: 52_428_800,
            storage_format: StorageFormat::Json,
            log_level: "info".to_string(),
            chunk_size: 512,
            overlap_fraction: 0.10,
            tokenizer_name: "cl100k_base".to_string(),
            pipeline_workers: default_workers(),
            pipeline_timeout: Duration::from_secs(300),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => {
            let value = raw
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// `EMBEDDING_API_KEY` is the only variable without a default; it is
    /// still read leniently here so that commands that never embed can run
    /// without it.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        config.embedding_api_key = std::env::var("EMBEDDING_API_KEY").ok();
        if let Some(url) = env_parse::<String>("EMBEDDING_API_URL")? {
            config.embedding_api_url = url;
        }
        if let Some(model) = env_parse::<String>("EMBEDDING_MODEL")? {
            config.embedding_model = model;
        }
        if let Some(dims) = env_parse::<usize>("EMBEDDING_DIMENSIONS")? {
            config.embedding_dimensions = dims;
        }
        if let Some(batch) = env_parse::<usize>("EMBEDDING_BATCH_SIZE")? {
            anyhow::ensure!(batch > 0, "EMBEDDING_BATCH_SIZE must be positive");
            config.embedding_batch_size = batch;
        }
        if let Some(dir) = env_parse::<PathBuf>("BASE_DIR")? {
            config.base_dir = dir;
        }
        if let Some(max) = env_parse::<u64>("MAX_FILE_SIZE")? {
            config.max_file_size = max;
        }
        if let Ok(format) = std::env::var("VECTOR_STORAGE_TYPE") {
            config.storage_format = format
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("invalid VECTOR_STORAGE_TYPE")?;
        }
        if let Some(level) = env_parse::<String>("LOG_LEVEL")? {
            config.log_level = level.to_lowercase();
        }
        if let Some(size) = env_parse::<usize>("CHUNK_SIZE")? {
            anyhow::ensure!(size > 0, "CHUNK_SIZE must be positive");
            config.chunk_size = size;
        }
        if let Some(overlap) = env_parse::<f32>("CHUNK_OVERLAP_PERCENT")? {
            config.overlap_fraction = normalize_overlap(overlap)?;
        }
        if let Some(name) = env_parse::<String>("TOKENIZER_NAME")? {
            config.tokenizer_name = name;
        }
        if let Some(workers) = env_parse::<usize>("PIPELINE_WORKERS")? {
            anyhow::ensure!(workers > 0, "PIPELINE_WORKERS must be positive");
            config.pipeline_workers = workers;
        }
        if let Some(secs) = env_parse::<u64>("PIPELINE_TIMEOUT_SECS")? {
            config.pipeline_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Overlap length in tokens for the configured chunk size.
    pub fn overlap_tokens(&self) -> usize {
        (self.chunk_size as f32 * self.overlap_fraction).floor() as usize
    }
}

/// Accept the overlap either as a fraction (`0.1`) or a percentage (`10`).
fn normalize_overlap(raw: f32) -> Result<f32> {
    let fraction = if raw >= 1.0 { raw / 100.0 } else { raw };
    anyhow::ensure!(
        (0.0..1.0).contains(&fraction),
        "CHUNK_OVERLAP_PERCENT must resolve to a fraction in [0, 1), got {}",
        raw
    );
    Ok(fraction)
}
