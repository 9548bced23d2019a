//! Integration tests for Quiver
//!
//! End-to-end flows through the public crate API: upload gate -> ingest
//! pipeline -> persisted vectors -> search. The embedding provider is
//! replaced by a deterministic bag-of-words embedder so similarity is
//! meaningful without a network.

use quiver::{
    ingest_pipeline, ingest_queue, Config, EmbeddingService, Error, ExtractorRegistry,
    IngestReceiver, IngestTask, PipelineContext, PipelineStatus, SearchEngine, StorageFormat,
    StepStatus, Tokenizer, UploadGate, UserPaths, VectorStore,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DIMS: usize = 256;

/// Deterministic embedder: hashed bag of words, L2-normalized. Texts that
/// share words get high cosine similarity.
struct BagOfWordsEmbedder;

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMS];
    for word in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() as usize) % DIMS] += 1.0;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[async_trait::async_trait]
impl EmbeddingService for BagOfWordsEmbedder {
    fn model_id(&self) -> &str {
        "bag-of-words-test"
    }
    fn dimensions(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String], _model: &str) -> quiver::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Fails its first `failures` calls with a retriable provider error, then
/// behaves like the bag-of-words embedder.
struct FlakyEmbedder {
    failures: u32,
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl EmbeddingService for FlakyEmbedder {
    fn model_id(&self) -> &str {
        "bag-of-words-test"
    }
    fn dimensions(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String], _model: &str) -> quiver::Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(Error::ProviderUnavailable("503 service unavailable".into()));
        }
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

fn test_config(base_dir: &Path, format: StorageFormat) -> Config {
    Config {
        base_dir: base_dir.to_path_buf(),
        storage_format: format,
        max_file_size: 1024 * 1024,
        ..Config::default()
    }
}

fn gate_for(config: &Config) -> (UploadGate, IngestReceiver) {
    let (queue, rx) = ingest_queue();
    (
        UploadGate::new(
            config.base_dir.clone(),
            config.max_file_size,
            Arc::new(ExtractorRegistry::new()),
            queue,
        ),
        rx,
    )
}

/// Run the full ingest pipeline for one queued task, as the background
/// worker would.
async fn run_pipeline(
    config: &Config,
    embedder: Arc<dyn EmbeddingService>,
    task: IngestTask,
) -> (quiver::ExecutionReport, PipelineContext) {
    let pipeline = ingest_pipeline(
        config,
        Arc::new(ExtractorRegistry::new()),
        Arc::new(Tokenizer::by_name(&config.tokenizer_name).expect("tokenizer")),
        embedder,
        Arc::new(VectorStore::new(config.base_dir.clone())),
    );

    let paths = UserPaths::new(&config.base_dir, &task.user_id);
    let mut ctx = PipelineContext::new(
        task.document_id,
        task.user_id,
        task.original_filename,
        task.mime_type,
        task.input_path,
        paths,
    );
    let report = pipeline.execute(&mut ctx, &CancellationToken::new()).await;
    (report, ctx)
}

async fn ingest_text_file(
    config: &Config,
    gate: &UploadGate,
    rx: &mut IngestReceiver,
    user: &str,
    filename: &str,
    content: &str,
) -> String {
    let receipt = gate
        .receive(user, filename, None, content.as_bytes())
        .await
        .expect("upload should be accepted");
    let task = rx.recv().await.expect("task should be queued");
    assert_eq!(task.document_id, receipt.document_id);

    let (report, _ctx) = run_pipeline(config, Arc::new(BagOfWordsEmbedder), task).await;
    assert_eq!(report.status, PipelineStatus::Success, "report: {:?}", report);
    receipt.document_id
}

fn search_engine(config: &Config) -> SearchEngine {
    SearchEngine::new(
        Arc::new(VectorStore::new(config.base_dir.clone())),
        Arc::new(BagOfWordsEmbedder),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_empty_library_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let engine = search_engine(&config);

    let err = engine
        .search("u1@x.io", "love", "cosine", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyLibrary(_)));
}

#[tokio::test]
async fn test_tiny_document_single_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    let doc_id =
        ingest_text_file(&config, &gate, &mut rx, "u2@x.io", "hi.txt", "hello world").await;

    // Exactly one chunk file with the full content.
    let chunks_dir = UserPaths::new(&config.base_dir, "u2@x.io").raw_chunks;
    let chunk_file = chunks_dir.join("hi_chunk_000.txt");
    assert_eq!(std::fs::read_to_string(&chunk_file).unwrap(), "hello world");
    assert_eq!(std::fs::read_dir(&chunks_dir).unwrap().count(), 1);

    // One persisted set with one vector of the configured dimension.
    let store = VectorStore::new(config.base_dir.clone());
    let set = store.load("u2@x.io", &doc_id).unwrap();
    assert_eq!(set.embedding_count, 1);
    assert_eq!(set.dimension(), DIMS);
    assert_eq!(set.metadata.original_filename, "hi.txt");
    assert_eq!(set.embeddings[0].text, "hello world");
}

#[tokio::test]
async fn test_search_ranks_single_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    ingest_text_file(&config, &gate, &mut rx, "u2@x.io", "hi.txt", "hello world").await;

    let response = search_engine(&config)
        .search("u2@x.io", "hello", "cosine", 3)
        .await
        .unwrap();

    assert_eq!(response.results.len(), 1);
    let result = &response.results[0];
    assert_eq!(result.rank, 1);
    assert_eq!(result.source_filename, "hi.txt");
    assert_eq!(result.chunk_index, 0);
    assert!(
        (0.5..=1.0).contains(&result.score),
        "score {} out of expected range",
        result.score
    );
    assert_eq!(response.documents_searched, 1);
    assert_eq!(response.chunks_searched, 1);
    assert!(response.model_restricted.is_none());
}

#[tokio::test]
async fn test_oversize_upload_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), StorageFormat::Json);
    config.max_file_size = 16 * 1024;
    let (gate, _rx) = gate_for(&config);

    let body = vec![b'x'; 64 * 1024];
    let err = gate
        .receive("u5@x.io", "big.txt", None, &body[..])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TooLarge { .. }));

    let uploads = UserPaths::new(&config.base_dir, "u5@x.io").raw_uploads;
    assert_eq!(std::fs::read_dir(&uploads).unwrap().count(), 0);
}

#[tokio::test]
async fn test_embed_retries_transient_failures_with_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    gate.receive("u6@x.io", "note.txt", None, &b"retry survives flaky providers"[..])
        .await
        .unwrap();
    let task = rx.recv().await.unwrap();

    let flaky = Arc::new(FlakyEmbedder {
        failures: 2,
        calls: AtomicU32::new(0),
    });
    let (report, _ctx) = run_pipeline(&config, flaky, task).await;

    assert_eq!(report.status, PipelineStatus::Success);
    let embed = report
        .steps
        .iter()
        .find(|s| s.name == "embed")
        .expect("embed step in report");
    assert_eq!(embed.result.status, StepStatus::Success);
    // Two failed attempts cost 1s + 2s of exponential backoff.
    assert!(
        embed.result.duration_ms >= 3000,
        "embed duration {}ms should include backoff sleeps",
        embed.result.duration_ms
    );
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_run_and_keep_raw_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    gate.receive("u7@x.io", "note.txt", None, &b"provider is down hard"[..])
        .await
        .unwrap();
    let task = rx.recv().await.unwrap();
    let raw_path = task.input_path.clone();

    let flaky = Arc::new(FlakyEmbedder {
        failures: 10,
        calls: AtomicU32::new(0),
    });
    let (report, _ctx) = run_pipeline(&config, flaky, task).await;

    assert_eq!(report.status, PipelineStatus::Failed);
    let statuses: Vec<StepStatus> = report.steps.iter().map(|s| s.result.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Success, // convert
            StepStatus::Success, // chunk
            StepStatus::Failed,  // embed
            StepStatus::Pending, // persist never ran
        ]
    );

    // The raw file survives for reprocessing; no vectors were persisted.
    assert!(raw_path.is_file());
    let store = VectorStore::new(config.base_dir.clone());
    assert!(store.load_user_library("u7@x.io").unwrap().is_empty());
}

#[tokio::test]
async fn test_columnar_storage_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Hdf5);
    let (gate, mut rx) = gate_for(&config);

    let doc_id = ingest_text_file(
        &config,
        &gate,
        &mut rx,
        "u8@x.io",
        "facts.txt",
        "the quick brown fox jumps over the lazy dog",
    )
    .await;

    let vectors_dir = UserPaths::new(&config.base_dir, "u8@x.io").processed_vectors;
    assert!(vectors_dir
        .join(format!("{}_embeddings.h5", doc_id))
        .is_file());

    let response = search_engine(&config)
        .search("u8@x.io", "quick fox", "cosine", 5)
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].text.contains("quick brown fox"));
}

#[tokio::test]
async fn test_multi_document_ranking_is_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    ingest_text_file(
        &config,
        &gate,
        &mut rx,
        "u9@x.io",
        "sailing.txt",
        "sailing ships cross the open ocean under full sail",
    )
    .await;
    ingest_text_file(
        &config,
        &gate,
        &mut rx,
        "u9@x.io",
        "baking.txt",
        "baking bread needs flour water salt and patient kneading",
    )
    .await;

    let response = search_engine(&config)
        .search("u9@x.io", "ocean sailing", "cosine", 10)
        .await
        .unwrap();

    assert_eq!(response.documents_searched, 2);
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].source_filename, "sailing.txt");
    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores must be non-increasing");
    }
    assert_eq!(response.results[0].rank, 1);
    assert_eq!(response.results[1].rank, 2);
}

#[tokio::test]
async fn test_hybrid_search_boosts_exact_terms() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    ingest_text_file(
        &config,
        &gate,
        &mut rx,
        "u10@x.io",
        "websocket.txt",
        "websocket connections provide full duplex communication channels",
    )
    .await;
    ingest_text_file(
        &config,
        &gate,
        &mut rx,
        "u10@x.io",
        "polling.txt",
        "repeated polling requests waste bandwidth and add latency",
    )
    .await;

    let response = search_engine(&config)
        .search("u10@x.io", "websocket channels", "hybrid", 10)
        .await
        .unwrap();

    assert_eq!(response.algorithm, "hybrid");
    assert_eq!(response.results[0].source_filename, "websocket.txt");
}

#[tokio::test]
async fn test_unknown_algorithm_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    ingest_text_file(&config, &gate, &mut rx, "u11@x.io", "a.txt", "some words here").await;

    let err = search_engine(&config)
        .search("u11@x.io", "words", "manhattan", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAlgorithm(_)));
}

#[tokio::test]
async fn test_equal_scores_break_ties_by_document_id_then_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    // Identical content in two documents produces identical scores.
    let content = "tides follow the moon across every shore";
    ingest_text_file(&config, &gate, &mut rx, "u13@x.io", "one.txt", content).await;
    ingest_text_file(&config, &gate, &mut rx, "u13@x.io", "two.txt", content).await;

    let response = search_engine(&config)
        .search("u13@x.io", "tides moon", "cosine", 10)
        .await
        .unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].score, response.results[1].score);
    assert!(
        response.results[0].document_id < response.results[1].document_id,
        "equal scores must order by document id ascending"
    );
}

#[tokio::test]
async fn test_csv_upload_flows_through_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), StorageFormat::Json);
    let (gate, mut rx) = gate_for(&config);

    let receipt = gate
        .receive(
            "u12@x.io",
            "crew.csv",
            None,
            &b"name,role\nmara,captain\njun,navigator\n"[..],
        )
        .await
        .unwrap();
    assert_eq!(receipt.mime_type, "text/csv");

    let task = rx.recv().await.unwrap();
    let (report, ctx) = run_pipeline(&config, Arc::new(BagOfWordsEmbedder), task).await;
    assert_eq!(report.status, PipelineStatus::Success);

    let text =
        std::fs::read_to_string(ctx.converted_text_path.expect("converted text path")).unwrap();
    assert!(text.contains("mara captain"));

    let response = search_engine(&config)
        .search("u12@x.io", "navigator", "cosine", 5)
        .await
        .unwrap();
    assert!(response.results[0].text.contains("jun navigator"));
}
