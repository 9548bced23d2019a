//! HTTP server module

mod routes;
mod state;
mod worker;

pub use state::AppState;
use routes::create_router;
use worker::spawn_workers;

use anyhow::Result;
use quiver::{
    ingest_queue, Config, EmbeddingService, ExtractorRegistry, RemoteEmbedder, SearchEngine,
    Tokenizer, UploadGate, VectorStore,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the HTTP server
pub async fn run_server(config: Config, port: u16) -> Result<()> {
    // Shared components
    let registry = Arc::new(ExtractorRegistry::new());
    let tokenizer = Arc::new(Tokenizer::by_name(&config.tokenizer_name)?);
    let embedder: Arc<dyn EmbeddingService> = Arc::new(RemoteEmbedder::new(&config)?);
    let store = Arc::new(VectorStore::new(config.base_dir.clone()));

    let (queue, receiver) = ingest_queue();
    let cancel = CancellationToken::new();
    spawn_workers(
        &config,
        receiver,
        Arc::clone(&registry),
        Arc::clone(&tokenizer),
        Arc::clone(&embedder),
        Arc::clone(&store),
        cancel.clone(),
    );

    let state = Arc::new(AppState {
        gate: UploadGate::new(
            config.base_dir.clone(),
            config.max_file_size,
            registry,
            queue,
        ),
        search: SearchEngine::new(Arc::clone(&store), embedder),
        store,
        config,
    });

    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            eprintln!("\nError: port {} is already in use.\n", port);
            eprintln!("Try a different port with:");
            eprintln!("  quiver serve --port <PORT>\n");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Server running on http://localhost:{}", port);
    println!("\nAPI Endpoints:");
    println!("  GET    /health                       - Health check");
    println!("  POST   /api/ingest                   - Upload a document (multipart)");
    println!("  POST   /api/search                   - Search a user's library");
    println!("  GET    /api/library/:user_id/stats   - Library statistics");
    println!("  GET    /api/algorithms               - Supported search algorithms");
    println!("\nBackground ingest workers started.");

    axum::serve(listener, app).await?;
    cancel.cancel();
    Ok(())
}
