//! Quiver CLI
//!
//! Commands:
//!   serve   - Start the HTTP server (upload, search, stats endpoints)
//!   search  - Query a user's library from the command line
//!   stats   - Show a user's library statistics

mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use quiver::{library_stats, Config, RemoteEmbedder, SearchEngine, VectorStore};

#[derive(Parser)]
#[command(name = "quiver")]
#[command(about = "Per-user document library with semantic and hybrid search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Search a user's library
    Search {
        /// User id (email-shaped namespace key)
        user_id: String,

        /// Search query
        query: String,

        /// Ranking algorithm: cosine or hybrid
        #[arg(short, long, default_value = "cosine")]
        algorithm: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show library statistics for a user
    Stats {
        /// User id
        user_id: String,
    },
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config);

    match cli.command {
        Commands::Serve { port } => server::run_server(config, port).await,
        Commands::Search {
            user_id,
            query,
            algorithm,
            limit,
        } => run_search(config, &user_id, &query, &algorithm, limit).await,
        Commands::Stats { user_id } => run_stats(config, &user_id),
    }
}

async fn run_search(
    config: Config,
    user_id: &str,
    query: &str,
    algorithm: &str,
    limit: usize,
) -> Result<()> {
    let store = Arc::new(VectorStore::new(config.base_dir.clone()));
    let embedder = Arc::new(RemoteEmbedder::new(&config)?);
    let engine = SearchEngine::new(store, embedder);

    let response = engine.search(user_id, query, algorithm, limit).await?;

    println!(
        "{} result(s) from {} document(s) / {} chunk(s) in {} ms ({})",
        response.results.len(),
        response.documents_searched,
        response.chunks_searched,
        response.took_ms,
        response.algorithm,
    );
    if let Some(model) = &response.model_restricted {
        println!("note: library holds mixed models; restricted to {}", model);
    }
    for result in &response.results {
        println!(
            "\n#{} [{:.4}] {} (chunk {})",
            result.rank, result.score, result.source_filename, result.chunk_index
        );
        let preview: String = result.text.chars().take(200).collect();
        println!("  {}", preview.replace('\n', " "));
    }
    Ok(())
}

fn run_stats(config: Config, user_id: &str) -> Result<()> {
    let store = VectorStore::new(config.base_dir.clone());
    let stats = library_stats(&config.base_dir, &store, user_id)?;

    if !stats.exists {
        println!("No library found for {}", user_id);
        return Ok(());
    }

    println!("Library for {}", stats.user_id);
    println!("  documents:        {}", stats.document_count);
    println!("  chunks:           {}", stats.chunk_count);
    println!("  embedded chunks:  {}", stats.embedded_chunk_count);
    println!("  raw upload bytes: {}", stats.raw_upload_bytes);
    Ok(())
}
