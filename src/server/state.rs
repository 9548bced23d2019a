//! Server application state

use quiver::{Config, SearchEngine, UploadGate, VectorStore};
use std::sync::Arc;

/// Shared application state for all route handlers
pub struct AppState {
    pub config: Config,
    pub gate: UploadGate,
    pub search: SearchEngine,
    pub store: Arc<VectorStore>,
}
