//! HTTP API route handlers

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::TryStreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::io::StreamReader;
use tower_http::cors::CorsLayer;

use crate::server::AppState;
use quiver::{library_stats, upload, Algorithm, Error, SearchRequest};

/// HTTP status for each error kind. Pipeline errors never reach a client;
/// this covers the synchronous surfaces (upload, search, stats).
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::InvalidUser(_) | Error::UnsupportedType(_) | Error::UnknownAlgorithm(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::EmptyLibrary(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(error: Error) -> (StatusCode, Json<serde_json::Value>) {
    (status_for(&error), Json(json!({ "error": error.to_string() })))
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // The gate enforces the real cap while streaming; the axum limit just
    // needs headroom for multipart framing.
    let body_limit = (state.config.max_file_size as usize).saturating_add(1024 * 1024);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", create_api_routes(state))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
}

fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/search", post(handle_search))
        .route("/library/:user_id/stats", get(handle_stats))
        .route("/algorithms", get(handle_algorithms))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Route Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/ingest - multipart upload: `file` plus `user_id` (as a field
/// preceding the file, or as a query parameter) and optional `description`.
async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut user_id = params.get("user_id").cloned();
    let mut description = params.get("description").cloned();
    let mut receipt = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
            }
        };

        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("user_id") => match field.text().await {
                Ok(text) => user_id = Some(text),
                Err(e) => {
                    return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                }
            },
            Some("description") => match field.text().await {
                Ok(text) => description = Some(text),
                Err(e) => {
                    return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                }
            },
            Some("file") => {
                let Some(ref user) = user_id else {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "user_id must be sent before the file" })),
                    );
                };
                if let Err(e) = upload::validate_user_id(user) {
                    return error_reply(e);
                }

                let filename = field
                    .file_name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "upload".to_string());

                let reader = StreamReader::new(
                    field.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
                );

                match state
                    .gate
                    .receive(user, &filename, description.take(), reader)
                    .await
                {
                    Ok(r) => receipt = Some(r),
                    Err(e) => return error_reply(e),
                }
            }
            _ => {}
        }
    }

    match receipt {
        Some(receipt) => (StatusCode::ACCEPTED, Json(json!(receipt))),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "multipart body must contain a file field" })),
        ),
    }
}

/// POST /api/search
async fn handle_search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> impl IntoResponse {
    match state
        .search
        .search(
            &payload.user_id,
            &payload.query,
            &payload.algorithm,
            payload.limit,
        )
        .await
    {
        Ok(response) => (StatusCode::OK, Json(json!(response))),
        Err(e) => error_reply(e),
    }
}

/// GET /api/library/:user_id/stats
async fn handle_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = upload::validate_user_id(&user_id) {
        return error_reply(e);
    }

    match library_stats(&state.config.base_dir, &state.store, &user_id) {
        Ok(stats) => (StatusCode::OK, Json(json!(stats))),
        Err(e) => error_reply(e),
    }
}

/// GET /api/algorithms
async fn handle_algorithms() -> impl IntoResponse {
    Json(json!({ "algorithms": Algorithm::all() }))
}
