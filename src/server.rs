//! HTTP surface.
//!
//! Endpoints:
//! - `POST /api/process-document`: multipart `file`, `metadata`, `token`
//! - `GET  /health`               : liveness probe
//!
//! CORS is wide open (any origin, method and header; no credentials). That
//! only suits a trusted internal caller.

use crate::error::{RelayError, Result};
use crate::output::ProcessedDocument;
use crate::pipeline::input;
use crate::process::DocumentProcessor;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    processor: Arc<DocumentProcessor>,
}

impl AppState {
    pub fn new(processor: DocumentProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/process-document", post(process_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Permissive CORS: any origin, method and header; credentials disabled.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/process-document
///
/// A body that is not `multipart/form-data` is reported like any other
/// unreadable upload, with the JSON error body.
async fn process_document(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessedDocument>> {
    let multipart = multipart.map_err(|e| RelayError::UnreadableUpload(e.body_text()))?;
    let upload = input::read_upload(multipart).await?;
    let document = state.processor.process(upload).await?;
    Ok(Json(document))
}
