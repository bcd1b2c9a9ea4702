//! Error types for the invoice-relay service.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`RelayError`]: **fatal** for the current request (or for startup).
//!   Covers malformed metadata, unreadable upload, recognition failure, bad
//!   configuration. Converted into an HTTP error response by its
//!   [`IntoResponse`] impl.
//!
//! * [`RecognitionError`]: raised by a
//!   [`crate::pipeline::recognize::RecognitionService`]. The extraction adapter
//!   wraps it into [`RelayError::Recognition`], so it always aborts the request.
//!
//! * [`RenderError`]: **non-fatal**. The first-page preview could not be
//!   produced. Contained entirely inside the renderer adapter, which logs it
//!   and degrades the thumbnail to `null`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result alias used by request handlers and the orchestrator.
pub type Result<T> = std::result::Result<T, RelayError>;

/// All fatal errors returned by the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required multipart field was not sent.
    #[error("Missing form field '{field}'")]
    MissingField { field: &'static str },

    /// The multipart body could not be read.
    #[error("Failed to read upload: {0}")]
    UnreadableUpload(String),

    /// The `metadata` form field is not valid JSON.
    #[error("Invalid metadata JSON: {0}")]
    InvalidMetadata(#[from] serde_json::Error),

    // ── Recognition errors ────────────────────────────────────────────────
    /// The recognition service failed for this document.
    #[error("{0}")]
    Recognition(#[from] RecognitionError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// A required environment variable is missing or empty.
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable machine-readable code used in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::MissingField { .. } => "missing_field",
            RelayError::UnreadableUpload(_) => "unreadable_upload",
            RelayError::InvalidMetadata(_) => "invalid_metadata",
            RelayError::Recognition(_) => "recognition_failed",
            RelayError::MissingEnv(_) | RelayError::InvalidConfig(_) => "config_error",
            RelayError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error.
    ///
    /// Everything except a missing form field maps to 500: malformed metadata
    /// and recognition failures are both terminal for the request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failures of the external recognition capability.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The HTTP request could not be sent or the connection dropped.
    #[error("Recognition request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("Recognition service returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The submit response did not carry an `Operation-Location` header.
    #[error("Recognition service did not return an Operation-Location header")]
    MissingOperationLocation,

    /// The service accepted the document but the analysis failed.
    #[error("Document analysis failed: {0}")]
    AnalysisFailed(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected recognition response: {0}")]
    InvalidResponse(String),

    /// Polling exhausted its attempt budget before the analysis finished.
    #[error("Document analysis still running after {attempts} polls")]
    PollingExhausted { attempts: u32 },

    /// The whole recognition call exceeded its deadline.
    #[error("Document analysis timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A non-fatal failure to produce the first-page thumbnail.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The pdfium library could not be bound.
    #[error("Rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    /// pdfium rejected the buffer (corrupt, encrypted, not a PDF).
    #[error("Document could not be opened: {0}")]
    UnreadableDocument(String),

    /// The document opened fine but has no pages.
    #[error("Document has no pages")]
    NoPages,

    /// pdfium failed while rasterising page 1.
    #[error("Rasterisation failed: {0}")]
    RasterisationFailed(String),

    /// The raster could not be PNG-encoded.
    #[error("Image encoding failed: {0}")]
    EncodeFailed(String),

    /// The blocking render job panicked or was cancelled.
    #[error("Render worker failed: {0}")]
    WorkerFailed(String),
}

/// JSON error body.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.code(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}
