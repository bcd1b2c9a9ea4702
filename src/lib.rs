//! # invoice-relay
//!
//! HTTP relay that turns an uploaded invoice into a small, fixed JSON
//! envelope: three recognised fields, a constant document type, a
//! first-page thumbnail and the caller's metadata echoed back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /api/process-document (multipart: file, metadata, token)
//!  │
//!  ├─ 1. Input      buffer the upload once, parse metadata JSON
//!  ├─ 2. Recognize  prebuilt-invoice model over REST (submit + poll)
//!  ├─ 3. Remap      InvoiceId / InvoiceDate / RemittanceAddressRecipient
//!  ├─ 4. Render     first page via pdfium (spawn_blocking, bounded pool)
//!  ├─ 5. Encode     PNG → base64 thumbnail
//!  └─ 6. Output     { filename, extracted_data, thumbnail, metadata }
//! ```
//!
//! Steps 2–3 and 4–5 run concurrently. A recognition failure fails the
//! request; a render failure only nulls the thumbnail.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_relay::{router, AppState, DocumentProcessor, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads AZURE_ENDPOINT / AZURE_KEY (and a .env file, if present)
//!     let config = RelayConfig::from_env()?;
//!     let processor = DocumentProcessor::from_config(&config)?;
//!     let app = router(AppState::new(processor), config.max_upload_bytes);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-relay` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` to embed the router in another service:
//! ```toml
//! invoice-relay = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RelayConfig, RelayConfigBuilder};
pub use error::{RecognitionError, RelayError, RenderError};
pub use output::{ExtractedData, FieldResult, OutputField, ProcessedDocument, PAYABLE_VOUCHER};
pub use pipeline::input::Upload;
pub use pipeline::recognize::{AnalyzeResult, AzureDocumentClient, RecognitionService};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use process::DocumentProcessor;
pub use server::{cors_layer, router, AppState};
