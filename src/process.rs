//! Request orchestration: one upload in, one [`ProcessedDocument`] out.
//!
//! ```text
//! Upload ──▶ parse metadata ──▶ ┬─ extract (recognition, deadline) ─┬─▶ envelope
//!                               └─ render  (blocking pool)         ─┘
//! ```
//!
//! Extraction and rendering run concurrently against the same buffer and
//! are joined with a plain two-way barrier. An extraction error aborts the
//! request; a render failure only leaves `thumbnail` empty.

use crate::config::RelayConfig;
use crate::error::Result;
use crate::output::ProcessedDocument;
use crate::pipeline::extract::InvoiceExtractor;
use crate::pipeline::input::Upload;
use crate::pipeline::recognize::{AzureDocumentClient, RecognitionService};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer, ThumbnailRenderer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared, immutable handle that processes uploads.
///
/// Built once at startup and cloned into every request.
#[derive(Clone)]
pub struct DocumentProcessor {
    extractor: InvoiceExtractor,
    renderer: ThumbnailRenderer,
}

impl DocumentProcessor {
    pub fn new(extractor: InvoiceExtractor, renderer: ThumbnailRenderer) -> Self {
        Self {
            extractor,
            renderer,
        }
    }

    /// Wire a processor from explicit service implementations.
    pub fn with_services(
        service: Arc<dyn RecognitionService>,
        rasterizer: Arc<dyn Rasterizer>,
        config: &RelayConfig,
    ) -> Self {
        Self::new(
            InvoiceExtractor::from_config(service, config),
            ThumbnailRenderer::from_config(rasterizer, config),
        )
    }

    /// Production wiring: REST recognition client + pdfium.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let service = Arc::new(AzureDocumentClient::new(config)?);
        let rasterizer = Arc::new(PdfiumRasterizer::new(config.pdfium_library.clone()));
        Ok(Self::with_services(service, rasterizer, config))
    }

    /// Process one upload.
    ///
    /// # Errors
    /// - [`crate::RelayError::InvalidMetadata`] when `metadata` is not JSON
    /// - [`crate::RelayError::Recognition`] when extraction fails
    pub async fn process(&self, upload: Upload) -> Result<ProcessedDocument> {
        let start = Instant::now();
        let Upload {
            filename,
            content,
            metadata,
            token,
        } = upload;

        info!("Processing invoice: {} ({} bytes)", filename, content.len());
        debug!("Caller token present: {}", !token.is_empty());

        let metadata: serde_json::Value = serde_json::from_str(&metadata)?;

        let (extracted, thumbnail) = tokio::join!(
            self.extractor
                .extract_invoice_fields(content.clone(), &filename),
            self.renderer.render_first_page(content),
        );
        let extracted_data = extracted?;

        if thumbnail.is_none() {
            warn!("Thumbnail generation failed for {}", filename);
        }

        info!(
            "Processed {} in {}ms",
            filename,
            start.elapsed().as_millis()
        );

        Ok(ProcessedDocument {
            filename,
            extracted_data,
            thumbnail,
            metadata,
        })
    }
}
