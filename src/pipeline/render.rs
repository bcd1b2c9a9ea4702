//! Renderer adapter: first page of an upload → base64 PNG thumbnail.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with internal global state; calling it from a
//! Tokio worker would stall every other request scheduled on that thread.
//! Rasterisation runs on the blocking pool instead, and a semaphore caps how
//! many renders may be in flight at once so a burst of uploads cannot pile
//! up unbounded CPU work.
//!
//! ## Failure policy
//!
//! [`ThumbnailRenderer::render_first_page`] never fails. Every
//! [`RenderError`] is logged with the upload size and a hex prefix of its
//! content, and the thumbnail degrades to `None`.

use crate::config::RelayConfig;
use crate::error::RenderError;
use crate::pipeline::encode;
use axum::body::Bytes;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Number of leading bytes dumped as hex when a render fails.
const DIAGNOSTIC_PREFIX_LEN: usize = 100;

/// Blocking first-page rasteriser.
pub trait Rasterizer: Send + Sync {
    /// Render page 1 of `document` at `scale`× its natural size.
    fn rasterize_first_page(&self, document: &[u8], scale: f32) -> Result<DynamicImage, RenderError>;
}

/// [`Rasterizer`] backed by pdfium.
///
/// Binds the library on each call; a missing library surfaces as
/// [`RenderError::EngineUnavailable`] instead of aborting the process.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// `library` is an explicit pdfium shared-library file; `None` uses the system library.
    pub fn new(library: Option<PathBuf>) -> Self {
        Self { library }
    }

    fn bind(&self) -> Result<Pdfium, RenderError> {
        let bindings = match &self.library {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| RenderError::EngineUnavailable(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize_first_page(&self, document: &[u8], scale: f32) -> Result<DynamicImage, RenderError> {
        let pdfium = self.bind()?;

        let pdf = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| RenderError::UnreadableDocument(format!("{:?}", e)))?;

        let pages = pdf.pages();
        if pages.len() == 0 {
            return Err(RenderError::NoPages);
        }

        let page = pages
            .get(0)
            .map_err(|e| RenderError::RasterisationFailed(format!("{:?}", e)))?;
        debug!(
            "Processing page 1 of {}, size: {:.1}x{:.1} pt",
            pages.len(),
            page.width().value,
            page.height().value
        );

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RenderError::RasterisationFailed(format!("{:?}", e)))?;

        // pdfium paints onto a white background; drop the alpha channel.
        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        debug!("Generated raster with dimensions: {}x{}", image.width(), image.height());
        Ok(image)
    }
}

/// Produces first-page thumbnails on a bounded worker pool.
#[derive(Clone)]
pub struct ThumbnailRenderer {
    rasterizer: Arc<dyn Rasterizer>,
    workers: Arc<Semaphore>,
    scale: f32,
}

impl ThumbnailRenderer {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, workers: usize, scale: f32) -> Self {
        Self {
            rasterizer,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            scale,
        }
    }

    /// Renderer using the pool size and scale from `config`.
    pub fn from_config(rasterizer: Arc<dyn Rasterizer>, config: &RelayConfig) -> Self {
        Self::new(rasterizer, config.render_workers, config.render_scale)
    }

    /// Render page 1 of `document` as a base64 PNG, or `None` on any failure.
    pub async fn render_first_page(&self, document: Bytes) -> Option<String> {
        info!(
            "Starting first page extraction with content size: {} bytes",
            document.len()
        );

        match self.try_render(document.clone()).await {
            Ok(thumbnail) => {
                info!("Generated thumbnail of size: {} bytes", thumbnail.len());
                Some(thumbnail)
            }
            Err(e) => {
                log_render_failure(&e, &document);
                None
            }
        }
    }

    async fn try_render(&self, document: Bytes) -> Result<String, RenderError> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| RenderError::WorkerFailed(e.to_string()))?;

        let rasterizer = Arc::clone(&self.rasterizer);
        let scale = self.scale;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let image = rasterizer.rasterize_first_page(&document, scale)?;
            encode::encode_png_base64(&image).map_err(|e| RenderError::EncodeFailed(e.to_string()))
        })
        .await
        .map_err(|e| RenderError::WorkerFailed(e.to_string()))?
    }
}

fn log_render_failure(err: &RenderError, document: &[u8]) {
    error!("PDF extraction error: {}", err);
    error!("PDF content size: {} bytes", document.len());
    if !document.is_empty() {
        let prefix = &document[..document.len().min(DIAGNOSTIC_PREFIX_LEN)];
        error!(
            "PDF content first {} bytes (hex): {}",
            prefix.len(),
            hex::encode(prefix)
        );
    }
}
