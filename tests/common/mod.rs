//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Bytes;
use image::{DynamicImage, Rgb, RgbImage};
use invoice_relay::pipeline::recognize::{AnalyzedDocument, DocumentField};
use invoice_relay::{
    router, AnalyzeResult, AppState, DocumentProcessor, Rasterizer, RecognitionError,
    RecognitionService, RelayConfig, RenderError,
};
use reqwest::multipart::{self, Form};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn config() -> RelayConfig {
    RelayConfig::builder()
        .endpoint("https://unused.example")
        .api_key("test-key")
        .build()
        .unwrap()
}

fn field(value: &str, confidence: f64) -> DocumentField {
    DocumentField {
        value_string: Some(value.to_string()),
        confidence: Some(confidence),
        ..Default::default()
    }
}

/// A typical invoice analysis: id, date and recipient all present.
pub fn invoice_result() -> AnalyzeResult {
    let fields = [
        ("InvoiceId".to_string(), field("INV-1001", 0.95)),
        (
            "InvoiceDate".to_string(),
            DocumentField {
                kind: Some("date".into()),
                value_date: Some("2024-03-15".into()),
                content: Some("15 March 2024".into()),
                confidence: Some(0.9),
                ..Default::default()
            },
        ),
        ("RemittanceAddressRecipient".to_string(), field("Acme Corp", 0.8)),
        ("VendorName".to_string(), field("Ignored Ltd", 0.99)),
    ];
    AnalyzeResult {
        model_id: Some("prebuilt-invoice".into()),
        documents: vec![AnalyzedDocument {
            doc_type: Some("invoice".into()),
            fields: fields.into_iter().collect(),
            confidence: Some(1.0),
        }],
    }
}

/// Recognition stub returning a canned result or error.
pub struct StubRecognition {
    pub outcome: Result<AnalyzeResult, RecognitionError>,
    pub calls: AtomicUsize,
}

impl StubRecognition {
    pub fn ok(result: AnalyzeResult) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(result),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(err: RecognitionError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(err),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionService for StubRecognition {
    async fn analyze(&self, _model_id: &str, _document: Bytes) -> Result<AnalyzeResult, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Rasterizer stub producing a white page or a failure.
pub struct StubRasterizer {
    pub fail: bool,
}

impl Rasterizer for StubRasterizer {
    fn rasterize_first_page(&self, _document: &[u8], scale: f32) -> Result<DynamicImage, RenderError> {
        if self.fail {
            return Err(RenderError::UnreadableDocument("not a PDF".into()));
        }
        let side = (10.0 * scale) as u32;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(side, side, Rgb([255, 255, 255]))))
    }
}

pub fn app(service: Arc<StubRecognition>, render_fails: bool) -> axum::Router {
    let config = config();
    let processor = DocumentProcessor::with_services(
        service,
        Arc::new(StubRasterizer { fail: render_fails }),
        &config,
    );
    router(AppState::new(processor), config.max_upload_bytes)
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// The three-part upload form: `file`, `metadata`, `token`.
pub fn upload_form(filename: &str, pdf: &[u8], metadata: &str) -> Form {
    let part = multipart::Part::bytes(pdf.to_vec())
        .file_name(filename.to_string())
        .mime_str("application/pdf")
        .unwrap();
    Form::new()
        .part("file", part)
        .text("metadata", metadata.to_string())
        .text("token", "opaque-token")
}
