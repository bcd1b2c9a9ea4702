//! Extraction adapter: run the recognition service on an upload and remap
//! its output.
//!
//! Unlike rendering, a failure here is terminal for the request: the error
//! text from the recognition service is carried up to the HTTP response.

use crate::config::RelayConfig;
use crate::error::{RecognitionError, RelayError};
use crate::output::ExtractedData;
use crate::pipeline::recognize::RecognitionService;
use crate::pipeline::remap;
use axum::body::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Turns uploaded bytes into payable-voucher fields.
#[derive(Clone)]
pub struct InvoiceExtractor {
    service: Arc<dyn RecognitionService>,
    model_id: String,
    timeout: Duration,
}

impl InvoiceExtractor {
    pub fn new(service: Arc<dyn RecognitionService>, model_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service,
            model_id: model_id.into(),
            timeout,
        }
    }

    /// Extractor using the model id and deadline from `config`.
    pub fn from_config(service: Arc<dyn RecognitionService>, config: &RelayConfig) -> Self {
        Self::new(
            service,
            config.model_id.clone(),
            Duration::from_secs(config.extraction_timeout_secs),
        )
    }

    /// Analyse `document` and map the result onto the four output keys.
    ///
    /// `filename` is only used for log correlation.
    pub async fn extract_invoice_fields(
        &self,
        document: Bytes,
        filename: &str,
    ) -> Result<ExtractedData, RelayError> {
        info!("Starting invoice analysis for file: {}", filename);
        let start = Instant::now();

        let analysis = tokio::time::timeout(self.timeout, self.service.analyze(&self.model_id, document)).await;

        let result = match analysis {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Invoice processing error for {}: {}", filename, e);
                return Err(e.into());
            }
            Err(_) => {
                let e = RecognitionError::Timeout {
                    secs: self.timeout.as_secs(),
                };
                error!("Invoice processing error for {}: {}", filename, e);
                return Err(e.into());
            }
        };

        debug!(
            "Recognition for {} finished in {}ms ({} documents)",
            filename,
            start.elapsed().as_millis(),
            result.documents.len()
        );

        let data = remap::remap_invoice(&result);
        info!("Extracted document data for {}: {:?}", filename, data);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{FieldResult, OutputField};
    use crate::pipeline::recognize::{AnalyzeResult, AnalyzedDocument, DocumentField};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the model id it was called with and replays a canned answer.
    struct Canned {
        answer: Result<AnalyzeResult, RecognitionError>,
        delay: Duration,
        seen_model: Mutex<Option<String>>,
    }

    #[async_trait]
    impl RecognitionService for Canned {
        async fn analyze(
            &self,
            model_id: &str,
            _document: Bytes,
        ) -> Result<AnalyzeResult, RecognitionError> {
            *self.seen_model.lock().unwrap() = Some(model_id.to_string());
            tokio::time::sleep(self.delay).await;
            self.answer.clone()
        }
    }

    fn canned(answer: Result<AnalyzeResult, RecognitionError>, delay: Duration) -> Arc<Canned> {
        Arc::new(Canned {
            answer,
            delay,
            seen_model: Mutex::new(None),
        })
    }

    fn invoice_id(value: &str) -> AnalyzeResult {
        AnalyzeResult {
            model_id: None,
            documents: vec![AnalyzedDocument {
                doc_type: None,
                fields: [(
                    "InvoiceId".to_string(),
                    DocumentField {
                        value_string: Some(value.into()),
                        confidence: Some(0.9),
                        ..Default::default()
                    },
                )]
                .into_iter()
                .collect(),
                confidence: None,
            }],
        }
    }

    #[tokio::test]
    async fn passes_model_id_and_remaps() {
        let service = canned(Ok(invoice_id("PV-9")), Duration::ZERO);
        let extractor = InvoiceExtractor::new(service.clone(), "prebuilt-invoice", Duration::from_secs(5));

        let data = extractor
            .extract_invoice_fields(Bytes::from_static(b"%PDF-1.7"), "a.pdf")
            .await
            .unwrap();

        assert_eq!(
            data.get(OutputField::PvNumber),
            &FieldResult {
                value: Some("PV-9".into()),
                confidence: 0.9
            }
        );
        assert_eq!(
            service.seen_model.lock().unwrap().as_deref(),
            Some("prebuilt-invoice")
        );
    }

    #[tokio::test]
    async fn service_error_is_fatal_and_keeps_text() {
        let service = canned(
            Err(RecognitionError::AnalysisFailed("InvalidContent".into())),
            Duration::ZERO,
        );
        let extractor = InvoiceExtractor::new(service, "prebuilt-invoice", Duration::from_secs(5));

        let err = extractor
            .extract_invoice_fields(Bytes::new(), "broken.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Recognition(_)));
        assert!(err.to_string().contains("InvalidContent"), "got: {err}");
    }

    #[tokio::test]
    async fn slow_service_hits_deadline() {
        let service = canned(Ok(AnalyzeResult::default()), Duration::from_secs(5));
        let extractor = InvoiceExtractor::new(service, "prebuilt-invoice", Duration::from_millis(50));

        let err = extractor
            .extract_invoice_fields(Bytes::new(), "slow.pdf")
            .await
            .unwrap_err();
        assert!(
            matches!(err, RelayError::Recognition(RecognitionError::Timeout { .. })),
            "got: {err:?}"
        );
    }
}
