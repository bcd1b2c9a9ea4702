//! Recognition service: submit a document to a prebuilt model and wait for
//! its structured result.
//!
//! [`RecognitionService`] is the seam between the relay and the external
//! capability. Production uses [`AzureDocumentClient`], which speaks the
//! Document Intelligence REST protocol:
//!
//! ```text
//! POST {endpoint}/documentintelligence/documentModels/{model}:analyze?api-version=…
//!   ──▶ 202 Accepted, Operation-Location: <poll url>
//! GET  <poll url>   (repeat until status is "succeeded" or "failed")
//!   ──▶ { "status": "succeeded", "analyzeResult": { "documents": [ … ] } }
//! ```
//!
//! Only the parts of `analyzeResult` the relay reads are modelled; unknown
//! JSON properties are ignored.

use crate::config::RelayConfig;
use crate::error::{RecognitionError, RelayError};
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// A document-recognition capability.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Analyse `document` with the named prebuilt model.
    async fn analyze(&self, model_id: &str, document: Bytes)
        -> Result<AnalyzeResult, RecognitionError>;
}

// ── Result model ─────────────────────────────────────────────────────────

/// Structured output of one analysis.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub documents: Vec<AnalyzedDocument>,
}

/// One document found in the upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, DocumentField>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One recognised field as returned by the model.
///
/// A field may carry several representations at once; see
/// [`crate::pipeline::remap::FieldValue`] for how one is chosen.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentField {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value_string: Option<String>,
    #[serde(default)]
    pub value_date: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Body of the polled analysis operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ServiceError {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(msg)) => format!("{code}: {msg}"),
            (None, Some(msg)) => msg.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "Unknown error".to_string(),
        }
    }
}

// ── REST client ──────────────────────────────────────────────────────────

/// Async client for the Document Intelligence REST API.
///
/// Constructed once at startup and shared by every request.
pub struct AzureDocumentClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AzureDocumentClient {
    /// Build a client from the relay configuration.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.extraction_timeout_secs))
            .build()
            .map_err(|e| RelayError::InvalidConfig(format!("HTTP client: {e}")))?;

        info!("Recognition client ready for {}", config.endpoint);

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_poll_attempts,
        })
    }

    /// URL that submits a document to `model_id`.
    pub fn analyze_url(&self, model_id: &str) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, model_id, self.api_version
        )
    }

    async fn submit(&self, model_id: &str, document: Bytes) -> Result<String, RecognitionError> {
        let url = self.analyze_url(model_id);
        debug!("Submitting {} bytes to {}", document.len(), url);

        let response = self
            .http
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(document)
            .send()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or(RecognitionError::MissingOperationLocation)
    }

    async fn poll(&self, operation_url: &str) -> Result<AnalyzeResult, RecognitionError> {
        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .http
                .get(operation_url)
                .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(|e| RecognitionError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RecognitionError::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            let operation: AnalyzeOperation = response
                .json()
                .await
                .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;

            match operation.status.as_str() {
                "succeeded" => {
                    debug!("Analysis succeeded after {} polls", attempt);
                    return operation.analyze_result.ok_or_else(|| {
                        RecognitionError::InvalidResponse("missing analyzeResult".into())
                    });
                }
                "failed" | "canceled" => {
                    let detail = operation
                        .error
                        .as_ref()
                        .map(ServiceError::describe)
                        .unwrap_or_else(|| format!("operation {}", operation.status));
                    return Err(RecognitionError::AnalysisFailed(detail));
                }
                other => debug!("Poll {}/{}: status {}", attempt, self.max_polls, other),
            }
        }

        Err(RecognitionError::PollingExhausted {
            attempts: self.max_polls,
        })
    }
}

#[async_trait]
impl RecognitionService for AzureDocumentClient {
    async fn analyze(
        &self,
        model_id: &str,
        document: Bytes,
    ) -> Result<AnalyzeResult, RecognitionError> {
        let operation_url = self.submit(model_id, document).await?;
        self.poll(&operation_url).await
    }
}
