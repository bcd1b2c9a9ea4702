//! REST client tests against a local fake of the recognition service.
//!
//! The fake accepts a submit, hands out an `Operation-Location` pointing back
//! at itself, and answers polls from a scripted list of statuses.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use invoice_relay::{AzureDocumentClient, RecognitionError, RecognitionService, RelayConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const KEY: &str = "fake-subscription-key";

#[derive(Clone)]
struct Fake {
    addr: SocketAddr,
    /// Poll responses, consumed front to back; the last one repeats.
    script: Arc<Vec<Value>>,
    polls: Arc<AtomicUsize>,
    submitted: Arc<Mutex<Option<(String, usize, Option<String>)>>>,
    omit_location: bool,
}

fn authorised(headers: &HeaderMap) -> bool {
    headers
        .get("Ocp-Apim-Subscription-Key")
        .and_then(|v| v.to_str().ok())
        == Some(KEY)
}

fn denied() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": "401", "message": "Access denied due to invalid subscription key"}})),
    )
        .into_response()
}

async fn submit(
    State(fake): State<Fake>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorised(&headers) {
        return denied();
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *fake.submitted.lock().unwrap() = Some((model_action, body.len(), content_type));

    if fake.omit_location {
        return StatusCode::ACCEPTED.into_response();
    }
    let location = format!("http://{}/operations/op-1", fake.addr);
    (StatusCode::ACCEPTED, [("Operation-Location", location)]).into_response()
}

async fn poll(State(fake): State<Fake>, Path(_id): Path<String>, headers: HeaderMap) -> Response {
    if !authorised(&headers) {
        return denied();
    }
    let n = fake.polls.fetch_add(1, Ordering::SeqCst);
    let body = fake.script[n.min(fake.script.len() - 1)].clone();
    Json(body).into_response()
}

async fn start_fake(script: Vec<Value>, omit_location: bool) -> Fake {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let fake = Fake {
        addr: listener.local_addr().unwrap(),
        script: Arc::new(script),
        polls: Arc::new(AtomicUsize::new(0)),
        submitted: Arc::new(Mutex::new(None)),
        omit_location,
    };
    let app = Router::new()
        .route("/documentintelligence/documentModels/:model_action", post(submit))
        .route("/operations/:id", get(poll))
        .with_state(fake.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    fake
}

fn client(fake: &Fake, key: &str, max_polls: u32) -> AzureDocumentClient {
    let config = RelayConfig::builder()
        .endpoint(format!("http://{}/", fake.addr))
        .api_key(key)
        .poll_interval_ms(10)
        .max_poll_attempts(max_polls)
        .build()
        .unwrap();
    AzureDocumentClient::new(&config).unwrap()
}

fn succeeded() -> Value {
    json!({
        "status": "succeeded",
        "analyzeResult": {
            "apiVersion": "2024-11-30",
            "modelId": "prebuilt-invoice",
            "documents": [{
                "docType": "invoice",
                "confidence": 1.0,
                "fields": {
                    "InvoiceId": {"type": "string", "valueString": "INV-77", "content": "INV-77", "confidence": 0.97},
                    "InvoiceDate": {"type": "date", "valueDate": "2024-01-31", "content": "31/01/2024", "confidence": 0.93}
                }
            }]
        }
    })
}

#[tokio::test]
async fn submits_then_polls_until_succeeded() {
    let fake = start_fake(
        vec![json!({"status": "notStarted"}), json!({"status": "running"}), succeeded()],
        false,
    )
    .await;

    let result = client(&fake, KEY, 10)
        .analyze("prebuilt-invoice", Bytes::from_static(b"%PDF-1.7 body"))
        .await
        .unwrap();

    assert_eq!(fake.polls.load(Ordering::SeqCst), 3);
    assert_eq!(result.model_id.as_deref(), Some("prebuilt-invoice"));
    let doc = &result.documents[0];
    assert_eq!(doc.fields["InvoiceId"].value_string.as_deref(), Some("INV-77"));
    assert_eq!(doc.fields["InvoiceDate"].value_date.as_deref(), Some("2024-01-31"));

    let (model_action, len, content_type) = fake.submitted.lock().unwrap().clone().unwrap();
    assert_eq!(model_action, "prebuilt-invoice:analyze");
    assert_eq!(len, 13);
    assert_eq!(content_type.as_deref(), Some("application/octet-stream"));
}

#[tokio::test]
async fn failed_status_is_analysis_failed() {
    let fake = start_fake(
        vec![json!({
            "status": "failed",
            "error": {"code": "InvalidContent", "message": "The file is corrupted or format is unsupported."}
        })],
        false,
    )
    .await;

    let err = client(&fake, KEY, 10)
        .analyze("prebuilt-invoice", Bytes::from_static(b"junk"))
        .await
        .unwrap_err();

    match err {
        RecognitionError::AnalysisFailed(detail) => {
            assert!(detail.contains("InvalidContent"), "{detail}");
            assert!(detail.contains("corrupted"), "{detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn wrong_key_is_http_401() {
    let fake = start_fake(vec![succeeded()], false).await;

    let err = client(&fake, "wrong-key", 10)
        .analyze("prebuilt-invoice", Bytes::from_static(b"%PDF"))
        .await
        .unwrap_err();

    match err {
        RecognitionError::Http { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid subscription key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fake.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_operation_location_is_reported() {
    let fake = start_fake(vec![succeeded()], true).await;

    let err = client(&fake, KEY, 10)
        .analyze("prebuilt-invoice", Bytes::from_static(b"%PDF"))
        .await
        .unwrap_err();

    assert!(matches!(err, RecognitionError::MissingOperationLocation));
}

#[tokio::test]
async fn gives_up_after_max_polls() {
    let fake = start_fake(vec![json!({"status": "running"})], false).await;

    let err = client(&fake, KEY, 3)
        .analyze("prebuilt-invoice", Bytes::from_static(b"%PDF"))
        .await
        .unwrap_err();

    assert!(matches!(err, RecognitionError::PollingExhausted { attempts: 3 }));
    assert_eq!(fake.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = RelayConfig::builder()
        .endpoint(format!("http://{addr}"))
        .api_key(KEY)
        .build()
        .unwrap();

    let err = AzureDocumentClient::new(&config)
        .unwrap()
        .analyze("prebuilt-invoice", Bytes::from_static(b"%PDF"))
        .await
        .unwrap_err();

    assert!(matches!(err, RecognitionError::Transport(_)));
}
