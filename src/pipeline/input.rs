//! Upload intake: read the multipart form into an [`Upload`].
//!
//! The file part is buffered exactly once. The resulting [`Bytes`] is
//! reference-counted, so both pipeline branches share the same allocation
//! instead of re-reading a stream that may not support it.

use crate::error::RelayError;
use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::debug;

/// Filename used when the client sends a file part without one.
const FALLBACK_FILENAME: &str = "upload.pdf";

/// One `POST /api/process-document` request, fully read.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: Bytes,
    /// Raw JSON text of the `metadata` field; parsed by the orchestrator.
    pub metadata: String,
    /// Opaque caller token. Accepted but not validated.
    pub token: String,
}

/// Drain `multipart` into an [`Upload`].
///
/// Unknown fields are skipped. Fails with [`RelayError::MissingField`] when
/// `file`, `metadata` or `token` is absent.
pub async fn read_upload(mut multipart: Multipart) -> Result<Upload, RelayError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut metadata: Option<String> = None;
    let mut token: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::UnreadableUpload(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(FALLBACK_FILENAME)
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| RelayError::UnreadableUpload(e.to_string()))?;
                debug!("Read {} bytes of file data for '{}'", data.len(), filename);
                file = Some((filename, data));
            }
            "metadata" => {
                metadata = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| RelayError::UnreadableUpload(e.to_string()))?,
                );
            }
            "token" => {
                token = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| RelayError::UnreadableUpload(e.to_string()))?,
                );
            }
            other => debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    let (filename, content) = file.ok_or(RelayError::MissingField { field: "file" })?;
    let metadata = metadata.ok_or(RelayError::MissingField { field: "metadata" })?;
    let token = token.ok_or(RelayError::MissingField { field: "token" })?;

    Ok(Upload {
        filename,
        content,
        metadata,
        token,
    })
}
