//! Document upload and the attachment it produces.
//!
//! A successful upload yields an opaque document id. The id is attached to
//! every chat request that follows until another upload succeeds.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::transport::{Credential, HttpTransport, UPLOAD_PATH};

const DOCUMENT_MIME: &str = "application/pdf";

/// Opaque reference returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub id: String,
}

/// A file read into memory, ready to upload.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await.map_err(|source| UploadError::Read {
            path: path.clone(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        Ok(Self {
            path,
            file_name,
            bytes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Result of an upload attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(UploadedDocument),
    /// Preconditions not met (empty file or no credential); nothing was sent.
    Skipped,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    status: String,
    document_id: Option<String>,
    detail: Option<String>,
}

/// Upload `file` with `credential` to the backend.
pub async fn upload(
    transport: &HttpTransport,
    file: &DocumentFile,
    credential: Option<&Credential>,
) -> Result<UploadOutcome, UploadError> {
    let Some(credential) = credential else {
        debug!("upload skipped: no credential configured");
        return Ok(UploadOutcome::Skipped);
    };
    if file.is_empty() {
        debug!(path = %file.path.display(), "upload skipped: empty file");
        return Ok(UploadOutcome::Skipped);
    }

    let part = Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(DOCUMENT_MIME)?;
    let form = Form::new()
        .part("file", part)
        .text("api_key", credential.expose().to_string());

    info!(file = %file.file_name, bytes = file.bytes.len(), "uploading document");
    let response = transport
        .client()
        .post(transport.url(UPLOAD_PATH))
        .multipart(form)
        .send()
        .await?;

    let status = response.status().as_u16();
    let body = response.text().await?;
    let document = parse_upload_response(status, &body)?;
    info!(document_id = %document.id, "document uploaded");
    Ok(UploadOutcome::Uploaded(document))
}

/// Interpret the upload endpoint's answer.
pub fn parse_upload_response(status: u16, body: &str) -> Result<UploadedDocument, UploadError> {
    let response = match serde_json::from_str::<UploadResponse>(body) {
        Ok(response) => response,
        Err(err) => {
            warn!(status, error = %err, "upload response was not understood");
            return Err(UploadError::Rejected {
                detail: format!("server responded with HTTP {}", status),
            });
        }
    };

    match (response.status.as_str(), response.document_id) {
        ("ok", Some(id)) => Ok(UploadedDocument { id }),
        (other, _) => Err(UploadError::Rejected {
            detail: response
                .detail
                .unwrap_or_else(|| format!("server reported status '{}'", other)),
        }),
    }
}

/// The document currently attached to outgoing chat requests.
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    document: Option<UploadedDocument>,
    last_error: Option<String>,
}

impl Attachment {
    pub fn document(&self) -> Option<&UploadedDocument> {
        self.document.as_ref()
    }

    pub fn document_ref(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.id.as_str())
    }

    /// Message from the most recent failed upload, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fold an upload result in. Failures never touch the held document.
    pub fn apply(&mut self, result: Result<UploadOutcome, UploadError>) {
        match result {
            Ok(UploadOutcome::Uploaded(document)) => {
                self.document = Some(document);
                self.last_error = None;
            }
            Ok(UploadOutcome::Skipped) => {}
            Err(err) => {
                warn!(error = %err, "document upload failed");
                self.last_error = Some(err.user_message());
            }
        }
    }
}
