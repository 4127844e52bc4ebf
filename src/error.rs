use std::path::PathBuf;

use thiserror::Error;

/// Failures of a chat request, before or during streaming.
///
/// These never reach the user verbatim: the reducer turns any of them into
/// a single fixed-text assistant turn and the details go to the log.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request violated an input constraint (empty message, no credential).
    #[error("invalid chat request: {0}")]
    InvalidRequest(&'static str),

    /// The endpoint answered with a non-success status.
    #[error("chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS, timeout or body read failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Failures of a document upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered but did not accept the document.
    #[error("{detail}")]
    Rejected { detail: String },
}

impl UploadError {
    /// Message shown in the status bar.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Read { path, .. } => format!("Upload failed: could not read {}", path.display()),
            UploadError::Network(_) => "Upload failed: could not reach the server".to_string(),
            UploadError::Rejected { detail } => format!("Upload failed: {}", detail),
        }
    }
}
