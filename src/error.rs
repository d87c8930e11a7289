// Error type shared by the API client and the upload orchestrator.
// Nothing in the library exits the process: every failure travels back
// to `main` as an `UploadError`, which decides how to render it.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    /// Single-folder mode was requested without an upload token.
    #[error("Gofile token is required when passing `--to-single-folder`")]
    MissingToken,

    /// Connection-level failure (DNS, TLS, broken pipe, ...).
    #[error("connection error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a 4xx or 5xx status.
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The body did not have the shape we consume, or the API reported
    /// a non-"ok" status.
    #[error("unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    #[error("no upload server available")]
    NoServer,

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write export file {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub(crate) fn unexpected(endpoint: &str, reason: impl Into<String>) -> Self {
        UploadError::UnexpectedResponse {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}
