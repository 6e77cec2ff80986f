//! Error types for the edition-ingest library.
//!
//! A single enum, [`IngestError`], covers every way an ingestion run can stop.
//! There is no page-level error type: the first failure of any kind aborts
//! the run, and pages that were already uploaded stay on the server.
//!
//! The `Display` text of each variant is what the operator sees in the status
//! line (prefixed with `Error: `), so messages are written for humans and API
//! errors are passed through verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edition-ingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required form field is missing or malformed. Raised before any
    /// network call is made.
    #[error("{0}")]
    Validation(String),

    /// The archive path given on the command line does not exist.
    #[error("Archive not found: '{path}'\nCheck the path exists and is readable.")]
    ArchiveNotFound { path: PathBuf },

    /// The archive path exists but reading it failed (permissions, a
    /// directory, an I/O fault).
    #[error("Failed to read archive '{path}': {source}")]
    ArchiveReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Archive errors ────────────────────────────────────────────────────
    /// The archive could not be decompressed.
    #[error("Invalid ZIP archive: {detail}")]
    InvalidArchive { detail: String },

    /// The archive opened fine but holds no `.png`/`.jpg`/`.jpeg` entries.
    #[error("The ZIP archive contains no valid images (.png, .jpg, .jpeg)")]
    EmptyArchive,

    // ── Image errors ──────────────────────────────────────────────────────
    /// A source spread could not be decoded as a raster image.
    #[error("Could not decode image '{name}': {detail}")]
    Decode { name: String, detail: String },

    /// A cropped page could not be re-encoded.
    #[error("Could not encode page {page}: {detail}")]
    Encode { page: u32, detail: String },

    // ── API errors ────────────────────────────────────────────────────────
    /// The remote API call failed: transport error, non-2xx status, or an
    /// envelope with `success: false`. `message` is the server's own text
    /// when it sent one.
    #[error("{message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// The API rejected the bearer token (HTTP 401).
    #[error("Not authenticated: {detail}\nRequest a new login link with `edition-ingest login --email <EMAIL>`.")]
    Unauthorized { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a split page to disk.
    #[error("Failed to write page file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Convenience constructor for an API error without an HTTP status
    /// (transport failures, malformed bodies).
    pub(crate) fn api(message: impl Into<String>) -> Self {
        IngestError::Api {
            status: None,
            message: message.into(),
        }
    }

    /// `true` when the failure happened before anything was sent to the API.
    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_is_verbatim() {
        let e = IngestError::Api {
            status: Some(500),
            message: "Edition title already exists".into(),
        };
        assert_eq!(e.to_string(), "Edition title already exists");
    }

    #[test]
    fn empty_archive_mentions_extensions() {
        let msg = IngestError::EmptyArchive.to_string();
        assert!(msg.contains(".png"), "got: {msg}");
        assert!(msg.contains(".jpeg"), "got: {msg}");
    }

    #[test]
    fn decode_display() {
        let e = IngestError::Decode {
            name: "03.png".into(),
            detail: "unexpected EOF".into(),
        };
        assert!(e.to_string().contains("03.png"));
        assert!(e.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn unauthorized_hints_at_login() {
        let e = IngestError::Unauthorized {
            detail: "token expired".into(),
        };
        assert!(e.to_string().contains("token expired"));
        assert!(e.to_string().contains("login"));
    }

    #[test]
    fn only_validation_is_validation() {
        assert!(IngestError::Validation("x".into()).is_validation());
        assert!(!IngestError::EmptyArchive.is_validation());
        assert!(!IngestError::api("boom").is_validation());
    }
}
