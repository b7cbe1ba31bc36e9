//! Error types for the edgequake-docstage library.
//!
//! Two tiers of errors reflect two distinct failure modes:
//!
//! * [`DocStageError`] — **Fatal**: the batch cannot start at all (invalid
//!   configuration, no LLM provider, unreadable input path). Returned as
//!   `Err(DocStageError)` from the top-level `run_batch*` functions.
//!
//! * Everything else is **non-fatal** and stored inside the results:
//!   - [`ExtractionError`] fails one document (no stage runs for it),
//!   - [`CompletionError`] and [`WriteError`] fail one stage of one document,
//!     wrapped in [`StageError`] (as is a panic inside a stage),
//!   - [`DocumentError`] is what a document-level failure looks like in a
//!     [`crate::output::DocumentResult`].
//!
//! Non-fatal errors are `Clone + Serialize` so a finished
//! [`crate::output::BatchResult`] can be cloned, logged, or written as JSON
//! without losing the failure reasons.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docstage library.
#[derive(Debug, Error)]
pub enum DocStageError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The processing request is inconsistent (e.g. no stage enabled).
    #[error("Invalid processing request: {0}")]
    InvalidRequest(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Text extraction failed; the document is skipped entirely.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExtractionError {
    /// The document has no bytes, or no text could be found in it.
    #[error("document contains no extractable text")]
    Empty,

    /// The bytes do not start with the `%PDF` magic.
    #[error("not a PDF document (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The PDF engine rejected the document.
    #[error("malformed document: {detail}")]
    Malformed { detail: String },

    /// The PDF engine could not be loaded.
    #[error("PDF engine unavailable: {detail}")]
    EngineUnavailable { detail: String },
}

/// A completion request failed or produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CompletionError {
    /// The provider returned an error after all retries.
    #[error("LLM call failed after {retries} retries: {detail}")]
    Api { retries: u32, detail: String },

    /// The provider answered HTTP 429 on every attempt.
    #[error("rate limit exceeded after {retries} retries")]
    RateLimited { retries: u32 },

    /// The call did not finish within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered but the text was blank.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Persisting an artifact failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WriteError {
    #[error("failed to write artifact '{path}': {detail}")]
    Io { path: PathBuf, detail: String },
}

/// Why one stage of one document failed. Sibling stages are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StageError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Write(#[from] WriteError),

    /// A collaborator panicked while running this stage.
    #[error("stage panicked: {detail}")]
    Internal { detail: String },
}

/// Why a whole document produced no stage outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DocumentError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The worker processing this document crashed outside the stage
    /// runner's own error handling.
    #[error("internal worker failure: {detail}")]
    Internal { detail: String },

    /// The batch was cancelled before this document was started.
    #[error("cancelled before processing started")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_is_transparent() {
        let e = StageError::from(CompletionError::RateLimited { retries: 3 });
        assert_eq!(e.to_string(), "rate limit exceeded after 3 retries");
    }

    #[test]
    fn extraction_error_display_in_document_error() {
        let e = DocumentError::from(ExtractionError::NotAPdf {
            magic: b"PK\x03\x04".to_vec(),
        });
        let msg = e.to_string();
        assert!(msg.starts_with("extraction failed"), "got: {msg}");
        assert!(msg.contains("not a PDF"), "got: {msg}");
    }

    #[test]
    fn write_error_names_path() {
        let e = WriteError::Io {
            path: PathBuf::from("/out/report_summary.md"),
            detail: "disk full".into(),
        };
        assert!(e.to_string().contains("report_summary.md"));
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn non_fatal_errors_serialize() {
        let e = StageError::Completion(CompletionError::Timeout { secs: 30 });
        let json = serde_json::to_string(&e).unwrap();
        let back: StageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn invalid_config_display() {
        let e = DocStageError::InvalidConfig("workers must be ≥ 1".into());
        assert!(e.to_string().contains("workers"));
    }
}
