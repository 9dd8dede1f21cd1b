//! Error types for the grobid-client library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`GrobidError`]: **Fatal**: the run cannot start at all (bad input
//!   directory, unreadable config, invalid settings). Returned as
//!   `Err(GrobidError)` from the top-level `process*` functions.
//!
//! * [`FileError`]: **Non-fatal**: a single PDF failed (service error,
//!   overload that never cleared, unreadable source) but every other file
//!   is unaffected. Stored inside [`crate::output::FileOutcome::Failed`].
//!
//! * [`TransportError`]: network-level failure of one HTTP request. The
//!   processor folds it into [`FileError::Transport`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the grobid-client library.
///
/// Per-file failures use [`FileError`] and never surface here.
#[derive(Debug, Error)]
pub enum GrobidError {
    // ── Discovery errors ──────────────────────────────────────────────────
    /// Input directory does not exist.
    #[error("Input directory not found: '{path}'\nCheck the --input path.")]
    DirectoryNotFound { path: PathBuf },

    /// Input path exists but is not a directory.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Input directory could not be listed.
    #[error("Failed to read input directory '{path}': {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Config file is missing or unreadable.
    #[error("Failed to read config file '{path}': {source}\nPass --config <PATH> to point at a valid file.")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON or lacks a required key.
    #[error("Malformed config file '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error log could not be opened for appending.
    #[error("Failed to open error log '{path}': {source}")]
    ErrorLogFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input file.
///
/// The batch keeps going; the failure is reported through the progress
/// callback, a `warn!` line and, when enabled, the error log.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum FileError {
    /// The HTTP request itself failed (connection refused, timeout, DNS).
    #[error("{path:?}: request failed: {detail}")]
    Transport { path: PathBuf, detail: String },

    /// The service answered with a non-200, non-503 status.
    #[error("{path:?}: processing failed with status {status}")]
    RemoteFailure { path: PathBuf, status: u16 },

    /// The service kept answering 503 after every retry.
    #[error("{path:?}: service still overloaded after {retries} retries")]
    OverloadRetriesExhausted { path: PathBuf, retries: u32 },

    /// The source PDF could not be read.
    #[error("{path:?}: failed to read source: {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    /// The TEI output could not be written.
    #[error("{path:?}: failed to write output: {detail}")]
    WriteFailed { path: PathBuf, detail: String },
}

impl FileError {
    /// Source file this error belongs to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            FileError::Transport { path, .. }
            | FileError::RemoteFailure { path, .. }
            | FileError::OverloadRetriesExhausted { path, .. }
            | FileError::ReadFailed { path, .. }
            | FileError::WriteFailed { path, .. } => path,
        }
    }

    /// HTTP status associated with the failure, if the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            FileError::RemoteFailure { status, .. } => Some(*status),
            FileError::OverloadRetriesExhausted { .. } => Some(503),
            _ => None,
        }
    }
}

/// Network-level failure of a single multipart POST.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection could not be established (refused, DNS failure).
    #[error("connection to '{url}' failed: {detail}")]
    Connect { url: String, detail: String },

    /// No response within the configured per-request timeout.
    #[error("request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Request could not be built or sent.
    #[error("request to '{url}' failed: {detail}")]
    Request { url: String, detail: String },

    /// Response arrived but its body could not be read as text.
    #[error("failed to read response body from '{url}': {detail}")]
    Body { url: String, detail: String },
}
