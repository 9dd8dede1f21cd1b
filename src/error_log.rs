//! Append-only log of files that could not be processed.
//!
//! One line per failed file:
//!
//! ```text
//! WARNING:grobid_client:Failed to process in/a.pdf with status 404
//! WARNING:grobid_client:Failed to process in/b.pdf: request failed: ...
//! ```

use crate::error::{FileError, GrobidError};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared writer for the error log.
///
/// Workers of a batch append concurrently; the mutex keeps lines whole.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ErrorLog {
    /// Open (or create) the log for appending.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, GrobidError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| GrobidError::ErrorLogFailed {
                path: path.clone(),
                source: e,
            })?;
        debug!("Error log: {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry for `error`.
    ///
    /// A failing write is reported on the console and otherwise ignored.
    pub async fn record(&self, error: &FileError) {
        let line = format_entry(error);
        let mut file = self.file.lock().await;
        let mut written = file.write_all(line.as_bytes()).await;
        if written.is_ok() {
            written = file.flush().await;
        }
        if let Err(e) = written {
            warn!("Could not append to {}: {}", self.path.display(), e);
        }
    }
}

fn format_entry(error: &FileError) -> String {
    let path = error.path().display();
    match error.status() {
        Some(status) => {
            format!("WARNING:grobid_client:Failed to process {path} with status {status}\n")
        }
        None => format!("WARNING:grobid_client:Failed to process {path}: {error}\n"),
    }
}
