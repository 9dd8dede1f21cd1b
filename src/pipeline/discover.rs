//! File discovery: list the PDFs directly inside the input directory.
//!
//! Matching mirrors a `*.pdf` shell glob on Unix: the suffix is
//! case-sensitive, hidden files are not matched, and subdirectories are
//! never entered.

use crate::error::GrobidError;
use futures::stream::{Stream, StreamExt};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, warn};

/// `true` if `name` would be matched by `*.pdf`.
///
/// Works on the raw name, so non-UTF-8 file names match too.
pub fn matches_pdf_pattern(name: impl AsRef<OsStr>) -> bool {
    let name = name.as_ref().as_encoded_bytes();
    !name.starts_with(b".") && name.ends_with(b".pdf")
}

/// List the matching regular files in `dir`, sorted lexicographically.
pub async fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, GrobidError> {
    let mut entries = open_dir(dir).await?;
    let mut files = Vec::new();

    loop {
        let entry = entries
            .next_entry()
            .await
            .map_err(|e| GrobidError::Discovery {
                path: dir.to_path_buf(),
                source: e,
            })?;
        let Some(entry) = entry else { break };
        let path = entry.path();
        if is_candidate(&path).await {
            files.push(path);
        }
    }

    files.sort();
    debug!("Discovered {} PDF files in {}", files.len(), dir.display());
    Ok(files)
}

/// Lazily stream matching files in directory order.
///
/// Nothing is buffered beyond the current entry; unreadable entries are
/// logged and skipped. Order is whatever the file system returns.
pub async fn discover_stream(
    dir: &Path,
) -> Result<impl Stream<Item = PathBuf> + Send + 'static, GrobidError> {
    let entries = open_dir(dir).await?;
    let dir = dir.to_path_buf();

    Ok(ReadDirStream::new(entries).filter_map(move |entry| {
        let dir = dir.clone();
        async move {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let keep = is_candidate(&path).await;
                    keep.then_some(path)
                }
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    None
                }
            }
        }
    }))
}

async fn open_dir(dir: &Path) -> Result<tokio::fs::ReadDir, GrobidError> {
    let meta = tokio::fs::metadata(dir).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GrobidError::DirectoryNotFound {
                path: dir.to_path_buf(),
            }
        } else {
            GrobidError::Discovery {
                path: dir.to_path_buf(),
                source: e,
            }
        }
    })?;
    if !meta.is_dir() {
        return Err(GrobidError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    tokio::fs::read_dir(dir)
        .await
        .map_err(|e| GrobidError::Discovery {
            path: dir.to_path_buf(),
            source: e,
        })
}

async fn is_candidate(path: &Path) -> bool {
    let name_matches = path.file_name().is_some_and(matches_pdf_pattern);
    if !name_matches {
        return false;
    }
    // Follows symlinks, like the glob does.
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
