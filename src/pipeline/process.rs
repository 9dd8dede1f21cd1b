//! Single-file processing: skip, submit, retry on overload, persist.
//!
//! ## Steps
//!
//! 1. Compute `{output_dir}/{stem}.tei.xml`.
//! 2. If that file already exists, stop with [`FileOutcome::Skipped`]; no
//!    request is sent.
//! 3. Read the PDF and build the multipart request (`input` part plus the
//!    enabled option fields).
//! 4. POST it through the [`Transport`].
//! 5. Interpret the status:
//!    - `200` → write the body through a temp file that is renamed into
//!      place without clobbering, so a half-written file never carries the
//!      final name.
//!    - `503` → sleep and go back to step 1. The first pause is
//!      `sleep_time`, each further pause doubles; after `max_retries`
//!      retries the file fails.
//!    - anything else → the file fails.
//!
//! Failures are terminal for the file only: they are logged with `warn!`,
//! appended to the error log when enabled, and returned as a value.

use crate::config::ClientConfig;
use crate::error::FileError;
use crate::error_log::ErrorLog;
use crate::job::Job;
use crate::output::{FileOutcome, FileResult};
use crate::pipeline::transport::{MultipartRequest, Transport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, warn};

const STATUS_OK: u16 = 200;
const STATUS_OVERLOADED: u16 = 503;

/// Run one job to its terminal outcome.
///
/// Never returns an error: every failure becomes [`FileOutcome::Failed`].
pub async fn process_file<T: Transport>(
    job: &Job,
    transport: &T,
    config: &ClientConfig,
    error_log: Option<&ErrorLog>,
) -> FileResult {
    let start = Instant::now();
    let output_path = job.output_path();
    let url = config.service_url(job.options.service);
    let mut attempts: u32 = 0;

    let outcome = loop {
        if is_regular_file(&output_path).await {
            debug!(
                "{}: output {} already exists, skipping",
                job.source.display(),
                output_path.display()
            );
            break FileOutcome::Skipped(output_path.clone());
        }

        let bytes = match tokio::fs::read(&job.source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                break FileOutcome::Failed(FileError::ReadFailed {
                    path: job.source.clone(),
                    detail: e.to_string(),
                })
            }
        };

        attempts += 1;
        debug!("{}: attempt {} → {}", job.source.display(), attempts, url);
        let response = match transport.post_multipart(build_request(job, &url, bytes)).await {
            Ok(response) => response,
            Err(e) => {
                break FileOutcome::Failed(FileError::Transport {
                    path: job.source.clone(),
                    detail: e.to_string(),
                })
            }
        };

        match response.status {
            STATUS_OK => break write_output(&job.source, &output_path, response.body).await,
            STATUS_OVERLOADED => {
                // `attempts` requests have hit 503, so this would be retry number `attempts`.
                if attempts > config.max_retries {
                    break FileOutcome::Failed(FileError::OverloadRetriesExhausted {
                        path: job.source.clone(),
                        retries: config.max_retries,
                    });
                }
                let pause = config.overload_backoff(attempts);
                warn!(
                    "{}: service overloaded (503), retry {}/{} in {:.1}s",
                    job.source.display(),
                    attempts,
                    config.max_retries,
                    pause.as_secs_f64()
                );
                sleep(pause).await;
            }
            status => {
                break FileOutcome::Failed(FileError::RemoteFailure {
                    path: job.source.clone(),
                    status,
                })
            }
        }
    };

    if let FileOutcome::Failed(ref e) = outcome {
        report_failure(job, e, error_log).await;
    }

    FileResult {
        source: job.source.clone(),
        outcome,
        attempts,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Build the GROBID request for `job`.
pub fn build_request(job: &Job, url: &str, bytes: Vec<u8>) -> MultipartRequest {
    MultipartRequest {
        url: url.to_string(),
        file_field: "input",
        file_name: job.file_name(),
        content_type: "application/pdf",
        bytes,
        fields: job.options.form_fields(),
        accept: "text/plain",
    }
}

async fn report_failure(job: &Job, error: &FileError, error_log: Option<&ErrorLog>) {
    match error.status() {
        Some(status) => warn!("Processing failed with error {}: {}", status, job.source.display()),
        None => warn!("Processing failed: {}", error),
    }
    if job.log_errors {
        if let Some(log) = error_log {
            log.record(error).await;
        }
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn write_output(source: &Path, output_path: &Path, body: String) -> FileOutcome {
    let target = output_path.to_path_buf();
    let persisted = tokio::task::spawn_blocking(move || persist_new(&target, body.as_bytes())).await;

    match persisted {
        Ok(Ok(true)) => {
            debug!("{} → {}", source.display(), output_path.display());
            FileOutcome::Written(output_path.to_path_buf())
        }
        Ok(Ok(false)) => {
            debug!("{}: output appeared concurrently, keeping it", output_path.display());
            FileOutcome::Skipped(output_path.to_path_buf())
        }
        Ok(Err(e)) => FileOutcome::Failed(FileError::WriteFailed {
            path: source.to_path_buf(),
            detail: format!("{}: {}", output_path.display(), e),
        }),
        Err(e) => FileOutcome::Failed(FileError::WriteFailed {
            path: source.to_path_buf(),
            detail: format!("writer task failed: {e}"),
        }),
    }
}

/// Write `contents` next to `target` and move it into place.
///
/// Returns `Ok(false)` if `target` already exists; it is never replaced.
fn persist_new(target: &Path, contents: &[u8]) -> std::io::Result<bool> {
    let dir: PathBuf = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".grobid-")
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;

    match tmp.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
