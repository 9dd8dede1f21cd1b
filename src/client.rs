//! Eager (whole-directory) run entry points.
//!
//! [`GrobidClient::process`] lists the input directory up front, sorts it,
//! and feeds the list through the batch dispatcher. Use
//! [`GrobidClient::process_stream`](crate::stream) when the directory is too
//! large to list in memory.

use crate::config::ClientConfig;
use crate::error::GrobidError;
use crate::error_log::ErrorLog;
use crate::job::ProcessOptions;
use crate::output::RunStats;
use crate::pipeline::discover;
use crate::pipeline::dispatch::{self, DispatchContext};
use crate::pipeline::transport::{HttpTransport, Transport};
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Batch client bound to one configuration and one transport.
#[derive(Debug)]
pub struct GrobidClient<T = HttpTransport> {
    pub(crate) config: ClientConfig,
    pub(crate) transport: T,
}

impl GrobidClient<HttpTransport> {
    /// Client talking HTTP to the server named in `config`.
    pub fn new(config: ClientConfig) -> Result<Self, GrobidError> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self { config, transport })
    }
}

impl<T: Transport> GrobidClient<T> {
    /// Client using a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Process every `*.pdf` in `input_dir`, writing TEI into `output_dir`.
    ///
    /// # Returns
    /// `Ok(RunStats)` once every batch has drained, even if some files
    /// failed (check `stats.failed`).
    ///
    /// # Errors
    /// Only for problems that stop the run before any file is sent:
    /// - input directory missing or unreadable
    /// - output directory cannot be created
    /// - error log cannot be opened
    pub async fn process(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        options: ProcessOptions,
    ) -> Result<RunStats, GrobidError> {
        self.process_with_cancel(input_dir, output_dir, options, CancellationToken::new())
            .await
    }

    /// Like [`process`](Self::process), stopping before the next batch once
    /// `cancel` fires. The batch in progress always completes.
    pub async fn process_with_cancel(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        options: ProcessOptions,
        cancel: CancellationToken,
    ) -> Result<RunStats, GrobidError> {
        let start = Instant::now();
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();
        info!(
            "Starting run: {} → {} ({})",
            input_dir.display(),
            output_dir.display(),
            options.service
        );

        // ── Step 1: Discover inputs ──────────────────────────────────────
        let files = discover::discover_pdfs(input_dir).await?;
        info!(
            "{} PDF files in {} batches (batch size {}, concurrency {})",
            files.len(),
            dispatch::batch_count(files.len(), self.config.batch_size),
            self.config.batch_size,
            self.config.concurrency
        );

        // ── Step 2: Prepare output and error log ─────────────────────────
        let error_log = self.prepare(output_dir).await?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(Some(files.len()));
        }

        // ── Step 3: Dispatch batches ─────────────────────────────────────
        let ctx = DispatchContext {
            config: &self.config,
            transport: &self.transport,
            output_dir,
            options,
            error_log: error_log.as_ref(),
            cancel: &cancel,
        };
        let stats = dispatch::dispatch_files(&files, &ctx).await;

        Ok(self.finish(stats, start))
    }

    /// Create the output directory and open the error log if enabled.
    pub(crate) async fn prepare(&self, output_dir: &Path) -> Result<Option<ErrorLog>, GrobidError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| GrobidError::OutputDirFailed {
                path: output_dir.to_path_buf(),
                source: e,
            })?;

        match self.config.error_log {
            Some(ref path) => {
                let log = ErrorLog::open(path).await?;
                info!("Recording failed files in {}", log.path().display());
                Ok(Some(log))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn finish(&self, mut stats: RunStats, start: Instant) -> RunStats {
        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Run complete: {} written, {} skipped, {} failed in {}ms",
            stats.written, stats.skipped, stats.failed, stats.duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(&stats);
        }
        stats
    }
}

/// Synchronous wrapper around [`GrobidClient::process`] over HTTP.
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    config: ClientConfig,
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: ProcessOptions,
) -> Result<RunStats, GrobidError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| GrobidError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(async {
            let client = GrobidClient::new(config)?;
            client.process(input_dir, output_dir, options).await
        })
}
