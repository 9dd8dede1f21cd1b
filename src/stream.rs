//! Lazy run: batches are pulled from a directory stream as they fill.
//!
//! The eager [`GrobidClient::process`] lists and sorts the whole directory
//! before the first request. [`GrobidClient::process_stream`] instead reads
//! directory entries on demand, so memory is bounded by `batch_size` rather
//! than by the number of files. Files are visited in file-system order.

use crate::client::GrobidClient;
use crate::error::GrobidError;
use crate::job::ProcessOptions;
use crate::output::RunStats;
use crate::pipeline::discover;
use crate::pipeline::dispatch::{self, DispatchContext};
use crate::pipeline::transport::Transport;
use futures::stream::Stream;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

impl<T: Transport> GrobidClient<T> {
    /// Process `input_dir` without listing it up front.
    ///
    /// Same batching, retry and idempotence guarantees as
    /// [`process`](GrobidClient::process).
    pub async fn process_stream(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        options: ProcessOptions,
        cancel: CancellationToken,
    ) -> Result<RunStats, GrobidError> {
        let files = discover::discover_stream(input_dir.as_ref()).await?;
        self.process_paths(files, output_dir, options, cancel).await
    }

    /// Process paths from any producer, `batch_size` at a time.
    pub async fn process_paths<S>(
        &self,
        files: S,
        output_dir: impl AsRef<Path>,
        options: ProcessOptions,
        cancel: CancellationToken,
    ) -> Result<RunStats, GrobidError>
    where
        S: Stream<Item = PathBuf>,
    {
        let start = Instant::now();
        let output_dir = output_dir.as_ref();
        info!(
            "Starting streaming run → {} ({})",
            output_dir.display(),
            options.service
        );

        let error_log = self.prepare(output_dir).await?;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(None);
        }

        let ctx = DispatchContext {
            config: &self.config,
            transport: &self.transport,
            output_dir,
            options,
            error_log: error_log.as_ref(),
            cancel: &cancel,
        };
        let stats = dispatch::dispatch_stream(files, &ctx).await;

        Ok(self.finish(stats, start))
    }
}
