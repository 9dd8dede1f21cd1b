//! Batch dispatch: bounded fan-out within a batch, strict order between batches.
//!
//! Files are cut into contiguous batches of at most `batch_size`. Each batch
//! runs through `buffer_unordered(concurrency)`, so at most `concurrency`
//! files are in flight, and the batch is fully drained before the next one
//! is started. Batch size therefore caps how much work is queued at once,
//! at the cost of idle workers while the slowest file of a batch finishes.
//!
//! Cancellation is checked between batches: a batch that has started always
//! completes, later batches are not started.

use crate::config::ClientConfig;
use crate::error_log::ErrorLog;
use crate::job::{Job, ProcessOptions};
use crate::output::{BatchStats, FileResult, RunStats};
use crate::pipeline::process::process_file;
use crate::pipeline::transport::Transport;
use futures::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a batch needs besides its files.
pub struct DispatchContext<'a, T> {
    pub config: &'a ClientConfig,
    pub transport: &'a T,
    pub output_dir: &'a Path,
    pub options: ProcessOptions,
    pub error_log: Option<&'a ErrorLog>,
    pub cancel: &'a CancellationToken,
}

/// Contiguous batches of at most `batch_size` files.
///
/// Zero files give zero batches; the last batch may be short.
pub fn partition(files: &[PathBuf], batch_size: usize) -> impl Iterator<Item = &[PathBuf]> {
    files.chunks(batch_size.max(1))
}

/// Number of batches [`partition`] produces for `total` files.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size.max(1))
}

/// Dispatch an already discovered, ordered file list.
pub async fn dispatch_files<T: Transport>(files: &[PathBuf], ctx: &DispatchContext<'_, T>) -> RunStats {
    let total_batches = batch_count(files.len(), ctx.config.batch_size);
    let mut run = RunStats::default();

    for (idx, batch) in partition(files, ctx.config.batch_size).enumerate() {
        if ctx.cancel.is_cancelled() {
            info!("Cancelled: {} of {} batches not started", total_batches - idx, total_batches);
            run.cancelled = true;
            break;
        }
        let stats = dispatch_batch(idx + 1, batch.to_vec(), ctx).await;
        run.absorb(&stats);
    }

    run
}

/// Dispatch files as a stream produces them, `batch_size` at a time.
pub async fn dispatch_stream<T, S>(files: S, ctx: &DispatchContext<'_, T>) -> RunStats
where
    T: Transport,
    S: Stream<Item = PathBuf>,
{
    let mut batches = std::pin::pin!(files.chunks(ctx.config.batch_size.max(1)));
    let mut run = RunStats::default();
    let mut batch_num = 0;

    while let Some(batch) = batches.next().await {
        if ctx.cancel.is_cancelled() {
            info!("Cancelled after {} batches", batch_num);
            run.cancelled = true;
            break;
        }
        batch_num += 1;
        let stats = dispatch_batch(batch_num, batch, ctx).await;
        run.absorb(&stats);
    }

    run
}

/// Run one batch to completion with at most `concurrency` files in flight.
async fn dispatch_batch<T: Transport>(
    batch_num: usize,
    files: Vec<PathBuf>,
    ctx: &DispatchContext<'_, T>,
) -> BatchStats {
    let cb = ctx.config.progress_callback.as_ref();
    info!("Batch {}: {} PDF files to process", batch_num, files.len());
    if let Some(cb) = cb {
        cb.on_batch_start(batch_num, files.len());
    }

    let log_errors = ctx.error_log.is_some();
    let results: Vec<FileResult> = stream::iter(files.into_iter().map(move |source| {
        let job = Job::new(source, ctx.output_dir, ctx.options, log_errors);
        async move {
            if let Some(cb) = cb {
                cb.on_file_start(&job.source);
            }
            let result = process_file(&job, ctx.transport, ctx.config, ctx.error_log).await;
            if let Some(cb) = cb {
                cb.on_file_complete(&result);
            }
            result
        }
    }))
    .buffer_unordered(ctx.config.concurrency.max(1))
    .collect()
    .await;

    let mut stats = BatchStats::new(batch_num);
    for result in &results {
        stats.record(&result.outcome);
    }
    debug!(
        "Batch {} done: {} written, {} skipped, {} failed",
        batch_num, stats.written, stats.skipped, stats.failed
    );
    if let Some(cb) = cb {
        cb.on_batch_complete(&stats);
    }
    stats
}
