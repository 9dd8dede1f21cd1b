//! Progress-callback trait for run, batch and file events.
//!
//! Inject an [`Arc<dyn ProcessProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to receive
//! events as the dispatcher works through the input directory.
//!
//! # Example
//!
//! ```rust
//! use grobid_client::{ClientConfig, FileResult, ProcessProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ProcessProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, result: &FileResult) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {}", result.source.display());
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = ClientConfig::builder()
//!     .progress_callback(cb as Arc<dyn ProcessProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchStats, FileResult, RunStats};
use std::path::Path;
use std::sync::Arc;

/// Called by the dispatcher as it processes each batch and file.
///
/// Implementations must be `Send + Sync`: file events of one batch arrive
/// concurrently and in no particular order. All methods default to no-ops.
pub trait ProcessProgressCallback: Send + Sync {
    /// Called once before the first batch.
    ///
    /// `total_files` is `None` when files are discovered lazily.
    fn on_run_start(&self, total_files: Option<usize>) {
        let _ = total_files;
    }

    /// Called before a batch is dispatched (`batch` is 1-indexed).
    fn on_batch_start(&self, batch: usize, files: usize) {
        let _ = (batch, files);
    }

    /// Called just before a file is checked and submitted.
    fn on_file_start(&self, source: &Path) {
        let _ = source;
    }

    /// Called when a file reaches its terminal outcome.
    fn on_file_complete(&self, result: &FileResult) {
        let _ = result;
    }

    /// Called after every file of a batch has resolved.
    fn on_batch_complete(&self, stats: &BatchStats) {
        let _ = stats;
    }

    /// Called once after the last batch (or after cancellation).
    fn on_run_complete(&self, stats: &RunStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn ProcessProgressCallback>;
