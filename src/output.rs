//! Per-file outcomes and run statistics.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Terminal outcome of one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileOutcome {
    /// TEI written to this path.
    Written(PathBuf),
    /// Output already existed at this path; nothing was sent.
    Skipped(PathBuf),
    /// Processing failed; sibling files are unaffected.
    Failed(FileError),
}

impl FileOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, FileOutcome::Written(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FileOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed(_))
    }
}

/// Result of processing one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub source: PathBuf,
    pub outcome: FileOutcome,
    /// HTTP requests sent for this file (0 when skipped).
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// 1-indexed batch number.
    pub batch: usize,
    pub files: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn new(batch: usize) -> Self {
        Self {
            batch,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        self.files += 1;
        match outcome {
            FileOutcome::Written(_) => self.written += 1,
            FileOutcome::Skipped(_) => self.skipped += 1,
            FileOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_files: usize,
    pub batches: usize,
    /// Size of each batch, in dispatch order.
    pub batch_sizes: Vec<usize>,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u64,
    /// The run stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl RunStats {
    pub fn absorb(&mut self, batch: &BatchStats) {
        self.batches += 1;
        self.batch_sizes.push(batch.files);
        self.total_files += batch.files;
        self.written += batch.written;
        self.skipped += batch.skipped;
        self.failed += batch.failed;
    }
}
