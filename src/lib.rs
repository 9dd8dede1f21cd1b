//! # grobid-client
//!
//! Batch client for [GROBID](https://github.com/kermitt2/grobid): submit a
//! directory of PDFs to a GROBID server and write one TEI XML file per PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input dir
//!  │
//!  ├─ 1. Discover  *.pdf directly inside the directory (sorted)
//!  ├─ 2. Batch     contiguous groups of `batch_size`
//!  ├─ 3. Dispatch  ≤ `concurrency` files in flight; batch drains before the next
//!  ├─ 4. Process   skip if {stem}.tei.xml exists → POST /api/{service}
//!  │               503 → wait and retry (bounded, exponential)
//!  └─ 5. Persist   temp file + no-clobber rename into the output directory
//! ```
//!
//! Re-running over the same directories is idempotent: a file whose output
//! exists is skipped without contacting the server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grobid_client::{ClientConfig, GrobidClient, ProcessOptions, Service};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_file("./config.json")?
//!         .concurrency(10)
//!         .build()?;
//!     let client = GrobidClient::new(config)?;
//!
//!     let mut options = ProcessOptions::new(Service::FulltextDocument);
//!     options.consolidate_header = true;
//!
//!     let stats = client.process("./pdfs", "./tei", options).await?;
//!     eprintln!("{} written, {} skipped, {} failed",
//!         stats.written, stats.skipped, stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `grobid-client` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod error_log;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{process_sync, GrobidClient};
pub use config::{
    parse_concurrency, ClientConfig, ClientConfigBuilder, ConfigFile, DEFAULT_CONCURRENCY,
    DEFAULT_CONFIG_PATH, DEFAULT_ERROR_LOG,
};
pub use error::{FileError, GrobidError, TransportError};
pub use error_log::ErrorLog;
pub use job::{Job, ProcessOptions, Service};
pub use output::{BatchStats, FileOutcome, FileResult, RunStats};
pub use pipeline::transport::{HttpTransport, MultipartRequest, Transport, TransportResponse};
pub use progress::{NoopProgressCallback, ProcessProgressCallback, ProgressCallback};
pub use tokio_util::sync::CancellationToken;
