//! CLI binary for grobid-client.
//!
//! A thin shim over the library crate that maps CLI flags and the JSON
//! config file to `ClientConfig` and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use grobid_client::{
    parse_concurrency, BatchStats, CancellationToken, ClientConfig, FileOutcome, FileResult,
    GrobidClient, ProcessOptions, ProcessProgressCallback, ProgressCallback, RunStats, Service,
    DEFAULT_CONFIG_PATH, DEFAULT_ERROR_LOG,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: one bar for the whole run plus a log line
/// per finished file. Files of a batch finish in any order.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Listing input directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: Option<usize>) {
        let template = match total {
            Some(_) => {
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>4}/{len} PDFs  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}"
            }
            None => "{spinner:.cyan} {prefix:.bold}  {pos} PDFs  ⏱ {elapsed_precise}  {msg}",
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        if let Some(total) = total {
            self.bar.set_length(total as u64);
        }
        self.bar.set_style(style);
        self.bar.set_prefix("Processing");
        self.bar.reset_eta();
    }
}

impl ProcessProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: Option<usize>) {
        self.activate_bar(total_files);
        if let Some(total) = total_files {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("{total} PDF files to process"))
            ));
        }
    }

    fn on_batch_start(&self, batch: usize, files: usize) {
        self.bar
            .println(format!("{} batch {batch}: {files} PDF files", dim("▸")));
    }

    fn on_file_start(&self, source: &Path) {
        self.bar.set_message(short_name(source));
    }

    fn on_file_complete(&self, result: &FileResult) {
        let name = short_name(&result.source);
        let elapsed = dim(&format!("{:.1}s", result.duration_ms as f64 / 1000.0));
        let line = match &result.outcome {
            FileOutcome::Written(_) => format!("  {} {name}  {elapsed}", green("✓")),
            FileOutcome::Skipped(_) => format!("  {} {name}  {}", dim("="), dim("already processed")),
            FileOutcome::Failed(e) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                let msg = match e.status() {
                    Some(status) => format!("Processing failed with error {status}"),
                    None => e.to_string(),
                };
                let msg = if msg.chars().count() > 80 {
                    format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
                } else {
                    msg
                };
                format!("  {} {name}  {}  {elapsed}", red("✗"), red(&msg))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, stats: &BatchStats) {
        self.bar.println(format!(
            "{} batch {} done: {} written, {} skipped, {} failed",
            dim("▪"),
            stats.batch,
            stats.written,
            stats.skipped,
            stats.failed
        ));
    }

    fn on_run_complete(&self, stats: &RunStats) {
        self.bar.finish_and_clear();
        let failed = self.failed.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} written, {} skipped",
                green("✔"),
                bold(&stats.written.to_string()),
                stats.skipped
            );
        } else {
            eprintln!(
                "{} {} written, {} skipped  ({} failed)",
                if stats.written == 0 && stats.skipped == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&stats.written.to_string()),
                stats.skipped,
                red(&failed.to_string()),
            );
        }
    }
}

fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full text, 20 concurrent requests
  grobid-client processFulltextDocument --input ./pdfs --output ./tei --n 20

  # Header only, consolidated, failures recorded in errors.log
  grobid-client processHeaderDocument --input ./pdfs --output ./tei \
      --consolidate_header --error-log

  # Very large directory: read entries lazily instead of listing up front
  grobid-client processReferences --input ./pdfs --output ./tei --stream

CONFIG FILE (default ./config.json):
  {
      "grobid_server": "localhost",
      "grobid_port": "8070",
      "batch_size": 1000,
      "sleep_time": 5
  }
  Optional keys: "max_retries" (503 retries per file, default 10),
                 "timeout" (seconds per request, default 180).

Re-running is safe: PDFs whose .tei.xml already exists are skipped.
"#;

/// Client for GROBID services.
#[derive(Parser, Debug)]
#[command(
    name = "grobid-client",
    version,
    about = "Send a directory of PDFs to a GROBID server and collect TEI XML",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// GROBID service to call.
    #[arg(value_enum)]
    service: ServiceArg,

    /// Directory containing the PDFs to process.
    #[arg(long, env = "GROBID_INPUT")]
    input: PathBuf,

    /// Directory receiving the TEI files. Defaults to the input directory.
    #[arg(long, env = "GROBID_OUTPUT")]
    output: Option<PathBuf>,

    /// Path to the JSON config file.
    #[arg(long, env = "GROBID_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Concurrency for service usage (positive integer; invalid values fall back to 10).
    #[arg(long = "n", default_value = "10", allow_hyphen_values = true)]
    n: String,

    /// Generate random xml:id to textual XML elements of the result files.
    #[arg(long = "generateIDs")]
    generate_ids: bool,

    /// Consolidate the metadata extracted from the header.
    #[arg(long = "consolidate_header")]
    consolidate_header: bool,

    /// Consolidate the extracted bibliographical references.
    #[arg(long = "consolidate_citations")]
    consolidate_citations: bool,

    /// Append every PDF that cannot be processed to errors.log.
    #[arg(long = "error-log")]
    error_log: bool,

    /// Read the input directory lazily (file-system order) instead of listing it up front.
    #[arg(long)]
    stream: bool,

    /// Print the run statistics as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "GROBID_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ServiceArg {
    #[value(name = "processFulltextDocument")]
    ProcessFulltextDocument,
    #[value(name = "processHeaderDocument")]
    ProcessHeaderDocument,
    #[value(name = "processReferences")]
    ProcessReferences,
}

impl From<ServiceArg> for Service {
    fn from(v: ServiceArg) -> Self {
        match v {
            ServiceArg::ProcessFulltextDocument => Service::FulltextDocument,
            ServiceArg::ProcessHeaderDocument => Service::HeaderDocument,
            ServiceArg::ProcessReferences => Service::References,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries per-file feedback, so library INFO logs are
    // muted while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let start = Instant::now();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ProcessProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let mut options = ProcessOptions::new(cli.service.into());
    options.generate_ids = cli.generate_ids;
    options.consolidate_header = cli.consolidate_header;
    options.consolidate_citations = cli.consolidate_citations;

    let output = cli.output.clone().unwrap_or_else(|| cli.input.clone());
    let client = GrobidClient::new(config).context("Failed to initialise HTTP client")?;

    // ── Cancellation on Ctrl-C ───────────────────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted: finishing the current batch, then stopping…");
                cancel.cancel();
            }
        });
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let stats = if cli.stream {
        client
            .process_stream(&cli.input, &output, options, cancel)
            .await
    } else {
        client
            .process_with_cancel(&cli.input, &output, options, cancel)
            .await
    }
    .context("Run aborted")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&stats).context("Failed to serialise run statistics")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        eprintln!(
            "{} written, {} skipped, {} failed in {} batches",
            stats.written, stats.skipped, stats.failed, stats.batches
        );
    }
    if stats.cancelled && !cli.quiet {
        eprintln!("{}", red("Run cancelled before all batches were processed"));
    }

    let runtime = start.elapsed().as_secs_f64();
    write_runtime(runtime, cli.json, &mut io::stdout(), &mut io::stderr())
        .context("Failed to print runtime")?;

    Ok(())
}

/// Print the runtime line. With `--json` stdout carries only the JSON
/// document, so the line goes to stderr.
fn write_runtime(
    secs: f64,
    json: bool,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> io::Result<()> {
    let out: &mut dyn Write = if json { stderr } else { stdout };
    writeln!(out, "runtime: {secs:.3} seconds")
}

/// Merge the config file with the CLI flags.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let concurrency = match parse_concurrency(&cli.n) {
        Ok(n) => n,
        Err(fallback) => {
            warn!(
                "Invalid concurrency parameter n: {:?}, n = {} will be used by default",
                cli.n, fallback
            );
            if !cli.quiet {
                eprintln!(
                    "Invalid concurrency parameter n: {}, n = {} will be used by default",
                    cli.n, fallback
                );
            }
            fallback
        }
    };

    let mut builder = ClientConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?
        .concurrency(concurrency);

    if cli.error_log {
        builder = builder.error_log(DEFAULT_ERROR_LOG);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
