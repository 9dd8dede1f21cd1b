//! Integration tests for the batch pipeline.
//!
//! A scripted in-memory [`Transport`] stands in for the GROBID server, so
//! these tests exercise discovery, batching, retry and persistence without
//! network access. All assertions are made on the output directory, the
//! error log and the transport's own counters.

use grobid_client::{
    BatchStats, CancellationToken, ClientConfig, FileResult, GrobidClient, GrobidError,
    MultipartRequest, ProcessOptions, ProcessProgressCallback, Service, Transport,
    TransportError, TransportResponse,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Reply {
    Status(u16),
    Refused,
}

/// Fake GROBID: answers 200 unless a file has scripted replies queued.
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    attempts: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<MultipartRequest>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl ScriptedTransport {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn script(self, file_name: &str, replies: &[Reply]) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(file_name.to_string(), replies.iter().copied().collect());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn tei_body(file_name: &str, attempt: u32) -> String {
    format!("<TEI xmlns=\"http://www.tei-c.org/ns/1.0\"><!-- {file_name} attempt {attempt} --></TEI>\n")
}

impl Transport for ScriptedTransport {
    fn post_multipart(
        &self,
        request: MultipartRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let n = attempts.entry(request.file_name.clone()).or_insert(0);
                *n += 1;
                *n
            };
            let reply = self
                .script
                .lock()
                .unwrap()
                .get_mut(&request.file_name)
                .and_then(|q| q.pop_front())
                .unwrap_or(Reply::Status(200));

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let file_name = request.file_name.clone();
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);

            match reply {
                Reply::Refused => Err(TransportError::Connect {
                    url,
                    detail: "connection refused".into(),
                }),
                Reply::Status(200) => Ok(TransportResponse {
                    status: 200,
                    body: tei_body(&file_name, attempt),
                }),
                Reply::Status(status) => Ok(TransportResponse {
                    status,
                    body: format!("error {status}"),
                }),
            }
        }
    }
}

fn config(batch_size: usize, concurrency: usize) -> grobid_client::ClientConfigBuilder {
    ClientConfig::builder()
        .server("grobid.test")
        .port("8070")
        .batch_size(batch_size)
        .concurrency(concurrency)
        .sleep_time_secs(0.01)
        .max_retries(3)
}

/// Create `names` as tiny PDFs in a fresh input directory.
fn input_dir(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), b"%PDF-1.4\n%%EOF\n").unwrap();
    }
    dir
}

fn tei_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".tei.xml"))
        .collect();
    names.sort();
    names
}

fn snapshot(dir: &Path) -> Vec<(String, String)> {
    tei_files(dir)
        .into_iter()
        .map(|n| {
            let content = std::fs::read_to_string(dir.join(&n)).unwrap();
            (n, content)
        })
        .collect()
}

fn fulltext() -> ProcessOptions {
    ProcessOptions::new(Service::FulltextDocument)
}

/// Records the order of batch and file events.
#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
    cancel_on_batch: Option<(usize, CancellationToken)>,
}

impl ProcessProgressCallback for EventLog {
    fn on_batch_start(&self, batch: usize, files: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("batch-start {batch} {files}"));
        if let Some((n, ref token)) = self.cancel_on_batch {
            if n == batch {
                token.cancel();
            }
        }
    }

    fn on_file_complete(&self, result: &FileResult) {
        let name = result.source.file_name().unwrap().to_string_lossy().into_owned();
        self.events.lock().unwrap().push(format!("file {name}"));
    }

    fn on_batch_complete(&self, stats: &BatchStats) {
        self.events
            .lock()
            .unwrap()
            .push(format!("batch-end {}", stats.batch));
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_pdfs_in_two_batches() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let client = GrobidClient::with_transport(
        config(2, 2).build().unwrap(),
        ScriptedTransport::default(),
    );

    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!(stats.batches, 2);
    assert_eq!(stats.batch_sizes, vec![2, 1]);
    assert_eq!(stats.written, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(
        tei_files(output.path()),
        vec!["a.tei.xml", "b.tei.xml", "c.tei.xml"]
    );
    assert_eq!(
        std::fs::read_to_string(output.path().join("b.tei.xml")).unwrap(),
        tei_body("b.pdf", 1)
    );
}

#[tokio::test]
async fn existing_output_is_skipped_without_request() {
    let input = input_dir(&["a.pdf"]);
    let output = tempfile::tempdir().unwrap();
    std::fs::write(output.path().join("a.tei.xml"), "previous run").unwrap();

    let client = GrobidClient::with_transport(
        config(10, 2).build().unwrap(),
        ScriptedTransport::default(),
    );
    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.written, 0);
    assert_eq!(client.transport().calls(), 0);
    assert_eq!(
        std::fs::read_to_string(output.path().join("a.tei.xml")).unwrap(),
        "previous run"
    );
}

#[tokio::test]
async fn overload_then_success_waits_once_and_writes_second_body() {
    let input = input_dir(&["a.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let transport =
        ScriptedTransport::default().script("a.pdf", &[Reply::Status(503), Reply::Status(200)]);
    let client = GrobidClient::with_transport(
        config(10, 1).sleep_time_secs(0.2).build().unwrap(),
        transport,
    );

    let start = Instant::now();
    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(stats.written, 1);
    assert_eq!(client.transport().calls(), 2);
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    assert_eq!(
        std::fs::read_to_string(output.path().join("a.tei.xml")).unwrap(),
        tei_body("a.pdf", 2)
    );
}

#[tokio::test]
async fn one_404_among_five_is_logged_and_others_written() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("errors.log");

    let transport = ScriptedTransport::default().script("c.pdf", &[Reply::Status(404)]);
    let client = GrobidClient::with_transport(
        config(2, 2).error_log(&log_path).build().unwrap(),
        transport,
    );
    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 4);
    assert_eq!(
        tei_files(output.path()),
        vec!["a.tei.xml", "b.tei.xml", "d.tei.xml", "e.tei.xml"]
    );

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1, "log: {log}");
    assert!(lines[0].starts_with("WARNING:"));
    assert!(lines[0].contains("c.pdf"));
    assert!(lines[0].contains("status 404"));
}

#[tokio::test]
async fn failures_without_error_log_leave_no_log_file() {
    let input = input_dir(&["a.pdf", "b.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::default().script("a.pdf", &[Reply::Status(500)]);
    let client = GrobidClient::with_transport(config(10, 2).build().unwrap(), transport);

    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!((stats.written, stats.failed), (1, 1));
    assert!(!output.path().join("errors.log").exists());
    assert!(!input.path().join("errors.log").exists());
}

// ── Properties ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_run_is_idempotent() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let client = GrobidClient::with_transport(
        config(3, 2).build().unwrap(),
        ScriptedTransport::default(),
    );

    let first = client.process(input.path(), output.path(), fulltext()).await.unwrap();
    assert_eq!(first.written, 4);
    let after_first = snapshot(output.path());
    let calls_after_first = client.transport().calls();

    let second = client.process(input.path(), output.path(), fulltext()).await.unwrap();
    assert_eq!(second.written, 0);
    assert_eq!(second.skipped, 4);
    assert_eq!(client.transport().calls(), calls_after_first);
    assert_eq!(snapshot(output.path()), after_first);
}

#[tokio::test]
async fn in_flight_never_exceeds_concurrency() {
    let names: Vec<String> = (0..12).map(|i| format!("doc{i:02}.pdf")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let input = input_dir(&refs);
    let output = tempfile::tempdir().unwrap();

    let client = GrobidClient::with_transport(
        config(12, 3).build().unwrap(),
        ScriptedTransport::with_delay(Duration::from_millis(20)),
    );
    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!(stats.written, 12);
    let max = client.transport().max_in_flight();
    assert!(max <= 3, "max in flight {max}");
    assert!(max >= 2, "expected parallel requests, max in flight {max}");
}

#[tokio::test]
async fn batch_drains_before_next_starts() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::default());

    let client = GrobidClient::with_transport(
        config(2, 4)
            .progress_callback(events.clone() as Arc<dyn ProcessProgressCallback>)
            .build()
            .unwrap(),
        ScriptedTransport::with_delay(Duration::from_millis(10)),
    );
    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!(stats.batch_sizes, vec![2, 2, 1]);
    // A batch of two can never have more than two requests in flight.
    assert!(client.transport().max_in_flight() <= 2);

    let events = events.events.lock().unwrap().clone();
    let expected_shape = [
        "batch-start 1 2",
        "file",
        "file",
        "batch-end 1",
        "batch-start 2 2",
        "file",
        "file",
        "batch-end 2",
        "batch-start 3 1",
        "file",
        "batch-end 3",
    ];
    assert_eq!(events.len(), expected_shape.len(), "events: {events:?}");
    for (event, expected) in events.iter().zip(expected_shape) {
        assert!(event.starts_with(expected), "events: {events:?}");
    }
}

#[tokio::test]
async fn sustained_overload_fails_after_retry_cap() {
    let input = input_dir(&["a.pdf", "b.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("errors.log");

    let transport = ScriptedTransport::default().script("a.pdf", &[Reply::Status(503); 10]);
    let client = GrobidClient::with_transport(
        config(10, 2).max_retries(2).error_log(&log_path).build().unwrap(),
        transport,
    );
    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!((stats.written, stats.failed), (1, 1));
    // One initial attempt plus two retries for a.pdf, one call for b.pdf.
    assert_eq!(client.transport().calls(), 4);
    assert!(!output.path().join("a.tei.xml").exists());
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("a.pdf with status 503"), "log: {log}");
}

#[tokio::test]
async fn transport_error_fails_only_that_file() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::default().script("b.pdf", &[Reply::Refused]);
    let client = GrobidClient::with_transport(config(1, 1).build().unwrap(), transport);

    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();

    assert_eq!(stats.batches, 3);
    assert_eq!((stats.written, stats.failed), (2, 1));
    assert_eq!(tei_files(output.path()), vec!["a.tei.xml", "c.tei.xml"]);
}

#[tokio::test]
async fn request_targets_service_url_with_enabled_flags() {
    let input = input_dir(&["paper.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let client = GrobidClient::with_transport(
        config(10, 1).build().unwrap(),
        ScriptedTransport::default(),
    );

    let mut options = ProcessOptions::new(Service::HeaderDocument);
    options.generate_ids = true;
    options.consolidate_citations = true;
    client.process(input.path(), output.path(), options).await.unwrap();

    let requests = client.transport().requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.url, "http://grobid.test:8070/api/processHeaderDocument");
    assert_eq!(req.file_field, "input");
    assert_eq!(req.file_name, "paper.pdf");
    assert_eq!(req.content_type, "application/pdf");
    assert_eq!(req.accept, "text/plain");
    assert_eq!(
        req.fields,
        vec![("generateIDs", "1"), ("consolidateCitations", "1")]
    );
    assert_eq!(req.bytes, b"%PDF-1.4\n%%EOF\n".to_vec());
}

// ── Run control ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_lets_current_batch_finish() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let events = Arc::new(EventLog {
        cancel_on_batch: Some((1, token.clone())),
        ..Default::default()
    });

    let client = GrobidClient::with_transport(
        config(2, 2)
            .progress_callback(events.clone() as Arc<dyn ProcessProgressCallback>)
            .build()
            .unwrap(),
        ScriptedTransport::default(),
    );
    let stats = client
        .process_with_cancel(input.path(), output.path(), fulltext(), token)
        .await
        .unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.written, 2);
    assert_eq!(tei_files(output.path()), vec!["a.tei.xml", "b.tei.xml"]);
}

#[tokio::test]
async fn missing_input_directory_is_fatal() {
    let output = tempfile::tempdir().unwrap();
    let client = GrobidClient::with_transport(
        config(10, 1).build().unwrap(),
        ScriptedTransport::default(),
    );
    let err = client
        .process("/definitely/not/an/input/dir", output.path(), fulltext())
        .await
        .unwrap_err();
    assert!(matches!(err, GrobidError::DirectoryNotFound { .. }));
    assert_eq!(client.transport().calls(), 0);
}

#[tokio::test]
async fn empty_directory_runs_zero_batches() {
    let input = input_dir(&[]);
    let output = tempfile::tempdir().unwrap();
    let client = GrobidClient::with_transport(
        config(10, 1).build().unwrap(),
        ScriptedTransport::default(),
    );
    let stats = client.process(input.path(), output.path(), fulltext()).await.unwrap();
    assert_eq!(stats.batches, 0);
    assert_eq!(stats.total_files, 0);
}

#[tokio::test]
async fn output_directory_is_created() {
    let input = input_dir(&["a.pdf"]);
    let parent = tempfile::tempdir().unwrap();
    let output: PathBuf = parent.path().join("nested/tei");
    let client = GrobidClient::with_transport(
        config(10, 1).build().unwrap(),
        ScriptedTransport::default(),
    );
    client.process(input.path(), &output, fulltext()).await.unwrap();
    assert_eq!(tei_files(&output), vec!["a.tei.xml"]);
}

#[tokio::test]
async fn output_next_to_inputs_is_not_rediscovered() {
    let input = input_dir(&["a.pdf", "b.pdf"]);
    let client = GrobidClient::with_transport(
        config(10, 2).build().unwrap(),
        ScriptedTransport::default(),
    );
    let first = client.process(input.path(), input.path(), fulltext()).await.unwrap();
    let second = client.process(input.path(), input.path(), fulltext()).await.unwrap();
    assert_eq!(first.written, 2);
    assert_eq!(second.total_files, 2);
    assert_eq!(second.skipped, 2);
}

#[tokio::test]
async fn lazy_stream_processes_every_file() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf", "notes.txt"]);
    let output = tempfile::tempdir().unwrap();
    let client = GrobidClient::with_transport(
        config(2, 2).build().unwrap(),
        ScriptedTransport::default(),
    );

    let stats = client
        .process_stream(input.path(), output.path(), fulltext(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.batch_sizes, vec![2, 1]);
    assert_eq!(stats.written, 3);
    assert_eq!(
        tei_files(output.path()),
        vec!["a.tei.xml", "b.tei.xml", "c.tei.xml"]
    );
}

#[tokio::test]
async fn explicit_path_stream_uses_same_batching() {
    let input = input_dir(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
    let output = tempfile::tempdir().unwrap();
    let client = GrobidClient::with_transport(
        config(3, 2).build().unwrap(),
        ScriptedTransport::default(),
    );
    let paths: Vec<PathBuf> = ["d.pdf", "a.pdf", "c.pdf", "b.pdf"]
        .iter()
        .map(|n| input.path().join(n))
        .collect();

    let stats = client
        .process_paths(
            futures::stream::iter(paths),
            output.path(),
            fulltext(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(stats.batch_sizes, vec![3, 1]);
    assert_eq!(stats.written, 4);
}
