//! Configuration types for a batch run.
//!
//! All run behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`] or loaded from a JSON config file with
//! [`ClientConfig::from_file`]. The value is validated once and then only
//! read: the orchestrator, dispatcher and processor all receive it by
//! reference.
//!
//! # Config file
//!
//! ```json
//! {
//!     "grobid_server": "localhost",
//!     "grobid_port": "8070",
//!     "batch_size": 1000,
//!     "sleep_time": 5,
//!     "max_retries": 10,
//!     "timeout": 180
//! }
//! ```
//!
//! `grobid_port` may be a string or a number; an empty string leaves the
//! port out of the URL. `max_retries` and `timeout` are optional.

use crate::error::GrobidError;
use crate::job::Service;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Default error-log file name.
pub const DEFAULT_ERROR_LOG: &str = "errors.log";

/// Worker count used when the requested concurrency is unusable.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Configuration for a batch run.
///
/// # Example
/// ```rust
/// use grobid_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .server("localhost")
///     .port("8070")
///     .batch_size(100)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// assert_eq!(
///     config.service_url(grobid_client::Service::FulltextDocument),
///     "http://localhost:8070/api/processFulltextDocument"
/// );
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Files per batch. The next batch starts only after the current one
    /// has fully drained. Default: 1000.
    pub batch_size: usize,

    /// Maximum number of files in flight within a batch. Default: 10.
    pub concurrency: usize,

    /// GROBID host name. Default: "localhost".
    pub server: String,

    /// GROBID port. `None` omits the port from the URL. Default: "8070".
    pub port: Option<String>,

    /// Pause before the first retry after a 503, in seconds. Default: 5.
    ///
    /// Doubles on every further retry of the same file.
    pub sleep_time_secs: f64,

    /// Retries after a 503 before the file is reported as failed. Default: 10.
    pub max_retries: u32,

    /// Per-request timeout in seconds. Default: 180.
    pub request_timeout_secs: u64,

    /// Append failed files to this log. `None` disables the error log.
    pub error_log: Option<PathBuf>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            concurrency: DEFAULT_CONCURRENCY,
            server: "localhost".to_string(),
            port: Some("8070".to_string()),
            sleep_time_secs: 5.0,
            max_retries: 10,
            request_timeout_secs: 180,
            error_log: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sleep_time_secs", &self.sleep_time_secs)
            .field("max_retries", &self.max_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("error_log", &self.error_log)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProcessProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load a JSON config file and turn it into a builder.
    ///
    /// The returned builder can still be adjusted (concurrency, error log,
    /// callbacks) before [`ClientConfigBuilder::build`] validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ClientConfigBuilder, GrobidError> {
        let file = ConfigFile::load(path)?;
        Ok(Self::builder().apply_file(&file))
    }

    /// `http://{server}[:{port}]/api/{service}`.
    pub fn service_url(&self, service: Service) -> String {
        let mut url = format!("http://{}", self.server);
        if let Some(port) = self.port.as_deref().filter(|p| !p.is_empty()) {
            url.push(':');
            url.push_str(port);
        }
        url.push_str("/api/");
        url.push_str(service.as_str());
        url
    }

    /// Pause before retry number `attempt` (1-based) after a 503.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn overload_backoff(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.saturating_sub(1).min(16) as i32);
        Duration::try_from_secs_f64(self.sleep_time_secs * factor).unwrap_or(Duration::MAX)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn server(mut self, host: impl Into<String>) -> Self {
        self.config.server = host.into();
        self
    }

    /// Set the port; an empty string omits it from the URL.
    pub fn port(mut self, port: impl Into<String>) -> Self {
        let port = port.into();
        self.config.port = if port.is_empty() { None } else { Some(port) };
        self
    }

    pub fn sleep_time_secs(mut self, secs: f64) -> Self {
        self.config.sleep_time_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Enable the error log at `path`.
    pub fn error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.error_log = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Copy every value present in a parsed config file.
    pub fn apply_file(mut self, file: &ConfigFile) -> Self {
        self.config.batch_size = file.batch_size;
        self.config.server = file.grobid_server.clone();
        self.config.port = file.grobid_port.as_option();
        self.config.sleep_time_secs = file.sleep_time;
        if let Some(n) = file.max_retries {
            self.config.max_retries = n;
        }
        if let Some(secs) = file.timeout {
            self.config.request_timeout_secs = secs;
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, GrobidError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(GrobidError::InvalidConfig("batch_size must be ≥ 1".into()));
        }
        if c.concurrency == 0 {
            return Err(GrobidError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.server.trim().is_empty() {
            return Err(GrobidError::InvalidConfig("grobid_server must not be empty".into()));
        }
        if !c.sleep_time_secs.is_finite() || c.sleep_time_secs < 0.0 {
            return Err(GrobidError::InvalidConfig(format!(
                "sleep_time must be a non-negative number of seconds, got {}",
                c.sleep_time_secs
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(GrobidError::InvalidConfig("timeout must be ≥ 1 second".into()));
        }
        Ok(self.config)
    }
}

// ── Config file ──────────────────────────────────────────────────────────

/// On-disk JSON configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub batch_size: usize,
    pub grobid_server: String,
    pub grobid_port: PortValue,
    /// Seconds; integers and floats are both accepted.
    pub sleep_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ConfigFile {
    /// Read and parse the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GrobidError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| GrobidError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw).map_err(|e| GrobidError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// `grobid_port` as written in the file: `"8070"`, `8070` or `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    fn as_option(&self) -> Option<String> {
        match self {
            PortValue::Number(n) => Some(n.to_string()),
            PortValue::Text(s) if s.trim().is_empty() => None,
            PortValue::Text(s) => Some(s.trim().to_string()),
        }
    }
}

/// Parse a user-supplied concurrency value.
///
/// Returns `Err` with the fallback when the value is not a positive
/// integer, so callers can warn and continue with
/// [`DEFAULT_CONCURRENCY`].
pub fn parse_concurrency(raw: &str) -> Result<usize, usize> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n as usize),
        _ => Err(DEFAULT_CONCURRENCY),
    }
}
