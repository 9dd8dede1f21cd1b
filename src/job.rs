//! Per-file work items and the request options shared by a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Extension appended to the source stem to form the output file name.
pub const TEI_EXTENSION: &str = "tei.xml";

/// Remote GROBID operation a PDF is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Service {
    /// Full text structuring: header, body and bibliography.
    #[default]
    #[serde(rename = "processFulltextDocument")]
    FulltextDocument,
    /// Header metadata only.
    #[serde(rename = "processHeaderDocument")]
    HeaderDocument,
    /// Bibliographical references only.
    #[serde(rename = "processReferences")]
    References,
}

impl Service {
    /// Name used in the `/api/{service}` path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::FulltextDocument => "processFulltextDocument",
            Service::HeaderDocument => "processHeaderDocument",
            Service::References => "processReferences",
        }
    }

    pub const ALL: [Service; 3] = [
        Service::FulltextDocument,
        Service::HeaderDocument,
        Service::References,
    ];
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|svc| svc.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown service '{s}', expected one of [processFulltextDocument, processHeaderDocument, processReferences]"
                )
            })
    }
}

/// Service choice plus the optional GROBID form flags.
///
/// A flag that is `false` is left out of the request entirely so the
/// service applies its own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub service: Service,
    /// Send `generateIDs=1`.
    pub generate_ids: bool,
    /// Send `consolidateHeader=1`.
    pub consolidate_header: bool,
    /// Send `consolidateCitations=1`.
    pub consolidate_citations: bool,
}

impl ProcessOptions {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            ..Default::default()
        }
    }

    /// Multipart text fields for the enabled flags, in a stable order.
    pub fn form_fields(&self) -> Vec<(&'static str, &'static str)> {
        let mut fields = Vec::with_capacity(3);
        if self.generate_ids {
            fields.push(("generateIDs", "1"));
        }
        if self.consolidate_header {
            fields.push(("consolidateHeader", "1"));
        }
        if self.consolidate_citations {
            fields.push(("consolidateCitations", "1"));
        }
        fields
    }
}

/// One input PDF and everything needed to process it.
///
/// Created when the file is pulled from discovery and dropped once the
/// processor returns.
#[derive(Debug, Clone)]
pub struct Job {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub options: ProcessOptions,
    /// Record failures in the error log as well as on the console.
    pub log_errors: bool,
}

impl Job {
    pub fn new(
        source: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        options: ProcessOptions,
        log_errors: bool,
    ) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            options,
            log_errors,
        }
    }

    /// `{output_dir}/{source stem}.tei.xml`.
    pub fn output_path(&self) -> PathBuf {
        output_path_for(&self.source, &self.output_dir)
    }

    /// Base name of the source, as sent in the multipart filename.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.pdf".to_string())
    }
}

/// Output location for `source` inside `output_dir`.
pub fn output_path_for(source: &Path, output_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{stem}.{TEI_EXTENSION}"))
}
