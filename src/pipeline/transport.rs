//! HTTP transport: one multipart POST, no retry, no status interpretation.
//!
//! The processor talks to the service through the [`Transport`] trait so
//! the retry and idempotence logic can be exercised without a live GROBID
//! instance. [`HttpTransport`] is the reqwest-backed implementation used
//! by [`crate::GrobidClient::new`].

use crate::error::{GrobidError, TransportError};
use reqwest::multipart::{Form, Part};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// A fully built request for one PDF.
#[derive(Debug, Clone)]
pub struct MultipartRequest {
    pub url: String,
    /// Form field carrying the file (`input` for GROBID).
    pub file_field: &'static str,
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// Extra text fields, e.g. `("consolidateHeader", "1")`.
    pub fields: Vec<(&'static str, &'static str)>,
    /// Value of the `Accept` header.
    pub accept: &'static str,
}

/// Raw status and body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends a multipart request and hands back whatever the server said.
pub trait Transport: Send + Sync {
    fn post_multipart(
        &self,
        request: MultipartRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// reqwest-backed [`Transport`] with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, GrobidError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GrobidError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    async fn send(&self, request: MultipartRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url;
        let part = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(request.content_type)
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let mut form = Form::new().part(request.file_field, part);
        for (name, value) in request.fields {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, request.accept)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify(&url, self.timeout, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Body {
            url: url.clone(),
            detail: e.to_string(),
        })?;
        debug!("POST {} → {} ({} bytes)", url, status, body.len());

        Ok(TransportResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn post_multipart(
        &self,
        request: MultipartRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        self.send(request)
    }
}

fn classify(url: &str, timeout: Duration, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else if e.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            detail: e.to_string(),
        }
    }
}
