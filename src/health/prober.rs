//! Probe capability.
//!
//! A [`Prober`] performs one network call against a [`ServiceDescriptor`].
//! Checks only ever see this trait; [`HttpProber`] is the implementation the
//! binary wires in.

use crate::health::Payload;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use hyper::header::{ACCEPT, CACHE_CONTROL, USER_AGENT};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

/// Largest response body a probe will buffer.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// Content the caller expects back from a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Text,
}

impl ContentKind {
    fn accept_header(&self) -> &'static str {
        match self {
            ContentKind::Json => "application/json",
            ContentKind::Text => "text/plain, */*",
        }
    }
}

/// Where and how to probe one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub base_url: String,
    pub path: String,
    pub timeout: Duration,
    pub accept: ContentKind,
}

impl ServiceDescriptor {
    pub fn new(
        base_url: impl Into<String>,
        path: impl Into<String>,
        timeout: Duration,
        accept: ContentKind,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            timeout,
            accept,
        }
    }

    /// Full URL: base without a trailing slash, then the path.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Successful probe response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub body: Payload,
}

/// Reasons a probe fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    Transport(String),

    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ProbeError {
    /// HTTP status code, when the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Performs a single network call against a target.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &ServiceDescriptor) -> Result<ProbeResponse, ProbeError>;
}

/// Plain-HTTP prober backed by a pooled hyper client.
#[derive(Clone)]
pub struct HttpProber {
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpProber {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    async fn fetch(&self, target: &ServiceDescriptor) -> Result<ProbeResponse, ProbeError> {
        let url = target.url();
        let uri: Uri = url
            .parse()
            .map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", url, e)))?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(ACCEPT, target.accept.accept_header())
            .header(CACHE_CONTROL, "no-cache")
            .header(USER_AGENT, concat!("healthagg/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Transport(error_chain(&e)))?;

        let status = response.status();
        let body = Limited::new(response.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    ProbeError::Decode(format!("body exceeds {} bytes", MAX_BODY_BYTES))
                } else {
                    ProbeError::Transport(error_chain(&*e))
                }
            })?
            .to_bytes();

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "probe response");

        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let payload = match target.accept {
            ContentKind::Json => Payload::Json(
                serde_json::from_slice(&body).map_err(|e| ProbeError::Decode(e.to_string()))?,
            ),
            ContentKind::Text => Payload::Text(String::from_utf8_lossy(&body).into_owned()),
        };

        Ok(ProbeResponse {
            status_code: status.as_u16(),
            body: payload,
        })
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &ServiceDescriptor) -> Result<ProbeResponse, ProbeError> {
        match timeout(target.timeout, self.fetch(target)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

/// Render an error with its sources, since hyper's top-level messages are
/// rarely useful on their own.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
