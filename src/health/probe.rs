//! HTTP liveness probe.
//!
//! # Responsibilities
//! - Issue exactly one request per call against a backend origin
//! - Bound the connect phase and the request/response phase separately
//! - Classify the outcome as healthy or unhealthy
//!
//! # Design Decisions
//! - A fresh TCP connection per probe with `Connection: close`: a pooled
//!   connection that went stale would read as a dead backend
//! - No `Accept-Encoding`, the body is never read
//! - No retries here; the check loop's poll cadence is the retry policy

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::{header, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time;
use url::Url;

use crate::config::ProbeConfig;
use crate::health::state::CheckStatus;
use crate::observability::metrics;

/// Returned by overloaded backends that are still alive.
pub const OVERLOADED_STATUS: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target '{0}'")]
    InvalidTarget(String),

    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("no response within {0:?}")]
    IoTimeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),
}

/// Outcome of a single probe.
pub type ProbeResult = Result<StatusCode, ProbeError>;

/// Turn a probe outcome into a status.
///
/// Transport failures and 5xx responses are unhealthy, except 503 which an
/// overloaded backend sends while still alive.
pub fn classify(result: &ProbeResult) -> CheckStatus {
    match result {
        Err(_) => CheckStatus::Unhealthy,
        Ok(status) if status.is_server_error() && *status != OVERLOADED_STATUS => {
            CheckStatus::Unhealthy
        }
        Ok(_) => CheckStatus::Healthy,
    }
}

/// Something that can probe a backend origin once.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, backend_url: &str) -> ProbeResult;
}

/// Plain HTTP/1.1 prober.
#[derive(Debug, Clone)]
pub struct HttpProber {
    method: Method,
    path: String,
    host: String,
    user_agent: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl HttpProber {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let method = Method::from_bytes(config.method.as_bytes())
            .map_err(|_| ProbeError::InvalidTarget(config.method.clone()))?;

        Ok(Self {
            method,
            path: config.path.clone(),
            host: config.host.clone(),
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
        })
    }

    async fn connect(&self, backend_url: &str) -> Result<TcpStream, ProbeError> {
        let url = Url::parse(backend_url)
            .map_err(|_| ProbeError::InvalidTarget(backend_url.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProbeError::InvalidTarget(backend_url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);
        // IPv6 literals come back bracketed.
        let host = host.trim_start_matches('[').trim_end_matches(']');

        match time::timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(stream) => Ok(stream?),
            Err(_) => Err(ProbeError::ConnectTimeout(self.connect_timeout)),
        }
    }

    async fn exchange(&self, stream: TcpStream) -> ProbeResult {
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let request = Request::builder()
            .method(self.method.clone())
            .uri(self.path.as_str())
            .header(header::HOST, self.host.as_str())
            .header(header::USER_AGENT, self.user_agent.as_str())
            .header(header::CONNECTION, "close")
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await?;
        Ok(response.status())
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, backend_url: &str) -> ProbeResult {
        let started = time::Instant::now();
        tracing::debug!(backend = %backend_url, path = %self.path, "Requesting");

        let stream = self.connect(backend_url).await?;
        let result = match time::timeout(self.io_timeout, self.exchange(stream)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::IoTimeout(self.io_timeout)),
        };

        metrics::record_probe(started.elapsed());
        result
    }
}
