//! Execution of `HttpRequest` values over the network.
//!
//! # Design
//! `Transport` is the only seam that performs I/O. A non-success HTTP status
//! is returned as data; only failures to obtain a response at all become a
//! `TransportError`. `UreqTransport` is the default blocking implementation
//! and owns the retry policy for those failures.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes requests and returns whatever response the server produced.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Retry and timeout settings for [`UreqTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_wait: Duration,
    pub retry_max_wait: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_count: 3,
            retry_wait: Duration::from_secs(3),
            retry_max_wait: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Wait before retry number `attempt` (0-based): doubles each time,
    /// capped at `retry_max_wait`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_wait.saturating_mul(factor).min(self.retry_max_wait)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    config: TransportConfig,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").field("config", &self.config).finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Self {
        // 4xx/5xx must come back as responses so the client can classify them.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .new_agent();
        Self { agent, config }
    }

    fn execute_once(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => prepare(self.agent.get(url), request).call(),
            (HttpMethod::Delete, _) => prepare(self.agent.delete(url), request).call(),
            (HttpMethod::Post, Some(body)) => {
                prepare(self.agent.post(url), request).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => prepare(self.agent.post(url), request).send_empty(),
            (HttpMethod::Patch, Some(body)) => {
                prepare(self.agent.patch(url), request).send(body.as_bytes())
            }
            (HttpMethod::Patch, None) => prepare(self.agent.patch(url), request).send_empty(),
        };

        let mut response = result.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string().map_err(classify)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 0;
        loop {
            match self.execute_once(request) {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.config.retry_count => {
                    let wait = self.config.backoff(attempt);
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt = attempt + 1,
                        wait = ?wait,
                        error = %err,
                        "transport failure, retrying"
                    );
                    thread::sleep(wait);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn prepare<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    builder
}

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(t) => TransportError::Timeout(format!("{t:?}")),
        ureq::Error::Io(e) => TransportError::Connection(e.to_string()),
        ureq::Error::ConnectionFailed => TransportError::Connection("connection failed".to_string()),
        ureq::Error::HostNotFound => TransportError::Connection("host not found".to_string()),
        other => TransportError::Other(other.to_string()),
    }
}
