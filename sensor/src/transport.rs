//! Executes the requests built by the core client.
//!
//! The core never touches the network; this module is the host side of
//! that contract. [`Transport`] is the seam tests mock, [`ReqwestTransport`]
//! the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use plexrec_core::{HttpMethod, HttpRequest, HttpResponse};
use reqwest::Client as HttpClient;

const USER_AGENT: &str = concat!("plexrec-sensor/", env!("CARGO_PKG_VERSION"));

/// Failure before any HTTP status was received.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("{0}")]
    Connect(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Executes one `HttpRequest`, bounded by `timeout`.
///
/// Every received status, including 4xx and 5xx, is returned as `Ok`;
/// status interpretation belongs to the core client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: HttpClient,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let http_client = HttpClient::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.http_client.get(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Connect(e.to_string())
            }
        };

        let response = builder.timeout(timeout).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response.text().await.map_err(classify)?;

        tracing::debug!(url = %request.url, status, bytes = body.len(), "HTTP round-trip");

        Ok(HttpResponse { status, headers, body })
    }
}
