//! Instrumented HTTP client for Elasticsearch

use std::time::{Duration, Instant};

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ClientConfig, Config};
use crate::exchange::{AttemptMetrics, Exchange, ExchangeFailure, RequestMetrics};
use crate::profiling::Profiler;
use crate::recording::ResponseRecorder;
use crate::{EsprofError, Result};

/// Request to send to the cluster
#[derive(Debug, Clone)]
pub struct EsRequest {
    /// HTTP method
    pub method: String,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Bytes>,
}

impl EsRequest {
    /// Create a request without body
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Set a JSON body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Why a single attempt failed before producing a response
#[derive(Debug, Error)]
enum AttemptError {
    #[error("error sending request")]
    Transport(#[source] hyper_util::client::legacy::Error),

    #[error("error reading response body")]
    Body(#[source] hyper::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

struct AttemptResponse {
    status: u16,
    body: Bytes,
}

/// HTTP client that records every exchange into a profiler
///
/// Each call makes up to `max_retries + 1` attempts; the resulting exchange is
/// handed to the [`ResponseRecorder`] and returned to the caller.
pub struct ProfiledClient {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    max_retries: u32,
    request_timeout: Duration,
    recorder: ResponseRecorder,
}

impl ProfiledClient {
    /// Create a new client
    #[must_use]
    pub fn new(config: &ClientConfig, recorder: ResponseRecorder) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(10)
            .build_http();

        Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            recorder,
        }
    }

    /// Create a client from the full configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.client, ResponseRecorder::new(config.recorder.clone()))
    }

    /// Send a request and record it against `profiler`
    ///
    /// Network failures and error statuses are reported through the returned
    /// exchange, not as `Err`.
    ///
    /// # Errors
    ///
    /// Returns error if the method, URL, or headers are malformed
    pub async fn send<P>(&self, request: &EsRequest, profiler: Option<&P>) -> Result<Exchange>
    where
        P: Profiler + ?Sized,
    {
        let method = request.method.parse::<Method>().map_err(|e| {
            EsprofError::InvalidRequest(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;
        let url = resolve_url(&self.base_url, &request.path);
        let uri = url
            .parse::<Uri>()
            .map_err(|e| EsprofError::InvalidRequest(format!("Invalid URI '{url}': {e}")))?;

        let mut attempts = Vec::new();
        let mut attempt = 0u32;
        let outcome = loop {
            let http_request = build_request(&method, &uri, request)?;

            debug!(%method, %uri, attempt, "Sending request");
            let started = Instant::now();
            let result = self.execute(http_request).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            attempts.push(AttemptMetrics {
                elapsed_ms,
                status: result.as_ref().ok().map(|r| r.status),
            });

            let retryable = match &result {
                Ok(response) => is_retryable_status(response.status),
                Err(_) => true,
            };
            if !retryable || attempt >= self.max_retries {
                break result;
            }

            attempt += 1;
            match &result {
                Ok(response) => warn!(%uri, status = response.status, attempt, "Retrying request"),
                Err(e) => warn!(%uri, error = %e, attempt, "Retrying request"),
            }
        };

        let mut exchange = Exchange::new(method.as_str(), url)
            .with_retries(attempt)
            .with_metrics(RequestMetrics { requests: attempts });
        exchange.request_body = request.body.clone();

        match outcome {
            Ok(response) => {
                exchange.http_status_code = Some(response.status);
                exchange.response_body = Some(response.body);
                if !(200..300).contains(&response.status) {
                    exchange = exchange.with_failure(ExchangeFailure {
                        message: format!("Unsuccessful HTTP status {}", response.status),
                        stack_trace: None,
                    });
                }
            }
            Err(e) => {
                exchange = exchange.with_failure(ExchangeFailure::from_error(&e));
            }
        }

        self.recorder.handle_exchange(&exchange, profiler);
        Ok(exchange)
    }

    async fn execute(
        &self,
        request: Request<Full<Bytes>>,
    ) -> std::result::Result<AttemptResponse, AttemptError> {
        let call = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(AttemptError::Transport)?;
            let status = response.status().as_u16();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(AttemptError::Body)?
                .to_bytes();
            Ok(AttemptResponse { status, body })
        };

        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout(self.request_timeout)),
        }
    }
}

/// Build one attempt's request
fn build_request(method: &Method, uri: &Uri, request: &EsRequest) -> Result<Request<Full<Bytes>>> {
    let mut builder = Request::builder().method(method.clone()).uri(uri.clone());

    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let has_content_type = request
        .headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str()));
    if request.body.is_some() && !has_content_type {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }

    let body = request.body.clone().unwrap_or_default();
    builder
        .body(Full::new(body))
        .map_err(|e| EsprofError::InvalidRequest(format!("Failed to build request: {e}")))
}

/// Join a request path onto the base URL; absolute URLs pass through
fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Statuses worth another attempt
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("http://localhost:9200", "/_search"),
            "http://localhost:9200/_search"
        );
        assert_eq!(
            resolve_url("http://localhost:9200/", "logs/_count"),
            "http://localhost:9200/logs/_count"
        );
        assert_eq!(
            resolve_url("http://localhost:9200", "https://other:9243/_cat/health"),
            "https://other:9243/_cat/health"
        );
    }

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable_status(502));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(504));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(500));
    }

    #[test]
    fn test_build_request_sets_json_content_type() {
        let uri: Uri = "http://localhost:9200/_search".parse().unwrap();
        let request = EsRequest::new("POST", "/_search").with_body(&b"{}"[..]);
        let built = build_request(&Method::POST, &uri, &request).unwrap();
        assert_eq!(
            built.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_build_request_keeps_explicit_content_type() {
        let uri: Uri = "http://localhost:9200/_bulk".parse().unwrap();
        let request = EsRequest::new("POST", "/_bulk")
            .with_header("Content-Type", "application/x-ndjson")
            .with_body(&b"{}\n"[..]);
        let built = build_request(&Method::POST, &uri, &request).unwrap();
        assert_eq!(
            built.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/x-ndjson"
        );
    }

    #[test]
    fn test_build_request_rejects_bad_header() {
        let uri: Uri = "http://localhost:9200/".parse().unwrap();
        let request = EsRequest::new("GET", "/").with_header("bad header", "x");
        assert!(build_request(&Method::GET, &uri, &request).is_err());
    }

    #[tokio::test]
    async fn test_invalid_method_is_error() {
        let client = ProfiledClient::new(&ClientConfig::default(), ResponseRecorder::default());
        let request = EsRequest::new("NOT A METHOD", "/");
        let result = client
            .send::<crate::profiling::ProfilerSession>(&request, None)
            .await;
        assert!(matches!(result, Err(EsprofError::InvalidRequest(_))));
    }
}
