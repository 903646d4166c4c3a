//! Completed request/response exchanges as seen by the recorder

use bytes::Bytes;

/// One completed call against an Elasticsearch cluster
///
/// Produced by the transport once all retry attempts are over. Everything the
/// recorder formats comes from here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    /// HTTP method (e.g., "GET", "POST")
    pub request_method: String,
    /// Final status code, `None` if the server was never reached
    pub http_status_code: Option<u16>,
    /// Target URL
    pub request_url: String,
    /// Attempts made after the first one
    pub number_of_retries: u32,
    /// Raw bytes sent
    pub request_body: Option<Bytes>,
    /// Raw bytes received
    pub response_body: Option<Bytes>,
    /// Whether the exchange succeeded
    pub success: bool,
    /// Failure detail, only meaningful when `success` is false
    pub failure: Option<ExchangeFailure>,
    /// Per-attempt metrics, `None` if the client collected none
    pub metrics: Option<RequestMetrics>,
}

/// Why an exchange failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeFailure {
    /// Error message
    pub message: String,
    /// Error trace, one cause per line
    pub stack_trace: Option<String>,
}

impl ExchangeFailure {
    /// Build a failure from an error and its `source()` chain
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}\n"));
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            stack_trace: (!causes.is_empty()).then(|| causes.concat()),
        }
    }
}

/// Metrics for every attempt of one exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetrics {
    /// Attempts in the order they were made
    pub requests: Vec<AttemptMetrics>,
}

/// Timing of a single attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptMetrics {
    /// Wall time spent on the attempt
    pub elapsed_ms: u64,
    /// Status returned by this attempt, if any
    pub status: Option<u16>,
}

impl RequestMetrics {
    /// Metrics from plain elapsed times
    #[must_use]
    pub fn from_elapsed(elapsed_ms: &[u64]) -> Self {
        Self {
            requests: elapsed_ms
                .iter()
                .map(|&elapsed_ms| AttemptMetrics {
                    elapsed_ms,
                    status: None,
                })
                .collect(),
        }
    }

    /// Sum of all attempt durations, saturating at `u64::MAX`
    #[must_use]
    pub fn total_elapsed_ms(&self) -> u64 {
        self.requests
            .iter()
            .fold(0u64, |acc, attempt| acc.saturating_add(attempt.elapsed_ms))
    }
}

impl Exchange {
    /// Start an exchange for the given method and URL
    #[must_use]
    pub fn new(request_method: impl Into<String>, request_url: impl Into<String>) -> Self {
        Self {
            request_method: request_method.into(),
            request_url: request_url.into(),
            success: true,
            ..Default::default()
        }
    }

    /// Set the final status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status_code = Some(status);
        self
    }

    /// Set the retry count
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.number_of_retries = retries;
        self
    }

    /// Attach the request body
    #[must_use]
    pub fn with_request_body(mut self, body: impl Into<Bytes>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    /// Attach the response body
    #[must_use]
    pub fn with_response_body(mut self, body: impl Into<Bytes>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    /// Mark the exchange failed
    #[must_use]
    pub fn with_failure(mut self, failure: ExchangeFailure) -> Self {
        self.success = false;
        self.failure = Some(failure);
        self
    }

    /// Attach per-attempt metrics
    #[must_use]
    pub fn with_metrics(mut self, metrics: RequestMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Status code as rendered in diagnostics, `0` when unset
    #[must_use]
    pub fn status_code_or_zero(&self) -> u16 {
        self.http_status_code.unwrap_or(0)
    }
}
