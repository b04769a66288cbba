use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use common::config::RetryConfig;
use common::text::body_preview;
use http::{Request, Response, StatusCode};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::backoff::exponential_jitter_backoff;
use crate::error::HttpStatusError;
use crate::exec::HttpExec;
use crate::metrics;
use crate::model::{endpoint_label, is_idempotent, parse_retry_after, rebuild_request};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter_frac: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_frac: config.jitter_frac,
        }
    }

    fn delay_for(&self, retry: u32, server_hint: Option<Duration>) -> Duration {
        let backoff =
            exponential_jitter_backoff(self.initial_delay, retry, self.max_delay, self.jitter_frac);
        match server_hint {
            Some(hint) if hint > backoff => hint.min(self.max_delay),
            _ => backoff,
        }
    }
}

/// Retries idempotent requests on connection errors, 429 and 5xx.
///
/// The request body is buffered once and replayed for each attempt. When the
/// budget runs out the error from the final attempt is returned as-is.
pub struct RetryTransport {
    inner: Arc<dyn HttpExec>,
    policy: RetryPolicy,
}

impl RetryTransport {
    pub fn new(inner: Arc<dyn HttpExec>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

struct FailedAttempt {
    error: anyhow::Error,
    server_hint: Option<Duration>,
    reason: &'static str,
}

#[async_trait]
impl HttpExec for RetryTransport {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let (parts, body) = req.into_parts();
        let endpoint = endpoint_label(&parts);
        let budget = if is_idempotent(&parts) {
            self.policy.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = rebuild_request(&parts, &body)?;
            let started = Instant::now();
            let outcome = self.inner.execute(request).await;
            metrics::LATENCY.observe(started.elapsed().as_secs_f64());

            let failed = match outcome {
                Ok(response) => {
                    let status = response.status();
                    metrics::REQUESTS_TOTAL
                        .with_label_values(&[metrics::status_class(status)])
                        .inc();
                    if !status.is_client_error() && !status.is_server_error() {
                        return Ok(response);
                    }

                    let status_err = HttpStatusError::with_endpoint(status, endpoint.clone());
                    if !status_err.is_transient() {
                        debug!(
                            status = %status,
                            endpoint = %endpoint,
                            body_preview = %body_preview(response.body(), 256),
                            "request rejected, not retrying"
                        );
                        return Err(status_err.into());
                    }

                    warn!(
                        status = %status,
                        endpoint = %endpoint,
                        attempt,
                        github_request_id = response
                            .headers()
                            .get("x-github-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-"),
                        body_preview = %body_preview(response.body(), 256),
                        "GitHub responded with retryable status"
                    );
                    FailedAttempt {
                        error: status_err.into(),
                        server_hint: parse_retry_after(response.headers()).map(|a| a.wait),
                        reason: if status == StatusCode::TOO_MANY_REQUESTS {
                            "rate_limited"
                        } else {
                            "server_error"
                        },
                    }
                }
                Err(error) => {
                    metrics::REQUESTS_TOTAL.with_label_values(&["error"]).inc();
                    FailedAttempt {
                        error,
                        server_hint: None,
                        reason: "connection",
                    }
                }
            };

            if attempt >= budget {
                warn!(
                    endpoint = %endpoint,
                    attempts = attempt,
                    error = %failed.error,
                    "giving up on request"
                );
                return Err(failed.error);
            }

            let delay = self.policy.delay_for(attempt - 1, failed.server_hint);
            metrics::RETRIES_TOTAL
                .with_label_values(&[failed.reason])
                .inc();
            warn!(
                endpoint = %endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failed.error,
                "request attempt failed, backing off"
            );
            sleep(delay).await;
        }
    }
}
