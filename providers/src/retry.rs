//! Transport retry with exponential backoff.
//!
//! This is the only retry layer in reverie. It sits beneath a single
//! collaborator call and never re-issues a call that produced a response the
//! engine rejected; the Quality Guard's repair pass is a separate, new call.
//!
//! - Retries connection errors and HTTP 408, 409, 429 and 5xx.
//! - `x-should-retry: true|false` from the server overrides the status rule.
//! - `Retry-After-Ms` / `Retry-After` (under 60s) replace the computed backoff.
//! - Every attempt carries the same `Idempotency-Key` and an `X-Reverie-Attempt`
//!   counter starting at 0.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};
use uuid::Uuid;

pub const ATTEMPT_HEADER: &str = "X-Reverie-Attempt";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

const MAX_SERVER_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retry.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Down-jitter: each delay is scaled by a factor in `[1 - jitter_factor, 1]`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Backoff before retry number `step + 1`, unless the server named a delay.
    #[must_use]
    pub fn delay(&self, step: u32, headers: Option<&HeaderMap>) -> Duration {
        if let Some(server_delay) = headers.and_then(parse_retry_after) {
            return server_delay;
        }
        let exponent = i32::try_from(step).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = 1.0 - rand::random::<f64>() * self.jitter_factor;
        Duration::from_secs_f64(capped * jitter)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Server-requested delay, if present and within `(0, 60s)`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let in_range = |d: Duration| (d > Duration::ZERO && d < MAX_SERVER_DELAY).then_some(d);

    if let Some(ms) = header_str(headers, "retry-after-ms").and_then(|s| s.parse::<f64>().ok())
        && ms.is_finite()
        && let Some(delay) = in_range(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    {
        return Some(delay);
    }

    header_str(headers, "retry-after")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .and_then(|secs| in_range(Duration::from_secs(secs)))
}

#[must_use]
pub fn should_retry(status: StatusCode, headers: &HeaderMap) -> bool {
    match header_str(headers, "x-should-retry") {
        Some(v) if v.eq_ignore_ascii_case("true") => return true,
        Some(v) if v.eq_ignore_ascii_case("false") => return false,
        _ => {}
    }
    matches!(status.as_u16(), 408 | 409 | 429) || status.is_server_error()
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

#[must_use]
pub fn generate_idempotency_key() -> String {
    format!("reverie-{}", Uuid::new_v4())
}

/// How a retried request ended.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response.
    Success(Response),
    /// Non-2xx response that was not retryable or outlived the retry budget.
    HttpError(Response),
    /// Transport failure on the last permitted attempt, or one that is not retryable.
    Transport { attempts: u32, source: reqwest::Error },
}

/// Send the request built by `build_request`, retrying per `config`.
///
/// `build_request` runs once per attempt so each attempt gets a fresh body.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let idempotency_key = generate_idempotency_key();
    let mut attempt = 0u32;

    loop {
        let last = attempt >= config.max_retries;
        let request = build_request()
            .header(ATTEMPT_HEADER, attempt.to_string())
            .header(IDEMPOTENCY_HEADER, &idempotency_key);

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                return RetryOutcome::Success(response);
            }
            Ok(response) => {
                let status = response.status();
                if last || !should_retry(status, response.headers()) {
                    return RetryOutcome::HttpError(response);
                }
                let delay = config.delay(attempt, Some(response.headers()));
                tracing::debug!(
                    status = %status,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after error status"
                );
                tokio::time::sleep(delay).await;
            }
            Err(source) => {
                if last || !is_retryable_error(&source) {
                    return RetryOutcome::Transport {
                        attempts: attempt + 1,
                        source,
                    };
                }
                let delay = config.delay(attempt, None);
                tracing::debug!(
                    error = %source,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after connection error"
                );
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}


#[cfg(test)]
mod integration_tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn fast_retry_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter_factor: 0.0,
        }
    }

    /// Responds with `failures` copies of `status`, then 200.
    async fn flaky_server(status: u16, failures: u32) -> MockServer {
        let server = MockServer::start().await;
        let seen = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(path("/v1"))
            .respond_with(move |_: &Request| {
                if seen.fetch_add(1, Ordering::SeqCst) < failures {
                    ResponseTemplate::new(status)
                } else {
                    ResponseTemplate::new(200).set_body_string("ok")
                }
            })
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn recovers_from_rate_limit() {
        let server = flaky_server(429, 1).await;
        let client = reqwest::Client::new();
        let url = format!("{}/v1", server.uri());

        let outcome = send_with_retry(|| client.post(&url), &fast_retry_config()).await;

        let RetryOutcome::Success(response) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(response.text().await.unwrap(), "ok");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let server = flaky_server(503, u32::MAX).await;
        let client = reqwest::Client::new();
        let url = format!("{}/v1", server.uri());

        let outcome = send_with_retry(|| client.post(&url), &fast_retry_config()).await;

        let RetryOutcome::HttpError(response) = outcome else {
            panic!("expected HTTP error, got {outcome:?}");
        };
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let server = flaky_server(500, 1).await;
        let client = reqwest::Client::new();
        let url = format!("{}/v1", server.uri());
        let config = fast_retry_config().with_max_retries(0);

        let outcome = send_with_retry(|| client.post(&url), &config).await;

        assert!(matches!(outcome, RetryOutcome::HttpError(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = flaky_server(400, 1).await;
        let client = reqwest::Client::new();
        let url = format!("{}/v1", server.uri());

        let outcome = send_with_retry(|| client.post(&url), &fast_retry_config()).await;

        assert!(matches!(outcome, RetryOutcome::HttpError(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn attempts_share_idempotency_key_and_count_up() {
        let server = MockServer::start().await;
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        Mock::given(method("POST"))
            .respond_with(move |req: &Request| {
                let get = |name: &str| {
                    req.headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                };
                let mut log = recorder.lock().unwrap();
                log.push((get(ATTEMPT_HEADER), get(IDEMPOTENCY_HEADER)));
                if log.len() < 3 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let outcome = send_with_retry(|| client.post(&url), &fast_retry_config()).await;
        assert!(matches!(outcome, RetryOutcome::Success(_)));

        let log = seen.lock().unwrap();
        let attempts: Vec<&str> = log.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(attempts, vec!["0", "1", "2"]);
        assert!(log[0].1.starts_with("reverie-"));
        assert!(log.iter().all(|(_, key)| key == &log[0].1));
    }

    #[tokio::test]
    async fn connection_refused_reports_attempts() {
        // Bind then drop a listener so the port is closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = reqwest::Client::new();
        let outcome = send_with_retry(|| client.post(&url), &fast_retry_config()).await;

        let RetryOutcome::Transport { attempts, .. } = outcome else {
            panic!("expected transport failure, got {outcome:?}");
        };
        assert_eq!(attempts, 3);
    }
}
