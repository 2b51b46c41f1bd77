use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::KiraError;

/// Fixed-delay retry policy shared by every HTTP client in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.http_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("kira-ts/", env!("CARGO_PKG_VERSION"))),
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

/// Why a retried request finally failed.
#[derive(Debug)]
pub enum FetchError {
    /// Non-success status after retries, with the (truncated) response body.
    Status { status: u16, message: String },
    Transport(reqwest::Error),
}

impl FetchError {
    /// Maps onto the calling client's own `*Http` / `*Status` variants.
    pub fn into_kira<H, S>(self, transport: H, status: S) -> KiraError
    where
        H: FnOnce(String) -> KiraError,
        S: FnOnce(u16, String) -> KiraError,
    {
        match self {
            FetchError::Status {
                status: code,
                message,
            } => status(code, message),
            FetchError::Transport(err) => transport(err.to_string()),
        }
    }
}

/// Sends the request built by `make_req` and reads the body with `read`,
/// repeating both on transient failures.
///
/// A connection dropped while the body is streaming is retried like a failed
/// connect, so `read` must not leave partial state behind between attempts.
pub fn fetch_with_retries<T, F, R>(
    policy: RetryPolicy,
    mut make_req: F,
    mut read: R,
) -> Result<T, FetchError>
where
    F: FnMut() -> RequestBuilder,
    R: FnMut(Response) -> Result<T, reqwest::Error>,
{
    let mut attempt = 0usize;
    loop {
        let outcome = match make_req().send() {
            Ok(resp) if resp.status().is_success() => read(resp),
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < policy.max_retries && is_retryable_status(status) {
                    debug!(status, attempt, "retrying after retryable status");
                    thread::sleep(policy.delay);
                    attempt += 1;
                    continue;
                }
                let message = resp
                    .text()
                    .map(|body| truncate(&body, 512))
                    .unwrap_or_else(|_| "request failed".to_string());
                return Err(FetchError::Status { status, message });
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && is_retryable_error(&err) => {
                debug!(error = %err, attempt, "retrying after transport error");
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(err) => return Err(FetchError::Transport(err)),
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() || err.is_decode()
}

fn truncate(value: &str, max: usize) -> String {
    let trimmed = value.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
