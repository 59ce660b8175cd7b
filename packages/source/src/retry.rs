//! Retry with exponential backoff.
//!
//! Operations report the outcome of each try as an [`Attempt`]: finished,
//! worth retrying, or hopeless. [`with_backoff`] drives the loop, so
//! business code never decides how long to sleep or when to give up.
//!
//! HTTP fetchers should use [`send_json`] or [`send_json_optional`] instead
//! of calling `reqwest::RequestBuilder::send()` directly. They classify
//! connection failures, timeouts, HTTP 429, HTTP 5xx and undecodable bodies
//! as retryable and every other 4xx as fatal.
//!
//! # Usage
//!
//! ```ignore
//! use crate::retry::{self, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let body = retry::send_json(&policy, "QuickStats", || client.get(&url)).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::SourceError;

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The operation succeeded.
    Done(T),
    /// The operation failed transiently and may succeed if tried again.
    Retry(E),
    /// The operation failed in a way retrying cannot fix.
    Fatal(E),
}

/// How many times to try and how long to wait in between.
///
/// After failed attempt `n` (zero-based) the loop sleeps
/// `base_delay * 2^n`, so the default policy waits 1s, 2s, 4s and 8s
/// between its five attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping. Meant for tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

/// Why [`with_backoff`] gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryFailure<E> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last: E,
    },

    /// An attempt failed with a non-retryable error.
    #[error("{0}")]
    Fatal(E),
}

impl<E: std::fmt::Display> RetryFailure<E> {
    /// Converts into a [`SourceError`], keeping fatal errors as they are and
    /// summarising exhaustion as [`SourceError::Retry`].
    pub fn into_source_error(self, label: &str) -> SourceError
    where
        E: Into<SourceError>,
    {
        match self {
            Self::Exhausted { attempts, last } => SourceError::Retry {
                label: label.to_string(),
                attempts,
                message: last.to_string(),
            },
            Self::Fatal(e) => e.into(),
        }
    }
}

/// Runs `op` until it reports [`Attempt::Done`] or [`Attempt::Fatal`], or
/// until `policy.max_attempts` tries have failed.
///
/// `op` receives the zero-based attempt number. `label` names the
/// operation in log messages.
///
/// # Errors
///
/// Returns [`RetryFailure::Fatal`] on the first fatal error, or
/// [`RetryFailure::Exhausted`] carrying the last error when every attempt
/// failed.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(e) => {
                log::error!("{label}: {e}");
                return Err(RetryFailure::Fatal(e));
            }
            Attempt::Retry(e) => {
                if attempt + 1 >= max_attempts {
                    log::error!("{label}: giving up after {max_attempts} attempts: {e}");
                    return Err(RetryFailure::Exhausted {
                        attempts: max_attempts,
                        last: e,
                    });
                }
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "{label}: attempt {}/{max_attempts} failed: {e}; retrying in {delay:?}",
                    attempt + 1
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}

/// Sends an HTTP request and parses the response body as JSON, retrying
/// transient failures according to `policy`.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (since builders are consumed by
/// `.send()`).
///
/// # Errors
///
/// Returns [`SourceError`] if the server answers with a non-retryable
/// status, or if every attempt fails.
pub async fn send_json<F>(
    policy: &RetryPolicy,
    label: &str,
    build_request: F,
) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    with_backoff(policy, label, |_| attempt_json(&build_request, false))
        .await
        .map_err(|e| e.into_source_error(label))?
        .ok_or_else(|| SourceError::Normalization {
            message: format!("{label}: empty response"),
        })
}

/// Like [`send_json`], but an HTTP 404 yields `Ok(None)` instead of an
/// error. Used for services that answer "no data here" with 404.
///
/// # Errors
///
/// Returns [`SourceError`] if the server answers with another
/// non-retryable status, or if every attempt fails.
pub async fn send_json_optional<F>(
    policy: &RetryPolicy,
    label: &str,
    build_request: F,
) -> Result<Option<serde_json::Value>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    with_backoff(policy, label, |_| attempt_json(&build_request, true))
        .await
        .map_err(|e| e.into_source_error(label))
}

/// One HTTP round trip, classified.
async fn attempt_json<F>(
    build_request: &F,
    not_found_is_empty: bool,
) -> Attempt<Option<serde_json::Value>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = match build_request().send().await {
        Ok(response) => response,
        Err(e) if is_transient(&e) => return Attempt::Retry(http_error(e)),
        Err(e) => return Attempt::Fatal(http_error(e)),
    };

    let status = response.status();

    if not_found_is_empty && status == reqwest::StatusCode::NOT_FOUND {
        return Attempt::Done(None);
    }
    if let Some(attempt) = classify_status(status) {
        return attempt;
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    match response.text().await {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(value) => Attempt::Done(Some(value)),
            Err(json_err) => {
                log::warn!(
                    "JSON parse failed\n  \
                     status: {status}\n  \
                     content-type: {content_type:?}\n  \
                     received: {} bytes\n  \
                     parse error: {json_err}\n  \
                     body preview: {}",
                    text.len(),
                    preview(&text),
                );
                Attempt::Retry(SourceError::Json(json_err))
            }
        },
        Err(e) => Attempt::Retry(http_error(e)),
    }
}

/// Maps a non-success status to an attempt outcome. Returns `None` for
/// statuses whose body should be read.
fn classify_status<T>(status: reqwest::StatusCode) -> Option<Attempt<T, SourceError>> {
    let error = || SourceError::Normalization {
        message: format!("HTTP {status}"),
    };

    // 429 Too Many Requests and 5xx are worth another try.
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Some(Attempt::Retry(error()));
    }
    // Any other 4xx is permanent.
    if status.is_client_error() {
        return Some(Attempt::Fatal(error()));
    }
    None
}

/// Drops the request URL from the error. Query strings can carry API keys,
/// and these errors end up in logs.
fn http_error(e: reqwest::Error) -> SourceError {
    SourceError::Http(e.without_url())
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn default_policy_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        let delays: Vec<u64> = (0..4).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8]);
    }

    #[tokio::test]
    async fn retries_until_done() {
        let calls = Cell::new(0);
        let result: Result<u32, RetryFailure<String>> =
            with_backoff(&RetryPolicy::immediate(5), "flaky", |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 2 {
                        Attempt::Retry(format!("attempt {attempt} failed"))
                    } else {
                        Attempt::Done(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn stops_at_attempt_cap() {
        let calls = Cell::new(0);
        let result: Result<(), RetryFailure<String>> =
            with_backoff(&RetryPolicy::immediate(5), "down", |_| {
                calls.set(calls.get() + 1);
                async { Attempt::Retry("connection refused".to_string()) }
            })
            .await;

        assert_eq!(calls.get(), 5);
        match result {
            Err(RetryFailure::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 5);
                assert_eq!(last, "connection refused");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), RetryFailure<String>> =
            with_backoff(&RetryPolicy::immediate(5), "bad key", |_| {
                calls.set(calls.get() + 1);
                async { Attempt::Fatal("HTTP 401".to_string()) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(RetryFailure::Fatal(_))));
    }

    #[test]
    fn exhaustion_becomes_retry_source_error() {
        let failure: RetryFailure<SourceError> = RetryFailure::Exhausted {
            attempts: 5,
            last: SourceError::Normalization {
                message: "HTTP 503".to_string(),
            },
        };
        match failure.into_source_error("QuickStats VEGETABLES") {
            SourceError::Retry {
                label, attempts, ..
            } => {
                assert_eq!(label, "QuickStats VEGETABLES");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn classifies_statuses() {
        use reqwest::StatusCode;

        assert!(matches!(
            classify_status::<()>(StatusCode::TOO_MANY_REQUESTS),
            Some(Attempt::Retry(_))
        ));
        assert!(matches!(
            classify_status::<()>(StatusCode::BAD_GATEWAY),
            Some(Attempt::Retry(_))
        ));
        assert!(matches!(
            classify_status::<()>(StatusCode::UNAUTHORIZED),
            Some(Attempt::Fatal(_))
        ));
        assert!(classify_status::<()>(StatusCode::OK).is_none());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(400);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.len() <= BODY_PREVIEW_LEN + 3);
    }
}
