use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::transport::{TransportError, TransportResponse};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: usize,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_factor: 2.0,
        }
    }
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Delay slept after the failed attempt with 0-based index `attempt`, capped at
/// [`MAX_BACKOFF`].
pub fn backoff_delay(backoff_factor: f64, attempt: usize) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = backoff_factor.powi(exponent);
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connection,
    Server(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug)]
pub enum AttemptOutcome {
    Success(TransportResponse),
    Retryable(RetryableFailure),
    Fatal(PipelineError),
}

pub fn classify(url: &str, result: Result<TransportResponse, TransportError>) -> AttemptOutcome {
    match result {
        Ok(response) if response.status < 400 => AttemptOutcome::Success(response),
        Ok(response) if response.status >= 500 => AttemptOutcome::Retryable(RetryableFailure {
            kind: FailureKind::Server(response.status),
            message: format!("{url} returned status {}", response.status),
        }),
        Ok(response) if response.status == 404 => {
            AttemptOutcome::Fatal(PipelineError::NotFound(url.to_string()))
        }
        Ok(response) => AttemptOutcome::Fatal(PipelineError::Status {
            status: response.status,
            message: summarize_body(&response.body),
        }),
        Err(TransportError::Timeout(message)) => AttemptOutcome::Retryable(RetryableFailure {
            kind: FailureKind::Timeout,
            message,
        }),
        Err(TransportError::Connection(message)) => AttemptOutcome::Retryable(RetryableFailure {
            kind: FailureKind::Connection,
            message,
        }),
        Err(TransportError::Other(message)) => AttemptOutcome::Fatal(PipelineError::RequestFailed {
            attempts: 1,
            message,
        }),
    }
}

enum RetryState {
    Attempting(usize),
    Failed {
        attempt: usize,
        failure: RetryableFailure,
    },
}

/// Fatal failures are returned as is; exhausted retries become `RequestFailed`.
pub fn run_with_retry<F>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    url: &str,
    mut attempt: F,
) -> Result<TransportResponse, PipelineError>
where
    F: FnMut(usize) -> Result<TransportResponse, TransportError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut state = RetryState::Attempting(0);
    loop {
        state = match state {
            RetryState::Attempting(index) => {
                debug!(url, attempt = index + 1, max_attempts, "sending request");
                match classify(url, attempt(index)) {
                    AttemptOutcome::Success(response) => return Ok(response),
                    AttemptOutcome::Fatal(PipelineError::RequestFailed { message, .. }) => {
                        return Err(PipelineError::RequestFailed {
                            attempts: index + 1,
                            message,
                        });
                    }
                    AttemptOutcome::Fatal(err) => return Err(err),
                    AttemptOutcome::Retryable(failure) => RetryState::Failed {
                        attempt: index,
                        failure,
                    },
                }
            }
            RetryState::Failed { attempt, failure } => {
                if attempt + 1 >= max_attempts {
                    return Err(PipelineError::RequestFailed {
                        attempts: attempt + 1,
                        message: failure.message,
                    });
                }
                let delay = backoff_delay(policy.backoff_factor, attempt);
                warn!(
                    url,
                    attempt = attempt + 1,
                    max_attempts,
                    kind = ?failure.kind,
                    error = %failure.message,
                    delay_ms = delay.as_millis() as u64,
                    "retryable request failure"
                );
                sleeper.sleep(delay);
                RetryState::Attempting(attempt + 1)
            }
        };
    }
}

fn summarize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "request rejected".to_string();
    }
    trimmed.chars().take(200).collect()
}
