//! Retry logic with a fixed pause for transient transfer failures.
//!
//! When a transfer attempt fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - server errors (5xx), timeouts, resets, short reads
//! - [`FailureType::Permanent`] - other 4xx responses, local filesystem errors
//! - [`FailureType::NeedsAuth`] - the camera rejected the credentials
//! - [`FailureType::Cancelled`] - the user asked the batch to stop
//!
//! The [`RetryPolicy`] then decides whether another attempt is made. The pause
//! between attempts is a constant pacing delay, not exponential backoff.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use timelapse_dl_core::download::{
//!     DownloadError, RetryDecision, RetryPolicy, classify_error,
//! };
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(5));
//! let error = DownloadError::http_status("http://cam/archives?export=1", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Classification of transfer failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, 5xx server errors, connection reset.
    Transient,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 400 Bad Request, cannot create temp file.
    Permanent,

    /// Authentication or authorization rejected.
    NeedsAuth,

    /// Cancellation was requested; never retried.
    Cancelled,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the transfer from byte zero after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the transfer.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry configuration: how many retries after the first attempt, and the
/// fixed pause between them.
///
/// With `max_retries = 3` an archive gets up to four attempts in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` retries, each preceded by `delay`.
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retries() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns the configured retry ceiling.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the total number of attempts an archive may receive.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry a failed attempt.
    ///
    /// `attempt` is the 1-indexed number of the attempt that just failed.
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "authentication rejected - retry with the same credentials would not help"
                        .to_string(),
                };
            }
            FailureType::Cancelled => {
                return RetryDecision::DoNotRetry {
                    reason: "cancelled".to_string(),
                };
            }
            FailureType::Transient => {}
        }

        if attempt >= self.max_attempts() {
            debug!(attempt, max = self.max_attempts(), "retries exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retries ({}) exhausted", self.max_retries),
            };
        }

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = self.delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a transfer error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 401 / 403 / 407 | NeedsAuth |
/// | other HTTP 4xx | Permanent |
/// | HTTP 5xx | Transient |
/// | Timeout, Network | Transient |
/// | Integrity (short read) | Transient |
/// | Io, InvalidUrl | Permanent |
/// | Cancelled | Cancelled |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),
        DownloadError::AuthRequired { .. } => FailureType::NeedsAuth,
        DownloadError::Timeout { .. }
        | DownloadError::Network { .. }
        | DownloadError::Integrity { .. } => FailureType::Transient,
        DownloadError::Io { .. } | DownloadError::InvalidUrl { .. } => FailureType::Permanent,
        DownloadError::Cancelled => FailureType::Cancelled,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 | 407 => FailureType::NeedsAuth,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}
