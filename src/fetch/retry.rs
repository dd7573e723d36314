//! Bounded retry for connection-level fetch failures.
//!
//! A failed fetch is classified into a [`FailureType`]; the [`RetryPolicy`]
//! then decides whether another attempt is made and how long to wait first.
//!
//! Only connectivity failures are retried. HTTP error statuses and content
//! problems are left to the caller, which knows whether the page is usable.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use newsbinder_core::fetch::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::quadratic(3, Duration::from_secs(1));
//! match policy.should_retry(FailureType::Transient, 2) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(4));
//!         assert_eq!(attempt, 3);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::FetchError;

/// Default maximum attempts per fetch, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Classification of fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Connectivity hiccup that may succeed on retry.
    ///
    /// Examples: refused connection, reset, timeout.
    Transient,

    /// Failure that a retry cannot fix.
    ///
    /// Examples: HTTP error status, invalid URL, TLS certificate rejection.
    Permanent,
}

/// Wait strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry right away.
    Immediate,

    /// Wait `unit * attempt²` after the failed attempt (1-indexed).
    Quadratic {
        /// Base unit, one second in production.
        unit: Duration,
    },
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number comes next (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry budget plus wait strategy.
///
/// The default allows three attempts with no delay, which is what page and
/// TOC fetches use. Metadata fetches use [`RetryPolicy::quadratic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay strategy between attempts.
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Immediate,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Retries without waiting.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::Immediate)
    }

    /// Retries after `unit * attempt²`.
    #[must_use]
    pub fn quadratic(max_attempts: u32, unit: Duration) -> Self {
        Self::new(max_attempts, Backoff::Quadratic { unit })
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the wait strategy.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.delay_after(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Delay to wait after the given failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Immediate => Duration::ZERO,
            Backoff::Quadratic { unit } => unit.saturating_mul(attempt.saturating_mul(attempt)),
        }
    }
}

/// Classifies a fetch error for retry decisions.
///
/// | Error | Type | Rationale |
/// |-------|------|-----------|
/// | Timeout | Transient | Network may recover |
/// | Network (most) | Transient | Connection may come back |
/// | Network (TLS) | Permanent | Certificate/config issue |
/// | HttpStatus | Permanent | The archive answered; caller decides |
/// | InvalidUrl | Permanent | Won't succeed |
/// | ClientBuild | Permanent | Local setup issue |
#[instrument]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::Timeout { .. } => FailureType::Transient,
        FetchError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        FetchError::HttpStatus { .. }
        | FetchError::InvalidUrl { .. }
        | FetchError::ClientBuild { .. } => FailureType::Permanent,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}
