//! Retryable fetcher over the authenticated archive session.
//!
//! # Features
//!
//! - GET/POST with query parameters through one cookie-backed session
//! - Bounded retry on connection-level failures only
//! - Immediate retries by default, `attempt²` backoff on request
//! - Fetch/retry counters for the end-of-run summary

mod client;
mod error;
mod retry;
mod stats;

pub use client::{CONNECT_TIMEOUT_SECS, FetchTimeouts, Fetcher, HttpMethod, READ_TIMEOUT_SECS};
pub use error::FetchError;
pub use retry::{
    Backoff, DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
};
pub use stats::FetchStats;
