//! Fetch counters for end-of-run reporting.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts fetch calls and retries made during one run.
///
/// Non-authoritative; only used for the operator summary. Owned by the run
/// context and shared with the fetcher through an `Arc`.
#[derive(Debug, Default)]
pub struct FetchStats {
    fetches: AtomicUsize,
    retries: AtomicUsize,
}

impl FetchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of fetch calls made.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Returns the number of retry attempts made.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.retries.load(Ordering::SeqCst)
    }

    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = FetchStats::new();
        assert_eq!(stats.fetches(), 0);
        assert_eq!(stats.retries(), 0);
    }

    #[test]
    fn test_stats_count_independently() {
        let stats = FetchStats::new();
        stats.record_fetch();
        stats.record_fetch();
        stats.record_retry();
        assert_eq!(stats.fetches(), 2);
        assert_eq!(stats.retries(), 1);
    }
}
