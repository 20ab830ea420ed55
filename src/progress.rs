//! Progress tracking for batched API operations.
//!
//! Counters are atomics so that every request in a concurrent batch can
//! record its completion through a shared reference.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Processed/expected counters for the running operation.
#[derive(Debug, Default)]
pub struct Progress {
    /// Number of requests that have completed (successfully or not)
    processed: AtomicUsize,

    /// Number of requests the operation expects to issue
    expected: AtomicUsize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation expecting `expected` requests.
    pub fn start(&self, expected: usize) {
        self.processed.store(0, Ordering::SeqCst);
        self.expected.store(expected, Ordering::SeqCst);
    }

    /// Grow the expectation once a later stage knows its size.
    pub fn add_expected(&self, count: usize) {
        self.expected.fetch_add(count, Ordering::SeqCst);
    }

    /// Record one completed request.
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn expected(&self) -> usize {
        self.expected.load(Ordering::SeqCst)
    }

    /// `round(100 * processed / expected)`; 0 while nothing is expected.
    pub fn percent_complete(&self) -> u32 {
        percent(self.processed(), self.expected())
    }

    /// Snapshot of the counters.
    pub fn report(&self) -> ProgressReport {
        let processed = self.processed();
        let expected = self.expected();
        ProgressReport {
            processed,
            expected,
            percent_complete: percent(processed, expected),
        }
    }
}

/// Rounded percentage in integer arithmetic (half rounds up)
fn percent(processed: usize, expected: usize) -> u32 {
    if expected == 0 {
        return 0;
    }
    let rounded = (200 * processed + expected) / (2 * expected);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    /// Number of completed requests
    pub processed: usize,

    /// Number of expected requests
    pub expected: usize,

    /// Completion as a percentage (0-100)
    pub percent_complete: u32,
}
