//! Run counters and end-of-run summary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::collector::FailureRecord;

/// Process-wide counters shared by all workers.
///
/// Every field is only ever incremented.
#[derive(Debug, Default)]
pub struct Counters {
    processed: AtomicU64,
    existing: AtomicU64,
    downloaded: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
}

impl Counters {
    /// Creates zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            existing: AtomicU64::new(0),
            downloaded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Records that a worker picked up a job.
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file skipped because it was already on disk.
    pub fn record_existing(&self) {
        self.existing.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed download of `bytes` bytes.
    pub fn record_downloaded(&self, bytes: u64) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a failed job.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total jobs picked up by workers.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Files skipped as already existing.
    #[must_use]
    pub fn existing(&self) -> u64 {
        self.existing.load(Ordering::Relaxed)
    }

    /// Files written to disk.
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Jobs that ended in failure.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Total bytes written to disk.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    /// Jobs picked up by workers.
    pub processed: u64,
    /// Files skipped because they already existed.
    pub existing: u64,
    /// Files downloaded.
    pub downloaded: u64,
    /// Jobs that failed.
    pub failed: u64,
    /// Bytes written to disk.
    pub bytes: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Every failure reported during the run.
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// Snapshots the counters once all workers have finished.
    #[must_use]
    pub fn from_counters(
        counters: &Counters,
        elapsed: Duration,
        failures: Vec<FailureRecord>,
    ) -> Self {
        Self {
            processed: counters.processed(),
            existing: counters.existing(),
            downloaded: counters.downloaded(),
            failed: counters.failed(),
            bytes: counters.bytes(),
            elapsed,
            failures,
        }
    }

    /// Returns true when every processed job ended as downloaded, existing or failed.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.downloaded + self.existing + self.failed == self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_start_at_zero() {
        let c = Counters::new();
        assert_eq!(c.processed(), 0);
        assert_eq!(c.existing(), 0);
        assert_eq!(c.downloaded(), 0);
        assert_eq!(c.failed(), 0);
        assert_eq!(c.bytes(), 0);
    }

    #[test]
    fn counters_accumulate_across_threads() {
        let c = Arc::new(Counters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        c.record_processed();
                        c.record_downloaded(10);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.processed(), 800);
        assert_eq!(c.downloaded(), 800);
        assert_eq!(c.bytes(), 8000);
    }

    #[test]
    fn summary_balance() {
        let c = Counters::new();
        for _ in 0..3 {
            c.record_processed();
        }
        c.record_downloaded(5);
        c.record_existing();
        c.record_failed();

        let summary = RunSummary::from_counters(&c, Duration::from_secs(1), Vec::new());
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.bytes, 5);
        assert!(summary.is_balanced());
    }

    #[test]
    fn summary_unbalanced_when_outcome_missing() {
        let c = Counters::new();
        c.record_processed();
        let summary = RunSummary::from_counters(&c, Duration::ZERO, Vec::new());
        assert!(!summary.is_balanced());
    }
}
