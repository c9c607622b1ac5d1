//! Out-of-band failure collection.
//!
//! Workers report failures through cloned [`FailureReporter`] handles; a
//! single consumer task owns the accumulation buffer. The buffer is handed
//! back once every reporter has been dropped, so nothing sent before that
//! point can be lost.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Error;

/// One job's failure, kept for end-of-run reporting.
#[derive(Debug)]
pub struct FailureRecord {
    /// What went wrong.
    pub error: Error,
    /// The source link of the failed job.
    pub url: String,
    /// Destination path, when one was known.
    pub path: Option<PathBuf>,
}

/// Sending half of the failure queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FailureReporter {
    tx: mpsc::UnboundedSender<FailureRecord>,
}

impl FailureReporter {
    /// Queues a failure for the collector.
    pub fn report(&self, record: FailureRecord) {
        if let Err(mpsc::error::SendError(record)) = self.tx.send(record) {
            // Only possible if the collector task died.
            log::error!("Failure dropped for {}: {}", record.url, record.error);
        }
    }
}

/// The single consumer of the failure queue.
pub struct ErrorCollector {
    handle: JoinHandle<Vec<FailureRecord>>,
}

impl ErrorCollector {
    /// Spawns the collector task and returns it with its first reporter.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start() -> (Self, FailureReporter) {
        let (tx, mut rx) = mpsc::unbounded_channel::<FailureRecord>();
        let handle = tokio::spawn(async move {
            let mut failures = Vec::new();
            while let Some(record) = rx.recv().await {
                failures.push(record);
            }
            failures
        });
        (Self { handle }, FailureReporter { tx })
    }

    /// Waits for the queue to close and returns every collected failure.
    ///
    /// Resolves only after all [`FailureReporter`] clones have been dropped.
    pub async fn finish(self) -> Vec<FailureRecord> {
        match self.handle.await {
            Ok(failures) => failures,
            Err(e) => {
                log::error!("Failure collector task failed: {e}");
                Vec::new()
            }
        }
    }
}
