//! Worker pool and run orchestration.
//!
//! A run builds a bounded job queue, starts the failure collector, spawns a
//! fixed number of workers and then feeds the queue. Shutdown order matters:
//! the queue is closed so workers can drain and exit, workers are joined,
//! and only then is the last failure reporter dropped so the collector can
//! hand back its buffer.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::collector::{ErrorCollector, FailureRecord, FailureReporter};
use crate::config::AppConfig;
use crate::download::{DownloadOutcome, Downloader};
use crate::error::{Error, Result};
use crate::format::{format_bytes, format_duration};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::job::Job;
use crate::resolve::Resolver;
use crate::stats::{Counters, RunSummary};

const SEPARATOR: &str = "===============================";

/// The per-job stages every worker runs.
struct Stages<F: FileSystem> {
    resolver: Resolver,
    downloader: Downloader<F>,
}

impl<F: FileSystem> Stages<F> {
    /// Resolves the job's link and downloads it unless already present.
    async fn process(&self, job: &Job) -> Result<DownloadOutcome> {
        let media = self.resolver.resolve(&job.url).await?;
        self.downloader.download(&media, &job.file_path).await
    }
}

/// A fixed-size pool of download workers.
pub struct Pipeline<F: FileSystem = TokioFileSystem> {
    stages: Arc<Stages<F>>,
    workers: usize,
}

impl Pipeline<TokioFileSystem> {
    /// Builds a pipeline from application configuration.
    ///
    /// The resolver and downloader share one HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = config.download.build_http_client()?;
        let resolver = Resolver::new(
            client.clone(),
            config.hosts.clone(),
            config.download.resolve_timeout,
        );
        let downloader = Downloader::new(client, config.download.download_timeout);
        Ok(Self::from_parts(resolver, downloader, config.download.workers))
    }
}

impl<F: FileSystem + 'static> Pipeline<F> {
    /// Builds a pipeline from explicit stages. A worker count of zero is
    /// raised to one.
    #[must_use]
    pub fn from_parts(resolver: Resolver, downloader: Downloader<F>, workers: usize) -> Self {
        Self {
            stages: Arc::new(Stages {
                resolver,
                downloader,
            }),
            workers: workers.max(1),
        }
    }

    /// Returns the number of workers.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Processes every job and returns the run summary.
    ///
    /// Individual job failures never stop the run; they are collected and
    /// returned in [`RunSummary::failures`].
    pub async fn run(&self, jobs: Vec<Job>) -> RunSummary {
        let started = Instant::now();
        let counters = Arc::new(Counters::new());

        // The collector must exist before any worker can fail.
        let (collector, reporter) = ErrorCollector::start();

        let (job_tx, job_rx) = flume::bounded::<Job>(jobs.len().max(1));

        let mut workers = JoinSet::new();
        for id in 1..=self.workers {
            let queue = job_rx.clone();
            let stages = Arc::clone(&self.stages);
            let counters = Arc::clone(&counters);
            let reporter = reporter.clone();
            workers.spawn(async move {
                worker(id, &queue, &stages, &counters, &reporter).await;
            });
        }
        drop(job_rx);

        for job in jobs {
            if let Err(flume::SendError(job)) = job_tx.send_async(job).await {
                log::error!("All workers exited, job {} not queued", job.url);
                break;
            }
        }
        drop(job_tx);

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                log::error!("Worker task failed: {e}");
            }
        }

        drop(reporter);
        let failures = collector.finish().await;

        let summary = RunSummary::from_counters(&counters, started.elapsed(), failures);
        log_summary(&summary);
        summary
    }
}

/// Pulls jobs until the queue is closed and drained.
async fn worker<F: FileSystem>(
    id: usize,
    jobs: &flume::Receiver<Job>,
    stages: &Stages<F>,
    counters: &Counters,
    reporter: &FailureReporter,
) {
    while let Ok(job) = jobs.recv_async().await {
        log::info!("worker {id} started {}", job.url);
        counters.record_processed();

        match stages.process(&job).await {
            Ok(DownloadOutcome::Downloaded { bytes, .. }) => counters.record_downloaded(bytes),
            Ok(DownloadOutcome::Existing { .. }) => counters.record_existing(),
            Err(error) => {
                counters.record_failed();
                let path = match error {
                    Error::Resolve(_) => None,
                    _ => Some(job.file_path.clone()),
                };
                reporter.report(FailureRecord {
                    error,
                    url: job.url,
                    path,
                });
            }
        }
    }
    log::debug!("worker {id} exiting");
}

fn log_summary(summary: &RunSummary) {
    log::info!("{SEPARATOR}");
    log::info!("Total links processed: {}", summary.processed);
    log::info!("Already existing files count: {}", summary.existing);
    log::info!(
        "Downloaded: {} ({}) in {}",
        summary.downloaded,
        format_bytes(summary.bytes),
        format_duration(summary.elapsed)
    );
    log::info!("Failed: {}", summary.failed);
    log::info!("{SEPARATOR}");

    for failure in &summary.failures {
        log::warn!(
            "{} => {} [{:?}]",
            failure.url,
            failure.error,
            failure.error.kind()
        );
    }
}
