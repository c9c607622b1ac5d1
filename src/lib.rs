//! saved-dl - bulk media downloader for saved-link exports.
//!
//! Parses a saved-links HTML export into jobs, resolves each link to a
//! direct media URL and downloads it with a fixed pool of workers, skipping
//! files already on disk.
//!
//! # Example
//!
//! ```no_run
//! use saved_dl::{AppConfig, Pipeline, read_export};
//!
//! # async fn example() -> saved_dl::Result<()> {
//! let config = AppConfig::default();
//! let jobs = read_export(&config.paths.export_file, &config.paths.base_dir)?;
//!
//! let summary = Pipeline::new(&config)?.run(jobs).await;
//! println!(
//!     "{} processed, {} already existed, {} failed",
//!     summary.processed, summary.existing, summary.failed
//! );
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cli;
pub mod collector;
pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod format;
pub mod fs;
pub mod job;
pub mod pipeline;
pub mod resolve;
pub mod stats;

// Re-export main types for convenience
pub use collector::{ErrorCollector, FailureRecord, FailureReporter};
pub use config::{AppConfig, DownloadConfig, HostRules, PathConfig};
pub use download::{DownloadOutcome, Downloader};
pub use error::{Error, FailureKind, ResolveError, Result, StreamSource};
pub use export::{parse_export, read_export};
pub use format::{format_bytes, format_duration};
pub use fs::{FileSystem, TokioFileSystem};
pub use job::Job;
pub use pipeline::Pipeline;
pub use resolve::Resolver;
pub use stats::{Counters, RunSummary};
