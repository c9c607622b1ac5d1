//! Error types for the saved-dl library.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons a source link could not be turned into a direct media URL.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The link's host is not one the resolver knows how to handle.
    #[error("unsupported host: {url}")]
    UnsupportedHost {
        /// The source link.
        url: String,
    },

    /// The link could not be parsed as a URL.
    #[error("invalid url: {url}")]
    InvalidUrl {
        /// The source link.
        url: String,
    },

    /// The landing page request failed before a response arrived.
    #[error("landing page fetch failed for {url}: {source}")]
    LandingFetch {
        /// The landing page URL.
        url: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },

    /// The landing page answered with a non-2xx status.
    #[error("landing page {url} returned status code {status}")]
    LandingStatus {
        /// The landing page URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The landing page has no usable `og:video` meta tag.
    #[error("no og:video meta tag found on {url}")]
    MissingMetaTag {
        /// The landing page URL.
        url: String,
    },
}

/// Errors that can occur while building or running the download pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// URL resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The media request failed before a response arrived.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },

    /// The media request returned a non-2xx status.
    #[error("url {url} returned status code {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Neither the Content-Type header nor the URL yielded a file extension.
    #[error("cannot determine file extension for {url}")]
    MissingContentType {
        /// The requested URL.
        url: String,
    },

    /// Creating directories or files failed.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Copying the response body to disk failed; the partial file was removed.
    #[error("stream to {} failed for {url}: {source}", .path.display())]
    Stream {
        /// The requested URL.
        url: String,
        /// Destination path that was removed.
        path: PathBuf,
        /// Which side of the copy failed.
        source: StreamSource,
    },

    /// The link export could not be read.
    #[error("cannot read export file {}: {source}", .path.display())]
    Export {
        /// Export file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client construction failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// The side of a body copy that failed.
#[derive(Error, Debug)]
pub enum StreamSource {
    /// Reading the response body failed.
    #[error("reading response body: {0}")]
    Body(#[from] reqwest::Error),

    /// Writing to the destination file failed.
    #[error("writing file: {0}")]
    Write(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`] for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The source link could not be resolved.
    Resolution,
    /// Network or HTTP-level failure while fetching media.
    Transport,
    /// Local filesystem failure.
    Filesystem,
    /// Export or configuration input was unusable.
    Input,
}

impl Error {
    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Resolve(_) => FailureKind::Resolution,
            Self::Transport { .. }
            | Self::Status { .. }
            | Self::MissingContentType { .. }
            | Self::Stream { .. }
            | Self::Http(_) => FailureKind::Transport,
            Self::Filesystem { .. } => FailureKind::Filesystem,
            Self::Export { .. } | Self::Config(_) => FailureKind::Input,
        }
    }
}

/// A specialized `Result` type for saved-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
