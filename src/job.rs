//! Units of work handed to the worker pool.

use std::path::{Path, PathBuf};

/// One saved link to resolve and download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Ordinal of the link in the export.
    pub index: usize,
    /// The saved source link.
    pub url: String,
    /// Destination file path without extension.
    pub file_path: PathBuf,
    /// Directory the file is written into.
    pub folder_path: PathBuf,
}

impl Job {
    /// Creates a job for `url` saved as `leaf` under `base_dir/folder`.
    #[must_use]
    pub fn new(
        index: usize,
        url: impl Into<String>,
        base_dir: &Path,
        folder: &str,
        leaf: &str,
    ) -> Self {
        let folder_path = base_dir.join(folder);
        let file_path = folder_path.join(leaf);
        Self {
            index,
            url: url.into(),
            file_path,
            folder_path,
        }
    }
}
