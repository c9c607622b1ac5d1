//! Saved-links export parsing.
//!
//! The export is an HTML document with one `<li>` per saved post. The first
//! anchor holds the media link and the second the post permalink, e.g.
//! `https://www.reddit.com/r/<folder>/comments/<leaf>/`.

use std::path::Path;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::error::{Error, Result};
use crate::job::Job;

static LIST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("valid selector"));

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));

/// Segment of the permalink holding the folder name.
const FOLDER_SEGMENT: usize = 4;

/// Reads and parses the export at `path`.
///
/// # Errors
///
/// Returns [`Error::Export`] if the file cannot be read.
pub fn read_export(path: &Path, base_dir: &Path) -> Result<Vec<Job>> {
    let html = std::fs::read_to_string(path).map_err(|source| Error::Export {
        path: path.to_path_buf(),
        source,
    })?;
    let jobs = parse_export(&html, base_dir);
    log::info!("Parsed {} link(s) from {}", jobs.len(), path.display());
    Ok(jobs)
}

/// Builds one job per usable list item.
///
/// Items with fewer than two anchors, or whose permalink lacks a folder or
/// leaf segment, are skipped. Skipped items still consume an index.
#[must_use]
pub fn parse_export(html: &str, base_dir: &Path) -> Vec<Job> {
    let document = Html::parse_document(html);
    let mut jobs = Vec::new();

    for (index, item) in document.select(&LIST_ITEM).enumerate() {
        let anchors: Vec<_> = item.select(&ANCHOR).collect();
        if anchors.len() < 2 {
            continue;
        }
        let Some(url) = anchors[0].value().attr("href").filter(|u| !u.is_empty()) else {
            log::warn!("Item {index} has no media link, skipping");
            continue;
        };
        let permalink = anchors[1].value().attr("href").unwrap_or_default();
        let Some((folder, leaf)) = destination_segments(permalink) else {
            log::warn!("Item {index} has unusable permalink {permalink:?}, skipping");
            continue;
        };
        jobs.push(Job::new(index, url, base_dir, folder, leaf));
    }

    jobs
}

/// Splits a permalink into its folder and leaf segments.
///
/// The folder is the fifth `/`-separated segment and the leaf the
/// second-to-last, so a trailing slash is expected.
#[must_use]
pub fn destination_segments(permalink: &str) -> Option<(&str, &str)> {
    let segments: Vec<&str> = permalink.split('/').collect();
    if segments.len() <= FOLDER_SEGMENT + 1 {
        return None;
    }
    let folder = segments[FOLDER_SEGMENT];
    let leaf = segments[segments.len() - 2];
    let usable = |s: &str| !s.is_empty() && s != "." && s != "..";
    (usable(folder) && usable(leaf)).then_some((folder, leaf))
}
