//! Source link resolution.
//!
//! Turns a saved link into a URL that can be fetched directly. Links on
//! direct-media hosts pass through untouched, `.gifv` links on image hosts
//! are rewritten to their `.mp4` twin, and links to landing-page services
//! are fetched so the embedded video can be read from the page's
//! `og:video` meta tag.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Url;
use scraper::{Html, Selector};

use crate::config::HostRules;
use crate::error::ResolveError;

static OG_VIDEO: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:video"]"#).expect("valid selector")
});

/// Resolves source links into direct media URLs.
#[derive(Debug, Clone)]
pub struct Resolver {
    client: reqwest::Client,
    rules: HostRules,
    timeout: Duration,
}

impl Resolver {
    /// Creates a resolver using `client` for landing page fetches, each
    /// bounded by `timeout`.
    #[must_use]
    pub const fn new(client: reqwest::Client, rules: HostRules, timeout: Duration) -> Self {
        Self {
            client,
            rules,
            timeout,
        }
    }

    /// Resolves `source` into a directly downloadable URL.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnsupportedHost`] when no host rule matches,
    /// and a fetch, status or meta-tag error when a landing page cannot be
    /// turned into a media URL.
    pub async fn resolve(&self, source: &str) -> Result<String, ResolveError> {
        let url = Url::parse(source).map_err(|_| ResolveError::InvalidUrl {
            url: source.to_string(),
        })?;
        let Some(host) = url.host_str() else {
            return Err(ResolveError::InvalidUrl {
                url: source.to_string(),
            });
        };

        if self.rules.is_landing(host) {
            let media = self.fetch_landing_media(source).await?;
            return Ok(upgrade_landing_media_url(&media));
        }

        if self.rules.is_gifv(host)
            && let Some(rewritten) = rewrite_gifv(&url)
        {
            return Ok(rewritten);
        }

        if self.rules.is_direct(host) {
            return Ok(source.to_string());
        }

        Err(ResolveError::UnsupportedHost {
            url: source.to_string(),
        })
    }

    /// Fetches a landing page and returns the raw `og:video` content.
    async fn fetch_landing_media(&self, page: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(page)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ResolveError::LandingFetch {
                url: page.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::LandingStatus {
                url: page.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ResolveError::LandingFetch {
                url: page.to_string(),
                source,
            })?;

        extract_og_video(&body).ok_or_else(|| ResolveError::MissingMetaTag {
            url: page.to_string(),
        })
    }
}

/// Returns the non-empty `content` of the first `og:video` meta tag.
#[must_use]
pub fn extract_og_video(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&OG_VIDEO)
        .filter_map(|tag| tag.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

/// Points a landing-page media URL at its highest quality variant.
///
/// The thumbnail CDN subdomain is swapped for the full-size one and the
/// mobile suffix is dropped; each substitution applies once.
#[must_use]
pub fn upgrade_landing_media_url(media: &str) -> String {
    media.replacen("thumbs", "giant", 1).replacen("-mobile", "", 1)
}

/// Rewrites a `.gifv` path to `.mp4`, or returns `None` for other paths.
fn rewrite_gifv(url: &Url) -> Option<String> {
    let path = url.path();
    let split = path.len().checked_sub(".gifv".len())?;
    if !path.is_char_boundary(split) || !path[split..].eq_ignore_ascii_case(".gifv") {
        return None;
    }
    let mut rewritten = url.clone();
    rewritten.set_path(&format!("{}.mp4", &path[..split]));
    Some(rewritten.to_string())
}
