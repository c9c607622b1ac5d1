//! Configuration types for the download pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Serializes a [`Duration`] as a whole number of seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Configuration for download operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Deadline for establishing a TCP/TLS connection.
    #[serde(with = "secs")]
    pub connect_timeout: Duration,
    /// Deadline for fetching a landing page during resolution.
    #[serde(with = "secs")]
    pub resolve_timeout: Duration,
    /// Deadline for a whole media download, headers and body included.
    #[serde(with = "secs")]
    pub download_timeout: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            connect_timeout: Duration::from_secs(15),
            resolve_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(600),
            user_agent: concat!("saved-dl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent workers.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the connect deadline.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the landing page fetch deadline.
    #[must_use]
    pub const fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Sets the media download deadline.
    #[must_use]
    pub const fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Builds the HTTP client shared by the resolver and the downloader.
    ///
    /// Redirects are followed with the `Location` URL taken verbatim, so
    /// already-escaped paths are never escaped a second time.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        let redirect = reqwest::redirect::Policy::custom(|attempt| {
            if attempt.previous().len() >= 10 {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        });
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .redirect(redirect)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(client)
    }
}

/// Host tables used by the URL resolver.
///
/// An entry matches a host equal to it or ending in `.` followed by it, so
/// `imgur.com` covers `i.imgur.com`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostRules {
    /// Hosts whose links already point at media.
    pub direct_hosts: Vec<String>,
    /// Landing-page services embedding media through an `og:video` tag.
    pub landing_hosts: Vec<String>,
    /// Image hosts where a `.gifv` path maps to an `.mp4` file.
    pub gifv_hosts: Vec<String>,
}

impl Default for HostRules {
    fn default() -> Self {
        Self {
            direct_hosts: vec![
                "i.redd.it".to_string(),
                "i.imgur.com".to_string(),
                "imgur.com".to_string(),
            ],
            landing_hosts: vec!["gfycat.com".to_string()],
            gifv_hosts: vec!["imgur.com".to_string()],
        }
    }
}

impl HostRules {
    /// Creates rules with no hosts at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            direct_hosts: Vec::new(),
            landing_hosts: Vec::new(),
            gifv_hosts: Vec::new(),
        }
    }

    /// Adds a direct-media host.
    #[must_use]
    pub fn with_direct_host(mut self, host: impl Into<String>) -> Self {
        self.direct_hosts.push(host.into());
        self
    }

    /// Adds a landing-page host.
    #[must_use]
    pub fn with_landing_host(mut self, host: impl Into<String>) -> Self {
        self.landing_hosts.push(host.into());
        self
    }

    /// Adds a `.gifv` rewriting host.
    #[must_use]
    pub fn with_gifv_host(mut self, host: impl Into<String>) -> Self {
        self.gifv_hosts.push(host.into());
        self
    }

    /// Returns true if `host` is a direct-media host.
    #[must_use]
    pub fn is_direct(&self, host: &str) -> bool {
        matches_any(&self.direct_hosts, host)
    }

    /// Returns true if `host` is a landing-page service.
    #[must_use]
    pub fn is_landing(&self, host: &str) -> bool {
        matches_any(&self.landing_hosts, host)
    }

    /// Returns true if `host` rewrites `.gifv` paths.
    #[must_use]
    pub fn is_gifv(&self, host: &str) -> bool {
        matches_any(&self.gifv_hosts, host)
    }
}

fn matches_any(entries: &[String], host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    entries.iter().any(|entry| {
        let entry = entry.to_ascii_lowercase();
        host == entry
            || host
                .strip_suffix(entry.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// The saved-links HTML export.
    pub export_file: PathBuf,
    /// Directory under which one subdirectory per folder is created.
    pub base_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            export_file: PathBuf::from("saved_links.html"),
            base_dir: PathBuf::from("."),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download configuration.
    pub download: DownloadConfig,
    /// Resolver host tables.
    pub hosts: HostRules,
    /// Path configuration.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saved-dl")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.download.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}
