//! Media download: fetch, name by content type, stream to disk.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result, StreamSource};
use crate::format::format_bytes;
use crate::fs::{FileSystem, TokioFileSystem};

/// What a successful download call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The body was written to `path`.
    Downloaded {
        /// Final file path, extension included.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// A file already occupied `path`; the body was not read.
    Existing {
        /// Final file path, extension included.
        path: PathBuf,
    },
}

/// Fetches resolved media URLs into files.
pub struct Downloader<F: FileSystem = TokioFileSystem> {
    client: reqwest::Client,
    timeout: Duration,
    fs: F,
}

impl Downloader<TokioFileSystem> {
    /// Creates a new downloader with the default file system.
    #[must_use]
    pub const fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            fs: TokioFileSystem,
        }
    }
}

impl<F: FileSystem> Downloader<F> {
    /// Creates a new downloader with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(client: reqwest::Client, timeout: Duration, fs: F) -> Self {
        Self { client, timeout, fs }
    }

    /// Downloads `url` to `dest` plus an extension taken from the response.
    ///
    /// The existence check runs after the response headers arrive, since the
    /// extension is only known then. An existing file is never overwritten.
    /// If copying the body fails the partial file is removed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, an unknown
    /// extension, or when the destination cannot be created or written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| Error::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let ext = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_from_content_type)
            .or_else(|| extension_from_url(response.url().path()))
            .ok_or_else(|| Error::MissingContentType {
                url: url.to_string(),
            })?;
        let path = with_extension(dest, &ext);

        if self.fs.file_exists(&path).await {
            log::debug!("Skipping existing file {}", path.display());
            return Ok(DownloadOutcome::Existing { path });
        }

        self.ensure_parent_dir(&path).await?;

        let mut file = match self.fs.create_file(&path).await {
            Ok(file) => file,
            // Another job claimed the same path after the existence check.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                log::debug!("Skipping file created concurrently {}", path.display());
                return Ok(DownloadOutcome::Existing { path });
            }
            Err(source) => {
                log::error!("Cannot create {}: {source}", path.display());
                return Err(Error::Filesystem { path, source });
            }
        };

        let mut bytes: u64 = 0;
        let copied: std::result::Result<(), StreamSource> = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                bytes += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;
        drop(file);

        if let Err(source) = copied {
            if let Err(e) = self.fs.remove_file(&path).await {
                log::warn!("Cannot remove partial file {}: {e}", path.display());
            }
            return Err(Error::Stream {
                url: url.to_string(),
                path,
                source,
            });
        }

        log::info!(
            "Just downloaded {} with size {} from {url}",
            path.display(),
            format_bytes(bytes)
        );
        Ok(DownloadOutcome::Downloaded { path, bytes })
    }

    /// Ensures the parent directory exists for a file path.
    async fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(parent)
                .await
                .map_err(|source| Error::Filesystem {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Derives a file extension from the last segment of a MIME type.
///
/// `"video/mp4"` gives `"mp4"`; parameters after `;` are ignored.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim();
    let ext = essence.rsplit('/').next()?.trim().to_ascii_lowercase();
    (!ext.is_empty() && essence.contains('/')).then_some(ext)
}

/// Derives a file extension from the last segment of a URL path.
fn extension_from_url(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    Path::new(segment)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Appends `.ext` to `dest` without touching any dots already in it.
fn with_extension(dest: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> Downloader {
        Downloader::new(reqwest::Client::new(), Duration::from_secs(5))
    }

    /// Reports every path as absent, as if another job had not yet
    /// finished creating it.
    struct StaleExistence;

    #[async_trait]
    impl FileSystem for StaleExistence {
        async fn file_exists(&self, _path: &Path) -> bool {
            false
        }

        async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
            TokioFileSystem.create_dir_all(path).await
        }

        async fn create_file(&self, path: &Path) -> std::io::Result<tokio::fs::File> {
            TokioFileSystem.create_file(path).await
        }

        async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
            TokioFileSystem.remove_file(path).await
        }
    }

    /// Serves one response that promises `declared` body bytes but sends
    /// only `body` before closing the connection.
    async fn truncated_server(declared: usize, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {declared}\r\n\r\n"
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.flush().await.unwrap();
        });
        format!("http://{addr}/clip")
    }

    #[test]
    fn content_type_extensions() {
        assert_eq!(extension_from_content_type("video/mp4").as_deref(), Some("mp4"));
        assert_eq!(
            extension_from_content_type("image/JPEG; charset=binary").as_deref(),
            Some("jpeg")
        );
        assert_eq!(extension_from_content_type("mp4"), None);
        assert_eq!(extension_from_content_type("video/"), None);
        assert_eq!(extension_from_content_type(""), None);
    }

    #[test]
    fn url_extensions() {
        assert_eq!(extension_from_url("/abc.jpg").as_deref(), Some("jpg"));
        assert_eq!(extension_from_url("/a.b/c"), None);
        assert_eq!(extension_from_url("/"), None);
    }

    #[test]
    fn extension_appended_verbatim() {
        assert_eq!(
            with_extension(Path::new("/tmp/out/v1.2"), "mp4"),
            PathBuf::from("/tmp/out/v1.2.mp4")
        );
    }

    #[tokio::test]
    async fn downloads_and_names_by_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "video/mp4")
                    .set_body_bytes(b"0123456789".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("folder").join("clip");
        let outcome = downloader()
            .download(&format!("{}/media", server.uri()), &dest)
            .await
            .unwrap();

        let expected = dir.path().join("folder").join("clip.mp4");
        assert_eq!(
            outcome,
            DownloadOutcome::Downloaded {
                path: expected.clone(),
                bytes: 10
            }
        );
        assert_eq!(std::fs::read(&expected).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn existing_file_not_overwritten() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(b"new".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("pic.jpeg");
        std::fs::write(&existing, b"old").unwrap();

        let outcome = downloader()
            .download(&format!("{}/a.jpg", server.uri()), &dir.path().join("pic"))
            .await
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::Existing { path: existing.clone() });
        assert_eq!(std::fs::read(&existing).unwrap(), b"old");
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let url = format!("{}/missing", server.uri());
        let err = downloader()
            .download(&url, &dir.path().join("x"))
            .await
            .unwrap_err();
        match err {
            Error::Status { url: u, status } => {
                assert_eq!(u, url);
                assert_eq!(status, 404);
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn falls_back_to_url_extension() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pic.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let outcome = downloader()
            .download(&format!("{}/pic.png", server.uri()), &dir.path().join("p"))
            .await
            .unwrap();
        assert!(matches!(outcome, DownloadOutcome::Downloaded { ref path, .. } if path.ends_with("p.png")));
    }

    #[tokio::test]
    async fn no_extension_anywhere_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"?".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = downloader()
            .download(&format!("{}/blob", server.uri()), &dir.path().join("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingContentType { .. }));
    }

    #[tokio::test]
    async fn follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/new%20file.gif"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new%20file.gif"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/gif")
                    .set_body_bytes(b"GIF89a".to_vec()),
            )
            .mount(&server)
            .await;

        let client = crate::config::DownloadConfig::default()
            .build_http_client()
            .unwrap();
        let dl = Downloader::new(client, Duration::from_secs(5));
        let dir = TempDir::new().unwrap();
        let outcome = dl
            .download(&format!("{}/old", server.uri()), &dir.path().join("g"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Downloaded {
                path: dir.path().join("g.gif"),
                bytes: 6
            }
        );
    }

    #[tokio::test]
    async fn create_failure_reported_as_filesystem_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(b"x".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        // The "folder" is a regular file, so the parent cannot be created.
        let blocker = dir.path().join("folder");
        std::fs::write(&blocker, b"").unwrap();

        let err = downloader()
            .download(&format!("{}/a", server.uri()), &blocker.join("leaf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[tokio::test]
    async fn truncated_body_removes_partial_file() {
        let url = truncated_server(100_000, b"only a few bytes").await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("folder").join("clip");

        let err = downloader().download(&url, &dest).await.unwrap_err();
        match err {
            Error::Stream { url: u, path, source } => {
                assert_eq!(u, url);
                assert_eq!(path, dir.path().join("folder").join("clip.mp4"));
                assert!(matches!(source, StreamSource::Body(_)));
            }
            other => panic!("expected stream error, got {other:?}"),
        }
        assert!(!dir.path().join("folder").join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn slow_response_hits_download_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "video/mp4")
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let dl = Downloader::new(reqwest::Client::new(), Duration::from_millis(200));
        let dir = TempDir::new().unwrap();
        let err = dl
            .download(&format!("{}/slow", server.uri()), &dir.path().join("v"))
            .await
            .unwrap_err();
        match err {
            Error::Transport { source, .. } => assert!(source.is_timeout()),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn concurrently_created_file_not_overwritten() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dup"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(b"second".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("d.png");
        std::fs::write(&existing, b"first").unwrap();

        let dl = Downloader::with_fs(
            reqwest::Client::new(),
            Duration::from_secs(5),
            StaleExistence,
        );
        let outcome = dl
            .download(&format!("{}/dup", server.uri()), &dir.path().join("d"))
            .await
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::Existing { path: existing.clone() });
        assert_eq!(std::fs::read(&existing).unwrap(), b"first");
    }
}
