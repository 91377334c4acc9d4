//! Archive download
//!
//! Streams one remote archive to a local scratch file. The body is written
//! chunk by chunk so memory stays flat whatever the archive size.

use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::progress::{download_progress, format_bytes};
use crate::retry::RetryPolicy;

/// A completed download
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Downloads archives with a bounded timeout and retry
pub struct ArchiveFetcher {
    client: Client,
    retry: RetryPolicy,
    show_progress: bool,
}

impl ArchiveFetcher {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self::with_client(config.http_client()?, config))
    }

    pub fn with_client(client: Client, config: &IngestConfig) -> Self {
        Self {
            client,
            retry: config.retry_policy(),
            show_progress: config.show_progress,
        }
    }

    /// Download `url` to `dest`, retrying transient failures
    ///
    /// On error no partial file is left at `dest`.
    pub async fn fetch(&self, url: &Url, dest: &Path) -> Result<FetchedArchive> {
        let result = self
            .retry
            .run("fetch", || self.fetch_once(url, dest))
            .await;

        if result.is_err() {
            remove_partial(dest).await;
        }

        result
    }

    async fn fetch_once(&self, url: &Url, dest: &Path) -> Result<FetchedArchive> {
        let url_str = url.as_str();

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::Fetch {
                url: url_str.to_string(),
                status: e.status(),
                reason: e.to_string(),
            })?;

        let total = response.content_length();
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| url_str.to_string());

        debug!(
            url = url_str,
            size = total.map(format_bytes).unwrap_or_else(|| "unknown".to_string()),
            "Downloading archive"
        );

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::fetch(url_str, e))?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| IngestError::fetch(url_str, e))?;

        let pb = download_progress(total, &format!("Downloading {}", name), self.show_progress);
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| IngestError::Fetch {
                url: url_str.to_string(),
                status: e.status(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| IngestError::fetch(url_str, e))?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush().await.map_err(|e| IngestError::fetch(url_str, e))?;
        pb.finish_and_clear();

        if let Some(expected) = total.filter(|expected| *expected != downloaded) {
            return Err(IngestError::fetch(
                url_str,
                format!("truncated body: expected {} bytes, got {}", expected, downloaded),
            ));
        }

        info!(file = %name, size = %format_bytes(downloaded), "Downloaded archive");

        Ok(FetchedArchive {
            path: dest.to_path_buf(),
            bytes: downloaded,
        })
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> IngestConfig {
        IngestConfig::builder()
            .max_attempts(2)
            .retry_base_delay_ms(1)
            .show_progress(false)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_streams_to_disk() {
        let server = MockServer::start().await;
        let body = vec![7u8; 10_000];
        Mock::given(method("GET"))
            .and(path("/2020/a.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.zip");
        let url = Url::parse(&format!("{}/2020/a.zip", server.uri())).unwrap();

        let fetched = ArchiveFetcher::new(&config()).unwrap().fetch(&url, &dest).await.unwrap();

        assert_eq!(fetched.bytes, 10_000);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried_and_leaves_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.zip");
        let url = Url::parse(&format!("{}/2020/missing.zip", server.uri())).unwrap();

        let result = ArchiveFetcher::new(&config()).unwrap().fetch(&url, &dest).await;

        match result {
            Err(e @ IngestError::Fetch { .. }) => {
                assert_eq!(e.status(), Some(reqwest::StatusCode::NOT_FOUND))
            },
            other => panic!("expected fetch error, got {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("b.zip");
        let url = Url::parse(&format!("{}/2020/b.zip", server.uri())).unwrap();

        let fetched = ArchiveFetcher::new(&config()).unwrap().fetch(&url, &dest).await.unwrap();
        assert_eq!(fetched.bytes, 2);
    }
}
