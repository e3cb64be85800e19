//! HTTP download of job inputs into a workspace.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use vmix_models::{MediaAsset, MediaKind};

use crate::error::{MediaError, MediaResult};

/// Streams remote media to local files.
#[derive(Debug, Clone)]
pub struct AssetDownloader {
    http: reqwest::Client,
}

impl AssetDownloader {
    /// Create a downloader whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vmix-media/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MediaError::download_failed("", format!("http client: {}", e)))?;
        Ok(Self { http })
    }

    /// Use an existing client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Download `url` into `dir` as `<stem>.<ext>` and return an unprobed asset.
    ///
    /// The extension comes from the URL path when it has a plausible one,
    /// otherwise from the asset kind.
    pub async fn download(
        &self,
        url: &str,
        dir: &Path,
        stem: &str,
        kind: MediaKind,
    ) -> MediaResult<MediaAsset> {
        let ext = extension_from_url(url).unwrap_or_else(|| kind.default_extension().to_string());
        let path = dir.join(format!("{}.{}", stem, ext));
        let started = Instant::now();

        let bytes = self.fetch_to_file(url, &path).await.inspect_err(|_| {
            metrics::counter!("vmix_download_failures_total", "kind" => kind.as_str())
                .increment(1);
        })?;

        metrics::histogram!("vmix_download_duration_seconds", "kind" => kind.as_str())
            .record(started.elapsed().as_secs_f64());
        info!(
            kind = kind.as_str(),
            bytes,
            path = %path.display(),
            "Downloaded input"
        );

        Ok(MediaAsset::new(path, kind))
    }

    async fn fetch_to_file(&self, url: &str, path: &Path) -> MediaResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        debug!(url, "Starting download");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::download_failed(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(
                url,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let mut file = fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let data = chunk.map_err(|e| MediaError::download_failed(url, e.to_string()))?;
            file.write_all(&data).await?;
            written += data.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::download_failed(url, "empty response body"));
        }

        Ok(written)
    }
}

/// File extension carried by the URL path, if it looks like one.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let ext = PathBuf::from(last)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    let plausible = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then_some(ext)
}
