use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Abstraction over fetching a URL into a private temporary file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch `url` into a fresh temporary file whose name starts with
    /// `prefix`. The returned file is rewound to the start. Aborts promptly
    /// with [`UpdaterError::Cancelled`] once `cancel` fires.
    async fn download(
        &self,
        url: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<NamedTempFile>;
}

/// Run a download under its own deadline. A missed deadline fails the fetch
/// exactly like a network error, and the partial file is dropped (deleted).
pub async fn download_with_timeout(
    downloader: &dyn Downloader,
    url: &str,
    prefix: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<NamedTempFile> {
    match tokio::time::timeout(timeout, downloader.download(url, prefix, cancel)).await {
        Ok(result) => result,
        Err(_) => Err(UpdaterError::Timeout {
            url: url.to_string(),
            timeout,
        }),
    }
}

/// Builder for [`HttpDownloader`].
#[derive(Default)]
pub struct HttpDownloaderBuilder {
    client: Option<Client>,
    temp_dir: Option<PathBuf>,
}

impl HttpDownloaderBuilder {
    /// Provide a custom reqwest client instance.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Directory temporary files are created in (defaults to the OS temp dir).
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Build the downloader.
    pub fn build(self) -> HttpDownloader {
        HttpDownloader {
            client: self.client.unwrap_or_default(),
            temp_dir: self.temp_dir.unwrap_or_else(std::env::temp_dir),
        }
    }
}

/// Plain HTTP(S) downloader; anything but `200 OK` is a failure.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    temp_dir: PathBuf,
}

impl HttpDownloader {
    /// Create a new builder.
    pub fn builder() -> HttpDownloaderBuilder {
        HttpDownloaderBuilder::default()
    }

    async fn fetch(&self, url: &str, prefix: &str) -> Result<NamedTempFile> {
        let fetch_error = |source| UpdaterError::Fetch {
            url: url.to_string(),
            source,
        };

        let mut response = self.client.get(url).send().await.map_err(fetch_error)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdaterError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let file = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(&self.temp_dir)?;

        // The async handle shares the descriptor's offset with `file`, which
        // keeps ownership of the path and deletes it if we bail out.
        let mut writer = tokio::fs::File::from_std(file.as_file().try_clone()?);
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;
        writer.rewind().await?;

        Ok(file)
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        url: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<NamedTempFile> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UpdaterError::Cancelled { url: url.to_string() }),
            result = self.fetch(url, prefix) => result,
        }
    }
}
