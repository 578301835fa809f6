use std::path::Path;
use std::time::Duration;
use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder, Proxy};
use tokio::io::AsyncWriteExt;
use crate::downloader::{FetchProgress, ProgressReporter};
use crate::errors::{AppError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared reqwest client used for metadata, relay calls and file streaming
#[derive(Debug, Clone)]
pub struct HttpPool {
    client: Client,
}

impl HttpPool {
    pub fn new(max_connections: usize, timeout_seconds: u64, proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .pool_max_idle_per_host(max_connections)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .timeout(Duration::from_secs(timeout_seconds))
            .connect_timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .gzip(true)
            .brotli(true)
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true);

        if let Some(proxy_url) = proxy_url.filter(|p| !p.trim().is_empty()) {
            log::info!("🧅 [HTTP] Routing through proxy: {}", proxy_url);
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(Self { client: builder.build()? })
    }

    /// Wraps an already configured client.
    #[cfg(test)]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Streams `url` into `dest`, retrying a few times. Returns the byte count.
    pub async fn download_to_file(
        &self,
        url: &str,
        dest: &Path,
        backend: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<u64> {
        const MAX_RETRIES: u32 = 3;
        const RETRY_DELAY: Duration = Duration::from_secs(2);

        let mut attempt = 1;
        loop {
            log::info!("🌐 [HTTP] Attempt {} of {} for {}", attempt, MAX_RETRIES, backend);
            match self.try_download(url, dest, backend, progress).await {
                Ok(bytes) => {
                    log::info!("✅ [HTTP] Downloaded {} bytes on attempt {}", bytes, attempt);
                    return Ok(bytes);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    log::warn!("⚠️ [HTTP] Attempt {} failed: {}", attempt, e);
                    log::info!("🔄 [HTTP] Retrying in {:?}...", RETRY_DELAY);
                    tokio::time::sleep(RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("❌ [HTTP] All {} attempts failed", MAX_RETRIES);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(e);
                }
            }
        }
    }

    async fn try_download(
        &self,
        url: &str,
        dest: &Path,
        backend: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .header("Accept", "audio/webm,audio/*,*/*;q=0.9")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Download(format!("HTTP error: {}", response.status())));
        }

        let mut transfer = TransferProgress::new(response.content_length());
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut last_reported: Option<Option<u32>> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            transfer.advance(chunk.len() as u64);

            let percent = transfer.percent();
            let whole = percent.map(|p| p as u32);
            if last_reported != Some(whole) {
                last_reported = Some(whole);
                progress
                    .report(FetchProgress::Downloading {
                        backend: backend.to_string(),
                        percent,
                    })
                    .await;
            }
        }
        file.flush().await?;

        if transfer.downloaded == 0 {
            return Err(AppError::Download("Empty response body".to_string()));
        }
        Ok(transfer.downloaded)
    }
}

/// Bytes received against the announced length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    pub downloaded: u64,
    pub total: Option<u64>,
}

impl TransferProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            downloaded: 0,
            total: total.filter(|t| *t > 0),
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.downloaded += bytes;
    }

    pub fn percent(&self) -> Option<f32> {
        self.total
            .map(|total| ((self.downloaded as f32 / total as f32) * 100.0).min(100.0))
    }
}
