use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Child;
use crate::config::AudioQuality;
use crate::downloader::extractor::{find_downloaded_file, YtDlpExtractor};
use crate::downloader::{FetchBackend, FetchProgress, ProgressReporter};
use crate::errors::{AppError, Result};
use crate::search::RawCandidate;

/// Extracts mp3 audio locally with yt-dlp (and ffmpeg).
pub struct YtDlpBackend {
    extractor: Arc<YtDlpExtractor>,
    quality: AudioQuality,
}

impl YtDlpBackend {
    pub fn new(extractor: Arc<YtDlpExtractor>, quality: AudioQuality) -> Self {
        Self { extractor, quality }
    }

    fn download_args(&self, video_id: &str, dest_dir: &Path) -> Vec<String> {
        let template = dest_dir.join(format!("{}.%(ext)s", video_id));
        vec![
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            format!("{}K", self.quality.bitrate()),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--extractor-retries".to_string(),
            "1".to_string(),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            RawCandidate::watch_url(video_id),
        ]
    }

    async fn follow_child(&self, mut child: Child, progress: &dyn ProgressReporter) -> Result<()> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Download("yt-dlp stdout not captured".to_string()))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buffer).await;
            }
            buffer
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut last_percent = None;
        while let Some(line) = lines.next_line().await? {
            if let Some(percent) = parse_progress(&line) {
                let whole = percent as u32;
                if last_percent != Some(whole) {
                    last_percent = Some(whole);
                    progress
                        .report(FetchProgress::Downloading {
                            backend: self.name().to_string(),
                            percent: Some(percent),
                        })
                        .await;
                }
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            log::error!("❌ [YTDLP] yt-dlp failed ({}): {}", status, stderr.trim());
            return Err(AppError::Download(format!("yt-dlp failed: {}", stderr.trim())));
        }
        Ok(())
    }
}

/// Percentage from a `[download]  42.3% of 3.50MiB at ...` line.
pub fn parse_progress(line: &str) -> Option<f32> {
    if !line.contains("[download]") {
        return None;
    }
    line.split_whitespace()
        .filter_map(|part| part.strip_suffix('%'))
        .find_map(|number| number.parse::<f32>().ok())
        .map(|p| p.clamp(0.0, 100.0))
}

#[async_trait::async_trait]
impl FetchBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "ytdlp"
    }

    async fn fetch(&self, video_id: &str, dest_dir: &Path, progress: &dyn ProgressReporter) -> Result<PathBuf> {
        log::info!("🎵 [YTDLP] Extracting audio for {}", video_id);
        progress
            .report(FetchProgress::Downloading {
                backend: self.name().to_string(),
                percent: None,
            })
            .await;

        let mut cmd = self.extractor.command();
        cmd.args(self.download_args(video_id, dest_dir));
        let child = cmd.spawn()?;

        let timeout = self.extractor.timeout();
        match tokio::time::timeout(timeout, self.follow_child(child, progress)).await {
            Ok(result) => result?,
            Err(_) => {
                log::error!("⏰ [YTDLP] Download timed out after {:?}, process killed", timeout);
                return Err(AppError::Download(format!("yt-dlp timed out after {:?}", timeout)));
            }
        }

        find_downloaded_file(dest_dir, video_id, "mp3").await
    }
}
