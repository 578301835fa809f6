use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::downloader::extractor::YtDlpExtractor;
use crate::downloader::http_pool::HttpPool;
use crate::downloader::{FetchBackend, FetchProgress, ProgressReporter};
use crate::errors::Result;
use crate::search::RawCandidate;

/// Resolves the raw audio stream with yt-dlp and fetches it over HTTP, skipping transcoding.
pub struct DirectBackend {
    extractor: Arc<YtDlpExtractor>,
    http: HttpPool,
}

impl DirectBackend {
    pub fn new(extractor: Arc<YtDlpExtractor>, http: HttpPool) -> Self {
        Self { extractor, http }
    }
}

/// Container of a googlevideo stream URL, judged from its `mime` parameter.
pub fn stream_extension(stream_url: &str) -> &'static str {
    let mime = url::Url::parse(stream_url).ok().and_then(|u| {
        u.query_pairs()
            .find(|(key, _)| key == "mime")
            .map(|(_, value)| value.into_owned())
    });
    match mime.as_deref() {
        Some("audio/webm") => "webm",
        Some("audio/mpeg") => "mp3",
        _ => "m4a",
    }
}

#[async_trait::async_trait]
impl FetchBackend for DirectBackend {
    fn name(&self) -> &str {
        "direct"
    }

    async fn fetch(&self, video_id: &str, dest_dir: &Path, progress: &dyn ProgressReporter) -> Result<PathBuf> {
        progress
            .report(FetchProgress::Connecting {
                backend: self.name().to_string(),
                target: "youtube".to_string(),
            })
            .await;

        let stream_url = self.extractor.get_audio_url(&RawCandidate::watch_url(video_id)).await?;
        let dest = dest_dir.join(format!("{}.{}", video_id, stream_extension(&stream_url)));
        log::info!("🔗 [DIRECT] Streaming {} to {:?}", video_id, dest);

        self.http.download_to_file(&stream_url, &dest, self.name(), progress).await?;
        Ok(dest)
    }
}
