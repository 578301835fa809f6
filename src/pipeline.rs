use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use crate::downloader::FetchBackend;
use crate::errors::{AppError, Result};
use crate::metadata::{AudioTagger, CoverArtSource, MetadataResolver, TrackMetadata};
use crate::notifier::ProgressTracker;
use crate::search::scorer::{Candidate, Scorer};
use crate::search::{find_best_match, CatalogSearch, MAX_CANDIDATES};
use crate::utils::{generate_request_id, sanitize_track_filename};

/// Completed and failed request counters, exposed on `/status`.
#[derive(Debug, Default)]
pub struct RequestStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl RequestStats {
    pub fn record(&self, success: bool) {
        let counter = if success { &self.completed } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// A tagged file ready for upload. Dropping it removes every file of the request.
pub struct PreparedAudio {
    pub track: TrackMetadata,
    pub candidate: Candidate,
    pub audio_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    _workspace: TempDir,
    _permit: OwnedSemaphorePermit,
}

impl PreparedAudio {
    #[cfg(test)]
    fn workspace(&self) -> &Path {
        self._workspace.path()
    }
}

/// Sends a prepared file to its destination.
#[async_trait::async_trait]
pub trait AudioUploader: Send + Sync {
    async fn upload(&self, audio: &PreparedAudio) -> Result<()>;
}

pub struct PipelineComponents {
    pub resolver: Arc<dyn MetadataResolver>,
    pub search: Arc<dyn CatalogSearch>,
    pub scorer: Scorer,
    pub fetcher: Arc<dyn FetchBackend>,
    pub tagger: Arc<dyn AudioTagger>,
    pub covers: Arc<dyn CoverArtSource>,
}

/// metadata → search → score → fetch → tag, one request at a time per permit.
pub struct TrackPipeline {
    components: PipelineComponents,
    work_dir: PathBuf,
    permits: Arc<Semaphore>,
    stats: Arc<RequestStats>,
}

impl TrackPipeline {
    /// Also removes request directories left behind by a previous run that did not exit cleanly.
    pub fn new(components: PipelineComponents, work_dir: PathBuf, max_concurrent: usize) -> Self {
        match sweep_stale_workspaces(&work_dir) {
            Ok(0) => {}
            Ok(removed) => log::info!("🧹 [PIPELINE] Removed {} stale request directories", removed),
            Err(e) => log::warn!("⚠️ [PIPELINE] Could not sweep {:?}: {}", work_dir, e),
        }

        Self {
            components,
            work_dir,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            stats: Arc::new(RequestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<RequestStats> {
        self.stats.clone()
    }

    /// Runs the whole request including the upload, then cleans up.
    pub async fn process(&self, link: &str, tracker: &ProgressTracker, uploader: &dyn AudioUploader) -> Result<()> {
        let result = async {
            let prepared = self.prepare(link, tracker).await?;
            tracker.finish("⬆️ Uploading to Telegram...").await;
            uploader.upload(&prepared).await
        }
        .await;

        self.stats.record(result.is_ok());
        if let Err(e) = &result {
            log::error!("❌ [PIPELINE] Request for {} failed: {}", link, e);
        }
        result
    }

    pub async fn prepare(&self, link: &str, tracker: &ProgressTracker) -> Result<PreparedAudio> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let request_id = generate_request_id();
        log::info!("🎬 [PIPELINE] Request {} for {}", request_id, link);
        let c = &self.components;

        let track = c.resolver.resolve(link).await?;

        tracker.update(&format!("🔎 Searching '{}'...", track.title)).await;
        let candidate = find_best_match(c.search.as_ref(), &c.scorer, &track, MAX_CANDIDATES)
            .await?
            .ok_or_else(|| AppError::NoMatch(track.title.clone()))?;
        log::info!(
            "🏆 [SCORER] Winner: {} ({}) score {:.1}",
            candidate.title,
            candidate.video_id,
            candidate.score
        );

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("{}{}_", WORKSPACE_PREFIX, request_id))
            .tempdir_in(&self.work_dir)?;

        let downloaded = c.fetcher.fetch(&candidate.video_id, workspace.path(), tracker).await?;

        tracker.update("🏷️ Applying HD metadata...").await;
        let cover = c.covers.fetch_cover(&track).await;
        if let Err(e) = c.tagger.embed(&downloaded, &track, cover.as_ref()).await {
            log::warn!("⚠️ [TAG] Sending untagged file: {}", e);
        }

        let extension = downloaded
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_string();
        let audio_path = workspace
            .path()
            .join(format!("{}.{}", sanitize_track_filename(&track.artist, &track.title), extension));
        tokio::fs::rename(&downloaded, &audio_path).await?;

        let thumbnail_path = match cover {
            Some(cover) => {
                let path = workspace.path().join(format!("thumb_{}.jpg", candidate.video_id));
                match tokio::fs::write(&path, &cover.data).await {
                    Ok(()) => Some(path),
                    Err(e) => {
                        log::warn!("⚠️ [COVER] Could not write thumbnail: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        log::info!("📦 [PIPELINE] Request {} ready: {:?}", request_id, audio_path);
        Ok(PreparedAudio {
            track,
            candidate,
            audio_path,
            thumbnail_path,
            _workspace: workspace,
            _permit: permit,
        })
    }
}

const WORKSPACE_PREFIX: &str = "req_";

fn sweep_stale_workspaces(work_dir: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(work_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let stale = entry.file_name().to_string_lossy().starts_with(WORKSPACE_PREFIX)
            && entry.file_type()?.is_dir();
        if stale {
            std::fs::remove_dir_all(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
