pub mod extractor;
pub mod http_pool;
pub mod strategies;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::errors::{AppError, Result};

/// Progress events emitted while a backend works.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchProgress {
    Connecting { backend: String, target: String },
    Downloading { backend: String, percent: Option<f32> },
}

impl FetchProgress {
    /// Chat-facing status line.
    pub fn status_text(&self) -> String {
        match self {
            FetchProgress::Connecting { target, .. } => format!("☁️ Connecting to node: {}...", target),
            FetchProgress::Downloading { backend, percent: Some(p) } => {
                format!("⬇️ Downloading audio ({}): {:.0}%", backend, p)
            }
            FetchProgress::Downloading { backend, percent: None } => {
                format!("⬇️ Downloading audio ({})...", backend)
            }
        }
    }
}

#[async_trait::async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, progress: FetchProgress);
}

/// Obtains a local audio file for a video id inside `dest_dir`.
#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, video_id: &str, dest_dir: &Path, progress: &dyn ProgressReporter) -> Result<PathBuf>;
}

/// Tries each backend in order; the first success wins.
pub struct FallbackFetcher {
    backends: Vec<Arc<dyn FetchBackend>>,
}

impl FallbackFetcher {
    pub fn new(backends: Vec<Arc<dyn FetchBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }
}

#[async_trait::async_trait]
impl FetchBackend for FallbackFetcher {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self, video_id: &str, dest_dir: &Path, progress: &dyn ProgressReporter) -> Result<PathBuf> {
        let mut last_error = None;

        for backend in &self.backends {
            let start_time = std::time::Instant::now();
            log::info!("⬇️ [FETCH] Trying backend '{}' for {}", backend.name(), video_id);

            match backend.fetch(video_id, dest_dir, progress).await {
                Ok(path) => {
                    log::info!(
                        "✅ [FETCH] '{}' produced {:?} (took {:.2} seconds)",
                        backend.name(),
                        path,
                        start_time.elapsed().as_secs_f64()
                    );
                    return Ok(path);
                }
                Err(e) => {
                    log::warn!("⚠️ [FETCH] Backend '{}' failed: {}", backend.name(), e);
                    last_error = Some(format!("{}: {}", backend.name(), e));
                }
            }
        }

        Err(AppError::Backend(
            last_error.unwrap_or_else(|| "no fetch backends configured".to_string()),
        ))
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Discards progress.
    pub struct NoProgress;

    #[async_trait::async_trait]
    impl ProgressReporter for NoProgress {
        async fn report(&self, _progress: FetchProgress) {}
    }

    /// Writes a small file on success, or fails, and counts calls.
    pub struct FakeBackend {
        pub name: String,
        pub succeed: bool,
        pub calls: AtomicUsize,
    }

    impl FakeBackend {
        pub fn new(name: &str, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                succeed,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl FetchBackend for FakeBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, video_id: &str, dest_dir: &Path, progress: &dyn ProgressReporter) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Err(AppError::Download(format!("{} unavailable", self.name)));
            }
            progress
                .report(FetchProgress::Downloading {
                    backend: self.name.clone(),
                    percent: Some(100.0),
                })
                .await;
            let path = dest_dir.join(format!("{}.mp3", video_id));
            tokio::fs::write(&path, b"ID3").await?;
            Ok(path)
        }
    }

    #[derive(Default)]
    pub struct RecordingReporter {
        pub events: Mutex<Vec<FetchProgress>>,
    }

    #[async_trait::async_trait]
    impl ProgressReporter for RecordingReporter {
        async fn report(&self, progress: FetchProgress) {
            self.events.lock().unwrap().push(progress);
        }
    }
}
