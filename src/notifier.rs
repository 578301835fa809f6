//! Throttled status updates for a single in-flight request.
//!
//! Fetch backends can emit progress many times per second while chat APIs
//! rate-limit message edits, so intermediate statuses are dropped unless
//! `interval` has passed since the last delivered one. Final statuses always
//! go out.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use crate::downloader::{FetchProgress, ProgressReporter};
use crate::errors::Result;

/// Where status texts end up, e.g. an editable chat message.
#[async_trait::async_trait]
pub trait StatusSink: Send + Sync {
    async fn show(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct ProgressState {
    pub last_update: Option<Instant>,
    pub status: String,
}

pub struct ProgressTracker {
    sink: Arc<dyn StatusSink>,
    interval: Duration,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn StatusSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Intermediate status. Returns whether it was delivered.
    pub async fn update(&self, text: &str) -> bool {
        self.push(text, false).await
    }

    /// Final status, never throttled.
    pub async fn finish(&self, text: &str) -> bool {
        self.push(text, true).await
    }

    #[cfg(test)]
    pub async fn current(&self) -> String {
        self.state.lock().await.status.clone()
    }

    async fn push(&self, text: &str, force: bool) -> bool {
        let mut state = self.state.lock().await;
        if state.status == text {
            return false;
        }

        let now = Instant::now();
        if !force {
            if let Some(last) = state.last_update {
                if now.duration_since(last) < self.interval {
                    return false;
                }
            }
        }

        state.last_update = Some(now);
        state.status = text.to_string();

        if let Err(e) = self.sink.show(text).await {
            log::debug!("📭 [NOTIFY] Status update not delivered: {}", e);
        }
        true
    }
}

#[async_trait::async_trait]
impl ProgressReporter for ProgressTracker {
    async fn report(&self, progress: FetchProgress) {
        self.update(&progress.status_text()).await;
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::RecordingSink;
    use super::*;

    #[tokio::test]
    async fn drops_updates_within_interval() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = ProgressTracker::new(sink.clone(), Duration::from_secs(60));

        assert!(tracker.update("🔎 Searching...").await);
        assert!(!tracker.update("⬇️ Downloading audio (cobalt): 10%").await);
        assert!(tracker.finish("⬆️ Uploading...").await);

        assert_eq!(sink.texts(), vec!["🔎 Searching...", "⬆️ Uploading..."]);
        assert_eq!(tracker.current().await, "⬆️ Uploading...");
    }

    #[tokio::test]
    async fn delivers_again_after_interval() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = ProgressTracker::new(sink.clone(), Duration::from_millis(30));

        assert!(tracker.update("one").await);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(tracker.update("two").await);
        assert_eq!(sink.texts().len(), 2);
    }

    #[tokio::test]
    async fn identical_text_is_not_resent() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = ProgressTracker::new(sink.clone(), Duration::ZERO);

        tracker.update("same").await;
        tracker.update("same").await;
        tracker.finish("same").await;
        assert_eq!(sink.texts().len(), 1);
    }

    #[tokio::test]
    async fn sink_errors_are_swallowed() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let tracker = ProgressTracker::new(sink.clone(), Duration::ZERO);

        assert!(tracker.update("first").await);
        assert!(tracker.finish("second").await);
        assert_eq!(sink.texts().len(), 2);
    }

    #[tokio::test]
    async fn reports_fetch_progress() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = ProgressTracker::new(sink.clone(), Duration::ZERO);

        tracker
            .report(FetchProgress::Connecting {
                backend: "cobalt".to_string(),
                target: "api.cobalt.tools".to_string(),
            })
            .await;
        assert_eq!(sink.texts(), vec!["☁️ Connecting to node: api.cobalt.tools..."]);
    }
}
