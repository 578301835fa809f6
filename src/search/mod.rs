pub mod fuzzy;
pub mod scorer;
pub mod ytdlp;

use serde::{Deserialize, Serialize};
use crate::errors::{AppError, Result};
use crate::metadata::TrackMetadata;
use crate::search::scorer::{Candidate, Scorer};

/// How many results the scorer looks at.
pub const MAX_CANDIDATES: usize = 5;

/// One catalog search hit, as returned by the search backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawCandidate {
    pub video_id: Option<String>,
    pub title: String,
    pub uploader: Option<String>,
    pub duration_secs: Option<f64>,
}

impl RawCandidate {
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchFilter {
    /// YouTube Music "Songs" shelf: official audio, mostly Topic channels.
    Songs,
    /// Plain YouTube video search.
    Videos,
}

#[async_trait::async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, query: &str, filter: SearchFilter, limit: usize) -> Result<Vec<RawCandidate>>;
}

/// Songs first; videos when the songs shelf fails or yields nothing the scorer accepts.
pub async fn find_best_match(
    search: &dyn CatalogSearch,
    scorer: &Scorer,
    track: &TrackMetadata,
    limit: usize,
) -> Result<Option<Candidate>> {
    let query = track.search_query();
    log::info!("🔎 [SEARCH] Searching: {}", query);

    match search.search(&query, SearchFilter::Songs, limit).await {
        Ok(songs) => {
            if let Some(best) = scorer.select(track, &songs) {
                return Ok(Some(best));
            }
            log::info!("🔄 [SEARCH] No acceptable song among {} results, searching videos", songs.len());
        }
        Err(e) => log::warn!("⚠️ [SEARCH] Songs search failed, searching videos: {}", e),
    }

    let videos = search
        .search(&query, SearchFilter::Videos, limit)
        .await
        .map_err(|e| match e {
            AppError::Search(_) => e,
            other => AppError::Search(other.to_string()),
        })?;
    Ok(scorer.select(track, &videos))
}
