use std::sync::Arc;
use std::time::Duration;
use moka::future::Cache;
use crate::downloader::extractor::{VideoInfo, YtDlpExtractor};
use crate::errors::Result;
use crate::search::{CatalogSearch, RawCandidate, SearchFilter};

/// Catalog search through yt-dlp's YouTube and YouTube Music extractors.
pub struct YtDlpCatalog {
    extractor: Arc<YtDlpExtractor>,
    cache: Cache<String, Vec<RawCandidate>>,
}

impl YtDlpCatalog {
    pub fn new(extractor: Arc<YtDlpExtractor>) -> Self {
        Self {
            extractor,
            cache: Cache::builder()
                .max_capacity(512)
                .time_to_live(Duration::from_secs(30 * 60))
                .build(),
        }
    }
}

/// The yt-dlp target for a query on the given shelf.
pub fn search_target(query: &str, filter: SearchFilter, limit: usize) -> String {
    match filter {
        SearchFilter::Songs => format!(
            "https://music.youtube.com/search?q={}#songs",
            urlencoding::encode(query)
        ),
        SearchFilter::Videos => format!("ytsearch{}:{}", limit, query),
    }
}

impl From<VideoInfo> for RawCandidate {
    fn from(info: VideoInfo) -> Self {
        let uploader = info.uploader_name();
        let duration_secs = info.duration_secs();
        RawCandidate {
            video_id: info.id.filter(|id| !id.is_empty()),
            title: info.title.unwrap_or_default(),
            uploader,
            duration_secs,
        }
    }
}

#[async_trait::async_trait]
impl CatalogSearch for YtDlpCatalog {
    async fn search(&self, query: &str, filter: SearchFilter, limit: usize) -> Result<Vec<RawCandidate>> {
        let cache_key = format!("{:?}:{}:{}", filter, limit, query);
        if let Some(cached) = self.cache.get(&cache_key).await {
            log::info!("💾 [SEARCH] Using cached {:?} results for '{}'", filter, query);
            return Ok(cached);
        }

        let target = search_target(query, filter, limit);
        let results: Vec<RawCandidate> = self
            .extractor
            .search(&target, limit, filter == SearchFilter::Videos)
            .await?
            .into_iter()
            .map(RawCandidate::from)
            .take(limit)
            .collect();

        log::info!("📊 [SEARCH] {:?}: {} results", filter, results.len());
        self.cache.insert(cache_key, results.clone()).await;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_targets_per_shelf() {
        assert_eq!(
            search_target("Rick Astley Never Gonna", SearchFilter::Songs, 5),
            "https://music.youtube.com/search?q=Rick%20Astley%20Never%20Gonna#songs"
        );
        assert_eq!(
            search_target("Rick Astley", SearchFilter::Videos, 5),
            "ytsearch5:Rick Astley"
        );
    }

    #[test]
    fn converts_video_info() {
        let info = VideoInfo {
            id: Some(String::new()),
            title: None,
            channel: Some("Rick Astley - Topic".to_string()),
            duration: Some(213.0),
            ..Default::default()
        };
        let candidate = RawCandidate::from(info);
        assert_eq!(candidate.video_id, None);
        assert_eq!(candidate.title, "");
        assert_eq!(candidate.uploader.as_deref(), Some("Rick Astley - Topic"));
        assert_eq!(candidate.duration_secs, Some(213.0));
    }
}
