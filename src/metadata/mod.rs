pub mod providers;
pub mod spotify;
pub mod tagger;

use serde::{Deserialize, Serialize};
use crate::errors::Result;
use std::path::Path;

/// Everything the pipeline knows about the requested track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackMetadata {
    pub spotify_id: String,
    pub title: String,
    /// Primary (first credited) artist.
    pub artist: String,
    pub artists: Vec<String>,
    pub album: String,
    pub year: Option<u32>,
    pub duration_ms: u64,
    pub cover_url: Option<String>,
    pub track_number: Option<u32>,
    pub isrc: Option<String>,
    pub link: String,
}

impl TrackMetadata {
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// Query sent to the catalog search.
    pub fn search_query(&self) -> String {
        format!("{} {} audio", self.artist, self.title)
    }

    /// HTML caption for the uploaded audio.
    pub fn caption(&self) -> String {
        let escape = teloxide::utils::html::escape;
        let mut caption = format!(
            "🎵 <b>{}</b>\n👤 {}\n💿 {}",
            escape(&self.title),
            escape(&self.artist),
            escape(&self.album)
        );
        if let Some(year) = self.year {
            caption.push_str(&format!(" ({})", year));
        }
        caption
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverArtData {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl CoverArtData {
    /// Sniffs the mime type from magic bytes; Spotify and iTunes serve JPEG or PNG.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mime_type = if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            "image/png"
        } else {
            "image/jpeg"
        };
        Self {
            data,
            mime_type: mime_type.to_string(),
        }
    }
}

/// Turns a shared link into structured metadata.
#[async_trait::async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, link: &str) -> Result<TrackMetadata>;
}

/// Fetches artwork bytes for a track.
#[async_trait::async_trait]
pub trait CoverArtSource: Send + Sync {
    async fn fetch_cover(&self, track: &TrackMetadata) -> Option<CoverArtData>;
}

/// Writes tags and artwork into a downloaded file.
#[async_trait::async_trait]
pub trait AudioTagger: Send + Sync {
    async fn embed(&self, file_path: &Path, track: &TrackMetadata, cover: Option<&CoverArtData>) -> Result<()>;
}

#[cfg(test)]
pub(crate) fn sample_track(duration_ms: u64) -> TrackMetadata {
    TrackMetadata {
        spotify_id: "4iV5W9uYEdYUVa79Axb7Rh".to_string(),
        title: "Never Gonna Give You Up".to_string(),
        artist: "Rick Astley".to_string(),
        artists: vec!["Rick Astley".to_string()],
        album: "Whenever You Need Somebody".to_string(),
        year: Some(1987),
        duration_ms,
        cover_url: Some("https://i.scdn.co/image/cover".to_string()),
        track_number: Some(1),
        isrc: Some("GBARL9300135".to_string()),
        link: "https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_search_query_and_caption() {
        let mut track = sample_track(213_000);
        assert_eq!(track.search_query(), "Rick Astley Never Gonna Give You Up audio");
        assert_eq!(track.duration_secs(), 213.0);

        track.album = "Hits <Remastered>".to_string();
        let caption = track.caption();
        assert!(caption.contains("<b>Never Gonna Give You Up</b>"));
        assert!(caption.contains("Hits &lt;Remastered&gt; (1987)"));
    }

    #[test]
    fn sniffs_cover_mime_type() {
        let png = CoverArtData::from_bytes(vec![0x89, b'P', b'N', b'G', 0x0D]);
        assert_eq!(png.mime_type, "image/png");
        let jpeg = CoverArtData::from_bytes(vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(jpeg.mime_type, "image/jpeg");
    }
}
