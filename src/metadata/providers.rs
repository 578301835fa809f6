use crate::errors::Result;
use crate::metadata::{CoverArtData, CoverArtSource, TrackMetadata};
use reqwest::Client;
use serde_json::Value;

/// Cover art from the Spotify album image, with iTunes search as a fallback.
#[derive(Debug, Clone)]
pub struct CoverArtProvider {
    client: Client,
}

impl CoverArtProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn download_cover_art_data(&self, url: &str) -> Result<Option<CoverArtData>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            log::warn!("⚠️ [COVER] {} returned {}", url, response.status());
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(CoverArtData::from_bytes(bytes.to_vec())))
    }

    async fn try_itunes_cover(&self, artist: &str, title: &str) -> Result<Option<String>> {
        let query = format!("{} {}", artist, title);
        let url = format!(
            "https://itunes.apple.com/search?term={}&media=music&entity=song&limit=5",
            urlencoding::encode(&query)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let json: Value = response.json().await?;
        Ok(pick_itunes_artwork(&json, artist))
    }
}

/// First result whose artist matches, with the artwork upscaled to 600px.
fn pick_itunes_artwork(json: &Value, artist: &str) -> Option<String> {
    let target = artist.to_lowercase();
    json["results"]
        .as_array()?
        .iter()
        .filter(|result| {
            result["artistName"]
                .as_str()
                .map(|name| name.to_lowercase().contains(&target))
                .unwrap_or(false)
        })
        .find_map(|result| result["artworkUrl100"].as_str())
        .map(|url| url.replace("100x100bb", "600x600bb"))
}

#[async_trait::async_trait]
impl CoverArtSource for CoverArtProvider {
    async fn fetch_cover(&self, track: &TrackMetadata) -> Option<CoverArtData> {
        if let Some(url) = &track.cover_url {
            match self.download_cover_art_data(url).await {
                Ok(Some(cover)) => return Some(cover),
                Ok(None) => {}
                Err(e) => log::warn!("⚠️ [COVER] Spotify cover download failed: {}", e),
            }
        }

        log::info!("🎨 [COVER] Falling back to iTunes artwork for {} - {}", track.artist, track.title);
        let url = match self.try_itunes_cover(&track.artist, &track.title).await {
            Ok(Some(url)) => url,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("⚠️ [COVER] iTunes lookup failed: {}", e);
                return None;
            }
        };

        match self.download_cover_art_data(&url).await {
            Ok(cover) => cover,
            Err(e) => {
                log::warn!("⚠️ [COVER] iTunes artwork download failed: {}", e);
                None
            }
        }
    }
}
