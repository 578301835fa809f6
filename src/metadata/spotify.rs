use crate::errors::{AppError, Result};
use crate::metadata::{MetadataResolver, TrackMetadata};
use crate::security::{InputValidator, SpotifyLink};
use base64::Engine;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";
/// Refresh the token this long before Spotify says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Client-credentials Spotify Web API resolver.
pub struct SpotifyResolver {
    client: Client,
    accounts_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
    cache: Cache<String, TrackMetadata>,
    validator: InputValidator,
}

impl SpotifyResolver {
    pub fn new(client: Client, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            accounts_url: ACCOUNTS_URL.to_string(),
            api_url: API_URL.to_string(),
            client_id,
            client_secret,
            token: Mutex::new(None),
            cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(3600))
                .build(),
            validator: InputValidator::new(),
        }
    }

    #[cfg(test)]
    fn with_endpoints(mut self, accounts_url: String, api_url: String) -> Self {
        self.accounts_url = accounts_url;
        self.api_url = api_url;
        self
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.value.clone());
            }
        }

        log::info!("🔑 [SPOTIFY] Requesting client-credentials token");
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .client
            .post(&self.accounts_url)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Metadata(format!(
                "Spotify token request failed: {}",
                response.status()
            )));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let fresh = AccessToken {
            value: body.access_token,
            refresh_at: Instant::now() + lifetime,
        };
        let value = fresh.value.clone();
        *token = Some(fresh);
        Ok(value)
    }

    /// Follows a `spotify.link` share link until it lands on a track URL.
    async fn expand_short_link(&self, url: &url::Url) -> Result<String> {
        log::info!("🔗 [SPOTIFY] Expanding short link: {}", url);
        let response = self.client.get(url.as_str()).send().await?;
        let final_url = response.url().to_string();

        if let Ok(id) = self.validator.track_id_from_url(&final_url) {
            return Ok(id);
        }

        let body = response.text().await?;
        embedded_track_id(&body)
            .ok_or_else(|| AppError::InvalidLink(format!("{} does not point to a track", url)))
    }

    async fn fetch_track(&self, track_id: &str) -> Result<TrackMetadata> {
        let token = self.access_token().await?;
        let url = format!("{}/tracks/{}", self.api_url, track_id);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(AppError::InvalidLink(format!("Spotify has no track {}", track_id)));
        }
        if !status.is_success() {
            return Err(AppError::Metadata(format!("Spotify returned {} for track {}", status, track_id)));
        }

        let json: Value = response.json().await?;
        parse_spotify_track(&json)
    }
}

#[async_trait::async_trait]
impl MetadataResolver for SpotifyResolver {
    async fn resolve(&self, link: &str) -> Result<TrackMetadata> {
        let track_id = match self.validator.validate_spotify_link(link)? {
            SpotifyLink::Track(id) => id,
            SpotifyLink::Short(url) => self.expand_short_link(&url).await?,
        };

        if let Some(cached) = self.cache.get(&track_id).await {
            log::info!("💾 [SPOTIFY] Using cached metadata for {}", track_id);
            return Ok(cached);
        }

        let track = self.fetch_track(&track_id).await.map_err(|e| {
            log::error!("❌ [SPOTIFY] Failed to resolve {}: {}", track_id, e);
            match e {
                AppError::InvalidLink(_) | AppError::Metadata(_) => e,
                other => AppError::Metadata(other.to_string()),
            }
        })?;

        log::info!(
            "✅ [SPOTIFY] {} - {} ({:.0}s, isrc: {:?})",
            track.artist,
            track.title,
            track.duration_secs(),
            track.isrc
        );
        self.cache.insert(track_id, track.clone()).await;
        Ok(track)
    }
}

/// Some share links land on an HTML interstitial that embeds the target.
fn embedded_track_id(body: &str) -> Option<String> {
    let marker = "open.spotify.com/track/";
    let start = body.find(marker)? + marker.len();
    let id: String = body[start..].chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
    (!id.is_empty()).then_some(id)
}

/// Maps a Web API track object onto `TrackMetadata`.
pub fn parse_spotify_track(track: &Value) -> Result<TrackMetadata> {
    let missing = |field: &str| AppError::Metadata(format!("Spotify track without {}", field));

    let spotify_id = track["id"].as_str().ok_or_else(|| missing("id"))?.to_string();
    let title = track["name"].as_str().ok_or_else(|| missing("name"))?.to_string();
    let artists: Vec<String> = track["artists"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|artist| artist["name"].as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();
    let artist = artists.first().cloned().ok_or_else(|| missing("artists"))?;
    let duration_ms = track["duration_ms"].as_u64().ok_or_else(|| missing("duration_ms"))?;

    let album = track["album"]["name"].as_str().unwrap_or_default().to_string();
    let year = track["album"]["release_date"]
        .as_str()
        .and_then(|date| date.get(..4))
        .and_then(|year| year.parse::<u32>().ok());

    // Spotify lists album images largest first.
    let cover_url = track["album"]["images"]
        .as_array()
        .and_then(|images| images.first())
        .and_then(|image| image["url"].as_str())
        .map(|s| s.to_string());

    let link = track["external_urls"]["spotify"]
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("https://open.spotify.com/track/{}", spotify_id));

    Ok(TrackMetadata {
        spotify_id,
        title,
        artist,
        artists,
        album,
        year,
        duration_ms,
        cover_url,
        track_number: track["track_number"].as_u64().map(|n| n as u32),
        isrc: track["external_ids"]["isrc"].as_str().map(|s| s.to_string()),
        link,
    })
}
