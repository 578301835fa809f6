use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::errors::{AppError, Result};

pub const DEFAULT_COBALT_INSTANCES: &[&str] = &[
    "https://api.cobalt.tools/api/json",
    "https://cobalt.kwiatekmiki.pl/api/json",
    "https://cobalt.154.53.56.155.host.sapwd.net/api/json",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,    // 128 kbps
    Medium, // 192 kbps
    High,   // 256 kbps
    Best,   // 320 kbps
}

impl AudioQuality {
    pub fn bitrate(&self) -> u32 {
        match self {
            AudioQuality::Low => 128,
            AudioQuality::Medium => 192,
            AudioQuality::High => 256,
            AudioQuality::Best => 320,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBackendKind {
    Cobalt,
    Ytdlp,
    Direct,
}

impl FetchBackendKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "cobalt" => Ok(FetchBackendKind::Cobalt),
            "ytdlp" | "yt-dlp" => Ok(FetchBackendKind::Ytdlp),
            "direct" => Ok(FetchBackendKind::Direct),
            other => Err(AppError::Config(config::ConfigError::Message(format!(
                "Unknown fetch backend '{}'. Valid backends: cobalt, ytdlp, direct",
                other
            )))),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_fetch_backends() -> Vec<String> {
    vec!["cobalt".to_string(), "ytdlp".to_string()]
}

fn default_cobalt_instances() -> Vec<String> {
    DEFAULT_COBALT_INSTANCES.iter().map(|s| s.to_string()).collect()
}

fn default_audio_quality() -> AudioQuality {
    AudioQuality::Best
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_ytdlp_timeout_secs() -> u64 {
    300
}

fn default_progress_interval_secs() -> u64 {
    2
}

fn default_match_threshold() -> f64 {
    60.0
}

fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("spotify_downloader_bot")
}

fn default_max_concurrent_requests() -> usize {
    3
}

/// Bot settings. Field names are the lowercased environment variable names.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    #[serde(alias = "spotify_client_id")]
    pub spotipy_client_id: String,
    #[serde(alias = "spotify_client_secret")]
    pub spotipy_client_secret: String,
    /// Netscape cookie jar for YouTube, raw or base64 encoded.
    #[serde(default)]
    pub yt_cookies: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_fetch_backends")]
    pub fetch_backends: Vec<String>,
    #[serde(default = "default_cobalt_instances")]
    pub cobalt_instances: Vec<String>,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: AudioQuality,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    #[serde(default)]
    pub ytdlp_proxy: Option<String>,
    #[serde(default)]
    pub ytdlp_impersonate: Option<String>,
    #[serde(default = "default_ytdlp_timeout_secs")]
    pub ytdlp_timeout_secs: u64,
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl BotConfig {
    /// Defaults, then the optional config file, then the process environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            log::info!("📄 [CONFIG] Reading config file: {:?}", path);
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            config::Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("fetch_backends")
                .with_list_parse_key("cobalt_instances"),
        );

        let config: BotConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let missing = |name: &str| {
            AppError::Config(config::ConfigError::Message(format!(
                "Missing environment variable: {}",
                name
            )))
        };

        if self.bot_token.trim().is_empty() {
            return Err(missing("BOT_TOKEN"));
        }
        if self.spotipy_client_id.trim().is_empty() {
            return Err(missing("SPOTIPY_CLIENT_ID"));
        }
        if self.spotipy_client_secret.trim().is_empty() {
            return Err(missing("SPOTIPY_CLIENT_SECRET"));
        }

        let backends = self.backends()?;
        if backends.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "FETCH_BACKENDS must name at least one backend".to_string(),
            )));
        }
        if backends.contains(&FetchBackendKind::Cobalt) && self.cobalt_instances.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Cobalt backend enabled but COBALT_INSTANCES is empty".to_string(),
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "MAX_CONCURRENT_REQUESTS must be at least 1".to_string(),
            )));
        }

        Ok(())
    }

    /// Configured backends in fallback order, duplicates removed.
    pub fn backends(&self) -> Result<Vec<FetchBackendKind>> {
        let mut kinds = Vec::new();
        for name in self.fetch_backends.iter().filter(|n| !n.trim().is_empty()) {
            let kind = FetchBackendKind::parse(name)?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn ytdlp_timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp_timeout_secs)
    }
}
