use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use crate::errors::{AppError, Result};
use crate::utils::{decode_cookie_blob, parse_clock_duration};

/// Shared yt-dlp invocation settings: binary path, network routing and session cookies.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    ytdlp_path: String,
    proxy: Option<String>,
    impersonate: Option<String>,
    cookies_file: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(ytdlp_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            proxy: None,
            impersonate: None,
            cookies_file: None,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_impersonate(mut self, target: Option<String>) -> Self {
        self.impersonate = target.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Writes the cookie blob to `dir/cookies.txt` so every yt-dlp call can pass `--cookies`.
    pub fn with_cookie_blob(mut self, blob: Option<&str>, dir: &Path) -> Result<Self> {
        let Some(jar) = blob.and_then(decode_cookie_blob) else {
            return Ok(self);
        };

        std::fs::create_dir_all(dir)?;
        let path = dir.join("cookies.txt");
        std::fs::write(&path, jar)?;
        log::info!("🍪 [YTDLP] Session cookies written to {:?}", path);
        self.cookies_file = Some(path);
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Flags shared by every invocation.
    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--no-check-certificate".to_string()];
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        if let Some(target) = &self.impersonate {
            args.push("--impersonate".to_string());
            args.push(target.clone());
        }
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args
    }

    /// A piped child command carrying the shared flags. The child dies with its handle.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.ytdlp_path);
        cmd.args(self.base_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Runs to completion under the timeout and returns stdout.
    async fn run(&self, args: &[String], fail: fn(String) -> AppError) -> Result<String> {
        let mut cmd = self.command();
        cmd.args(args);
        log::debug!("🚀 [YTDLP] Running: {} {:?}", self.ytdlp_path, args);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => output?,
            Err(_) => {
                log::error!("⏰ [YTDLP] Timed out after {:?}", self.timeout);
                return Err(fail(format!("yt-dlp timed out after {:?}", self.timeout)));
            }
        };

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            log::error!("❌ [YTDLP] exit status {}: {}", output.status, error.trim());
            return Err(fail(format!("yt-dlp failed: {}", error.trim())));
        }

        String::from_utf8(output.stdout).map_err(|e| fail(format!("Invalid UTF-8 in yt-dlp output: {}", e)))
    }

    /// JSON records for a search target such as `ytsearch5:query`.
    /// Flat YouTube Music entries carry no duration; pass `flat = false` there.
    pub async fn search(&self, target: &str, limit: usize, flat: bool) -> Result<Vec<VideoInfo>> {
        let mut args = vec!["--dump-json".to_string()];
        if flat {
            args.push("--flat-playlist".to_string());
        }
        args.extend([
            "--ignore-errors".to_string(),
            "--playlist-end".to_string(),
            limit.to_string(),
            target.to_string(),
        ]);
        let output = self.run(&args, AppError::Search).await?;
        Ok(parse_json_lines(&output))
    }

    /// Direct media URL of the best audio-only stream.
    pub async fn get_audio_url(&self, video_url: &str) -> Result<String> {
        let args = vec![
            "--get-url".to_string(),
            "--no-playlist".to_string(),
            "-f".to_string(),
            "bestaudio[ext=m4a]/bestaudio".to_string(),
            video_url.to_string(),
        ];
        let output = self.run(&args, AppError::Download).await?;
        output
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("http"))
            .map(str::to_string)
            .ok_or_else(|| AppError::Download("yt-dlp returned no stream URL".to_string()))
    }
}

/// The subset of a yt-dlp JSON record the bot reads.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VideoInfo {
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub duration_string: Option<String>,
    pub url: Option<String>,
}

impl VideoInfo {
    /// Flat entries sometimes carry the channel name only.
    pub fn uploader_name(&self) -> Option<String> {
        self.uploader.clone().or_else(|| self.channel.clone())
    }

    /// Seconds, falling back to the `3:45` display string.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.or_else(|| {
            self.duration_string
                .as_deref()
                .and_then(parse_clock_duration)
                .map(|secs| secs as f64)
        })
    }
}

/// One JSON document per line; unparseable lines are skipped.
pub fn parse_json_lines(output: &str) -> Vec<VideoInfo> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<VideoInfo>(line) {
            Ok(info) => Some(info),
            Err(e) => {
                log::warn!("⚠️ [YTDLP] Skipping unparseable line: {}", e);
                None
            }
        })
        .collect()
}

/// Locates the produced audio file, preferring the expected extension.
pub async fn find_downloaded_file(dir: &Path, stem: &str, expected_ext: &str) -> Result<PathBuf> {
    let mut fallback = None;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s == stem)
            .unwrap_or(false);
        if !matches_stem {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext == expected_ext {
            log::info!("✅ [FIND] Found matching file: {:?}", path);
            return Ok(path);
        }
        if matches!(ext, "mp3" | "m4a" | "flac" | "wav" | "ogg" | "webm" | "opus") {
            fallback = Some(path);
        }
    }

    fallback.ok_or_else(|| AppError::Download("No audio file found after download".to_string()))
}
