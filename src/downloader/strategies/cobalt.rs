use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::downloader::http_pool::HttpPool;
use crate::downloader::{FetchBackend, FetchProgress, ProgressReporter};
use crate::errors::{AppError, Result};
use crate::search::RawCandidate;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SUPPORTED_BITRATES: &[u32] = &[320, 256, 128, 96, 64, 8];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CobaltRequest<'a> {
    url: &'a str,
    download_mode: &'static str,
    audio_format: &'static str,
    audio_bitrate: String,
}

#[derive(Debug, Deserialize)]
pub struct CobaltResponse {
    pub status: Option<String>,
    pub url: Option<String>,
    pub error: Option<Value>,
}

impl CobaltResponse {
    /// The file URL, or why this instance should be skipped.
    pub fn file_url(&self) -> std::result::Result<&str, String> {
        if self.status.as_deref() == Some("error") {
            return Err(format!("relay error: {}", self.error.clone().unwrap_or(Value::Null)));
        }
        self.url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| "response carried no file url".to_string())
    }
}

/// Largest relay-supported bitrate not above the requested one.
pub fn cobalt_bitrate(bitrate: u32) -> u32 {
    SUPPORTED_BITRATES
        .iter()
        .copied()
        .find(|supported| *supported <= bitrate)
        .unwrap_or(8)
}

pub fn instance_host(instance: &str) -> String {
    url::Url::parse(instance)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| instance.to_string())
}

/// Rotates through a pool of Cobalt relay instances.
pub struct CobaltBackend {
    http: HttpPool,
    instances: Vec<String>,
    bitrate: u32,
}

impl CobaltBackend {
    pub fn new(http: HttpPool, instances: Vec<String>, bitrate: u32) -> Self {
        Self {
            http,
            instances,
            bitrate: cobalt_bitrate(bitrate),
        }
    }

    async fn request_file_url(&self, instance: &str, video_url: &str) -> Result<String> {
        let payload = CobaltRequest {
            url: video_url,
            download_mode: "audio",
            audio_format: "mp3",
            audio_bitrate: self.bitrate.to_string(),
        };

        let response = self
            .http
            .client()
            .post(instance)
            .timeout(REQUEST_TIMEOUT)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("spotify-downloader-bot/", env!("CARGO_PKG_VERSION")))
            .json(&payload)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(AppError::Download(format!("instance answered {}", response.status())));
        }

        let body: CobaltResponse = response.json().await?;
        body.file_url().map(str::to_string).map_err(AppError::Download)
    }
}

#[async_trait::async_trait]
impl FetchBackend for CobaltBackend {
    fn name(&self) -> &str {
        "cobalt"
    }

    async fn fetch(&self, video_id: &str, dest_dir: &Path, progress: &dyn ProgressReporter) -> Result<PathBuf> {
        let video_url = RawCandidate::watch_url(video_id);
        let dest = dest_dir.join(format!("{}.mp3", video_id));
        let mut last_error = None;

        for instance in &self.instances {
            let host = instance_host(instance);
            progress
                .report(FetchProgress::Connecting {
                    backend: self.name().to_string(),
                    target: host.clone(),
                })
                .await;

            let file_url = match self.request_file_url(instance, &video_url).await {
                Ok(url) => url,
                Err(e) => {
                    log::warn!("⚠️ [COBALT] Node {} failed: {}", host, e);
                    last_error = Some(e);
                    continue;
                }
            };

            log::info!("⬇️ [COBALT] Node {} issued a file URL", host);
            match self.http.download_to_file(&file_url, &dest, self.name(), progress).await {
                Ok(_) => return Ok(dest),
                Err(e) => {
                    log::warn!("⚠️ [COBALT] Streaming from {} failed: {}", host, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::Download("no Cobalt instances configured".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::fakes::RecordingReporter;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server};
    use serde_json::json;
    use std::convert::Infallible;
    use std::net::SocketAddr;

    fn response(body: Value) -> CobaltResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn extracts_file_url() {
        let ok = response(json!({"status": "tunnel", "url": "https://relay/file.mp3"}));
        assert_eq!(ok.file_url(), Ok("https://relay/file.mp3"));

        let legacy = response(json!({"url": "https://relay/file.mp3"}));
        assert!(legacy.file_url().is_ok());

        assert!(response(json!({"status": "tunnel"})).file_url().is_err());
        assert!(response(json!({"status": "redirect", "url": ""})).file_url().is_err());
        assert!(response(json!({"status": "error", "url": "x", "error": {"code": "error.api.fetch.fail"}}))
            .file_url()
            .is_err());
    }

    #[test]
    fn maps_bitrates_and_hosts() {
        assert_eq!(cobalt_bitrate(320), 320);
        assert_eq!(cobalt_bitrate(192), 128);
        assert_eq!(cobalt_bitrate(1), 8);
        assert_eq!(instance_host("https://api.cobalt.tools/api/json"), "api.cobalt.tools");
        assert_eq!(instance_host("not a url"), "not a url");
    }

    #[test]
    fn request_body_uses_relay_field_names() {
        let payload = CobaltRequest {
            url: "https://www.youtube.com/watch?v=abc",
            download_mode: "audio",
            audio_format: "mp3",
            audio_bitrate: "320".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "url": "https://www.youtube.com/watch?v=abc",
                "downloadMode": "audio",
                "audioFormat": "mp3",
                "audioBitrate": "320"
            })
        );
    }

    /// Local relay: `/busy` answers 503, `/empty` omits the url, `/api/json` works.
    async fn spawn_relay() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let make_svc = make_service_fn(move |_| async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| async move {
                let reply = match req.uri().path() {
                    "/busy" => Response::builder().status(503).body(Body::from("busy")).unwrap(),
                    "/empty" => Response::new(Body::from(r#"{"status":"tunnel"}"#)),
                    "/api/json" => Response::new(Body::from(format!(
                        r#"{{"status":"tunnel","url":"http://{}/file.mp3"}}"#,
                        addr
                    ))),
                    "/file.mp3" => Response::new(Body::from(vec![0xFFu8; 4096])),
                    _ => Response::builder().status(404).body(Body::empty()).unwrap(),
                };
                Ok::<_, Infallible>(reply)
            }))
        });

        tokio::spawn(Server::from_tcp(listener).unwrap().serve(make_svc));
        addr
    }

    fn local_pool() -> HttpPool {
        HttpPool::from_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    #[tokio::test]
    async fn rotates_past_failing_instances() {
        let addr = spawn_relay().await;
        let dir = tempfile::tempdir().unwrap();
        let backend = CobaltBackend::new(
            local_pool(),
            vec![
                format!("http://{}/busy", addr),
                format!("http://{}/empty", addr),
                format!("http://{}/api/json", addr),
            ],
            320,
        );

        let reporter = RecordingReporter::default();
        let path = backend.fetch("abc", dir.path(), &reporter).await.unwrap();

        assert_eq!(path, dir.path().join("abc.mp3"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
        let connects = reporter
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, FetchProgress::Connecting { .. }))
            .count();
        assert_eq!(connects, 3);
    }

    #[tokio::test]
    async fn exhausted_pool_is_an_error() {
        let addr = spawn_relay().await;
        let dir = tempfile::tempdir().unwrap();
        let backend = CobaltBackend::new(local_pool(), vec![format!("http://{}/busy", addr)], 320);

        assert!(backend.fetch("abc", dir.path(), &RecordingReporter::default()).await.is_err());
        assert!(!dir.path().join("abc.mp3").exists());
    }
}
