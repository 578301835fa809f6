mod bot;
mod config;
mod downloader;
mod errors;
mod health;
mod metadata;
mod notifier;
mod pipeline;
mod search;
mod security;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use log::info;
use teloxide::Bot;
use config::{BotConfig, FetchBackendKind};
use downloader::extractor::YtDlpExtractor;
use downloader::http_pool::HttpPool;
use downloader::strategies::{CobaltBackend, DirectBackend, YtDlpBackend};
use downloader::{FallbackFetcher, FetchBackend};
use metadata::providers::CoverArtProvider;
use metadata::spotify::SpotifyResolver;
use metadata::tagger::LoftyTagger;
use pipeline::{PipelineComponents, TrackPipeline};
use search::scorer::{Scorer, ScorerConfig};
use search::ytdlp::YtDlpCatalog;

#[derive(Parser, Debug)]
#[command(name = "spotify-downloader-bot", version, about = "Telegram bot that turns Spotify links into tagged audio files")]
struct Cli {
    /// Optional TOML file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn build_fetcher(config: &BotConfig, extractor: &Arc<YtDlpExtractor>, http: &HttpPool, routed: &HttpPool) -> anyhow::Result<FallbackFetcher> {
    let backends: Vec<Arc<dyn FetchBackend>> = config
        .backends()?
        .into_iter()
        .map(|kind| -> Arc<dyn FetchBackend> {
            match kind {
                FetchBackendKind::Cobalt => Arc::new(CobaltBackend::new(
                    http.clone(),
                    config.cobalt_instances.clone(),
                    config.audio_quality.bitrate(),
                )),
                FetchBackendKind::Ytdlp => Arc::new(YtDlpBackend::new(extractor.clone(), config.audio_quality)),
                FetchBackendKind::Direct => Arc::new(DirectBackend::new(extractor.clone(), routed.clone())),
            }
        })
        .collect();

    let fetcher = FallbackFetcher::new(backends);
    info!("⬇️ [FETCH] Backend order: {:?}", fetcher.backend_names());
    Ok(fetcher)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Starting Spotify Downloader bot v{}", env!("CARGO_PKG_VERSION"));

    let config = BotConfig::load(cli.config.as_deref())?;
    info!("Configuration loaded successfully");

    let http = HttpPool::new(10, 120, None)?;
    let routed = HttpPool::new(10, 300, config.ytdlp_proxy.as_deref())?;

    let extractor = Arc::new(
        YtDlpExtractor::new(config.ytdlp_path.clone())
            .with_proxy(config.ytdlp_proxy.clone())
            .with_impersonate(config.ytdlp_impersonate.clone())
            .with_timeout(config.ytdlp_timeout())
            .with_cookie_blob(config.yt_cookies.as_deref(), &config.work_dir)?,
    );

    let scorer = Scorer::new(ScorerConfig {
        accept_threshold: config.match_threshold,
        ..ScorerConfig::default()
    });

    let pipeline = Arc::new(TrackPipeline::new(
        PipelineComponents {
            resolver: Arc::new(SpotifyResolver::new(
                http.client().clone(),
                config.spotipy_client_id.clone(),
                config.spotipy_client_secret.clone(),
            )),
            search: Arc::new(YtDlpCatalog::new(extractor.clone())),
            scorer,
            fetcher: Arc::new(build_fetcher(&config, &extractor, &http, &routed)?),
            tagger: Arc::new(LoftyTagger::new()),
            covers: Arc::new(CoverArtProvider::new(http.client().clone())),
        },
        config.work_dir.join("requests"),
        config.max_concurrent_requests,
    ));

    let health_state = Arc::new(health::HealthState::new(pipeline.stats()));
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port, health_state).await {
            log::error!("❌ [HEALTH] Server stopped: {}", e);
        }
    });

    let state = Arc::new(bot::BotState {
        pipeline,
        validator: security::InputValidator::new(),
        progress_interval: config.progress_interval(),
    });

    bot::run(Bot::new(config.bot_token.clone()), state).await;
    info!("Bot stopped");
    Ok(())
}
