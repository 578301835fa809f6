pub mod telegram;

use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use crate::notifier::ProgressTracker;
use crate::pipeline::TrackPipeline;
use crate::security::InputValidator;
use telegram::{TelegramStatusSink, TelegramUploader};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the welcome message.")]
    Start,
    #[command(description = "explain how to use the bot.")]
    Help,
}

pub struct BotState {
    pub pipeline: Arc<TrackPipeline>,
    pub validator: InputValidator,
    pub progress_interval: Duration,
}

pub fn welcome_text() -> &'static str {
    "🎧 <b>Spotify Downloader</b>\n\
     Smart audio search.\n\
     Send me a Spotify track link."
}

pub fn help_text() -> String {
    format!(
        "{}\n\nSend a link like <code>https://open.spotify.com/track/...</code> \
         and I will reply with the tagged audio file.\nAlbums and playlists are not supported.",
        Command::descriptions()
    )
}

/// Cheap pre-filter before the full link validation.
pub fn mentions_spotify(text: &str) -> bool {
    text.contains("spotify.com") || text.contains("spotify.link") || text.contains("spotify:")
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
    let text = match cmd {
        Command::Start => welcome_text().to_string(),
        Command::Help => help_text(),
    };
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

async fn handle_link(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(link) = msg.text().and_then(|text| state.validator.extract_link(text)) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    log::info!("📨 [BOT] Chat {} requested {}", chat_id, link);

    let status = bot
        .send_message(chat_id, "🔍 <b>Analyzing Spotify...</b>")
        .parse_mode(ParseMode::Html)
        .await?;

    let sink = Arc::new(TelegramStatusSink::new(bot.clone(), chat_id, status.id));
    let tracker = ProgressTracker::new(sink, state.progress_interval);
    let uploader = TelegramUploader::new(bot.clone(), chat_id);

    match state.pipeline.process(link, &tracker, &uploader).await {
        Ok(()) => {
            if let Err(e) = bot.delete_message(chat_id, status.id).await {
                log::debug!("📭 [BOT] Could not delete status message: {}", e);
            }
        }
        Err(e) => {
            tracker.finish(&e.user_message()).await;
        }
    }
    Ok(())
}

/// Long-polls until the process is interrupted.
pub async fn run(bot: Bot, state: Arc<BotState>) {
    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        log::warn!("⚠️ [BOT] Could not clear webhook / pending updates: {}", e);
    }

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().map(mentions_spotify).unwrap_or(false))
                .endpoint(handle_link),
        );

    log::info!("🚀 [BOT] Polling for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
