use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId, ParseMode};
use teloxide::utils::html;
use crate::errors::{AppError, Result};
use crate::notifier::StatusSink;
use crate::pipeline::{AudioUploader, PreparedAudio};

/// Bot API upload limit for bots on the public server.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Renders a status line under the bot header.
pub fn status_html(text: &str) -> String {
    format!("💿 <b>Spotify Downloader</b>\n{}", html::escape(text))
}

/// Edits one status message in place.
pub struct TelegramStatusSink {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
}

impl TelegramStatusSink {
    pub fn new(bot: Bot, chat_id: ChatId, message_id: MessageId) -> Self {
        Self { bot, chat_id, message_id }
    }
}

#[async_trait::async_trait]
impl StatusSink for TelegramStatusSink {
    async fn show(&self, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(self.chat_id, self.message_id, status_html(text))
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

pub struct TelegramUploader {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramUploader {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

pub async fn check_upload_size(path: &Path) -> Result<u64> {
    let size = tokio::fs::metadata(path).await?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::Upload(format!(
            "file is {:.1} MB, the limit is {} MB",
            size as f64 / 1_048_576.0,
            MAX_UPLOAD_BYTES / 1_048_576
        )));
    }
    Ok(size)
}

#[async_trait::async_trait]
impl AudioUploader for TelegramUploader {
    async fn upload(&self, audio: &PreparedAudio) -> Result<()> {
        let size = check_upload_size(&audio.audio_path).await?;
        log::info!("⬆️ [UPLOAD] Sending {:?} ({} bytes) to chat {}", audio.audio_path, size, self.chat_id);

        if let Err(e) = self.bot.send_chat_action(self.chat_id, ChatAction::UploadVoice).await {
            log::debug!("📭 [UPLOAD] Chat action failed: {}", e);
        }

        let mut request = self
            .bot
            .send_audio(self.chat_id, InputFile::file(audio.audio_path.clone()))
            .title(audio.track.title.clone())
            .performer(audio.track.artist.clone())
            .caption(audio.track.caption())
            .parse_mode(ParseMode::Html);
        if let Some(thumb) = &audio.thumbnail_path {
            request = request.thumbnail(InputFile::file(thumb.clone()));
        }

        request.await.map_err(|e| AppError::Upload(e.to_string()))?;
        log::info!("✅ [UPLOAD] Delivered {} - {}", audio.track.artist, audio.track.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_is_escaped_under_header() {
        assert_eq!(
            status_html("🔎 Searching 'Rock & <Roll>'..."),
            "💿 <b>Spotify Downloader</b>\n🔎 Searching 'Rock &amp; &lt;Roll&gt;'..."
        );
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.mp3");
        std::fs::write(&small, vec![0u8; 1024]).unwrap();
        assert_eq!(check_upload_size(&small).await.unwrap(), 1024);

        let big = dir.path().join("big.mp3");
        let file = std::fs::File::create(&big).unwrap();
        file.set_len(MAX_UPLOAD_BYTES + 1).unwrap();
        assert!(matches!(check_upload_size(&big).await, Err(AppError::Upload(_))));
    }
}
